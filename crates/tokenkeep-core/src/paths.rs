//! XDG-compliant path resolution for application directories.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use crate::{APP_NAME, AppConfig};

/// Application paths for the config file and data directory.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Path to the configuration file.
    pub config_file: PathBuf,
    /// Directory for persistent application data (the plaintext store).
    pub data_dir: PathBuf,
}

impl AppPaths {
    /// Discover application paths, optionally overriding the config file location.
    ///
    /// # Errors
    ///
    /// Returns an error if paths cannot be resolved or expanded.
    pub fn discover(override_path: Option<&Path>) -> Result<Self> {
        let config_file = match override_path {
            Some(path) => {
                let expanded = expand_path(path)?;
                if expanded.is_dir() {
                    expanded.join("config.toml")
                } else {
                    expanded
                }
            }
            None => default_config_dir()?.join("config.toml"),
        };

        Ok(Self {
            config_file,
            data_dir: default_data_dir()?,
        })
    }

    /// Apply path overrides from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if override paths cannot be expanded.
    pub fn apply_overrides(mut self, cfg: &AppConfig) -> Result<Self> {
        if let Some(ref data_override) = cfg.paths.data_dir {
            self.data_dir = expand_str_path(data_override)?;
        }
        Ok(self)
    }

    /// Ensure the data directory exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("creating directory {}", self.data_dir.display()))
    }
}

impl std::fmt::Display for AppPaths {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "config: {}, data: {}",
            self.config_file.display(),
            self.data_dir.display()
        )
    }
}

/// Expand a `Path`, resolving ~ and environment variables.
///
/// # Errors
///
/// Returns an error if shell expansion fails.
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    path.to_str()
        .map_or_else(|| Ok(path.to_path_buf()), expand_str_path)
}

/// Expand a string path, resolving ~ and environment variables.
///
/// # Errors
///
/// Returns an error if shell expansion fails.
pub fn expand_str_path(text: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(text).context("expanding path")?;
    Ok(PathBuf::from(expanded.to_string()))
}

/// Resolve `$xdg_var/<app>`, then the platform directory, then `~/<home_rel>/<app>`.
fn xdg_dir(
    xdg_var: &str,
    platform_dir: fn() -> Option<PathBuf>,
    home_rel: &[&str],
    what: &str,
) -> Result<PathBuf> {
    if let Some(dir) = env::var_os(xdg_var).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    if let Some(dir) = platform_dir() {
        return Ok(dir.join(APP_NAME));
    }

    dirs::home_dir()
        .map(|home| home_rel.iter().fold(home, |p, seg| p.join(seg)).join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine {what} directory"))
}

/// Get the default configuration directory (`XDG_CONFIG_HOME` or fallback).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn default_config_dir() -> Result<PathBuf> {
    xdg_dir("XDG_CONFIG_HOME", dirs::config_dir, &[".config"], "configuration")
}

/// Get the default data directory (`XDG_DATA_HOME` or fallback).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn default_data_dir() -> Result<PathBuf> {
    xdg_dir("XDG_DATA_HOME", dirs::data_dir, &[".local", "share"], "data")
}

/// Write the default configuration file to the specified path.
///
/// # Errors
///
/// Returns an error if the file cannot be written or the directory cannot be created.
pub fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {}", parent.display()))?;
    }

    let toml_str =
        toml::to_string_pretty(&AppConfig::default()).context("serializing default config to TOML")?;
    let body = format!(
        "# Configuration for {APP_NAME}\n# File: {}\n\n{toml_str}",
        path.display()
    );
    fs::write(path, body).with_context(|| format!("writing config file to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn discover_accepts_directory_override() {
        let dir = TempDir::new().expect("tempdir");
        let paths = AppPaths::discover(Some(dir.path())).expect("discover");
        assert_eq!(paths.config_file, dir.path().join("config.toml"));
    }

    #[test]
    fn overrides_replace_data_dir() {
        let dir = TempDir::new().expect("tempdir");
        let mut cfg = AppConfig::default();
        cfg.paths.data_dir = Some(dir.path().join("d").display().to_string());

        let paths = AppPaths::discover(Some(dir.path().join("c.toml").as_path()))
            .expect("discover")
            .apply_overrides(&cfg)
            .expect("overrides");
        paths.ensure_directories().expect("ensure");

        assert_eq!(paths.data_dir, dir.path().join("d"));
        assert!(dir.path().join("d").is_dir());
        assert!(!paths.to_string().contains("state"));
    }

    #[test]
    fn default_config_has_header() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");
        write_default_config(&path).expect("write");
        let body = fs::read_to_string(&path).expect("read");
        assert!(body.starts_with("# Configuration for tokenkeep"));
        assert!(body.contains("keyring_service = \"tokenkeep\""));
    }
}
