//! Configuration types and loading for the application.

use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use schemars::JsonSchema;
use schemars::generate::SchemaSettings;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::paths::{expand_str_path, write_default_config};
use crate::store::{Platform, StoreLocations};
use crate::{APP_NAME, AppPaths, env_prefix};

/// Default file name of the plaintext store inside the data directory.
pub const PLAIN_STORE_FILENAME: &str = "storage.json";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(
    title = "Application Configuration",
    description = "Main configuration for tokenkeep"
)]
pub struct AppConfig {
    /// JSON Schema reference for editor support.
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    #[schemars(skip)]
    pub schema: Option<String>,

    /// Active configuration profile.
    pub profile: String,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Token storage configuration.
    pub storage: StorageConfig,

    /// Custom data directory.
    pub paths: PathsConfig,
}

impl AppConfig {
    /// Override the profile if a value is provided.
    #[must_use]
    pub fn with_profile_override(mut self, profile: Option<String>) -> Self {
        if let Some(profile) = profile {
            self.profile = profile;
        }
        self
    }

    /// Load configuration from file and environment, creating defaults if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read, parsed, or written.
    pub fn load(paths: &AppPaths, dry_run: bool) -> Result<Self> {
        if !paths.config_file.exists() {
            if dry_run {
                log::info!(
                    "dry-run: would create default config at {}",
                    paths.config_file.display()
                );
            } else {
                write_default_config(&paths.config_file)?;
            }
        }

        Self::load_from_path(&paths.config_file)
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed.
    pub fn load_from_path(config_file: &Path) -> Result<Self> {
        let env_prefix = env_prefix();
        let built = Config::builder()
            .set_default("profile", "default")?
            .set_default("logging.level", "info")?
            .set_default("storage.platform", "auto")?
            .set_default("storage.keyring_service", APP_NAME)?
            .add_source(
                File::from(config_file)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::with_prefix(env_prefix.as_str()).separator("__"))
            .build()?;

        let mut config: Self = built.try_deserialize()?;

        if let Some(ref file) = config.logging.file {
            let expanded = expand_str_path(file)?;
            config.logging.file = Some(expanded.display().to_string());
        }

        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema: None,
            profile: "default".to_string(),
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Logging configuration")]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace).
    pub level: LogLevel,

    /// Optional path for log file output. Supports ~ and environment variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Log level enumeration for schema validation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only emit error-level messages.
    Error,
    /// Emit warnings and errors.
    Warn,
    /// Emit informational messages and above (default).
    #[default]
    Info,
    /// Emit debug diagnostics and above.
    Debug,
    /// Emit all messages including fine-grained traces.
    Trace,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

/// Token storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Where and how the token is stored")]
pub struct StorageConfig {
    /// Platform used for backend selection. `auto` detects it; `web` forces
    /// the plaintext store on hosts without a credential service.
    pub platform: PlatformSetting,

    /// Service name for OS credential store entries.
    pub keyring_service: String,

    /// Plaintext store location. Defaults to `storage.json` in the data
    /// directory. Supports ~ and environment variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plain_file: Option<String>,
}

impl StorageConfig {
    /// Resolve backend locations against the application paths.
    ///
    /// # Errors
    ///
    /// Returns an error if `plain_file` cannot be expanded.
    pub fn locations(&self, paths: &AppPaths) -> Result<StoreLocations> {
        let plain_file = match self.plain_file {
            Some(ref file) => expand_str_path(file)?,
            None => paths.data_dir.join(PLAIN_STORE_FILENAME),
        };
        Ok(StoreLocations {
            keyring_service: self.keyring_service.clone(),
            plain_file,
        })
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            platform: PlatformSetting::Auto,
            keyring_service: APP_NAME.to_string(),
            plain_file: None,
        }
    }
}

/// Platform selection setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlatformSetting {
    /// Detect the platform at startup (default).
    #[default]
    Auto,
    /// Treat the host as native, using the OS credential store.
    Native,
    /// Treat the host as a web runtime, using the plaintext store.
    Web,
}

impl PlatformSetting {
    /// The platform this setting selects.
    #[must_use]
    pub const fn resolve(self) -> Platform {
        match self {
            Self::Auto => Platform::detect(),
            Self::Native => Platform::Native,
            Self::Web => Platform::Web,
        }
    }
}

/// Path override configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Custom data directory")]
pub struct PathsConfig {
    /// Directory for persistent data. Supports ~ and environment variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
}

/// Generate the JSON schema for `AppConfig`.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn generate_schema() -> Result<String> {
    let mut schema = SchemaSettings::draft07()
        .into_generator()
        .into_root_schema_for::<AppConfig>();

    schema.insert(
        "title".to_string(),
        json!(format!("{APP_NAME} configuration")),
    );

    if let Some(props) = schema.get_mut("properties")
        && let Some(props_obj) = props.as_object_mut()
    {
        props_obj.insert(
            "$schema".to_string(),
            json!({
                "type": "string",
                "description": "JSON Schema reference for editor support"
            }),
        );
    }

    serde_json::to_string_pretty(&schema).context("serializing JSON schema")
}
