//! Durable key-value storage backends.
//!
//! Two real backends exist:
//! - [`KeyringStore`]: the OS credential store (Keychain, Secret Service,
//!   Credential Manager), encrypted at rest
//! - [`FileStore`]: a plaintext JSON file, used where no credential store
//!   exists
//!
//! [`MemoryStore`] is an ephemeral stand-in for tests.
//!
//! The backend is chosen once from the running [`Platform`] by
//! [`select_backend`] and reused for every call.

mod memory;
mod plain;
mod secure;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

pub use self::memory::MemoryStore;
pub use self::plain::FileStore;
pub use self::secure::KeyringStore;
use crate::error::StorageError;

/// Asynchronous string key-value store.
///
/// A missing key is never an error: `get` returns `Ok(None)` and `delete`
/// succeeds without doing anything.
#[async_trait]
pub trait KeyValueStore: Send + Sync + fmt::Debug {
    /// Which kind of backend this is.
    fn kind(&self) -> BackendKind;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Read the value under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Remove `key`.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Storage backend variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// OS-provided encrypted credential store.
    Secure,
    /// Unencrypted fallback storage.
    Plain,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Secure => write!(f, "secure"),
            Self::Plain => write!(f, "plain"),
        }
    }
}

/// Runtime platform, as far as storage is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// A native host with an OS credential store.
    Native,
    /// A browser-like runtime with only plain persistent storage.
    Web,
}

impl Platform {
    /// Detect the platform this binary was built for.
    #[must_use]
    pub const fn detect() -> Self {
        if cfg!(target_arch = "wasm32") {
            Self::Web
        } else {
            Self::Native
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Web => write!(f, "web"),
        }
    }
}

/// Pick the storage backend for a platform.
#[must_use]
pub const fn select_backend(platform: Platform) -> BackendKind {
    match platform {
        Platform::Native => BackendKind::Secure,
        Platform::Web => BackendKind::Plain,
    }
}

/// Where each backend keeps its data.
#[derive(Debug, Clone)]
pub struct StoreLocations {
    /// Service name under which keyring entries are created.
    pub keyring_service: String,
    /// Path of the plaintext JSON store.
    pub plain_file: PathBuf,
}

/// Open the backend of the given kind.
#[must_use]
pub fn open_backend(kind: BackendKind, locations: &StoreLocations) -> Arc<dyn KeyValueStore> {
    match kind {
        BackendKind::Secure => Arc::new(KeyringStore::new(&locations.keyring_service)),
        BackendKind::Plain => Arc::new(FileStore::new(locations.plain_file.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_is_a_function_of_platform() {
        assert_eq!(select_backend(Platform::Native), BackendKind::Secure);
        assert_eq!(select_backend(Platform::Web), BackendKind::Plain);
    }

    #[test]
    fn host_builds_are_native() {
        assert_eq!(Platform::detect(), Platform::Native);
    }

    #[test]
    fn opened_backend_reports_its_kind() {
        let locations = StoreLocations {
            keyring_service: "tokenkeep-test".to_string(),
            plain_file: PathBuf::from("/nonexistent/storage.json"),
        };
        assert_eq!(
            open_backend(BackendKind::Secure, &locations).kind(),
            BackendKind::Secure
        );
        assert_eq!(
            open_backend(BackendKind::Plain, &locations).kind(),
            BackendKind::Plain
        );
    }

    #[test]
    fn kinds_display_lowercase() {
        assert_eq!(BackendKind::Secure.to_string(), "secure");
        assert_eq!(Platform::Web.to_string(), "web");
        assert_eq!(
            serde_json::to_string(&BackendKind::Plain).expect("json"),
            "\"plain\""
        );
    }
}
