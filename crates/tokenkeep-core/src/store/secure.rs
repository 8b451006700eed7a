//! OS credential store backend.

use async_trait::async_trait;

use super::{BackendKind, KeyValueStore};
use crate::error::StorageError;

/// Key-value store on top of the platform keyring.
///
/// Each key becomes its own credential entry under a shared service name.
/// Keyring calls block, so they run on tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    /// Create a store whose entries live under `service`.
    #[must_use]
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    /// The keyring service name.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    async fn with_entry<T, F>(&self, key: &str, op: F) -> Result<T, StorageError>
    where
        F: FnOnce(&keyring::Entry) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let service = self.service.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let entry = keyring::Entry::new(&service, &key)?;
            op(&entry)
        })
        .await
        .map_err(|e| StorageError::Unavailable(format!("credential store task failed: {e}")))?
    }
}

#[async_trait]
impl KeyValueStore for KeyringStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Secure
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        log::debug!("keyring set {}/{key}", self.service);
        let value = value.to_string();
        self.with_entry(key, move |entry| Ok(entry.set_password(&value)?))
            .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        log::debug!("keyring get {}/{key}", self.service);
        self.with_entry(key, |entry| match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        log::debug!("keyring delete {}/{key}", self.service);
        self.with_entry(key, |entry| match entry.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        })
        .await
    }
}
