//! In-memory backend.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{BackendKind, KeyValueStore};
use crate::error::StorageError;

/// Ephemeral key-value store. Contents are lost on drop.
///
/// Reports itself as [`BackendKind::Plain`] unless built with
/// [`MemoryStore::with_kind`], which lets tests stand in for either backend.
#[derive(Debug)]
pub struct MemoryStore {
    kind: BackendKind,
    data: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty plain store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_kind(BackendKind::Plain)
    }

    /// Create an empty store reporting `kind`.
    #[must_use]
    pub fn with_kind(kind: BackendKind) -> Self {
        Self {
            kind,
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// Whether the store holds no keys.
    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.data
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.data.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn basic_operations() {
        let store = MemoryStore::new();
        assert!(store.is_empty().await);
        assert_eq!(store.get("k").await.expect("get"), None);

        store.set("k", "v").await.expect("set");
        assert_eq!(store.get("k").await.expect("get").as_deref(), Some("v"));
        assert_eq!(store.len().await, 1);

        store.delete("k").await.expect("delete");
        store.delete("k").await.expect("delete twice");
        assert!(store.is_empty().await);
    }

    #[test]
    fn kind_is_configurable() {
        assert_eq!(MemoryStore::new().kind(), BackendKind::Plain);
        assert_eq!(
            MemoryStore::with_kind(BackendKind::Secure).kind(),
            BackendKind::Secure
        );
    }
}
