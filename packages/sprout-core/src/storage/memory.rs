//! # In-Memory Store
//!
//! A [`KeyValueStore`] held entirely in process memory. Used by tests and
//! by hosts that want a throwaway session.
//!
//! An optional byte quota mimics the write limit of browser storage so
//! quota failures can be exercised without a real browser.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::KeyValueStore;
use crate::error::{Error, Result};

/// In-memory key-value store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    /// Maximum total key + value bytes, if limited
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    /// Create an empty, unlimited store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that rejects writes beyond `quota_bytes`
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn used_bytes(entries: &HashMap<String, String>) -> usize {
        entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write();

        if let Some(quota) = self.quota_bytes {
            let current = entries.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
            let projected = Self::used_bytes(&entries) - current + key.len() + value.len();
            if projected > quota {
                return Err(Error::StorageWriteError(format!(
                    "quota exceeded writing {key} ({projected} > {quota} bytes)"
                )));
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_and_retrieve() {
        let store = MemoryStore::new();

        store.set("test_key", "secret data").await.unwrap();
        assert_eq!(store.get("test_key").await.unwrap().as_deref(), Some("secret data"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_remove() {
        let store = MemoryStore::new();

        store.set("test_key", "data").await.unwrap();
        assert!(store.remove("test_key").await.unwrap());
        assert!(!store.remove("test_key").await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_keys_sorted() {
        let store = MemoryStore::new();
        store.set("b", "2").await.unwrap();
        store.set("a", "1").await.unwrap();

        assert_eq!(store.keys().await.unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_quota_rejects_oversized_write() {
        let store = MemoryStore::with_quota(16);

        store.set("k", "0123456789").await.unwrap();
        let err = store.set("other", "0123456789").await.unwrap_err();
        assert!(matches!(err, Error::StorageWriteError(_)));

        // Overwriting the same key only counts the replacement.
        store.set("k", "abcdefghij").await.unwrap();
        assert_eq!(store.get("other").await.unwrap(), None);
    }
}
