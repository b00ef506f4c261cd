//! SqliteStore durability.

use std::sync::Arc;

use sprout_core::storage::{keys, LocalPersistence};
use sprout_core::{KeyValueStore, SqliteStore, UserRecord};

#[tokio::test]
async fn test_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sprout.db");

    let saved = {
        let store = Arc::new(SqliteStore::open(Some(&path)).unwrap());
        store.set(keys::STORAGE_MODE_PREFERENCE, "cloud").await.unwrap();
        let local = LocalPersistence::new(store);
        local
            .save(&UserRecord::new(None, "alice@example.com", "Alice", "Smith"))
            .await
            .unwrap()
            .record
    };

    let store = Arc::new(SqliteStore::open(Some(&path)).unwrap());
    assert_eq!(
        store.get(keys::STORAGE_MODE_PREFERENCE).await.unwrap().as_deref(),
        Some("cloud")
    );
    let local = LocalPersistence::new(store.clone());
    assert_eq!(local.load().await.unwrap().record, Some(saved.clone()));
    assert_eq!(local.load_backup().await.unwrap(), Some(saved));
    assert_eq!(store.keys().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_open_fails_on_directory() {
    let dir = tempfile::tempdir().unwrap();
    assert!(SqliteStore::open(Some(dir.path())).is_err());
}
