//! # Local Persistence
//!
//! Reads and writes the single user record plus its shadow backup.
//!
//! ```text
//! save(record)
//!   │
//!   ├── stamp last_sync_timestamp
//!   ├── write user-record          (primary)
//!   └── write user-record-backup   (same payload)
//!
//! load()
//!   └── read user-record only
//! ```
//!
//! Failures are reported as storage errors with no retry; the caller
//! decides what to do.

use std::sync::Arc;

use super::{get_json, keys, set_json, DataSource, KeyValueStore, LoadOutcome, SaveOutcome, UserRecord};
use crate::error::{Error, Result};

/// Local persistence adapter
#[derive(Clone)]
pub struct LocalPersistence {
    store: Arc<dyn KeyValueStore>,
}

impl LocalPersistence {
    /// Create an adapter over a store
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Save the record with a fresh sync timestamp
    pub async fn save(&self, record: &UserRecord) -> Result<SaveOutcome> {
        let mut record = record.clone();
        record.last_sync_timestamp = Some(crate::time::now_rfc3339());

        self.write_both(&record).await?;
        tracing::debug!(email = %record.email, "Saved user record locally");

        Ok(SaveOutcome {
            record,
            source: DataSource::Local,
            needs_sync: false,
        })
    }

    /// Load the primary record
    ///
    /// The backup is never consulted here; see [`restore_from_backup`].
    ///
    /// [`restore_from_backup`]: LocalPersistence::restore_from_backup
    pub async fn load(&self) -> Result<LoadOutcome> {
        let record = get_json(self.store.as_ref(), keys::USER_RECORD).await?;
        Ok(LoadOutcome {
            record,
            source: DataSource::Local,
            needs_sync: false,
        })
    }

    /// Read the shadow backup copy
    pub async fn load_backup(&self) -> Result<Option<UserRecord>> {
        get_json(self.store.as_ref(), keys::USER_RECORD_BACKUP).await
    }

    /// Copy the backup over the primary record
    ///
    /// Returns the restored record, or `NoData` when there is no backup.
    pub async fn restore_from_backup(&self) -> Result<UserRecord> {
        let backup = self.load_backup().await?.ok_or(Error::NoData)?;
        set_json(self.store.as_ref(), keys::USER_RECORD, &backup).await?;
        tracing::info!(email = %backup.email, "Restored user record from backup");
        Ok(backup)
    }

    /// Overwrite both copies without re-stamping
    ///
    /// Used when the server is the source of the record.
    pub async fn write_cache(&self, record: &UserRecord) -> Result<()> {
        self.write_both(record).await
    }

    /// Remove the primary and backup records
    pub async fn clear(&self) -> Result<()> {
        self.store.remove(keys::USER_RECORD).await?;
        self.store.remove(keys::USER_RECORD_BACKUP).await?;
        Ok(())
    }

    async fn write_both(&self, record: &UserRecord) -> Result<()> {
        set_json(self.store.as_ref(), keys::USER_RECORD, record).await?;
        set_json(self.store.as_ref(), keys::USER_RECORD_BACKUP, record).await
    }
}
