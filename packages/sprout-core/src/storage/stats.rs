//! Derived storage statistics.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{get_json, keys, KeyValueStore, UserRecord};
use crate::auth::LocalIdentity;
use crate::config::StorageMode;
use crate::error::Result;

/// Snapshot of what is stored on this device
///
/// Recomputed on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    /// Active mode
    pub mode: StorageMode,
    /// Sum of key and value bytes over the application keyspace
    pub local_size_bytes: usize,
    /// A user record or a local identity exists
    pub has_local_data: bool,
    /// When the stored record was last saved
    pub last_sync: Option<DateTime<Utc>>,
    /// Number of locally registered identities
    pub local_identity_count: usize,
}

impl StorageStats {
    /// Compute stats from the store
    ///
    /// Undecodable payloads count toward size but are otherwise ignored.
    pub async fn collect(store: &dyn KeyValueStore, mode: StorageMode) -> Result<Self> {
        let mut local_size_bytes = 0;
        for key in keys::ALL {
            if let Some(value) = store.get(key).await? {
                local_size_bytes += key.len() + value.len();
            }
        }

        let record: Option<UserRecord> = get_json(store, keys::USER_RECORD)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Unreadable user record while computing stats");
                None
            });
        let roster: Vec<LocalIdentity> = get_json(store, keys::LOCAL_IDENTITY_ROSTER)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Unreadable identity roster while computing stats");
                None
            })
            .unwrap_or_default();

        let last_sync = record
            .as_ref()
            .and_then(|r| r.last_sync_timestamp.as_deref())
            .and_then(crate::time::parse_rfc3339);

        Ok(Self {
            mode,
            local_size_bytes,
            has_local_data: record.is_some() || !roster.is_empty(),
            last_sync,
            local_identity_count: roster.len(),
        })
    }
}
