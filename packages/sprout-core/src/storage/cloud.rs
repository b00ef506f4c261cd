//! # Cloud Sync
//!
//! Cache-first persistence against the server of record.
//!
//! ## Save
//!
//! ```text
//! save(record)
//!   │
//!   ├── 1. LocalPersistence::save        (always, before anything remote)
//!   ├── 2. ConnectivityProbe::check
//!   └── 3. reachable and signed in?
//!          ├── yes → POST /api/user-data
//!          │         ├── ok    → source = Server, needs_sync = false
//!          │         └── error → source = Cache,  needs_sync = true
//!          └── no  →             source = Cache,  needs_sync = true
//! ```
//!
//! ## Load
//!
//! ```text
//! load(identity_id?)
//!   │
//!   ├── id given and reachable → GET /api/user-data/{id}
//!   │     ├── ok    → refresh local cache, source = Server
//!   │     └── error → cache, needs_sync = false
//!   ├── id given, unreachable  → cache, needs_sync = true
//!   └── no id                  → cache
//!
//! cache empty → Error::NoData
//! ```
//!
//! Remote errors never escape these two operations. Once a local copy
//! exists the caller always gets a record back.

use std::sync::Arc;

use super::{keys, DataSource, KeyValueStore, LoadOutcome, LocalPersistence, SaveOutcome, UserRecord};
use crate::auth::{BearerToken, SessionToken};
use crate::config::StorageMode;
use crate::error::{Error, Result};
use crate::network::{ConnectivityProbe, RemoteApi};

/// Cloud sync adapter
#[derive(Clone)]
pub struct CloudSync {
    store: Arc<dyn KeyValueStore>,
    local: LocalPersistence,
    probe: ConnectivityProbe,
    remote: Arc<dyn RemoteApi>,
}

impl CloudSync {
    /// Create the adapter
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        probe: ConnectivityProbe,
        remote: Arc<dyn RemoteApi>,
    ) -> Self {
        Self {
            local: LocalPersistence::new(store.clone()),
            store,
            probe,
            remote,
        }
    }

    /// Save through the local cache, then mirror to the server
    ///
    /// Fails only when the local write fails.
    pub async fn save(&self, record: &UserRecord) -> Result<SaveOutcome> {
        let saved = self.local.save(record).await?;
        let pending = |record: UserRecord| SaveOutcome {
            record,
            source: DataSource::Cache,
            needs_sync: true,
        };

        if !self.probe.check(StorageMode::Cloud).await {
            tracing::info!("Server unreachable, record kept as pending write");
            return Ok(pending(saved.record));
        }

        let Some(token) = self.bearer().await else {
            tracing::info!("No cloud session, record kept as pending write");
            return Ok(pending(saved.record));
        };

        match self.remote.save_user_data(&token, &saved.record).await {
            Ok(()) => {
                tracing::debug!(email = %saved.record.email, "User record mirrored to server");
                Ok(SaveOutcome {
                    record: saved.record,
                    source: DataSource::Server,
                    needs_sync: false,
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, "Remote save failed, record kept as pending write");
                Ok(pending(saved.record))
            }
        }
    }

    /// Load from the server when possible, otherwise from the cache
    pub async fn load(&self, identity_id: Option<&str>) -> Result<LoadOutcome> {
        let Some(identity_id) = identity_id else {
            return self.from_cache(false).await;
        };

        if !self.probe.check(StorageMode::Cloud).await {
            return self.from_cache(true).await;
        }

        let remote = match self.bearer().await {
            Some(token) => self.remote.load_user_data(&token, identity_id).await,
            None => Err(Error::NotAuthenticated),
        };

        match remote {
            Ok(record) => {
                if let Err(e) = self.local.write_cache(&record).await {
                    tracing::warn!(error = %e, "Failed to refresh local cache");
                }
                Ok(LoadOutcome {
                    record: Some(record),
                    source: DataSource::Server,
                    needs_sync: false,
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, identity_id, "Remote load failed, using cache");
                self.from_cache(false).await
            }
        }
    }

    /// Delete the server copy, best-effort
    ///
    /// Returns whether the server acknowledged the delete.
    pub async fn delete_remote(&self) -> bool {
        let Some(token) = self.bearer().await else {
            return false;
        };
        match self.remote.delete_user_data(&token).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Remote delete failed");
                false
            }
        }
    }

    async fn from_cache(&self, needs_sync: bool) -> Result<LoadOutcome> {
        let cached = self.local.load().await?;
        match cached.record {
            Some(record) => Ok(LoadOutcome {
                record: Some(record),
                source: DataSource::Cache,
                needs_sync,
            }),
            None => Err(Error::NoData),
        }
    }

    /// The stored bearer token, if a valid cloud session exists
    async fn bearer(&self) -> Option<BearerToken> {
        let raw = match self.store.get(keys::REMOTE_SESSION_TOKEN).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read cloud session token");
                return None;
            }
        };
        match SessionToken::parse(StorageMode::Cloud, &raw) {
            Ok(SessionToken::Cloud(bearer)) => Some(bearer),
            Ok(SessionToken::Local(_)) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unusable cloud session token");
                None
            }
        }
    }
}
