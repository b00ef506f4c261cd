//! Mode-aware entry point for record persistence.

use std::sync::Arc;

use super::{CloudSync, KeyValueStore, LoadOutcome, LocalPersistence, SaveOutcome, UserRecord};
use crate::config::StorageMode;
use crate::error::Result;
use crate::network::{ConnectivityProbe, RemoteApi};

/// Routes saves and loads to the local or cloud adapter
#[derive(Clone)]
pub struct AdaptiveStorage {
    local: LocalPersistence,
    cloud: CloudSync,
}

impl AdaptiveStorage {
    /// Build both adapters over the same store
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        probe: ConnectivityProbe,
        remote: Arc<dyn RemoteApi>,
    ) -> Self {
        Self {
            local: LocalPersistence::new(store.clone()),
            cloud: CloudSync::new(store, probe, remote),
        }
    }

    /// Save a record in the given mode
    pub async fn save(&self, mode: StorageMode, record: &UserRecord) -> Result<SaveOutcome> {
        match mode {
            StorageMode::Local => self.local.save(record).await,
            StorageMode::Cloud => self.cloud.save(record).await,
        }
    }

    /// Load the record in the given mode
    ///
    /// `identity_id` is only used in cloud mode.
    pub async fn load(&self, mode: StorageMode, identity_id: Option<&str>) -> Result<LoadOutcome> {
        match mode {
            StorageMode::Local => self.local.load().await,
            StorageMode::Cloud => self.cloud.load(identity_id).await,
        }
    }

    /// The local adapter
    pub fn local(&self) -> &LocalPersistence {
        &self.local
    }

    /// The cloud adapter
    pub fn cloud(&self) -> &CloudSync {
        &self.cloud
    }
}
