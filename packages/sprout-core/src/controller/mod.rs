//! # Storage Mode Controller
//!
//! Composes authentication, persistence and connectivity into one
//! observable [`StorageState`] plus the action set a UI drives.
//!
//! ## Action Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       CONTROLLER ACTIONS                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  UI action                                                              │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  ┌───────────────────────┐   confirm?   ┌───────────────────────┐       │
//! │  │ StorageModeController │ ───────────► │ ConfirmationGate      │       │
//! │  └──────────┬────────────┘              └───────────────────────┘       │
//! │             │                                                           │
//! │     ┌───────┴────────────┬──────────────────────┐                       │
//! │     ▼                    ▼                      ▼                       │
//! │  AuthService       AdaptiveStorage       ConnectivityProbe              │
//! │     │                    │                      │                       │
//! │     └────────────┬───────┴──────────────────────┘                       │
//! │                  ▼                                                      │
//! │       watch::Sender<StorageState>  ──►  subscribers                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Generations
//!
//! Every mode switch and every clear bumps `generation`. Work that was
//! started under an older generation (a sync, a pending auto-sync timer)
//! discards its result instead of writing stale state.

mod timers;

pub use timers::TimerHandle;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;

use crate::auth::AuthService;
use crate::config::{SproutConfig, StorageMode};
use crate::error::{Error, Result};
use crate::network::{ConnectivityProbe, RemoteApi};
use crate::storage::{
    AdaptiveStorage, DataSource, KeyValueStore, LoadOutcome, SaveOutcome, StorageStats, UserRecord,
};

// ============================================================================
// STATE
// ============================================================================

/// Observable controller state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageState {
    /// Active mode
    pub mode: StorageMode,
    /// Last known reachability (always true in local mode)
    pub is_online: bool,
    /// The local record is ahead of the server
    pub needs_sync: bool,
    /// `initialize` has completed at least once
    pub is_initialized: bool,
    /// Last computed stats
    pub stats: Option<StorageStats>,
    /// Bumped by every mode switch and clear
    pub generation: u64,
}

impl StorageState {
    fn new(mode: StorageMode) -> Self {
        Self {
            mode,
            is_online: mode == StorageMode::Local,
            needs_sync: false,
            is_initialized: false,
            stats: None,
            generation: 0,
        }
    }

    /// Whether the debounced auto-sync should be armed
    pub fn wants_auto_sync(&self) -> bool {
        self.mode == StorageMode::Cloud && self.is_online && self.needs_sync
    }
}

// ============================================================================
// CONFIRMATION
// ============================================================================

/// A destructive action awaiting user confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmRequest {
    /// Switching mode while local data exists
    SwitchMode {
        /// Current mode
        from: StorageMode,
        /// Requested mode
        to: StorageMode,
    },
    /// Clearing every stored record
    ClearAllData {
        /// Current mode
        mode: StorageMode,
    },
}

/// Asks the user to confirm a destructive action
///
/// The controller blocks the action until this resolves.
#[async_trait]
pub trait ConfirmationGate: Send + Sync {
    /// Return true to proceed
    async fn confirm(&self, request: ConfirmRequest) -> bool;
}

/// Gate with a fixed answer
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

#[async_trait]
impl ConfirmationGate for AutoConfirm {
    async fn confirm(&self, request: ConfirmRequest) -> bool {
        tracing::debug!(?request, answer = self.0, "Auto-answered confirmation");
        self.0
    }
}

// ============================================================================
// OUTCOMES
// ============================================================================

/// Result of [`StorageModeController::switch_mode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// Already in the requested mode; the session was still cleared
    Unchanged,
    /// The user declined; nothing changed
    Cancelled,
    /// The mode changed and the session was cleared
    Switched,
}

/// Result of [`StorageModeController::clear_all_data`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    /// The user declined; nothing changed
    Cancelled,
    /// Local records removed
    Cleared {
        /// The server acknowledged the remote delete
        remote_deleted: bool,
    },
}

// ============================================================================
// CONTROLLER
// ============================================================================

/// Reactive storage-mode state plus actions
pub struct StorageModeController {
    auth: Arc<AuthService>,
    store: Arc<dyn KeyValueStore>,
    storage: AdaptiveStorage,
    probe: ConnectivityProbe,
    gate: Arc<dyn ConfirmationGate>,
    state: watch::Sender<StorageState>,
    poll_interval: Duration,
    auto_sync_debounce: Duration,
}

impl StorageModeController {
    /// Create a controller from its parts
    pub fn new(
        auth: Arc<AuthService>,
        store: Arc<dyn KeyValueStore>,
        remote: Arc<dyn RemoteApi>,
        gate: Arc<dyn ConfirmationGate>,
        config: &SproutConfig,
    ) -> Self {
        let probe = ConnectivityProbe::with_timeout(remote.clone(), config.health_timeout);
        let storage = AdaptiveStorage::new(store.clone(), probe.clone(), remote);
        let (state, _) = watch::channel(StorageState::new(auth.mode()));

        Self {
            auth,
            store,
            storage,
            probe,
            gate,
            state,
            poll_interval: config.connectivity_poll_interval,
            auto_sync_debounce: config.auto_sync_debounce,
        }
    }

    /// Load the stored configuration and build a controller around it
    pub async fn open(
        config: &SproutConfig,
        store: Arc<dyn KeyValueStore>,
        remote: Arc<dyn RemoteApi>,
        gate: Arc<dyn ConfirmationGate>,
    ) -> Self {
        let auth = AuthService::load(store.clone(), remote.clone(), config.fallback_mode()).await;
        Self::new(Arc::new(auth), store, remote, gate, config)
    }

    /// The authentication service
    pub fn auth(&self) -> &Arc<AuthService> {
        &self.auth
    }

    /// Snapshot of the current state
    pub fn state(&self) -> StorageState {
        self.state.borrow().clone()
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<StorageState> {
        self.state.subscribe()
    }

    /// Current generation
    pub fn generation(&self) -> u64 {
        self.state.borrow().generation
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.state.borrow().is_initialized {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    fn bump_generation(&self) -> u64 {
        let mut generation = 0;
        self.state.send_modify(|s| {
            s.generation += 1;
            generation = s.generation;
        });
        generation
    }

    // ------------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------------

    /// Read config, compute stats, probe connectivity
    ///
    /// Safe to call repeatedly. Every mutating action ends with it.
    pub async fn initialize(&self) -> Result<StorageState> {
        let mode = self.auth.mode();
        let stats = StorageStats::collect(self.store.as_ref(), mode).await?;
        let is_online = self.probe.check(mode).await;

        self.state.send_modify(|s| {
            s.mode = mode;
            s.is_online = is_online;
            s.stats = Some(stats);
            s.is_initialized = true;
        });
        tracing::debug!(%mode, is_online, "Storage controller initialized");
        Ok(self.state())
    }

    /// Switch the storage mode
    ///
    /// Asks for confirmation when local data exists and the mode actually
    /// changes. Unless cancelled, the user is always left signed out, even
    /// when `target` is already the active mode.
    pub async fn switch_mode(&self, target: StorageMode) -> Result<SwitchOutcome> {
        self.ensure_initialized()?;
        let current = self.auth.mode();
        let same_mode = target == current;

        let stats = StorageStats::collect(self.store.as_ref(), current).await?;
        if !same_mode && stats.has_local_data {
            let request = ConfirmRequest::SwitchMode {
                from: current,
                to: target,
            };
            if !self.gate.confirm(request).await {
                tracing::info!(from = %current, to = %target, "Mode switch cancelled");
                return Ok(SwitchOutcome::Cancelled);
            }
        }

        self.bump_generation();
        self.auth.switch_mode(target).await?;
        self.state.send_modify(|s| s.needs_sync = false);
        self.initialize().await?;

        if same_mode {
            Ok(SwitchOutcome::Unchanged)
        } else {
            Ok(SwitchOutcome::Switched)
        }
    }

    /// Save the user record in the active mode
    pub async fn save_record(&self, record: &UserRecord) -> Result<SaveOutcome> {
        self.ensure_initialized()?;
        let mode = self.auth.mode();
        let outcome = self.storage.save(mode, record).await?;

        self.state.send_modify(|s| {
            s.needs_sync = outcome.needs_sync;
            if outcome.source == DataSource::Server {
                s.is_online = true;
            }
        });
        self.refresh_stats().await?;
        Ok(outcome)
    }

    /// Load the user record in the active mode
    pub async fn load_record(&self) -> Result<LoadOutcome> {
        let mode = self.auth.mode();
        let identity_id = self.auth.current_user().await.map(|user| user.id);
        let outcome = self.storage.load(mode, identity_id.as_deref()).await?;

        if mode == StorageMode::Cloud {
            self.state.send_if_modified(|s| {
                let needs_sync = match outcome.source {
                    DataSource::Server => false,
                    _ => s.needs_sync || outcome.needs_sync,
                };
                let changed = s.needs_sync != needs_sync;
                s.needs_sync = needs_sync;
                changed
            });
        }
        Ok(outcome)
    }

    /// Push the local record to the server
    ///
    /// Local mode: nothing to do. Returns `None` when nothing was synced or
    /// when the result was discarded because the generation moved on.
    pub async fn sync_data(&self) -> Result<Option<SaveOutcome>> {
        self.ensure_initialized()?;
        let generation = self.generation();
        if self.auth.mode() == StorageMode::Local {
            return Ok(None);
        }

        let Some(record) = self.storage.local().load().await?.record else {
            tracing::debug!("Nothing to sync");
            self.state.send_if_modified(|s| std::mem::replace(&mut s.needs_sync, false));
            return Ok(None);
        };

        let outcome = self.storage.cloud().save(&record).await?;

        if self.generation() != generation {
            tracing::debug!(generation, "Discarding sync result from an older generation");
            return Ok(None);
        }

        self.state.send_modify(|s| {
            s.needs_sync = outcome.needs_sync;
            if outcome.source == DataSource::Server {
                s.is_online = true;
            }
        });
        self.refresh_stats().await?;

        if outcome.needs_sync {
            tracing::info!("Sync deferred, server not reachable");
        } else {
            tracing::info!("User record synced");
        }
        Ok(Some(outcome))
    }

    /// Remove every stored user record
    ///
    /// The identity roster and session are kept. In cloud mode the server
    /// copy is deleted best-effort.
    pub async fn clear_all_data(&self) -> Result<ClearOutcome> {
        self.ensure_initialized()?;
        let mode = self.auth.mode();
        if !self.gate.confirm(ConfirmRequest::ClearAllData { mode }).await {
            return Ok(ClearOutcome::Cancelled);
        }

        self.storage.local().clear().await?;
        let remote_deleted = match mode {
            StorageMode::Cloud => self.storage.cloud().delete_remote().await,
            StorageMode::Local => false,
        };

        self.bump_generation();
        self.state.send_modify(|s| s.needs_sync = false);
        self.initialize().await?;

        tracing::info!(%mode, remote_deleted, "All user data cleared");
        Ok(ClearOutcome::Cleared { remote_deleted })
    }

    /// Probe the server and publish the result
    pub async fn check_connectivity(&self) -> bool {
        let is_online = self.probe.check(self.auth.mode()).await;
        self.state
            .send_if_modified(|s| std::mem::replace(&mut s.is_online, is_online) != is_online);
        is_online
    }

    /// Recompute stats without touching the network
    pub async fn refresh_stats(&self) -> Result<StorageStats> {
        let stats = StorageStats::collect(self.store.as_ref(), self.auth.mode()).await?;
        let published = stats.clone();
        self.state.send_if_modified(|s| {
            if s.stats.as_ref() == Some(&published) {
                false
            } else {
                s.stats = Some(published);
                true
            }
        });
        Ok(stats)
    }

    /// Restore the user record from its backup copy
    pub async fn restore_from_backup(&self) -> Result<UserRecord> {
        let record = self.storage.local().restore_from_backup().await?;
        self.refresh_stats().await?;
        Ok(record)
    }

    /// Start the connectivity-poll and auto-sync timers
    pub fn start_timers(self: &Arc<Self>) -> TimerHandle {
        TimerHandle::start(self.clone(), self.poll_interval, self.auto_sync_debounce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::network::RegisterRequest;
    use crate::storage::{keys, MemoryStore};
    use crate::testing::{FakeRemote, ScriptedGate};

    struct Fixture {
        store: Arc<MemoryStore>,
        remote: Arc<FakeRemote>,
        gate: Arc<ScriptedGate>,
        controller: Arc<StorageModeController>,
    }

    async fn fixture(mode: StorageMode, gate: ScriptedGate) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let remote = Arc::new(FakeRemote::new());
        let gate = Arc::new(gate);
        let auth = Arc::new(AuthService::new(
            StorageConfig::for_mode(mode),
            store.clone(),
            remote.clone(),
        ));
        let controller = Arc::new(StorageModeController::new(
            auth,
            store.clone(),
            remote.clone(),
            gate.clone(),
            &SproutConfig::default(),
        ));
        controller.initialize().await.unwrap();
        Fixture {
            store,
            remote,
            gate,
            controller,
        }
    }

    fn alice() -> RegisterRequest {
        RegisterRequest::new("alice@example.com", "secret1", "Alice", "Smith")
    }

    fn record() -> UserRecord {
        UserRecord::new(None, "alice@example.com", "Alice", "Smith")
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let f = fixture(StorageMode::Local, ScriptedGate::always(true)).await;
        let first = f.controller.state();
        let second = f.controller.initialize().await.unwrap();

        assert!(first.is_initialized);
        assert!(first.is_online);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_actions_require_initialize() {
        let store = Arc::new(MemoryStore::new());
        let remote = Arc::new(FakeRemote::new());
        let auth = Arc::new(AuthService::new(StorageConfig::default(), store.clone(), remote.clone()));
        let controller = StorageModeController::new(
            auth,
            store,
            remote,
            Arc::new(AutoConfirm(true)),
            &SproutConfig::default(),
        );

        assert!(matches!(controller.sync_data().await, Err(Error::NotInitialized)));
    }

    #[tokio::test]
    async fn test_switch_same_mode_is_unchanged() {
        let f = fixture(StorageMode::Local, ScriptedGate::always(true)).await;
        assert_eq!(
            f.controller.switch_mode(StorageMode::Local).await.unwrap(),
            SwitchOutcome::Unchanged
        );
        assert!(f.gate.asked().is_empty());
        assert_eq!(f.controller.state().mode, StorageMode::Local);
    }

    #[tokio::test]
    async fn test_switch_same_mode_still_signs_out() {
        let f = fixture(StorageMode::Local, ScriptedGate::always(false)).await;
        f.controller.auth().register(&alice()).await.unwrap();
        f.controller.save_record(&record()).await.unwrap();
        assert!(f.controller.auth().is_authenticated().await);

        let outcome = f.controller.switch_mode(StorageMode::Local).await.unwrap();
        assert_eq!(outcome, SwitchOutcome::Unchanged);
        assert!(f.gate.asked().is_empty());
        assert!(!f.controller.auth().is_authenticated().await);
        assert_eq!(f.store.get(keys::LOCAL_SESSION_TOKEN).await.unwrap(), None);
        assert_eq!(f.controller.auth().mode(), StorageMode::Local);
        assert_eq!(f.controller.state().generation, 1);

        // Data and roster survive.
        assert!(f.controller.load_record().await.unwrap().record.is_some());
        assert_eq!(f.controller.auth().credentials().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_switch_declined_changes_nothing() {
        let f = fixture(StorageMode::Local, ScriptedGate::always(false)).await;
        f.controller.auth().register(&alice()).await.unwrap();
        let before = f.controller.state();

        let outcome = f.controller.switch_mode(StorageMode::Cloud).await.unwrap();
        assert_eq!(outcome, SwitchOutcome::Cancelled);
        assert_eq!(
            f.gate.asked(),
            vec![ConfirmRequest::SwitchMode {
                from: StorageMode::Local,
                to: StorageMode::Cloud
            }]
        );
        assert!(f.controller.auth().is_authenticated().await);
        assert_eq!(f.controller.state().generation, before.generation);
        assert_eq!(f.controller.auth().mode(), StorageMode::Local);
    }

    #[tokio::test]
    async fn test_switch_without_local_data_skips_confirmation() {
        let f = fixture(StorageMode::Local, ScriptedGate::always(false)).await;

        let outcome = f.controller.switch_mode(StorageMode::Cloud).await.unwrap();
        assert_eq!(outcome, SwitchOutcome::Switched);
        assert!(f.gate.asked().is_empty());
        assert_eq!(f.controller.state().mode, StorageMode::Cloud);
    }

    #[tokio::test]
    async fn test_switch_signs_out_and_bumps_generation() {
        let f = fixture(StorageMode::Local, ScriptedGate::always(true)).await;
        f.controller.auth().register(&alice()).await.unwrap();

        let outcome = f.controller.switch_mode(StorageMode::Cloud).await.unwrap();
        assert_eq!(outcome, SwitchOutcome::Switched);
        assert!(!f.controller.auth().is_authenticated().await);

        let state = f.controller.state();
        assert_eq!(state.mode, StorageMode::Cloud);
        assert_eq!(state.generation, 1);
        assert!(!state.needs_sync);
        assert!(state.is_online);
        assert_eq!(f.store.get(keys::LOCAL_SESSION_TOKEN).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_remote_write_then_sync() {
        let f = fixture(StorageMode::Cloud, ScriptedGate::always(true)).await;
        f.controller.auth().register(&alice()).await.unwrap();
        f.remote.set_online(false);

        let outcome = f.controller.save_record(&record()).await.unwrap();
        assert_eq!(outcome.source, DataSource::Cache);
        assert!(outcome.needs_sync);
        assert!(f.controller.state().needs_sync);

        f.remote.set_online(true);
        assert!(f.controller.check_connectivity().await);
        let synced = f.controller.sync_data().await.unwrap().unwrap();
        assert_eq!(synced.source, DataSource::Server);
        assert!(!f.controller.state().needs_sync);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_result_discarded_after_clear() {
        let f = fixture(StorageMode::Cloud, ScriptedGate::always(true)).await;
        f.controller.auth().register(&alice()).await.unwrap();
        f.remote.set_online(false);
        f.controller.save_record(&record()).await.unwrap();
        assert!(f.controller.state().needs_sync);

        // The in-flight sync would report needs_sync = true if it were applied.
        f.remote.set_online(true);
        f.remote.set_reject_writes(true);
        f.remote.set_health_delay(Duration::from_secs(1));

        let health_before = f.remote.health_calls();
        let syncing = tokio::spawn({
            let controller = f.controller.clone();
            async move { controller.sync_data().await }
        });
        while f.remote.health_calls() == health_before {
            tokio::task::yield_now().await;
        }

        let cleared = f.controller.clear_all_data().await.unwrap();
        assert!(matches!(cleared, ClearOutcome::Cleared { .. }));
        let after_clear = f.controller.state();

        assert!(syncing.await.unwrap().unwrap().is_none());

        let state = f.controller.state();
        assert_eq!(state.generation, 1);
        assert!(!state.needs_sync);
        assert_eq!(state.stats, after_clear.stats);
        assert!(f.controller.storage.local().load().await.unwrap().record.is_none());
    }

    #[tokio::test]
    async fn test_sync_is_noop_in_local_mode() {
        let f = fixture(StorageMode::Local, ScriptedGate::always(true)).await;
        f.controller.save_record(&record()).await.unwrap();

        assert!(f.controller.sync_data().await.unwrap().is_none());
        assert_eq!(f.remote.save_calls(), 0);
    }

    #[tokio::test]
    async fn test_clear_keeps_roster_and_session() {
        let f = fixture(StorageMode::Local, ScriptedGate::always(true)).await;
        f.controller.auth().register(&alice()).await.unwrap();
        f.controller.save_record(&record()).await.unwrap();

        let outcome = f.controller.clear_all_data().await.unwrap();
        assert_eq!(outcome, ClearOutcome::Cleared { remote_deleted: false });

        assert_eq!(f.store.get(keys::USER_RECORD).await.unwrap(), None);
        assert_eq!(f.store.get(keys::USER_RECORD_BACKUP).await.unwrap(), None);
        assert_eq!(f.controller.auth().credentials().count().await.unwrap(), 1);
        assert!(f.controller.auth().is_authenticated().await);

        let stats = f.controller.state().stats.unwrap();
        assert_eq!(stats.local_identity_count, 1);
        assert!(stats.last_sync.is_none());
    }

    #[tokio::test]
    async fn test_clear_declined() {
        let f = fixture(StorageMode::Local, ScriptedGate::always(false)).await;
        f.controller.save_record(&record()).await.unwrap();

        assert_eq!(f.controller.clear_all_data().await.unwrap(), ClearOutcome::Cancelled);
        assert!(f.store.get(keys::USER_RECORD).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clear_in_cloud_deletes_remote() {
        let f = fixture(StorageMode::Cloud, ScriptedGate::always(true)).await;
        let session = f.controller.auth().register(&alice()).await.unwrap();
        f.controller.save_record(&record()).await.unwrap();
        assert!(f.remote.stored_record(&session.user.id).is_some());

        let outcome = f.controller.clear_all_data().await.unwrap();
        assert_eq!(outcome, ClearOutcome::Cleared { remote_deleted: true });
        assert!(f.remote.stored_record(&session.user.id).is_none());
    }

    #[tokio::test]
    async fn test_load_record_uses_session_identity() {
        let f = fixture(StorageMode::Cloud, ScriptedGate::always(true)).await;
        let session = f.controller.auth().register(&alice()).await.unwrap();
        let mut on_server = record();
        on_server.first_name = "Server".into();
        f.remote.put_record(&session.user.id, on_server);

        let outcome = f.controller.load_record().await.unwrap();
        assert_eq!(outcome.source, DataSource::Server);
        assert_eq!(outcome.record.unwrap().first_name, "Server");
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let f = fixture(StorageMode::Cloud, ScriptedGate::always(true)).await;
        let mut rx = f.controller.subscribe();
        rx.borrow_and_update();

        f.remote.set_online(false);
        assert!(!f.controller.check_connectivity().await);
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().is_online);

        // Same answer again publishes nothing.
        f.controller.check_connectivity().await;
        assert!(!rx.has_changed().unwrap());
    }
}
