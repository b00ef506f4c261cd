//! # Configuration
//!
//! Two layers of configuration live here:
//!
//! - [`SproutConfig`]: process settings (server URL, timer periods, default
//!   mode). Built from defaults or from environment variables.
//! - [`StorageConfig`]: the per-device operating mode, derived once at
//!   startup from the persisted `storage-mode-preference` key and mutated
//!   only by the mode-switch procedure.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::storage::{keys, KeyValueStore};

/// Default server base URL
pub const DEFAULT_API_URL: &str = "http://localhost:3001";

/// Default bound on the `/health` reachability request
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Default connectivity poll period while in cloud mode
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Default debounce before an automatic sync
pub const DEFAULT_AUTO_SYNC_DEBOUNCE: Duration = Duration::from_secs(5);

// ============================================================================
// STORAGE MODE
// ============================================================================

/// The active operating configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// All data stays on the device
    #[default]
    Local,
    /// The server is the source of record, the device caches
    Cloud,
}

impl StorageMode {
    /// String form used in the persisted preference
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageMode::Local => "local",
            StorageMode::Cloud => "cloud",
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(StorageMode::Local),
            "cloud" => Ok(StorageMode::Cloud),
            other => Err(Error::Validation(format!("unknown storage mode: {other}"))),
        }
    }
}

/// Per-device storage configuration
///
/// `offline_mode` and `sync_enabled` are derived from `mode`; the only way to
/// build one is [`StorageConfig::for_mode`], so they cannot disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StorageConfig {
    mode: StorageMode,
    offline_mode: bool,
    sync_enabled: bool,
}

impl StorageConfig {
    /// Configuration for a given mode
    pub fn for_mode(mode: StorageMode) -> Self {
        Self {
            mode,
            offline_mode: mode == StorageMode::Local,
            sync_enabled: mode == StorageMode::Cloud,
        }
    }

    /// Derive the configuration from the persisted preference
    ///
    /// A missing or unreadable preference falls back to `fallback`.
    pub async fn load(store: &dyn KeyValueStore, fallback: StorageMode) -> Self {
        let mode = match store.get(keys::STORAGE_MODE_PREFERENCE).await {
            Ok(Some(raw)) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Ignoring unreadable storage mode preference");
                fallback
            }),
            Ok(None) => fallback,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read storage mode preference");
                fallback
            }
        };
        Self::for_mode(mode)
    }

    /// The active mode
    pub fn mode(&self) -> StorageMode {
        self.mode
    }

    /// True when no server participates
    pub fn offline_mode(&self) -> bool {
        self.offline_mode
    }

    /// True when writes are mirrored to the server
    pub fn sync_enabled(&self) -> bool {
        self.sync_enabled
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::for_mode(StorageMode::default())
    }
}

// ============================================================================
// PROCESS CONFIGURATION
// ============================================================================

/// Configuration for a Sprout core instance
#[derive(Debug, Clone)]
pub struct SproutConfig {
    /// Base URL of the server of record
    pub api_url: String,
    /// Mode used when no preference has been persisted yet
    pub default_mode: StorageMode,
    /// Bound on the `/health` reachability request
    pub health_timeout: Duration,
    /// Connectivity poll period while in cloud mode
    pub connectivity_poll_interval: Duration,
    /// Debounce before an automatic sync
    pub auto_sync_debounce: Duration,
    /// Set by the host when it detects a test environment
    pub test_mode: bool,
}

impl Default for SproutConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            default_mode: StorageMode::Local,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            connectivity_poll_interval: DEFAULT_POLL_INTERVAL,
            auto_sync_debounce: DEFAULT_AUTO_SYNC_DEBOUNCE,
            test_mode: false,
        }
    }
}

impl SproutConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            api_url: env::var("SPROUT_API_URL").unwrap_or(defaults.api_url),
            default_mode: env::var("SPROUT_DEFAULT_MODE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_mode),
            health_timeout: env_duration("SPROUT_HEALTH_TIMEOUT_MS", Duration::from_millis)
                .unwrap_or(defaults.health_timeout),
            connectivity_poll_interval: env_duration(
                "SPROUT_POLL_INTERVAL_SECS",
                Duration::from_secs,
            )
            .unwrap_or(defaults.connectivity_poll_interval),
            auto_sync_debounce: env_duration("SPROUT_AUTO_SYNC_SECS", Duration::from_secs)
                .unwrap_or(defaults.auto_sync_debounce),
            test_mode: env::var("SPROUT_TEST_MODE")
                .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.test_mode),
        }
    }

    /// Mode to use when nothing has been persisted
    ///
    /// Test environments never talk to a server unless told to.
    pub fn fallback_mode(&self) -> StorageMode {
        if self.test_mode {
            StorageMode::Local
        } else {
            self.default_mode
        }
    }
}

fn env_duration(name: &str, unit: fn(u64) -> Duration) -> Option<Duration> {
    env::var(name).ok()?.trim().parse::<u64>().ok().map(unit)
}

// ============================================================================
// TESTS
// ============================================================================
