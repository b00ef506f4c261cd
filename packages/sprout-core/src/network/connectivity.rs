//! # Connectivity Probe
//!
//! Answers "is the server reachable right now?". In local mode the answer
//! is always yes and no request is made. In cloud mode a single
//! `GET /health` is issued, bounded by a timeout; any error, timeout or
//! non-success status means unreachable. There are no retries.

use std::sync::Arc;
use std::time::Duration;

use super::RemoteApi;
use crate::config::{StorageMode, DEFAULT_HEALTH_TIMEOUT};

/// Reachability probe
#[derive(Clone)]
pub struct ConnectivityProbe {
    remote: Arc<dyn RemoteApi>,
    timeout: Duration,
}

impl ConnectivityProbe {
    /// Create a probe with the default timeout
    pub fn new(remote: Arc<dyn RemoteApi>) -> Self {
        Self::with_timeout(remote, DEFAULT_HEALTH_TIMEOUT)
    }

    /// Create a probe with a custom timeout
    pub fn with_timeout(remote: Arc<dyn RemoteApi>, timeout: Duration) -> Self {
        Self { remote, timeout }
    }

    /// Check reachability for the given mode
    pub async fn check(&self, mode: StorageMode) -> bool {
        if mode == StorageMode::Local {
            return true;
        }

        match tokio::time::timeout(self.timeout, self.remote.health()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "Health check failed");
                false
            }
            Err(_) => {
                tracing::debug!(timeout_ms = self.timeout.as_millis() as u64, "Health check timed out");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRemote;

    #[tokio::test]
    async fn test_local_mode_never_calls_remote() {
        let remote = Arc::new(FakeRemote::new());
        remote.set_online(false);
        let probe = ConnectivityProbe::new(remote.clone());

        assert!(probe.check(StorageMode::Local).await);
        assert_eq!(remote.health_calls(), 0);
    }

    #[tokio::test]
    async fn test_cloud_mode_reflects_health() {
        let remote = Arc::new(FakeRemote::new());
        let probe = ConnectivityProbe::new(remote.clone());

        assert!(probe.check(StorageMode::Cloud).await);
        remote.set_online(false);
        assert!(!probe.check(StorageMode::Cloud).await);
        assert_eq!(remote.health_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_health_counts_as_offline() {
        let remote = Arc::new(FakeRemote::new());
        remote.set_health_delay(Duration::from_secs(10));
        let probe = ConnectivityProbe::with_timeout(remote, Duration::from_secs(5));

        assert!(!probe.check(StorageMode::Cloud).await);
    }
}
