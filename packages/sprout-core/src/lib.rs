//! # Sprout Core
//!
//! Adaptive storage and authentication for the Sprout child-development
//! tracker. The same application runs either fully on the device (local
//! mode) or against a server of record with on-device caching (cloud mode),
//! and a user's session and credentials can move between the two without
//! losing data or duplicating identity.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         SPROUT CORE MODULES                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  Controller                                                     │   │
//! │  │  - observable StorageState     - switch / sync / clear          │   │
//! │  │  - confirmation gate           - poll + auto-sync timers        │   │
//! │  └──────┬──────────────────────────────┬──────────────────┬───────┘   │
//! │         │                              │                  │           │
//! │  ┌──────▼──────┐  ┌────────────────────▼──┐  ┌────────────▼───────┐   │
//! │  │    Auth     │  │       Storage         │  │      Network       │   │
//! │  │             │  │                       │  │                    │   │
//! │  │ - Roster    │  │ - Local persistence   │  │ - Connectivity     │   │
//! │  │ - Tokens    │  │ - Cloud sync          │  │ - RemoteApi        │   │
//! │  │ - Mode      │  │ - KeyValueStore port  │  │ - HTTP (reqwest)   │   │
//! │  │   switch    │  │ - SQLite / memory     │  │                    │   │
//! │  └─────────────┘  └───────────────────────┘  └────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐                     │
//! │  │  Classify   │  │   Config    │  │    Error    │                     │
//! │  │ user-facing │  │ modes, env  │  │ codes and   │                     │
//! │  │ messages    │  │ settings    │  │ kinds       │                     │
//! │  └─────────────┘  └─────────────┘  └─────────────┘                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error type shared by every module
//! - [`classify`] - Maps failures to user-facing messages and actions
//! - [`config`] - Storage mode and process configuration
//! - [`storage`] - Key-value port, local and cloud record persistence
//! - [`network`] - Connectivity probe and the server API
//! - [`auth`] - Credential roster, session tokens, mode switch
//! - [`controller`] - Observable state, actions and background timers
//! - [`testing`] - In-process fakes for hosts and tests
//!
//! ## Modes
//!
//! | Mode  | Source of record | Sessions              | Network        |
//! |-------|------------------|-----------------------|----------------|
//! | Local | this device      | self-issued, unsigned | never          |
//! | Cloud | the server       | server bearer token   | probe + mirror |

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod auth;
pub mod classify;
pub mod config;
pub mod controller;
pub mod error;
pub mod network;
pub mod storage;
pub mod testing;
pub mod time;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use auth::{AuthService, AuthSession, SessionToken, SessionUser};
pub use classify::{classify, ErrorKind, Locale, RawError, UnifiedError};
pub use config::{SproutConfig, StorageConfig, StorageMode};
pub use controller::{
    AutoConfirm, ClearOutcome, ConfirmRequest, ConfirmationGate, StorageModeController,
    StorageState, SwitchOutcome,
};
pub use error::{Error, Result};
pub use network::{HttpRemote, RegisterRequest, RemoteApi};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore, UserRecord};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Returns the version of Sprout Core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
