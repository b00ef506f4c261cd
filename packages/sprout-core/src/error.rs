//! # Error Handling
//!
//! This module provides the error type shared by every Sprout Core module.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Core Errors (100)                                                 │
//! │  │   └── NotInitialized        - Controller not initialized            │
//! │  │                                                                      │
//! │  ├── Auth Errors (200)                                                 │
//! │  │   ├── EmailExists           - Email already registered              │
//! │  │   ├── InvalidCredentials    - Unknown email or wrong password       │
//! │  │   ├── NotAuthenticated      - No session for the active mode        │
//! │  │   ├── InvalidToken          - Token malformed or from other mode    │
//! │  │   └── Validation            - Rejected input                        │
//! │  │                                                                      │
//! │  ├── Storage Errors (400)                                              │
//! │  │   ├── StorageReadError      - Failed to read a key                  │
//! │  │   ├── StorageWriteError     - Failed to write a key                 │
//! │  │   ├── StorageCorrupted      - Stored payload does not parse         │
//! │  │   ├── DatabaseError         - SQLite failure                        │
//! │  │   └── NoData                - No record locally or remotely         │
//! │  │                                                                      │
//! │  ├── Network Errors (500)                                              │
//! │  │   ├── NotConnected          - Remote unreachable                    │
//! │  │   ├── Timeout               - Request timed out                     │
//! │  │   ├── TransportError        - Transport-level failure               │
//! │  │   ├── RemoteStatus          - Remote answered with an error status  │
//! │  │   └── ProtocolError         - Unexpected response body              │
//! │  │                                                                      │
//! │  └── Internal Errors (900)                                             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant maps to an [`ErrorKind`] at the point it is created, so
//! callers and the classifier never have to inspect message text to learn
//! what went wrong.

use thiserror::Error;

use crate::classify::ErrorKind;

/// Result type alias for Sprout Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Sprout Core
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Core Lifecycle Errors (100-199)
    // ========================================================================

    /// The controller has not been initialized yet
    #[error("Storage controller has not been initialized. Call initialize() first.")]
    NotInitialized,

    // ========================================================================
    // Auth Errors (200-299)
    // ========================================================================

    /// The email is already present in the identity roster
    #[error("An account with this email already exists.")]
    EmailExists,

    /// Unknown email or password mismatch
    #[error("Invalid email or password.")]
    InvalidCredentials,

    /// No session exists for the active mode
    #[error("Not signed in.")]
    NotAuthenticated,

    /// A stored token is malformed or belongs to the other mode
    #[error("Invalid session token: {0}")]
    InvalidToken(String),

    /// Input rejected before reaching storage or the remote
    #[error("Validation failed: {0}")]
    Validation(String),

    // ========================================================================
    // Storage Errors (400-499)
    // ========================================================================

    /// Failed to read from storage
    #[error("Failed to read from storage: {0}")]
    StorageReadError(String),

    /// Failed to write to storage
    #[error("Failed to write to storage: {0}")]
    StorageWriteError(String),

    /// Stored payload could not be decoded
    #[error("Stored data is corrupted: {0}")]
    StorageCorrupted(String),

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// No user record exists locally or remotely
    #[error("No user data found locally or on the server.")]
    NoData,

    // ========================================================================
    // Network Errors (500-599)
    // ========================================================================

    /// The remote could not be reached
    #[error("Not connected to the server.")]
    NotConnected,

    /// Operation timed out
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Transport error
    #[error("Transport error: {0}")]
    TransportError(String),

    /// The remote answered with a non-success status
    #[error("Server returned {status}: {message}")]
    RemoteStatus {
        /// HTTP status code
        status: u16,
        /// Message extracted from the response body
        message: String,
    },

    /// The remote answered with a body we could not understand
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl Error {
    /// Get the numeric error code
    ///
    /// Error codes are organized by category:
    /// - 100-199: Core lifecycle
    /// - 200-299: Auth
    /// - 400-499: Storage
    /// - 500-599: Network
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            // Core (100-199)
            Error::NotInitialized => 100,

            // Auth (200-299)
            Error::EmailExists => 200,
            Error::InvalidCredentials => 201,
            Error::NotAuthenticated => 202,
            Error::InvalidToken(_) => 203,
            Error::Validation(_) => 204,

            // Storage (400-499)
            Error::StorageReadError(_) => 400,
            Error::StorageWriteError(_) => 401,
            Error::StorageCorrupted(_) => 402,
            Error::DatabaseError(_) => 403,
            Error::NoData => 404,

            // Network (500-599)
            Error::NotConnected => 500,
            Error::Timeout(_) => 501,
            Error::TransportError(_) => 502,
            Error::RemoteStatus { .. } => 503,
            Error::ProtocolError(_) => 504,

            // Internal (900-999)
            Error::Internal(_) => 900,
            Error::SerializationError(_) => 901,
        }
    }

    /// The taxonomy member this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::EmailExists => ErrorKind::EmailExists,
            Error::InvalidCredentials | Error::NotAuthenticated | Error::InvalidToken(_) => {
                ErrorKind::InvalidCredentials
            }
            Error::Validation(_) => ErrorKind::ValidationError,

            // Local storage failures surface like a server fault.
            Error::StorageReadError(_)
            | Error::StorageWriteError(_)
            | Error::StorageCorrupted(_)
            | Error::DatabaseError(_)
            | Error::SerializationError(_) => ErrorKind::ServerError,

            Error::NotConnected | Error::Timeout(_) | Error::TransportError(_) => {
                ErrorKind::NetworkError
            }
            Error::RemoteStatus { status, .. } => ErrorKind::from_status(*status),
            Error::ProtocolError(_) => ErrorKind::ServerError,

            Error::NotInitialized | Error::NoData | Error::Internal(_) => ErrorKind::Generic,
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors can potentially be resolved by retrying once
    /// connectivity returns.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::NotConnected | Error::Timeout(_) | Error::TransportError(_)
        ) || matches!(self, Error::RemoteStatus { status, .. } if *status >= 500)
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout(err.to_string())
        } else if err.is_connect() {
            Error::NotConnected
        } else if let Some(status) = err.status() {
            Error::RemoteStatus {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            Error::ProtocolError(err.to_string())
        } else {
            Error::TransportError(err.to_string())
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::NotInitialized.code(), 100);
        assert_eq!(Error::EmailExists.code(), 200);
        assert_eq!(Error::StorageReadError("test".into()).code(), 400);
        assert_eq!(Error::NotConnected.code(), 500);
        assert_eq!(Error::Internal("test".into()).code(), 900);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::EmailExists.kind(), ErrorKind::EmailExists);
        assert_eq!(Error::InvalidCredentials.kind(), ErrorKind::InvalidCredentials);
        assert_eq!(
            Error::InvalidToken("cloud token in local mode".into()).kind(),
            ErrorKind::InvalidCredentials
        );
        assert_eq!(Error::Validation("email".into()).kind(), ErrorKind::ValidationError);
        assert_eq!(Error::StorageWriteError("quota".into()).kind(), ErrorKind::ServerError);
        assert_eq!(Error::Timeout("health".into()).kind(), ErrorKind::NetworkError);
        assert_eq!(
            Error::RemoteStatus { status: 404, message: "missing".into() }.kind(),
            ErrorKind::ServerUnavailable
        );
        assert_eq!(Error::NoData.kind(), ErrorKind::Generic);
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(Error::Timeout("test".into()).is_recoverable());
        assert!(Error::NotConnected.is_recoverable());
        assert!(Error::RemoteStatus { status: 503, message: String::new() }.is_recoverable());
        assert!(!Error::RemoteStatus { status: 401, message: String::new() }.is_recoverable());
        assert!(!Error::InvalidCredentials.is_recoverable());
    }

    #[test]
    fn test_json_error_conversion() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert_eq!(err.code(), 901);
        assert_eq!(err.kind(), ErrorKind::ServerError);
    }
}
