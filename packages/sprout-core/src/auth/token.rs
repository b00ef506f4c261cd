//! # Session Tokens
//!
//! Two token types that never convert into each other:
//!
//! ```text
//! ┌──────────────────────────────┐     ┌──────────────────────────────┐
//! │  LocalSessionCapability      │     │  BearerToken                 │
//! ├──────────────────────────────┤     ├──────────────────────────────┤
//! │ "local." + base64url(claims) │     │ issued by the server         │
//! │ claims: sub, email, mode,    │     │ stored verbatim              │
//! │         iat                  │     │ sent as Authorization header │
//! │ unsigned, never leaves the   │     │                              │
//! │ device                       │     │                              │
//! └──────────────────────────────┘     └──────────────────────────────┘
//! ```
//!
//! A local capability carries no integrity protection. It only proves that
//! this device's credential store accepted a password, and must never be
//! sent to a server or treated as equivalent to a bearer token.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::config::StorageMode;
use crate::error::{Error, Result};

const LOCAL_PREFIX: &str = "local.";

/// Claims encoded inside a local capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalClaims {
    /// Local identity id
    pub sub: String,
    /// Email at issue time
    pub email: String,
    /// Always `"local"`
    pub mode: StorageMode,
    /// Issue time, unix milliseconds
    pub iat: i64,
}

/// Self-issued local-mode session token
#[derive(Clone, PartialEq, Eq)]
pub struct LocalSessionCapability {
    raw: String,
    claims: LocalClaims,
}

impl LocalSessionCapability {
    /// Mint a capability for a local identity
    pub fn issue(identity_id: &str, email: &str) -> Result<Self> {
        let claims = LocalClaims {
            sub: identity_id.to_string(),
            email: email.to_string(),
            mode: StorageMode::Local,
            iat: crate::time::now_timestamp_millis(),
        };
        let payload = serde_json::to_vec(&claims)?;
        let raw = format!("{}{}", LOCAL_PREFIX, URL_SAFE_NO_PAD.encode(payload));
        Ok(Self { raw, claims })
    }

    /// Parse a stored capability
    pub fn parse(raw: &str) -> Result<Self> {
        let encoded = raw
            .strip_prefix(LOCAL_PREFIX)
            .ok_or_else(|| Error::InvalidToken("not a local session token".into()))?;
        let payload = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| Error::InvalidToken(format!("bad encoding: {}", e)))?;
        let claims: LocalClaims = serde_json::from_slice(&payload)
            .map_err(|e| Error::InvalidToken(format!("bad claims: {}", e)))?;
        if claims.mode != StorageMode::Local {
            return Err(Error::InvalidToken("claims are not for local mode".into()));
        }
        Ok(Self {
            raw: raw.to_string(),
            claims,
        })
    }

    /// Decoded claims
    pub fn claims(&self) -> &LocalClaims {
        &self.claims
    }

    /// Encoded form as persisted
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Debug for LocalSessionCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSessionCapability")
            .field("sub", &self.claims.sub)
            .field("iat", &self.claims.iat)
            .finish()
    }
}

/// Server-issued bearer token
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Wrap a token received from the server
    ///
    /// The server's format is opaque; only empty strings are rejected.
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(Error::InvalidToken("empty bearer token".into()));
        }
        Ok(Self(raw))
    }

    /// Token as sent on the wire
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// A session token tagged with the mode that issued it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionToken {
    /// Local-mode capability
    Local(LocalSessionCapability),
    /// Cloud-mode bearer token
    Cloud(BearerToken),
}

impl SessionToken {
    /// Parse a stored token, requiring it to belong to `mode`
    pub fn parse(mode: StorageMode, raw: &str) -> Result<Self> {
        match mode {
            StorageMode::Local => LocalSessionCapability::parse(raw).map(SessionToken::Local),
            StorageMode::Cloud => {
                if LocalSessionCapability::parse(raw).is_ok() {
                    return Err(Error::InvalidToken(
                        "local session token cannot be used as a bearer token".into(),
                    ));
                }
                BearerToken::new(raw).map(SessionToken::Cloud)
            }
        }
    }

    /// The mode this token belongs to
    pub fn mode(&self) -> StorageMode {
        match self {
            SessionToken::Local(_) => StorageMode::Local,
            SessionToken::Cloud(_) => StorageMode::Cloud,
        }
    }

    /// Encoded form as persisted
    pub fn as_str(&self) -> &str {
        match self {
            SessionToken::Local(capability) => capability.as_str(),
            SessionToken::Cloud(bearer) => bearer.as_str(),
        }
    }

    /// The bearer token, if this is a cloud session
    pub fn bearer(&self) -> Option<&BearerToken> {
        match self {
            SessionToken::Cloud(bearer) => Some(bearer),
            SessionToken::Local(_) => None,
        }
    }
}
