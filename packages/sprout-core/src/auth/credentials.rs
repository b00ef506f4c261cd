//! # Local Credential Store
//!
//! The roster of identities registered on this device, held as a JSON array
//! under `local-identity-roster`.
//!
//! ## Password Hashing
//!
//! ```text
//! current:  sha256$<salt hex>$<hex(SHA-256(salt || password))>
//! legacy:   <hex(SHA-256(password || LEGACY_SALT))>
//! ```
//!
//! New identities always get a random 16-byte salt. The legacy format is
//! only ever verified, never produced, so rosters written by older builds
//! keep signing in.

use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::storage::{get_json, keys, set_json, KeyValueStore};

const HASH_SCHEME: &str = "sha256";
const SALT_LEN: usize = 16;
const LEGACY_SALT: &str = "sprout-local-salt";

/// A locally registered identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalIdentity {
    /// `local_<millis>_<suffix>`
    pub id: String,
    /// Email address as entered
    pub email: String,
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: String,
    /// Salted password digest
    pub password_hash: String,
    /// RFC 3339 creation time
    pub created_at: String,
    /// RFC 3339 time of the last successful login
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<String>,
}

impl LocalIdentity {
    /// Build a new identity with a fresh id and salted hash
    pub fn new(email: &str, password: &str, first_name: &str, last_name: &str) -> Self {
        Self {
            id: generate_local_id(),
            email: email.trim().to_string(),
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            password_hash: hash_password(password),
            created_at: crate::time::now_rfc3339(),
            last_login: None,
        }
    }

    /// Check a password against the stored hash
    pub fn verify_password(&self, password: &str) -> bool {
        verify_password(password, &self.password_hash)
    }
}

/// Generate a local identity id
///
/// Time-based with a random suffix, so ids are unique across devices and
/// never collide with server-assigned ids.
pub fn generate_local_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect();
    format!("local_{}_{}", crate::time::now_timestamp_millis(), suffix)
}

/// Hash a password with a random salt
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    format!("{}${}${}", HASH_SCHEME, hex::encode(salt), salted_digest(&salt, password))
}

/// Verify a password against either hash format
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(HASH_SCHEME), Some(salt_hex), Some(digest)) => match hex::decode(salt_hex) {
            Ok(salt) => salted_digest(&salt, password) == digest,
            Err(_) => false,
        },
        (Some(legacy), None, None) => legacy_digest(password) == legacy,
        _ => false,
    }
}

fn salted_digest(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn legacy_digest(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(LEGACY_SALT.as_bytes());
    hex::encode(hasher.finalize())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ============================================================================
// CREDENTIAL STORE
// ============================================================================

/// Roster of locally registered identities
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    /// Create a credential store over a key-value store
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// All identities in registration order
    pub async fn list(&self) -> Result<Vec<LocalIdentity>> {
        Ok(get_json(self.store.as_ref(), keys::LOCAL_IDENTITY_ROSTER)
            .await?
            .unwrap_or_default())
    }

    /// Number of registered identities
    pub async fn count(&self) -> Result<usize> {
        Ok(self.list().await?.len())
    }

    /// Find an identity by email (case-insensitive, trimmed)
    pub async fn find_by_email(&self, email: &str) -> Result<Option<LocalIdentity>> {
        let wanted = normalize_email(email);
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|identity| normalize_email(&identity.email) == wanted))
    }

    /// Append an identity
    ///
    /// Fails with `EmailExists` and leaves the roster untouched when the
    /// email is already registered.
    pub async fn insert(&self, identity: LocalIdentity) -> Result<()> {
        let mut roster = self.list().await?;
        let wanted = normalize_email(&identity.email);
        if roster.iter().any(|existing| normalize_email(&existing.email) == wanted) {
            return Err(Error::EmailExists);
        }

        tracing::info!(id = %identity.id, "Registered local identity");
        roster.push(identity);
        set_json(self.store.as_ref(), keys::LOCAL_IDENTITY_ROSTER, &roster).await
    }

    /// Look up an identity and check its password
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn verify(&self, email: &str, password: &str) -> Result<LocalIdentity> {
        match self.find_by_email(email).await? {
            Some(identity) if identity.verify_password(password) => Ok(identity),
            _ => Err(Error::InvalidCredentials),
        }
    }

    /// Record a successful login
    pub async fn touch_last_login(&self, id: &str) -> Result<()> {
        let mut roster = self.list().await?;
        let identity = roster
            .iter_mut()
            .find(|identity| identity.id == id)
            .ok_or_else(|| Error::Internal(format!("identity {} not in roster", id)))?;
        identity.last_login = Some(crate::time::now_rfc3339());
        set_json(self.store.as_ref(), keys::LOCAL_IDENTITY_ROSTER, &roster).await
    }
}
