//! # Authentication Module
//!
//! Mode-aware sign-in. In local mode identities live in the on-device
//! [`CredentialStore`] and sessions carry a self-issued
//! [`LocalSessionCapability`]. In cloud mode the server authenticates and
//! issues a [`BearerToken`].
//!
//! ## Session State Machine
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SESSION LIFECYCLE                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │                 login / register                                        │
//! │   ┌───────────┐ ──────────────────────►  ┌─────────────────────┐        │
//! │   │ SignedOut │                          │ SignedIn(mode)      │        │
//! │   └───────────┘ ◄──────────────────────  └─────────────────────┘        │
//! │                 logout / switch_mode                                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Session Keys
//!
//! | Mode  | Token key             | Identity key              |
//! |-------|-----------------------|---------------------------|
//! | Local | `local-session-token` | `local-session-identity`  |
//! | Cloud | `remote-session-token`| `remote-session-identity` |
//!
//! Switching mode always clears the keys of both modes before the new
//! preference is persisted, so a token from one mode is never visible
//! once the mode has changed.

mod credentials;
mod token;

pub use credentials::{
    generate_local_id, hash_password, verify_password, CredentialStore, LocalIdentity,
};
pub use token::{BearerToken, LocalClaims, LocalSessionCapability, SessionToken};

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::{StorageConfig, StorageMode};
use crate::error::{Error, Result};
use crate::network::{AuthResponse, LoginRequest, RegisterRequest, RemoteApi};
use crate::storage::{get_json, keys, set_json, KeyValueStore};

/// Minimum password length accepted at registration
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Redacted identity persisted alongside a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    /// Local or server-assigned id
    pub id: String,
    /// Email address
    pub email: String,
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: String,
    /// Mode the session was opened in
    pub mode: StorageMode,
}

impl From<&LocalIdentity> for SessionUser {
    fn from(identity: &LocalIdentity) -> Self {
        Self {
            id: identity.id.clone(),
            email: identity.email.clone(),
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            mode: StorageMode::Local,
        }
    }
}

/// A successful sign-in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    /// Who signed in
    pub user: SessionUser,
    /// The token now stored for the session
    pub token: SessionToken,
}

fn session_keys(mode: StorageMode) -> (&'static str, &'static str) {
    match mode {
        StorageMode::Local => (keys::LOCAL_SESSION_TOKEN, keys::LOCAL_SESSION_IDENTITY),
        StorageMode::Cloud => (keys::REMOTE_SESSION_TOKEN, keys::REMOTE_SESSION_IDENTITY),
    }
}

/// Reject malformed registration input before it reaches any store
fn validate_registration(request: &RegisterRequest) -> Result<()> {
    validate_email(&request.email)?;

    if request.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(Error::Validation(format!(
            "Password too short: min {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    if request.first_name.trim().is_empty() || request.last_name.trim().is_empty() {
        return Err(Error::Validation("First and last name are required".into()));
    }

    Ok(())
}

fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(Error::Validation(format!("Invalid email address: {}", email)))
    }
}

/// Remote auth failures with a well-known status become typed errors
fn map_remote_auth_error(err: Error) -> Error {
    match err {
        Error::RemoteStatus { status: 409, .. } => Error::EmailExists,
        Error::RemoteStatus { status: 401, .. } => Error::InvalidCredentials,
        Error::RemoteStatus { status: 400, message } => Error::Validation(message),
        other => other,
    }
}

// ============================================================================
// AUTH SERVICE
// ============================================================================

/// Routes authentication by the active storage mode
///
/// Owns the in-memory [`StorageConfig`] and the mode-switch procedure.
pub struct AuthService {
    config: RwLock<StorageConfig>,
    store: Arc<dyn KeyValueStore>,
    remote: Arc<dyn RemoteApi>,
    credentials: CredentialStore,
}

impl AuthService {
    /// Create a service with an explicit configuration
    pub fn new(
        config: StorageConfig,
        store: Arc<dyn KeyValueStore>,
        remote: Arc<dyn RemoteApi>,
    ) -> Self {
        Self {
            config: RwLock::new(config),
            credentials: CredentialStore::new(store.clone()),
            store,
            remote,
        }
    }

    /// Create a service, deriving the configuration from the stored preference
    pub async fn load(
        store: Arc<dyn KeyValueStore>,
        remote: Arc<dyn RemoteApi>,
        fallback: StorageMode,
    ) -> Self {
        let config = StorageConfig::load(store.as_ref(), fallback).await;
        tracing::info!(mode = %config.mode(), "Storage configuration loaded");
        Self::new(config, store, remote)
    }

    /// Current configuration
    pub fn config(&self) -> StorageConfig {
        *self.config.read()
    }

    /// Current mode
    pub fn mode(&self) -> StorageMode {
        self.config.read().mode()
    }

    /// The local identity roster
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    // ------------------------------------------------------------------------
    // Register / login / logout
    // ------------------------------------------------------------------------

    /// Register a new identity and sign it in
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthSession> {
        validate_registration(request)?;

        match self.mode() {
            StorageMode::Local => {
                let identity = LocalIdentity::new(
                    &request.email,
                    &request.password,
                    &request.first_name,
                    &request.last_name,
                );
                self.credentials.insert(identity).await?;
                self.login(&request.email, &request.password).await
            }
            StorageMode::Cloud => {
                let response = self
                    .remote
                    .register(request)
                    .await
                    .map_err(map_remote_auth_error)?;
                self.adopt_remote_session(response).await
            }
        }
    }

    /// Sign in with email and password
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(Error::Validation("Email and password are required".into()));
        }

        match self.mode() {
            StorageMode::Local => {
                let identity = self.credentials.verify(email, password).await.map_err(|e| {
                    tracing::info!("Local login rejected");
                    e
                })?;

                let capability = LocalSessionCapability::issue(&identity.id, &identity.email)?;
                let session = AuthSession {
                    user: SessionUser::from(&identity),
                    token: SessionToken::Local(capability),
                };
                self.persist_session(&session).await?;
                self.credentials.touch_last_login(&identity.id).await?;

                tracing::info!(id = %identity.id, "Signed in locally");
                Ok(session)
            }
            StorageMode::Cloud => {
                let request = LoginRequest {
                    email: email.trim().to_string(),
                    password: password.to_string(),
                };
                let response = self
                    .remote
                    .login(&request)
                    .await
                    .map_err(map_remote_auth_error)?;
                self.adopt_remote_session(response).await
            }
        }
    }

    /// End the session of the active mode
    ///
    /// The identity roster is never touched. In cloud mode the server is
    /// told first, and its failure is logged and ignored.
    pub async fn logout(&self) -> Result<()> {
        let mode = self.mode();

        if mode == StorageMode::Cloud {
            if let Some(SessionToken::Cloud(bearer)) = self.current_token().await {
                if let Err(e) = self.remote.logout(&bearer).await {
                    tracing::warn!(error = %e, "Remote logout failed");
                }
            }
        }

        self.clear_session(mode).await?;
        tracing::info!(%mode, "Signed out");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Mode switch
    // ------------------------------------------------------------------------

    /// Switch the operating mode
    ///
    /// Signs out, clears every session key of both modes, then persists the
    /// new preference and updates the in-memory configuration. Callers are
    /// expected to re-initialize anything derived from the old mode.
    pub async fn switch_mode(&self, new_mode: StorageMode) -> Result<()> {
        let old_mode = self.mode();

        if let Err(e) = self.logout().await {
            tracing::warn!(error = %e, "Logout during mode switch failed");
        }
        self.clear_session(StorageMode::Local).await?;
        self.clear_session(StorageMode::Cloud).await?;

        self.store
            .set(keys::STORAGE_MODE_PREFERENCE, new_mode.as_str())
            .await?;
        *self.config.write() = StorageConfig::for_mode(new_mode);

        tracing::info!(from = %old_mode, to = %new_mode, "Storage mode switched");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Session reads
    // ------------------------------------------------------------------------

    /// True when a valid token and identity exist for the active mode
    pub async fn is_authenticated(&self) -> bool {
        self.current_token().await.is_some() && self.current_user().await.is_some()
    }

    /// The signed-in identity for the active mode
    pub async fn current_user(&self) -> Option<SessionUser> {
        let mode = self.mode();
        let (_, identity_key) = session_keys(mode);
        match get_json::<SessionUser>(self.store.as_ref(), identity_key).await {
            Ok(Some(user)) if user.mode == mode => Some(user),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable session identity");
                None
            }
        }
    }

    /// The session token for the active mode
    ///
    /// A token in the other mode's format counts as absent.
    pub async fn current_token(&self) -> Option<SessionToken> {
        let mode = self.mode();
        let (token_key, _) = session_keys(mode);
        let raw = match self.store.get(token_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read session token");
                return None;
            }
        };
        match SessionToken::parse(mode, &raw) {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::warn!(error = %e, %mode, "Ignoring session token from another mode");
                None
            }
        }
    }

    // ------------------------------------------------------------------------
    // Internal
    // ------------------------------------------------------------------------

    async fn adopt_remote_session(&self, response: AuthResponse) -> Result<AuthSession> {
        let bearer = BearerToken::new(response.token)?;
        let session = AuthSession {
            user: SessionUser {
                id: response.user.id,
                email: response.user.email,
                first_name: response.user.first_name,
                last_name: response.user.last_name,
                mode: StorageMode::Cloud,
            },
            token: SessionToken::Cloud(bearer),
        };
        self.persist_session(&session).await?;

        tracing::info!(id = %session.user.id, "Signed in to cloud");
        Ok(session)
    }

    async fn persist_session(&self, session: &AuthSession) -> Result<()> {
        let (token_key, identity_key) = session_keys(session.token.mode());
        self.store.set(token_key, session.token.as_str()).await?;
        set_json(self.store.as_ref(), identity_key, &session.user).await
    }

    async fn clear_session(&self, mode: StorageMode) -> Result<()> {
        let (token_key, identity_key) = session_keys(mode);
        self.store.remove(token_key).await?;
        self.store.remove(identity_key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::testing::FakeRemote;

    fn service(mode: StorageMode) -> (AuthService, Arc<MemoryStore>, Arc<FakeRemote>) {
        let store = Arc::new(MemoryStore::new());
        let remote = Arc::new(FakeRemote::new());
        let auth = AuthService::new(StorageConfig::for_mode(mode), store.clone(), remote.clone());
        (auth, store, remote)
    }

    fn alice() -> RegisterRequest {
        RegisterRequest::new("alice@example.com", "secret1", "Alice", "Smith")
    }

    #[tokio::test]
    async fn test_local_register_signs_in() {
        let (auth, _, _) = service(StorageMode::Local);

        let session = auth.register(&alice()).await.unwrap();
        assert_eq!(session.user.mode, StorageMode::Local);
        assert!(session.user.id.starts_with("local_"));
        assert!(matches!(session.token, SessionToken::Local(_)));
        assert!(auth.is_authenticated().await);
        assert_eq!(auth.current_user().await, Some(session.user));
    }

    #[tokio::test]
    async fn test_duplicate_registration_leaves_roster_unchanged() {
        let (auth, _, _) = service(StorageMode::Local);
        auth.register(&alice()).await.unwrap();

        let err = auth.register(&alice()).await.unwrap_err();
        assert!(matches!(err, Error::EmailExists));
        assert_eq!(auth.credentials().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_registration_validation() {
        let (auth, _, _) = service(StorageMode::Local);

        for bad in [
            RegisterRequest::new("not-an-email", "secret1", "A", "S"),
            RegisterRequest::new("a@b", "secret1", "A", "S"),
            RegisterRequest::new("a@b.co", "short", "A", "S"),
            RegisterRequest::new("a@b.co", "secret1", " ", "S"),
        ] {
            assert!(matches!(auth.register(&bad).await, Err(Error::Validation(_))));
        }
        assert_eq!(auth.credentials().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_wrong_password_does_not_touch_last_login() {
        let (auth, _, _) = service(StorageMode::Local);
        auth.register(&alice()).await.unwrap();
        auth.logout().await.unwrap();
        let before = auth
            .credentials()
            .find_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap()
            .last_login;

        let err = auth.login("alice@example.com", "wrong1").await.unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials));
        assert!(!auth.is_authenticated().await);

        let after = auth
            .credentials()
            .find_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap()
            .last_login;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_local_logout_keeps_roster() {
        let (auth, store, _) = service(StorageMode::Local);
        auth.register(&alice()).await.unwrap();

        auth.logout().await.unwrap();
        assert!(!auth.is_authenticated().await);
        assert_eq!(store.get(keys::LOCAL_SESSION_TOKEN).await.unwrap(), None);
        assert_eq!(store.get(keys::LOCAL_SESSION_IDENTITY).await.unwrap(), None);
        assert_eq!(auth.credentials().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cloud_register_and_login() {
        let (auth, store, remote) = service(StorageMode::Cloud);

        let session = auth.register(&alice()).await.unwrap();
        assert_eq!(session.user.mode, StorageMode::Cloud);
        assert!(session.user.id.starts_with("srv-"));
        assert_eq!(
            store.get(keys::REMOTE_SESSION_TOKEN).await.unwrap().as_deref(),
            Some(session.token.as_str())
        );
        assert_eq!(auth.credentials().count().await.unwrap(), 0);

        let err = auth.register(&alice()).await.unwrap_err();
        assert!(matches!(err, Error::EmailExists));

        auth.logout().await.unwrap();
        assert_eq!(remote.logout_calls(), 1);
        assert!(!auth.is_authenticated().await);

        let err = auth.login("alice@example.com", "nope").await.unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials));
        auth.login("alice@example.com", "secret1").await.unwrap();
        assert!(auth.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_cloud_logout_offline_still_clears_session() {
        let (auth, store, remote) = service(StorageMode::Cloud);
        auth.register(&alice()).await.unwrap();

        remote.set_online(false);
        auth.logout().await.unwrap();
        assert_eq!(store.get(keys::REMOTE_SESSION_TOKEN).await.unwrap(), None);
        assert!(!auth.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_switch_mode_clears_every_session() {
        let (auth, store, _) = service(StorageMode::Local);
        auth.register(&alice()).await.unwrap();
        // A stale cloud session left behind by an older build.
        store.set(keys::REMOTE_SESSION_TOKEN, "stale").await.unwrap();

        auth.switch_mode(StorageMode::Cloud).await.unwrap();

        assert!(!auth.is_authenticated().await);
        assert_eq!(auth.mode(), StorageMode::Cloud);
        assert!(auth.config().sync_enabled());
        for key in [
            keys::LOCAL_SESSION_TOKEN,
            keys::LOCAL_SESSION_IDENTITY,
            keys::REMOTE_SESSION_TOKEN,
            keys::REMOTE_SESSION_IDENTITY,
        ] {
            assert_eq!(store.get(key).await.unwrap(), None, "{key} should be cleared");
        }
        assert_eq!(
            store.get(keys::STORAGE_MODE_PREFERENCE).await.unwrap().as_deref(),
            Some("cloud")
        );
        assert_eq!(auth.credentials().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_foreign_token_is_not_a_session() {
        let (auth, store, _) = service(StorageMode::Cloud);
        let capability = LocalSessionCapability::issue("local_1_abc", "a@b.co").unwrap();
        store
            .set(keys::REMOTE_SESSION_TOKEN, capability.as_str())
            .await
            .unwrap();
        set_json(
            store.as_ref(),
            keys::REMOTE_SESSION_IDENTITY,
            &SessionUser {
                id: "local_1_abc".into(),
                email: "a@b.co".into(),
                first_name: "A".into(),
                last_name: "B".into(),
                mode: StorageMode::Cloud,
            },
        )
        .await
        .unwrap();

        assert!(auth.current_token().await.is_none());
        assert!(!auth.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_load_reads_preference() {
        let store = Arc::new(MemoryStore::new());
        store.set(keys::STORAGE_MODE_PREFERENCE, "cloud").await.unwrap();

        let auth = AuthService::load(store, Arc::new(FakeRemote::new()), StorageMode::Local).await;
        assert_eq!(auth.mode(), StorageMode::Cloud);
    }
}
