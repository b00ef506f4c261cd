//! Test utilities: [`FakeRemote`] and [`ScriptedGate`].
//!
//! `FakeRemote` is an in-process [`RemoteApi`] with a tiny user and record
//! database. It records calls for assertions and can be switched offline or
//! made to reject writes, which is what most cloud-mode tests need.
//!
//! Exposed publicly so hosts embedding the crate can run their own tests
//! against it.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::auth::BearerToken;
use crate::controller::{ConfirmRequest, ConfirmationGate};
use crate::error::{Error, Result};
use crate::network::{AuthResponse, LoginRequest, RegisterRequest, RemoteApi, RemoteUser};
use crate::storage::UserRecord;

#[derive(Debug, Clone)]
struct FakeAccount {
    password: String,
    user: RemoteUser,
}

/// Scriptable in-process remote
#[derive(Debug, Default)]
pub struct FakeRemote {
    offline: AtomicBool,
    reject_writes: AtomicBool,
    health_delay: Mutex<Option<Duration>>,
    accounts: Mutex<HashMap<String, FakeAccount>>,
    /// token -> user id
    sessions: Mutex<HashMap<String, String>>,
    /// user id -> record
    records: Mutex<HashMap<String, UserRecord>>,
    next_id: AtomicUsize,
    next_token: AtomicUsize,
    health_calls: AtomicUsize,
    save_calls: AtomicUsize,
    load_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    logout_calls: AtomicUsize,
}

impl FakeRemote {
    /// Create an online remote with no accounts
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle reachability; offline calls fail with `NotConnected`
    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
    }

    /// Make `save_user_data` and `delete_user_data` answer 503
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Delay every health response
    pub fn set_health_delay(&self, delay: Duration) {
        *self.health_delay.lock() = Some(delay);
    }

    /// Create an account directly, returning its session
    pub fn seed_account(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> AuthResponse {
        let user = RemoteUser {
            id: format!("srv-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1),
            email: email.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        };
        self.accounts.lock().insert(
            email.to_lowercase(),
            FakeAccount {
                password: password.to_string(),
                user: user.clone(),
            },
        );
        self.open_session(user)
    }

    /// The record stored for a user id
    pub fn stored_record(&self, user_id: &str) -> Option<UserRecord> {
        self.records.lock().get(user_id).cloned()
    }

    /// Place a record for a user id
    pub fn put_record(&self, user_id: &str, record: UserRecord) {
        self.records.lock().insert(user_id.to_string(), record);
    }

    /// Number of active server sessions
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Count of `health` calls
    pub fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }

    /// Count of `save_user_data` calls
    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    /// Count of `load_user_data` calls
    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    /// Count of `delete_user_data` calls
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Count of `logout` calls
    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(Error::NotConnected)
        } else {
            Ok(())
        }
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.reject_writes.load(Ordering::SeqCst) {
            Err(Error::RemoteStatus {
                status: 503,
                message: "Service unavailable".into(),
            })
        } else {
            Ok(())
        }
    }

    fn open_session(&self, user: RemoteUser) -> AuthResponse {
        let n = self.next_token.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("tok-{}-{}", user.id, n);
        self.sessions.lock().insert(token.clone(), user.id.clone());
        AuthResponse { token, user }
    }

    fn session_user(&self, token: &BearerToken) -> Result<String> {
        self.sessions
            .lock()
            .get(token.as_str())
            .cloned()
            .ok_or(Error::RemoteStatus {
                status: 401,
                message: "Invalid token".into(),
            })
    }
}

#[async_trait]
impl RemoteApi for FakeRemote {
    async fn health(&self) -> Result<()> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.health_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.ensure_online()
    }

    async fn save_user_data(&self, token: &BearerToken, record: &UserRecord) -> Result<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;
        self.ensure_writable()?;
        let user_id = self.session_user(token)?;
        self.records.lock().insert(user_id, record.clone());
        Ok(())
    }

    async fn load_user_data(&self, token: &BearerToken, identity_id: &str) -> Result<UserRecord> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;
        self.session_user(token)?;
        self.stored_record(identity_id).ok_or(Error::RemoteStatus {
            status: 404,
            message: "User data not found".into(),
        })
    }

    async fn delete_user_data(&self, token: &BearerToken) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;
        self.ensure_writable()?;
        let user_id = self.session_user(token)?;
        self.records.lock().remove(&user_id);
        Ok(())
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse> {
        self.ensure_online()?;
        if self.accounts.lock().contains_key(&request.email.to_lowercase()) {
            return Err(Error::RemoteStatus {
                status: 409,
                message: "Email already registered".into(),
            });
        }
        Ok(self.seed_account(
            &request.email,
            &request.password,
            &request.first_name,
            &request.last_name,
        ))
    }

    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse> {
        self.ensure_online()?;
        let account = self.accounts.lock().get(&request.email.to_lowercase()).cloned();
        match account {
            Some(account) if account.password == request.password => {
                Ok(self.open_session(account.user))
            }
            _ => Err(Error::RemoteStatus {
                status: 401,
                message: "Invalid credentials".into(),
            }),
        }
    }

    async fn logout(&self, token: &BearerToken) -> Result<()> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;
        self.sessions.lock().remove(token.as_str());
        Ok(())
    }
}

// ============================================================================
// CONFIRMATION GATE
// ============================================================================

/// Confirmation gate that answers from a script and records what it was asked
///
/// When the script runs out, the default answer is used.
#[derive(Debug)]
pub struct ScriptedGate {
    answers: Mutex<VecDeque<bool>>,
    default_answer: bool,
    asked: Mutex<Vec<ConfirmRequest>>,
}

impl ScriptedGate {
    /// A gate that always gives `answer`
    pub fn always(answer: bool) -> Self {
        Self {
            answers: Mutex::new(VecDeque::new()),
            default_answer: answer,
            asked: Mutex::new(Vec::new()),
        }
    }

    /// A gate that gives `answers` in order, then declines
    pub fn sequence(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            default_answer: false,
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Every request seen so far
    pub fn asked(&self) -> Vec<ConfirmRequest> {
        self.asked.lock().clone()
    }
}

#[async_trait]
impl ConfirmationGate for ScriptedGate {
    async fn confirm(&self, request: ConfirmRequest) -> bool {
        self.asked.lock().push(request);
        self.answers.lock().pop_front().unwrap_or(self.default_answer)
    }
}
