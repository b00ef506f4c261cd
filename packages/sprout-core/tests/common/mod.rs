//! Fake Sprout API server on axum.
//!
//! `FakeServer::spawn()` starts an HTTP server on a random port and returns
//! its base URL plus a handle on the server state.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct StoredUser {
    pub id: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Internal state of the fake server
#[derive(Debug)]
pub struct FakeState {
    pub users: RwLock<HashMap<String, StoredUser>>,
    pub tokens: RwLock<HashMap<String, String>>,
    pub records: RwLock<HashMap<String, Value>>,
    pub healthy: AtomicBool,
    pub reject_writes: AtomicBool,
    pub health_hits: AtomicUsize,
    next_id: AtomicU64,
}

impl FakeState {
    fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            tokens: RwLock::new(HashMap::new()),
            records: RwLock::new(HashMap::new()),
            healthy: AtomicBool::new(true),
            reject_writes: AtomicBool::new(false),
            health_hits: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    pub async fn record_for(&self, user_id: &str) -> Option<Value> {
        self.records.read().await.get(user_id).cloned()
    }

    async fn issue_token(&self, user_id: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let token = format!("jwt.{user_id}.{n}");
        self.tokens.write().await.insert(token.clone(), user_id.to_string());
        token
    }

    async fn user_for(&self, headers: &HeaderMap) -> Option<String> {
        let token = headers
            .get(header::AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")?;
        self.tokens.read().await.get(token).cloned()
    }
}

/// Fake server: start it and get base URL + state
pub struct FakeServer;

impl FakeServer {
    pub async fn spawn() -> (String, Arc<FakeState>) {
        let state = Arc::new(FakeState::new());

        let app = Router::new()
            .route("/health", get(handle_health))
            .route("/api/auth/register", post(handle_register))
            .route("/api/auth/login", post(handle_login))
            .route("/api/auth/logout", post(handle_logout))
            .route(
                "/api/user-data",
                post(handle_save_data).delete(handle_delete_data),
            )
            .route("/api/user-data/:id", get(handle_load_data))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local_addr");
        let base_url = format!("http://{addr}");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        (base_url, state)
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn auth_body(user: &StoredUser, token: String) -> Value {
    json!({
        "token": token,
        "user": {
            "id": user.id,
            "email": user.email,
            "firstName": user.first_name,
            "lastName": user.last_name,
        }
    })
}

// -- Handlers --

async fn handle_health(State(state): State<Arc<FakeState>>) -> Response {
    state.health_hits.fetch_add(1, Ordering::SeqCst);
    if state.healthy.load(Ordering::SeqCst) {
        Json(json!({ "status": "ok" })).into_response()
    } else {
        error(StatusCode::SERVICE_UNAVAILABLE, "maintenance")
    }
}

async fn handle_register(State(state): State<Arc<FakeState>>, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default().to_lowercase();
    let password = body["password"].as_str().unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return error(StatusCode::BAD_REQUEST, "Email and password are required");
    }
    if state.users.read().await.contains_key(&email) {
        return error(StatusCode::CONFLICT, "Email already registered");
    }

    let id = format!("usr_{}", state.next_id.fetch_add(1, Ordering::SeqCst));
    let user = StoredUser {
        id: id.clone(),
        email: email.clone(),
        password: password.to_string(),
        first_name: body["firstName"].as_str().unwrap_or_default().to_string(),
        last_name: body["lastName"].as_str().unwrap_or_default().to_string(),
    };
    state.users.write().await.insert(email, user.clone());
    let token = state.issue_token(&id).await;
    (StatusCode::CREATED, Json(auth_body(&user, token))).into_response()
}

async fn handle_login(State(state): State<Arc<FakeState>>, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default().to_lowercase();
    let password = body["password"].as_str().unwrap_or_default();
    let user = state.users.read().await.get(&email).cloned();
    match user {
        Some(user) if user.password == password => {
            let token = state.issue_token(&user.id).await;
            Json(auth_body(&user, token)).into_response()
        }
        _ => error(StatusCode::UNAUTHORIZED, "Invalid credentials"),
    }
}

async fn handle_logout(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        state.tokens.write().await.remove(token);
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn handle_save_data(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let Some(user_id) = state.user_for(&headers).await else {
        return error(StatusCode::UNAUTHORIZED, "Missing or invalid token");
    };
    if state.reject_writes.load(Ordering::SeqCst) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
    }
    state.records.write().await.insert(user_id, body);
    Json(json!({ "success": true })).into_response()
}

async fn handle_load_data(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if state.user_for(&headers).await.is_none() {
        return error(StatusCode::UNAUTHORIZED, "Missing or invalid token");
    }
    match state.records.read().await.get(&id) {
        Some(record) => Json(record.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "No data for user"),
    }
}

async fn handle_delete_data(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    let Some(user_id) = state.user_for(&headers).await else {
        return error(StatusCode::UNAUTHORIZED, "Missing or invalid token");
    };
    state.records.write().await.remove(&user_id);
    StatusCode::NO_CONTENT.into_response()
}
