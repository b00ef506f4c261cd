//! # Remote API
//!
//! The [`RemoteApi`] trait is the only way the crate reaches the server.
//! [`HttpRemote`] implements it over reqwest; tests swap in
//! [`FakeRemote`](crate::testing::FakeRemote).
//!
//! Non-success statuses become [`Error::RemoteStatus`] with the message
//! taken from the response body, so callers and the classifier see a
//! structured status instead of free text.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use super::protocol::{AuthResponse, ErrorBody, LoginRequest, RegisterRequest};
use crate::auth::BearerToken;
use crate::error::{Error, Result};
use crate::storage::UserRecord;

/// Default bound on any single request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Operations the server of record offers
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// `GET /health`; `Ok` only on a success status
    async fn health(&self) -> Result<()>;

    /// `POST /api/user-data`
    async fn save_user_data(&self, token: &BearerToken, record: &UserRecord) -> Result<()>;

    /// `GET /api/user-data/{id}`
    async fn load_user_data(&self, token: &BearerToken, identity_id: &str) -> Result<UserRecord>;

    /// `DELETE /api/user-data`
    async fn delete_user_data(&self, token: &BearerToken) -> Result<()>;

    /// `POST /api/auth/register`
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse>;

    /// `POST /api/auth/login`
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse>;

    /// `POST /api/auth/logout`
    async fn logout(&self, token: &BearerToken) -> Result<()>;
}

// ============================================================================
// HTTP IMPLEMENTATION
// ============================================================================

/// reqwest-backed [`RemoteApi`]
#[derive(Clone)]
pub struct HttpRemote {
    client: Client,
    /// Server base URL
    base: Url,
}

impl HttpRemote {
    /// Create a client for a server base URL
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client with a custom per-request timeout
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim();
        if trimmed.is_empty() {
            return Err(Error::Validation("api url must not be empty".into()));
        }
        let base = Url::parse(trimmed)
            .map_err(|e| Error::Validation(format!("invalid api url {trimmed}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(Error::Validation(format!("invalid api url {trimmed}")));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(|e| Error::TransportError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base })
    }

    /// The server base URL
    pub fn base_url(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    /// Append path segments to the base URL, percent-encoding each one
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Validation(format!("invalid api url {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Execute a request and return the body of a success response
    async fn send(&self, request: RequestBuilder) -> Result<String> {
        let request = request.build()?;
        let method = request.method().clone();
        let path = request.url().path().to_string();
        let start = Instant::now();

        let response = self.client.execute(request).await?;
        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(
            %method,
            path = %path,
            status = status.as_u16(),
            ms = start.elapsed().as_millis() as u64,
            "Remote response"
        );

        if status.is_success() {
            return Ok(body);
        }

        let message = serde_json::from_str::<ErrorBody>(&body)
            .unwrap_or_default()
            .into_message(&body);
        Err(Error::RemoteStatus {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let body = self.send(request).await?;
        serde_json::from_str(&body).map_err(|e| Error::ProtocolError(e.to_string()))
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn health(&self) -> Result<()> {
        self.send(self.client.get(self.url(&["health"])?)).await.map(|_| ())
    }

    async fn save_user_data(&self, token: &BearerToken, record: &UserRecord) -> Result<()> {
        let request = self
            .client
            .post(self.url(&["api", "user-data"])?)
            .bearer_auth(token.as_str())
            .json(record);
        self.send(request).await.map(|_| ())
    }

    async fn load_user_data(&self, token: &BearerToken, identity_id: &str) -> Result<UserRecord> {
        let request = self
            .client
            .get(self.url(&["api", "user-data", identity_id])?)
            .bearer_auth(token.as_str());
        self.send_json(request).await
    }

    async fn delete_user_data(&self, token: &BearerToken) -> Result<()> {
        let request = self
            .client
            .delete(self.url(&["api", "user-data"])?)
            .bearer_auth(token.as_str());
        self.send(request).await.map(|_| ())
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse> {
        self.send_json(self.client.post(self.url(&["api", "auth", "register"])?).json(request))
            .await
    }

    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse> {
        self.send_json(self.client.post(self.url(&["api", "auth", "login"])?).json(request))
            .await
    }

    async fn logout(&self, token: &BearerToken) -> Result<()> {
        let request = self
            .client
            .post(self.url(&["api", "auth", "logout"])?)
            .bearer_auth(token.as_str());
        self.send(request).await.map(|_| ())
    }
}
