//! Request and response bodies exchanged with the server.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/auth/register`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Email address
    pub email: String,
    /// Plaintext password (never persisted)
    pub password: String,
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: String,
}

impl RegisterRequest {
    /// Build a registration request
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }
}

/// Body of `POST /api/auth/login`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Email address
    pub email: String,
    /// Plaintext password
    pub password: String,
}

/// Identity as returned by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteUser {
    /// Server-assigned id
    pub id: String,
    /// Email address
    pub email: String,
    /// First name
    #[serde(default)]
    pub first_name: String,
    /// Last name
    #[serde(default)]
    pub last_name: String,
}

/// Response of the register and login endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Bearer token, stored verbatim
    pub token: String,
    /// The authenticated identity
    pub user: RemoteUser,
}

/// Error body the server sends with non-success statuses
///
/// Servers use either `error` or `message`; both are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Best human-readable message, falling back to the raw body
    pub(crate) fn into_message(self, raw: &str) -> String {
        self.error
            .or(self.message)
            .unwrap_or_else(|| raw.chars().take(256).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_wire_format() {
        let req = RegisterRequest::new("a@b.co", "secret1", "Alice", "Smith");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["firstName"], "Alice");
        assert_eq!(json["lastName"], "Smith");
    }

    #[test]
    fn test_auth_response_parses() {
        let raw = r#"{"token":"abc","user":{"id":"42","email":"a@b.co","firstName":"Alice","lastName":"Smith"}}"#;
        let resp: AuthResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.token, "abc");
        assert_eq!(resp.user.first_name, "Alice");
    }

    #[test]
    fn test_error_body_message() {
        let body: ErrorBody = serde_json::from_str(r#"{"message":"Email already exists"}"#).unwrap();
        assert_eq!(body.into_message(""), "Email already exists");

        let body = ErrorBody::default();
        assert_eq!(body.into_message("Bad Gateway"), "Bad Gateway");
    }
}
