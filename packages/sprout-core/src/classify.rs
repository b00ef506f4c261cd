//! # Unified Error Classifier
//!
//! Maps heterogeneous failures onto a small closed taxonomy with a
//! localized message and an optional remedial action for the UI.
//!
//! ## Classification Paths
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       ERROR CLASSIFICATION                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  crate::Error ──► Error::kind() ──────────────────┐                    │
//! │  (structured, set at the throw site)              │                    │
//! │                                                   ▼                    │
//! │                                          ┌─────────────────┐           │
//! │                                          │  UnifiedError   │           │
//! │                                          │  kind, message, │           │
//! │                                          │  action         │           │
//! │                                          └─────────────────┘           │
//! │                                                   ▲                    │
//! │  RawError ──► status table ──► message substrings ┘                    │
//! │  (third-party / remote text, compatibility path)                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The result is advisory UX mapping. Control flow must branch on
//! [`crate::Error`] variants, never on a classified kind.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Closed failure taxonomy shown to users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No connectivity or transport failure
    NetworkError,
    /// Remote 5xx or local storage fault
    ServerError,
    /// Remote 404 / endpoint missing
    ServerUnavailable,
    /// Remote 400 or rejected input
    ValidationError,
    /// 401 or local hash mismatch
    InvalidCredentials,
    /// 409 or duplicate local registration
    EmailExists,
    /// Anything else
    Generic,
}

impl ErrorKind {
    /// Map an HTTP status to a taxonomy member
    ///
    /// Statuses without a dedicated member fall back to [`ErrorKind::Generic`],
    /// except the 5xx range which is always a server error.
    pub fn from_status(status: u16) -> Self {
        match status {
            409 => ErrorKind::EmailExists,
            401 => ErrorKind::InvalidCredentials,
            400 => ErrorKind::ValidationError,
            404 => ErrorKind::ServerUnavailable,
            0 => ErrorKind::NetworkError,
            500..=599 => ErrorKind::ServerError,
            _ => ErrorKind::Generic,
        }
    }

    /// Stable machine-readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NetworkError => "network_error",
            ErrorKind::ServerError => "server_error",
            ErrorKind::ServerUnavailable => "server_unavailable",
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::InvalidCredentials => "invalid_credentials",
            ErrorKind::EmailExists => "email_exists",
            ErrorKind::Generic => "generic",
        }
    }
}

/// Display language for classified messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// English
    #[default]
    En,
    /// French
    Fr,
}

impl Locale {
    /// Parse a language tag such as `fr`, `fr-CA` or `en_US`
    pub fn parse(tag: &str) -> Option<Self> {
        let lang = tag.split(['-', '_']).next()?.to_ascii_lowercase();
        match lang.as_str() {
            "en" => Some(Locale::En),
            "fr" => Some(Locale::Fr),
            _ => None,
        }
    }
}

/// A remedial action offered next to an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorAction {
    /// Button label
    pub label: String,
    /// In-app route, if the action navigates somewhere
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A classified, display-ready error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnifiedError {
    /// Taxonomy member
    pub kind: ErrorKind,
    /// Localized message
    pub message: String,
    /// Optional remedial action
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ErrorAction>,
}

impl UnifiedError {
    /// How long an error panel stays visible before dismissing itself
    pub const AUTO_DISMISS: Duration = Duration::from_secs(5);

    /// Build the display form of a taxonomy member
    pub fn for_kind(kind: ErrorKind, locale: Locale) -> Self {
        Self {
            kind,
            message: message_for(kind, locale).to_string(),
            action: action_for(kind, locale),
        }
    }

    /// Classify a crate error through its structured kind
    pub fn from_error(err: &Error, locale: Locale) -> Self {
        Self::for_kind(err.kind(), locale)
    }
}

impl From<&Error> for UnifiedError {
    fn from(err: &Error) -> Self {
        Self::from_error(err, Locale::default())
    }
}

/// A failure as reported by a third party: optional status plus free text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawError {
    /// HTTP status, `Some(0)` for "request never completed"
    pub status: Option<u16>,
    /// Whatever message accompanied the failure
    pub message: String,
}

impl RawError {
    /// A raw error carrying only a message
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// A raw error carrying a status and message
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

/// Classify a raw failure with English messages
pub fn classify(raw: &RawError) -> UnifiedError {
    classify_localized(raw, Locale::En)
}

/// Classify a raw failure in the given locale
pub fn classify_localized(raw: &RawError, locale: Locale) -> UnifiedError {
    UnifiedError::for_kind(raw_kind(raw), locale)
}

/// Compatibility heuristics for errors that carry no structured kind
fn raw_kind(raw: &RawError) -> ErrorKind {
    if let Some(status) = raw.status {
        let kind = ErrorKind::from_status(status);
        if kind != ErrorKind::Generic {
            return kind;
        }
    }

    let message = raw.message.to_lowercase();
    if message.contains("email") && message.contains("already") {
        ErrorKind::EmailExists
    } else if message.contains("password") || message.contains("credentials") {
        ErrorKind::InvalidCredentials
    } else if message.contains("network") || message.contains("failed to fetch") {
        ErrorKind::NetworkError
    } else if message.contains("server") {
        ErrorKind::ServerError
    } else {
        ErrorKind::Generic
    }
}

fn message_for(kind: ErrorKind, locale: Locale) -> &'static str {
    match (locale, kind) {
        (Locale::En, ErrorKind::NetworkError) => {
            "Unable to reach the server. Check your internet connection."
        }
        (Locale::En, ErrorKind::ServerError) => {
            "Something went wrong on our side. Please try again later."
        }
        (Locale::En, ErrorKind::ServerUnavailable) => {
            "The service is currently unavailable. Local mode is still available."
        }
        (Locale::En, ErrorKind::ValidationError) => "Some of the information entered is invalid.",
        (Locale::En, ErrorKind::InvalidCredentials) => "Incorrect email or password.",
        (Locale::En, ErrorKind::EmailExists) => "An account already exists with this email.",
        (Locale::En, ErrorKind::Generic) => "An unexpected error occurred.",

        (Locale::Fr, ErrorKind::NetworkError) => {
            "Impossible de joindre le serveur. Vérifiez votre connexion internet."
        }
        (Locale::Fr, ErrorKind::ServerError) => {
            "Une erreur est survenue de notre côté. Veuillez réessayer plus tard."
        }
        (Locale::Fr, ErrorKind::ServerUnavailable) => {
            "Le service est momentanément indisponible. Le mode local reste disponible."
        }
        (Locale::Fr, ErrorKind::ValidationError) => {
            "Certaines informations saisies sont invalides."
        }
        (Locale::Fr, ErrorKind::InvalidCredentials) => "Email ou mot de passe incorrect.",
        (Locale::Fr, ErrorKind::EmailExists) => "Un compte existe déjà avec cet email.",
        (Locale::Fr, ErrorKind::Generic) => "Une erreur inattendue est survenue.",
    }
}

fn action_for(kind: ErrorKind, locale: Locale) -> Option<ErrorAction> {
    let (label_en, label_fr, url) = match kind {
        ErrorKind::EmailExists => ("Sign in", "Se connecter", Some("/login")),
        ErrorKind::InvalidCredentials => {
            ("Reset password", "Mot de passe oublié", Some("/forgot-password"))
        }
        ErrorKind::NetworkError => ("Retry", "Réessayer", None),
        _ => return None,
    };

    Some(ErrorAction {
        label: match locale {
            Locale::En => label_en,
            Locale::Fr => label_fr,
        }
        .to_string(),
        url: url.map(str::to_string),
    })
}

// ============================================================================
// TESTS
// ============================================================================
