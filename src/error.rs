//! Error kinds shared by the session core.
//!
//! Validation-layer problems (`MalformedToken`, `Expired`, `CorruptedStorage`)
//! never escape the validator or the token manager as errors; they are mapped to
//! explicit state values there. The variants exist so that logs and callers can
//! name the reason. Network-layer variants are returned to callers as typed
//! failures.

use thiserror::Error;

/// Maximum number of error body characters surfaced to callers.
const MAX_ERROR_CHARS: usize = 200;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("malformed token")]
    MalformedToken,
    #[error("token expired")]
    Expired,
    #[error("credentials rejected: {0}")]
    CredentialsRejected(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("request failed ({status}): {message}")]
    Validation { status: u16, message: String },
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("corrupted storage: {0}")]
    CorruptedStorage(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("decode error: {0}")]
    Decode(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Errors the caller may retry at its own discretion. Nothing here retries them.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout | Self::Server { .. })
    }

    /// Errors that invalidate the current session.
    #[must_use]
    pub fn invalidates_session(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Message suitable for showing to an end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::MalformedToken | Self::Expired | Self::Unauthorized => {
                "Session expired. Please sign in again.".to_string()
            }
            Self::CredentialsRejected(message) => message.clone(),
            Self::Forbidden => "You do not have permission to perform this action.".to_string(),
            Self::NotFound => "Resource not found.".to_string(),
            Self::Validation { .. } => "Invalid data. Please check the fields.".to_string(),
            Self::Server { .. } => "Internal server error. Please try again.".to_string(),
            Self::Network(_) | Self::Timeout => {
                "Connection error. Check your internet connection.".to_string()
            }
            Self::CorruptedStorage(_) | Self::Storage(_) | Self::Config(_) | Self::Decode(_) => {
                "Unknown error. Please try again.".to_string()
            }
        }
    }
}

/// Map a non-success HTTP status into an error kind.
///
/// 401 invalidates the session, 403 does not, everything else is either a
/// validation problem (4xx) or a transient server failure (5xx).
#[must_use]
pub fn classify_status(status: u16, body: &str) -> Error {
    let message = sanitize_body(body);
    match status {
        401 => Error::Unauthorized,
        403 => Error::Forbidden,
        404 => Error::NotFound,
        500.. => Error::Server { status, message },
        _ => Error::Validation { status, message },
    }
}

/// Sanitizes HTTP error bodies by extracting `error`/`message` and truncating.
#[must_use]
pub fn sanitize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "Request failed.".to_string();
    }

    let extracted = serde_json::from_str::<serde_json::Value>(trimmed)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .or_else(|| value.get("message"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        });

    extracted
        .as_deref()
        .unwrap_or(trimmed)
        .chars()
        .take(MAX_ERROR_CHARS)
        .collect()
}
