//! Classified API errors
//!
//! Every failure surfaced by [`ApiClient`](crate::ApiClient) is one of these
//! kinds. Callers never see raw transport errors.

use bridge_traits::error::BridgeError;
use serde_json::Value;
use thiserror::Error;

/// Message used when the backend rejects a session without saying why.
pub const DEFAULT_SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

/// Message used when the backend rejects credentials without saying why.
pub const DEFAULT_AUTH_FAILED_MESSAGE: &str = "Authentication failed";

/// Message for a failed request the server gave no explanation for.
pub const UNEXPECTED_RESPONSE_MESSAGE: &str = "The server returned an unexpected response.";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The session token is missing or was rejected. Terminal: the caller
    /// must tear the session down and send the user to the login screen.
    #[error("{message}")]
    SessionExpired { message: String },

    /// Credentials were rejected on a public endpoint (login).
    #[error("{message}")]
    AuthenticationFailed { message: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {message}")]
    NetworkFailure { message: String },

    /// Any other non-2xx response, or a 2xx body that could not be decoded.
    /// The latter is never retried, since the server already acted on it.
    #[error("{message}")]
    ServerError {
        status: u16,
        message: String,
        detail: Value,
    },

    /// The request could not be built locally.
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Title and description suitable for a toast or banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMessage {
    pub title: String,
    pub description: String,
}

impl UserMessage {
    fn new(title: &str, description: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            description: description.into(),
        }
    }
}

impl ApiError {
    /// `SessionExpired` with the server's message, or the default one.
    pub fn session_expired(message: Option<String>) -> Self {
        ApiError::SessionExpired {
            message: non_empty(message)
                .unwrap_or_else(|| DEFAULT_SESSION_EXPIRED_MESSAGE.to_string()),
        }
    }

    /// `AuthenticationFailed` with the server's message, or the default one.
    pub fn authentication_failed(message: Option<String>) -> Self {
        ApiError::AuthenticationFailed {
            message: non_empty(message).unwrap_or_else(|| DEFAULT_AUTH_FAILED_MESSAGE.to_string()),
        }
    }

    /// `ServerError` whose message is `detail.message` when present.
    pub fn server_error(status: u16, detail: Value) -> Self {
        let message = non_empty(server_message(&detail))
            .unwrap_or_else(|| format!("HTTP error! status: {}", status));

        ApiError::ServerError {
            status,
            message,
            detail,
        }
    }

    /// Whether another attempt of the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::Timeout | ApiError::NetworkFailure { .. } | ApiError::ServerError { .. }
        )
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired { .. })
    }

    /// HTTP status for errors that carry one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ServerError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Maps the error to the text shown to the user.
    pub fn user_message(&self) -> UserMessage {
        match self {
            ApiError::SessionExpired { .. } => {
                UserMessage::new("Session Expired", DEFAULT_SESSION_EXPIRED_MESSAGE)
            }
            ApiError::AuthenticationFailed { message } => {
                let lowered = message.to_lowercase();
                if lowered.contains("incorrect email or password")
                    || lowered.contains("invalid credentials")
                    || lowered.contains("invalid email or password")
                {
                    UserMessage::new(
                        "Invalid Credentials",
                        "The email or password you entered is incorrect. Please try again.",
                    )
                } else {
                    UserMessage::new("Authentication Failed", message.clone())
                }
            }
            ApiError::Timeout => UserMessage::new(
                "Connection Timeout",
                "The server is taking too long to respond. Please try again.",
            ),
            ApiError::NetworkFailure { .. } => UserMessage::new(
                "Connection Error",
                "Unable to connect to the server. Please check your internet connection.",
            ),
            ApiError::ServerError { detail, .. } => UserMessage::new(
                "Request Failed",
                non_empty(server_message(detail))
                    .unwrap_or_else(|| UNEXPECTED_RESPONSE_MESSAGE.to_string()),
            ),
            ApiError::InvalidRequest { .. } => UserMessage::new(
                "Request Failed",
                "The request could not be sent. Please try again.",
            ),
        }
    }
}

impl From<BridgeError> for ApiError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::Timeout => ApiError::Timeout,
            BridgeError::Network(message) => ApiError::NetworkFailure { message },
            // The transport refused to build the request; resending cannot help.
            BridgeError::OperationFailed(message) => ApiError::InvalidRequest { message },
            other => ApiError::NetworkFailure {
                message: other.to_string(),
            },
        }
    }
}

/// `message` field of an error body, if it is a string.
pub(crate) fn server_message(detail: &Value) -> Option<String> {
    detail
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn non_empty(message: Option<String>) -> Option<String> {
    message.filter(|m| !m.trim().is_empty())
}
