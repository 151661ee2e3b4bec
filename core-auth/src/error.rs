use bridge_traits::error::BridgeError;
use core_api::{ApiError, UserMessage};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The login endpoint answered 2xx but the payload was unusable.
    #[error("{0}")]
    InvalidResponse(String),

    #[error("Session storage unavailable: {0}")]
    Storage(#[from] BridgeError),

    #[error("Stored session is corrupted: {0}")]
    SessionCorrupted(String),

    #[error("Session has not been initialized")]
    NotInitialized,

    #[error("Already signed in")]
    AlreadyAuthenticated,

    #[error("A login is already in progress")]
    LoginInProgress,

    #[error("Operation timed out: {operation}")]
    OperationTimeout { operation: String },

    #[error("Not authenticated")]
    NotAuthenticated,
}

pub type Result<T> = std::result::Result<T, AuthError>;

impl AuthError {
    /// Whether the user can reasonably try the same action again.
    pub fn is_recoverable(&self) -> bool {
        match self {
            AuthError::Api(ApiError::AuthenticationFailed { .. }) => true,
            AuthError::Api(error) => error.is_retryable(),
            AuthError::OperationTimeout { .. } | AuthError::LoginInProgress => true,
            _ => false,
        }
    }

    pub fn user_message(&self) -> UserMessage {
        match self {
            AuthError::Api(error) => error.user_message(),
            AuthError::InvalidResponse(message) => UserMessage {
                title: "Login Failed".to_string(),
                description: message.clone(),
            },
            AuthError::OperationTimeout { .. } => ApiError::Timeout.user_message(),
            AuthError::NotAuthenticated | AuthError::SessionCorrupted(_) => {
                ApiError::session_expired(None).user_message()
            }
            other => UserMessage {
                title: "Authentication Error".to_string(),
                description: other.to_string(),
            },
        }
    }
}
