use core_api::{ApiError, UserMessage};
use core_auth::AuthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error(transparent)]
    Config(#[from] core_runtime::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Api(#[from] ApiError),

    /// The signed-in identity lacks the capability the operation needs.
    #[error("Permission denied: {permission}")]
    PermissionDenied { permission: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    pub fn permission_denied(permission: impl ToString) -> Self {
        CoreError::PermissionDenied {
            permission: permission.to_string(),
        }
    }

    /// True if the caller should send the user back to the login screen.
    pub fn is_session_expired(&self) -> bool {
        matches!(
            self,
            CoreError::Api(ApiError::SessionExpired { .. })
                | CoreError::Auth(AuthError::Api(ApiError::SessionExpired { .. }))
                | CoreError::Auth(AuthError::NotAuthenticated)
        )
    }

    pub fn user_message(&self) -> UserMessage {
        match self {
            CoreError::Api(error) => error.user_message(),
            CoreError::Auth(error) => error.user_message(),
            CoreError::PermissionDenied { permission } => UserMessage {
                title: "Access Denied".to_string(),
                description: format!("You do not have the {} permission", permission),
            },
            other => UserMessage {
                title: "Error".to_string(),
                description: other.to_string(),
            },
        }
    }
}
