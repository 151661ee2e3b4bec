//! Login collaborator
//!
//! [`Authenticator`] exchanges credentials for a [`Session`]. The default
//! [`ApiAuthenticator`] posts to `/auth/login` and validates the response
//! envelope field by field, so a malformed backend reply fails with a precise
//! message instead of producing a half-populated identity.

use async_trait::async_trait;
use core_api::{ApiClient, ApiRequest};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::{AuthError, Result};
use crate::permissions::parse_permissions;
use crate::types::{Credentials, Identity, Role, Session, UserId};

pub const LOGIN_PATH: &str = "/auth/login";

/// Exchanges credentials for a token and identity.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session>;
}

/// [`Authenticator`] backed by the store API.
#[derive(Debug, Clone)]
pub struct ApiAuthenticator {
    api: ApiClient,
}

impl ApiAuthenticator {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Authenticator for ApiAuthenticator {
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session> {
        let request = ApiRequest::post(LOGIN_PATH).public().json(credentials)?;

        let envelope: LoginEnvelope = self.api.execute(&request, None).await?;
        let session = validate_login_response(envelope).map_err(|e| {
            warn!(error = %e, "Rejected login response");
            e
        })?;

        debug!(user_id = %session.identity.id, role = %session.identity.role, "Login response accepted");
        Ok(session)
    }
}

#[derive(Debug, Deserialize)]
struct LoginEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<LoginData>,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    user: Option<Value>,
}

fn invalid(message: impl Into<String>) -> AuthError {
    AuthError::InvalidResponse(message.into())
}

/// Non-empty string field; numbers are accepted for ids.
fn text_field(user: &Value, key: &str) -> Option<String> {
    match user.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn validate_login_response(envelope: LoginEnvelope) -> Result<Session> {
    let data = match envelope.data {
        Some(data) if envelope.success => data,
        _ => {
            let message = envelope
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "Login failed".to_string());
            return Err(invalid(message));
        }
    };

    let token = data
        .token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| invalid("Login failed: No authentication token received"))?;

    let user = data
        .user
        .filter(Value::is_object)
        .ok_or_else(|| invalid("Login failed: No user data received"))?;

    let id = text_field(&user, "id")
        .or_else(|| text_field(&user, "uid"))
        .ok_or_else(|| invalid("Login failed: User ID is missing"))?;

    let email = match user.get("email") {
        Some(Value::String(email)) if !email.trim().is_empty() => email.clone(),
        _ => return Err(invalid("Login failed: Email is missing")),
    };

    let display_name = match user.get("name") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.clone(),
        _ => email.split('@').next().unwrap_or_default().to_string(),
    };

    let role = match user.get("role") {
        Some(Value::String(role)) if !role.is_empty() => role.clone(),
        _ => return Err(invalid("Login failed: Role is missing")),
    };
    let role = match role.parse::<Role>() {
        Ok(parsed) if parsed.can_sign_in() => parsed,
        _ => return Err(invalid(format!("Login failed: Invalid role \"{}\"", role))),
    };

    let permissions = user.get("permissions").and_then(Value::as_array).map(|flags| {
        parse_permissions(flags.iter().filter_map(Value::as_str))
    });

    Ok(Session {
        token,
        identity: Identity {
            id: UserId::from(id),
            email,
            display_name,
            role,
            permissions,
        },
    })
}
