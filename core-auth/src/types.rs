use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::permissions::{deserialize_permissions, Permission};

/// Backend identifier of a dashboard user.
///
/// The backend issues opaque string ids (`id` or Firebase-style `uid`), so no
/// format is assumed beyond being non-empty.
///
/// # Examples
///
/// ```
/// use core_auth::UserId;
///
/// let id = UserId::from("42");
/// assert_eq!(id.as_str(), "42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Dashboard role.
///
/// # Examples
///
/// ```
/// use core_auth::Role;
///
/// assert_eq!("superadmin".parse::<Role>(), Ok(Role::SuperAdmin));
/// assert_eq!(Role::Admin.as_str(), "admin");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Holds every permission implicitly.
    SuperAdmin,
    /// Holds the default admin set plus any explicit grants.
    Admin,
    /// Holds only explicit grants. Cannot sign in to the dashboard.
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "superadmin",
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    /// Whether this role may sign in to the dashboard.
    pub fn can_sign_in(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "superadmin" => Ok(Role::SuperAdmin),
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// The signed-in user.
///
/// Replaced wholesale on every login; never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub email: String,
    #[serde(rename = "name")]
    pub display_name: String,
    pub role: Role,
    /// Explicit grants. `None` when the backend sent none.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_permissions"
    )]
    pub permissions: Option<BTreeSet<Permission>>,
}

impl Identity {
    /// Whether `permission` was granted explicitly, ignoring role defaults.
    pub fn has_explicit(&self, permission: Permission) -> bool {
        self.permissions
            .as_ref()
            .map_or(false, |granted| granted.contains(&permission))
    }
}

/// Email and password submitted on the login screen.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Token and identity returned by a successful login.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub identity: Identity,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"[REDACTED]")
            .field("identity", &self.identity)
            .finish()
    }
}

/// Lifecycle state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Persisted storage has not been read yet.
    Initializing,
    Unauthenticated,
    Authenticated,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Initializing => write!(f, "Initializing"),
            SessionStatus::Unauthenticated => write!(f, "Unauthenticated"),
            SessionStatus::Authenticated => write!(f, "Authenticated"),
        }
    }
}

/// Point-in-time view of the session, published on every transition.
///
/// Identity and token are always set or cleared together.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub identity: Option<Identity>,
    pub token: Option<String>,
}

impl SessionSnapshot {
    pub fn initializing() -> Self {
        Self {
            status: SessionStatus::Initializing,
            identity: None,
            token: None,
        }
    }

    pub fn unauthenticated() -> Self {
        Self {
            status: SessionStatus::Unauthenticated,
            identity: None,
            token: None,
        }
    }

    pub fn authenticated(session: Session) -> Self {
        Self {
            status: SessionStatus::Authenticated,
            identity: Some(session.identity),
            token: Some(session.token),
        }
    }

    /// True iff both an identity and a non-empty token are present.
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some() && self.token.as_deref().map_or(false, |t| !t.is_empty())
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self::initializing()
    }
}

impl fmt::Debug for SessionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSnapshot")
            .field("status", &self.status)
            .field("identity", &self.identity)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
