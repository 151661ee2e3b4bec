//! Route guards
//!
//! Pure functions of a [`SessionSnapshot`]; hosts map the decision onto their
//! router.

use crate::permissions::{has_all_permissions, Permission};
use crate::types::{Role, SessionSnapshot, SessionStatus};

/// Access rule attached to a dashboard route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteGuard {
    /// Any signed-in user.
    Protected,
    /// Admins holding every `required` permission, and superadmins.
    Admin { required: Vec<Permission> },
    /// Superadmins only.
    SuperAdmin,
}

/// Outcome of evaluating a guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// The session is still being restored; render a placeholder.
    Pending,
    Allow,
    RedirectToLogin,
    RedirectToDashboard,
}

impl RouteGuard {
    pub fn admin() -> Self {
        RouteGuard::Admin {
            required: Vec::new(),
        }
    }

    pub fn admin_with(required: impl IntoIterator<Item = Permission>) -> Self {
        RouteGuard::Admin {
            required: required.into_iter().collect(),
        }
    }

    pub fn evaluate(&self, snapshot: &SessionSnapshot) -> RouteDecision {
        if snapshot.status == SessionStatus::Initializing {
            return RouteDecision::Pending;
        }

        let identity = match snapshot.identity.as_ref() {
            Some(identity) if snapshot.is_authenticated() => identity,
            _ => return RouteDecision::RedirectToLogin,
        };

        match self {
            RouteGuard::Protected => RouteDecision::Allow,
            RouteGuard::SuperAdmin => match identity.role {
                Role::SuperAdmin => RouteDecision::Allow,
                _ => RouteDecision::RedirectToDashboard,
            },
            RouteGuard::Admin { required } => match identity.role {
                Role::SuperAdmin => RouteDecision::Allow,
                Role::Admin if has_all_permissions(Some(identity), required) => {
                    RouteDecision::Allow
                }
                _ => RouteDecision::RedirectToDashboard,
            },
        }
    }
}
