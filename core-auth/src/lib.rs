//! # Session & Permissions
//!
//! Owns who is signed in to the admin dashboard and what they may do.
//!
//! ## Overview
//!
//! - [`SessionManager`] restores, creates and tears down the session and
//!   publishes every change as a [`SessionSnapshot`].
//! - [`SessionStore`] persists token and identity together.
//! - [`Authenticator`] exchanges credentials for a [`Session`];
//!   [`ApiAuthenticator`] does so against the store API.
//! - The [`permissions`] resolver answers "may this identity do X" from role
//!   and explicit grants.
//! - [`RouteGuard`] maps a snapshot onto a navigation decision.
//!
//! Permission checks never touch the network or storage.

pub mod error;
pub mod guards;
pub mod login;
pub mod manager;
pub mod permissions;
pub mod session_store;
pub mod types;

pub use error::{AuthError, Result};
pub use guards::{RouteDecision, RouteGuard};
pub use login::{ApiAuthenticator, Authenticator};
pub use manager::SessionManager;
pub use permissions::{Permission, DEFAULT_ADMIN_PERMISSIONS};
pub use session_store::SessionStore;
pub use types::{
    Credentials, Identity, Role, Session, SessionSnapshot, SessionStatus, UserId,
};
