//! # Session Manager
//!
//! Owns the signed-in session for the lifetime of the host application.
//!
//! ## Overview
//!
//! The `SessionManager` is the single place that mutates the session. It
//! restores a persisted session at startup, performs login and logout, and
//! tears the session down when the backend reports it expired. Every
//! transition is published as a [`SessionSnapshot`] on a `watch` channel, so
//! reads (`current_identity`, `has_permission`, route guards) are synchronous
//! and never touch the network or storage.
//!
//! ## State machine
//!
//! ```text
//!                 initialize()
//!  Initializing ───────────────┬──────────────> Authenticated
//!                              │                   │     ▲
//!                              ▼                   │     │ login()
//!                        Unauthenticated <─────────┘     │
//!                              │   logout() / expire_session()
//!                              └─────────────────────────┘
//! ```
//!
//! A failed login leaves the state untouched.
//!
//! ## Usage
//!
//! ```ignore
//! use core_auth::{Credentials, SessionManager};
//!
//! manager.initialize().await?;
//! if !manager.is_authenticated() {
//!     manager.login(Credentials::new("a@x.com", "secret")).await?;
//! }
//! ```

use crate::error::{AuthError, Result};
use crate::guards::{RouteDecision, RouteGuard};
use crate::login::Authenticator;
use crate::permissions::{self, Permission};
use crate::session_store::SessionStore;
use crate::types::{Credentials, Identity, SessionSnapshot, SessionStatus};
use core_api::ApiError;
use core_runtime::config::DEFAULT_LOGIN_TIMEOUT;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, instrument, warn};

/// Owner of the session state.
pub struct SessionManager {
    store: SessionStore,
    authenticator: Arc<dyn Authenticator>,
    event_bus: EventBus,
    state: watch::Sender<SessionSnapshot>,
    /// Serializes `initialize` calls.
    init_lock: Mutex<()>,
    /// Held for the duration of a login.
    login_lock: Mutex<()>,
    login_timeout: Duration,
}

impl SessionManager {
    /// Creates a manager in the `Initializing` state.
    ///
    /// Call [`initialize`](Self::initialize) before anything else.
    pub fn new(
        store: SessionStore,
        authenticator: Arc<dyn Authenticator>,
        event_bus: EventBus,
    ) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::initializing());

        Self {
            store,
            authenticator,
            event_bus,
            state,
            init_lock: Mutex::new(()),
            login_lock: Mutex::new(()),
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
        }
    }

    /// Overrides the whole-operation login timeout (default 60 s).
    pub fn with_login_timeout(mut self, login_timeout: Duration) -> Self {
        self.login_timeout = login_timeout;
        self
    }

    /// Restores the persisted session.
    ///
    /// Moves to `Authenticated` if storage holds a valid session and to
    /// `Unauthenticated` otherwise. A corrupted session is discarded. Calling
    /// this again after the first completion is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Storage`] if storage could not be read. The manager
    /// is `Unauthenticated` afterwards.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<()> {
        let _guard = self.init_lock.lock().await;

        if self.status() != SessionStatus::Initializing {
            debug!("Session already initialized");
            return Ok(());
        }

        match self.store.load().await {
            Ok(Some(session)) => {
                let event = CoreEvent::Auth(AuthEvent::SessionRestored {
                    user_id: session.identity.id.to_string(),
                    role: session.identity.role.to_string(),
                });
                info!(user_id = %session.identity.id, "Restored persisted session");
                self.publish(SessionSnapshot::authenticated(session));
                let _ = self.event_bus.emit(event);
                Ok(())
            }
            Ok(None) => {
                debug!("No persisted session");
                self.publish(SessionSnapshot::unauthenticated());
                Ok(())
            }
            Err(AuthError::SessionCorrupted(reason)) => {
                warn!(reason = %reason, "Starting signed out after discarding corrupted session");
                self.publish(SessionSnapshot::unauthenticated());
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to read persisted session");
                self.publish(SessionSnapshot::unauthenticated());
                Err(e)
            }
        }
    }

    /// Signs in with `credentials`.
    ///
    /// On success the token and identity are persisted together, then
    /// published, and `SignedIn` is emitted. On failure nothing changes and
    /// `AuthError` is emitted.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NotInitialized`] before [`initialize`](Self::initialize) completes
    /// - [`AuthError::AlreadyAuthenticated`] if a session exists
    /// - [`AuthError::LoginInProgress`] if another login is running
    /// - [`AuthError::OperationTimeout`] if the login takes longer than the login timeout
    /// - any error from the authenticator or from persisting the session
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn login(&self, credentials: Credentials) -> Result<Identity> {
        let _guard = self.login_lock.try_lock().map_err(|_| {
            warn!("Login already in progress");
            AuthError::LoginInProgress
        })?;

        match self.status() {
            SessionStatus::Initializing => return Err(AuthError::NotInitialized),
            SessionStatus::Authenticated => return Err(AuthError::AlreadyAuthenticated),
            SessionStatus::Unauthenticated => {}
        }

        info!("Signing in");
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::SigningIn));

        match self.perform_login(&credentials).await {
            Ok(identity) => {
                let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::SignedIn {
                    user_id: identity.id.to_string(),
                    role: identity.role.to_string(),
                }));
                info!(user_id = %identity.id, role = %identity.role, "Signed in");
                Ok(identity)
            }
            Err(e) => {
                warn!(error = %e, "Login failed");
                let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::AuthError {
                    message: e.to_string(),
                    recoverable: e.is_recoverable(),
                }));
                Err(e)
            }
        }
    }

    async fn perform_login(&self, credentials: &Credentials) -> Result<Identity> {
        let session = timeout(
            self.login_timeout,
            self.authenticator.authenticate(credentials),
        )
        .await
        .map_err(|_| AuthError::OperationTimeout {
            operation: "login".to_string(),
        })??;

        self.store.save(&session).await?;

        let identity = session.identity.clone();
        self.publish(SessionSnapshot::authenticated(session));
        Ok(identity)
    }

    /// Signs out. Safe to call when already signed out.
    ///
    /// Memory is cleared before storage, so the session is gone for readers
    /// even if storage fails.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Storage`] if the persisted session could not be
    /// removed.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        let previous = self.clear_memory();
        let cleared = self.store.clear().await;

        if let Some(identity) = previous {
            info!(user_id = %identity.id, "Signed out");
            let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::SignedOut {
                user_id: identity.id.to_string(),
            }));
        }

        cleared.map_err(|e| {
            error!(error = %e, "Failed to clear persisted session");
            e
        })
    }

    /// Tears the session down after the backend rejected its token.
    #[instrument(skip(self))]
    pub async fn expire_session(&self, message: &str) {
        let previous = self.clear_memory();
        self.finish_expiry(previous, message).await;
    }

    /// Expires the session if `error` is [`ApiError::SessionExpired`] and
    /// `token`, the token the failed request carried, is still the current
    /// one. A rejection of a token that has since been replaced is ignored.
    ///
    /// Returns whether the session was torn down.
    pub async fn handle_api_error(&self, error: &ApiError, token: &str) -> bool {
        let message = match error {
            ApiError::SessionExpired { message } => message,
            _ => return false,
        };

        let mut previous = None;
        let replaced = self.state.send_if_modified(|snapshot| {
            if snapshot.token.as_deref() != Some(token) {
                return false;
            }
            previous = std::mem::replace(snapshot, SessionSnapshot::unauthenticated()).identity;
            true
        });

        if !replaced {
            debug!("Ignoring rejection of a token that is no longer current");
            return false;
        }

        self.finish_expiry(previous, message).await;
        true
    }

    async fn finish_expiry(&self, previous: Option<Identity>, message: &str) {
        if let Err(e) = self.store.clear().await {
            error!(error = %e, "Failed to clear expired session");
        }

        warn!(
            user_id = previous.as_ref().map(|identity| identity.id.as_str()),
            "Session expired"
        );
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::SessionExpired {
            user_id: previous.map(|identity| identity.id.to_string()),
            message: message.to_string(),
        }));
    }

    /// Clears identity and token, returning the identity that was signed in.
    fn clear_memory(&self) -> Option<Identity> {
        let next = match self.status() {
            // Storage has not been read yet; initialize() still decides the outcome.
            SessionStatus::Initializing => SessionSnapshot::initializing(),
            _ => SessionSnapshot::unauthenticated(),
        };

        self.state.send_replace(next).identity
    }

    fn publish(&self, snapshot: SessionSnapshot) {
        debug!(status = %snapshot.status, "Session state changed");
        self.state.send_replace(snapshot);
    }

    pub fn status(&self) -> SessionStatus {
        self.state.borrow().status
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Receives every future snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.state.borrow().identity.clone()
    }

    /// True iff both an identity and a non-empty token are present.
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().token.clone()
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        permissions::has_permission(self.state.borrow().identity.as_ref(), permission)
    }

    pub fn has_all_permissions(&self, required: &[Permission]) -> bool {
        permissions::has_all_permissions(self.state.borrow().identity.as_ref(), required)
    }

    pub fn has_any_permission(&self, candidates: &[Permission]) -> bool {
        permissions::has_any_permission(self.state.borrow().identity.as_ref(), candidates)
    }

    pub fn can_manage_any(&self) -> bool {
        permissions::can_manage_any(self.state.borrow().identity.as_ref())
    }

    pub fn route(&self, guard: &RouteGuard) -> RouteDecision {
        guard.evaluate(&self.state.borrow())
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &*self.state.borrow())
            .field("login_timeout", &self.login_timeout)
            .finish()
    }
}
