//! Persisted Session Storage
//!
//! The session lives under two keys of the host's [`SettingsStore`]: `token`
//! (opaque bearer token) and `user` (JSON identity). Both are written and
//! removed in a single transaction so storage never holds half a session.
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::SessionStore;
//! use std::sync::Arc;
//! # use bridge_traits::storage::SettingsStore;
//! # async fn example(settings: Arc<dyn SettingsStore>) -> core_auth::Result<()> {
//! let store = SessionStore::new(settings);
//!
//! if let Some(session) = store.load().await? {
//!     println!("restored {}", session.identity.email);
//! }
//!
//! store.clear().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::{Identity, Session};
use bridge_traits::storage::SettingsStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

/// Persistence for the signed-in session.
///
/// Token values are never logged.
#[derive(Clone)]
pub struct SessionStore {
    settings: Arc<dyn SettingsStore>,
}

impl SessionStore {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self { settings }
    }

    /// Writes token and identity atomically.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Storage`] if the transaction fails; nothing is
    /// written in that case.
    pub async fn save(&self, session: &Session) -> Result<()> {
        let user_json = serde_json::to_string(&session.identity)
            .map_err(|e| AuthError::SessionCorrupted(format!("Failed to encode identity: {}", e)))?;

        let mut tx = self.settings.begin_transaction().await?;

        let staged = async {
            tx.set_string(TOKEN_KEY, &session.token).await?;
            tx.set_string(USER_KEY, &user_json).await
        }
        .await;

        if let Err(e) = staged {
            warn!(error = %e, "Failed to stage session write, rolling back");
            if let Err(rollback_error) = tx.rollback().await {
                warn!(error = %rollback_error, "Rollback of session write failed");
            }
            return Err(e.into());
        }

        tx.commit().await?;

        info!(user_id = %session.identity.id, "Persisted session");
        Ok(())
    }

    /// Reads the persisted session.
    ///
    /// Returns `Ok(None)` when nothing is stored.
    ///
    /// # Errors
    ///
    /// - [`AuthError::SessionCorrupted`] if only one key is present, the token
    ///   is empty or the identity does not parse. The keys are cleared first.
    /// - [`AuthError::Storage`] if the store cannot be read.
    pub async fn load(&self) -> Result<Option<Session>> {
        let token = self.settings.get_string(TOKEN_KEY).await?;
        let user_json = self.settings.get_string(USER_KEY).await?;

        let problem = match (token, user_json) {
            (None, None) => {
                debug!("No persisted session");
                return Ok(None);
            }
            (Some(token), Some(user_json)) => {
                if token.trim().is_empty() {
                    "token is empty".to_string()
                } else {
                    match serde_json::from_str::<Identity>(&user_json) {
                        Ok(identity) => {
                            debug!(user_id = %identity.id, "Loaded persisted session");
                            return Ok(Some(Session { token, identity }));
                        }
                        Err(e) => format!("identity does not parse: {}", e),
                    }
                }
            }
            (Some(_), None) => "token without identity".to_string(),
            (None, Some(_)) => "identity without token".to_string(),
        };

        warn!(reason = %problem, "Discarding corrupted persisted session");
        if let Err(e) = self.clear().await {
            warn!(error = %e, "Failed to clear corrupted session");
        }

        Err(AuthError::SessionCorrupted(problem))
    }

    /// Removes token and identity atomically. Clearing an empty store succeeds.
    pub async fn clear(&self) -> Result<()> {
        let mut tx = self.settings.begin_transaction().await?;

        let staged = async {
            tx.delete(TOKEN_KEY).await?;
            tx.delete(USER_KEY).await
        }
        .await;

        if let Err(e) = staged {
            if let Err(rollback_error) = tx.rollback().await {
                warn!(error = %rollback_error, "Rollback of session clear failed");
            }
            return Err(e.into());
        }

        tx.commit().await?;

        debug!("Cleared persisted session");
        Ok(())
    }
}
