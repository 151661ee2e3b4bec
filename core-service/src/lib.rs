//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP transport and
//! settings storage) into the admin core. Desktop apps typically enable the
//! `desktop-shims` feature, which lets [`AdminConfig`] fall back to the
//! reqwest transport and the SQLite settings store; headless hosts inject
//! both themselves.
//!
//! ```no_run
//! # async fn example() -> core_service::Result<()> {
//! use core_runtime::config::AdminConfig;
//! use core_service::bootstrap;
//! use core_auth::Credentials;
//!
//! let config = AdminConfig::builder().with_env()?.build()?;
//! let core = bootstrap(config).await?;
//!
//! if !core.session().is_authenticated() {
//!     core.login(Credentials::new("owner@urbansole.com", "secret")).await?;
//! }
//! let users = core.users().list_users().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod users;

pub use error::{CoreError, Result};
pub use users::{
    NewAccount, NewUser, RegisteredAccount, User, UserStatus, UserUpdate, UsersService,
};

use std::sync::Arc;

use core_api::ApiClient;
use core_auth::{ApiAuthenticator, Credentials, Identity, SessionManager, SessionStore};
use core_runtime::config::AdminConfig;
use core_runtime::events::{EventBus, EventStream};
use tracing::{info, instrument};

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct AdminCore {
    event_bus: EventBus,
    api: ApiClient,
    session: Arc<SessionManager>,
    users: UsersService,
}

impl AdminCore {
    /// Wires the services from `config`. The session is still `Initializing`;
    /// use [`bootstrap`] to also restore it.
    pub fn new(config: &AdminConfig) -> Self {
        let event_bus = EventBus::new(config.event_buffer_size);
        let api = ApiClient::from_config(config);

        let session = Arc::new(
            SessionManager::new(
                SessionStore::new(config.settings_store.clone()),
                Arc::new(ApiAuthenticator::new(api.clone())),
                event_bus.clone(),
            )
            .with_login_timeout(config.login_timeout),
        );

        let users = UsersService::new(api.clone(), session.clone(), event_bus.clone());

        Self {
            event_bus,
            api,
            session,
            users,
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn users(&self) -> &UsersService {
        &self.users
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Stream of every event emitted from now on.
    pub fn events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    pub async fn login(&self, credentials: Credentials) -> Result<Identity> {
        Ok(self.session.login(credentials).await?)
    }

    pub async fn logout(&self) -> Result<()> {
        Ok(self.session.logout().await?)
    }
}

impl std::fmt::Debug for AdminCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCore")
            .field("api", &self.api)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// Validates `config`, builds the core and restores any persisted session.
///
/// # Errors
///
/// Fails if the configuration is invalid or the session store cannot be read.
#[instrument(skip(config), fields(api_base_url = %config.api_base_url))]
pub async fn bootstrap(config: AdminConfig) -> Result<AdminCore> {
    config.validate()?;

    let core = AdminCore::new(&config);
    core.session.initialize().await?;

    info!(status = %core.session.status(), "Admin core ready");
    Ok(core)
}
