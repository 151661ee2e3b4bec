//! # Admin Configuration Module
//!
//! Provides configuration management for the Urban Sole admin core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct an `AdminConfig`
//! instance holding the bridges and settings the API client and session
//! manager need. It enforces fail-fast validation so a misconfigured host
//! learns about it at startup rather than on the first request.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - transport for every backend call
//! - `SettingsStore` - persisted session (token + identity)
//!
//! When the `desktop-shims` feature is enabled, `ReqwestHttpClient` and a
//! `SqliteSettingsStore` at [`AdminConfig::session_db_path`] are injected
//! automatically if not provided.
//!
//! ## Environment overrides
//!
//! [`AdminConfigBuilder::with_env`] reads:
//!
//! | Variable | Effect |
//! |---|---|
//! | `URBAN_SOLE_API_URL` | API base URL |
//! | `URBAN_SOLE_REQUEST_TIMEOUT_MS` | Per-attempt request timeout in milliseconds |
//! | `URBAN_SOLE_SESSION_DB` | Path of the desktop session database |
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::AdminConfig;
//! use std::time::Duration;
//!
//! let config = AdminConfig::builder()
//!     .api_base_url("https://admin.example.com/api")
//!     .request_timeout(Duration::from_secs(10))
//!     .with_env()?
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{HttpClient, RetryPolicy, SettingsStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Backend used when no base URL is configured.
pub const DEFAULT_API_BASE_URL: &str = "https://shopify-server-ws3z.onrender.com/api";

/// Per-attempt request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Upper bound on a whole login operation, retries included.
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(60);

pub const ENV_API_URL: &str = "URBAN_SOLE_API_URL";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "URBAN_SOLE_REQUEST_TIMEOUT_MS";
pub const ENV_SESSION_DB: &str = "URBAN_SOLE_SESSION_DB";

/// Runtime configuration for the admin core.
///
/// Use [`AdminConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct AdminConfig {
    /// Base URL every request path is appended to (no trailing slash)
    pub api_base_url: String,

    /// Timeout applied to each request attempt
    pub request_timeout: Duration,

    /// Attempt count and delay between attempts
    pub retry_policy: RetryPolicy,

    /// Timeout applied to a login operation as a whole
    pub login_timeout: Duration,

    /// HTTP transport
    pub http_client: Arc<dyn HttpClient>,

    /// Persisted storage for the session
    pub settings_store: Arc<dyn SettingsStore>,

    /// Location of the desktop session database
    pub session_db_path: PathBuf,

    /// Capacity of the event bus channel
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig")
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout", &self.request_timeout)
            .field("retry_policy", &self.retry_policy)
            .field("login_timeout", &self.login_timeout)
            .field("http_client", &"HttpClient { ... }")
            .field("settings_store", &"SettingsStore { ... }")
            .field("session_db_path", &self.session_db_path)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl AdminConfig {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::AdminConfig;
    ///
    /// let builder = AdminConfig::builder();
    /// ```
    pub fn builder() -> AdminConfigBuilder {
        AdminConfigBuilder::default()
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<()> {
        validate_base_url(&self.api_base_url)?;

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        if self.login_timeout.is_zero() {
            return Err(Error::Config(
                "Login timeout must be greater than zero".to_string(),
            ));
        }

        if self.retry_policy.max_attempts == 0 {
            return Err(Error::Config(
                "Retry policy must allow at least one attempt".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Default location of the desktop session database.
pub fn default_session_db_path() -> PathBuf {
    PathBuf::from("urban-sole-admin").join("session.db")
}

/// Parses `raw`, requires an http(s) scheme and returns it without the
/// trailing slash.
fn validate_base_url(raw: &str) -> Result<String> {
    let invalid = |reason: String| Error::InvalidUrl {
        value: raw.to_string(),
        reason,
    };

    let parsed = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    }

    if parsed.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }

    Ok(raw.trim_end_matches('/').to_string())
}

#[cfg_attr(feature = "desktop-shims", allow(dead_code))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required to reach the store API. \
                 Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
                 Other hosts: inject a client backed by the platform's networking stack."
            .to_string(),
    }
}

#[cfg_attr(feature = "desktop-shims", allow(dead_code))]
fn settings_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "SettingsStore implementation is required to persist the signed-in session. \
                 Desktop: enable the 'desktop-shims' feature to use the default SqliteSettingsStore. \
                 Web: inject a localStorage-backed store."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(timeout).map_err(|e| {
        Error::Internal(format!("Failed to initialize default HttpClient: {}", e))
    })?;

    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(session_db_path: &Path) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;
    use std::thread;
    use tokio::runtime::{Handle, Runtime};

    let init_store = |path: PathBuf| -> Result<_> {
        let runtime = Runtime::new().map_err(|e| {
            Error::Internal(format!(
                "Failed to create Tokio runtime for default settings store: {}",
                e
            ))
        })?;

        runtime
            .block_on(SqliteSettingsStore::new(path))
            .map_err(|e| {
                Error::Internal(format!("Failed to initialize default SettingsStore: {}", e))
            })
    };

    // block_on panics on a runtime worker, so build the store on its own thread.
    let store = match Handle::try_current() {
        Ok(_) => {
            let path = session_db_path.to_path_buf();
            thread::spawn(move || init_store(path))
                .join()
                .map_err(|_| {
                    Error::Internal(
                        "Worker thread panicked while creating default SettingsStore".to_string(),
                    )
                })??
        }
        Err(_) => init_store(session_db_path.to_path_buf())?,
    };

    let store: Arc<dyn SettingsStore> = Arc::new(store);
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(_session_db_path: &Path) -> Result<Arc<dyn SettingsStore>> {
    Err(settings_store_missing_error())
}

/// Builder for constructing [`AdminConfig`] instances.
#[derive(Default)]
pub struct AdminConfigBuilder {
    api_base_url: Option<String>,
    request_timeout: Option<Duration>,
    retry_policy: Option<RetryPolicy>,
    login_timeout: Option<Duration>,
    http_client: Option<Arc<dyn HttpClient>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    session_db_path: Option<PathBuf>,
    event_buffer_size: Option<usize>,
}

impl AdminConfigBuilder {
    /// Sets the API base URL.
    ///
    /// Default: [`DEFAULT_API_BASE_URL`]
    ///
    /// ```
    /// use core_runtime::config::AdminConfig;
    ///
    /// let builder = AdminConfig::builder()
    ///     .api_base_url("http://localhost:5000/api");
    /// ```
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Sets the per-attempt request timeout. Default: 15 seconds.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the retry policy. Default: 2 attempts, linear 1 second delay.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Sets the whole-operation login timeout. Default: 60 seconds.
    pub fn login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = Some(timeout);
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the desktop default (reqwest-based) is used when the
    /// `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the settings store used to persist the session.
    ///
    /// If not provided, a SQLite store at the session database path is used
    /// when the `desktop-shims` feature is enabled.
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Sets the session database path used by the desktop settings store.
    pub fn session_db_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.session_db_path = Some(path.into());
        self
    }

    /// Sets the event bus capacity. Default: 100.
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Applies overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `URBAN_SOLE_REQUEST_TIMEOUT_MS` is not a
    /// positive integer.
    pub fn with_env(self) -> Result<Self> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    /// Applies overrides read through `lookup`. Blank values are ignored.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(url) = read(ENV_API_URL) {
            self.api_base_url = Some(url);
        }

        if let Some(raw) = read(ENV_REQUEST_TIMEOUT_MS) {
            let millis = raw.parse::<u64>().ok().filter(|ms| *ms > 0).ok_or_else(|| {
                Error::Config(format!(
                    "{} must be a positive number of milliseconds, got '{}'",
                    ENV_REQUEST_TIMEOUT_MS, raw
                ))
            })?;
            self.request_timeout = Some(Duration::from_millis(millis));
        }

        if let Some(path) = read(ENV_SESSION_DB) {
            self.session_db_path = Some(PathBuf::from(path));
        }

        Ok(self)
    }

    /// Builds the final `AdminConfig` instance.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if the base URL does not parse or is not http(s)
    /// - [`Error::Config`] if a numeric setting is out of range
    /// - [`Error::CapabilityMissing`] if a bridge is missing and no desktop
    ///   default is available
    pub fn build(self) -> Result<AdminConfig> {
        let api_base_url = validate_base_url(
            self.api_base_url
                .as_deref()
                .unwrap_or(DEFAULT_API_BASE_URL),
        )?;

        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        let session_db_path = self.session_db_path.unwrap_or_else(default_session_db_path);

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(request_timeout)?,
        };

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(&session_db_path)?,
        };

        let config = AdminConfig {
            api_base_url,
            request_timeout,
            retry_policy: self.retry_policy.unwrap_or_default(),
            login_timeout: self.login_timeout.unwrap_or(DEFAULT_LOGIN_TIMEOUT),
            http_client,
            settings_store,
            session_db_path,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
