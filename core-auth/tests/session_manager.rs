use async_trait::async_trait;
use bridge_desktop::SqliteSettingsStore;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::storage::{SettingsStore, SettingsTransaction};
use core_api::ApiError;
use core_auth::session_store::{TOKEN_KEY, USER_KEY};
use core_auth::{
    AuthError, Authenticator, Credentials, Identity, Permission, Role, RouteDecision, RouteGuard,
    Session, SessionManager, SessionStatus, SessionStore, UserId,
};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use mockall::mock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};

mock! {
    pub Auth {}

    #[async_trait]
    impl Authenticator for Auth {
        async fn authenticate(&self, credentials: &Credentials) -> core_auth::Result<Session>;
    }
}

/// In-memory settings with switchable write failures.
#[derive(Default)]
struct MemorySettings {
    values: Arc<Mutex<HashMap<String, String>>>,
    fail_writes: Arc<AtomicBool>,
}

struct MemoryTransaction {
    values: Arc<Mutex<HashMap<String, String>>>,
    staged: Vec<(String, Option<String>)>,
    fail_writes: Arc<AtomicBool>,
}

impl MemorySettings {
    fn shared(&self) -> Self {
        Self {
            values: self.values.clone(),
            fail_writes: self.fail_writes.clone(),
        }
    }

    fn failure(&self) -> BridgeResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BridgeError::DatabaseError("disk full".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()> {
        self.failure()?;
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_string(&self, key: &str) -> BridgeResult<Option<String>> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> BridgeResult<()> {
        self.failure()?;
        self.values.lock().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> BridgeResult<Vec<String>> {
        Ok(self.values.lock().await.keys().cloned().collect())
    }

    async fn clear_all(&self) -> BridgeResult<()> {
        self.values.lock().await.clear();
        Ok(())
    }

    async fn begin_transaction(&self) -> BridgeResult<Box<dyn SettingsTransaction + Send>> {
        Ok(Box::new(MemoryTransaction {
            values: self.values.clone(),
            staged: Vec::new(),
            fail_writes: self.fail_writes.clone(),
        }))
    }
}

#[async_trait]
impl SettingsTransaction for MemoryTransaction {
    async fn set_string(&mut self, key: &str, value: &str) -> BridgeResult<()> {
        self.staged.push((key.to_string(), Some(value.to_string())));
        Ok(())
    }

    async fn delete(&mut self, key: &str) -> BridgeResult<()> {
        self.staged.push((key.to_string(), None));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> BridgeResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BridgeError::DatabaseError("disk full".to_string()));
        }
        let mut values = self.values.lock().await;
        for (key, value) in self.staged {
            match value {
                Some(value) => values.insert(key, value),
                None => values.remove(&key),
            };
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> BridgeResult<()> {
        Ok(())
    }
}

/// Authenticator that never answers in time.
struct SlowAuth {
    delay: Duration,
}

#[async_trait]
impl Authenticator for SlowAuth {
    async fn authenticate(&self, _credentials: &Credentials) -> core_auth::Result<Session> {
        sleep(self.delay).await;
        Ok(session("t1", Role::Admin))
    }
}

fn session(token: &str, role: Role) -> Session {
    Session {
        token: token.to_string(),
        identity: Identity {
            id: UserId::from("1"),
            email: "a@x.com".to_string(),
            display_name: "A".to_string(),
            role,
            permissions: None,
        },
    }
}

fn credentials() -> Credentials {
    Credentials::new("a@x.com", "secret")
}

fn manager_with(
    authenticator: impl Authenticator + 'static,
    settings: &MemorySettings,
    bus: &EventBus,
) -> SessionManager {
    SessionManager::new(
        SessionStore::new(Arc::new(settings.shared())),
        Arc::new(authenticator),
        bus.clone(),
    )
}

fn accepting(token: &'static str, role: Role) -> MockAuth {
    let mut auth = MockAuth::new();
    auth.expect_authenticate()
        .times(1)
        .returning(move |_| Ok(session(token, role)));
    auth
}

#[tokio::test]
async fn test_initialize_without_stored_session() {
    let settings = MemorySettings::default();
    let manager = manager_with(MockAuth::new(), &settings, &EventBus::default());

    assert_eq!(manager.status(), SessionStatus::Initializing);
    manager.initialize().await.unwrap();

    assert_eq!(manager.status(), SessionStatus::Unauthenticated);
    assert!(manager.current_identity().is_none());
    assert!(!manager.is_authenticated());
}

#[tokio::test]
async fn test_login_persists_and_publishes() {
    let settings = MemorySettings::default();
    let bus = EventBus::default();
    let mut events = bus.subscribe();
    let manager = manager_with(accepting("t1", Role::Admin), &settings, &bus);
    manager.initialize().await.unwrap();

    let identity = manager.login(credentials()).await.unwrap();

    assert_eq!(identity.id.as_str(), "1");
    assert!(manager.is_authenticated());
    assert_eq!(manager.token().as_deref(), Some("t1"));
    assert_eq!(manager.current_identity().unwrap().role, Role::Admin);

    let stored = settings.values.lock().await.clone();
    assert_eq!(stored.get(TOKEN_KEY).map(String::as_str), Some("t1"));
    assert!(stored.get(USER_KEY).unwrap().contains("a@x.com"));

    assert_eq!(
        events.recv().await.unwrap(),
        CoreEvent::Auth(AuthEvent::SigningIn)
    );
    assert_eq!(
        events.recv().await.unwrap(),
        CoreEvent::Auth(AuthEvent::SignedIn {
            user_id: "1".to_string(),
            role: "admin".to_string(),
        })
    );
}

#[tokio::test]
async fn test_admin_defaults_after_login() {
    let settings = MemorySettings::default();
    let manager = manager_with(accepting("t1", Role::Admin), &settings, &EventBus::default());
    manager.initialize().await.unwrap();
    manager.login(credentials()).await.unwrap();

    assert!(manager.has_permission(Permission::ViewOrders));
    assert!(!manager.has_permission(Permission::ManageUsers));
    assert!(!manager.can_manage_any());
    assert_eq!(
        manager.route(&RouteGuard::admin_with([Permission::ManageUsers])),
        RouteDecision::RedirectToDashboard
    );
}

#[tokio::test]
async fn test_failed_login_leaves_state_untouched() {
    let settings = MemorySettings::default();
    let bus = EventBus::default();
    let mut events = bus.subscribe();

    let mut auth = MockAuth::new();
    auth.expect_authenticate().times(1).returning(|_| {
        Err(AuthError::Api(ApiError::authentication_failed(Some(
            "Invalid email or password".to_string(),
        ))))
    });
    let manager = manager_with(auth, &settings, &bus);
    manager.initialize().await.unwrap();

    let err = manager.login(credentials()).await.unwrap_err();

    assert!(matches!(
        err,
        AuthError::Api(ApiError::AuthenticationFailed { .. })
    ));
    assert_eq!(err.user_message().title, "Invalid Credentials");
    assert_eq!(manager.status(), SessionStatus::Unauthenticated);
    assert!(manager.current_identity().is_none());
    assert!(settings.values.lock().await.is_empty());

    assert_eq!(
        events.recv().await.unwrap(),
        CoreEvent::Auth(AuthEvent::SigningIn)
    );
    match events.recv().await.unwrap() {
        CoreEvent::Auth(AuthEvent::AuthError {
            message,
            recoverable,
        }) => {
            assert_eq!(message, "Invalid email or password");
            assert!(recoverable);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_storage_failure_aborts_login() {
    let settings = MemorySettings::default();
    let manager = manager_with(accepting("t1", Role::Admin), &settings, &EventBus::default());
    manager.initialize().await.unwrap();
    settings.fail_writes.store(true, Ordering::SeqCst);

    let err = manager.login(credentials()).await.unwrap_err();

    assert!(matches!(err, AuthError::Storage(_)));
    assert!(!manager.is_authenticated());
}

#[tokio::test]
async fn test_login_preconditions() {
    let settings = MemorySettings::default();
    let manager = manager_with(accepting("t1", Role::Admin), &settings, &EventBus::default());

    assert!(matches!(
        manager.login(credentials()).await,
        Err(AuthError::NotInitialized)
    ));

    manager.initialize().await.unwrap();
    manager.login(credentials()).await.unwrap();

    assert!(matches!(
        manager.login(credentials()).await,
        Err(AuthError::AlreadyAuthenticated)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_login_times_out() {
    let settings = MemorySettings::default();
    let manager = manager_with(
        SlowAuth {
            delay: Duration::from_secs(3600),
        },
        &settings,
        &EventBus::default(),
    )
    .with_login_timeout(Duration::from_secs(60));
    manager.initialize().await.unwrap();

    let started = Instant::now();
    let err = manager.login(credentials()).await.unwrap_err();

    assert!(matches!(err, AuthError::OperationTimeout { .. }));
    assert_eq!(started.elapsed(), Duration::from_secs(60));
    assert_eq!(manager.status(), SessionStatus::Unauthenticated);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_login_is_rejected() {
    let settings = MemorySettings::default();
    let manager = Arc::new(manager_with(
        SlowAuth {
            delay: Duration::from_secs(5),
        },
        &settings,
        &EventBus::default(),
    ));
    manager.initialize().await.unwrap();

    let first = tokio::spawn({
        let manager = manager.clone();
        async move { manager.login(credentials()).await }
    });
    tokio::task::yield_now().await;

    assert!(matches!(
        manager.login(credentials()).await,
        Err(AuthError::LoginInProgress)
    ));
    assert!(first.await.unwrap().is_ok());
    assert!(manager.is_authenticated());
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let settings = MemorySettings::default();
    let bus = EventBus::default();
    let manager = manager_with(accepting("t1", Role::Admin), &settings, &bus);
    manager.initialize().await.unwrap();
    manager.login(credentials()).await.unwrap();

    let mut events = bus.subscribe();
    manager.logout().await.unwrap();
    manager.logout().await.unwrap();

    assert_eq!(manager.status(), SessionStatus::Unauthenticated);
    assert!(manager.token().is_none());
    assert!(settings.values.lock().await.is_empty());

    assert_eq!(
        events.recv().await.unwrap(),
        CoreEvent::Auth(AuthEvent::SignedOut {
            user_id: "1".to_string()
        })
    );
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_logout_clears_memory_when_storage_fails() {
    let settings = MemorySettings::default();
    let manager = manager_with(accepting("t1", Role::Admin), &settings, &EventBus::default());
    manager.initialize().await.unwrap();
    manager.login(credentials()).await.unwrap();
    settings.fail_writes.store(true, Ordering::SeqCst);

    let err = manager.logout().await.unwrap_err();

    assert!(matches!(err, AuthError::Storage(_)));
    assert!(!manager.is_authenticated());
    assert!(manager.current_identity().is_none());
}

#[tokio::test]
async fn test_session_expired_tears_down_session() {
    let settings = MemorySettings::default();
    let bus = EventBus::default();
    let manager = manager_with(accepting("t1", Role::SuperAdmin), &settings, &bus);
    manager.initialize().await.unwrap();
    manager.login(credentials()).await.unwrap();
    let mut events = bus.subscribe();

    assert!(
        !manager
            .handle_api_error(&ApiError::server_error(500, serde_json::json!({})), "t1")
            .await
    );
    assert!(manager.is_authenticated());

    assert!(
        manager
            .handle_api_error(
                &ApiError::session_expired(Some("expired".to_string())),
                "t1"
            )
            .await
    );

    assert!(!manager.is_authenticated());
    assert!(settings.values.lock().await.is_empty());
    assert_eq!(
        events.recv().await.unwrap(),
        CoreEvent::Auth(AuthEvent::SessionExpired {
            user_id: Some("1".to_string()),
            message: "expired".to_string(),
        })
    );
}

#[tokio::test]
async fn test_rejection_of_replaced_token_keeps_session() {
    let settings = MemorySettings::default();
    let bus = EventBus::default();
    let manager = manager_with(accepting("fresh", Role::Admin), &settings, &bus);
    manager.initialize().await.unwrap();
    manager.login(credentials()).await.unwrap();

    // A request sent with an earlier token fails after the user signed in again.
    assert!(
        !manager
            .handle_api_error(&ApiError::session_expired(None), "old")
            .await
    );

    assert!(manager.is_authenticated());
    assert_eq!(manager.token().as_deref(), Some("fresh"));
    assert!(!settings.values.lock().await.is_empty());
}

#[tokio::test]
async fn test_corrupted_storage_starts_signed_out() {
    let settings = MemorySettings::default();
    settings
        .values
        .lock()
        .await
        .insert(TOKEN_KEY.to_string(), "t1".to_string());
    let manager = manager_with(MockAuth::new(), &settings, &EventBus::default());

    manager.initialize().await.unwrap();

    assert_eq!(manager.status(), SessionStatus::Unauthenticated);
    assert!(settings.values.lock().await.is_empty());
}

#[tokio::test]
async fn test_subscribers_see_transitions() {
    let settings = MemorySettings::default();
    let manager = manager_with(accepting("t1", Role::Admin), &settings, &EventBus::default());
    let mut snapshots = manager.subscribe();

    manager.initialize().await.unwrap();
    snapshots.changed().await.unwrap();
    assert_eq!(
        snapshots.borrow_and_update().status,
        SessionStatus::Unauthenticated
    );

    manager.login(credentials()).await.unwrap();
    snapshots.changed().await.unwrap();
    assert!(snapshots.borrow_and_update().is_authenticated());
}

#[tokio::test]
async fn test_session_survives_restart() {
    let settings = Arc::new(SqliteSettingsStore::in_memory().await.unwrap());
    let bus = EventBus::default();

    let first = SessionManager::new(
        SessionStore::new(settings.clone()),
        Arc::new(accepting("t1", Role::Admin)),
        bus.clone(),
    );
    first.initialize().await.unwrap();
    first.login(credentials()).await.unwrap();

    let mut events = bus.subscribe();
    let second = SessionManager::new(
        SessionStore::new(settings.clone()),
        Arc::new(MockAuth::new()),
        bus.clone(),
    );
    second.initialize().await.unwrap();
    second.initialize().await.unwrap();

    assert_eq!(second.status(), SessionStatus::Authenticated);
    assert_eq!(second.token().as_deref(), Some("t1"));
    assert_eq!(second.current_identity(), first.current_identity());
    assert_eq!(
        events.recv().await.unwrap(),
        CoreEvent::Auth(AuthEvent::SessionRestored {
            user_id: "1".to_string(),
            role: "admin".to_string(),
        })
    );
    assert!(events.try_recv().is_err());
}
