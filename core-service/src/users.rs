//! # Users Service
//!
//! Account management for the dashboard's Users page.
//!
//! Every operation first checks the signed-in identity against the
//! permission it needs and fails with [`CoreError::PermissionDenied`] without
//! touching the network. Calls carry the session token; a
//! [`ApiError::SessionExpired`] answer tears the session down before the
//! error is returned.

use crate::error::{CoreError, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use core_api::{ApiClient, ApiError, ApiRequest};
use core_auth::permissions::deserialize_permissions;
use core_auth::{Permission, Role, SessionManager, UserId};
use core_runtime::events::{CoreEvent, EventBus, UserEvent};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const USERS_PATH: &str = "/users";
const REGISTER_ADMIN_PATH: &str = "/auth/register-admin";
const REGISTER_SUPERADMIN_PATH: &str = "/auth/register-superadmin";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
}

/// An account as listed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_permissions"
    )]
    pub permissions: Option<BTreeSet<Permission>>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_timestamp"
    )]
    pub last_login: Option<DateTime<Utc>>,
    pub status: UserStatus,
}

/// Timestamp shapes the backend has been seen to send: RFC 3339 text, epoch
/// milliseconds, or a Firestore `{_seconds, _nanoseconds}` object.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireTimestamp {
    Text(String),
    Millis(i64),
    Seconds {
        #[serde(rename = "_seconds", alias = "seconds")]
        seconds: i64,
        #[serde(default, rename = "_nanoseconds", alias = "nanoseconds")]
        nanoseconds: u32,
    },
}

impl WireTimestamp {
    fn into_utc(self) -> Option<DateTime<Utc>> {
        match self {
            WireTimestamp::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|parsed| parsed.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S%.f")
                        .ok()
                        .map(|naive| Utc.from_utc_datetime(&naive))
                }),
            WireTimestamp::Millis(millis) => Utc.timestamp_millis_opt(millis).single(),
            WireTimestamp::Seconds {
                seconds,
                nanoseconds,
            } => Utc.timestamp_opt(seconds, nanoseconds).single(),
        }
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    WireTimestamp::deserialize(deserializer)?
        .into_utc()
        .ok_or_else(|| serde::de::Error::custom("unrecognised timestamp"))
}

fn deserialize_optional_timestamp<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<WireTimestamp>::deserialize(deserializer)? {
        Some(wire) => wire
            .into_utc()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("unrecognised timestamp")),
        None => Ok(None),
    }
}

/// Payload for [`UsersService::create_user`].
///
/// An empty `permissions` set is replaced by the role's default grants.
#[derive(Clone, Serialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub permissions: BTreeSet<Permission>,
}

impl NewUser {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            role,
            permissions: BTreeSet::new(),
        }
    }

    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.permissions = permissions.into_iter().collect();
        self
    }
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("role", &self.role)
            .field("permissions", &self.permissions)
            .finish()
    }
}

/// Partial update for [`UsersService::update_user`]. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<BTreeSet<Permission>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
}

impl UserUpdate {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.permissions = Some(permissions.into_iter().collect());
        self
    }

    pub fn status(mut self, status: UserStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Payload for the admin registration endpoints. The role is set by the
/// endpoint used.
#[derive(Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl NewAccount {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAccount")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Serialize)]
struct RegisterBody<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
    role: Role,
}

/// Account summary returned by the registration endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegisteredAccount {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
}

#[derive(Deserialize)]
struct RegisterResponse {
    user: RegisteredAccount,
}

/// User administration against the store API.
#[derive(Clone)]
pub struct UsersService {
    api: ApiClient,
    session: Arc<SessionManager>,
    event_bus: EventBus,
}

impl UsersService {
    pub fn new(api: ApiClient, session: Arc<SessionManager>, event_bus: EventBus) -> Self {
        Self {
            api,
            session,
            event_bus,
        }
    }

    #[instrument(skip(self))]
    pub async fn list_users(&self) -> Result<Vec<User>> {
        let token = self.authorize(Permission::ViewUsers)?;
        let users: Vec<User> = self.send(&ApiRequest::get(USERS_PATH), &token).await?;

        debug!(count = users.len(), "Fetched users");
        Ok(users)
    }

    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn get_user(&self, id: &UserId) -> Result<User> {
        let token = self.authorize(Permission::ViewUsers)?;
        self.send(&ApiRequest::get(user_path(id)), &token).await
    }

    #[instrument(skip(self, user), fields(email = %user.email, role = %user.role))]
    pub async fn create_user(&self, mut user: NewUser) -> Result<User> {
        let token = self.authorize(Permission::CreateUser)?;

        if user.permissions.is_empty() {
            user.permissions = user.role.default_grants();
        }

        let request = ApiRequest::post(USERS_PATH).json(&user)?;
        let created: User = self.send(&request, &token).await?;

        info!(user_id = %created.id, "Created user");
        self.emit(UserEvent::Created {
            user_id: created.id.to_string(),
            role: created.role.to_string(),
        });
        Ok(created)
    }

    #[instrument(skip(self, update), fields(user_id = %id))]
    pub async fn update_user(&self, id: &UserId, mut update: UserUpdate) -> Result<User> {
        let token = self.authorize(Permission::UpdateUser)?;

        if let (Some(role), None) = (update.role, update.permissions.as_ref()) {
            update.permissions = Some(role.default_grants());
        }

        self.put_user(id, &update, &token).await
    }

    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn delete_user(&self, id: &UserId) -> Result<()> {
        let token = self.authorize(Permission::DeleteUser)?;
        let _: IgnoredAny = self.send(&ApiRequest::delete(user_path(id)), &token).await?;

        info!("Deleted user");
        self.emit(UserEvent::Deleted {
            user_id: id.to_string(),
        });
        Ok(())
    }

    #[instrument(skip(self, password), fields(user_id = %id))]
    pub async fn update_password(&self, id: &UserId, password: &str) -> Result<()> {
        let token = self.authorize(Permission::UpdateUser)?;

        let request = ApiRequest::put(format!("{}/password", user_path(id)))
            .json(&serde_json::json!({ "password": password }))?;
        let _: IgnoredAny = self.send(&request, &token).await?;

        info!("Updated user password");
        Ok(())
    }

    #[instrument(skip(self, permissions), fields(user_id = %id))]
    pub async fn update_permissions(
        &self,
        id: &UserId,
        permissions: BTreeSet<Permission>,
    ) -> Result<User> {
        let token = self.authorize(Permission::ManageUserPermissions)?;

        let update = UserUpdate {
            permissions: Some(permissions),
            ..UserUpdate::default()
        };
        self.put_user(id, &update, &token).await
    }

    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn update_status(&self, id: &UserId, status: UserStatus) -> Result<User> {
        let token = self.authorize(Permission::UpdateUser)?;
        self.put_user(id, &UserUpdate::default().status(status), &token)
            .await
    }

    #[instrument(skip(self, account), fields(email = %account.email))]
    pub async fn register_admin(&self, account: &NewAccount) -> Result<RegisteredAccount> {
        let token = self.authorize(Permission::CreateUser)?;
        self.register(REGISTER_ADMIN_PATH, account, Role::Admin, &token)
            .await
    }

    #[instrument(skip(self, account), fields(email = %account.email))]
    pub async fn register_superadmin(&self, account: &NewAccount) -> Result<RegisteredAccount> {
        let token = self.session_token()?;
        let is_superadmin = self
            .session
            .current_identity()
            .map_or(false, |identity| identity.role == Role::SuperAdmin);
        if !is_superadmin {
            warn!("Superadmin registration refused");
            return Err(CoreError::permission_denied(Role::SuperAdmin));
        }

        self.register(REGISTER_SUPERADMIN_PATH, account, Role::SuperAdmin, &token)
            .await
    }

    async fn register(
        &self,
        path: &str,
        account: &NewAccount,
        role: Role,
        token: &str,
    ) -> Result<RegisteredAccount> {
        let request = ApiRequest::post(path).json(&RegisterBody {
            name: &account.name,
            email: &account.email,
            password: &account.password,
            role,
        })?;
        let response: RegisterResponse = self.send(&request, token).await?;

        info!(user_id = %response.user.id, role = %role, "Registered account");
        self.emit(UserEvent::Created {
            user_id: response.user.id.to_string(),
            role: role.to_string(),
        });
        Ok(response.user)
    }

    async fn put_user(&self, id: &UserId, update: &UserUpdate, token: &str) -> Result<User> {
        let request = ApiRequest::put(user_path(id)).json(update)?;
        let updated: User = self.send(&request, token).await?;

        info!("Updated user");
        self.emit(UserEvent::Updated {
            user_id: updated.id.to_string(),
        });
        Ok(updated)
    }

    /// Returns the session token if the signed-in identity holds `permission`.
    fn authorize(&self, permission: Permission) -> Result<String> {
        let token = self.session_token()?;

        if !self.session.has_permission(permission) {
            warn!(permission = %permission, "Permission denied");
            return Err(CoreError::permission_denied(permission));
        }

        Ok(token)
    }

    fn session_token(&self) -> Result<String> {
        match self.session.token() {
            Some(token) if self.session.is_authenticated() => Ok(token),
            _ => Err(ApiError::session_expired(None).into()),
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: &ApiRequest, token: &str) -> Result<T> {
        match self.api.execute(request, Some(token)).await {
            Ok(value) => Ok(value),
            Err(error) => {
                self.session.handle_api_error(&error, token).await;
                Err(error.into())
            }
        }
    }

    fn emit(&self, event: UserEvent) {
        let _ = self.event_bus.emit(CoreEvent::Users(event));
    }
}

impl fmt::Debug for UsersService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsersService")
            .field("api", &self.api)
            .finish_non_exhaustive()
    }
}

/// `/users/{id}` with the id encoded as a single path segment.
fn user_path(id: &UserId) -> String {
    format!("{}/{}", USERS_PATH, urlencoding::encode(id.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_user_decodes_backend_shape() {
        let user: User = serde_json::from_value(json!({
            "id": "7",
            "name": "Bo",
            "email": "bo@x.com",
            "role": "admin",
            "permissions": ["view_users", "retired_flag"],
            "createdAt": "2024-03-01T10:00:00Z",
            "status": "inactive"
        }))
        .unwrap();

        assert_eq!(user.id.as_str(), "7");
        assert_eq!(user.role, Role::Admin);
        assert_eq!(
            user.permissions,
            Some([Permission::ViewUsers].into_iter().collect())
        );
        assert!(user.last_login.is_none());
        assert_eq!(user.status, UserStatus::Inactive);
    }

    #[test]
    fn test_timestamp_shapes() {
        let mut raw = json!({
            "id": "7",
            "name": "Bo",
            "email": "bo@x.com",
            "role": "user",
            "createdAt": {"_seconds": 1709287200, "_nanoseconds": 0},
            "lastLogin": 1709287200000i64,
            "status": "active"
        });

        let user: User = serde_json::from_value(raw.clone()).unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(user.created_at, expected);
        assert_eq!(user.last_login, Some(expected));

        raw["createdAt"] = json!("2024-03-01T10:00:00.000");
        raw["lastLogin"] = Value::Null;
        let user: User = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(user.created_at, expected);
        assert!(user.last_login.is_none());

        raw["createdAt"] = json!("last tuesday");
        assert!(serde_json::from_value::<User>(raw).is_err());
    }

    #[test]
    fn test_user_path_encodes_id() {
        assert_eq!(user_path(&UserId::from("7")), "/users/7");
        assert_eq!(user_path(&UserId::from("7/password")), "/users/7%2Fpassword");
        assert_eq!(user_path(&UserId::from("a b?")), "/users/a%20b%3F");
    }

    #[test]
    fn test_update_skips_unset_fields() {
        let body = serde_json::to_value(UserUpdate::default().status(UserStatus::Active)).unwrap();
        assert_eq!(body, json!({"status": "active"}));
    }

    #[test]
    fn test_new_user_debug_redacts_password() {
        let user = NewUser::new("Bo", "bo@x.com", "hunter2", Role::Admin);
        assert!(!format!("{:?}", user).contains("hunter2"));
    }
}
