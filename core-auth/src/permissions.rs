//! # Permission Resolution
//!
//! Closed set of permission flags and the rules deciding whether an identity
//! holds one.
//!
//! ## Rules
//!
//! - No identity: nothing is granted.
//! - `superadmin`: everything is granted.
//! - `admin`: [`DEFAULT_ADMIN_PERMISSIONS`] plus explicit grants.
//! - anyone else: explicit grants only.
//!
//! ```
//! use core_auth::permissions::has_permission;
//! use core_auth::{Identity, Permission, Role, UserId};
//!
//! let admin = Identity {
//!     id: UserId::from("1"),
//!     email: "a@x.com".to_string(),
//!     display_name: "A".to_string(),
//!     role: Role::Admin,
//!     permissions: None,
//! };
//!
//! assert!(has_permission(Some(&admin), Permission::ViewOrders));
//! assert!(!has_permission(Some(&admin), Permission::ManageUsers));
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::types::{Identity, Role};

/// Every permission flag the dashboard checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    // User management
    ViewUsers,
    CreateUser,
    UpdateUser,
    DeleteUser,
    ManageUserPermissions,
    // Products
    ViewProducts,
    CreateProduct,
    UpdateProduct,
    DeleteProduct,
    // Orders
    ViewOrders,
    UpdateOrderStatus,
    DeleteOrder,
    // Categories
    ViewCategories,
    CreateCategory,
    UpdateCategory,
    DeleteCategory,
    // Analytics and settings
    ViewAnalytics,
    ExportReports,
    ManageSettings,
    // Screen-level flags
    EditProducts,
    ManageProducts,
    ManageOrders,
    ViewCustomers,
    ManageCustomers,
    ManageUsers,
    ManageAnalytics,
    ViewSettings,
}

/// Flags an admin holds without an explicit grant.
pub const DEFAULT_ADMIN_PERMISSIONS: [Permission; 4] = [
    Permission::ViewProducts,
    Permission::ViewOrders,
    Permission::ViewCustomers,
    Permission::ViewAnalytics,
];

/// Flags assigned to a new admin account when none are chosen.
const ADMIN_GRANTS: [Permission; 13] = [
    Permission::ViewUsers,
    Permission::CreateUser,
    Permission::UpdateUser,
    Permission::ViewProducts,
    Permission::CreateProduct,
    Permission::UpdateProduct,
    Permission::DeleteProduct,
    Permission::ViewOrders,
    Permission::UpdateOrderStatus,
    Permission::ViewCategories,
    Permission::CreateCategory,
    Permission::UpdateCategory,
    Permission::ViewAnalytics,
];

/// Flags that make an identity a "manager" of some screen.
const MANAGEMENT_PERMISSIONS: [Permission; 4] = [
    Permission::EditProducts,
    Permission::ManageOrders,
    Permission::ManageCustomers,
    Permission::ManageUsers,
];

impl Permission {
    pub const ALL: [Permission; 27] = [
        Permission::ViewUsers,
        Permission::CreateUser,
        Permission::UpdateUser,
        Permission::DeleteUser,
        Permission::ManageUserPermissions,
        Permission::ViewProducts,
        Permission::CreateProduct,
        Permission::UpdateProduct,
        Permission::DeleteProduct,
        Permission::ViewOrders,
        Permission::UpdateOrderStatus,
        Permission::DeleteOrder,
        Permission::ViewCategories,
        Permission::CreateCategory,
        Permission::UpdateCategory,
        Permission::DeleteCategory,
        Permission::ViewAnalytics,
        Permission::ExportReports,
        Permission::ManageSettings,
        Permission::EditProducts,
        Permission::ManageProducts,
        Permission::ManageOrders,
        Permission::ViewCustomers,
        Permission::ManageCustomers,
        Permission::ManageUsers,
        Permission::ManageAnalytics,
        Permission::ViewSettings,
    ];

    /// The assignable catalogue (the first 19 flags of [`Permission::ALL`]).
    pub fn catalogue() -> &'static [Permission] {
        &Self::ALL[..19]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewUsers => "view_users",
            Permission::CreateUser => "create_user",
            Permission::UpdateUser => "update_user",
            Permission::DeleteUser => "delete_user",
            Permission::ManageUserPermissions => "manage_user_permissions",
            Permission::ViewProducts => "view_products",
            Permission::CreateProduct => "create_product",
            Permission::UpdateProduct => "update_product",
            Permission::DeleteProduct => "delete_product",
            Permission::ViewOrders => "view_orders",
            Permission::UpdateOrderStatus => "update_order_status",
            Permission::DeleteOrder => "delete_order",
            Permission::ViewCategories => "view_categories",
            Permission::CreateCategory => "create_category",
            Permission::UpdateCategory => "update_category",
            Permission::DeleteCategory => "delete_category",
            Permission::ViewAnalytics => "view_analytics",
            Permission::ExportReports => "export_reports",
            Permission::ManageSettings => "manage_settings",
            Permission::EditProducts => "edit_products",
            Permission::ManageProducts => "manage_products",
            Permission::ManageOrders => "manage_orders",
            Permission::ViewCustomers => "view_customers",
            Permission::ManageCustomers => "manage_customers",
            Permission::ManageUsers => "manage_users",
            Permission::ManageAnalytics => "manage_analytics",
            Permission::ViewSettings => "view_settings",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .iter()
            .copied()
            .find(|permission| permission.as_str() == s)
            .ok_or_else(|| format!("Unknown permission: {}", s))
    }
}

impl Role {
    /// Permissions provisioned for a new account of this role when the
    /// creator picks none.
    pub fn default_grants(&self) -> BTreeSet<Permission> {
        match self {
            Role::SuperAdmin => Permission::catalogue().iter().copied().collect(),
            Role::Admin => ADMIN_GRANTS.iter().copied().collect(),
            Role::User => BTreeSet::new(),
        }
    }
}

/// Parses a list of flag names, dropping (and logging) the unknown ones.
pub fn parse_permissions<I, S>(flags: I) -> BTreeSet<Permission>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    flags
        .into_iter()
        .filter_map(|flag| match flag.as_ref().parse::<Permission>() {
            Ok(permission) => Some(permission),
            Err(_) => {
                warn!(flag = flag.as_ref(), "Ignoring unknown permission flag");
                None
            }
        })
        .collect()
}

/// Lenient serde adapter for optional permission lists.
pub fn deserialize_permissions<'de, D>(
    deserializer: D,
) -> Result<Option<BTreeSet<Permission>>, D::Error>
where
    D: Deserializer<'de>,
{
    let flags = Option::<Vec<String>>::deserialize(deserializer)?;
    Ok(flags.map(parse_permissions))
}

/// Whether `identity` holds `permission`.
pub fn has_permission(identity: Option<&Identity>, permission: Permission) -> bool {
    let Some(identity) = identity else {
        return false;
    };

    match identity.role {
        Role::SuperAdmin => true,
        Role::Admin => {
            DEFAULT_ADMIN_PERMISSIONS.contains(&permission) || identity.has_explicit(permission)
        }
        Role::User => identity.has_explicit(permission),
    }
}

/// Whether `identity` holds every flag. An empty list is trivially held.
pub fn has_all_permissions(identity: Option<&Identity>, permissions: &[Permission]) -> bool {
    permissions
        .iter()
        .all(|permission| has_permission(identity, *permission))
}

/// Whether `identity` holds at least one flag. An empty list is never held.
pub fn has_any_permission(identity: Option<&Identity>, permissions: &[Permission]) -> bool {
    permissions
        .iter()
        .any(|permission| has_permission(identity, *permission))
}

/// Whether `identity` may manage products, orders, customers or users.
pub fn can_manage_any(identity: Option<&Identity>) -> bool {
    has_any_permission(identity, &MANAGEMENT_PERMISSIONS)
}

/// Every flag [`has_permission`] would grant `identity`.
pub fn effective_permissions(identity: Option<&Identity>) -> BTreeSet<Permission> {
    Permission::ALL
        .iter()
        .copied()
        .filter(|permission| has_permission(identity, *permission))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserId;

    fn identity(role: Role, permissions: Option<&[Permission]>) -> Identity {
        Identity {
            id: UserId::from("1"),
            email: "a@x.com".to_string(),
            display_name: "A".to_string(),
            role,
            permissions: permissions.map(|p| p.iter().copied().collect()),
        }
    }

    #[test]
    fn test_wire_names_round_trip() {
        for permission in Permission::ALL {
            assert_eq!(permission.as_str().parse::<Permission>(), Ok(permission));
            assert_eq!(
                serde_json::to_value(permission).unwrap(),
                serde_json::Value::String(permission.as_str().to_string())
            );
        }
    }

    #[test]
    fn test_no_identity_has_nothing() {
        assert!(!has_permission(None, Permission::ViewOrders));
        assert!(effective_permissions(None).is_empty());
    }

    #[test]
    fn test_superadmin_has_everything() {
        let superadmin = identity(Role::SuperAdmin, None);

        for permission in Permission::ALL {
            assert!(has_permission(Some(&superadmin), permission));
        }
    }

    #[test]
    fn test_admin_defaults_without_explicit_set() {
        let admin = identity(Role::Admin, None);

        assert!(has_permission(Some(&admin), Permission::ViewOrders));
        assert!(has_permission(Some(&admin), Permission::ViewCustomers));
        assert!(!has_permission(Some(&admin), Permission::ManageUsers));
        assert_eq!(
            effective_permissions(Some(&admin)),
            DEFAULT_ADMIN_PERMISSIONS.iter().copied().collect()
        );
    }

    #[test]
    fn test_admin_explicit_grants_extend_defaults() {
        let admin = identity(Role::Admin, Some(&[Permission::ManageUsers]));

        assert!(has_permission(Some(&admin), Permission::ManageUsers));
        assert!(has_permission(Some(&admin), Permission::ViewProducts));
        assert!(can_manage_any(Some(&admin)));
    }

    #[test]
    fn test_user_has_only_explicit_grants() {
        let user = identity(Role::User, Some(&[Permission::ViewOrders]));

        assert!(has_permission(Some(&user), Permission::ViewOrders));
        assert!(!has_permission(Some(&user), Permission::ViewProducts));
        assert!(!can_manage_any(Some(&user)));
    }

    #[test]
    fn test_privilege_is_monotonic() {
        let user = identity(Role::User, Some(&[Permission::ExportReports]));
        let admin = identity(Role::Admin, Some(&[Permission::ExportReports]));
        let superadmin = identity(Role::SuperAdmin, None);

        let user_set = effective_permissions(Some(&user));
        let admin_set = effective_permissions(Some(&admin));
        let superadmin_set = effective_permissions(Some(&superadmin));

        assert!(user_set.is_subset(&admin_set));
        assert!(admin_set.is_subset(&superadmin_set));
    }

    #[test]
    fn test_all_and_any_edge_cases() {
        let admin = identity(Role::Admin, None);

        assert!(has_all_permissions(Some(&admin), &[]));
        assert!(!has_any_permission(Some(&admin), &[]));
        assert!(has_all_permissions(
            Some(&admin),
            &[Permission::ViewOrders, Permission::ViewProducts]
        ));
        assert!(!has_all_permissions(
            Some(&admin),
            &[Permission::ViewOrders, Permission::DeleteOrder]
        ));
        assert!(has_any_permission(
            Some(&admin),
            &[Permission::DeleteOrder, Permission::ViewAnalytics]
        ));
    }

    #[test]
    fn test_default_grants() {
        assert_eq!(Role::SuperAdmin.default_grants().len(), 19);
        assert!(!Role::SuperAdmin
            .default_grants()
            .contains(&Permission::ManageUsers));

        let admin = Role::Admin.default_grants();
        assert_eq!(admin.len(), 13);
        assert!(admin.contains(&Permission::UpdateOrderStatus));
        assert!(!admin.contains(&Permission::DeleteUser));

        assert!(Role::User.default_grants().is_empty());
    }

    #[test]
    fn test_parse_permissions_skips_unknown() {
        let parsed = parse_permissions(["view_users", "fly", "manage_settings"]);

        assert_eq!(
            parsed,
            [Permission::ViewUsers, Permission::ManageSettings]
                .into_iter()
                .collect()
        );
    }
}
