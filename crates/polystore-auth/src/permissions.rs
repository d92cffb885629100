//! Permission catalog and role registry
//!
//! The registry is the single source of truth for which permissions exist
//! and which permissions each role carries. It is seeded with the built-in
//! catalog at construction, append-only afterwards, and safe for concurrent
//! use behind a reader-writer lock.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use tracing::warn;

use polystore_types::Role;

/// Every permission the system defines, with its description
pub const BUILTIN_PERMISSIONS: &[(&str, &str)] = &[
    ("user:create", "Create new users"),
    ("user:read", "Read user information"),
    ("user:update", "Update user information"),
    ("user:delete", "Delete users"),
    ("note:create", "Create new notes"),
    ("note:read", "Read notes"),
    ("note:update", "Update existing notes"),
    ("note:delete", "Delete notes"),
    ("admin:access", "Access administrative functions"),
    ("role:manage", "Manage roles and their permissions"),
];

fn builtin_roles() -> Vec<Role> {
    vec![
        Role::new(
            "admin",
            "Administrator with full access",
            BUILTIN_PERMISSIONS.iter().map(|(id, _)| *id),
        ),
        Role::new(
            "user",
            "Regular user with standard access",
            [
                "user:read",
                "user:update",
                "note:create",
                "note:read",
                "note:update",
                "note:delete",
            ],
        ),
        Role::new("guest", "Guest with limited access", ["user:read", "note:read"]),
    ]
}

struct Inner {
    permissions: BTreeMap<String, String>,
    roles: BTreeMap<String, Role>,
}

/// Registry of permissions and roles
pub struct PermissionRegistry {
    inner: RwLock<Inner>,
    builtin_roles: BTreeSet<String>,
}

impl PermissionRegistry {
    /// Build a registry seeded with the built-in catalog and roles
    pub fn new() -> Self {
        let permissions: BTreeMap<String, String> = BUILTIN_PERMISSIONS
            .iter()
            .map(|(id, description)| (id.to_string(), description.to_string()))
            .collect();
        let roles: BTreeMap<String, Role> = builtin_roles()
            .into_iter()
            .map(|role| (role.name.clone(), role))
            .collect();
        let builtin_roles = roles.keys().cloned().collect();

        let registry = Self {
            inner: RwLock::new(Inner { permissions, roles }),
            builtin_roles,
        };
        registry.validate();
        registry
    }

    /// Soft startup check: every permission a role references must exist.
    /// Violations are logged, never fatal.
    fn validate(&self) {
        let inner = self.inner.read().expect("registry lock poisoned");
        for role in inner.roles.values() {
            for permission in &role.permissions {
                if !inner.permissions.contains_key(permission) {
                    warn!(role = %role.name, permission = %permission, "role references undefined permission");
                }
            }
        }
    }

    /// Register a new permission. Returns false without overwriting when
    /// the id is already taken.
    pub fn register_permission(&self, id: &str, description: &str) -> bool {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        if inner.permissions.contains_key(id) {
            return false;
        }
        inner.permissions.insert(id.to_string(), description.to_string());
        true
    }

    /// Register a new role. Returns false without overwriting when the name
    /// is already taken. Permissions the catalog does not define are
    /// dropped with a warning, never an error.
    pub fn register_role(&self, role: Role) -> bool {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        if inner.roles.contains_key(&role.name) {
            return false;
        }

        let (known, unknown): (BTreeSet<String>, BTreeSet<String>) = role
            .permissions
            .into_iter()
            .partition(|p| inner.permissions.contains_key(p));
        if !unknown.is_empty() {
            warn!(
                role = %role.name,
                dropped = %unknown.iter().cloned().collect::<Vec<_>>().join(", "),
                "dropping undefined permissions from role"
            );
        }

        inner.roles.insert(
            role.name.clone(),
            Role {
                name: role.name,
                description: role.description,
                permissions: known,
            },
        );
        true
    }

    /// Whether the catalog defines this permission
    pub fn is_defined(&self, permission: &str) -> bool {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.permissions.contains_key(permission)
    }

    /// All defined permissions with descriptions
    pub fn permissions(&self) -> BTreeMap<String, String> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.permissions.clone()
    }

    /// Filter a permission list down to the defined ones
    pub fn validate_permissions<'a>(&self, permissions: &[&'a str]) -> Vec<&'a str> {
        let inner = self.inner.read().expect("registry lock poisoned");
        permissions
            .iter()
            .copied()
            .filter(|p| inner.permissions.contains_key(*p))
            .collect()
    }

    /// Look up one role
    pub fn role(&self, name: &str) -> Option<Role> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.roles.get(name).cloned()
    }

    /// All roles, built-in and custom
    pub fn roles(&self) -> Vec<Role> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.roles.values().cloned().collect()
    }

    /// The union of permissions held by the named roles. Unknown roles
    /// contribute nothing.
    pub fn permissions_for_roles(&self, roles: &[&str]) -> BTreeSet<String> {
        let inner = self.inner.read().expect("registry lock poisoned");
        roles
            .iter()
            .filter_map(|name| inner.roles.get(*name))
            .flat_map(|role| role.permissions.iter().cloned())
            .collect()
    }

    /// Whether a role ships with the system and is protected from
    /// deletion and renaming
    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtin_roles.contains(name)
    }

    pub(crate) fn replace_role(&self, role: Role) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner.roles.insert(role.name.clone(), role);
    }

    pub(crate) fn remove_role(&self, name: &str) -> bool {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner.roles.remove(name).is_some()
    }
}

impl Default for PermissionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
