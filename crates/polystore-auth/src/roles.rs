//! Role management
//!
//! CRUD over the registry's role set. Built-in roles are protected: they
//! cannot be deleted or renamed, and their permissions can only change
//! through an explicit update.

use std::sync::Arc;

use tracing::info;

use polystore_types::{AccessError, AccessResult, Role};

use crate::permissions::PermissionRegistry;

/// Management surface for roles
#[derive(Clone)]
pub struct RoleManager {
    registry: Arc<PermissionRegistry>,
}

impl RoleManager {
    pub fn new(registry: Arc<PermissionRegistry>) -> Self {
        Self { registry }
    }

    /// All roles, built-in and custom
    pub fn list_roles(&self) -> Vec<Role> {
        self.registry.roles()
    }

    pub fn get_role(&self, name: &str) -> Option<Role> {
        self.registry.role(name)
    }

    /// Create a custom role. Fails when the name is taken; permissions the
    /// catalog does not define are dropped.
    pub fn create_role(&self, role: Role) -> AccessResult<Role> {
        let name = role.name.clone();
        if !self.registry.register_role(role) {
            return Err(AccessError::Role(format!("role '{}' already exists", name)));
        }
        info!(role = %name, "role created");
        self.registry
            .role(&name)
            .ok_or_else(|| AccessError::Role(format!("role '{}' vanished after create", name)))
    }

    /// Replace a role's description and permission set. The name itself is
    /// immutable; built-in roles accept permission updates but keep their
    /// protected status.
    pub fn update_role(&self, name: &str, description: &str, permissions: &[&str]) -> AccessResult<Role> {
        if self.registry.role(name).is_none() {
            return Err(AccessError::Role(format!("role '{}' not found", name)));
        }

        let valid = self.registry.validate_permissions(permissions);
        let updated = Role::new(name, description, valid);
        self.registry.replace_role(updated.clone());
        info!(role = %name, "role updated");
        Ok(updated)
    }

    /// Delete a custom role. Built-in roles are protected.
    pub fn delete_role(&self, name: &str) -> AccessResult<()> {
        if self.registry.is_builtin(name) {
            return Err(AccessError::Role(format!(
                "cannot delete built-in role '{}'",
                name
            )));
        }
        if !self.registry.remove_role(name) {
            return Err(AccessError::Role(format!("role '{}' not found", name)));
        }
        info!(role = %name, "role deleted");
        Ok(())
    }
}
