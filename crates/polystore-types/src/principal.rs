//! Principal and role types shared across the workspace
//!
//! A [`Principal`] is an authenticated caller: a role name plus optional
//! directly-granted permissions. Token verification itself happens outside
//! this workspace; the route layer hands us an already-authenticated
//! principal.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// The built-in administrator role name. Principals holding it pass every
/// permission check unconditionally.
pub const ADMIN_ROLE: &str = "admin";

/// An authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable subject identifier (user id or username)
    pub subject: String,

    /// The principal's role name
    pub role: String,

    /// Directly-granted permissions, unioned with role-derived ones
    #[serde(default)]
    pub granted: BTreeSet<String>,
}

impl Principal {
    pub fn new(subject: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            role: role.into(),
            granted: BTreeSet::new(),
        }
    }

    /// Builder-style direct permission grant
    pub fn with_grant(mut self, permission: impl Into<String>) -> Self {
        self.granted.insert(permission.into());
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

/// A named role: description plus permission set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub description: String,
    pub permissions: BTreeSet<String>,
}

impl Role {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        permissions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_admin_detection() {
        assert!(Principal::new("u-1", "admin").is_admin());
        assert!(!Principal::new("u-2", "user").is_admin());
        assert!(!Principal::new("u-3", "Admin").is_admin());
    }

    #[test]
    fn test_principal_direct_grants() {
        let principal = Principal::new("u-1", "guest")
            .with_grant("note:create")
            .with_grant("note:create");

        assert_eq!(principal.granted.len(), 1);
        assert!(principal.granted.contains("note:create"));
    }

    #[test]
    fn test_role_permission_membership() {
        let role = Role::new("editor", "Can edit notes", ["note:create", "note:update"]);
        assert!(role.has_permission("note:create"));
        assert!(!role.has_permission("note:delete"));
    }
}
