//! Access resolution
//!
//! Answers permission checks for a principal against the registry. Checks
//! are evaluated fresh on every call; nothing is cached, so a role change
//! takes effect immediately.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use polystore_types::{AccessError, AccessResult, Principal};

use crate::permissions::PermissionRegistry;

/// Stateless permission checker over a shared registry
#[derive(Clone)]
pub struct AccessResolver {
    registry: Arc<PermissionRegistry>,
}

impl AccessResolver {
    pub fn new(registry: Arc<PermissionRegistry>) -> Self {
        Self { registry }
    }

    /// The full permission set a principal holds: direct grants unioned
    /// with the permissions of its role. Unknown roles contribute nothing.
    pub fn effective_permissions(&self, principal: &Principal) -> BTreeSet<String> {
        let mut effective = self.registry.permissions_for_roles(&[principal.role.as_str()]);
        effective.extend(principal.granted.iter().cloned());
        effective
    }

    /// Require one permission. Administrators pass unconditionally.
    pub fn has_permission(&self, principal: &Principal, permission: &str) -> AccessResult<()> {
        if principal.is_admin() {
            return Ok(());
        }
        if self.effective_permissions(principal).contains(permission) {
            return Ok(());
        }
        debug!(subject = %principal.subject, permission, "permission denied");
        Err(AccessError::Forbidden {
            missing: vec![permission.to_string()],
        })
    }

    /// Require at least one of the listed permissions. The denial names
    /// every permission that would have satisfied the check.
    pub fn has_any_permission(
        &self,
        principal: &Principal,
        permissions: &[&str],
    ) -> AccessResult<()> {
        if principal.is_admin() {
            return Ok(());
        }
        let effective = self.effective_permissions(principal);
        if permissions.iter().any(|p| effective.contains(*p)) {
            return Ok(());
        }
        debug!(subject = %principal.subject, "permission denied");
        Err(AccessError::Forbidden {
            missing: permissions.iter().map(|p| p.to_string()).collect(),
        })
    }

    /// Require every listed permission. The denial names exactly the
    /// missing ones.
    pub fn has_all_permissions(
        &self,
        principal: &Principal,
        permissions: &[&str],
    ) -> AccessResult<()> {
        if principal.is_admin() {
            return Ok(());
        }
        let effective = self.effective_permissions(principal);
        let missing: Vec<String> = permissions
            .iter()
            .filter(|p| !effective.contains(**p))
            .map(|p| p.to_string())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        debug!(subject = %principal.subject, missing = missing.len(), "permission denied");
        Err(AccessError::Forbidden { missing })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polystore_types::Role;

    fn resolver() -> AccessResolver {
        AccessResolver::new(Arc::new(PermissionRegistry::new()))
    }

    #[test]
    fn test_admin_bypasses_every_check() {
        let resolver = resolver();
        let admin = Principal::new("root", "admin");

        assert!(resolver.has_permission(&admin, "note:delete").is_ok());
        assert!(resolver
            .has_all_permissions(&admin, &["user:delete", "undefined:permission"])
            .is_ok());
    }

    #[test]
    fn test_role_derived_permission() {
        let resolver = resolver();
        let user = Principal::new("u-1", "user");

        assert!(resolver.has_permission(&user, "note:create").is_ok());
        let err = resolver.has_permission(&user, "user:delete").unwrap_err();
        assert_eq!(
            err,
            AccessError::Forbidden {
                missing: vec!["user:delete".to_string()]
            }
        );
    }

    #[test]
    fn test_effective_set_unions_direct_grants() {
        let resolver = resolver();
        let guest = Principal::new("u-2", "guest").with_grant("note:create");

        let effective = resolver.effective_permissions(&guest);
        assert!(effective.contains("note:read"));
        assert!(effective.contains("note:create"));

        assert!(resolver.has_permission(&guest, "note:create").is_ok());
    }

    #[test]
    fn test_unknown_role_denies_everything() {
        let resolver = resolver();
        let stranger = Principal::new("u-3", "stranger");

        assert!(resolver.effective_permissions(&stranger).is_empty());
        assert!(resolver.has_permission(&stranger, "note:read").is_err());
    }

    #[test]
    fn test_any_and_all_semantics() {
        let resolver = resolver();
        let guest = Principal::new("u-4", "guest");

        assert!(resolver
            .has_any_permission(&guest, &["note:read", "note:delete"])
            .is_ok());
        assert!(resolver
            .has_any_permission(&guest, &["note:create", "note:delete"])
            .is_err());

        let err = resolver
            .has_all_permissions(&guest, &["note:read", "note:create", "note:delete"])
            .unwrap_err();
        assert_eq!(
            err,
            AccessError::Forbidden {
                missing: vec!["note:create".to_string(), "note:delete".to_string()]
            }
        );
    }

    #[test]
    fn test_custom_role_with_undefined_permission() {
        let registry = Arc::new(PermissionRegistry::new());
        registry.register_role(Role::new(
            "editor",
            "Can edit notes",
            ["note:create", "note:update", "note:publish"],
        ));
        let resolver = AccessResolver::new(registry);
        let editor = Principal::new("u-5", "editor");

        // The undefined permission was dropped at registration
        assert!(resolver.has_permission(&editor, "note:update").is_ok());
        assert!(resolver.has_permission(&editor, "note:publish").is_err());
    }
}
