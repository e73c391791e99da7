//! User groups and the registry shared by every server.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::foundation::permission::PermissionMask;

/// A named set of rights shared by the users that belong to it.
///
/// Membership is recorded on the [`User`](super::User) side; a group only
/// owns its name and mask.
#[derive(Debug)]
pub struct UserGroup {
    name: String,
    permissions: RwLock<PermissionMask>,
}

impl UserGroup {
    /// Creates a group with an empty mask.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_permissions(name, PermissionMask::new())
    }

    /// Creates a group seeded with `permissions`.
    pub fn with_permissions(name: impl Into<String>, permissions: PermissionMask) -> Self {
        Self {
            name: name.into().to_lowercase(),
            permissions: RwLock::new(permissions),
        }
    }

    /// Lowercase group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The group's explicit decision for `right`, if any.
    pub fn rights_check(&self, right: &str) -> Option<bool> {
        self.permissions.read().get_right(right)
    }

    /// Sets, or clears, a right on the group.
    pub fn set_right(&self, right: impl Into<String>, value: Option<bool>) {
        self.permissions.write().set_right(right, value);
    }

    /// Returns a copy of the group's mask.
    pub fn permissions(&self) -> PermissionMask {
        self.permissions.read().clone()
    }
}

/// Process-wide registry of user groups, keyed by lowercase name.
#[derive(Debug, Default)]
pub struct UserGroupRegistry {
    groups: RwLock<BTreeMap<String, Arc<UserGroup>>>,
}

impl UserGroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the group called `name`, creating it with an empty mask if needed.
    pub fn get_or_create(&self, name: &str) -> Arc<UserGroup> {
        let key = name.to_lowercase();
        if let Some(group) = self.groups.read().get(&key) {
            return Arc::clone(group);
        }
        let mut groups = self.groups.write();
        Arc::clone(
            groups
                .entry(key.clone())
                .or_insert_with(|| Arc::new(UserGroup::new(key))),
        )
    }

    /// Inserts a group, replacing any group of the same name.
    pub fn insert(&self, group: UserGroup) -> Arc<UserGroup> {
        let group = Arc::new(group);
        self.groups
            .write()
            .insert(group.name().to_string(), Arc::clone(&group));
        group
    }

    pub fn get(&self, name: &str) -> Option<Arc<UserGroup>> {
        self.groups.read().get(&name.to_lowercase()).cloned()
    }

    /// Removes a group from the registry. Users already holding it keep it.
    pub fn remove(&self, name: &str) -> Option<Arc<UserGroup>> {
        self.groups.write().remove(&name.to_lowercase())
    }

    /// Group names in order.
    pub fn names(&self) -> Vec<String> {
        self.groups.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_rights() {
        let group = UserGroup::new("Ops");
        assert_eq!(group.name(), "ops");
        assert_eq!(group.rights_check("function_Kick"), None);

        group.set_right("function_Kick", Some(true));
        assert_eq!(group.rights_check("function_Kick"), Some(true));
    }

    #[test]
    fn test_registry_get_or_create_is_idempotent() {
        let registry = UserGroupRegistry::new();
        let a = registry.get_or_create("Admins");
        let b = registry.get_or_create("admins");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.names(), vec!["admins".to_string()]);
    }

    #[test]
    fn test_registry_remove() {
        let registry = UserGroupRegistry::new();
        registry.insert(UserGroup::new("banned"));
        assert!(registry.get("BANNED").is_some());
        assert!(registry.remove("banned").is_some());
        assert!(registry.is_empty());
    }
}
