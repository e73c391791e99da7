//! Permission masks and the process-wide rights default.
//!
//! A [`PermissionMask`] is a sparse map of right name to an explicit
//! allow/deny decision. A right that is absent from the mask is *unset*, and
//! rights resolution moves on to the next layer:
//!
//! ```text
//! User ─▶ UserGroups ─▶ Channel ─▶ Server ─▶ GlobalRights
//! ```
//!
//! [`GlobalRights`] is the last layer and always answers.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Sparse mapping from right name to an explicit decision.
///
/// Right names are stored as given; callers use lowercase snake-case names
/// such as `function_roll` by convention, but the function rights built by
/// the dispatcher keep the declared class name (`function_Roll`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionMask {
    rights: BTreeMap<String, bool>,
}

impl PermissionMask {
    /// Creates an empty mask.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the explicit decision for `right`, or `None` when unset.
    pub fn get_right(&self, right: &str) -> Option<bool> {
        self.rights.get(right).copied()
    }

    /// Sets, or with `None` clears, the decision for `right`.
    pub fn set_right(&mut self, right: impl Into<String>, value: Option<bool>) {
        let right = right.into();
        match value {
            Some(v) => {
                self.rights.insert(right, v);
            }
            None => {
                self.rights.remove(&right);
            }
        }
    }

    /// Explicitly allows `right`.
    pub fn allow(&mut self, right: impl Into<String>) {
        self.set_right(right, Some(true));
    }

    /// Explicitly denies `right`.
    pub fn deny(&mut self, right: impl Into<String>) {
        self.set_right(right, Some(false));
    }

    /// `true` iff no right has been explicitly set.
    pub fn is_empty(&self) -> bool {
        self.rights.is_empty()
    }

    /// Number of explicitly set rights.
    pub fn len(&self) -> usize {
        self.rights.len()
    }

    /// Iterates over explicitly set rights in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.rights.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<S: Into<String>> FromIterator<(S, bool)> for PermissionMask {
    fn from_iter<I: IntoIterator<Item = (S, bool)>>(iter: I) -> Self {
        Self {
            rights: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// The process-wide bottom layer of rights resolution.
///
/// Holds its own mask plus the answer for rights nobody set anywhere.
#[derive(Debug)]
pub struct GlobalRights {
    mask: RwLock<PermissionMask>,
    default_allow: bool,
}

impl GlobalRights {
    /// Creates global rights with an empty mask.
    pub fn new(default_allow: bool) -> Self {
        Self::with_mask(PermissionMask::new(), default_allow)
    }

    /// Creates global rights seeded with `mask`.
    pub fn with_mask(mask: PermissionMask, default_allow: bool) -> Self {
        Self {
            mask: RwLock::new(mask),
            default_allow,
        }
    }

    /// Answer used when no layer set the right.
    pub fn default_allow(&self) -> bool {
        self.default_allow
    }

    /// Resolves `right` against the global mask, then the default.
    pub fn rights_check(&self, right: &str) -> bool {
        self.mask.read().get_right(right).unwrap_or(self.default_allow)
    }

    /// Sets, or clears, a global right.
    pub fn set_right(&self, right: impl Into<String>, value: Option<bool>) {
        self.mask.write().set_right(right, value);
    }

    /// Returns a copy of the global mask.
    pub fn mask(&self) -> PermissionMask {
        self.mask.read().clone()
    }
}

impl Default for GlobalRights {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_mask() {
        let mask = PermissionMask::new();
        assert!(mask.is_empty());
        assert_eq!(mask.get_right("function_Roll"), None);
    }

    #[test]
    fn test_set_and_clear_right() {
        let mut mask = PermissionMask::new();
        mask.deny("function_Roll");
        assert!(!mask.is_empty());
        assert_eq!(mask.get_right("function_Roll"), Some(false));

        mask.allow("function_Roll");
        assert_eq!(mask.get_right("function_Roll"), Some(true));

        mask.set_right("function_Roll", None);
        assert!(mask.is_empty());
        assert_eq!(mask.get_right("function_Roll"), None);
    }

    #[test]
    fn test_global_rights_default() {
        let global = GlobalRights::new(false);
        assert!(!global.rights_check("anything"));

        global.set_right("anything", Some(true));
        assert!(global.rights_check("anything"));
        assert!(!global.rights_check("something_else"));
    }

    #[test]
    fn test_mask_serde_is_flat_map() {
        let mask: PermissionMask = [("function_Roll", true), ("function_Kick", false)]
            .into_iter()
            .collect();
        let json = serde_json::to_value(&mask).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "function_Kick": false, "function_Roll": true })
        );
    }
}
