//! Module catalog: the compiled-in modules and the allow-list.

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use super::ModuleDescriptor;
use crate::error::{ModuleError, ModuleResult};

/// The modules a dispatcher may load.
///
/// Every compiled-in module is registered with [`with_module`](Self::with_module).
/// An allow-list, when set, further restricts which of them may be loaded.
#[derive(Debug, Clone, Default)]
pub struct ModuleCatalog {
    modules: BTreeMap<&'static str, ModuleDescriptor>,
    enabled: Option<BTreeSet<String>>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a module. A later module with the same name replaces it.
    pub fn with_module(mut self, module: ModuleDescriptor) -> Self {
        self.add(module);
        self
    }

    pub fn with_modules(mut self, modules: impl IntoIterator<Item = ModuleDescriptor>) -> Self {
        for module in modules {
            self.add(module);
        }
        self
    }

    /// Restricts loading to the named modules.
    pub fn allow_only<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enabled = Some(names.into_iter().map(Into::into).collect());
        self
    }

    fn add(&mut self, module: ModuleDescriptor) {
        if self.modules.insert(module.name, module).is_some() {
            warn!(module = %module.name, "Module registered twice, keeping the later one");
        }
    }

    /// Returns the module called `name` if it may be loaded.
    pub fn get(&self, name: &str) -> ModuleResult<ModuleDescriptor> {
        let module = self
            .modules
            .get(name)
            .copied()
            .ok_or_else(|| ModuleError::Unknown(name.to_string()))?;
        if !self.is_enabled(name) {
            return Err(ModuleError::NotEnabled(name.to_string()));
        }
        Ok(module)
    }

    /// Whether `name` passes the allow-list.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.as_ref().is_none_or(|set| set.contains(name))
    }

    /// Names of every module that may be loaded, in order.
    pub fn enabled_names(&self) -> Vec<&'static str> {
        self.modules
            .keys()
            .copied()
            .filter(|name| self.is_enabled(name))
            .collect()
    }

    /// Names of every compiled-in module.
    pub fn names(&self) -> Vec<&'static str> {
        self.modules.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static EMPTY_A: ModuleDescriptor = ModuleDescriptor {
        name: "a",
        functions: &[],
    };
    static EMPTY_B: ModuleDescriptor = ModuleDescriptor {
        name: "b",
        functions: &[],
    };

    #[test]
    fn test_unknown_and_disabled() {
        let catalog = ModuleCatalog::new()
            .with_modules([EMPTY_A, EMPTY_B])
            .allow_only(["a"]);
        assert!(catalog.get("a").is_ok());
        assert_eq!(catalog.get("b").unwrap_err(), ModuleError::NotEnabled("b".into()));
        assert_eq!(catalog.get("c").unwrap_err(), ModuleError::Unknown("c".into()));
        assert_eq!(catalog.enabled_names(), vec!["a"]);
        assert_eq!(catalog.names(), vec!["a", "b"]);
    }

    #[test]
    fn test_no_allow_list_enables_everything() {
        let catalog = ModuleCatalog::new().with_module(EMPTY_A).with_module(EMPTY_B);
        assert_eq!(catalog.enabled_names(), vec!["a", "b"]);
    }
}
