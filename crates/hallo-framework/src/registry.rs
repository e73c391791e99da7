//! Function registry.
//!
//! Indexes loaded functions three ways, all behind one lock so a dispatch on
//! another thread never sees a half-applied load or unload:
//!
//! ```text
//! modules: module name   → functions it contributed (load order)
//! names:   lowercase name → function
//! events:  event type    → functions with passive interest (load order)
//! ```
//!
//! Names are globally unique. A function claiming a name that is already
//! taken is rejected as a whole and the existing registration stays.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use hallo_core::EventType;
use parking_lot::RwLock;
use tracing::warn;

use crate::error::FunctionError;
use crate::function::{BoxedFunction, Function};
use crate::module::{FunctionDescriptor, FunctionFactory};

// =============================================================================
// LoadedFunction
// =============================================================================

/// How the dispatcher obtains an instance for a call.
enum Instance {
    Persistent(BoxedFunction),
    Transient(fn() -> BoxedFunction),
}

/// A validated function as held by the registry.
///
/// Metadata is read once at load time; transient functions get a fresh
/// instance per call from [`instance`](LoadedFunction::instance).
pub struct LoadedFunction {
    module: &'static str,
    class_name: &'static str,
    help_name: String,
    names: Vec<String>,
    help_docs: String,
    passive_events: Vec<EventType>,
    instance: Instance,
}

/// Why a candidate function was not registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    EmptyHelpName,
    EmptyHelpDocs,
    NoNames,
    HelpNameNotInNames,
    /// Another loaded function already answers to this name.
    NameTaken(String),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::EmptyHelpName => f.write_str("help name is empty"),
            Rejection::EmptyHelpDocs => f.write_str("help docs are empty"),
            Rejection::NoNames => f.write_str("no invocation names"),
            Rejection::HelpNameNotInNames => f.write_str("help name is not one of its names"),
            Rejection::NameTaken(name) => write!(f, "name '{name}' is already registered"),
        }
    }
}

impl LoadedFunction {
    /// Builds and validates a function from its descriptor.
    ///
    /// The outer `Err` is a failing load hook; the inner `Err` a function
    /// that does not meet the contract.
    pub(crate) fn build(
        module: &'static str,
        descriptor: &FunctionDescriptor,
        ctx: &crate::context::LoadContext,
    ) -> Result<Result<Self, Rejection>, FunctionError> {
        let (probe, instance) = match descriptor.factory {
            FunctionFactory::Transient(create) => {
                let probe = catch(create)?;
                (probe, Instance::Transient(create))
            }
            FunctionFactory::Persistent(load) => {
                let live = catch(|| load(ctx))??;
                (Arc::clone(&live), Instance::Persistent(live))
            }
        };
        Ok(Self::validate(module, descriptor.class_name, probe.as_ref(), instance))
    }

    fn validate(
        module: &'static str,
        class_name: &'static str,
        probe: &dyn Function,
        instance: Instance,
    ) -> Result<Self, Rejection> {
        let help_name = probe.help_name().trim().to_lowercase();
        if help_name.is_empty() {
            return Err(Rejection::EmptyHelpName);
        }
        let help_docs = probe.help_docs().to_string();
        if help_docs.trim().is_empty() {
            return Err(Rejection::EmptyHelpDocs);
        }
        let mut names: Vec<String> = Vec::new();
        for name in probe.names() {
            let name = name.trim().to_lowercase();
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
        }
        if names.is_empty() {
            return Err(Rejection::NoNames);
        }
        if !names.contains(&help_name) {
            return Err(Rejection::HelpNameNotInNames);
        }
        let mut passive_events = probe.passive_events();
        passive_events.sort();
        passive_events.dedup();
        Ok(Self {
            module,
            class_name,
            help_name,
            names,
            help_docs,
            passive_events,
            instance,
        })
    }

    pub fn module(&self) -> &'static str {
        self.module
    }

    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    pub fn help_name(&self) -> &str {
        &self.help_name
    }

    /// Lowercase invocation names.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn help_docs(&self) -> &str {
        &self.help_docs
    }

    pub fn passive_events(&self) -> &[EventType] {
        &self.passive_events
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self.instance, Instance::Persistent(_))
    }

    /// `function_<ClassName>`.
    pub fn right_name(&self) -> String {
        format!("function_{}", self.class_name)
    }

    /// The live instance for persistent functions, a fresh one otherwise.
    pub(crate) fn instance(&self) -> Result<BoxedFunction, FunctionError> {
        match &self.instance {
            Instance::Persistent(live) => Ok(Arc::clone(live)),
            Instance::Transient(create) => catch(*create),
        }
    }

    /// The live instance, only for persistent functions.
    pub(crate) fn persistent_instance(&self) -> Option<&BoxedFunction> {
        match &self.instance {
            Instance::Persistent(live) => Some(live),
            Instance::Transient(_) => None,
        }
    }
}

impl std::fmt::Debug for LoadedFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedFunction")
            .field("module", &self.module)
            .field("class_name", &self.class_name)
            .field("names", &self.names)
            .field("passive_events", &self.passive_events)
            .field("persistent", &self.is_persistent())
            .finish()
    }
}

/// Runs `f`, turning a panic into [`FunctionError::Panicked`].
pub(crate) fn catch<T>(f: impl FnOnce() -> T) -> Result<T, FunctionError> {
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).map_err(FunctionError::from_panic)
}

// =============================================================================
// FunctionRegistry
// =============================================================================

#[derive(Default)]
struct Index {
    modules: BTreeMap<&'static str, Vec<Arc<LoadedFunction>>>,
    names: HashMap<String, Arc<LoadedFunction>>,
    events: HashMap<EventType, Vec<Arc<LoadedFunction>>>,
}

impl Index {
    fn lookup(&self, name: &str) -> Option<Arc<LoadedFunction>> {
        let lower = name.to_lowercase();
        self.names
            .get(&lower)
            .or_else(|| self.names.get(&lower.replace('_', " ")))
            .cloned()
    }
}

/// Thread-safe index of loaded functions.
#[derive(Default)]
pub struct FunctionRegistry {
    index: RwLock<Index>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a module's functions in one step.
    ///
    /// Functions whose names collide with an already registered function
    /// (including one earlier in `functions`) are left out and returned with
    /// the reason.
    pub(crate) fn insert_module(
        &self,
        module: &'static str,
        functions: Vec<LoadedFunction>,
    ) -> Vec<(&'static str, Rejection)> {
        let mut index = self.index.write();
        let mut rejected = Vec::new();
        let mut accepted = Vec::new();

        for function in functions {
            if let Some(taken) = function
                .names
                .iter()
                .find(|name| index.names.contains_key(*name))
            {
                let owner = index
                    .names
                    .get(taken)
                    .map(|f| f.class_name)
                    .unwrap_or_default();
                warn!(
                    module,
                    function = function.class_name,
                    name = %taken,
                    owner,
                    "Function name already registered, skipping function"
                );
                rejected.push((function.class_name, Rejection::NameTaken(taken.clone())));
                continue;
            }

            let function = Arc::new(function);
            for name in &function.names {
                index.names.insert(name.clone(), Arc::clone(&function));
            }
            for event in &function.passive_events {
                index
                    .events
                    .entry(*event)
                    .or_default()
                    .push(Arc::clone(&function));
            }
            accepted.push(function);
        }

        index.modules.entry(module).or_default().extend(accepted);
        rejected
    }

    /// Removes a module's functions from every index in one step.
    ///
    /// Returns the removed functions, or `None` if the module was not loaded.
    pub(crate) fn remove_module(&self, module: &str) -> Option<Vec<Arc<LoadedFunction>>> {
        let mut index = self.index.write();
        let functions = index.modules.remove(module)?;
        for function in &functions {
            for name in &function.names {
                let owned = index
                    .names
                    .get(name)
                    .is_some_and(|f| Arc::ptr_eq(f, function));
                if owned {
                    index.names.remove(name);
                }
            }
            for event in &function.passive_events {
                if let Some(list) = index.events.get_mut(event) {
                    list.retain(|f| !Arc::ptr_eq(f, function));
                    if list.is_empty() {
                        index.events.remove(event);
                    }
                }
            }
        }
        Some(functions)
    }

    /// Looks up a function by one of its names.
    ///
    /// Case-insensitive; falls back to treating underscores as spaces.
    pub fn find(&self, name: &str) -> Option<Arc<LoadedFunction>> {
        self.index.read().lookup(name)
    }

    /// Resolves a command line to a function and its arguments.
    ///
    /// Leading words are joined and looked up longest first, so with both
    /// `roll` and `roll dice` registered, `roll dice 5` resolves to
    /// `roll dice` with arguments `5`. The returned name is the one that
    /// matched and the arguments are the remaining words joined by single
    /// spaces. The whole walk sees one snapshot of the name index.
    pub fn resolve(&self, command_text: &str) -> Option<(Arc<LoadedFunction>, String, String)> {
        let words: Vec<&str> = command_text.split_whitespace().collect();
        let index = self.index.read();
        (1..=words.len()).rev().find_map(|count| {
            let candidate = words[..count].join(" ");
            index.lookup(&candidate).map(|function| {
                let args = words[count..].join(" ");
                (function, candidate.to_lowercase(), args)
            })
        })
    }

    /// Functions with passive interest in `event_type`, in load order.
    pub fn interested(&self, event_type: EventType) -> Vec<Arc<LoadedFunction>> {
        self.index
            .read()
            .events
            .get(&event_type)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether any function has passive interest in `event_type`.
    pub fn has_interest(&self, event_type: EventType) -> bool {
        self.index.read().events.contains_key(&event_type)
    }

    // ─── Introspection ───────────────────────────────────────────────────────

    /// Names of the loaded modules, in order.
    pub fn modules(&self) -> Vec<&'static str> {
        self.index.read().modules.keys().copied().collect()
    }

    pub fn is_loaded(&self, module: &str) -> bool {
        self.index.read().modules.contains_key(module)
    }

    /// Functions contributed by `module`, in load order.
    pub fn module_functions(&self, module: &str) -> Vec<Arc<LoadedFunction>> {
        self.index
            .read()
            .modules
            .get(module)
            .cloned()
            .unwrap_or_default()
    }

    /// Every loaded function, grouped by module.
    pub fn functions(&self) -> Vec<Arc<LoadedFunction>> {
        self.index
            .read()
            .modules
            .values()
            .flatten()
            .cloned()
            .collect()
    }

    /// Help names of every loaded function, sorted.
    pub fn help_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .functions()
            .iter()
            .map(|f| f.help_name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Every registered invocation name, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.index.read().names.keys().cloned().collect();
        names.sort();
        names
    }

    /// Help docs of the function answering to `name`.
    pub fn help_docs(&self, name: &str) -> Option<String> {
        self.find(name).map(|f| f.help_docs().to_string())
    }

    /// Module that contributed the function answering to `name`.
    pub fn module_of(&self, name: &str) -> Option<&'static str> {
        self.find(name).map(|f| f.module())
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("modules", &self.modules())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LoadContext;
    use crate::error::FunctionResult;
    use crate::function::Invocation;

    struct Named {
        help: &'static str,
        names: &'static [&'static str],
        docs: &'static str,
        events: Vec<EventType>,
    }

    impl Function for Named {
        fn help_name(&self) -> &str {
            self.help
        }
        fn names(&self) -> Vec<String> {
            self.names.iter().map(|s| s.to_string()).collect()
        }
        fn help_docs(&self) -> &str {
            self.docs
        }
        fn run(&self, _call: &Invocation) -> FunctionResult {
            Ok(None)
        }
        fn passive_events(&self) -> Vec<EventType> {
            self.events.clone()
        }
    }

    fn loaded(class: &'static str, help: &'static str, names: &'static [&'static str]) -> LoadedFunction {
        let probe = Named {
            help,
            names,
            docs: "docs",
            events: vec![EventType::Message],
        };
        LoadedFunction::validate("test", class, &probe, Instance::Transient(|| unreachable!()))
            .unwrap()
    }

    #[test]
    fn test_validation_rules() {
        let check = |help: &'static str, names: &'static [&'static str], docs: &'static str| {
            let probe = Named {
                help,
                names,
                docs,
                events: Vec::new(),
            };
            LoadedFunction::validate("test", "X", &probe, Instance::Transient(|| unreachable!()))
                .map(|_| ())
        };
        assert_eq!(check("", &["x"], "docs"), Err(Rejection::EmptyHelpName));
        assert_eq!(check("x", &["x"], " "), Err(Rejection::EmptyHelpDocs));
        assert_eq!(check("x", &[], "docs"), Err(Rejection::NoNames));
        assert_eq!(check("x", &["y"], "docs"), Err(Rejection::HelpNameNotInNames));
        assert_eq!(check("X", &["x", "ex"], "docs"), Ok(()));
    }

    #[test]
    fn test_longest_prefix_wins() {
        let registry = FunctionRegistry::new();
        registry.insert_module(
            "test",
            vec![
                loaded("Roll", "roll", &["roll"]),
                loaded("RollDice", "roll dice", &["roll dice"]),
            ],
        );

        let (function, name, args) = registry.resolve("roll dice 5").unwrap();
        assert_eq!(function.class_name(), "RollDice");
        assert_eq!(name, "roll dice");
        assert_eq!(args, "5");

        let (function, _, args) = registry.resolve("ROLL  d20   now").unwrap();
        assert_eq!(function.class_name(), "Roll");
        assert_eq!(args, "d20 now");

        assert!(registry.resolve("frobnicate").is_none());
        assert!(registry.resolve("   ").is_none());
    }

    #[test]
    fn test_resolve_pairs_match_with_arguments_during_churn() {
        let registry = FunctionRegistry::new();
        registry.insert_module("dice", vec![loaded("Roll", "roll", &["roll"])]);

        std::thread::scope(|scope| {
            let churn = scope.spawn(|| {
                for _ in 0..2_000 {
                    registry.insert_module(
                        "fancy",
                        vec![loaded("RollDice", "roll dice", &["roll dice"])],
                    );
                    registry.remove_module("fancy");
                }
            });

            while !churn.is_finished() {
                let (function, name, args) = registry.resolve("roll dice 5").unwrap();
                match function.class_name() {
                    "RollDice" => assert_eq!((name.as_str(), args.as_str()), ("roll dice", "5")),
                    "Roll" => assert_eq!((name.as_str(), args.as_str()), ("roll", "dice 5")),
                    other => panic!("unexpected function {other}"),
                }
            }
        });
        assert_eq!(registry.modules(), vec!["dice"]);
    }

    #[test]
    fn test_underscore_fallback() {
        let registry = FunctionRegistry::new();
        registry.insert_module("test", vec![loaded("HighScores", "high scores", &["high scores"])]);

        let (function, _, args) = registry.resolve("high_scores today").unwrap();
        assert_eq!(function.class_name(), "HighScores");
        assert_eq!(args, "today");
    }

    #[test]
    fn test_collision_keeps_first() {
        let registry = FunctionRegistry::new();
        let rejected = registry.insert_module(
            "a",
            vec![
                loaded("Roll", "roll", &["roll", "dice"]),
                loaded("Dice", "dice", &["dice"]),
            ],
        );
        assert_eq!(rejected, vec![("Dice", Rejection::NameTaken("dice".into()))]);
        assert_eq!(registry.find("dice").unwrap().class_name(), "Roll");
        assert_eq!(registry.interested(EventType::Message).len(), 1);
    }

    #[test]
    fn test_remove_module_clears_every_index() {
        let registry = FunctionRegistry::new();
        registry.insert_module("a", vec![loaded("Roll", "roll", &["roll", "dice"])]);
        registry.insert_module("b", vec![loaded("Echo", "echo", &["echo"])]);
        assert_eq!(registry.modules(), vec!["a", "b"]);

        let removed = registry.remove_module("a").unwrap();
        assert_eq!(removed.len(), 1);
        assert!(registry.find("roll").is_none());
        assert!(registry.find("dice").is_none());
        assert_eq!(registry.interested(EventType::Message).len(), 1);
        assert_eq!(registry.names(), vec!["echo".to_string()]);
        assert!(registry.remove_module("a").is_none());
    }

    #[test]
    fn test_introspection() {
        let registry = FunctionRegistry::new();
        registry.insert_module("dice", vec![loaded("Roll", "roll", &["roll", "dice"])]);
        assert_eq!(registry.help_names(), vec!["roll".to_string()]);
        assert_eq!(registry.help_docs("DICE").as_deref(), Some("docs"));
        assert_eq!(registry.module_of("dice"), Some("dice"));
        assert!(registry.is_loaded("dice"));
        assert_eq!(registry.module_functions("dice").len(), 1);
    }

    #[test]
    fn test_build_catches_panicking_factory() {
        fn explode() -> BoxedFunction {
            panic!("no default for you")
        }
        let descriptor = FunctionDescriptor {
            class_name: "Explode",
            factory: FunctionFactory::Transient(explode),
        };
        let result = LoadedFunction::build("test", &descriptor, &LoadContext::detached("test"));
        assert!(matches!(result, Err(FunctionError::Panicked(msg)) if msg == "no default for you"));
    }
}
