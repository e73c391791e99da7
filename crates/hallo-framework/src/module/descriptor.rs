//! Function and module descriptors: the static, `Copy` handles the loader
//! instantiates functions from.

use std::sync::Arc;

use crate::context::LoadContext;
use crate::error::FunctionError;
use crate::function::{BoxedFunction, Function, PersistentFunction};

// ─── FunctionDescriptor ──────────────────────────────────────────────────────

/// How instances of a function are obtained.
#[derive(Clone, Copy)]
pub enum FunctionFactory {
    /// A fresh instance per call.
    Transient(fn() -> BoxedFunction),
    /// One instance per load, restored from saved state.
    Persistent(fn(&LoadContext) -> Result<BoxedFunction, FunctionError>),
}

/// A static handle to one function type.
///
/// `class_name` is the type's name; the right checked before running the
/// function is `function_<class_name>`.
#[derive(Clone, Copy)]
pub struct FunctionDescriptor {
    pub class_name: &'static str,
    pub factory: FunctionFactory,
}

impl FunctionDescriptor {
    /// Describes a function built with `Default` for every call.
    pub const fn transient<F: Function + Default>(class_name: &'static str) -> Self {
        Self {
            class_name,
            factory: FunctionFactory::Transient(create_default::<F>),
        }
    }

    /// Describes a function loaded once through [`PersistentFunction::load`].
    pub const fn persistent<F: PersistentFunction>(class_name: &'static str) -> Self {
        Self {
            class_name,
            factory: FunctionFactory::Persistent(load_persistent::<F>),
        }
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self.factory, FunctionFactory::Persistent(_))
    }

    /// Name of the right that gates this function.
    pub fn right_name(&self) -> String {
        format!("function_{}", self.class_name)
    }
}

impl std::fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("class_name", &self.class_name)
            .field("persistent", &self.is_persistent())
            .finish()
    }
}

fn create_default<F: Function + Default>() -> BoxedFunction {
    Arc::new(F::default())
}

fn load_persistent<F: PersistentFunction>(ctx: &LoadContext) -> Result<BoxedFunction, FunctionError> {
    Ok(Arc::new(F::load(ctx)?))
}

// ─── ModuleDescriptor ────────────────────────────────────────────────────────

/// A named group of functions that load and unload together.
///
/// Create one with [`define_module!`](crate::define_module).
#[derive(Debug, Clone, Copy)]
pub struct ModuleDescriptor {
    /// Module name, used by the allow-list and as config section key.
    pub name: &'static str,
    pub functions: &'static [FunctionDescriptor],
}

impl ModuleDescriptor {
    /// Looks up a function of this module by class name.
    pub fn function(&self, class_name: &str) -> Option<&FunctionDescriptor> {
        self.functions.iter().find(|f| f.class_name == class_name)
    }
}
