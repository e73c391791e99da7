//! Modules: named, hot-loadable groups of functions.
//!
//! A [`ModuleDescriptor`] lists the functions a module contributes through
//! [`FunctionDescriptor`]s, each carrying a factory pointer. Modules are
//! declared as statics with [`define_module!`](crate::define_module) and
//! collected into a [`ModuleCatalog`], which also applies the allow-list.

pub mod catalog;
pub mod descriptor;
pub mod macros;

pub use catalog::ModuleCatalog;
pub use descriptor::{FunctionDescriptor, FunctionFactory, ModuleDescriptor};
