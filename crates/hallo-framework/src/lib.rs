//! # Hallo Framework
//!
//! Functions, modules and the dispatcher that connects them to events.
//!
//! This layer provides:
//! - The [`Function`] contract and the [`Invocation`] passed to direct calls
//! - Module registration through [`define_module!`] and a [`ModuleCatalog`]
//! - The [`FunctionRegistry`], indexed by name and by passive event type
//! - The [`Dispatcher`]: direct and passive dispatch, rights checks, failure
//!   isolation, and module load/reload/unload with persistent state
//!
//! ```text
//! Event ─▶ Dispatcher ─┬─▶ resolve ─▶ rights ─▶ Function::run ─▶ Server::send
//!                      └─▶ interested ─▶ rights ─▶ Function::passive_run
//! ```

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod function;
pub mod module;
pub mod registry;

pub use context::LoadContext;
pub use dispatcher::{
    DispatchFlags, DispatchOutcome, Dispatcher, LoadReport, NO_PERMISSION, NOT_RECOGNISED,
    PassiveSummary,
};
pub use error::{FunctionError, FunctionResult, ModuleError, ModuleResult};
pub use function::{BoxedFunction, Function, Invocation, PersistentFunction};
pub use module::{FunctionDescriptor, FunctionFactory, ModuleCatalog, ModuleDescriptor};
pub use registry::{FunctionRegistry, LoadedFunction, Rejection};
