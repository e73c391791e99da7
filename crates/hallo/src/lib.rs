//! # Hallo
//!
//! The core of a multi-protocol chat bot: events, layered rights, pluggable
//! functions and the dispatcher that connects them.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  Event  ┌────────────┐  run / passive_run  ┌───────────────────┐
//! │ Server (IRC, │────────▶│ Dispatcher │────────────────────▶│ Function "roll"   │
//! │ Telegram, …) │◀────────│            │────────────────────▶│ Function "greet"  │
//! └──────────────┘  send   └────────────┘                     └───────────────────┘
//!        │                        │
//!        ▼                        ▼
//!  Channel / User ─▶ UserGroups ─▶ Server ─▶ GlobalRights   (rights resolution)
//! ```
//!
//! - **Servers**: protocol connections implementing [`Server`](core::Server);
//!   each owns a destination graph of channels and users
//! - **Functions**: commands and passive listeners, grouped into modules
//!   that load, reload and unload at runtime
//! - **Dispatcher**: resolves commands, checks rights, isolates failures
//! - **Runtime**: configuration, logging, the tick clock and shutdown
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hallo::prelude::*;
//!
//! #[derive(Default)]
//! struct Roll;
//!
//! impl Function for Roll {
//!     fn help_name(&self) -> &str { "roll" }
//!     fn names(&self) -> Vec<String> { vec!["roll".into(), "dice".into()] }
//!     fn help_docs(&self) -> &str { "Rolls a die. Format: roll" }
//!     fn run(&self, call: &Invocation) -> FunctionResult {
//!         Ok(Some(call.reply("4")))
//!     }
//! }
//!
//! pub static DICE: ModuleDescriptor = define_module! {
//!     name: "dice",
//!     functions: [Roll],
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = HalloRuntime::builder().module(DICE).build()?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output
//! - `testing`: the in-memory `RecordingServer`

pub use hallo_core as core;
pub use hallo_framework as framework;
pub use hallo_runtime as runtime;

pub use hallo_framework::define_module;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use hallo::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use hallo_runtime::{HalloConfig, HalloRuntime};

    // Functions and modules
    pub use hallo_framework::{
        Dispatcher, Function, FunctionError, FunctionResult, Invocation, LoadContext,
        ModuleCatalog, ModuleDescriptor, PersistentFunction, define_module,
    };

    // Events and destinations
    pub use hallo_core::{
        BoxedServer, Channel, Destination, Event, EventKind, EventType, PermissionMask, Server,
        User, UserGroup,
    };
}
