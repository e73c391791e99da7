//! Hallo Runtime - orchestration layer for the Hallo chat bot.
//!
//! This crate provides:
//! - Configuration loading and validation (`HalloConfig`, `ConfigLoader`)
//! - Logging setup (`LoggingBuilder`, `init_from_config`)
//! - The time-tick clock (`Clock`)
//! - Runtime orchestration (`HalloRuntime`): global rights, user groups,
//!   module loading, server registration and event handling
//!
//! ```ignore
//! use hallo_runtime::HalloRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = HalloRuntime::builder().modules([DICE, GREETER]).build()?;
//!
//!     // Protocol crates register their servers and feed events in
//!     let server = IrcServer::connect(runtime.server_settings("libera")).await?;
//!     runtime.register_server(server)?;
//!
//!     // Run until Ctrl+C, then unload modules and save their state
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use clock::{Clock, run_clock};
pub use config::{
    ConfigError, ConfigLoader, ConfigResult, HalloConfig, LoggingConfig, ServerConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents, init_from_config};
pub use runtime::{HalloRuntime, RuntimeBuilder};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, event, info, instrument, span, trace, warn};
}
