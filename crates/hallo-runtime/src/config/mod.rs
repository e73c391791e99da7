//! Configuration module for the Hallo runtime.
//!
//! Loads a [`HalloConfig`] from defaults, TOML/YAML files and `HALLO_*`
//! environment variables, and validates it before the runtime is built.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    ChannelConfig, HalloConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig,
    ModulesConfig, RightsConfig, ServerConfig, SpanEventConfig, UserConfig,
};
pub use validation::validate_config;
