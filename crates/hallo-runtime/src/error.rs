//! Runtime error types.

use hallo_framework::ModuleError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Module(#[from] ModuleError),

    /// A server with this name is already registered.
    #[error("Server already registered: {0}")]
    ServerExists(String),

    #[error("Server not found: {0}")]
    ServerNotFound(String),

    /// Installing a shutdown signal handler failed.
    #[error("Failed to listen for shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
