//! Error types for the Hallo framework.

use std::path::PathBuf;

use hallo_core::Event;
use thiserror::Error;

/// Failure of a function body, passive body, or persistence hook.
///
/// The dispatcher turns these into log entries and, for direct calls, a
/// user-visible "Function failed with error message: …" reply.
#[derive(Debug, Error)]
pub enum FunctionError {
    /// The function rejected its arguments.
    #[error("{0}")]
    InvalidArgs(String),

    /// Generic failure reported by the function.
    #[error("{0}")]
    Failed(String),

    /// The function panicked.
    #[error("function panicked: {0}")]
    Panicked(String),

    /// Reading or writing persisted state failed.
    #[error("state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Persisted state or config could not be (de)serialised.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl FunctionError {
    /// Creates a generic failure.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    /// Creates an invalid-arguments failure.
    pub fn invalid_args(msg: impl Into<String>) -> Self {
        Self::InvalidArgs(msg.into())
    }

    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        Self::Panicked(msg)
    }
}

/// Errors from module loading and unloading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
    /// No module of that name is compiled in.
    #[error("module '{0}' does not exist")]
    Unknown(String),

    /// The module exists but is not in the allow-list.
    #[error("module '{0}' is not enabled")]
    NotEnabled(String),

    /// The module is not currently loaded.
    #[error("module '{0}' is not loaded")]
    NotLoaded(String),
}

/// Result of a function body: zero or one response event.
pub type FunctionResult = Result<Option<Event>, FunctionError>;

/// Result type for module operations.
pub type ModuleResult<T> = Result<T, ModuleError>;
