//! Error types shared by the core crate.
//!
//! Framework-level errors (function failures, module loading) live in
//! `hallo-framework`; configuration and runtime errors in `hallo-runtime`.

use thiserror::Error;

// =============================================================================
// Send Errors
// =============================================================================

/// Errors a [`Server`](crate::Server) can report when sending an event.
#[derive(Debug, Clone, Error)]
pub enum SendError {
    /// The server is not connected.
    #[error("server '{server}' is not connected")]
    NotConnected {
        /// Name of the server.
        server: String,
    },

    /// The event has no channel or user to deliver to.
    #[error("event has no destination")]
    NoDestination,

    /// The event is inbound and cannot be sent.
    #[error("cannot send an inbound event")]
    Inbound,

    /// The transport rejected the event.
    #[error("failed to send event: {0}")]
    Transport(String),
}

impl SendError {
    /// Creates a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

/// Error returned when parsing an unknown event type name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown event type '{0}'")]
pub struct ParseEventTypeError(pub String);

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for send operations.
pub type SendResult<T = ()> = Result<T, SendError>;
