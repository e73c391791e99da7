//! # Hallo Core
//!
//! The event model and destination graph of the Hallo chat bot.
//!
//! ## Architecture Layers
//!
//! ### Foundation Layer
//!
//! - **Events**: immutable [`Event`] records with a tagged [`EventKind`]
//!   payload and optional server, channel and user context
//! - **Permissions**: sparse [`PermissionMask`]s and the process-wide
//!   [`GlobalRights`]
//! - **Errors**: [`SendError`]
//!
//! ### Destination Layer
//!
//! - [`ServerState`]: per-server map of canonical names to [`Channel`]s and
//!   [`User`]s, kept in sync with observed events
//! - [`UserGroup`]s shared across servers through a [`UserGroupRegistry`]
//! - Layered rights resolution:
//!
//! ```text
//! User ─▶ UserGroups ─▶ Channel ─▶ Server ─▶ GlobalRights
//! ```
//!
//! ### Integration Layer
//!
//! - [`Server`]: implemented by protocol crates, consumed by the dispatcher
//!
//! ## Example
//!
//! ```rust,ignore
//! use hallo_core::{Event, Destination, Server};
//!
//! fn greet(server: &hallo_core::BoxedServer) {
//!     let channel = server.get_channel_by_name("#hallo");
//!     let event = Event::say(server, &Destination::Channel(channel), "Hello!");
//!     let _ = server.send(event);
//! }
//! ```

pub mod destination;
pub mod foundation;
pub mod integration;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use destination::{
    Channel, CommandPrefix, Destination, ServerSettings, ServerState, User, UserGroup,
    UserGroupRegistry,
};
pub use foundation::{
    Addressing, Direction, Event, EventKind, EventType, GlobalRights, ParseEventTypeError,
    PermissionMask, RawData, SendError, SendResult, TextBody,
};
pub use integration::{BoxedServer, Server};

/// Prelude for common imports.
pub mod prelude {
    pub use super::destination::{Channel, CommandPrefix, Destination, User, UserGroup};
    pub use super::foundation::*;
    pub use super::integration::{BoxedServer, Server};
}
