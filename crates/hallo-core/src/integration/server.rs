//! The `Server` trait.
//!
//! A server is one connection to a chat network. Protocol handling lives
//! outside this crate; the core only needs to reach the server's destination
//! graph and to hand it outbound events.

use std::sync::Arc;

use crate::destination::{Channel, ServerState, User};
use crate::foundation::error::SendResult;
use crate::foundation::event::Event;

/// One connection to a chat network.
///
/// Implementors provide [`state`](Server::state) and [`send`](Server::send);
/// everything else has a default built on the state.
///
/// `send` is called synchronously from whatever thread runs dispatch, so it
/// should enqueue rather than block on I/O.
pub trait Server: Send + Sync + 'static {
    /// The server's destination graph and settings.
    fn state(&self) -> &ServerState;

    /// Sends an outbound event.
    fn send(&self, event: Event) -> SendResult;

    /// The server's configured name.
    fn name(&self) -> &str {
        self.state().name()
    }

    /// The bot's nickname on this server.
    fn nick(&self) -> String {
        self.state().settings().nick()
    }

    /// Returns the channel called `name`, creating it on first reference.
    fn get_channel_by_name(&self, name: &str) -> Arc<Channel> {
        self.state().get_channel_by_name(name)
    }

    /// Returns the user called `name`, creating it on first reference.
    fn get_user_by_name(&self, name: &str) -> Arc<User> {
        self.state().get_user_by_name(name)
    }

    /// Server-level rights check (server mask, then global rights).
    fn rights_check(&self, right: &str) -> bool {
        self.state().settings().rights_check(right)
    }
}

/// A shared server trait object.
pub type BoxedServer = Arc<dyn Server>;
