//! The function contract.
//!
//! A [`Function`] is one command or passive listener. It declares the names it
//! answers to, its help text and the event types it wants to see passively.
//!
//! Functions come in two flavours:
//!
//! - **Transient** functions implement [`Default`]; a fresh instance is built
//!   for every call.
//! - **Persistent** functions implement [`PersistentFunction`]; one instance
//!   is loaded when the module loads and saved when it unloads. Calls from
//!   different servers reach the same instance concurrently, so any mutable
//!   state needs its own locking.
//!
//! Register either kind through a [`ModuleDescriptor`](crate::ModuleDescriptor).
//!
//! ```rust,ignore
//! #[derive(Default)]
//! struct Echo;
//!
//! impl Function for Echo {
//!     fn help_name(&self) -> &str { "echo" }
//!     fn names(&self) -> Vec<String> { vec!["echo".into(), "say".into()] }
//!     fn help_docs(&self) -> &str { "Repeats the arguments. Format: echo <text>" }
//!
//!     fn run(&self, call: &Invocation) -> FunctionResult {
//!         Ok(Some(call.reply(call.args())))
//!     }
//! }
//! ```

use std::sync::Arc;

use hallo_core::{BoxedServer, Destination, Event, EventType, User};

use crate::context::LoadContext;
use crate::error::{FunctionError, FunctionResult};

// =============================================================================
// Function
// =============================================================================

/// A command or passive listener.
pub trait Function: Send + Sync + 'static {
    /// Name shown in help listings. Must be one of [`names`](Function::names).
    fn help_name(&self) -> &str;

    /// Names the function can be invoked by. Matched case-insensitively and
    /// may contain spaces (`"high scores"`).
    fn names(&self) -> Vec<String>;

    /// Help text.
    fn help_docs(&self) -> &str;

    /// Runs the function for a direct command.
    fn run(&self, call: &Invocation) -> FunctionResult;

    /// Event types offered to [`passive_run`](Function::passive_run).
    fn passive_events(&self) -> Vec<EventType> {
        Vec::new()
    }

    /// Reacts to an event that was not addressed to the bot.
    fn passive_run(&self, _event: &Event) -> FunctionResult {
        Ok(None)
    }

    /// Saves state when the module unloads. Only called on persistent functions.
    fn save(&self, _ctx: &LoadContext) -> Result<(), FunctionError> {
        Ok(())
    }
}

/// A shared function instance.
pub type BoxedFunction = Arc<dyn Function>;

/// A function whose single instance lives across calls and reloads.
pub trait PersistentFunction: Function + Sized {
    /// Restores the instance, or builds a fresh one if nothing was saved.
    fn load(ctx: &LoadContext) -> Result<Self, FunctionError>;
}

// =============================================================================
// Invocation
// =============================================================================

/// A parsed direct call.
#[derive(Clone)]
pub struct Invocation {
    command_name: String,
    args: String,
    server: BoxedServer,
    user: Option<Arc<User>>,
    destination: Destination,
    event: Option<Event>,
}

impl Invocation {
    pub fn new(
        command_name: impl Into<String>,
        args: impl Into<String>,
        server: BoxedServer,
        user: Option<Arc<User>>,
        destination: Destination,
    ) -> Self {
        Self {
            command_name: command_name.into(),
            args: args.into(),
            server,
            user,
            destination,
            event: None,
        }
    }

    /// Attaches the event that triggered the call.
    pub fn with_event(mut self, event: Event) -> Self {
        self.event = Some(event);
        self
    }

    /// The name the command matched, lowercase.
    pub fn command_name(&self) -> &str {
        &self.command_name
    }

    /// Everything after the command name, whitespace-normalised.
    pub fn args(&self) -> &str {
        &self.args
    }

    pub fn server(&self) -> &BoxedServer {
        &self.server
    }

    pub fn user(&self) -> Option<&Arc<User>> {
        self.user.as_ref()
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// The event that triggered the call, when dispatched from one.
    pub fn event(&self) -> Option<&Event> {
        self.event.as_ref()
    }

    /// Builds a reply to the caller.
    ///
    /// Replies to a notice or CTCP keep that kind; everything else becomes a
    /// message to the call's destination.
    pub fn reply(&self, text: impl Into<String>) -> Event {
        let text = text.into();
        match self.event.as_ref() {
            Some(event) => event
                .create_response(text.clone())
                .unwrap_or_else(|| Event::say(&self.server, &self.destination, text)),
            None => Event::say(&self.server, &self.destination, text),
        }
    }
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("command_name", &self.command_name)
            .field("args", &self.args)
            .field("server", &self.server.name())
            .field("user", &self.user.as_ref().map(|u| u.name()))
            .field("destination", &self.destination.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hallo_core::testing::RecordingServer;
    use hallo_core::{Direction, EventType};

    #[test]
    fn test_reply_without_event_goes_to_destination() {
        let server = RecordingServer::new("test").boxed();
        let channel = server.get_channel_by_name("#hallo");
        let call = Invocation::new(
            "roll",
            "",
            server.clone(),
            None,
            Destination::Channel(channel),
        );
        let reply = call.reply("4");
        assert_eq!(reply.direction(), Direction::Outbound);
        assert_eq!(reply.text(), Some("4"));
        assert_eq!(reply.channel().map(|c| c.name()), Some("#hallo"));
    }

    #[test]
    fn test_reply_keeps_notice_kind() {
        let server = RecordingServer::new("test").boxed();
        let user = server.get_user_by_name("alice");
        let notice = Event::notice(&server, None, Some(user.clone()), "roll");
        let call = Invocation::new("roll", "", server.clone(), Some(user.clone()), user.into())
            .with_event(notice);
        assert_eq!(call.reply("4").event_type(), EventType::Notice);
    }
}
