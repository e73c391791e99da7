//! Event model.
//!
//! An [`Event`] is an immutable record of something that happened on (or is
//! about to be sent to) a server: a message, a join, a ping, a clock tick.
//! The variant-specific payload lives in [`EventKind`]; the context every
//! event may carry (server, channel, user, raw protocol data) lives on the
//! event itself, so an event that is both channel- and user-scoped simply has
//! both fields set.
//!
//! [`EventType`] is the payload-free tag used to register passive interest.
//!
//! # Addressing
//!
//! Inbound text events work out on construction whether they were addressed
//! to the bot:
//!
//! ```text
//! private message            -> Prefixed, whole text is the command
//! "hallo: roll" / "hallo, …"  -> Prefixed
//! "hallo roll"               -> Mentioned  (errors are hidden)
//! "!roll" with prefix "!"    -> Prefixed
//! anything else              -> Unaddressed
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::error::ParseEventTypeError;
use crate::destination::{Channel, CommandPrefix, Destination, User};
use crate::integration::BoxedServer;

// ============================================================================
// Event Type Classification
// ============================================================================

/// Payload-free tag of an [`EventKind`].
///
/// Functions declare passive interest in a set of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    Second,
    Minute,
    Hour,
    Day,
    Ping,
    Quit,
    NameChange,
    Join,
    Leave,
    Kick,
    Invite,
    Mode,
    Message,
    Notice,
    Ctcp,
}

impl EventType {
    /// Every event type, in declaration order.
    pub const ALL: [EventType; 15] = [
        EventType::Second,
        EventType::Minute,
        EventType::Hour,
        EventType::Day,
        EventType::Ping,
        EventType::Quit,
        EventType::NameChange,
        EventType::Join,
        EventType::Leave,
        EventType::Kick,
        EventType::Invite,
        EventType::Mode,
        EventType::Message,
        EventType::Notice,
        EventType::Ctcp,
    ];

    /// Snake-case name of the type.
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Second => "second",
            EventType::Minute => "minute",
            EventType::Hour => "hour",
            EventType::Day => "day",
            EventType::Ping => "ping",
            EventType::Quit => "quit",
            EventType::NameChange => "name_change",
            EventType::Join => "join",
            EventType::Leave => "leave",
            EventType::Kick => "kick",
            EventType::Invite => "invite",
            EventType::Mode => "mode",
            EventType::Message => "message",
            EventType::Notice => "notice",
            EventType::Ctcp => "ctcp",
        }
    }

    /// Whether this is one of the clock tick types.
    pub fn is_tick(self) -> bool {
        matches!(
            self,
            EventType::Second | EventType::Minute | EventType::Hour | EventType::Day
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ParseEventTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == lower || (lower == "nick" && *t == EventType::NameChange))
            .ok_or_else(|| ParseEventTypeError(s.to_string()))
    }
}

// ============================================================================
// Event Payloads
// ============================================================================

/// Whether the event came from the network or is about to be sent to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// The protocol unit an event was built from.
#[derive(Debug, Clone, PartialEq)]
pub enum RawData {
    /// One line as received from an IRC server.
    Irc(String),
    /// One update object as received from the Telegram API.
    Telegram(serde_json::Value),
}

/// How a text event was addressed to the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// Explicitly addressed: private message, `nick:`/`nick,`, or the literal prefix.
    Prefixed,
    /// Started with the bare nickname. Treated as a command, but "not
    /// recognised" replies are suppressed since ambient mentions are common.
    Mentioned,
    /// Not addressed to the bot.
    Unaddressed,
}

impl Addressing {
    pub fn is_addressed(self) -> bool {
        !matches!(self, Addressing::Unaddressed)
    }

    /// Whether resolution errors should be hidden from the sender.
    pub fn hide_errors(self) -> bool {
        matches!(self, Addressing::Mentioned)
    }
}

/// Body of a message, notice or CTCP event.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBody {
    text: String,
    photo_id: Option<String>,
    addressing: Addressing,
    command_text: Option<String>,
}

impl TextBody {
    fn outbound(text: String) -> Self {
        Self {
            text,
            photo_id: None,
            addressing: Addressing::Unaddressed,
            command_text: None,
        }
    }

    fn inbound(text: String, channel: Option<&Channel>) -> Self {
        let (addressing, command_text) = check_prefix(channel, &text);
        Self {
            text,
            photo_id: None,
            addressing,
            command_text,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Identifier of an attached photo, if any.
    pub fn photo_id(&self) -> Option<&str> {
        self.photo_id.as_deref()
    }

    pub fn addressing(&self) -> Addressing {
        self.addressing
    }

    /// The text after the prefix, if the event was addressed to the bot.
    pub fn command_text(&self) -> Option<&str> {
        self.command_text.as_deref()
    }
}

/// Variant-specific payload of an [`Event`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Second,
    Minute,
    Hour,
    Day,
    Ping {
        number: String,
    },
    Quit {
        message: Option<String>,
    },
    NameChange {
        old_name: String,
        new_name: String,
    },
    Join {
        password: Option<String>,
    },
    Leave {
        message: Option<String>,
    },
    /// The event's user is the one kicking.
    Kick {
        kicked_user: Arc<User>,
        message: Option<String>,
    },
    /// The event's user is the one inviting.
    Invite {
        invited_user: Arc<User>,
    },
    Mode {
        mode_changes: String,
    },
    Message(TextBody),
    Notice(TextBody),
    Ctcp(TextBody),
}

impl EventKind {
    pub fn event_type(&self) -> EventType {
        match self {
            EventKind::Second => EventType::Second,
            EventKind::Minute => EventType::Minute,
            EventKind::Hour => EventType::Hour,
            EventKind::Day => EventType::Day,
            EventKind::Ping { .. } => EventType::Ping,
            EventKind::Quit { .. } => EventType::Quit,
            EventKind::NameChange { .. } => EventType::NameChange,
            EventKind::Join { .. } => EventType::Join,
            EventKind::Leave { .. } => EventType::Leave,
            EventKind::Kick { .. } => EventType::Kick,
            EventKind::Invite { .. } => EventType::Invite,
            EventKind::Mode { .. } => EventType::Mode,
            EventKind::Message(_) => EventType::Message,
            EventKind::Notice(_) => EventType::Notice,
            EventKind::Ctcp(_) => EventType::Ctcp,
        }
    }

    fn text_body(&self) -> Option<&TextBody> {
        match self {
            EventKind::Message(body) | EventKind::Notice(body) | EventKind::Ctcp(body) => {
                Some(body)
            }
            _ => None,
        }
    }

    fn text_body_mut(&mut self) -> Option<&mut TextBody> {
        match self {
            EventKind::Message(body) | EventKind::Notice(body) | EventKind::Ctcp(body) => {
                Some(body)
            }
            _ => None,
        }
    }
}

// ============================================================================
// Event
// ============================================================================

/// Something that happened on a server, or is about to be sent to one.
///
/// Built with the per-variant constructors and the `with_*` builders; once
/// handed to the dispatcher it is read-only.
#[derive(Clone)]
pub struct Event {
    direction: Direction,
    created_at: DateTime<Utc>,
    server: Option<BoxedServer>,
    channel: Option<Arc<Channel>>,
    user: Option<Arc<User>>,
    raw: Option<RawData>,
    kind: EventKind,
}

impl Event {
    fn new(
        kind: EventKind,
        server: Option<&BoxedServer>,
        channel: Option<Arc<Channel>>,
        user: Option<Arc<User>>,
    ) -> Self {
        Self {
            direction: Direction::Inbound,
            created_at: Utc::now(),
            server: server.cloned(),
            channel,
            user,
            raw: None,
            kind,
        }
    }

    // ---------------------------------------------------------------------
    // Constructors
    // ---------------------------------------------------------------------

    /// A clock tick. `kind` should be one of the tick variants.
    pub fn tick(kind: EventKind) -> Self {
        Self::new(kind, None, None, None)
    }

    pub fn second() -> Self {
        Self::tick(EventKind::Second)
    }

    pub fn minute() -> Self {
        Self::tick(EventKind::Minute)
    }

    pub fn hour() -> Self {
        Self::tick(EventKind::Hour)
    }

    pub fn day() -> Self {
        Self::tick(EventKind::Day)
    }

    pub fn ping(server: &BoxedServer, number: impl Into<String>) -> Self {
        Self::new(
            EventKind::Ping {
                number: number.into(),
            },
            Some(server),
            None,
            None,
        )
    }

    pub fn quit(server: &BoxedServer, user: Arc<User>, message: Option<String>) -> Self {
        Self::new(EventKind::Quit { message }, Some(server), None, Some(user))
    }

    pub fn name_change(
        server: &BoxedServer,
        user: Arc<User>,
        old_name: impl Into<String>,
        new_name: impl Into<String>,
    ) -> Self {
        Self::new(
            EventKind::NameChange {
                old_name: old_name.into(),
                new_name: new_name.into(),
            },
            Some(server),
            None,
            Some(user),
        )
    }

    pub fn join(
        server: &BoxedServer,
        channel: Arc<Channel>,
        user: Arc<User>,
        password: Option<String>,
    ) -> Self {
        Self::new(
            EventKind::Join { password },
            Some(server),
            Some(channel),
            Some(user),
        )
    }

    pub fn leave(
        server: &BoxedServer,
        channel: Arc<Channel>,
        user: Arc<User>,
        message: Option<String>,
    ) -> Self {
        Self::new(
            EventKind::Leave { message },
            Some(server),
            Some(channel),
            Some(user),
        )
    }

    pub fn kick(
        server: &BoxedServer,
        channel: Arc<Channel>,
        kicking_user: Arc<User>,
        kicked_user: Arc<User>,
        message: Option<String>,
    ) -> Self {
        Self::new(
            EventKind::Kick {
                kicked_user,
                message,
            },
            Some(server),
            Some(channel),
            Some(kicking_user),
        )
    }

    pub fn invite(
        server: &BoxedServer,
        channel: Arc<Channel>,
        inviting_user: Arc<User>,
        invited_user: Arc<User>,
    ) -> Self {
        Self::new(
            EventKind::Invite { invited_user },
            Some(server),
            Some(channel),
            Some(inviting_user),
        )
    }

    pub fn mode(
        server: &BoxedServer,
        channel: Arc<Channel>,
        user: Option<Arc<User>>,
        mode_changes: impl Into<String>,
    ) -> Self {
        Self::new(
            EventKind::Mode {
                mode_changes: mode_changes.into(),
            },
            Some(server),
            Some(channel),
            user,
        )
    }

    /// An inbound message. A message without a channel is private.
    pub fn message(
        server: &BoxedServer,
        channel: Option<Arc<Channel>>,
        user: Option<Arc<User>>,
        text: impl Into<String>,
    ) -> Self {
        let body = TextBody::inbound(text.into(), channel.as_deref());
        Self::new(EventKind::Message(body), Some(server), channel, user)
    }

    /// An inbound notice.
    pub fn notice(
        server: &BoxedServer,
        channel: Option<Arc<Channel>>,
        user: Option<Arc<User>>,
        text: impl Into<String>,
    ) -> Self {
        let body = TextBody::inbound(text.into(), channel.as_deref());
        Self::new(EventKind::Notice(body), Some(server), channel, user)
    }

    /// An inbound CTCP request.
    pub fn ctcp(
        server: &BoxedServer,
        channel: Option<Arc<Channel>>,
        user: Option<Arc<User>>,
        text: impl Into<String>,
    ) -> Self {
        let body = TextBody::inbound(text.into(), channel.as_deref());
        Self::new(EventKind::Ctcp(body), Some(server), channel, user)
    }

    /// An outbound message to `destination`.
    pub fn say(server: &BoxedServer, destination: &Destination, text: impl Into<String>) -> Self {
        let (channel, user) = match destination {
            Destination::Channel(c) => (Some(Arc::clone(c)), None),
            Destination::User(u) => (None, Some(Arc::clone(u))),
        };
        Self::new(
            EventKind::Message(TextBody::outbound(text.into())),
            Some(server),
            channel,
            user,
        )
        .outbound()
    }

    // ---------------------------------------------------------------------
    // Builders
    // ---------------------------------------------------------------------

    /// Attaches the protocol unit this event was built from.
    pub fn with_raw(mut self, raw: RawData) -> Self {
        self.raw = Some(raw);
        self
    }

    /// Attaches a photo to a text event. Other events are returned unchanged.
    pub fn with_photo(mut self, photo_id: impl Into<String>) -> Self {
        if let Some(body) = self.kind.text_body_mut() {
            body.photo_id = Some(photo_id.into());
        }
        self
    }

    /// Marks the event outbound. Outbound text is never addressed to the bot.
    pub fn outbound(mut self) -> Self {
        self.direction = Direction::Outbound;
        if let Some(body) = self.kind.text_body_mut() {
            body.addressing = Addressing::Unaddressed;
            body.command_text = None;
        }
        self
    }

    /// The reply to a ping.
    pub fn pong(&self) -> Option<Event> {
        match &self.kind {
            EventKind::Ping { number } => Some(
                Self::new(
                    EventKind::Ping {
                        number: number.clone(),
                    },
                    self.server.as_ref(),
                    None,
                    None,
                )
                .outbound(),
            ),
            _ => None,
        }
    }

    /// An outbound text event of the same kind, to the same channel and user.
    ///
    /// Returns `None` for events that are not messages, notices or CTCPs.
    pub fn create_response(&self, text: impl Into<String>) -> Option<Event> {
        let body = TextBody::outbound(text.into());
        let kind = match &self.kind {
            EventKind::Message(_) => EventKind::Message(body),
            EventKind::Notice(_) => EventKind::Notice(body),
            EventKind::Ctcp(_) => EventKind::Ctcp(body),
            _ => return None,
        };
        Some(
            Self::new(
                kind,
                self.server.as_ref(),
                self.channel.clone(),
                self.user.clone(),
            )
            .outbound(),
        )
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_inbound(&self) -> bool {
        self.direction == Direction::Inbound
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn server(&self) -> Option<&BoxedServer> {
        self.server.as_ref()
    }

    pub fn channel(&self) -> Option<&Arc<Channel>> {
        self.channel.as_ref()
    }

    pub fn user(&self) -> Option<&Arc<User>> {
        self.user.as_ref()
    }

    pub fn raw(&self) -> Option<&RawData> {
        self.raw.as_ref()
    }

    /// Where replies go: the channel if there is one, else the user.
    pub fn destination(&self) -> Option<Destination> {
        self.channel
            .clone()
            .map(Destination::Channel)
            .or_else(|| self.user.clone().map(Destination::User))
    }

    /// Text of a message, notice or CTCP event.
    pub fn text(&self) -> Option<&str> {
        self.kind.text_body().map(TextBody::text)
    }

    pub fn photo_id(&self) -> Option<&str> {
        self.kind.text_body().and_then(TextBody::photo_id)
    }

    /// How a text event was addressed. `None` for other events.
    pub fn addressing(&self) -> Option<Addressing> {
        self.kind.text_body().map(TextBody::addressing)
    }

    /// The command text of a text event addressed to the bot.
    pub fn command_text(&self) -> Option<&str> {
        self.kind.text_body().and_then(TextBody::command_text)
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("direction", &self.direction)
            .field("created_at", &self.created_at)
            .field("server", &self.server.as_ref().map(|s| s.name().to_string()))
            .field("channel", &self.channel.as_ref().map(|c| c.name().to_string()))
            .field("user", &self.user.as_ref().map(|u| u.name()))
            .field("kind", &self.kind)
            .finish()
    }
}

// ============================================================================
// Prefix Check
// ============================================================================

/// Works out whether `text` sent in `channel` is addressed to the bot, and
/// the command text after the prefix.
pub fn check_prefix(channel: Option<&Channel>, text: &str) -> (Addressing, Option<String>) {
    let Some(channel) = channel else {
        return (Addressing::Prefixed, Some(text.trim().to_string()));
    };
    match channel.effective_prefix() {
        CommandPrefix::Nick => {
            let nick = channel.server_settings().nick();
            match strip_prefix_ignore_case(text, &nick) {
                Some(rest) => match rest.strip_prefix([':', ',']) {
                    Some(command) => (Addressing::Prefixed, Some(command.trim().to_string())),
                    None => (Addressing::Mentioned, Some(rest.trim().to_string())),
                },
                None => (Addressing::Unaddressed, None),
            }
        }
        CommandPrefix::Literal(prefix) => match strip_prefix_ignore_case(text, &prefix) {
            Some(rest) => (Addressing::Prefixed, Some(rest.trim().to_string())),
            None => (Addressing::Unaddressed, None),
        },
    }
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return None;
    }
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &text[prefix.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingServer;

    #[test]
    fn test_event_type_from_str() {
        assert_eq!("message".parse::<EventType>(), Ok(EventType::Message));
        assert_eq!("NAME_CHANGE".parse::<EventType>(), Ok(EventType::NameChange));
        assert_eq!("nick".parse::<EventType>(), Ok(EventType::NameChange));
        assert!("teleport".parse::<EventType>().is_err());
        for t in EventType::ALL {
            assert_eq!(t.as_str().parse::<EventType>(), Ok(t));
        }
    }

    #[test]
    fn test_private_message_is_addressed() {
        let server = RecordingServer::new("libera").boxed();
        let user = server.get_user_by_name("alice");
        let event = Event::message(&server, None, Some(user), "roll 2d6");
        assert_eq!(event.addressing(), Some(Addressing::Prefixed));
        assert_eq!(event.command_text(), Some("roll 2d6"));
        assert!(event.destination().is_some_and(|d| d.is_user()));
    }

    #[test]
    fn test_nick_prefix() {
        let server = RecordingServer::new("libera").boxed();
        let channel = server.get_channel_by_name("#hallo");
        let user = server.get_user_by_name("alice");

        let direct = Event::message(&server, Some(channel.clone()), Some(user.clone()), "Hallo: roll");
        assert_eq!(direct.addressing(), Some(Addressing::Prefixed));
        assert_eq!(direct.command_text(), Some("roll"));

        let comma = Event::message(&server, Some(channel.clone()), Some(user.clone()), "hallo, roll");
        assert_eq!(comma.addressing(), Some(Addressing::Prefixed));

        let bare = Event::message(&server, Some(channel.clone()), Some(user.clone()), "hallo roll");
        assert_eq!(bare.addressing(), Some(Addressing::Mentioned));
        assert!(bare.addressing().is_some_and(Addressing::hide_errors));
        assert_eq!(bare.command_text(), Some("roll"));

        let other = Event::message(&server, Some(channel), Some(user), "hello there");
        assert_eq!(other.addressing(), Some(Addressing::Unaddressed));
        assert_eq!(other.command_text(), None);
    }

    #[test]
    fn test_literal_prefix_override() {
        let server = RecordingServer::new("libera").boxed();
        let channel = server.get_channel_by_name("#hallo");
        channel.set_prefix(Some(CommandPrefix::literal("!")));
        let user = server.get_user_by_name("alice");

        let hit = Event::message(&server, Some(channel.clone()), Some(user.clone()), "!roll");
        assert_eq!(hit.addressing(), Some(Addressing::Prefixed));
        assert_eq!(hit.command_text(), Some("roll"));

        let miss = Event::message(&server, Some(channel), Some(user), "hallo: roll");
        assert_eq!(miss.addressing(), Some(Addressing::Unaddressed));
    }

    #[test]
    fn test_create_response_keeps_context() {
        let server = RecordingServer::new("libera").boxed();
        let channel = server.get_channel_by_name("#hallo");
        let user = server.get_user_by_name("alice");
        let notice = Event::notice(&server, Some(channel), Some(user), "hi");

        let response = notice.create_response("hello").unwrap();
        assert_eq!(response.event_type(), EventType::Notice);
        assert_eq!(response.direction(), Direction::Outbound);
        assert_eq!(response.text(), Some("hello"));
        assert_eq!(response.channel().map(|c| c.name()), Some("#hallo"));
        assert_eq!(response.user().map(|u| u.name()), Some("alice".to_string()));

        assert!(Event::minute().create_response("nope").is_none());
    }

    #[test]
    fn test_pong() {
        let server = RecordingServer::new("libera").boxed();
        let ping = Event::ping(&server, "12345").with_raw(RawData::Irc("PING :12345".into()));
        let pong = ping.pong().unwrap();
        assert_eq!(pong.direction(), Direction::Outbound);
        assert!(matches!(pong.kind(), EventKind::Ping { number } if number == "12345"));
        assert!(pong.raw().is_none());
        assert!(Event::day().pong().is_none());
    }

    #[test]
    fn test_photo_only_on_text() {
        let server = RecordingServer::new("libera").boxed();
        let user = server.get_user_by_name("alice");
        let msg = Event::message(&server, None, Some(user.clone()), "look").with_photo("abc");
        assert_eq!(msg.photo_id(), Some("abc"));

        let quit = Event::quit(&server, user, None).with_photo("abc");
        assert_eq!(quit.photo_id(), None);
    }

    #[test]
    fn test_say_is_outbound_and_unaddressed() {
        let server = RecordingServer::new("libera").boxed();
        let channel = server.get_channel_by_name("#hallo");
        let event = Event::say(&server, &Destination::Channel(channel), "hallo: roll");
        assert!(!event.is_inbound());
        assert_eq!(event.addressing(), Some(Addressing::Unaddressed));
        assert!(event.user().is_none());
    }
}
