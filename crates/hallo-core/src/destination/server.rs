//! Server-level settings and the per-server destination graph.
//!
//! Every connected server owns one [`ServerState`]. It maps canonical
//! (lowercase) names to the single live [`Channel`] or [`User`] instance for
//! that name, and keeps membership in sync with the events the server sees.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use super::{Channel, User};
use crate::foundation::event::{Event, EventKind};
use crate::foundation::permission::{GlobalRights, PermissionMask};

// =============================================================================
// Command Prefix
// =============================================================================

/// How messages in a channel must start to be addressed to the bot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CommandPrefix {
    /// Address the bot by its nickname (`nick: cmd`, `nick, cmd`, or `nick cmd`).
    #[default]
    Nick,
    /// A literal string such as `!`.
    Literal(String),
}

impl CommandPrefix {
    /// Creates a literal prefix.
    pub fn literal(prefix: impl Into<String>) -> Self {
        Self::Literal(prefix.into())
    }
}

impl From<Option<String>> for CommandPrefix {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Nick, Self::Literal)
    }
}

// =============================================================================
// Server Settings
// =============================================================================

/// Settings every destination of a server consults.
///
/// Shared by reference between the server and each of its channels and users,
/// so that rights resolution and prefix checks can reach the server layer
/// without holding the server itself.
#[derive(Debug)]
pub struct ServerSettings {
    name: String,
    nick: RwLock<String>,
    prefix: RwLock<CommandPrefix>,
    permissions: RwLock<PermissionMask>,
    global: Arc<GlobalRights>,
}

impl ServerSettings {
    pub fn new(name: impl Into<String>, nick: impl Into<String>, global: Arc<GlobalRights>) -> Self {
        Self {
            name: name.into(),
            nick: RwLock::new(nick.into()),
            prefix: RwLock::new(CommandPrefix::Nick),
            permissions: RwLock::new(PermissionMask::new()),
            global,
        }
    }

    /// Sets the default command prefix.
    pub fn with_prefix(self, prefix: CommandPrefix) -> Self {
        *self.prefix.write() = prefix;
        self
    }

    /// Sets the server-level permission mask.
    pub fn with_permissions(self, permissions: PermissionMask) -> Self {
        *self.permissions.write() = permissions;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bot's current nickname on this server.
    pub fn nick(&self) -> String {
        self.nick.read().clone()
    }

    pub fn set_nick(&self, nick: impl Into<String>) {
        *self.nick.write() = nick.into();
    }

    /// The server's default command prefix.
    pub fn prefix(&self) -> CommandPrefix {
        self.prefix.read().clone()
    }

    pub fn set_prefix(&self, prefix: CommandPrefix) {
        *self.prefix.write() = prefix;
    }

    /// Sets, or clears, a right at server level.
    pub fn set_right(&self, right: impl Into<String>, value: Option<bool>) {
        self.permissions.write().set_right(right, value);
    }

    pub fn permissions(&self) -> PermissionMask {
        self.permissions.read().clone()
    }

    /// The process-wide rights this server falls back to.
    pub fn global(&self) -> &Arc<GlobalRights> {
        &self.global
    }

    /// Resolves `right` against the server mask, then the global rights.
    pub fn rights_check(&self, right: &str) -> bool {
        match self.permissions.read().get_right(right) {
            Some(value) => value,
            None => self.global.rights_check(right),
        }
    }

    /// `true` if `name` is the bot's own nickname.
    pub fn is_own_nick(&self, name: &str) -> bool {
        self.nick.read().eq_ignore_ascii_case(name)
    }
}

// =============================================================================
// Server State
// =============================================================================

/// Channels and users known to one server.
#[derive(Debug)]
pub struct ServerState {
    settings: Arc<ServerSettings>,
    channels: RwLock<HashMap<String, Arc<Channel>>>,
    users: RwLock<HashMap<String, Arc<User>>>,
}

impl ServerState {
    pub fn new(settings: ServerSettings) -> Self {
        Self {
            settings: Arc::new(settings),
            channels: RwLock::new(HashMap::new()),
            users: RwLock::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &Arc<ServerSettings> {
        &self.settings
    }

    pub fn name(&self) -> &str {
        self.settings.name()
    }

    /// Returns the channel called `name`, creating it on first reference.
    ///
    /// Repeated lookups by any casing of the same name return the same
    /// instance for the lifetime of this state.
    pub fn get_channel_by_name(&self, name: &str) -> Arc<Channel> {
        let key = name.to_lowercase();
        if let Some(channel) = self.channels.read().get(&key) {
            return Arc::clone(channel);
        }
        let mut channels = self.channels.write();
        Arc::clone(channels.entry(key.clone()).or_insert_with(|| {
            trace!(server = %self.name(), channel = %key, "Creating channel");
            Arc::new(Channel::new(key, Arc::clone(&self.settings)))
        }))
    }

    /// Returns the user called `name`, creating it on first reference.
    pub fn get_user_by_name(&self, name: &str) -> Arc<User> {
        let key = name.to_lowercase();
        if let Some(user) = self.users.read().get(&key) {
            return Arc::clone(user);
        }
        let mut users = self.users.write();
        Arc::clone(users.entry(key.clone()).or_insert_with(|| {
            trace!(server = %self.name(), user = %key, "Creating user");
            Arc::new(User::new(key, Arc::clone(&self.settings)))
        }))
    }

    /// Looks up a channel without creating it.
    pub fn find_channel(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels.read().get(&name.to_lowercase()).cloned()
    }

    /// Looks up a user without creating it.
    pub fn find_user(&self, name: &str) -> Option<Arc<User>> {
        self.users.read().get(&name.to_lowercase()).cloned()
    }

    /// Snapshot of every known channel.
    pub fn channels(&self) -> Vec<Arc<Channel>> {
        self.channels.read().values().cloned().collect()
    }

    /// Snapshot of every known user.
    pub fn users(&self) -> Vec<Arc<User>> {
        self.users.read().values().cloned().collect()
    }

    /// Channels worth saving.
    pub fn persistent_channels(&self) -> Vec<Arc<Channel>> {
        self.channels
            .read()
            .values()
            .filter(|c| c.is_persistent())
            .cloned()
            .collect()
    }

    /// Users worth saving.
    pub fn persistent_users(&self) -> Vec<Arc<User>> {
        self.users
            .read()
            .values()
            .filter(|u| u.is_persistent())
            .cloned()
            .collect()
    }

    /// Re-keys a user after a nickname change.
    ///
    /// If another user is already stored under `new_name`, it is replaced.
    pub fn rename_user(&self, old_name: &str, new_name: &str) -> Arc<User> {
        let user = {
            let mut users = self.users.write();
            let user = users
                .remove(&old_name.to_lowercase())
                .unwrap_or_else(|| Arc::new(User::new(old_name, Arc::clone(&self.settings))));
            let new_key = new_name.to_lowercase();
            user.set_name(&new_key);
            users.insert(new_key, Arc::clone(&user));
            user
        };
        for channel in user.channels() {
            channel.rekey_user(old_name, &user);
        }
        user
    }

    /// Applies an inbound event to the graph.
    ///
    /// Joins and parts update membership, quits take users offline, name
    /// changes re-key users, and any text event marks its channel and user
    /// as active. Outbound events are ignored.
    pub fn observe(&self, event: &Event) {
        if !event.is_inbound() {
            return;
        }
        match event.kind() {
            EventKind::Join { .. } => {
                if let (Some(channel), Some(user)) = (event.channel(), event.user()) {
                    if self.settings.is_own_nick(&user.name()) {
                        channel.set_in_channel(true);
                    }
                    user.set_online(true);
                    channel.add_user(user);
                }
            }
            EventKind::Leave { .. } => {
                if let (Some(channel), Some(user)) = (event.channel(), event.user()) {
                    self.part(channel, user);
                }
            }
            EventKind::Kick { kicked_user, .. } => {
                if let Some(channel) = event.channel() {
                    self.part(channel, kicked_user);
                }
            }
            EventKind::Quit { .. } => {
                if let Some(user) = event.user() {
                    user.set_online(false);
                }
            }
            EventKind::NameChange { old_name, new_name } => {
                if self.settings.is_own_nick(old_name) {
                    debug!(server = %self.name(), nick = %new_name, "Own nickname changed");
                    self.settings.set_nick(new_name.clone());
                }
                self.rename_user(old_name, new_name);
            }
            EventKind::Message(_) | EventKind::Notice(_) | EventKind::Ctcp(_) => {
                if let Some(user) = event.user() {
                    user.update_activity();
                }
                if let Some(channel) = event.channel() {
                    channel.update_activity();
                }
            }
            _ => {}
        }
    }

    fn part(&self, channel: &Arc<Channel>, user: &Arc<User>) {
        if self.settings.is_own_nick(&user.name()) {
            channel.set_in_channel(false);
        } else {
            channel.remove_user(user);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingServer;

    fn state() -> ServerState {
        ServerState::new(ServerSettings::new(
            "libera",
            "hallo",
            Arc::new(GlobalRights::new(true)),
        ))
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let state = state();
        let a = state.get_channel_by_name("#Hallo");
        let b = state.get_channel_by_name("#hallo");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.name(), "#hallo");

        let u1 = state.get_user_by_name("Dr_Spangle");
        let u2 = state.get_user_by_name("dr_spangle");
        assert!(Arc::ptr_eq(&u1, &u2));
        assert_eq!(state.users().len(), 1);
    }

    #[test]
    fn test_find_does_not_create() {
        let state = state();
        assert!(state.find_channel("#nowhere").is_none());
        assert!(state.channels().is_empty());
    }

    #[test]
    fn test_server_rights_fall_back_to_global() {
        let global = Arc::new(GlobalRights::new(false));
        let settings = ServerSettings::new("s", "hallo", Arc::clone(&global));
        assert!(!settings.rights_check("function_Roll"));

        global.set_right("function_Roll", Some(true));
        assert!(settings.rights_check("function_Roll"));

        settings.set_right("function_Roll", Some(false));
        assert!(!settings.rights_check("function_Roll"));
    }

    #[test]
    fn test_rename_user_rekeys_membership() {
        let state = state();
        let channel = state.get_channel_by_name("#hallo");
        let user = state.get_user_by_name("alice");
        channel.add_user(&user);

        let renamed = state.rename_user("alice", "Alicia");
        assert!(Arc::ptr_eq(&user, &renamed));
        assert_eq!(renamed.name(), "alicia");
        assert!(state.find_user("alice").is_none());
        assert!(state.find_user("alicia").is_some());
        assert!(channel.is_user_in_channel(&renamed));
        assert_eq!(channel.user_names(), vec!["alicia".to_string()]);
    }

    #[test]
    fn test_persistent_listing() {
        let state = state();
        state.get_channel_by_name("#plain");
        state.get_channel_by_name("#saved").set_auto_join(true);
        let saved: Vec<_> = state
            .persistent_channels()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(saved, vec!["#saved".to_string()]);
        assert!(state.persistent_users().is_empty());
    }

    #[test]
    fn test_observe_join_leave_quit() {
        let server = RecordingServer::new("test");
        let boxed = server.boxed();
        let channel = boxed.get_channel_by_name("#hallo");
        let bot = boxed.get_user_by_name("Hallo");
        let alice = boxed.get_user_by_name("alice");
        let state = boxed.state();

        state.observe(&Event::join(&boxed, channel.clone(), bot.clone(), None));
        assert!(channel.is_in_channel());

        state.observe(&Event::join(&boxed, channel.clone(), alice.clone(), None));
        assert!(alice.is_online());
        assert!(channel.is_user_in_channel(&alice));

        state.observe(&Event::leave(&boxed, channel.clone(), alice.clone(), None));
        assert!(!channel.is_user_in_channel(&alice));

        state.observe(&Event::join(&boxed, channel.clone(), alice.clone(), None));
        state.observe(&Event::quit(&boxed, alice.clone(), Some("bye".into())));
        assert!(!alice.is_online());
        assert!(!channel.is_user_in_channel(&alice));

        state.observe(&Event::join(&boxed, channel.clone(), alice.clone(), None));
        state.observe(&Event::kick(&boxed, channel.clone(), alice.clone(), bot, None));
        assert!(!channel.is_in_channel());
        assert!(channel.users().is_empty());
    }

    #[test]
    fn test_observe_name_change() {
        let server = RecordingServer::new("test");
        let boxed = server.boxed();
        let alice = boxed.get_user_by_name("alice");
        boxed
            .state()
            .observe(&Event::name_change(&boxed, alice, "alice", "alicia"));
        assert!(boxed.state().find_user("alicia").is_some());

        let bot = boxed.get_user_by_name("hallo");
        boxed
            .state()
            .observe(&Event::name_change(&boxed, bot, "hallo", "hallo2"));
        assert_eq!(boxed.nick(), "hallo2");
    }

    #[test]
    fn test_observe_ignores_outbound() {
        let server = RecordingServer::new("test");
        let boxed = server.boxed();
        let channel = boxed.get_channel_by_name("#hallo");
        let alice = boxed.get_user_by_name("alice");
        let event = Event::join(&boxed, channel.clone(), alice, None).outbound();
        boxed.state().observe(&event);
        assert!(channel.users().is_empty());
    }
}
