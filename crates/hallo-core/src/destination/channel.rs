//! Channels: named rooms on a server.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::server::{CommandPrefix, ServerSettings};
use super::User;
use crate::foundation::permission::PermissionMask;

#[derive(Debug)]
struct ChannelState {
    members: BTreeMap<String, Arc<User>>,
    in_channel: bool,
    password: Option<String>,
    logging: bool,
    uppercase: bool,
    passive_enabled: bool,
    auto_join: bool,
    prefix: Option<CommandPrefix>,
    permissions: PermissionMask,
    last_active: Option<DateTime<Utc>>,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            members: BTreeMap::new(),
            in_channel: false,
            password: None,
            logging: true,
            uppercase: false,
            passive_enabled: true,
            auto_join: false,
            prefix: None,
            permissions: PermissionMask::new(),
            last_active: None,
        }
    }
}

/// A channel on one server.
///
/// The name is stored lowercase. Membership is kept symmetric with the
/// channel set of each [`User`]: use [`Channel::add_user`] and
/// [`Channel::remove_user`] rather than touching either side alone.
#[derive(Debug)]
pub struct Channel {
    name: String,
    settings: Arc<ServerSettings>,
    state: RwLock<ChannelState>,
}

impl Channel {
    pub(crate) fn new(name: impl Into<String>, settings: Arc<ServerSettings>) -> Self {
        Self {
            name: name.into().to_lowercase(),
            settings,
            state: RwLock::new(ChannelState::default()),
        }
    }

    /// Canonical lowercase name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Settings of the owning server.
    pub fn server_settings(&self) -> &Arc<ServerSettings> {
        &self.settings
    }

    // ---------------------------------------------------------------------
    // Membership
    // ---------------------------------------------------------------------

    /// Adds `user` to this channel and this channel to `user`.
    pub fn add_user(self: &Arc<Self>, user: &Arc<User>) {
        self.state
            .write()
            .members
            .insert(user.name(), Arc::clone(user));
        user.link_channel(self);
    }

    /// Removes `user` from this channel and this channel from `user`.
    ///
    /// Removing a non-member is a no-op.
    pub fn remove_user(&self, user: &User) {
        self.state.write().members.remove(&user.name());
        user.unlink_channel(&self.name);
    }

    pub fn is_user_in_channel(&self, user: &User) -> bool {
        self.state.read().members.contains_key(&user.name())
    }

    /// Snapshot of the member list.
    pub fn users(&self) -> Vec<Arc<User>> {
        self.state.read().members.values().cloned().collect()
    }

    /// Member names in order.
    pub fn user_names(&self) -> Vec<String> {
        self.state.read().members.keys().cloned().collect()
    }

    /// Drops one side of the membership; called from [`User`] when it goes
    /// offline so that both sides stay in sync.
    pub(crate) fn unlink_user(&self, user_name: &str) {
        self.state.write().members.remove(user_name);
    }

    pub(crate) fn rekey_user(&self, old_name: &str, user: &Arc<User>) {
        let mut state = self.state.write();
        if state.members.remove(&old_name.to_lowercase()).is_some() {
            state.members.insert(user.name(), Arc::clone(user));
        }
    }

    // ---------------------------------------------------------------------
    // Attributes
    // ---------------------------------------------------------------------

    /// Whether the bot itself currently occupies the channel.
    pub fn is_in_channel(&self) -> bool {
        self.state.read().in_channel
    }

    /// Marks the bot as in or out of the channel.
    ///
    /// Leaving clears the member list, since membership is no longer observed.
    pub fn set_in_channel(&self, in_channel: bool) {
        let departed = {
            let mut state = self.state.write();
            state.in_channel = in_channel;
            if in_channel {
                return;
            }
            std::mem::take(&mut state.members)
        };
        for user in departed.values() {
            user.unlink_channel(&self.name);
        }
    }

    pub fn password(&self) -> Option<String> {
        self.state.read().password.clone()
    }

    pub fn set_password(&self, password: Option<String>) {
        self.state.write().password = password;
    }

    pub fn logging(&self) -> bool {
        self.state.read().logging
    }

    pub fn set_logging(&self, logging: bool) {
        self.state.write().logging = logging;
    }

    pub fn is_uppercase(&self) -> bool {
        self.state.read().uppercase
    }

    pub fn set_uppercase(&self, uppercase: bool) {
        self.state.write().uppercase = uppercase;
    }

    pub fn is_passive_enabled(&self) -> bool {
        self.state.read().passive_enabled
    }

    pub fn set_passive_enabled(&self, enabled: bool) {
        self.state.write().passive_enabled = enabled;
    }

    pub fn is_auto_join(&self) -> bool {
        self.state.read().auto_join
    }

    pub fn set_auto_join(&self, auto_join: bool) {
        self.state.write().auto_join = auto_join;
    }

    /// The channel's own prefix override, if set.
    pub fn prefix_override(&self) -> Option<CommandPrefix> {
        self.state.read().prefix.clone()
    }

    pub fn set_prefix(&self, prefix: Option<CommandPrefix>) {
        self.state.write().prefix = prefix;
    }

    /// The prefix in effect: the override if set, else the server default.
    pub fn effective_prefix(&self) -> CommandPrefix {
        self.prefix_override()
            .unwrap_or_else(|| self.settings.prefix())
    }

    pub fn last_active(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_active
    }

    /// Records activity now. Activity implies the bot is present.
    pub fn update_activity(&self) {
        let mut state = self.state.write();
        state.last_active = Some(Utc::now());
        state.in_channel = true;
    }

    // ---------------------------------------------------------------------
    // Rights
    // ---------------------------------------------------------------------

    /// Sets, or clears, a right on the channel.
    pub fn set_right(&self, right: impl Into<String>, value: Option<bool>) {
        self.state.write().permissions.set_right(right, value);
    }

    pub fn permissions(&self) -> PermissionMask {
        self.state.read().permissions.clone()
    }

    /// Replaces the channel's mask.
    pub fn set_permissions(&self, permissions: PermissionMask) {
        self.state.write().permissions = permissions;
    }

    /// Resolves `right`: the channel mask, then the server.
    pub fn rights_check(&self, right: &str) -> bool {
        let own = self.state.read().permissions.get_right(right);
        own.unwrap_or_else(|| self.settings.rights_check(right))
    }

    /// Whether any attribute differs from a freshly created channel.
    pub fn is_persistent(&self) -> bool {
        let state = self.state.read();
        state.auto_join
            || state.password.is_some()
            || !state.logging
            || state.uppercase
            || !state.permissions.is_empty()
            || !state.passive_enabled
    }
}

impl PartialEq for Channel {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.settings.name() == other.settings.name()
    }
}

impl Eq for Channel {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::ServerState;
    use crate::foundation::permission::GlobalRights;

    fn state() -> ServerState {
        ServerState::new(ServerSettings::new(
            "libera",
            "hallo",
            Arc::new(GlobalRights::new(true)),
        ))
    }

    #[test]
    fn test_membership_is_symmetric() {
        let state = state();
        let channel = state.get_channel_by_name("#hallo");
        let user = state.get_user_by_name("alice");

        channel.add_user(&user);
        assert!(channel.is_user_in_channel(&user));
        assert!(user.is_in_channel(&channel));

        channel.remove_user(&user);
        assert!(!channel.is_user_in_channel(&user));
        assert!(!user.is_in_channel(&channel));

        // removing again is a no-op
        channel.remove_user(&user);
        assert!(channel.users().is_empty());
    }

    #[test]
    fn test_leaving_clears_members() {
        let state = state();
        let channel = state.get_channel_by_name("#hallo");
        let user = state.get_user_by_name("alice");
        channel.set_in_channel(true);
        channel.add_user(&user);

        channel.set_in_channel(false);
        assert!(!channel.is_in_channel());
        assert!(channel.users().is_empty());
        assert!(user.channels().is_empty());
    }

    #[test]
    fn test_fresh_channel_is_not_persistent() {
        let state = state();
        let channel = state.get_channel_by_name("#hallo");
        assert!(!channel.is_persistent());

        channel.set_auto_join(true);
        assert!(channel.is_persistent());
        channel.set_auto_join(false);
        assert!(!channel.is_persistent());

        channel.set_passive_enabled(false);
        assert!(channel.is_persistent());
        channel.set_passive_enabled(true);

        channel.set_password(Some("hunter2".into()));
        assert!(channel.is_persistent());
        channel.set_password(None);

        channel.set_right("function_Roll", Some(false));
        assert!(channel.is_persistent());
        channel.set_right("function_Roll", None);
        assert!(!channel.is_persistent());
    }

    #[test]
    fn test_effective_prefix() {
        let state = state();
        let channel = state.get_channel_by_name("#hallo");
        assert_eq!(channel.effective_prefix(), CommandPrefix::Nick);

        state.settings().set_prefix(CommandPrefix::literal("!"));
        assert_eq!(channel.effective_prefix(), CommandPrefix::literal("!"));

        channel.set_prefix(Some(CommandPrefix::literal("@")));
        assert_eq!(channel.effective_prefix(), CommandPrefix::literal("@"));
    }

    #[test]
    fn test_channel_rights_fall_back_to_server() {
        let state = state();
        let channel = state.get_channel_by_name("#hallo");
        assert!(channel.rights_check("function_Roll"));

        state.settings().set_right("function_Roll", Some(false));
        assert!(!channel.rights_check("function_Roll"));

        channel.set_right("function_Roll", Some(true));
        assert!(channel.rights_check("function_Roll"));
    }

    #[test]
    fn test_activity_marks_bot_present() {
        let state = state();
        let channel = state.get_channel_by_name("#hallo");
        assert!(channel.last_active().is_none());
        channel.update_activity();
        assert!(channel.is_in_channel());
        assert!(channel.last_active().is_some());
    }
}
