//! Users: people (or other bots) seen on a server.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::server::ServerSettings;
use super::{Channel, UserGroup};
use crate::foundation::permission::PermissionMask;

#[derive(Debug)]
struct UserState {
    identified: bool,
    online: bool,
    channels: BTreeMap<String, Weak<Channel>>,
    groups: BTreeMap<String, Arc<UserGroup>>,
    logging: bool,
    uppercase: bool,
    permissions: PermissionMask,
    last_active: Option<DateTime<Utc>>,
}

impl Default for UserState {
    fn default() -> Self {
        Self {
            identified: false,
            online: false,
            channels: BTreeMap::new(),
            groups: BTreeMap::new(),
            logging: true,
            uppercase: false,
            permissions: PermissionMask::new(),
            last_active: None,
        }
    }
}

/// A user on one server.
///
/// Channels are held as back-references; the owning [`ServerState`](super::ServerState)
/// keeps them alive.
#[derive(Debug)]
pub struct User {
    name: RwLock<String>,
    settings: Arc<ServerSettings>,
    state: RwLock<UserState>,
}

impl User {
    pub(crate) fn new(name: impl Into<String>, settings: Arc<ServerSettings>) -> Self {
        Self {
            name: RwLock::new(name.into().to_lowercase()),
            settings,
            state: RwLock::new(UserState::default()),
        }
    }

    /// Canonical lowercase name.
    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    pub(crate) fn set_name(&self, name: &str) {
        *self.name.write() = name.to_lowercase();
    }

    /// Settings of the owning server.
    pub fn server_settings(&self) -> &Arc<ServerSettings> {
        &self.settings
    }

    // ---------------------------------------------------------------------
    // Presence
    // ---------------------------------------------------------------------

    pub fn is_identified(&self) -> bool {
        self.state.read().identified
    }

    pub fn set_identified(&self, identified: bool) {
        self.state.write().identified = identified;
    }

    pub fn is_online(&self) -> bool {
        self.state.read().online
    }

    /// Marks the user online or offline.
    ///
    /// Going offline drops the identified flag and every channel membership,
    /// both of which are re-derived once the user is seen again.
    pub fn set_online(&self, online: bool) {
        let departed = {
            let mut state = self.state.write();
            state.online = online;
            if online {
                return;
            }
            state.identified = false;
            std::mem::take(&mut state.channels)
        };
        let name = self.name();
        for channel in departed.values().filter_map(Weak::upgrade) {
            channel.unlink_user(&name);
        }
    }

    pub fn last_active(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_active
    }

    /// Records activity now. Activity implies the user is online.
    pub fn update_activity(&self) {
        let mut state = self.state.write();
        state.last_active = Some(Utc::now());
        state.online = true;
    }

    // ---------------------------------------------------------------------
    // Channels
    // ---------------------------------------------------------------------

    /// Channels the user is currently seen in.
    pub fn channels(&self) -> Vec<Arc<Channel>> {
        self.state
            .read()
            .channels
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }

    pub fn is_in_channel(&self, channel: &Channel) -> bool {
        self.state.read().channels.contains_key(channel.name())
    }

    pub(crate) fn link_channel(&self, channel: &Arc<Channel>) {
        self.state
            .write()
            .channels
            .insert(channel.name().to_string(), Arc::downgrade(channel));
    }

    pub(crate) fn unlink_channel(&self, channel_name: &str) {
        self.state.write().channels.remove(channel_name);
    }

    // ---------------------------------------------------------------------
    // Groups
    // ---------------------------------------------------------------------

    /// Adds the user to `group`, replacing any group with the same name.
    pub fn add_user_group(&self, group: Arc<UserGroup>) {
        self.state
            .write()
            .groups
            .insert(group.name().to_string(), group);
    }

    pub fn get_user_group_by_name(&self, name: &str) -> Option<Arc<UserGroup>> {
        self.state.read().groups.get(&name.to_lowercase()).cloned()
    }

    /// Removes the user from the named group. Returns whether it was a member.
    pub fn remove_user_group_by_name(&self, name: &str) -> bool {
        self.state
            .write()
            .groups
            .remove(&name.to_lowercase())
            .is_some()
    }

    pub fn user_groups(&self) -> Vec<Arc<UserGroup>> {
        self.state.read().groups.values().cloned().collect()
    }

    // ---------------------------------------------------------------------
    // Attributes
    // ---------------------------------------------------------------------

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

    /// Sets, or clears, a right on the user.
    pub fn set_right(&self, right: impl Into<String>, value: Option<bool>) {
        self.state.write().permissions.set_right(right, value);
    }

    pub fn permissions(&self) -> PermissionMask {
        self.state.read().permissions.clone()
    }

    pub fn set_permissions(&self, permissions: PermissionMask) {
        self.state.write().permissions = permissions;
    }

    /// Resolves `right` for this user, optionally in the context of `channel`.
    ///
    /// Layers are consulted in order and the first decisive one answers:
    ///
    /// 1. the user's own mask;
    /// 2. the user's groups: if any group allows the right the answer is
    ///    allow, otherwise if any group denies it the answer is deny;
    /// 3. `channel`'s own rights check (channel mask, then server, then global);
    /// 4. without a channel, the server mask, then the global rights.
    ///
    /// A channel's explicit deny therefore does not override a group allow.
    pub fn rights_check(&self, right: &str, channel: Option<&Channel>) -> bool {
        let (own, groups) = {
            let state = self.state.read();
            (
                state.permissions.get_right(right),
                state.groups.values().cloned().collect::<Vec<_>>(),
            )
        };
        if let Some(value) = own {
            return value;
        }
        if let Some(value) = resolve_groups(&groups, right) {
            return value;
        }
        match channel {
            Some(channel) => channel.rights_check(right),
            None => self.settings.rights_check(right),
        }
    }

    /// Whether any attribute differs from a freshly created user.
    pub fn is_persistent(&self) -> bool {
        let state = self.state.read();
        !state.groups.is_empty()
            || !state.logging
            || state.uppercase
            || !state.permissions.is_empty()
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
            || (self.name() == other.name() && self.settings.name() == other.settings.name())
    }
}

impl Eq for User {}

fn resolve_groups(groups: &[Arc<UserGroup>], right: &str) -> Option<bool> {
    let mut denied = false;
    for group in groups {
        match group.rights_check(right) {
            Some(true) => return Some(true),
            Some(false) => denied = true,
            None => {}
        }
    }
    denied.then_some(false)
}
