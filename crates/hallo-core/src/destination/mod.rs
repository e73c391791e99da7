//! Destination graph.
//!
//! Servers own channels and users; users belong to channels and user groups.
//! Every node can answer a rights check, falling back layer by layer to the
//! process-wide [`GlobalRights`](crate::GlobalRights).

pub mod channel;
pub mod server;
pub mod user;
pub mod user_group;

use std::sync::Arc;

pub use channel::Channel;
pub use server::{CommandPrefix, ServerSettings, ServerState};
pub use user::User;
pub use user_group::{UserGroup, UserGroupRegistry};

/// Anything a message can be sent to.
#[derive(Debug, Clone)]
pub enum Destination {
    Channel(Arc<Channel>),
    User(Arc<User>),
}

impl Destination {
    /// Canonical name of the channel or user.
    pub fn name(&self) -> String {
        match self {
            Destination::Channel(c) => c.name().to_string(),
            Destination::User(u) => u.name(),
        }
    }

    pub fn is_channel(&self) -> bool {
        matches!(self, Destination::Channel(_))
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Destination::User(_))
    }

    pub fn as_channel(&self) -> Option<&Arc<Channel>> {
        match self {
            Destination::Channel(c) => Some(c),
            Destination::User(_) => None,
        }
    }

    pub fn as_user(&self) -> Option<&Arc<User>> {
        match self {
            Destination::User(u) => Some(u),
            Destination::Channel(_) => None,
        }
    }

    /// Whether replies here should be sent in uppercase.
    pub fn is_uppercase(&self) -> bool {
        match self {
            Destination::Channel(c) => c.is_uppercase(),
            Destination::User(u) => u.is_uppercase(),
        }
    }

    /// Whether traffic here should be logged.
    pub fn logging(&self) -> bool {
        match self {
            Destination::Channel(c) => c.logging(),
            Destination::User(u) => u.logging(),
        }
    }

    pub fn is_persistent(&self) -> bool {
        match self {
            Destination::Channel(c) => c.is_persistent(),
            Destination::User(u) => u.is_persistent(),
        }
    }
}

impl From<Arc<Channel>> for Destination {
    fn from(channel: Arc<Channel>) -> Self {
        Destination::Channel(channel)
    }
}

impl From<Arc<User>> for Destination {
    fn from(user: Arc<User>) -> Self {
        Destination::User(user)
    }
}
