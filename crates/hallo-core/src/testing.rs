//! Test helpers.
//!
//! [`RecordingServer`] is an in-memory [`Server`] that keeps every event sent
//! through it, for asserting on what a dispatch pass produced.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::destination::{ServerSettings, ServerState};
use crate::foundation::error::{SendError, SendResult};
use crate::foundation::event::{Event, EventType};
use crate::foundation::permission::GlobalRights;
use crate::integration::{BoxedServer, Server};

/// A server that records outbound events instead of sending them.
#[derive(Debug)]
pub struct RecordingServer {
    state: ServerState,
    sent: Mutex<Vec<Event>>,
}

impl RecordingServer {
    /// Nick `hallo`, nick prefix, unset rights allowed.
    pub fn new(name: &str) -> Arc<Self> {
        Self::with_global(name, "hallo", Arc::new(GlobalRights::new(true)))
    }

    pub fn with_global(name: &str, nick: &str, global: Arc<GlobalRights>) -> Arc<Self> {
        Self::with_settings(ServerSettings::new(name, nick, global))
    }

    pub fn with_settings(settings: ServerSettings) -> Arc<Self> {
        Arc::new(Self {
            state: ServerState::new(settings),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// This server as a trait object.
    pub fn boxed(self: &Arc<Self>) -> BoxedServer {
        Arc::clone(self) as BoxedServer
    }

    /// Every event sent so far.
    pub fn sent(&self) -> Vec<Event> {
        self.sent.lock().clone()
    }

    /// Text of every sent text event.
    pub fn sent_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|e| e.text().map(str::to_string))
            .collect()
    }

    /// Takes and clears the sent events.
    pub fn take_sent(&self) -> Vec<Event> {
        std::mem::take(&mut *self.sent.lock())
    }
}

impl Server for RecordingServer {
    fn state(&self) -> &ServerState {
        &self.state
    }

    fn send(&self, event: Event) -> SendResult {
        if event.is_inbound() {
            return Err(SendError::Inbound);
        }
        if event.destination().is_none() && event.event_type() != EventType::Ping {
            return Err(SendError::NoDestination);
        }
        self.sent.lock().push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::Destination;

    #[test]
    fn test_records_outbound_only() {
        let server = RecordingServer::new("test");
        let boxed = server.boxed();
        let user = boxed.get_user_by_name("alice");

        let inbound = Event::message(&boxed, None, Some(user.clone()), "hi");
        assert!(matches!(boxed.send(inbound), Err(SendError::Inbound)));

        let outbound = Event::say(&boxed, &Destination::User(user), "hello");
        boxed.send(outbound).unwrap();
        assert_eq!(server.sent_texts(), vec!["hello".to_string()]);
        assert_eq!(server.take_sent().len(), 1);
        assert!(server.sent().is_empty());
    }
}
