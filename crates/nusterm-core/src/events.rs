//! Session lifecycle events.
//!
//! The controller publishes these on a broadcast channel so UI code can keep
//! its connect button and status line in sync without polling. Terminal text
//! does not travel here; it goes through [`crate::OutputSink`].

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Device identifier for events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    /// Address or platform identifier.
    pub id: String,
    /// Device name if known.
    pub name: Option<String>,
}

impl DeviceId {
    /// Create a new device ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    /// Create a device ID with name.
    pub fn with_name(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
        }
    }

    /// Name if known, otherwise the identifier.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Events emitted by the session controller.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum SessionEvent {
    /// A connect attempt started.
    Connecting,
    /// The connect chain completed.
    Connected { device: DeviceId },
    /// The link went away.
    Disconnected {
        device: DeviceId,
        reason: DisconnectReason,
    },
    /// A connect attempt failed.
    Error { error: String },
}

/// Reason for disconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum DisconnectReason {
    /// Explicit `disconnect()` call.
    UserRequested,
    /// The platform reported the link dropped.
    LinkLost,
}

/// Sender for session events.
pub type EventSender = broadcast::Sender<SessionEvent>;

/// Receiver for session events.
pub type EventReceiver = broadcast::Receiver<SessionEvent>;

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: SessionEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = SessionEvent::Disconnected {
            device: DeviceId::with_name("AA:BB:CC:DD:EE:FF", "Zephyr Shell"),
            reason: DisconnectReason::LinkLost,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"disconnected""#));
        assert!(json.contains(r#""reason":"link_lost""#));

        let back: SessionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        assert_eq!(DeviceId::new("AA:BB").display_name(), "AA:BB");
        assert_eq!(DeviceId::with_name("AA:BB", "nrf").display_name(), "nrf");
    }

    #[tokio::test]
    async fn test_dispatcher_delivers_to_subscribers() {
        let dispatcher = EventDispatcher::default();
        let mut rx = dispatcher.subscribe();
        assert_eq!(dispatcher.receiver_count(), 1);

        dispatcher.send(SessionEvent::Connecting);
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::Connecting);
    }

    #[test]
    fn test_send_without_receivers_is_silent() {
        let dispatcher = EventDispatcher::new(4);
        dispatcher.send(SessionEvent::Connecting);
        assert_eq!(dispatcher.receiver_count(), 0);
    }
}
