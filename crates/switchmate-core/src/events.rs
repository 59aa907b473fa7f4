//! Asynchronous events delivered by the BLE stack.
//!
//! The driver has exactly one entry point for everything the stack reports,
//! [`crate::PeripheralDriver::handle_event`], and this is its input type.
//! Tests construct these events directly to drive the state machine.

use serde::{Deserialize, Serialize};

use switchmate_types::{CharHandle, ConnectionId, GattStatus};

/// Events that can be emitted by the BLE stack for one peripheral.
///
/// All events are serializable for logging and replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GattEvent {
    /// A connection attempt finished.
    ConnectComplete {
        conn_id: ConnectionId,
        status: GattStatus,
    },
    /// The link was lost or closed.
    Disconnect { conn_id: ConnectionId },
    /// Service and characteristic discovery finished.
    DiscoveryComplete { conn_id: ConnectionId },
    /// A previously submitted read finished.
    ReadComplete {
        conn_id: ConnectionId,
        handle: CharHandle,
        status: GattStatus,
        value: Vec<u8>,
    },
    /// A previously submitted write finished.
    WriteComplete {
        conn_id: ConnectionId,
        handle: CharHandle,
        status: GattStatus,
    },
    /// The peripheral pushed a new value.
    Notify {
        conn_id: ConnectionId,
        handle: CharHandle,
        value: Vec<u8>,
    },
    /// A previously submitted subscription finished.
    SubscribeConfirmed {
        conn_id: ConnectionId,
        handle: CharHandle,
        status: GattStatus,
    },
}

impl GattEvent {
    /// The connection this event belongs to.
    pub fn conn_id(&self) -> ConnectionId {
        match self {
            GattEvent::ConnectComplete { conn_id, .. }
            | GattEvent::Disconnect { conn_id }
            | GattEvent::DiscoveryComplete { conn_id }
            | GattEvent::ReadComplete { conn_id, .. }
            | GattEvent::WriteComplete { conn_id, .. }
            | GattEvent::Notify { conn_id, .. }
            | GattEvent::SubscribeConfirmed { conn_id, .. } => *conn_id,
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GattEvent::ConnectComplete { .. } => "connect-complete",
            GattEvent::Disconnect { .. } => "disconnect",
            GattEvent::DiscoveryComplete { .. } => "discovery-complete",
            GattEvent::ReadComplete { .. } => "read-complete",
            GattEvent::WriteComplete { .. } => "write-complete",
            GattEvent::Notify { .. } => "notify",
            GattEvent::SubscribeConfirmed { .. } => "subscribe-confirmed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conn_id_and_kind() {
        let handle = CharHandle::new(3).unwrap();
        let event = GattEvent::Notify {
            conn_id: ConnectionId(7),
            handle,
            value: vec![1],
        };
        assert_eq!(event.conn_id(), ConnectionId(7));
        assert_eq!(event.kind(), "notify");
    }

    #[test]
    fn test_event_serializes_tagged() {
        let event = GattEvent::Disconnect {
            conn_id: ConnectionId(2),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"disconnect""#));
        let back: GattEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
