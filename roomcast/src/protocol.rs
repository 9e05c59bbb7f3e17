//! Wire messages for the connector.
//!
//! Two message families share one bincode codec:
//! - [`Payload`] — what actually travels between participants: an opaque
//!   replication-engine update, or a named metadata event. The sync/meta
//!   split is a tagged discriminant checked at construction time, not a
//!   string comparison buried in the codec.
//! - [`RelayFrame`] / [`RelayNotice`] — the rendezvous protocol: join a
//!   room, forward a payload, and the membership/identity notifications
//!   coming back.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event name reserved for replication-engine traffic.
///
/// Metadata producers must not use it; [`Payload::meta`] rejects it so the
/// mistake surfaces at the call site instead of corrupting the sync stream.
pub const SYNC_EVENT: &str = "sync";

/// A routable message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    /// Opaque replication-engine update. Only `send`/`broadcast` build these.
    Sync(Vec<u8>),
    /// Named metadata event for host-level features (chat, presence, ...).
    Meta { event: String, data: Vec<u8> },
}

impl Payload {
    /// Build a metadata payload, rejecting the reserved sync event name.
    pub fn meta(event: impl Into<String>, data: Vec<u8>) -> Result<Self, ProtocolError> {
        let event = event.into();
        if event == SYNC_EVENT {
            return Err(ProtocolError::ReservedEvent);
        }
        Ok(Payload::Meta { event, data })
    }

    /// The event name this payload travels under.
    pub fn event_name(&self) -> &str {
        match self {
            Payload::Sync(_) => SYNC_EVENT,
            Payload::Meta { event, .. } => event,
        }
    }

    /// Size of the carried bytes (excluding the event name).
    pub fn data_len(&self) -> usize {
        match self {
            Payload::Sync(data) => data.len(),
            Payload::Meta { data, .. } => data.len(),
        }
    }

    /// Serialize to the binary wire format.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ProtocolError::SerializationError(e.to_string()))
    }

    /// Deserialize from the binary wire format.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (payload, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| ProtocolError::DeserializationError(e.to_string()))?;
        Ok(payload)
    }
}

/// Addressing for a relay-forwarded payload.
///
/// Always explicit: the relay never has to infer a unicast target from
/// sender context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForwardTarget {
    /// Fan out to every participant in the sender's room.
    Room,
    /// Deliver to one participant.
    Peer(Uuid),
}

/// Client → rendezvous messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RelayFrame {
    /// Enter a room under a display name. `relay_only` tells the service
    /// this participant cannot take direct channels.
    Join {
        room: String,
        nickname: String,
        relay_only: bool,
    },
    /// Ask the service to deliver a payload on our behalf.
    Forward {
        target: ForwardTarget,
        payload: Payload,
    },
}

impl RelayFrame {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ProtocolError::SerializationError(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (frame, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| ProtocolError::DeserializationError(e.to_string()))?;
        Ok(frame)
    }
}

/// Rendezvous → client notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RelayNotice {
    /// Session identity, assigned once per connection.
    Identity { id: Uuid },
    /// A participant entered the room.
    PeerJoined {
        id: Uuid,
        nickname: String,
        relay_only: bool,
    },
    /// A participant left the room.
    PeerLeft { id: Uuid, relay_only: bool },
    /// A payload delivered on another participant's behalf.
    Forwarded { from: Uuid, payload: Payload },
}

impl RelayNotice {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ProtocolError::SerializationError(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (notice, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| ProtocolError::DeserializationError(e.to_string()))?;
        Ok(notice)
    }
}

/// Protocol errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    SerializationError(String),
    DeserializationError(String),
    /// Metadata attempted to use the reserved sync event name.
    ReservedEvent,
    FrameTooLarge,
    ConnectionClosed,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SerializationError(e) => write!(f, "Serialization error: {e}"),
            Self::DeserializationError(e) => write!(f, "Deserialization error: {e}"),
            Self::ReservedEvent => {
                write!(f, "Metadata cannot use the reserved \"{SYNC_EVENT}\" event")
            }
            Self::FrameTooLarge => write!(f, "Frame exceeds maximum size"),
            Self::ConnectionClosed => write!(f, "Connection closed"),
        }
    }
}

impl std::error::Error for ProtocolError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_rejects_reserved_event() {
        for data in [vec![], vec![1, 2, 3], vec![0u8; 1024]] {
            let err = Payload::meta(SYNC_EVENT, data).unwrap_err();
            assert_eq!(err, ProtocolError::ReservedEvent);
        }
    }

    #[test]
    fn test_meta_accepts_other_events() {
        let payload = Payload::meta("chat", vec![1, 2]).unwrap();
        assert_eq!(payload.event_name(), "chat");
        assert_eq!(payload.data_len(), 2);
    }

    #[test]
    fn test_sync_event_name() {
        let payload = Payload::Sync(vec![9, 9, 9]);
        assert_eq!(payload.event_name(), SYNC_EVENT);
        assert_eq!(payload.data_len(), 3);
    }

    #[test]
    fn test_payload_roundtrip() {
        let payload = Payload::meta("cursor", vec![7; 40]).unwrap();
        let encoded = payload.encode().unwrap();
        assert_eq!(Payload::decode(&encoded).unwrap(), payload);
    }

    #[test]
    fn test_relay_frame_roundtrip() {
        let target = Uuid::new_v4();
        let frame = RelayFrame::Forward {
            target: ForwardTarget::Peer(target),
            payload: Payload::Sync(vec![1, 2, 3]),
        };
        let decoded = RelayFrame::decode(&frame.encode().unwrap()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_relay_notice_roundtrip() {
        let id = Uuid::new_v4();
        let notice = RelayNotice::PeerJoined {
            id,
            nickname: "Alice".to_string(),
            relay_only: true,
        };
        let decoded = RelayNotice::decode(&notice.encode().unwrap()).unwrap();
        assert_eq!(decoded, notice);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let garbage = vec![0xFF, 0xFE, 0xFD];
        assert!(Payload::decode(&garbage).is_err());
        assert!(RelayNotice::decode(&garbage).is_err());
    }

    #[test]
    fn test_forward_target_room_has_no_id() {
        let frame = RelayFrame::Forward {
            target: ForwardTarget::Room,
            payload: Payload::Sync(Vec::new()),
        };
        match RelayFrame::decode(&frame.encode().unwrap()).unwrap() {
            RelayFrame::Forward { target, .. } => assert_eq!(target, ForwardTarget::Room),
            other => panic!("Expected Forward, got {other:?}"),
        }
    }
}
