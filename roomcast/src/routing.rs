//! Direct-vs-relay route policy.
//!
//! Pure decisions over session and roster state; the session loop executes
//! them. Delivery is best-effort throughout: an unknown unicast target is
//! dropped silently rather than reported.

use uuid::Uuid;

use crate::peers::PeerTable;
use crate::protocol::ForwardTarget;

/// Route decision for a unicast send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Send over the peer's direct channel wire.
    Direct,
    /// Forward through the rendezvous relay.
    Relay(ForwardTarget),
    /// Unknown target; best-effort contract says drop without error.
    Drop,
}

/// Decide how a unicast payload reaches `to`.
pub fn unicast(session_relay_only: bool, peers: &PeerTable, to: Uuid) -> Route {
    if session_relay_only {
        return Route::Relay(ForwardTarget::Peer(to));
    }
    match peers.find(to) {
        None => Route::Drop,
        Some(peer) if peer.relay_only => Route::Relay(ForwardTarget::Peer(to)),
        Some(_) => Route::Direct,
    }
}

/// Route decision for a room-wide send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastRoute {
    /// One relay fan-out reaches the whole room, relay-only peers included.
    Relay,
    /// One direct send per connected peer.
    Direct,
}

/// Decide how a broadcast reaches the room.
///
/// A single relay-only peer anywhere in the room pushes the whole
/// broadcast through the relay: one fan-out reaches everyone, and
/// direct-capable peers get the relay copy instead of a duplicate.
pub fn broadcast(session_relay_only: bool, relay_only_count: usize) -> BroadcastRoute {
    if session_relay_only || relay_only_count > 0 {
        BroadcastRoute::Relay
    } else {
        BroadcastRoute::Direct
    }
}
