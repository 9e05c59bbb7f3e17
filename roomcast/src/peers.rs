//! The peer roster.
//!
//! One [`PeerTable`] per session, mutated only from the session event loop.
//! Both the relay and the negotiation library report joins and leaves; the
//! table makes duplicate joins idempotent so the two sources never race
//! each other into double entries.

use uuid::Uuid;

use crate::wire::{Wire, WireReader};

/// Channel lifecycle for one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Known through the relay only; no channel exists.
    Discovered,
    /// A direct channel exists but has not finished connecting.
    Connecting,
    /// The direct channel is up.
    Connected,
    Closed,
}

/// Snapshot of a peer for roster and lifecycle events.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerInfo {
    pub id: Uuid,
    pub nickname: String,
    pub relay_only: bool,
    pub state: ChannelState,
}

/// One tracked remote participant.
///
/// The wire is exclusively owned here: dropping it (peer destruction or
/// session disconnect) is the only way the channel closes from our side.
#[derive(Debug)]
pub struct Peer {
    pub id: Uuid,
    pub nickname: String,
    pub relay_only: bool,
    pub state: ChannelState,
    pub(crate) wire: Option<Wire>,
    pub(crate) reader: WireReader,
}

impl Peer {
    /// A peer reachable only through the relay. No channel is ever attached.
    pub fn relay(id: Uuid, nickname: impl Into<String>, relay_only: bool) -> Self {
        Self {
            id,
            nickname: nickname.into(),
            relay_only,
            state: ChannelState::Discovered,
            wire: None,
            reader: WireReader::new(),
        }
    }

    /// A peer with a freshly created direct channel, still connecting.
    pub fn direct(id: Uuid, nickname: impl Into<String>, wire: Wire) -> Self {
        Self {
            id,
            nickname: nickname.into(),
            relay_only: false,
            state: ChannelState::Connecting,
            wire: Some(wire),
            reader: WireReader::new(),
        }
    }

    pub fn info(&self) -> PeerInfo {
        PeerInfo {
            id: self.id,
            nickname: self.nickname.clone(),
            relay_only: self.relay_only,
            state: self.state,
        }
    }
}

/// Insertion-ordered set of known peers.
#[derive(Debug, Default)]
pub struct PeerTable {
    entries: Vec<Peer>,
    relay_only_count: usize,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a peer unless its id is already tracked.
    ///
    /// Returns false (dropping `peer`) on a duplicate join.
    pub fn add(&mut self, peer: Peer) -> bool {
        if self.find(peer.id).is_some() {
            return false;
        }
        if peer.relay_only {
            self.relay_only_count += 1;
        }
        self.entries.push(peer);
        true
    }

    /// Remove the matching entry. Unknown ids are a no-op.
    pub fn remove(&mut self, id: Uuid) -> Option<Peer> {
        let idx = self.entries.iter().position(|p| p.id == id)?;
        let peer = self.entries.remove(idx);
        if peer.relay_only {
            self.relay_only_count -= 1;
        }
        Some(peer)
    }

    pub fn find(&self, id: Uuid) -> Option<&Peer> {
        self.entries.iter().find(|p| p.id == id)
    }

    pub fn find_mut(&mut self, id: Uuid) -> Option<&mut Peer> {
        self.entries.iter_mut().find(|p| p.id == id)
    }

    /// Re-tag a peer's routing mode, keeping the counter consistent.
    pub fn mark_relay_only(&mut self, id: Uuid, relay_only: bool) -> bool {
        let Some(peer) = self.entries.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        if peer.relay_only != relay_only {
            peer.relay_only = relay_only;
            if relay_only {
                self.relay_only_count += 1;
            } else {
                self.relay_only_count -= 1;
            }
        }
        true
    }

    /// All peers in insertion order.
    pub fn all(&self) -> &[Peer] {
        &self.entries
    }

    /// Remove every entry, resetting the counter.
    pub fn drain(&mut self) -> Vec<Peer> {
        self.relay_only_count = 0;
        std::mem::take(&mut self.entries)
    }

    pub fn roster(&self) -> Vec<PeerInfo> {
        self.entries.iter().map(Peer::info).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of tracked peers that cannot take direct traffic.
    ///
    /// Any value above zero forces broadcasts through the relay.
    pub fn relay_only_count(&self) -> usize {
        self.relay_only_count
    }
}
