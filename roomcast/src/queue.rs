//! Buffer for sync messages that outran their channel.
//!
//! Direct-channel data can start flowing before the channel reports
//! connected. Sync messages arriving in that window are held here and
//! replayed, in arrival order, once the peer reaches Connected. Replay
//! removes the delivered entries, so a reconnect with a reused id can
//! never see them twice.

use std::collections::VecDeque;

use uuid::Uuid;

/// Bounded buffer of pre-connect sync messages.
#[derive(Debug)]
pub struct InboundQueue {
    queue: VecDeque<PendingMessage>,
    max_size: usize,
}

#[derive(Debug, Clone)]
struct PendingMessage {
    peer_id: Uuid,
    payload: Vec<u8>,
}

impl InboundQueue {
    pub const DEFAULT_CAPACITY: usize = 10_000;

    pub fn new(max_size: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(max_size.min(1024)),
            max_size,
        }
    }

    /// Buffer one message. Returns false (dropping the message) when full.
    pub fn enqueue(&mut self, peer_id: Uuid, payload: Vec<u8>) -> bool {
        if self.queue.len() >= self.max_size {
            return false;
        }
        self.queue.push_back(PendingMessage { peer_id, payload });
        true
    }

    /// Remove and return every buffered payload for `peer_id`, oldest first.
    ///
    /// Entries for other peers keep their relative order.
    pub fn replay(&mut self, peer_id: Uuid) -> Vec<Vec<u8>> {
        let mut matched = Vec::new();
        let mut rest = VecDeque::with_capacity(self.queue.len());
        for entry in self.queue.drain(..) {
            if entry.peer_id == peer_id {
                matched.push(entry.payload);
            } else {
                rest.push_back(entry);
            }
        }
        self.queue = rest;
        matched
    }

    /// Drop every buffered entry for `peer_id`, returning how many were held.
    ///
    /// Used when a channel closes before ever connecting.
    pub fn discard(&mut self, peer_id: Uuid) -> usize {
        let before = self.queue.len();
        self.queue.retain(|entry| entry.peer_id != peer_id);
        before - self.queue.len()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Total bytes buffered.
    pub fn total_bytes(&self) -> usize {
        self.queue.iter().map(|entry| entry.payload.len()).sum()
    }
}

impl Default for InboundQueue {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
