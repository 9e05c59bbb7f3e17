//! Seam to the direct-channel negotiation library.
//!
//! The library that performs capability exchange and connection
//! establishment lives outside this crate. It is driven through the
//! [`DirectNegotiator`] trait and reports back through the typed
//! [`DirectEvent`] stream — it never touches connector state directly.
//!
//! Channel data arrives as raw bytes; the session wraps each channel with
//! the wire codec and throttle from [`crate::wire`].

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Events reported by the negotiation library.
#[derive(Debug)]
pub enum DirectEvent {
    /// The negotiation transport is up. Carries the identity the library
    /// assigned (used only if the relay has not assigned one yet) and the
    /// peers already present in the room.
    Ready {
        self_id: Uuid,
        known_peers: Vec<Uuid>,
    },
    /// Inbound connection request awaiting an accept/decline decision.
    Request(ChannelRequest),
    /// A channel exists but has not finished connecting. Data may already
    /// flow ahead of [`DirectEvent::ChannelConnected`].
    ChannelOpen {
        id: Uuid,
        nickname: Option<String>,
        raw_tx: mpsc::UnboundedSender<Vec<u8>>,
    },
    /// The channel reached its connected state.
    ChannelConnected { id: Uuid },
    /// Raw bytes received on the channel.
    ChannelData { id: Uuid, bytes: Vec<u8> },
    /// The channel closed, gracefully or not.
    ChannelClosed { id: Uuid },
}

/// An inbound negotiation request.
///
/// Data requests are auto-accepted by the connector. Media requests are
/// passed through to the host untouched — the connector never answers them.
#[derive(Debug)]
pub struct ChannelRequest {
    pub peer_id: Uuid,
    pub media: bool,
    responder: oneshot::Sender<bool>,
}

impl ChannelRequest {
    /// Build a request plus the receiver the negotiation library awaits.
    pub fn new(peer_id: Uuid, media: bool) -> (Self, oneshot::Receiver<bool>) {
        let (responder, decision) = oneshot::channel();
        (
            Self {
                peer_id,
                media,
                responder,
            },
            decision,
        )
    }

    pub fn accept(self) {
        let _ = self.responder.send(true);
    }

    pub fn decline(self) {
        let _ = self.responder.send(false);
    }
}

/// Driver interface for the external negotiation library.
///
/// `start` is called once per session with the channel to report events on.
/// `shutdown` must tolerate in-flight negotiation; a peer mid-handshake is
/// simply abandoned.
pub trait DirectNegotiator: Send + 'static {
    fn start(&mut self, nickname: &str, events: mpsc::UnboundedSender<DirectEvent>);

    /// Dial a peer learned from [`DirectEvent::Ready`].
    fn connect_to(&mut self, peer_id: Uuid);

    fn shutdown(&mut self);
}

/// Factory invoked on each `reconnect`.
///
/// Its presence in the connector configuration is the one-time capability
/// probe: no factory means the whole session runs relay-only.
pub type NegotiatorFactory = Box<dyn Fn() -> Box<dyn DirectNegotiator> + Send + Sync>;
