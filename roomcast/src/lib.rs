//! # roomcast — Peer connection lifecycle and message routing for room-based sync
//!
//! Connects a local replication engine to every other participant in a
//! named room, over direct peer channels when possible and a rendezvous
//! relay when not.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   commands    ┌──────────────────────────────┐
//! │ Connector   │ ─────────────►│ Session (one task, owns all  │
//! │ (facade)    │◄───────────── │ mutable state)               │
//! └─────────────┘   events      └──────┬────────────────┬──────┘
//!                                      │                │
//!                             ┌────────┴─────┐  ┌───────┴────────┐
//!                             │ RelayLink    │  │ DirectNegotiator│
//!                             │ (WebSocket)  │  │ (per-peer wires)│
//!                             └──────────────┘  └────────────────┘
//! ```
//!
//! Outbound traffic picks a route per message: a direct channel wire when
//! the target has one, the relay when either side is relay-only. A single
//! relay-only peer in the room pushes every broadcast through the relay so
//! nobody receives duplicates.
//!
//! ## Modules
//!
//! - [`protocol`] — Payload and relay frame types (bincode-encoded)
//! - [`wire`] — Direct-channel framing, chunked outbound throttle
//! - [`peers`] — Session roster with relay-only accounting
//! - [`routing`] — Direct-vs-relay route policy
//! - [`queue`] — Pre-connect buffering of inbound sync messages
//! - [`relay`] — Rendezvous link (WebSocket or in-memory)
//! - [`direct`] — Seam to the channel negotiation library
//! - [`connector`] — Public facade and session event loop

pub mod connector;
pub mod direct;
pub mod peers;
pub mod protocol;
pub mod queue;
pub mod relay;
pub mod routing;
pub mod wire;

// Re-exports for convenience
pub use connector::{
    Connector, ConnectorConfig, ConnectorEvent, RelayDialer, SessionPhase,
};
pub use direct::{ChannelRequest, DirectEvent, DirectNegotiator, NegotiatorFactory};
pub use peers::{ChannelState, Peer, PeerInfo, PeerTable};
pub use protocol::{ForwardTarget, Payload, ProtocolError, RelayFrame, RelayNotice, SYNC_EVENT};
pub use relay::{RelayEvent, RelayLink, RelayRemote};
