//! The connector facade and its session event loop.
//!
//! One spawned task per session owns every piece of mutable state — the
//! peer table, the inbound queue, the identity — and serializes all
//! transitions: commands from the facade, notices from the relay link and
//! events from the negotiation library all pass through one `select!`
//! loop. Nothing mutates session state from outside it.
//!
//! Everything the host consumes comes back on one typed [`ConnectorEvent`]
//! stream: lifecycle transitions for the observer, sync messages for the
//! replication engine, metadata for everyone else.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::direct::{ChannelRequest, DirectEvent, DirectNegotiator, NegotiatorFactory};
use crate::peers::{ChannelState, Peer, PeerInfo, PeerTable};
use crate::protocol::{ForwardTarget, Payload, ProtocolError, RelayNotice};
use crate::queue::InboundQueue;
use crate::relay::{RelayEvent, RelayLink};
use crate::routing::{self, BroadcastRoute, Route};
use crate::wire::Wire;

/// Connector lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Disconnected,
    Connecting,
    Joined,
}

/// Everything the host consumes, as one ordered stream.
#[derive(Debug)]
pub enum ConnectorEvent {
    /// Session identity assigned (relay first, negotiation library as
    /// fallback). Fires once per session.
    IdentityAssigned(Uuid),
    /// Full roster snapshot after a membership change.
    Roster(Vec<PeerInfo>),
    PeerConnected(PeerInfo),
    PeerDisconnected(PeerInfo),
    /// This process cannot establish direct channels; every send in this
    /// session uses the relay.
    RelayOnly,
    /// Inbound replication-engine message.
    Sync { from: Uuid, payload: Vec<u8> },
    /// Inbound metadata message.
    Meta {
        from: Uuid,
        event: String,
        data: Vec<u8>,
    },
    /// Voice/media negotiation request, passed through untouched.
    MediaRequest(ChannelRequest),
}

/// Connector configuration.
pub struct ConnectorConfig {
    pub room: String,
    pub nickname: String,
    /// Rendezvous service URL, used by the default WebSocket dialer.
    pub relay_url: String,
    /// Direct-channel capability probe: present means capable.
    pub negotiator: Option<NegotiatorFactory>,
    /// Bound on pre-connect sync buffering.
    pub queue_capacity: usize,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            room: "welcome".to_string(),
            nickname: "Guest".to_string(),
            relay_url: "ws://127.0.0.1:9090".to_string(),
            negotiator: None,
            queue_capacity: InboundQueue::DEFAULT_CAPACITY,
        }
    }
}

/// Opens a relay link for a new session. Injectable so embedded rendezvous
/// setups and tests can swap the WebSocket dialer for an in-memory pair.
pub type RelayDialer = Arc<
    dyn Fn() -> BoxFuture<'static, Result<(RelayLink, mpsc::UnboundedReceiver<RelayEvent>), ProtocolError>>
        + Send
        + Sync,
>;

enum Command {
    Send { to: Uuid, payload: Payload },
    Broadcast { payload: Payload },
    Disconnect,
}

/// The public connector surface.
///
/// `send`/`send_meta`/`broadcast` are fire-and-forget: they hand a command
/// to the session loop and return immediately. Delivery success is not
/// observable; there is no acknowledgment contract.
pub struct Connector {
    config: ConnectorConfig,
    dialer: RelayDialer,
    phase: Arc<RwLock<SessionPhase>>,
    cmd_tx: Option<mpsc::UnboundedSender<Command>>,
    event_tx: mpsc::UnboundedSender<ConnectorEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<ConnectorEvent>>,
}

impl Connector {
    /// Create a connector that dials `config.relay_url` over WebSocket.
    pub fn new(config: ConnectorConfig) -> Self {
        let url = config.relay_url.clone();
        let dialer: RelayDialer = Arc::new(move || {
            let url = url.clone();
            Box::pin(async move { RelayLink::connect(&url).await })
        });
        Self::with_dialer(config, dialer)
    }

    /// Create a connector with a custom relay dialer.
    pub fn with_dialer(config: ConnectorConfig, dialer: RelayDialer) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            config,
            dialer,
            phase: Arc::new(RwLock::new(SessionPhase::Disconnected)),
            cmd_tx: None,
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::UnboundedReceiver<ConnectorEvent>> {
        self.event_rx.take()
    }

    pub async fn phase(&self) -> SessionPhase {
        *self.phase.read().await
    }

    /// Open a fresh session, discarding any previous one.
    ///
    /// Dials the relay, probes direct-channel capability once, and starts
    /// negotiation in parallel when capable.
    pub async fn reconnect(&mut self) -> Result<(), ProtocolError> {
        self.disconnect();

        // Each session gets its own phase cell so a late teardown of the
        // previous session cannot clobber this one's state.
        self.phase = Arc::new(RwLock::new(SessionPhase::Connecting));

        let (relay, relay_rx) = match (self.dialer)().await {
            Ok(link) => link,
            Err(e) => {
                *self.phase.write().await = SessionPhase::Disconnected;
                return Err(e);
            }
        };

        let negotiator = self.config.negotiator.as_ref().map(|factory| factory());
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        self.cmd_tx = Some(cmd_tx);

        let session = Session {
            room: self.config.room.clone(),
            nickname: self.config.nickname.clone(),
            relay_only: negotiator.is_none(),
            self_id: None,
            peers: PeerTable::new(),
            queue: InboundQueue::new(self.config.queue_capacity),
            relay,
            negotiator,
            events: self.event_tx.clone(),
            phase: self.phase.clone(),
        };
        tokio::spawn(session.run(cmd_rx, relay_rx));
        log::info!("Session opened for room {}", self.config.room);
        Ok(())
    }

    /// Tear down the current session, if any.
    ///
    /// Closes every direct channel, drops relay-only entries, closes the
    /// relay link and emits a `PeerDisconnected` for each tracked peer.
    /// Safe to call mid-negotiation or when already disconnected.
    pub fn disconnect(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(Command::Disconnect);
        }
    }

    /// Unicast a replication-engine message.
    pub fn send(&self, to: Uuid, update: Vec<u8>) {
        self.command(Command::Send {
            to,
            payload: Payload::Sync(update),
        });
    }

    /// Broadcast a replication-engine message to the room.
    pub fn broadcast(&self, update: Vec<u8>) {
        self.command(Command::Broadcast {
            payload: Payload::Sync(update),
        });
    }

    /// Unicast a metadata message.
    ///
    /// Fails fast if `event` is the reserved sync event name; everything
    /// else is fire-and-forget like [`Connector::send`].
    pub fn send_meta(
        &self,
        to: Uuid,
        event: impl Into<String>,
        data: Vec<u8>,
    ) -> Result<(), ProtocolError> {
        let payload = Payload::meta(event, data)?;
        self.command(Command::Send { to, payload });
        Ok(())
    }

    fn command(&self, cmd: Command) {
        if let Some(tx) = &self.cmd_tx {
            let _ = tx.send(cmd);
        }
    }
}

/// Per-session state, exclusively owned by the session task.
struct Session {
    room: String,
    nickname: String,
    /// Whether this whole process is restricted to relay routing.
    relay_only: bool,
    self_id: Option<Uuid>,
    peers: PeerTable,
    queue: InboundQueue,
    relay: RelayLink,
    negotiator: Option<Box<dyn DirectNegotiator>>,
    events: mpsc::UnboundedSender<ConnectorEvent>,
    phase: Arc<RwLock<SessionPhase>>,
}

impl Session {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<Command>,
        mut relay_rx: mpsc::UnboundedReceiver<RelayEvent>,
    ) {
        let (direct_tx, mut direct_rx) = mpsc::unbounded_channel();
        if let Some(negotiator) = self.negotiator.as_mut() {
            negotiator.start(&self.nickname, direct_tx);
        } else {
            log::warn!("No direct-channel capability; session is relay-only");
            self.emit(ConnectorEvent::RelayOnly);
        }

        let mut relay_open = true;
        let mut direct_open = true;
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Disconnect) | None => {
                        self.shutdown().await;
                        break;
                    }
                    Some(Command::Send { to, payload }) => self.route_unicast(to, payload),
                    Some(Command::Broadcast { payload }) => self.route_broadcast(payload),
                },
                event = relay_rx.recv(), if relay_open => match event {
                    Some(event) => self.handle_relay(event).await,
                    None => relay_open = false,
                },
                event = direct_rx.recv(), if direct_open => match event {
                    Some(event) => self.handle_direct(event),
                    None => direct_open = false,
                },
            }
        }
    }

    fn emit(&self, event: ConnectorEvent) {
        let _ = self.events.send(event);
    }

    // ----- outbound routing -----

    fn route_unicast(&mut self, to: Uuid, payload: Payload) {
        match routing::unicast(self.relay_only, &self.peers, to) {
            Route::Relay(target) => self.relay.forward(target, payload),
            Route::Drop => log::debug!("Unicast to unknown peer {to}, dropped"),
            Route::Direct => {
                let Some(peer) = self.peers.find(to) else {
                    return;
                };
                match &peer.wire {
                    Some(wire) => {
                        if let Err(e) = wire.send(&payload) {
                            log::warn!("Failed to encode frame for {to}: {e}");
                        }
                    }
                    None => log::debug!("Peer {to} has no channel yet, dropped"),
                }
            }
        }
    }

    fn route_broadcast(&mut self, payload: Payload) {
        match routing::broadcast(self.relay_only, self.peers.relay_only_count()) {
            BroadcastRoute::Relay => self.relay.forward(ForwardTarget::Room, payload),
            BroadcastRoute::Direct => {
                for peer in self.peers.all() {
                    if peer.relay_only {
                        // Redundant in this branch (the count is zero), kept
                        // as a guard against a stale counter.
                        continue;
                    }
                    if let Some(wire) = &peer.wire {
                        if let Err(e) = wire.send(&payload) {
                            log::warn!("Failed to encode frame for {}: {e}", peer.id);
                        }
                    }
                }
            }
        }
    }

    // ----- relay events -----

    async fn handle_relay(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::Closed => {
                log::warn!("Relay link closed; relay routing unavailable until reconnect");
            }
            RelayEvent::Notice(notice) => match notice {
                RelayNotice::Identity { id } => self.on_identity(id).await,
                RelayNotice::PeerJoined {
                    id,
                    nickname,
                    relay_only,
                } => self.on_relay_join(id, nickname, relay_only),
                RelayNotice::PeerLeft { id, relay_only } => self.on_relay_leave(id, relay_only),
                RelayNotice::Forwarded { from, payload } => self.deliver(from, payload),
            },
        }
    }

    async fn on_identity(&mut self, id: Uuid) {
        if self.self_id.is_some() {
            log::debug!("Duplicate identity {id} ignored");
            return;
        }
        self.self_id = Some(id);
        *self.phase.write().await = SessionPhase::Joined;
        log::info!("Identity {id} assigned, joining room {}", self.room);
        self.emit(ConnectorEvent::IdentityAssigned(id));
        self.relay.join(&self.room, &self.nickname, self.relay_only);
    }

    fn on_relay_join(&mut self, id: Uuid, nickname: String, relay_only: bool) {
        if !self.relay_only && !relay_only {
            // Both sides are direct-capable; negotiation will track this peer.
            return;
        }
        let nickname = if nickname.is_empty() {
            "Guest".to_string()
        } else {
            nickname
        };
        let peer = Peer::relay(id, nickname, relay_only);
        let info = peer.info();
        if self.peers.add(peer) {
            log::info!("Peer {id} joined via relay (relay_only: {relay_only})");
            self.emit(ConnectorEvent::Roster(self.peers.roster()));
            self.emit(ConnectorEvent::PeerConnected(info));
        } else {
            log::debug!("Duplicate relay join for {id} ignored");
        }
    }

    fn on_relay_leave(&mut self, id: Uuid, relay_only: bool) {
        if !self.relay_only && !relay_only {
            return;
        }
        if let Some(mut peer) = self.peers.remove(id) {
            peer.state = ChannelState::Closed;
            log::info!("Peer {id} left via relay");
            self.emit(ConnectorEvent::Roster(self.peers.roster()));
            self.emit(ConnectorEvent::PeerDisconnected(peer.info()));
        }
    }

    /// Dispatch an inbound payload by kind. Relay-delivered payloads never
    /// wait on a channel, so they bypass the queue.
    fn deliver(&mut self, from: Uuid, payload: Payload) {
        match payload {
            Payload::Sync(update) => self.emit(ConnectorEvent::Sync {
                from,
                payload: update,
            }),
            Payload::Meta { event, data } => self.emit(ConnectorEvent::Meta { from, event, data }),
        }
    }

    // ----- direct-channel events -----

    fn handle_direct(&mut self, event: DirectEvent) {
        match event {
            DirectEvent::Ready {
                self_id,
                known_peers,
            } => self.on_negotiation_ready(self_id, known_peers),
            DirectEvent::Request(request) => {
                if request.media {
                    self.emit(ConnectorEvent::MediaRequest(request));
                } else {
                    request.accept();
                }
            }
            DirectEvent::ChannelOpen {
                id,
                nickname,
                raw_tx,
            } => self.on_channel_open(id, nickname, raw_tx),
            DirectEvent::ChannelConnected { id } => self.on_channel_connected(id),
            DirectEvent::ChannelData { id, bytes } => self.on_channel_data(id, &bytes),
            DirectEvent::ChannelClosed { id } => self.destroy_peer(id),
        }
    }

    fn on_negotiation_ready(&mut self, self_id: Uuid, known_peers: Vec<Uuid>) {
        if self.self_id.is_none() {
            self.self_id = Some(self_id);
            log::info!("Identity {self_id} assigned by negotiation library");
            self.emit(ConnectorEvent::IdentityAssigned(self_id));
        }
        let own = self.self_id;
        if let Some(negotiator) = self.negotiator.as_mut() {
            for peer_id in known_peers {
                if Some(peer_id) != own {
                    negotiator.connect_to(peer_id);
                }
            }
        }
    }

    fn on_channel_open(
        &mut self,
        id: Uuid,
        nickname: Option<String>,
        raw_tx: mpsc::UnboundedSender<Vec<u8>>,
    ) {
        let nickname = nickname.unwrap_or_else(|| "Guest".to_string());
        let peer = Peer::direct(id, nickname, Wire::new(raw_tx));
        if !self.peers.add(peer) {
            log::debug!("Duplicate channel open for {id} ignored");
        }
    }

    fn on_channel_connected(&mut self, id: Uuid) {
        let info = match self.peers.find_mut(id) {
            Some(peer) => {
                peer.state = ChannelState::Connected;
                peer.info()
            }
            None => {
                log::debug!("Connected event for unknown peer {id}");
                return;
            }
        };
        log::info!("Direct channel to {id} connected");
        self.emit(ConnectorEvent::Roster(self.peers.roster()));
        self.emit(ConnectorEvent::PeerConnected(info));
        for payload in self.queue.replay(id) {
            self.emit(ConnectorEvent::Sync { from: id, payload });
        }
    }

    fn on_channel_data(&mut self, id: Uuid, bytes: &[u8]) {
        let (payloads, state) = match self.peers.find_mut(id) {
            Some(peer) => match peer.reader.push(bytes) {
                Ok(payloads) => (payloads, peer.state),
                Err(e) => {
                    log::warn!("Bad frame from {id}: {e}");
                    return;
                }
            },
            None => {
                log::debug!("Data for unknown peer {id} dropped");
                return;
            }
        };
        for payload in payloads {
            match payload {
                Payload::Sync(update) => match state {
                    ChannelState::Connected => self.emit(ConnectorEvent::Sync {
                        from: id,
                        payload: update,
                    }),
                    ChannelState::Closed => {}
                    _ => {
                        if !self.queue.enqueue(id, update) {
                            log::warn!("Inbound queue full; sync message from {id} dropped");
                        }
                    }
                },
                Payload::Meta { event, data } => {
                    self.emit(ConnectorEvent::Meta {
                        from: id,
                        event,
                        data,
                    });
                }
            }
        }
    }

    fn destroy_peer(&mut self, id: Uuid) {
        if let Some(mut peer) = self.peers.remove(id) {
            log::warn!("Connection to peer {id} closed");
            self.queue.discard(id);
            peer.state = ChannelState::Closed;
            peer.wire = None;
            self.emit(ConnectorEvent::Roster(self.peers.roster()));
            self.emit(ConnectorEvent::PeerDisconnected(peer.info()));
        }
    }

    // ----- teardown -----

    async fn shutdown(&mut self) {
        for mut peer in self.peers.drain() {
            // Dropping the wire is the close; relay-only entries have none.
            peer.wire = None;
            peer.state = ChannelState::Closed;
            self.emit(ConnectorEvent::PeerDisconnected(peer.info()));
        }
        self.emit(ConnectorEvent::Roster(Vec::new()));
        self.queue.clear();
        if let Some(negotiator) = self.negotiator.as_mut() {
            negotiator.shutdown();
        }
        *self.phase.write().await = SessionPhase::Disconnected;
        log::info!("Session closed");
    }
}
