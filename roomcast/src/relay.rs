//! Rendezvous link adapter.
//!
//! Wraps the connection to the rendezvous service behind two primitives —
//! `join` and `forward` — and a typed inbound event stream. The real link
//! is a WebSocket carrying bincode frames; an in-memory pair serves
//! embedded rendezvous setups and tests.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::protocol::{ForwardTarget, Payload, ProtocolError, RelayFrame, RelayNotice};

/// Events from the rendezvous service.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    Notice(RelayNotice),
    /// The link dropped. The session stays up degraded; recovery is the
    /// caller-invoked `reconnect`.
    Closed,
}

/// Far side of an in-memory relay link.
///
/// An embedded rendezvous (or a test harness) reads the frames the
/// connector emits and injects the notices it should observe.
#[derive(Debug)]
pub struct RelayRemote {
    pub frames: mpsc::UnboundedReceiver<RelayFrame>,
    pub events: mpsc::UnboundedSender<RelayEvent>,
}

/// Handle to the rendezvous connection.
///
/// Owned by the session; dropping it closes the link.
#[derive(Debug)]
pub struct RelayLink {
    out_tx: mpsc::UnboundedSender<RelayFrame>,
}

impl RelayLink {
    /// Dial the rendezvous service over WebSocket.
    ///
    /// Spawns a writer task (fed by the returned handle) and a reader task
    /// that decodes binary frames into the returned event stream. A close
    /// or transport error ends the stream with [`RelayEvent::Closed`].
    pub async fn connect(
        url: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<RelayEvent>), ProtocolError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)?;
        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<RelayFrame>();
        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let encoded = match frame.encode() {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        log::warn!("Failed to encode relay frame: {e}");
                        continue;
                    }
                };
                if ws_writer.send(Message::Binary(encoded.into())).await.is_err() {
                    break;
                }
            }
            let _ = ws_writer.close().await;
        });

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(Message::Binary(data)) => {
                        let bytes: Vec<u8> = data.into();
                        match RelayNotice::decode(&bytes) {
                            Ok(notice) => {
                                if event_tx.send(RelayEvent::Notice(notice)).is_err() {
                                    return;
                                }
                            }
                            Err(e) => log::warn!("Undecodable relay notice: {e}"),
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }
            let _ = event_tx.send(RelayEvent::Closed);
        });

        Ok((Self { out_tx }, event_rx))
    }

    /// Build an in-memory link: the connector side plus the far side.
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<RelayEvent>, RelayRemote) {
        let (out_tx, frames) = mpsc::unbounded_channel();
        let (events, event_rx) = mpsc::unbounded_channel();
        (Self { out_tx }, event_rx, RelayRemote { frames, events })
    }

    /// Announce this participant to a room.
    pub fn join(&self, room: &str, nickname: &str, relay_only: bool) {
        let _ = self.out_tx.send(RelayFrame::Join {
            room: room.to_string(),
            nickname: nickname.to_string(),
            relay_only,
        });
    }

    /// Ask the service to deliver a payload. Fire-and-forget.
    pub fn forward(&self, target: ForwardTarget, payload: Payload) {
        let _ = self.out_tx.send(RelayFrame::Forward { target, payload });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_pair_join_reaches_remote() {
        let (link, _event_rx, mut remote) = RelayLink::pair();
        link.join("welcome", "Alice", false);

        let frame = remote.frames.recv().await.unwrap();
        assert_eq!(
            frame,
            RelayFrame::Join {
                room: "welcome".to_string(),
                nickname: "Alice".to_string(),
                relay_only: false,
            }
        );
    }

    #[tokio::test]
    async fn test_pair_forward_and_notice() {
        let (link, mut event_rx, mut remote) = RelayLink::pair();

        let to = Uuid::new_v4();
        link.forward(ForwardTarget::Peer(to), Payload::Sync(vec![1, 2]));
        match remote.frames.recv().await.unwrap() {
            RelayFrame::Forward { target, payload } => {
                assert_eq!(target, ForwardTarget::Peer(to));
                assert_eq!(payload, Payload::Sync(vec![1, 2]));
            }
            other => panic!("Expected Forward, got {other:?}"),
        }

        let from = Uuid::new_v4();
        remote
            .events
            .send(RelayEvent::Notice(RelayNotice::Identity { id: from }))
            .unwrap();
        assert_eq!(
            event_rx.recv().await.unwrap(),
            RelayEvent::Notice(RelayNotice::Identity { id: from })
        );
    }

    #[tokio::test]
    async fn test_dropped_link_closes_remote() {
        let (link, _event_rx, mut remote) = RelayLink::pair();
        drop(link);
        assert!(remote.frames.recv().await.is_none());
    }
}
