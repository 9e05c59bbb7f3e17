//! Length-prefixed framing and outbound throttling for direct channels.
//!
//! Frame layout: 4-byte LE length + bincode-encoded [`Payload`]. The raw
//! channel underneath is a byte pipe, so chunks may split or merge frames
//! arbitrarily; [`WireReader`] reassembles them on the inbound side.
//!
//! The outbound side of every direct channel runs through a pacing task:
//! at most [`THROTTLE_RATE`] bytes per second, emitted in chunks of at most
//! [`THROTTLE_CHUNK`] bytes. Relay traffic is never throttled by this layer.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use crate::protocol::{Payload, ProtocolError};

/// Outbound rate cap per direct channel, in bytes per second.
pub const THROTTLE_RATE: usize = 300 * 1000;

/// Pacing granularity, in bytes.
pub const THROTTLE_CHUNK: usize = 15 * 1000;

const LEN_SIZE: usize = 4;
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Encode one payload into a frame: 4-byte LE length + bincode body.
pub fn encode_frame(payload: &Payload) -> Result<Vec<u8>, ProtocolError> {
    let body = payload.encode()?;
    if body.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge);
    }
    let mut out = Vec::with_capacity(LEN_SIZE + body.len());
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Inbound frame reassembly for one direct channel.
#[derive(Debug, Default)]
pub struct WireReader {
    buf: Vec<u8>,
}

impl WireReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every complete payload now available.
    ///
    /// Partial frames stay buffered until the rest arrives.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<Payload>, ProtocolError> {
        self.buf.extend_from_slice(bytes);
        let mut out = Vec::new();
        loop {
            if self.buf.len() < LEN_SIZE {
                break;
            }
            let len =
                u32::from_le_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]) as usize;
            if len > MAX_FRAME_LEN {
                return Err(ProtocolError::FrameTooLarge);
            }
            if self.buf.len() < LEN_SIZE + len {
                break;
            }
            let payload = Payload::decode(&self.buf[LEN_SIZE..LEN_SIZE + len])?;
            self.buf.drain(..LEN_SIZE + len);
            out.push(payload);
        }
        Ok(out)
    }

    /// Bytes buffered while waiting for the rest of a frame.
    pub fn pending_bytes(&self) -> usize {
        self.buf.len()
    }
}

/// Outbound half of one direct channel.
///
/// Encodes payloads and queues them through the pacing task onto the raw
/// byte channel. Dropping the `Wire` stops the task and closes the raw
/// channel — this is the single close path for the owning peer entry.
#[derive(Debug)]
pub struct Wire {
    frame_tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl Wire {
    /// Wrap a raw outbound byte channel. Spawns the pacing task.
    pub fn new(raw_tx: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        tokio::spawn(throttle_task(frame_rx, raw_tx, THROTTLE_RATE, THROTTLE_CHUNK));
        Self { frame_tx }
    }

    /// Encode and queue one payload.
    ///
    /// Fire-and-forget: a closed raw channel is reported through the
    /// channel-closed event path, not here. Only encoding can fail.
    pub fn send(&self, payload: &Payload) -> Result<(), ProtocolError> {
        let frame = encode_frame(payload)?;
        let _ = self.frame_tx.send(frame);
        Ok(())
    }
}

/// Forward frames as chunks of at most `chunk` bytes, spending at most
/// `rate` bytes per one-second window. Ends when either side closes.
async fn throttle_task(
    mut frame_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    raw_tx: mpsc::UnboundedSender<Vec<u8>>,
    rate: usize,
    chunk: usize,
) {
    let mut window = Instant::now();
    let mut budget = rate;
    while let Some(frame) = frame_rx.recv().await {
        if window.elapsed() >= Duration::from_secs(1) {
            window = Instant::now();
            budget = rate;
        }
        for piece in frame.chunks(chunk) {
            if budget < piece.len() {
                sleep_until(window + Duration::from_secs(1)).await;
                window = Instant::now();
                budget = rate;
            }
            budget = budget.saturating_sub(piece.len());
            if raw_tx.send(piece.to_vec()).is_err() {
                return;
            }
        }
    }
}
