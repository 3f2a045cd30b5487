//! Audio channel: raw PCM playback stream with bounded latency.
//!
//! Structurally a simpler [`VideoStream`](crate::video::VideoStream):
//! no handshake, no framing — the server sends bare 48 kHz stereo
//! s16le samples. The only protocol concern is latency: samples
//! accumulate in a pending buffer the sink drains with
//! [`AudioStream::take_pcm`], and when the sink lags more than about
//! one second behind live the oldest pending bytes are dropped so the
//! session never drifts further behind.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::control::stream::CONNECT_TIMEOUT;
use crate::error::MirrorError;

// ── PCM format ───────────────────────────────────────────────────

/// Sample rate of the server's PCM stream.
pub const SAMPLE_RATE: u32 = 48_000;
/// Channel count.
pub const CHANNELS: u32 = 2;
/// Bytes per sample (s16le).
pub const BYTES_PER_SAMPLE: u32 = 2;
/// Latency cap: one second of audio.
pub const MAX_PENDING_PCM: usize = (SAMPLE_RATE * CHANNELS * BYTES_PER_SAMPLE) as usize;

// ── AudioEvent ───────────────────────────────────────────────────

/// Notifications from the audio stream.
#[derive(Debug)]
pub enum AudioEvent {
    /// PCM is waiting in the pending buffer. Edge-triggered — sent
    /// when the buffer goes from empty to non-empty, so a sink should
    /// call [`AudioStream::take_pcm`] until it returns an empty chunk.
    PcmReady,
    /// Fatal transport condition.
    Error(String),
    /// The remote closed the connection.
    Closed,
}

// ── AudioStream ──────────────────────────────────────────────────

/// TCP client accumulating latency-bounded PCM for a pull-based sink.
pub struct AudioStream {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    pending: Arc<Mutex<BytesMut>>,
    bytes_received: Arc<AtomicU64>,
}

impl AudioStream {
    /// Connect to the forwarded audio port.
    pub async fn connect(
        host: &str,
        port: u16,
    ) -> Result<(Self, mpsc::UnboundedReceiver<AudioEvent>), MirrorError> {
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port)))
            .await
            .map_err(|_| MirrorError::Timeout(CONNECT_TIMEOUT))??;
        debug!(host, port, "audio stream connected");

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let pending = Arc::new(Mutex::new(BytesMut::with_capacity(MAX_PENDING_PCM)));
        let bytes_received = Arc::new(AtomicU64::new(0));

        let task = tokio::spawn(read_loop(
            stream,
            event_tx,
            cancel.clone(),
            pending.clone(),
            bytes_received.clone(),
        ));

        Ok((
            Self {
                cancel,
                task: Some(task),
                pending,
                bytes_received,
            },
            event_rx,
        ))
    }

    /// Drain everything currently pending, newest-trimmed to at most
    /// [`MAX_PENDING_PCM`] bytes. Empty when no samples are waiting.
    pub fn take_pcm(&self) -> Bytes {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.split().freeze()
    }

    /// Bytes currently waiting for the sink.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Raw bytes received from the socket so far.
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    /// Stop the reader and wait for it. No events afterwards; any
    /// still-pending samples remain takeable.
    pub async fn disconnect(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.task.take() {
            let _ = handle.await;
        }
        debug!("audio stream disconnected");
    }
}

async fn read_loop(
    mut stream: TcpStream,
    event_tx: mpsc::UnboundedSender<AudioEvent>,
    cancel: CancellationToken,
    pending: Arc<Mutex<BytesMut>>,
    bytes_received: Arc<AtomicU64>,
) {
    let mut scratch = BytesMut::with_capacity(16 * 1024);

    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => break,
            read = stream.read_buf(&mut scratch) => read,
        };

        let n = match read {
            Ok(0) => {
                let _ = event_tx.send(AudioEvent::Closed);
                break;
            }
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "audio stream read error");
                let _ = event_tx.send(AudioEvent::Error(e.to_string()));
                break;
            }
        };

        let was_empty = {
            let mut pending = pending.lock().unwrap_or_else(|e| e.into_inner());
            let was_empty = pending.is_empty();
            pending.unsplit(scratch.split());
            trim_pending(&mut pending);
            was_empty
        };
        // Counted only once the samples are takeable.
        bytes_received.fetch_add(n as u64, Ordering::Relaxed);

        if was_empty && event_tx.send(AudioEvent::PcmReady).is_err() {
            break;
        }
    }
}

/// Drop the oldest bytes once the pending buffer exceeds the cap.
fn trim_pending(pending: &mut BytesMut) {
    if pending.len() > MAX_PENDING_PCM {
        let excess = pending.len() - MAX_PENDING_PCM;
        pending.advance(excess);
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    #[test]
    fn cap_is_one_second() {
        assert_eq!(MAX_PENDING_PCM, 192_000);
    }

    #[test]
    fn trim_drops_oldest_bytes() {
        let mut pending = BytesMut::new();
        pending.put_slice(&vec![1u8; MAX_PENDING_PCM]);
        pending.put_slice(&[2u8; 100]);

        trim_pending(&mut pending);
        assert_eq!(pending.len(), MAX_PENDING_PCM);
        // The front of the buffer is now past the dropped prefix.
        assert_eq!(pending[pending.len() - 1], 2);
        assert_eq!(pending[pending.len() - 100], 2);
    }

    #[test]
    fn trim_leaves_small_buffers_alone() {
        let mut pending = BytesMut::new();
        pending.put_slice(&[7u8; 512]);
        trim_pending(&mut pending);
        assert_eq!(pending.len(), 512);
    }
}
