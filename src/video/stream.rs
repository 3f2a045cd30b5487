//! TCP client for the video channel.
//!
//! Two execution contexts per stream:
//!
//! 1. The **socket task** reads into an accumulation buffer, parses
//!    the one-time device handshake, then extracts NAL units with
//!    [`NalSplitter`].
//! 2. The **decode worker** (a blocking task — codec calls are
//!    CPU-bound for tens of milliseconds) drains an ordered
//!    single-consumer channel of NAL units and drives a
//!    [`VideoDecoder`].
//!
//! Hand-off order is decode order; codecs are stateful across units.
//! `disconnect` cancels the socket task, which closes the channel, and
//! joins both contexts — no events fire after it returns.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::control::stream::CONNECT_TIMEOUT;
use crate::decode::{DecoderStats, SharedDecoderStats, VideoDecoder};
use crate::error::MirrorError;
use crate::video::handshake::{DeviceHandshake, HandshakeParser};
use crate::video::nal::NalSplitter;

// ── VideoEvent ───────────────────────────────────────────────────

/// Notifications from the video pipeline.
#[derive(Debug)]
pub enum VideoEvent {
    /// The one-time device descriptor, parsed from the preamble.
    DeviceInfo(DeviceHandshake),
    /// A decoded frame in packed RGB24.
    Frame(crate::decode::RgbFrame),
    /// Fatal stream condition (transport error, malformed handshake).
    Error(String),
    /// The remote closed the connection.
    Closed,
}

// ── VideoStream ──────────────────────────────────────────────────

/// TCP client that demuxes the H.264 stream and drives the decoder.
pub struct VideoStream {
    cancel: CancellationToken,
    socket_task: Option<JoinHandle<()>>,
    decode_task: Option<JoinHandle<()>>,
    stats: Arc<SharedDecoderStats>,
    bytes_received: Arc<AtomicU64>,
}

impl VideoStream {
    /// Connect to the forwarded video port and start both pipeline
    /// contexts. `decoder` is consumed by the decode worker.
    pub async fn connect(
        host: &str,
        port: u16,
        decoder: Box<dyn VideoDecoder>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<VideoEvent>), MirrorError> {
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port)))
            .await
            .map_err(|_| MirrorError::Timeout(CONNECT_TIMEOUT))??;
        debug!(host, port, "video stream connected");

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (nal_tx, nal_rx) = mpsc::unbounded_channel::<Bytes>();
        let cancel = CancellationToken::new();
        let stats = SharedDecoderStats::new();
        let bytes_received = Arc::new(AtomicU64::new(0));

        let decode_task = spawn_decode_worker(decoder, nal_rx, event_tx.clone(), stats.clone());
        let socket_task = tokio::spawn(socket_loop(
            stream,
            nal_tx,
            event_tx,
            cancel.clone(),
            bytes_received.clone(),
        ));

        Ok((
            Self {
                cancel,
                socket_task: Some(socket_task),
                decode_task: Some(decode_task),
                stats,
                bytes_received,
            },
            event_rx,
        ))
    }

    /// Decoder utilization snapshot.
    pub fn stats(&self) -> DecoderStats {
        self.stats.snapshot()
    }

    /// Raw bytes received from the socket so far.
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    /// Stop both pipeline contexts and wait for them to finish.
    pub async fn disconnect(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.socket_task.take() {
            let _ = handle.await;
        }
        // The socket task dropped the NAL sender; the worker drains
        // what is queued, closes the decoder and exits.
        if let Some(handle) = self.decode_task.take() {
            let _ = handle.await;
        }
        debug!("video stream disconnected");
    }
}

// ── Socket task ──────────────────────────────────────────────────

async fn socket_loop(
    mut stream: TcpStream,
    nal_tx: mpsc::UnboundedSender<Bytes>,
    event_tx: mpsc::UnboundedSender<VideoEvent>,
    cancel: CancellationToken,
    bytes_received: Arc<AtomicU64>,
) {
    let parser = HandshakeParser;
    let splitter = NalSplitter::default();
    let mut buf = BytesMut::with_capacity(64 * 1024);
    let mut handshaken = false;

    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => break,
            read = stream.read_buf(&mut buf) => read,
        };

        match read {
            Ok(0) => {
                let _ = event_tx.send(VideoEvent::Closed);
                break;
            }
            Ok(n) => {
                bytes_received.fetch_add(n as u64, Ordering::Relaxed);
            }
            Err(e) => {
                warn!(error = %e, "video stream read error");
                let _ = event_tx.send(VideoEvent::Error(e.to_string()));
                break;
            }
        }

        if !handshaken {
            match parser.parse(&mut buf) {
                Ok(Some(info)) => {
                    debug!(
                        device = %info.device_name,
                        width = info.width,
                        height = info.height,
                        "device handshake received"
                    );
                    handshaken = true;
                    if event_tx.send(VideoEvent::DeviceInfo(info)).is_err() {
                        break;
                    }
                }
                Ok(None) => continue,
                Err(e) => {
                    let _ = event_tx.send(VideoEvent::Error(e.to_string()));
                    break;
                }
            }
        }

        for unit in splitter.split(&mut buf) {
            if nal_tx.send(unit).is_err() {
                // Decode worker is gone; nothing left to feed.
                return;
            }
        }
    }
}

// ── Decode worker ────────────────────────────────────────────────

fn spawn_decode_worker(
    mut decoder: Box<dyn VideoDecoder>,
    mut nal_rx: mpsc::UnboundedReceiver<Bytes>,
    event_tx: mpsc::UnboundedSender<VideoEvent>,
    stats: Arc<SharedDecoderStats>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        while let Some(unit) = nal_rx.blocking_recv() {
            let started = Instant::now();
            match decoder.submit(&unit) {
                Ok(frames) => {
                    let micros = started.elapsed().as_micros() as u64;
                    for frame in frames {
                        stats.record_decoded(micros);
                        if event_tx.send(VideoEvent::Frame(frame)).is_err() {
                            decoder.close();
                            return;
                        }
                    }
                }
                Err(e) => {
                    // Per-unit degradation: count and keep going.
                    debug!(error = %e, "access unit skipped");
                    stats.record_failed();
                }
            }
        }
        decoder.close();
    })
}
