//! Decoder seam between the protocol core and the codec library.
//!
//! Protocol logic only ever sees [`VideoDecoder`]: submit an access
//! unit, get back zero or more packed-RGB frames. The real
//! implementation lives in [`h264`]; unit tests run against fakes so
//! no codec library is exercised.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::MirrorError;

pub mod h264;

pub use h264::OpenH264Decoder;

// ── RgbFrame ─────────────────────────────────────────────────────

/// One decoded frame, converted to tightly-packed RGB24 rows.
#[derive(Debug, Clone)]
pub struct RgbFrame {
    pub width: u32,
    pub height: u32,
    /// `width * height * 3` bytes.
    pub data: Vec<u8>,
}

// ── VideoDecoder ─────────────────────────────────────────────────

/// A stateful H.264 access-unit decoder.
///
/// Codecs buffer internally: a submission may yield zero frames
/// ("try again" is not an error) or several. Implementations must
/// treat `close` as idempotent.
pub trait VideoDecoder: Send {
    /// Feed one access unit; returns any frames now available.
    fn submit(&mut self, data: &[u8]) -> Result<Vec<RgbFrame>, MirrorError>;

    /// Release codec resources. Safe to call more than once.
    fn close(&mut self);
}

// ── DecoderStats ─────────────────────────────────────────────────

/// Read-only utilization snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DecoderStats {
    /// Frames successfully decoded and converted.
    pub frames_decoded: u64,
    /// Access units rejected by the codec (skipped, non-fatal).
    pub frames_failed: u64,
    /// Mean wall-clock decode time per successful frame.
    pub average_decode_time_ms: f64,
}

/// Monotonic counters shared between the decode worker and the
/// owning stream. Cheap to clone; snapshots are taken on demand.
#[derive(Debug, Default)]
pub struct SharedDecoderStats {
    frames_decoded: AtomicU64,
    frames_failed: AtomicU64,
    total_decode_micros: AtomicU64,
}

impl SharedDecoderStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record one successful decode taking `micros` microseconds.
    pub fn record_decoded(&self, micros: u64) {
        self.frames_decoded.fetch_add(1, Ordering::Relaxed);
        self.total_decode_micros.fetch_add(micros, Ordering::Relaxed);
    }

    /// Record one failed access unit.
    pub fn record_failed(&self) {
        self.frames_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> DecoderStats {
        let decoded = self.frames_decoded.load(Ordering::Relaxed);
        let micros = self.total_decode_micros.load(Ordering::Relaxed);
        DecoderStats {
            frames_decoded: decoded,
            frames_failed: self.frames_failed.load(Ordering::Relaxed),
            average_decode_time_ms: if decoded > 0 {
                micros as f64 / decoded as f64 / 1000.0
            } else {
                0.0
            },
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
