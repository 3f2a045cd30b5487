//! Annex-B NAL unit extraction.
//!
//! H.264 elementary streams delimit NAL units with `00 00 01` or
//! `00 00 00 01` start codes. A unit spans from one start code to the
//! next; the trailing unit is held until its terminator arrives.
//! To bound memory on malformed or truncated streams, a buffer that
//! grows past a safety ceiling without completing a unit is flushed
//! to the decoder wholesale as a best-effort unit.

use bytes::{Buf, Bytes, BytesMut};

// ── NalSplitter ──────────────────────────────────────────────────

/// Stateless splitter over an external accumulation buffer.
#[derive(Debug, Clone)]
pub struct NalSplitter {
    /// Buffer size above which an unterminated unit is flushed.
    pub max_pending: usize,
}

impl Default for NalSplitter {
    fn default() -> Self {
        Self {
            max_pending: Self::MAX_PENDING,
        }
    }
}

impl NalSplitter {
    /// Default safety ceiling: 1 MiB.
    pub const MAX_PENDING: usize = 1024 * 1024;

    /// Extract every complete NAL unit from the front of `buf`.
    ///
    /// Complete units (and any bytes preceding the first start code)
    /// are removed from `buf`; a trailing unit without a terminating
    /// start code stays buffered unless the ceiling is exceeded.
    pub fn split(&self, buf: &mut BytesMut) -> Vec<Bytes> {
        let mut units = Vec::new();

        loop {
            let Some(start) = find_start_code(buf, 0) else {
                if buf.len() > self.max_pending {
                    units.push(buf.split_to(buf.len()).freeze());
                }
                break;
            };

            // Bytes before the first start code are not decodable.
            if start > 0 {
                buf.advance(start);
            }

            let prefix = start_code_len(buf);
            match find_start_code(buf, prefix) {
                Some(next) => units.push(buf.split_to(next).freeze()),
                None => {
                    if buf.len() > self.max_pending {
                        units.push(buf.split_to(buf.len()).freeze());
                    }
                    break;
                }
            }
        }

        units
    }
}

/// Position of the next start code at or after `from`, if any.
fn find_start_code(buf: &BytesMut, from: usize) -> Option<usize> {
    if buf.len() < 3 {
        return None;
    }
    (from..buf.len() - 2).find(|&i| buf[i] == 0x00 && buf[i + 1] == 0x00 && buf[i + 2] == 0x01)
        .map(|i| {
            // Prefer the 4-byte form when the 0x01 is preceded by a
            // third zero.
            if i > from && buf[i - 1] == 0x00 { i - 1 } else { i }
        })
}

/// Length of the start code at the front of `buf` (3 or 4).
fn start_code_len(buf: &BytesMut) -> usize {
    if buf.len() >= 4 && buf[2] == 0x00 { 4 } else { 3 }
}

// ── Tests ────────────────────────────────────────────────────────
