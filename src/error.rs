//! Domain-specific error types for the mirror client.
//!
//! All fallible operations return `Result<T, MirrorError>`.
//! No panics on invalid input — every error is typed and recoverable.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the mirror client core.
#[derive(Debug, Error)]
pub enum MirrorError {
    // ── Transport Errors ─────────────────────────────────────────
    /// The TCP/IO layer reported an error. Fatal for the stream.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    // ── Protocol Errors ──────────────────────────────────────────
    /// The device→host byte stream no longer matches the protocol.
    /// The accumulated buffer is discarded; no resync is attempted.
    #[error("protocol desync: {0}")]
    Desync(&'static str),

    /// A device-originated message carried an unknown type tag.
    #[error("unknown device message tag: {0:#x}")]
    UnknownDeviceMessage(u8),

    /// The video stream preamble could not be parsed.
    #[error("malformed handshake: {0}")]
    MalformedHandshake(&'static str),

    /// The remote server reported a version different from the
    /// client marker it was launched with.
    #[error("server version {server} does not match client {client}")]
    VersionMismatch { server: String, client: String },

    // ── Bring-up Errors ──────────────────────────────────────────
    /// Remote server bring-up (push / forward / launch) failed.
    /// Partially-established forwards are rolled back before this
    /// surfaces.
    #[error("server bring-up failed: {0}")]
    Bringup(String),

    /// An operation was attempted in a state that does not allow it.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    // ── Decode Errors ────────────────────────────────────────────
    /// The codec rejected an access unit. Per-unit and non-fatal:
    /// counted in [`DecoderStats`](crate::decode::DecoderStats), the
    /// pipeline continues.
    #[error("decode error: {0}")]
    Decode(String),

    // ── Serialization Errors ─────────────────────────────────────
    /// UTF-8 conversion failed.
    #[error("invalid utf-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for MirrorError {
    fn from(s: String) -> Self {
        MirrorError::Other(s)
    }
}

impl From<&str> for MirrorError {
    fn from(s: &str) -> Self {
        MirrorError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for MirrorError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        MirrorError::ChannelClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = MirrorError::Desync("unexpected tag mid-message");
        assert!(e.to_string().contains("desync"));

        let e = MirrorError::VersionMismatch {
            server: "2.4".into(),
            client: "2.5".into(),
        };
        assert!(e.to_string().contains("2.4"));
        assert!(e.to_string().contains("2.5"));
    }

    #[test]
    fn from_string() {
        let e: MirrorError = "something broke".into();
        assert!(matches!(e, MirrorError::Other(_)));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let e: MirrorError = io_err.into();
        assert!(matches!(e, MirrorError::Transport(_)));
    }
}
