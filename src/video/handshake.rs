//! Device handshake parsing.
//!
//! The first bytes of the video socket identify the device:
//!
//! ```text
//! [dummy:u8 == 0x00]          optional, depends on server config
//! [device name: 64 bytes]     UTF-8, NUL/space padded
//! [width:u16 height:u16]      optional legacy resolution, big-endian
//! ```
//!
//! Both optional fields are detected by sniffing, not negotiation:
//! a leading zero byte cannot start a device name, and a resolution
//! pair is only accepted when both values fall in a plausible window
//! (otherwise the four bytes are the beginning of the video stream).
//! The thresholds are compatibility shims, kept as named constants
//! here rather than treated as protocol truth.

use bytes::{Buf, BytesMut};

use crate::error::MirrorError;

// ── DeviceHandshake ──────────────────────────────────────────────

/// The parsed one-time device descriptor.
///
/// `width`/`height` are 0 when the server omitted the legacy
/// resolution field; the decoder's stream-derived dimensions are
/// authoritative in that case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandshake {
    pub device_name: String,
    pub width: u16,
    pub height: u16,
}

// ── HandshakeParser ──────────────────────────────────────────────

/// Incremental parser for the video stream preamble.
#[derive(Debug, Default)]
pub struct HandshakeParser;

impl HandshakeParser {
    /// Protocol marker byte some server variants prepend.
    pub const DUMMY_BYTE: u8 = 0x00;
    /// Fixed width of the device-name field.
    pub const DEVICE_NAME_LEN: usize = 64;
    /// Smallest dimension accepted as a real resolution.
    pub const MIN_DIMENSION: u16 = 1;
    /// Largest dimension accepted as a real resolution.
    pub const MAX_DIMENSION: u16 = 8192;

    /// Try to parse the handshake from the front of `buf`.
    ///
    /// Returns `Ok(None)` until enough bytes are buffered to decide
    /// both optional fields; on success the consumed bytes are
    /// removed from `buf` and the remainder is the video stream.
    pub fn parse(&self, buf: &mut BytesMut) -> Result<Option<DeviceHandshake>, MirrorError> {
        if buf.is_empty() {
            return Ok(None);
        }

        let offset = usize::from(buf[0] == Self::DUMMY_BYTE);

        // Decide the resolution field by looking at the 4 bytes after
        // the name; video data always follows, so waiting for them
        // cannot stall forever.
        let need = offset + Self::DEVICE_NAME_LEN + 4;
        if buf.len() < need {
            return Ok(None);
        }

        let name_bytes = &buf[offset..offset + Self::DEVICE_NAME_LEN];
        let name_end = name_bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(Self::DEVICE_NAME_LEN);
        let device_name = std::str::from_utf8(&name_bytes[..name_end])
            .map_err(|_| MirrorError::MalformedHandshake("device name is not valid utf-8"))?
            .trim()
            .to_string();

        let dim_at = offset + Self::DEVICE_NAME_LEN;
        let width = u16::from_be_bytes([buf[dim_at], buf[dim_at + 1]]);
        let height = u16::from_be_bytes([buf[dim_at + 2], buf[dim_at + 3]]);

        let plausible = (Self::MIN_DIMENSION..=Self::MAX_DIMENSION).contains(&width)
            && (Self::MIN_DIMENSION..=Self::MAX_DIMENSION).contains(&height);

        if plausible {
            buf.advance(dim_at + 4);
            Ok(Some(DeviceHandshake {
                device_name,
                width,
                height,
            }))
        } else {
            // The four bytes are compressed video — keep them.
            buf.advance(dim_at);
            Ok(Some(DeviceHandshake {
                device_name,
                width: 0,
                height: 0,
            }))
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    const NAME_LEN: usize = HandshakeParser::DEVICE_NAME_LEN;

    fn name_field(name: &str) -> [u8; NAME_LEN] {
        let mut field = [0u8; NAME_LEN];
        field[..name.len()].copy_from_slice(name.as_bytes());
        field
    }

    fn parse(buf: &mut BytesMut) -> Option<DeviceHandshake> {
        HandshakeParser.parse(buf).unwrap()
    }

    #[test]
    fn plain_name_with_resolution() {
        let mut buf = BytesMut::new();
        buf.put_slice(&name_field("Pixel 7"));
        buf.put_u16(1080);
        buf.put_u16(2400);

        let hs = parse(&mut buf).unwrap();
        assert_eq!(hs.device_name, "Pixel 7");
        assert_eq!((hs.width, hs.height), (1080, 2400));
        assert!(buf.is_empty());
    }

    #[test]
    fn dummy_byte_then_name_with_resolution() {
        let mut buf = BytesMut::new();
        buf.put_u8(0x00);
        buf.put_slice(&name_field("Pixel 7"));
        buf.put_u16(720);
        buf.put_u16(1280);

        let hs = parse(&mut buf).unwrap();
        assert_eq!(hs.device_name, "Pixel 7");
        assert_eq!((hs.width, hs.height), (720, 1280));
        assert!(buf.is_empty());
    }

    #[test]
    fn missing_resolution_yields_zero_dimensions() {
        // An Annex-B start code directly after the name fails the
        // range check, so it must be left in the buffer.
        let mut buf = BytesMut::new();
        buf.put_slice(&name_field("Galaxy S24"));
        buf.put_slice(&[0x00, 0x00, 0x00, 0x01]);

        let hs = parse(&mut buf).unwrap();
        assert_eq!(hs.device_name, "Galaxy S24");
        assert_eq!((hs.width, hs.height), (0, 0));
        assert_eq!(&buf[..], &[0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn dummy_byte_and_missing_resolution() {
        let mut buf = BytesMut::new();
        buf.put_u8(0x00);
        buf.put_slice(&name_field("Galaxy S24"));
        buf.put_slice(&[0x00, 0x00, 0x00, 0x01]);

        let hs = parse(&mut buf).unwrap();
        assert_eq!(hs.device_name, "Galaxy S24");
        assert_eq!((hs.width, hs.height), (0, 0));
        assert_eq!(&buf[..], &[0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn waits_for_enough_bytes() {
        let mut buf = BytesMut::new();
        buf.put_slice(&name_field("Pixel")[..32]);
        assert!(parse(&mut buf).is_none());

        buf.put_slice(&name_field("")[32..]);
        // Name complete but the decision window is 4 bytes short.
        assert!(parse(&mut buf).is_none());

        buf.put_u16(1080);
        buf.put_u16(1920);
        let hs = parse(&mut buf).unwrap();
        assert_eq!(hs.device_name, "Pixel");
    }

    #[test]
    fn oversized_dimensions_are_rejected() {
        let mut buf = BytesMut::new();
        buf.put_slice(&name_field("Tab"));
        buf.put_u16(9000);
        buf.put_u16(1080);

        let hs = parse(&mut buf).unwrap();
        assert_eq!((hs.width, hs.height), (0, 0));
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn name_is_trimmed() {
        let mut buf = BytesMut::new();
        buf.put_slice(&name_field("  OnePlus  "));
        buf.put_u16(1080);
        buf.put_u16(1920);

        let hs = parse(&mut buf).unwrap();
        assert_eq!(hs.device_name, "OnePlus");
    }

    #[test]
    fn invalid_utf8_name_is_malformed() {
        let mut field = [0xFFu8; NAME_LEN];
        field[NAME_LEN - 1] = 0xFE; // no NUL terminator, invalid utf-8
        let mut buf = BytesMut::new();
        buf.put_slice(&field);
        buf.put_u16(1080);
        buf.put_u16(1920);

        let err = HandshakeParser.parse(&mut buf).unwrap_err();
        assert!(matches!(err, MirrorError::MalformedHandshake(_)));
    }
}
