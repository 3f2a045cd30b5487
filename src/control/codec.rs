//! Framing codec for the control socket.
//!
//! Outbound: [`ControlMessage`]s serialized as-is (they carry their
//! own framing — tag plus fixed layout). Inbound: device→host
//! messages parsed from an accumulating buffer:
//!
//! ```text
//! tag 0  clipboard   length:u32  utf8 bytes
//! tag 1  ack         sequence:u64
//! ```
//!
//! Any other tag is a fatal protocol desync: the buffer is discarded
//! and an error is raised. Resynchronization is intentionally not
//! attempted — a stream that has lost framing cannot be trusted.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::control::message::ControlMessage;
use crate::error::MirrorError;

// ── DeviceEvent ──────────────────────────────────────────────────

/// A device-originated control-channel message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// Device clipboard content (tag 0).
    Clipboard(String),
    /// Acknowledgement of a sequenced command (tag 1).
    Ack(u64),
}

const TAG_CLIPBOARD: u8 = 0;
const TAG_ACK: u8 = 1;

// ── ControlCodec ─────────────────────────────────────────────────

/// `tokio_util` codec for the control stream.
#[derive(Debug, Default)]
pub struct ControlCodec;

impl Decoder for ControlCodec {
    type Item = DeviceEvent;
    type Error = MirrorError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        match src[0] {
            TAG_CLIPBOARD => {
                if src.len() < 5 {
                    return Ok(None);
                }
                let length = u32::from_be_bytes([src[1], src[2], src[3], src[4]]) as usize;
                if src.len() < 5 + length {
                    // Payload not fully buffered yet.
                    return Ok(None);
                }
                src.advance(5);
                let text = String::from_utf8(src.split_to(length).to_vec())?;
                Ok(Some(DeviceEvent::Clipboard(text)))
            }
            TAG_ACK => {
                if src.len() < 9 {
                    return Ok(None);
                }
                src.advance(1);
                let sequence = u64::from_be_bytes(
                    src.split_to(8)[..]
                        .try_into()
                        .map_err(|_| MirrorError::Desync("short ack sequence"))?,
                );
                Ok(Some(DeviceEvent::Ack(sequence)))
            }
            tag => {
                src.clear();
                Err(MirrorError::UnknownDeviceMessage(tag))
            }
        }
    }
}

impl Encoder<ControlMessage> for ControlCodec {
    type Error = MirrorError;

    fn encode(&mut self, item: ControlMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode(dst);
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    #[test]
    fn clipboard_waits_for_full_payload() {
        let mut codec = ControlCodec;
        let text = "split me";
        let mut buf = BytesMut::new();
        buf.put_u8(TAG_CLIPBOARD);
        buf.put_u32(text.len() as u32);
        buf.put_slice(&text.as_bytes()[..3]);

        // First partial read: nothing emitted, buffer retained.
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 5 + 3);

        buf.put_slice(&text.as_bytes()[3..]);
        let event = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(event, DeviceEvent::Clipboard(text.into()));
        assert!(buf.is_empty());
    }

    #[test]
    fn ack_sequence_42() {
        let mut codec = ControlCodec;
        let mut buf = BytesMut::new();
        buf.put_u8(TAG_ACK);
        buf.put_u64(42);

        let event = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(event, DeviceEvent::Ack(42));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn ack_waits_for_eight_bytes() {
        let mut codec = ControlCodec;
        let mut buf = BytesMut::new();
        buf.put_u8(TAG_ACK);
        buf.put_slice(&[0, 0, 0]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn unknown_tag_is_fatal_and_discards_buffer() {
        let mut codec = ControlCodec;
        let mut buf = BytesMut::new();
        buf.put_u8(0x7F);
        buf.put_slice(b"garbage");

        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, MirrorError::UnknownDeviceMessage(0x7F)));
        assert!(buf.is_empty());
    }

    #[test]
    fn back_to_back_messages() {
        let mut codec = ControlCodec;
        let mut buf = BytesMut::new();
        buf.put_u8(TAG_CLIPBOARD);
        buf.put_u32(2);
        buf.put_slice(b"hi");
        buf.put_u8(TAG_ACK);
        buf.put_u64(9);

        assert_eq!(
            codec.decode(&mut buf).unwrap().unwrap(),
            DeviceEvent::Clipboard("hi".into())
        );
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), DeviceEvent::Ack(9));
    }

    #[test]
    fn encoder_writes_control_message_bytes() {
        let mut codec = ControlCodec;
        let mut buf = BytesMut::new();
        codec
            .encode(ControlMessage::RotateDevice, &mut buf)
            .unwrap();
        assert_eq!(&buf[..], &[11]);
    }
}
