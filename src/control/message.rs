//! Host→device control messages and their wire encoding.
//!
//! Every message is a 1-byte type tag followed by a fixed-layout,
//! big-endian payload; the only variable-length fields are explicit
//! length-prefixed UTF-8 strings. Messages are write-only on the
//! client side — there is no decoder for this direction.
//!
//! Fractional inputs cross the wire as fixed-point integers:
//! pressure and other [0,1] fields as unsigned 16-bit fractions,
//! scroll deltas as signed 16-bit fractions of [-1,1] after dividing
//! the raw step count by [`SCROLL_STEP_DIVISOR`].

use bytes::{BufMut, BytesMut};

// ── Android action constants ─────────────────────────────────────

/// Key event action (AKEY_EVENT_ACTION_*).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Down = 0,
    Up = 1,
}

/// Motion event action (AMOTION_EVENT_ACTION_*).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionAction {
    Down = 0,
    Up = 1,
    Move = 2,
    Cancel = 3,
    Outside = 4,
    PointerDown = 5,
    PointerUp = 6,
    HoverMove = 7,
    Scroll = 8,
    HoverEnter = 9,
    HoverExit = 10,
    ButtonPress = 11,
    ButtonRelease = 12,
}

/// Display power mode (SurfaceControl POWER_MODE_*).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenPowerMode {
    Off = 0,
    Normal = 2,
}

/// Which key, if any, triggered a clipboard copy request.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyKey {
    None = 0,
    Copy = 1,
    Cut = 2,
}

// ── Fixed-point helpers ──────────────────────────────────────────

/// Raw scroll step counts are divided by this before fixed-point
/// conversion, matching the server's expected [-1,1] range.
pub const SCROLL_STEP_DIVISOR: f32 = 16.0;

/// Encode a [0,1] fraction as an unsigned 16-bit fixed-point value.
fn to_fixed_u16(value: f32) -> u16 {
    (value.clamp(0.0, 1.0) * 65535.0) as u16
}

/// Encode a [-1,1] fraction as a signed 16-bit fixed-point value.
fn to_fixed_i16(value: f32) -> i16 {
    (value.clamp(-1.0, 1.0) * 32767.0) as i16
}

// ── ControlMessage ───────────────────────────────────────────────

/// A host→device control command.
///
/// Wire size is fully determined by the tag plus any explicit string
/// length; [`encoded_len`](Self::encoded_len) is exact.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    InjectKeycode {
        action: KeyAction,
        keycode: u32,
        repeat: u32,
        meta_state: u32,
    },
    InjectText {
        text: String,
    },
    InjectTouch {
        action: MotionAction,
        pointer_id: u64,
        x: u32,
        y: u32,
        screen_width: u16,
        screen_height: u16,
        /// Touch pressure in [0,1].
        pressure: f32,
        action_button: u32,
        buttons: u32,
    },
    InjectScroll {
        x: u32,
        y: u32,
        screen_width: u16,
        screen_height: u16,
        /// Horizontal scroll in raw steps (divided by
        /// [`SCROLL_STEP_DIVISOR`] on encode).
        h_scroll: f32,
        /// Vertical scroll in raw steps.
        v_scroll: f32,
        buttons: u32,
    },
    BackOrScreenOn {
        action: KeyAction,
    },
    ExpandNotificationPanel,
    ExpandSettingsPanel,
    CollapsePanels,
    GetClipboard {
        copy_key: CopyKey,
    },
    SetClipboard {
        sequence: u64,
        paste: bool,
        text: String,
    },
    SetScreenPowerMode {
        mode: ScreenPowerMode,
    },
    RotateDevice,
}

impl ControlMessage {
    /// The 1-byte wire type tag.
    pub fn tag(&self) -> u8 {
        match self {
            Self::InjectKeycode { .. } => 0,
            Self::InjectText { .. } => 1,
            Self::InjectTouch { .. } => 2,
            Self::InjectScroll { .. } => 3,
            Self::BackOrScreenOn { .. } => 4,
            Self::ExpandNotificationPanel => 5,
            Self::ExpandSettingsPanel => 6,
            Self::CollapsePanels => 7,
            Self::GetClipboard { .. } => 8,
            Self::SetClipboard { .. } => 9,
            Self::SetScreenPowerMode { .. } => 10,
            Self::RotateDevice => 11,
        }
    }

    /// Exact number of bytes [`encode`](Self::encode) will write.
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::InjectKeycode { .. } => 1 + 1 + 4 + 4 + 4,
            Self::InjectText { text } => 1 + 4 + text.len(),
            Self::InjectTouch { .. } => 1 + 1 + 8 + 4 + 4 + 2 + 2 + 2 + 4 + 4,
            Self::InjectScroll { .. } => 1 + 4 + 4 + 2 + 2 + 2 + 2 + 4,
            Self::BackOrScreenOn { .. } => 1 + 1,
            Self::ExpandNotificationPanel | Self::ExpandSettingsPanel | Self::CollapsePanels => 1,
            Self::GetClipboard { .. } => 1 + 1,
            Self::SetClipboard { text, .. } => 1 + 8 + 1 + 4 + text.len(),
            Self::SetScreenPowerMode { .. } => 1 + 1,
            Self::RotateDevice => 1,
        }
    }

    /// Serialize onto `dst`. All integers big-endian.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(self.encoded_len());
        dst.put_u8(self.tag());

        match self {
            Self::InjectKeycode {
                action,
                keycode,
                repeat,
                meta_state,
            } => {
                dst.put_u8(*action as u8);
                dst.put_u32(*keycode);
                dst.put_u32(*repeat);
                dst.put_u32(*meta_state);
            }
            Self::InjectText { text } => {
                dst.put_u32(text.len() as u32);
                dst.put_slice(text.as_bytes());
            }
            Self::InjectTouch {
                action,
                pointer_id,
                x,
                y,
                screen_width,
                screen_height,
                pressure,
                action_button,
                buttons,
            } => {
                dst.put_u8(*action as u8);
                dst.put_u64(*pointer_id);
                dst.put_u32(*x);
                dst.put_u32(*y);
                dst.put_u16(*screen_width);
                dst.put_u16(*screen_height);
                dst.put_u16(to_fixed_u16(*pressure));
                dst.put_u32(*action_button);
                dst.put_u32(*buttons);
            }
            Self::InjectScroll {
                x,
                y,
                screen_width,
                screen_height,
                h_scroll,
                v_scroll,
                buttons,
            } => {
                dst.put_u32(*x);
                dst.put_u32(*y);
                dst.put_u16(*screen_width);
                dst.put_u16(*screen_height);
                dst.put_i16(to_fixed_i16(h_scroll / SCROLL_STEP_DIVISOR));
                dst.put_i16(to_fixed_i16(v_scroll / SCROLL_STEP_DIVISOR));
                dst.put_u32(*buttons);
            }
            Self::BackOrScreenOn { action } => {
                dst.put_u8(*action as u8);
            }
            Self::ExpandNotificationPanel
            | Self::ExpandSettingsPanel
            | Self::CollapsePanels
            | Self::RotateDevice => {}
            Self::GetClipboard { copy_key } => {
                dst.put_u8(*copy_key as u8);
            }
            Self::SetClipboard {
                sequence,
                paste,
                text,
            } => {
                dst.put_u64(*sequence);
                dst.put_u8(u8::from(*paste));
                dst.put_u32(text.len() as u32);
                dst.put_slice(text.as_bytes());
            }
            Self::SetScreenPowerMode { mode } => {
                dst.put_u8(*mode as u8);
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(msg: &ControlMessage) -> BytesMut {
        let mut buf = BytesMut::new();
        msg.encode(&mut buf);
        buf
    }

    fn all_variants() -> Vec<ControlMessage> {
        vec![
            ControlMessage::InjectKeycode {
                action: KeyAction::Down,
                keycode: 24,
                repeat: 0,
                meta_state: 0,
            },
            ControlMessage::InjectText {
                text: "héllo".into(),
            },
            ControlMessage::InjectTouch {
                action: MotionAction::Down,
                pointer_id: 0xFFFF_FFFF_FFFF_FFFF,
                x: 100,
                y: 200,
                screen_width: 1080,
                screen_height: 1920,
                pressure: 1.0,
                action_button: 1,
                buttons: 1,
            },
            ControlMessage::InjectScroll {
                x: 50,
                y: 60,
                screen_width: 1080,
                screen_height: 1920,
                h_scroll: 0.0,
                v_scroll: -16.0,
                buttons: 0,
            },
            ControlMessage::BackOrScreenOn {
                action: KeyAction::Up,
            },
            ControlMessage::ExpandNotificationPanel,
            ControlMessage::ExpandSettingsPanel,
            ControlMessage::CollapsePanels,
            ControlMessage::GetClipboard {
                copy_key: CopyKey::Copy,
            },
            ControlMessage::SetClipboard {
                sequence: 7,
                paste: true,
                text: "clip".into(),
            },
            ControlMessage::SetScreenPowerMode {
                mode: ScreenPowerMode::Off,
            },
            ControlMessage::RotateDevice,
        ]
    }

    #[test]
    fn encoded_len_is_exact_for_every_variant() {
        for msg in all_variants() {
            let buf = encode(&msg);
            assert_eq!(buf.len(), msg.encoded_len(), "length mismatch for {msg:?}");
        }
    }

    #[test]
    fn tags_are_contiguous() {
        let tags: Vec<u8> = all_variants().iter().map(ControlMessage::tag).collect();
        assert_eq!(tags, (0..12).collect::<Vec<u8>>());
    }

    #[test]
    fn keycode_layout() {
        let buf = encode(&ControlMessage::InjectKeycode {
            action: KeyAction::Down,
            keycode: 24,
            repeat: 2,
            meta_state: 0x41,
        });
        assert_eq!(buf.len(), 14);
        assert_eq!(buf[0], 0);
        assert_eq!(buf[1], 0); // action
        assert_eq!(&buf[2..6], &24u32.to_be_bytes());
        assert_eq!(&buf[6..10], &2u32.to_be_bytes());
        assert_eq!(&buf[10..14], &0x41u32.to_be_bytes());
    }

    #[test]
    fn text_is_length_prefixed_utf8() {
        let buf = encode(&ControlMessage::InjectText {
            text: "héllo".into(),
        });
        let bytes = "héllo".as_bytes();
        assert_eq!(buf[0], 1);
        assert_eq!(&buf[1..5], &(bytes.len() as u32).to_be_bytes());
        assert_eq!(&buf[5..], bytes);
    }

    #[test]
    fn touch_pressure_is_fixed_point() {
        let buf = encode(&ControlMessage::InjectTouch {
            action: MotionAction::Down,
            pointer_id: 1,
            x: 0,
            y: 0,
            screen_width: 1080,
            screen_height: 1920,
            pressure: 1.0,
            action_button: 0,
            buttons: 0,
        });
        assert_eq!(buf.len(), 32);
        // pressure lives after tag(1) action(1) pointer(8) x(4) y(4) w(2) h(2)
        assert_eq!(&buf[22..24], &65535u16.to_be_bytes());
    }

    #[test]
    fn scroll_steps_divided_and_clamped() {
        let buf = encode(&ControlMessage::InjectScroll {
            x: 0,
            y: 0,
            screen_width: 100,
            screen_height: 100,
            h_scroll: 0.0,
            v_scroll: -16.0, // one full step down → -1.0 after division
            buttons: 0,
        });
        assert_eq!(buf.len(), 21);
        let v = i16::from_be_bytes([buf[15], buf[16]]);
        assert_eq!(v, -32767);
    }

    #[test]
    fn set_clipboard_layout() {
        let buf = encode(&ControlMessage::SetClipboard {
            sequence: 42,
            paste: true,
            text: "ab".into(),
        });
        assert_eq!(buf[0], 9);
        assert_eq!(&buf[1..9], &42u64.to_be_bytes());
        assert_eq!(buf[9], 1);
        assert_eq!(&buf[10..14], &2u32.to_be_bytes());
        assert_eq!(&buf[14..], b"ab");
    }

    #[test]
    fn parameterless_messages_are_one_byte() {
        for msg in [
            ControlMessage::ExpandNotificationPanel,
            ControlMessage::ExpandSettingsPanel,
            ControlMessage::CollapsePanels,
            ControlMessage::RotateDevice,
        ] {
            assert_eq!(encode(&msg).len(), 1);
        }
    }
}
