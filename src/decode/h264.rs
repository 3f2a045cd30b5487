//! OpenH264-backed [`VideoDecoder`] implementation.
//!
//! Wraps the Cisco decoder behind the narrow submit/close seam. The
//! library hands back planar YUV with per-frame dimensions and does
//! the RGB conversion itself, so the "rebuild conversion state on
//! dimension change" concern collapses into a per-frame packed-RGB
//! write sized from the frame.

use openh264::decoder::Decoder;
use openh264::formats::YUVSource;
use tracing::debug;

use crate::decode::{RgbFrame, VideoDecoder};
use crate::error::MirrorError;

// ── OpenH264Decoder ──────────────────────────────────────────────

/// H.264 decoder over an openh264 session.
pub struct OpenH264Decoder {
    inner: Option<Decoder>,
}

impl OpenH264Decoder {
    /// Open a decoder session.
    pub fn new() -> Result<Self, MirrorError> {
        let inner = Decoder::new().map_err(|e| MirrorError::Decode(e.to_string()))?;
        debug!("openh264 decoder session opened");
        Ok(Self { inner: Some(inner) })
    }
}

impl VideoDecoder for OpenH264Decoder {
    fn submit(&mut self, data: &[u8]) -> Result<Vec<RgbFrame>, MirrorError> {
        let decoder = self
            .inner
            .as_mut()
            .ok_or_else(|| MirrorError::Decode("decoder is closed".into()))?;

        // One access unit in, zero or one frame out; the codec
        // buffers until it has a displayable picture.
        match decoder.decode(data) {
            Ok(Some(yuv)) => {
                let (width, height) = yuv.dimensions();
                let mut rgb = vec![0u8; width * height * 3];
                yuv.write_rgb8(&mut rgb);
                Ok(vec![RgbFrame {
                    width: width as u32,
                    height: height as u32,
                    data: rgb,
                }])
            }
            Ok(None) => Ok(Vec::new()),
            Err(e) => Err(MirrorError::Decode(e.to_string())),
        }
    }

    fn close(&mut self) {
        if self.inner.take().is_some() {
            debug!("openh264 decoder session closed");
        }
    }
}

impl Drop for OpenH264Decoder {
    fn drop(&mut self) {
        self.close();
    }
}
