//! Video channel: handshake parsing, Annex-B demux and the
//! socket→decoder pipeline.

pub mod handshake;
pub mod nal;
pub mod stream;

pub use handshake::{DeviceHandshake, HandshakeParser};
pub use nal::NalSplitter;
pub use stream::{VideoEvent, VideoStream};
