//! # droidmirror
//!
//! Client core for the wire protocol of a device-side screen
//! mirroring server (scrcpy). This crate contains:
//!
//! - **Server lifecycle**: `ServerManager` — push the server binary,
//!   allocate ports, establish reverse forwards, launch and monitor
//!   the remote process (with one-shot version-mismatch repair)
//! - **Video**: `VideoStream` — device handshake parsing, Annex-B
//!   NAL demux and a dedicated decode context behind `VideoDecoder`
//! - **Audio**: `AudioStream` — raw PCM with bounded latency
//! - **Control**: `ControlMessage` / `ControlStream` — big-endian
//!   binary command injection and device events via `ControlCodec`
//! - **Bridge seam**: `DeviceBridge` — the opaque push/forward/shell
//!   capabilities the core consumes
//! - **Error**: `MirrorError` — typed, `thiserror`-based hierarchy
//!
//! The remote server accepts its connections in a fixed order:
//! video first, then audio when enabled, then control.

pub mod adb;
pub mod audio;
pub mod config;
pub mod control;
pub mod decode;
pub mod error;
pub mod server;
pub mod video;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use adb::{DeviceBridge, RemoteProcess, RemoteShell};
pub use audio::{AudioEvent, AudioStream};
pub use config::ServerConfig;
pub use control::{
    ControlCodec, ControlEvent, ControlMessage, ControlStream, CopyKey, DeviceEvent, KeyAction,
    MotionAction, ScreenPowerMode,
};
pub use decode::{DecoderStats, OpenH264Decoder, RgbFrame, VideoDecoder};
pub use error::MirrorError;
pub use server::{PortTriple, ServerEvent, ServerManager, ServerState};
pub use video::{DeviceHandshake, VideoEvent, VideoStream};
