//! TCP client for the control channel.
//!
//! Outbound: one send operation per [`ControlMessage`] variant.
//! Inbound: device events (clipboard text, command acks) parsed by
//! [`ControlCodec`] on a spawned reader task and delivered on an
//! unbounded channel as they arrive.

use std::time::Duration;

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::control::codec::{ControlCodec, DeviceEvent};
use crate::control::message::{
    ControlMessage, CopyKey, KeyAction, MotionAction, ScreenPowerMode,
};
use crate::error::MirrorError;

/// Connect timeout for all protocol sockets.
pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ── ControlEvent ─────────────────────────────────────────────────

/// Notifications from the control channel reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    /// A parsed device→host message.
    Device(DeviceEvent),
    /// The reader hit a fatal condition (transport error or protocol
    /// desync). The stream is dead after this.
    Error(String),
    /// The remote closed the connection.
    Closed,
}

// ── ControlStream ────────────────────────────────────────────────

/// Framed TCP client for host→device commands and device→host events.
pub struct ControlStream {
    writer: SplitSink<Framed<TcpStream, ControlCodec>, ControlMessage>,
    cancel: CancellationToken,
    reader: Option<JoinHandle<()>>,
}

impl ControlStream {
    /// Connect to the forwarded control port.
    ///
    /// Returns the stream plus the receiver half of its event channel.
    pub async fn connect(
        host: &str,
        port: u16,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ControlEvent>), MirrorError> {
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port)))
            .await
            .map_err(|_| MirrorError::Timeout(CONNECT_TIMEOUT))??;
        debug!(host, port, "control stream connected");

        let (writer, mut read_half) = Framed::new(stream, ControlCodec).split();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let reader_cancel = cancel.clone();
        let reader = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = reader_cancel.cancelled() => break,
                    next = read_half.next() => match next {
                        Some(Ok(event)) => {
                            if event_tx.send(ControlEvent::Device(event)).is_err() {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "control stream read error");
                            let _ = event_tx.send(ControlEvent::Error(e.to_string()));
                            break;
                        }
                        None => {
                            let _ = event_tx.send(ControlEvent::Closed);
                            break;
                        }
                    },
                }
            }
        });

        Ok((
            Self {
                writer,
                cancel,
                reader: Some(reader),
            },
            event_rx,
        ))
    }

    /// Send an already-built message.
    pub async fn send(&mut self, msg: ControlMessage) -> Result<(), MirrorError> {
        self.writer.send(msg).await
    }

    // ── Per-variant send API ─────────────────────────────────────

    pub async fn send_keycode(
        &mut self,
        action: KeyAction,
        keycode: u32,
        repeat: u32,
        meta_state: u32,
    ) -> Result<(), MirrorError> {
        self.send(ControlMessage::InjectKeycode {
            action,
            keycode,
            repeat,
            meta_state,
        })
        .await
    }

    pub async fn send_text(&mut self, text: impl Into<String>) -> Result<(), MirrorError> {
        self.send(ControlMessage::InjectText { text: text.into() }).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn send_touch(
        &mut self,
        action: MotionAction,
        pointer_id: u64,
        x: u32,
        y: u32,
        screen_width: u16,
        screen_height: u16,
        pressure: f32,
        action_button: u32,
        buttons: u32,
    ) -> Result<(), MirrorError> {
        self.send(ControlMessage::InjectTouch {
            action,
            pointer_id,
            x,
            y,
            screen_width,
            screen_height,
            pressure,
            action_button,
            buttons,
        })
        .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn send_scroll(
        &mut self,
        x: u32,
        y: u32,
        screen_width: u16,
        screen_height: u16,
        h_scroll: f32,
        v_scroll: f32,
        buttons: u32,
    ) -> Result<(), MirrorError> {
        self.send(ControlMessage::InjectScroll {
            x,
            y,
            screen_width,
            screen_height,
            h_scroll,
            v_scroll,
            buttons,
        })
        .await
    }

    pub async fn send_back_or_screen_on(&mut self, action: KeyAction) -> Result<(), MirrorError> {
        self.send(ControlMessage::BackOrScreenOn { action }).await
    }

    pub async fn expand_notification_panel(&mut self) -> Result<(), MirrorError> {
        self.send(ControlMessage::ExpandNotificationPanel).await
    }

    pub async fn expand_settings_panel(&mut self) -> Result<(), MirrorError> {
        self.send(ControlMessage::ExpandSettingsPanel).await
    }

    pub async fn collapse_panels(&mut self) -> Result<(), MirrorError> {
        self.send(ControlMessage::CollapsePanels).await
    }

    pub async fn get_clipboard(&mut self, copy_key: CopyKey) -> Result<(), MirrorError> {
        self.send(ControlMessage::GetClipboard { copy_key }).await
    }

    pub async fn set_clipboard(
        &mut self,
        sequence: u64,
        text: impl Into<String>,
        paste: bool,
    ) -> Result<(), MirrorError> {
        self.send(ControlMessage::SetClipboard {
            sequence,
            paste,
            text: text.into(),
        })
        .await
    }

    pub async fn set_screen_power_mode(
        &mut self,
        mode: ScreenPowerMode,
    ) -> Result<(), MirrorError> {
        self.send(ControlMessage::SetScreenPowerMode { mode }).await
    }

    pub async fn rotate_device(&mut self) -> Result<(), MirrorError> {
        self.send(ControlMessage::RotateDevice).await
    }

    // ── Teardown ─────────────────────────────────────────────────

    /// Close the socket and join the reader task. No events are
    /// delivered after this returns.
    pub async fn disconnect(&mut self) {
        self.cancel.cancel();
        let _ = self.writer.close().await;
        if let Some(handle) = self.reader.take() {
            let _ = handle.await;
        }
        debug!("control stream disconnected");
    }
}
