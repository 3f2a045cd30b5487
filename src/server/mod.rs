//! Remote server lifecycle management.
//!
//! Drives the device-side server from nothing to open TCP tunnels:
//!
//! 1. push the server binary to the device;
//! 2. allocate local ports (video, then audio if the device supports
//!    forwarding it, then control) and reverse-forward each to the
//!    server's abstract socket;
//! 3. launch the remote process and wait out a short grace period;
//! 4. repair a version mismatch once by relaunching with the
//!    server-reported marker;
//! 5. expose the ready [`PortTriple`] — or fail cleanly, rolling
//!    every forward and the process back to idle.
//!
//! All bridge calls are bounded by explicit timeouts so a stuck
//! remote call degrades to a reported error rather than a hang.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use crate::adb::{DeviceBridge, RemoteProcess, RemoteShell};
use crate::config::ServerConfig;
use crate::error::MirrorError;

pub mod launch;
pub mod ports;

pub use launch::{
    CLIENT_VERSION, SERVER_PATH_ON_DEVICE, SOCKET_NAME, build_server_args, build_server_command,
    parse_version_mismatch,
};
pub use ports::{PORT_BASE, PORT_RANGE, find_free_port};

// ── Timeouts ─────────────────────────────────────────────────────

const PROPERTY_TIMEOUT: Duration = Duration::from_secs(5);
const PUSH_TIMEOUT: Duration = Duration::from_secs(30);
const FORWARD_TIMEOUT: Duration = Duration::from_secs(5);
const SPAWN_TIMEOUT: Duration = Duration::from_secs(5);
const KILL_TIMEOUT: Duration = Duration::from_secs(5);

/// How long the Starting state may persist before the session is
/// stopped and an error reported.
pub const START_TIMEOUT: Duration = Duration::from_secs(10);
/// Grace period after launch; if the process is still alive and no
/// error has been seen, Starting is promoted to Running.
pub const START_GRACE: Duration = Duration::from_secs(1);

/// Minimum Android API level for audio forwarding.
pub const AUDIO_MIN_SDK: u32 = 30;

// ── ServerState ──────────────────────────────────────────────────

/// Lifecycle of one mirroring session. Transitions happen only
/// inside [`ServerManager`]; no operation other than `stop` is valid
/// outside {Idle, Running}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerState {
    #[default]
    Idle,
    Pushing,
    Starting,
    Running,
    Stopping,
    Error,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Pushing => write!(f, "Pushing"),
            Self::Starting => write!(f, "Starting"),
            Self::Running => write!(f, "Running"),
            Self::Stopping => write!(f, "Stopping"),
            Self::Error => write!(f, "Error"),
        }
    }
}

// ── PortTriple ───────────────────────────────────────────────────

/// The forwarded local ports for one session. `audio == 0` means
/// audio forwarding is disabled. The remote server accepts its
/// connections in exactly this order: video, audio, control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortTriple {
    pub video: u16,
    pub audio: u16,
    pub control: u16,
}

// ── ServerEvent ──────────────────────────────────────────────────

/// Notifications published by [`ServerManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    StateChanged(ServerState),
    /// Bring-up complete; streams may connect.
    Ready(PortTriple),
    /// A line of remote console output (after promotion to Running).
    ServerOutput(String),
    Stopped,
    Error(String),
}

// ── ServerManager ────────────────────────────────────────────────

/// Orchestrates the remote server through a [`DeviceBridge`].
pub struct ServerManager {
    bridge: Arc<dyn DeviceBridge>,
    server_path: PathBuf,
    serial: String,
    config: ServerConfig,
    state: ServerState,
    ports: PortTriple,
    /// Established forwards, in allocation order.
    forwards: Vec<u16>,
    process: Option<Box<dyn RemoteProcess>>,
    output_drain: Option<JoinHandle<()>>,
    client_version: String,
    audio_enabled: bool,
    event_tx: mpsc::UnboundedSender<ServerEvent>,
}

impl ServerManager {
    /// Create a manager around a bridge and the local path of the
    /// server binary. Returns the receiver half of its event channel.
    pub fn new(
        bridge: Arc<dyn DeviceBridge>,
        server_path: impl Into<PathBuf>,
    ) -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (
            Self {
                bridge,
                server_path: server_path.into(),
                serial: String::new(),
                config: ServerConfig::default(),
                state: ServerState::Idle,
                ports: PortTriple::default(),
                forwards: Vec::new(),
                process: None,
                output_drain: None,
                client_version: CLIENT_VERSION.to_string(),
                audio_enabled: false,
                event_tx,
            },
            event_rx,
        )
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn ports(&self) -> PortTriple {
        self.ports
    }

    pub fn audio_enabled(&self) -> bool {
        self.audio_enabled
    }

    /// The version marker the server will be (re)launched with.
    pub fn client_version(&self) -> &str {
        &self.client_version
    }

    // ── start ────────────────────────────────────────────────────

    /// Bring the remote server up and resolve to the forwarded ports.
    ///
    /// Runs the full Pushing → Starting → Running sequence, including
    /// the grace period and at most one version-mismatch relaunch.
    /// On any failure the session is rolled back to Idle before the
    /// error is returned.
    pub async fn start(
        &mut self,
        serial: &str,
        config: ServerConfig,
    ) -> Result<PortTriple, MirrorError> {
        if self.state != ServerState::Idle {
            return Err(MirrorError::InvalidState("start requires the Idle state"));
        }
        if serial.is_empty() {
            return Err(MirrorError::Bringup("device serial is empty".into()));
        }
        if !tokio::fs::try_exists(&self.server_path).await.unwrap_or(false) {
            return Err(MirrorError::Bringup(format!(
                "server binary not found at {}",
                self.server_path.display()
            )));
        }

        self.serial = serial.to_string();
        self.config = config;

        // The audio capability decides how many tunnels are needed,
        // so it must be known before port allocation.
        let property = bounded(
            PROPERTY_TIMEOUT,
            self.bridge.get_property(serial, "ro.build.version.sdk"),
        )
        .await;
        self.audio_enabled = match property {
            Ok(value) => {
                let sdk = value.trim().parse::<u32>().unwrap_or(0);
                debug!(sdk, "device api level");
                sdk >= AUDIO_MIN_SDK
            }
            Err(e) => return self.fail(e).await,
        };

        self.set_state(ServerState::Pushing);
        let local_path = self.server_path.to_string_lossy().into_owned();
        let pushed = bounded(
            PUSH_TIMEOUT,
            self.bridge.push(serial, &local_path, SERVER_PATH_ON_DEVICE),
        )
        .await;
        if let Err(e) = pushed {
            return self.fail(e).await;
        }

        let forwarded = self.allocate_and_forward().await;
        let triple = match forwarded {
            Ok(triple) => triple,
            Err(e) => return self.fail(e).await,
        };

        self.set_state(ServerState::Starting);
        let launched = self.launch_and_wait().await;
        let shell = match launched {
            Ok(shell) => shell,
            Err(e) => return self.fail(e).await,
        };

        self.process = Some(shell.process);
        self.output_drain = Some(spawn_output_drain(shell.output, self.event_tx.clone()));
        self.ports = triple;
        self.set_state(ServerState::Running);
        info!(
            video = triple.video,
            audio = triple.audio,
            control = triple.control,
            "server ready"
        );
        let _ = self.event_tx.send(ServerEvent::Ready(triple));
        Ok(triple)
    }

    /// Allocate local ports in wire order and establish one forward
    /// per port. On failure every forward from this attempt is torn
    /// down before the error surfaces.
    async fn allocate_and_forward(&mut self) -> Result<PortTriple, MirrorError> {
        let video = find_free_port(PORT_BASE).await?;
        let audio = if self.audio_enabled {
            find_free_port(video + 1).await?
        } else {
            0
        };
        let control = find_free_port(if audio > 0 { audio + 1 } else { video + 1 }).await?;
        debug!(video, audio, control, "allocated local ports");

        let required: Vec<u16> = [video, audio, control]
            .into_iter()
            .filter(|&p| p > 0)
            .collect();

        for port in required {
            let result = bounded(
                FORWARD_TIMEOUT,
                self.bridge.forward(&self.serial, port, SOCKET_NAME),
            )
            .await;
            match result {
                Ok(()) => self.forwards.push(port),
                Err(e) => {
                    self.remove_forwards().await;
                    return Err(e);
                }
            }
        }

        Ok(PortTriple {
            video,
            audio,
            control,
        })
    }

    /// Launch the remote process and drive the Starting phase:
    /// console output scanning, the promotion grace timer and the
    /// overall start deadline, plus the single version-mismatch
    /// relaunch.
    async fn launch_and_wait(&mut self) -> Result<RemoteShell, MirrorError> {
        let mut shell = self.spawn_server().await?;
        let mut retried: Option<String> = None;

        let deadline = sleep_until(Instant::now() + START_TIMEOUT);
        tokio::pin!(deadline);
        let grace = sleep_until(Instant::now() + START_GRACE);
        tokio::pin!(grace);
        let mut grace_armed = true;

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    let _ = bounded(KILL_TIMEOUT, shell.process.kill()).await;
                    return Err(MirrorError::Timeout(START_TIMEOUT));
                }
                _ = &mut grace, if grace_armed => {
                    if shell.process.is_alive() {
                        return Ok(shell);
                    }
                    // Died before promotion. The reason usually trails
                    // on the console a moment later; keep scanning
                    // output until the channel closes or the deadline
                    // expires.
                    grace_armed = false;
                }
                line = shell.output.recv() => match line {
                    Some(line) => {
                        debug!(line = %line, "server output");
                        let Some((server, client)) = parse_version_mismatch(&line) else {
                            continue;
                        };
                        if retried.is_some()
                            || server.is_empty()
                            || server == self.client_version
                        {
                            let _ = bounded(KILL_TIMEOUT, shell.process.kill()).await;
                            return Err(MirrorError::VersionMismatch { server, client });
                        }
                        warn!(
                            server = %server,
                            client = %self.client_version,
                            "version mismatch, relaunching with server marker"
                        );
                        let _ = bounded(KILL_TIMEOUT, shell.process.kill()).await;
                        self.client_version = server.clone();
                        retried = Some(server);
                        shell = self.spawn_server().await?;
                        grace.as_mut().reset(Instant::now() + START_GRACE);
                        grace_armed = true;
                    }
                    None => {
                        return Err(MirrorError::Bringup(
                            "server process exited during startup".into(),
                        ));
                    }
                },
            }
        }
    }

    async fn spawn_server(&mut self) -> Result<RemoteShell, MirrorError> {
        let command =
            build_server_command(&self.client_version, &self.config, self.audio_enabled);
        debug!(command = %command, "launching remote server");
        bounded(SPAWN_TIMEOUT, self.bridge.spawn_shell(&self.serial, &command)).await
    }

    // ── stop ─────────────────────────────────────────────────────

    /// Tear the session down. Idempotent and callable from every
    /// state: kills the remote process, removes forwards in reverse
    /// allocation order, resets ports and returns to Idle. From Idle
    /// there is nothing to tear down and no event is emitted.
    pub async fn stop(&mut self) {
        if self.state == ServerState::Idle {
            return;
        }
        self.set_state(ServerState::Stopping);

        if let Some(handle) = self.output_drain.take() {
            handle.abort();
        }

        if let Some(mut process) = self.process.take() {
            if let Err(e) = bounded(KILL_TIMEOUT, process.kill()).await {
                warn!(error = %e, "failed to kill remote server process");
            }
        }

        self.remove_forwards().await;
        self.ports = PortTriple::default();
        self.set_state(ServerState::Idle);
        let _ = self.event_tx.send(ServerEvent::Stopped);
    }

    /// Remove established forwards, most recent first.
    async fn remove_forwards(&mut self) {
        while let Some(port) = self.forwards.pop() {
            if let Err(e) = bounded(
                FORWARD_TIMEOUT,
                self.bridge.remove_forward(&self.serial, port),
            )
            .await
            {
                warn!(port, error = %e, "failed to remove forward");
            }
        }
    }

    /// Route a bring-up failure through Error and `stop`, releasing
    /// everything before the error is returned.
    async fn fail(&mut self, err: MirrorError) -> Result<PortTriple, MirrorError> {
        error!(error = %err, "server bring-up failed");
        self.set_state(ServerState::Error);
        let _ = self.event_tx.send(ServerEvent::Error(err.to_string()));
        self.stop().await;
        Err(err)
    }

    fn set_state(&mut self, state: ServerState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "server state");
            self.state = state;
            let _ = self.event_tx.send(ServerEvent::StateChanged(state));
        }
    }
}

impl Drop for ServerManager {
    fn drop(&mut self) {
        if let Some(handle) = self.output_drain.take() {
            handle.abort();
        }
    }
}

/// Forward remaining console output to the event channel once the
/// session is Running.
fn spawn_output_drain(
    mut output: mpsc::UnboundedReceiver<String>,
    event_tx: mpsc::UnboundedSender<ServerEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(line) = output.recv().await {
            if event_tx.send(ServerEvent::ServerOutput(line)).is_err() {
                break;
            }
        }
    })
}

/// Bound a bridge call with an explicit deadline.
async fn bounded<T>(
    dur: Duration,
    fut: impl Future<Output = Result<T, MirrorError>>,
) -> Result<T, MirrorError> {
    tokio::time::timeout(dur, fut)
        .await
        .map_err(|_| MirrorError::Timeout(dur))?
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_display() {
        assert_eq!(ServerState::Idle.to_string(), "Idle");
        assert_eq!(ServerState::Pushing.to_string(), "Pushing");
        assert_eq!(ServerState::Starting.to_string(), "Starting");
        assert_eq!(ServerState::Running.to_string(), "Running");
        assert_eq!(ServerState::Stopping.to_string(), "Stopping");
        assert_eq!(ServerState::Error.to_string(), "Error");
    }

    #[test]
    fn default_ports_are_zero() {
        let triple = PortTriple::default();
        assert_eq!((triple.video, triple.audio, triple.control), (0, 0, 0));
    }

    #[test]
    fn default_state_is_idle() {
        assert_eq!(ServerState::default(), ServerState::Idle);
    }
}
