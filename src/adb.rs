//! Collaborator interface to the device bridge (ADB or equivalent).
//!
//! The mirror core never talks to a device directly: it needs exactly
//! three capabilities — copy a binary blob onto the device, tunnel
//! device-local sockets to host TCP ports, and run a remote shell
//! command with streamed output. Those are expressed here as a trait
//! so the core is testable with an in-memory fake and the real
//! subprocess wrapper lives outside this crate.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::MirrorError;

// ── DeviceBridge ─────────────────────────────────────────────────

/// The opaque device-side operations consumed by
/// [`ServerManager`](crate::server::ServerManager).
///
/// Implementations may block internally (e.g. wait on a subprocess);
/// the manager bounds every call with an explicit timeout.
#[async_trait]
pub trait DeviceBridge: Send + Sync {
    /// Copy a local file onto the device at `remote_path`.
    async fn push(
        &self,
        serial: &str,
        local_path: &str,
        remote_path: &str,
    ) -> Result<(), MirrorError>;

    /// Make the device-local abstract socket `socket_name` reachable
    /// as `local_port` on the host loopback interface.
    async fn forward(
        &self,
        serial: &str,
        local_port: u16,
        socket_name: &str,
    ) -> Result<(), MirrorError>;

    /// Remove a previously established forward.
    async fn remove_forward(&self, serial: &str, local_port: u16) -> Result<(), MirrorError>;

    /// Read a device property (`getprop`).
    async fn get_property(&self, serial: &str, key: &str) -> Result<String, MirrorError>;

    /// Run `command` in a remote shell, returning a handle with
    /// streamed console output.
    async fn spawn_shell(&self, serial: &str, command: &str) -> Result<RemoteShell, MirrorError>;
}

// ── RemoteShell ──────────────────────────────────────────────────

/// A running remote shell invocation: merged stdout/stderr lines plus
/// a process handle for liveness checks and termination.
pub struct RemoteShell {
    /// Merged console output, one line per message. The sender side
    /// is dropped when the remote process exits.
    pub output: mpsc::UnboundedReceiver<String>,
    /// Handle to the underlying process.
    pub process: Box<dyn RemoteProcess>,
}

/// Control handle for a spawned remote process.
///
/// `kill` owns the escalation policy: implementations terminate
/// gracefully first and force-kill after a short grace period.
#[async_trait]
pub trait RemoteProcess: Send {
    /// Terminate the remote process.
    async fn kill(&mut self) -> Result<(), MirrorError>;

    /// Whether the process is still running.
    fn is_alive(&self) -> bool;
}
