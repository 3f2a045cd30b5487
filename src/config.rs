//! Server launch configuration.

// ── ServerConfig ─────────────────────────────────────────────────

/// Immutable snapshot of the remote server configuration, taken at
/// session start and turned into the launch argument list by
/// [`ServerManager`](crate::server::ServerManager).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum output dimension in pixels (0 = unlimited).
    pub max_size: u32,
    /// Video bit rate in bits per second.
    pub bit_rate: u32,
    /// Maximum frames per second.
    pub max_fps: u32,
    /// Video codec name passed to the server (e.g. "h264").
    pub video_codec: String,
    /// Lock the video orientation (−1 = unlocked).
    pub lock_video_orientation: i32,
    /// Keep the device awake while mirroring.
    pub stay_awake: bool,
    /// Render touch feedback on the device screen.
    pub show_touches: bool,
    /// Synchronize the device clipboard automatically.
    pub clipboard_autosync: bool,
    /// Turn the screen on when mirroring starts.
    pub power_on: bool,
    /// Turn the screen off when the session closes.
    pub power_off_on_close: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_size: 0,
            bit_rate: 8_000_000,
            max_fps: 60,
            video_codec: "h264".to_string(),
            lock_video_orientation: -1,
            stay_awake: true,
            show_touches: false,
            clipboard_autosync: true,
            power_on: true,
            power_off_on_close: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bit_rate, 8_000_000);
        assert_eq!(cfg.lock_video_orientation, -1);
        assert!(cfg.stay_awake);
        assert!(!cfg.show_touches);
    }
}
