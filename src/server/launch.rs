//! Remote launch command construction and console-output parsing.

use crate::config::ServerConfig;

/// Where the server binary lives on the device.
pub const SERVER_PATH_ON_DEVICE: &str = "/data/local/tmp/scrcpy-server.jar";
/// Abstract socket name all forwards bind to.
pub const SOCKET_NAME: &str = "scrcpy";
/// Version marker the client sends by default. The server refuses to
/// start when this does not match its own version; see
/// [`parse_version_mismatch`].
pub const CLIENT_VERSION: &str = "2.4";

/// Build the argument list for the remote server process.
///
/// The first argument is the bare client-version marker; everything
/// else is `key=value`.
pub fn build_server_args(version: &str, config: &ServerConfig, audio: bool) -> Vec<String> {
    let mut args = vec![
        version.to_string(),
        "log_level=info".to_string(),
        "video=true".to_string(),
        format!("audio={audio}"),
        "control=true".to_string(),
    ];

    if config.max_size > 0 {
        args.push(format!("max_size={}", config.max_size));
    }
    args.push(format!("video_bit_rate={}", config.bit_rate));
    args.push(format!("max_fps={}", config.max_fps));
    args.push(format!("video_codec={}", config.video_codec));
    if config.lock_video_orientation >= 0 {
        args.push(format!(
            "lock_video_orientation={}",
            config.lock_video_orientation
        ));
    }
    args.push("tunnel_forward=true".to_string());
    if config.show_touches {
        args.push("show_touches=true".to_string());
    }
    if config.stay_awake {
        args.push("stay_awake=true".to_string());
    }
    if config.clipboard_autosync {
        args.push("clipboard_autosync=true".to_string());
    }
    if config.power_on {
        args.push("power_on=true".to_string());
    }
    if config.power_off_on_close {
        args.push("power_off_on_close=true".to_string());
    }

    args
}

/// Build the full remote shell invocation.
pub fn build_server_command(version: &str, config: &ServerConfig, audio: bool) -> String {
    format!(
        "CLASSPATH={} app_process / com.genymobile.scrcpy.Server {}",
        SERVER_PATH_ON_DEVICE,
        build_server_args(version, config, audio).join(" ")
    )
}

/// Recognize the server's version-refusal line and extract both
/// versions.
///
/// The server prints a line of the form
/// `The server version (2.4) does not match the client (2.5)`;
/// returns `(server_version, client_version)` when matched.
pub fn parse_version_mismatch(line: &str) -> Option<(String, String)> {
    const MARKER: &str = "does not match the client";
    let idx = line.find(MARKER)?;
    let server = last_parenthesized(&line[..idx])?;
    let client = first_parenthesized(&line[idx + MARKER.len()..])?;
    Some((server.to_string(), client.to_string()))
}

fn first_parenthesized(s: &str) -> Option<&str> {
    let open = s.find('(')?;
    let close = s[open + 1..].find(')')?;
    Some(&s[open + 1..open + 1 + close])
}

fn last_parenthesized(s: &str) -> Option<&str> {
    let open = s.rfind('(')?;
    let close = s[open + 1..].find(')')?;
    Some(&s[open + 1..open + 1 + close])
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_carry_version_first() {
        let args = build_server_args(CLIENT_VERSION, &ServerConfig::default(), true);
        assert_eq!(args[0], "2.4");
        assert!(args.contains(&"log_level=info".to_string()));
        assert!(args.contains(&"audio=true".to_string()));
        assert!(args.contains(&"control=true".to_string()));
        assert!(args.contains(&"tunnel_forward=true".to_string()));
        assert!(args.contains(&"video_bit_rate=8000000".to_string()));
    }

    #[test]
    fn optional_args_respect_config() {
        let config = ServerConfig {
            max_size: 1920,
            lock_video_orientation: 0,
            show_touches: true,
            stay_awake: false,
            power_off_on_close: true,
            ..ServerConfig::default()
        };
        let args = build_server_args(CLIENT_VERSION, &config, false);
        assert!(args.contains(&"max_size=1920".to_string()));
        assert!(args.contains(&"lock_video_orientation=0".to_string()));
        assert!(args.contains(&"show_touches=true".to_string()));
        assert!(args.contains(&"audio=false".to_string()));
        assert!(args.contains(&"power_off_on_close=true".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("stay_awake")));
    }

    #[test]
    fn unlimited_size_is_omitted() {
        let args = build_server_args(CLIENT_VERSION, &ServerConfig::default(), true);
        assert!(!args.iter().any(|a| a.starts_with("max_size")));
    }

    #[test]
    fn command_wraps_classpath_invocation() {
        let cmd = build_server_command(CLIENT_VERSION, &ServerConfig::default(), true);
        assert!(cmd.starts_with("CLASSPATH=/data/local/tmp/scrcpy-server.jar app_process / "));
        assert!(cmd.contains("com.genymobile.scrcpy.Server 2.4 "));
    }

    #[test]
    fn mismatch_line_parses_both_versions() {
        let line = "The server version (2.4) does not match the client (2.5)";
        let (server, client) = parse_version_mismatch(line).unwrap();
        assert_eq!(server, "2.4");
        assert_eq!(client, "2.5");
    }

    #[test]
    fn unrelated_lines_do_not_match() {
        assert!(parse_version_mismatch("[server] INFO: Device: Pixel 7").is_none());
        assert!(parse_version_mismatch("version (2.4) but no marker").is_none());
    }

    #[test]
    fn mismatch_without_parens_is_ignored() {
        assert!(parse_version_mismatch("server does not match the client at all").is_none());
    }
}
