//! Local port allocation for reverse forwards.
//!
//! Ports are chosen by probing loopback binds starting at a fixed
//! base. Allocation order (video, then audio, then control) is a wire
//! requirement of the remote server, not an implementation detail —
//! the caller allocates in that order and connects in that order.

use tokio::net::TcpListener;

use crate::error::MirrorError;

/// First port probed for the video forward.
pub const PORT_BASE: u16 = 27183;
/// How many successive ports are probed before falling back to an
/// OS-assigned ephemeral port.
pub const PORT_RANGE: u16 = 100;

/// Find a free loopback TCP port at or after `start`.
///
/// Probes `start..start + PORT_RANGE`; when the range is exhausted
/// (or overflows), asks the OS for an ephemeral port instead.
pub async fn find_free_port(start: u16) -> Result<u16, MirrorError> {
    let end = start.saturating_add(PORT_RANGE);
    for port in start..end {
        if TcpListener::bind(("127.0.0.1", port)).await.is_ok() {
            return Ok(port);
        }
    }

    let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_start_when_free() {
        // An ephemeral port the OS just handed out is free again
        // once the probe listener is dropped.
        let probe = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let start = probe.local_addr().unwrap().port();
        drop(probe);

        let port = find_free_port(start).await.unwrap();
        assert_eq!(port, start);
    }

    #[tokio::test]
    async fn skips_occupied_port() {
        let occupied = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let start = occupied.local_addr().unwrap().port();

        let port = find_free_port(start).await.unwrap();
        assert_ne!(port, start);
    }

    #[tokio::test]
    async fn ephemeral_fallback_on_exhausted_range() {
        // A start so high the probe range overflows immediately.
        let port = find_free_port(u16::MAX).await.unwrap();
        assert!(port > 0);
    }
}
