//! Unix Socket Transport
//!
//! Delivers reports to a relay process on the same host over a Unix domain
//! stream socket. Stream sockets are used instead of datagrams because most
//! systems cap local datagram size at a few kilobytes.
//!
//! # Socket Location
//!
//! The sender takes the path from the DSN. The listener defaults to:
//!
//! Default: `$XDG_RUNTIME_DIR/report-relay/relay.sock`
//! Fallback: `/tmp/report-relay-$UID/relay.sock`
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐                    ┌──────────────────────┐
//! │  Reporting client    │                    │   Relay process      │
//! │                      │                    │                      │
//! │ UnixSocketTransport ─┼───────────────────►│ FrameListener        │
//! │  (non-blocking,      │    Unix socket     │  (tokio, one task    │
//! │   one connection)    │    relay.sock      │   per connection)    │
//! └──────────────────────┘                    └──────────────────────┘
//! ```

mod client;
mod listener;

pub use client::{UnixSocketTransport, WriteFailurePolicy};
pub use listener::{ConnectionId, FrameListener, ListenerStats, ReceivedFrame};

use std::path::PathBuf;

/// Get the default socket path for the relay listener
///
/// Uses `XDG_RUNTIME_DIR` if available (preferred), otherwise falls back
/// to `/tmp/report-relay-$UID/`.
#[must_use]
pub fn default_socket_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(runtime_dir)
            .join("report-relay")
            .join("relay.sock")
    } else {
        // SAFETY: getuid has no preconditions and cannot fail
        let uid = unsafe { libc::getuid() };
        PathBuf::from(format!("/tmp/report-relay-{uid}/relay.sock"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_socket_path() {
        let path = default_socket_path();
        assert!(path.to_string_lossy().contains("report-relay"));
        assert!(path.to_string_lossy().ends_with("relay.sock"));
    }
}
