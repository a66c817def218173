//! Unix Socket Client Transport
//!
//! Sender side of the local relay protocol. Holds at most one connection,
//! opened lazily on the first `send` and reopened on the first `send` after a
//! failure.
//!
//! # Connection State
//!
//! ```text
//!                 connect ok
//!  Unconnected ───────────────► Connected
//!       ▲  │                        │
//!       │  │ connect failed         │ write failed (policy = Reset)
//!       │  ▼                        │ disconnect()
//!   (report dropped)  ◄─────────────┘
//! ```
//!
//! The socket is non-blocking from before `connect` is issued. A connect or
//! write that would block counts as a failure for that attempt; nothing here
//! ever waits on the relay.

use std::io::{self, Write};
use std::os::unix::io::AsRawFd;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use nix::sys::socket::{connect, socket, AddressFamily, SockFlag, SockType, UnixAddr};
use serde::{Deserialize, Serialize};

use crate::dsn::Dsn;
use crate::scope::{Scope, SCOPE_PROJECT, SCOPE_PUBLIC_KEY, SCOPE_SECRET_KEY, SCOPE_SERVERS};
use crate::transport::frame::{self, HEADER_SIZE};
use crate::transport::observer::{DeliveryEvent, DeliveryObserver, DropReason};
use crate::transport::traits::{Headers, Transport, TransportError};

#[cfg(any(target_os = "linux", target_os = "android"))]
const SOCKET_FLAGS: SockFlag = SockFlag::SOCK_CLOEXEC;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SOCKET_FLAGS: SockFlag = SockFlag::empty();

/// What to do with the connection after a failed or short write
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteFailurePolicy {
    /// Discard the connection; the next `send` reconnects
    #[default]
    Reset,
    /// Keep the connection and keep writing to it
    Ignore,
}

impl FromStr for WriteFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reset" => Ok(Self::Reset),
            "ignore" => Ok(Self::Ignore),
            other => Err(format!(
                "unknown write failure policy '{other}' (expected 'reset' or 'ignore')"
            )),
        }
    }
}

#[derive(Debug, Default)]
enum ConnectionState {
    #[default]
    Unconnected,
    Connected(UnixStream),
}

/// Best-effort report delivery over a local Unix domain socket
///
/// Each report is written as one frame: a native-endian `u32` length prefix
/// followed by the payload. See [`frame`](crate::transport::frame).
pub struct UnixSocketTransport {
    /// Path to the relay's socket
    socket_path: PathBuf,
    state: ConnectionState,
    write_failure: WriteFailurePolicy,
    observer: Option<Arc<dyn DeliveryObserver>>,
}

impl std::fmt::Debug for UnixSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnixSocketTransport")
            .field("socket_path", &self.socket_path)
            .field("state", &self.state)
            .field("write_failure", &self.write_failure)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl UnixSocketTransport {
    /// DSN scheme served by this transport
    pub const SCHEME: &'static str = "unix";

    /// Create a transport for a `unix://` DSN
    ///
    /// Nothing is connected here; the socket path does not have to exist yet.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::UnsupportedScheme` if the DSN scheme is not
    /// `unix`, or `TransportError::InvalidDsn` if it has no socket path.
    pub fn new(dsn: &Dsn) -> Result<Self, TransportError> {
        if dsn.scheme() != Self::SCHEME {
            return Err(TransportError::UnsupportedScheme {
                expected: Self::SCHEME,
                found: dsn.scheme().to_string(),
            });
        }

        let socket_path = dsn
            .socket_path()
            .ok_or_else(|| TransportError::InvalidDsn(dsn.as_str().to_string()))?;

        Ok(Self::with_socket_path(socket_path))
    }

    /// Create a transport for a socket path directly, bypassing the DSN
    pub fn with_socket_path(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            state: ConnectionState::Unconnected,
            write_failure: WriteFailurePolicy::default(),
            observer: None,
        }
    }

    /// Attach an observer notified of every delivery event
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn DeliveryObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Choose what happens to the connection after a failed write
    #[must_use]
    pub fn with_write_failure_policy(mut self, policy: WriteFailurePolicy) -> Self {
        self.write_failure = policy;
        self
    }

    /// Get the socket path
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Get the write failure policy
    pub fn write_failure_policy(&self) -> WriteFailurePolicy {
        self.write_failure
    }

    /// Close the current connection, if any
    ///
    /// The next `send` opens a fresh one.
    pub fn disconnect(&mut self) {
        if let ConnectionState::Connected(_) = std::mem::take(&mut self.state) {
            tracing::debug!(path = ?self.socket_path, "Disconnected from relay");
        }
    }

    /// Return the live connection, connecting first if there is none
    ///
    /// A failed attempt leaves no socket behind: the partially created one is
    /// closed before returning.
    pub(crate) fn ensure_connected(&mut self) -> Result<&mut UnixStream, TransportError> {
        if let ConnectionState::Unconnected = self.state {
            match connect_nonblocking(&self.socket_path) {
                Ok(stream) => {
                    tracing::debug!(path = ?self.socket_path, "Connected to relay");
                    self.state = ConnectionState::Connected(stream);
                    self.notify(&DeliveryEvent::Connected);
                }
                Err(e) => {
                    self.notify(&DeliveryEvent::ConnectFailed { kind: e.kind() });
                    return Err(TransportError::ConnectionFailed(format!(
                        "Failed to connect to {:?}: {}",
                        self.socket_path, e
                    )));
                }
            }
        }

        match &mut self.state {
            ConnectionState::Connected(stream) => Ok(stream),
            ConnectionState::Unconnected => {
                Err(TransportError::InvalidState("Not connected".to_string()))
            }
        }
    }

    fn notify(&self, event: &DeliveryEvent) {
        if let Some(observer) = &self.observer {
            observer.on_event(event);
        }
    }
}

impl Transport for UnixSocketTransport {
    fn scheme(&self) -> &'static str {
        Self::SCHEME
    }

    /// Write one frame to the relay
    ///
    /// Headers are ignored; the relay attaches its own metadata.
    fn send(&mut self, data: &[u8], _headers: &Headers) {
        let prefix = match frame::encode_length(data.len()) {
            Ok(prefix) => prefix,
            Err(e) => {
                tracing::warn!(error = %e, "Report cannot be framed, dropping");
                self.notify(&DeliveryEvent::Dropped {
                    reason: DropReason::PayloadTooLarge,
                    bytes: data.len(),
                });
                return;
            }
        };

        let outcome = self
            .ensure_connected()
            .map(|stream| write_frame(stream, &prefix, data));

        match outcome {
            Err(e) => {
                tracing::debug!(error = %e, bytes = data.len(), "Relay unreachable, dropping report");
                self.notify(&DeliveryEvent::Dropped {
                    reason: DropReason::NotConnected,
                    bytes: data.len(),
                });
            }
            Ok(Ok(())) => {
                self.notify(&DeliveryEvent::Sent {
                    bytes: HEADER_SIZE + data.len(),
                });
            }
            Ok(Err(e)) => {
                let disconnected = self.write_failure == WriteFailurePolicy::Reset;
                tracing::warn!(
                    error = %e,
                    path = ?self.socket_path,
                    bytes = data.len(),
                    disconnected,
                    "Write to relay failed"
                );
                if disconnected {
                    self.disconnect();
                }
                self.notify(&DeliveryEvent::WriteFailed {
                    kind: e.kind(),
                    disconnected,
                });
            }
        }
    }

    fn compute_scope(&self, dsn: &Dsn, mut scope: Scope) -> Result<Scope, TransportError> {
        let invalid = || TransportError::InvalidDsn(dsn.as_str().to_string());

        let project = dsn.hostname().ok_or_else(invalid)?;
        let public_key = dsn.username().ok_or_else(invalid)?;
        let secret_key = dsn.password().ok_or_else(invalid)?;

        scope.set(SCOPE_SERVERS, vec![dsn.as_str()]);
        scope.set(SCOPE_PROJECT, project);
        scope.set(SCOPE_PUBLIC_KEY, public_key);
        scope.set(SCOPE_SECRET_KEY, secret_key);
        Ok(scope)
    }

    fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Connected(_))
    }
}

/// Open a stream socket, switch it to non-blocking mode, then connect
///
/// Dropping the stream on any error path closes the descriptor.
fn connect_nonblocking(path: &Path) -> io::Result<UnixStream> {
    let addr = UnixAddr::new(path)?;
    let fd = socket(AddressFamily::Unix, SockType::Stream, SOCKET_FLAGS, None)?;

    let stream = UnixStream::from(fd);
    stream.set_nonblocking(true)?;
    connect(stream.as_raw_fd(), &addr)?;

    Ok(stream)
}

/// Write the prefix and the payload as two separate writes
///
/// Each chunk gets exactly one `write` call. A short write is reported as an
/// error rather than retried: the frame on the wire is already broken.
fn write_frame(stream: &mut UnixStream, prefix: &[u8], data: &[u8]) -> io::Result<()> {
    write_chunk(stream, prefix)?;
    write_chunk(stream, data)
}

fn write_chunk(stream: &mut UnixStream, chunk: &[u8]) -> io::Result<()> {
    if chunk.is_empty() {
        return Ok(());
    }

    let written = stream.write(chunk)?;
    if written < chunk.len() {
        return Err(io::Error::new(
            io::ErrorKind::WriteZero,
            format!("short write: {written} of {} bytes", chunk.len()),
        ));
    }
    Ok(())
}
