//! Unix Socket Frame Listener
//!
//! Relay-side implementation of the local socket protocol. Accepts any
//! number of sender connections, decodes frames from each, and forwards the
//! payloads over a channel. What happens to them next (forwarding upstream,
//! logging, dumping) is up to the owner of the receiver.

use std::fmt;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;

use crate::transport::frame::{FrameDecoder, MAX_FRAME_SIZE};
use crate::transport::traits::TransportError;

/// Unique identifier for an accepted sender connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Create a new unique connection ID
    #[must_use]
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw numeric value
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One decoded report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFrame {
    /// Connection the frame arrived on
    pub connection: ConnectionId,
    /// Raw payload, length prefix stripped
    pub payload: Vec<u8>,
}

/// Counters for a running listener
#[derive(Debug, Default)]
pub struct ListenerStats {
    connections: AtomicU64,
    frames: AtomicU64,
    bytes: AtomicU64,
    decode_errors: AtomicU64,
}

impl ListenerStats {
    /// Connections accepted so far
    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }

    /// Frames decoded so far
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Payload bytes decoded so far
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Connections dropped because of an undecodable frame
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }
}

/// Relay-side listener for length-prefixed report frames
pub struct FrameListener {
    /// Path to the socket file
    socket_path: PathBuf,
    listener: UnixListener,
    max_frame_size: usize,
    stats: Arc<ListenerStats>,
}

impl FrameListener {
    /// Bind a listener at `socket_path`
    ///
    /// Creates the parent directory if needed, replaces a stale socket file
    /// and restricts the new socket to the owner (mode 0600). Must be called
    /// from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::IoError` if the directory, the stale file or
    /// the socket itself cannot be handled.
    pub fn bind(socket_path: impl Into<PathBuf>) -> Result<Self, TransportError> {
        let socket_path = socket_path.into();

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TransportError::IoError(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create directory {parent:?}: {e}"),
                ))
            })?;
        }

        if socket_path.exists() {
            tracing::warn!(path = ?socket_path, "Removing stale socket file");
            std::fs::remove_file(&socket_path).map_err(|e| {
                TransportError::IoError(std::io::Error::new(
                    e.kind(),
                    format!("Failed to remove old socket {socket_path:?}: {e}"),
                ))
            })?;
        }

        let listener = UnixListener::bind(&socket_path)?;
        std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o600))?;

        tracing::info!(path = ?socket_path, "Relay listening on Unix socket");

        Ok(Self {
            socket_path,
            listener,
            max_frame_size: MAX_FRAME_SIZE,
            stats: Arc::new(ListenerStats::default()),
        })
    }

    /// Reject frames larger than `max_frame_size` bytes
    #[must_use]
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Get the socket path
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Shared handle to the listener counters
    pub fn stats(&self) -> Arc<ListenerStats> {
        Arc::clone(&self.stats)
    }

    /// Accept connections until the receiving side of `tx` is dropped
    ///
    /// Each connection gets its own read task. The socket file is removed
    /// when this returns.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::IoError` if accepting fails.
    pub async fn serve(self, tx: mpsc::Sender<ReceivedFrame>) -> Result<(), TransportError> {
        loop {
            tokio::select! {
                () = tx.closed() => {
                    tracing::debug!("Frame receiver dropped, stopping listener");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, _addr) = accepted?;
                    let conn_id = ConnectionId::new();
                    self.stats.connections.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(conn_id = %conn_id, "Sender connected");

                    tokio::spawn(read_connection(
                        stream,
                        conn_id,
                        tx.clone(),
                        Arc::clone(&self.stats),
                        self.max_frame_size,
                    ));
                }
            }
        }
    }
}

impl Drop for FrameListener {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(error = %e, path = ?self.socket_path, "Failed to remove socket file");
            }
        }
    }
}

/// Read task: stream -> decoder -> tx
async fn read_connection(
    mut stream: UnixStream,
    conn_id: ConnectionId,
    tx: mpsc::Sender<ReceivedFrame>,
    stats: Arc<ListenerStats>,
    max_frame_size: usize,
) {
    let mut decoder = FrameDecoder::with_max_frame_size(max_frame_size);
    let mut buf = [0u8; 4096];

    loop {
        match stream.read(&mut buf).await {
            Ok(0) => {
                if decoder.available() > 0 {
                    tracing::warn!(
                        conn_id = %conn_id,
                        pending = decoder.available(),
                        "Connection closed mid-frame"
                    );
                } else {
                    tracing::debug!(conn_id = %conn_id, "Connection closed by sender");
                }
                return;
            }
            Ok(n) => {
                decoder.push(&buf[..n]);

                // Decode all available frames
                loop {
                    match decoder.decode() {
                        Ok(Some(payload)) => {
                            stats.frames.fetch_add(1, Ordering::Relaxed);
                            stats.bytes.fetch_add(payload.len() as u64, Ordering::Relaxed);
                            let frame = ReceivedFrame {
                                connection: conn_id,
                                payload,
                            };
                            if tx.send(frame).await.is_err() {
                                tracing::debug!(conn_id = %conn_id, "Frame receiver dropped");
                                return;
                            }
                        }
                        Ok(None) => break, // Need more data
                        Err(e) => {
                            stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                            tracing::warn!(conn_id = %conn_id, error = %e, "Frame decode error, closing connection");
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(conn_id = %conn_id, error = %e, "Read error");
                return;
            }
        }
    }
}
