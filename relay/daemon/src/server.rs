//! Relay Server Implementation
//!
//! This module provides the listening side of `report-relay`:
//! - Binds the relay socket through `FrameListener`
//! - Logs every decoded report with a short hex preview
//! - Optionally dumps raw payloads to an output stream
//! - Stops on shutdown signal or after a fixed number of frames
//!
//! ```text
//!        sender A ─┐
//!        sender B ─┼──► FrameListener ──mpsc──► RelayServer::run ──► log / dump
//!        sender C ─┘    (task per conn)
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use relay_core::{FrameListener, ListenerStats, ReceivedFrame};

/// Number of payload bytes shown in the log preview
const PREVIEW_BYTES: usize = 32;

/// Configuration for the relay server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path to the Unix socket
    pub socket_path: PathBuf,
    /// Largest frame accepted from a sender
    pub max_frame_size: usize,
    /// Write each payload to the output stream
    pub dump: bool,
    /// Stop after this many frames
    pub max_frames: Option<u64>,
    /// Frame channel capacity (listener to server loop)
    pub channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: relay_core::default_socket_path(),
            max_frame_size: relay_core::transport::MAX_FRAME_SIZE,
            dump: false,
            max_frames: None,
            channel_capacity: 256,
        }
    }
}

/// The relay server
pub struct RelayServer {
    config: ServerConfig,
    listener: FrameListener,
}

impl RelayServer {
    /// Bind the relay socket
    ///
    /// Senders can connect as soon as this returns, even before `run`.
    pub fn bind(config: ServerConfig) -> Result<Self> {
        let listener = FrameListener::bind(&config.socket_path)
            .with_context(|| format!("Failed to bind to {:?}", config.socket_path))?
            .with_max_frame_size(config.max_frame_size);

        Ok(Self { config, listener })
    }

    /// Run until `shutdown` resolves, the frame limit is reached or the
    /// listener fails
    ///
    /// Returns the listener counters for the run.
    pub async fn run<F, W>(self, shutdown: F, out: &mut W) -> Result<Arc<ListenerStats>>
    where
        F: Future<Output = ()>,
        W: AsyncWrite + Unpin,
    {
        let Self { config, listener } = self;
        let stats = listener.stats();

        info!(
            path = ?listener.socket_path(),
            max_frame_size = config.max_frame_size,
            dump = config.dump,
            "Relay server running"
        );

        let (tx, mut rx) = mpsc::channel::<ReceivedFrame>(config.channel_capacity);
        let serve_task = tokio::spawn(listener.serve(tx));

        tokio::pin!(shutdown);
        let mut handled: u64 = 0;

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                frame = rx.recv() => {
                    let Some(frame) = frame else {
                        debug!("Listener stopped");
                        break;
                    };

                    handle_frame(&frame, config.dump, out).await?;
                    handled += 1;

                    if config.max_frames.is_some_and(|max| handled >= max) {
                        info!(frames = handled, "Frame limit reached");
                        break;
                    }
                }
            }
        }

        // Closing the receiver stops the accept loop
        drop(rx);
        serve_task
            .await
            .context("Listener task panicked")?
            .context("Listener failed")?;

        info!(
            connections = stats.connections(),
            frames = stats.frames(),
            bytes = stats.bytes(),
            decode_errors = stats.decode_errors(),
            "Relay server stopped"
        );

        Ok(stats)
    }
}

/// Log one frame and dump it if requested
async fn handle_frame<W>(frame: &ReceivedFrame, dump: bool, out: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    info!(
        conn_id = %frame.connection,
        len = frame.payload.len(),
        preview = %preview(&frame.payload),
        "Report received"
    );

    if dump {
        out.write_all(&frame.payload).await?;
        out.write_all(b"\n").await?;
        out.flush().await?;
    }

    Ok(())
}

/// Hex of the first few payload bytes, with an ellipsis if truncated
fn preview(payload: &[u8]) -> String {
    let shown = &payload[..payload.len().min(PREVIEW_BYTES)];
    let mut preview = hex::encode(shown);
    if payload.len() > PREVIEW_BYTES {
        preview.push_str("...");
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{Headers, Transport, UnixSocketTransport};
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_config(socket_path: PathBuf) -> ServerConfig {
        ServerConfig {
            socket_path,
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview(b"\x01\xff"), "01ff");
        assert_eq!(preview(&[]), "");

        let long = vec![0xAB; 40];
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.len(), PREVIEW_BYTES * 2 + 3);
    }

    #[tokio::test]
    async fn test_run_dumps_frames_until_limit() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("relay.sock");

        let server = RelayServer::bind(ServerConfig {
            dump: true,
            max_frames: Some(2),
            ..test_config(socket_path.clone())
        })
        .unwrap();

        let mut transport = UnixSocketTransport::with_socket_path(&socket_path);
        transport.send(br#"{"message":"one"}"#, &Headers::new());
        transport.send(br#"{"message":"two"}"#, &Headers::new());

        let mut out = Vec::new();
        let stats = tokio::time::timeout(
            Duration::from_secs(2),
            server.run(std::future::pending(), &mut out),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"message\":\"one\"}\n{\"message\":\"two\"}\n"
        );
        assert_eq!(stats.frames(), 2);
        assert_eq!(stats.connections(), 1);
        assert!(!socket_path.exists());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_without_dump() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("relay.sock");
        let server = RelayServer::bind(test_config(socket_path.clone())).unwrap();

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let shutdown = async move {
            let _ = stop_rx.await;
        };
        stop_tx.send(()).unwrap();

        let mut out = Vec::new();
        let stats = tokio::time::timeout(Duration::from_secs(2), server.run(shutdown, &mut out))
            .await
            .unwrap()
            .unwrap();

        assert!(out.is_empty());
        assert_eq!(stats.frames(), 0);
        assert!(!socket_path.exists());
    }

    #[tokio::test]
    async fn test_bind_fails_for_unusable_path() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let result = RelayServer::bind(test_config(blocker.join("relay.sock")));
        assert!(result.is_err());
    }
}
