//! Delivery Observation
//!
//! Delivery is best-effort and silent: `send` never reports failure to its
//! caller. Observers make the silent paths diagnosable without changing that
//! contract. Every attempt emits exactly one terminal event (`Sent`,
//! `Dropped` or `WriteFailed`), optionally preceded by a connection event.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Why a report was dropped before anything was written
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// The relay socket could not be connected
    NotConnected,
    /// The payload length does not fit the frame prefix
    PayloadTooLarge,
}

/// Something that happened during a delivery attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryEvent {
    /// A new connection to the relay was established
    Connected,
    /// Connecting to the relay failed
    ConnectFailed {
        /// Kind of the underlying socket error
        kind: io::ErrorKind,
    },
    /// A complete frame was handed to the socket
    Sent {
        /// Bytes written, prefix included
        bytes: usize,
    },
    /// The report was dropped without writing
    Dropped {
        /// Why it was dropped
        reason: DropReason,
        /// Payload length
        bytes: usize,
    },
    /// Writing the frame failed or was short
    WriteFailed {
        /// Kind of the underlying socket error
        kind: io::ErrorKind,
        /// Whether the connection was discarded as a result
        disconnected: bool,
    },
}

/// Hook notified of every delivery event
///
/// Called synchronously from `send`; implementations must be cheap and must
/// not block.
pub trait DeliveryObserver: Send + Sync {
    /// Handle one event
    fn on_event(&self, event: &DeliveryEvent);
}

/// Counting observer backed by atomics
#[derive(Debug, Default)]
pub struct DeliveryStats {
    connects: AtomicU64,
    connect_failures: AtomicU64,
    frames_sent: AtomicU64,
    bytes_sent: AtomicU64,
    dropped: AtomicU64,
    write_failures: AtomicU64,
}

/// Point-in-time copy of [`DeliveryStats`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStatsSnapshot {
    /// Successful connects
    pub connects: u64,
    /// Failed connect attempts
    pub connect_failures: u64,
    /// Frames fully handed to the socket
    pub frames_sent: u64,
    /// Bytes written, prefixes included
    pub bytes_sent: u64,
    /// Reports dropped before writing
    pub dropped: u64,
    /// Failed or short writes
    pub write_failures: u64,
}

impl DeliveryStatsSnapshot {
    /// Reports that did not make it to the socket
    #[must_use]
    pub fn lost(&self) -> u64 {
        self.dropped + self.write_failures
    }
}

impl DeliveryStats {
    /// Create zeroed counters
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read all counters
    #[must_use]
    pub fn snapshot(&self) -> DeliveryStatsSnapshot {
        DeliveryStatsSnapshot {
            connects: self.connects.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

impl DeliveryObserver for DeliveryStats {
    fn on_event(&self, event: &DeliveryEvent) {
        match event {
            DeliveryEvent::Connected => {
                self.connects.fetch_add(1, Ordering::Relaxed);
            }
            DeliveryEvent::ConnectFailed { .. } => {
                self.connect_failures.fetch_add(1, Ordering::Relaxed);
            }
            DeliveryEvent::Sent { bytes } => {
                self.frames_sent.fetch_add(1, Ordering::Relaxed);
                self.bytes_sent.fetch_add(*bytes as u64, Ordering::Relaxed);
            }
            DeliveryEvent::Dropped { .. } => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            DeliveryEvent::WriteFailed { .. } => {
                self.write_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_count_events() {
        let stats = DeliveryStats::new();

        stats.on_event(&DeliveryEvent::ConnectFailed {
            kind: io::ErrorKind::NotFound,
        });
        stats.on_event(&DeliveryEvent::Dropped {
            reason: DropReason::NotConnected,
            bytes: 10,
        });
        stats.on_event(&DeliveryEvent::Connected);
        stats.on_event(&DeliveryEvent::Sent { bytes: 14 });
        stats.on_event(&DeliveryEvent::Sent { bytes: 6 });
        stats.on_event(&DeliveryEvent::WriteFailed {
            kind: io::ErrorKind::BrokenPipe,
            disconnected: true,
        });

        let snapshot = stats.snapshot();
        assert_eq!(
            snapshot,
            DeliveryStatsSnapshot {
                connects: 1,
                connect_failures: 1,
                frames_sent: 2,
                bytes_sent: 20,
                dropped: 1,
                write_failures: 1,
            }
        );
        assert_eq!(snapshot.lost(), 2);
    }
}
