//! Transport Layer for Report Delivery
//!
//! Provides the seam between the reporting client and the mechanisms that
//! move serialized reports out of the process:
//! - `Transport`: trait every delivery mechanism implements
//! - `TransportRegistry`: explicit scheme -> factory table owned by the client
//! - `UnixSocketTransport`: length-prefixed frames over a local Unix socket
//! - `FrameListener`: the relay side of the same protocol
//!
//! # Delivery Contract
//!
//! Delivery is at-most-once and best-effort. `send` never blocks the calling
//! thread and never returns an error; an unreachable relay means the report
//! is dropped. Drops are visible through [`DeliveryObserver`] and `tracing`.
//!
//! # Security
//!
//! - Listener sockets are created with 0600 permissions
//! - No network exposure (Unix domain sockets only)

pub mod frame;
pub mod observer;
pub mod registry;
pub mod traits;
#[cfg(unix)]
pub mod unix_socket;

// Re-exports for convenience
pub use frame::{FrameDecoder, HEADER_SIZE, MAX_FRAME_SIZE};
pub use observer::{
    DeliveryEvent, DeliveryObserver, DeliveryStats, DeliveryStatsSnapshot, DropReason,
};
pub use registry::{TransportFactory, TransportRegistry};
pub use traits::{Headers, Transport, TransportError};

#[cfg(unix)]
pub use unix_socket::{FrameListener, UnixSocketTransport, WriteFailurePolicy};
