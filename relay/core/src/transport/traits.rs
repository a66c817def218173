//! Transport Traits
//!
//! Core trait and error definitions for report delivery.
//!
//! A transport receives a serialized report and pushes it towards the relay.
//! Delivery is best-effort: `send` never returns an error, connectivity
//! problems are reported through [`DeliveryObserver`](super::DeliveryObserver)
//! and `tracing` instead.

use std::collections::HashMap;

use thiserror::Error;

use crate::dsn::Dsn;
use crate::scope::Scope;

/// Transport-level headers supplied by the reporting client
///
/// Transports that talk to a local relay are free to ignore them.
pub type Headers = HashMap<String, String>;

/// Errors that can occur while configuring or driving a transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// The DSN scheme does not match the transport
    #[error("Unsupported scheme '{found}' (expected '{expected}')")]
    UnsupportedScheme {
        /// Scheme the transport accepts
        expected: &'static str,
        /// Scheme found in the DSN
        found: String,
    },

    /// The DSN is missing a required component
    #[error("Invalid DSN: {0}")]
    InvalidDsn(String),

    /// The DSN string could not be parsed at all
    #[error("Failed to parse DSN '{dsn}': {source}")]
    DsnParse {
        /// The rejected input
        dsn: String,
        /// The underlying URL parse error
        source: url::ParseError,
    },

    /// No transport is registered for the DSN scheme
    #[error("No transport registered for scheme '{0}'")]
    UnknownScheme(String),

    /// Connecting to the relay socket failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Payload length does not fit the frame length prefix
    #[error("Payload too large: {len} bytes (max: {max})")]
    PayloadTooLarge {
        /// Payload length in bytes
        len: usize,
        /// Largest encodable payload
        max: usize,
    },

    /// An incoming frame announced a length above the decoder limit
    #[error("Frame size {len} exceeds maximum {max}")]
    FrameTooLarge {
        /// Announced payload length
        len: usize,
        /// Configured decoder limit
        max: usize,
    },

    /// Transport not in expected state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// IO error from the underlying socket
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TransportError {
    /// Whether this error means the DSN or registry setup is wrong
    ///
    /// Configuration errors are surfaced to the caller synchronously; every
    /// other kind is a connectivity problem that delivery swallows.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedScheme { .. }
                | Self::InvalidDsn(_)
                | Self::DsnParse { .. }
                | Self::UnknownScheme(_)
        )
    }
}

/// A pluggable delivery mechanism for outbound error reports
///
/// Implementations are selected by DSN scheme through a
/// [`TransportRegistry`](super::TransportRegistry). A transport instance owns
/// its connection exclusively; `send` takes `&mut self`, so callers sharing one
/// across threads must wrap it in a lock.
pub trait Transport: Send {
    /// The DSN scheme this transport serves
    fn scheme(&self) -> &'static str;

    /// Attempt delivery of one serialized report
    ///
    /// Never blocks and never fails. If the report cannot be delivered right
    /// now it is dropped.
    fn send(&mut self, data: &[u8], headers: &Headers);

    /// Merge connection metadata derived from `dsn` into `scope`
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidDsn` when credentials or the project
    /// key are missing.
    fn compute_scope(&self, dsn: &Dsn, scope: Scope) -> Result<Scope, TransportError>;

    /// Check if a live connection is currently held
    fn is_connected(&self) -> bool;
}
