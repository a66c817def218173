//! Frame Protocol
//!
//! Wire format for reports sent to the local relay.
//!
//! # Frame Format
//!
//! ```text
//! +-------------------+------------------------------------------+
//! | Length (4)        | Payload (variable)                       |
//! | native-endian u32 | serialized report, opaque bytes          |
//! +-------------------+------------------------------------------+
//! ```
//!
//! The length prefix uses the host byte order, not network order. Existing
//! relay listeners read a host-order integer, so sender and relay must run on
//! the same machine (which a Unix domain socket guarantees anyway).
//!
//! There is no delimiter and no checksum. The sender writes the prefix and
//! the payload as two separate writes.

use super::TransportError;

/// Size of the length prefix in bytes
pub const HEADER_SIZE: usize = 4;

/// Default maximum frame size accepted by [`FrameDecoder`] (10 MB)
///
/// The sender does not enforce this; it only refuses payloads that cannot be
/// described by a `u32` prefix.
pub const MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Minimum buffer capacity for decoder
const MIN_BUFFER_CAPACITY: usize = 4096;

/// Largest payload the length prefix can describe
const MAX_ENCODABLE_LEN: usize = u32::MAX as usize;

/// Encode a payload length as a native-endian length prefix
///
/// # Errors
///
/// Returns `TransportError::PayloadTooLarge` if `len` does not fit in a `u32`.
pub fn encode_length(len: usize) -> Result<[u8; HEADER_SIZE], TransportError> {
    u32::try_from(len)
        .map(u32::to_ne_bytes)
        .map_err(|_| TransportError::PayloadTooLarge {
            len,
            max: MAX_ENCODABLE_LEN,
        })
}

/// Encode a complete frame (prefix followed by payload) into one buffer
///
/// The transport itself never uses this; it writes the two chunks
/// separately. Useful for tools and for feeding a [`FrameDecoder`].
///
/// # Errors
///
/// Returns `TransportError::PayloadTooLarge` if the payload cannot be framed.
pub fn encode(payload: &[u8]) -> Result<Vec<u8>, TransportError> {
    let prefix = encode_length(payload.len())?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&prefix);
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Decoder state machine for streaming frame parsing
///
/// Buffers incoming bytes and yields complete payloads.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Position where we've consumed up to
    read_pos: usize,
    max_frame_size: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a new decoder with the default frame size limit
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_frame_size(MAX_FRAME_SIZE)
    }

    /// Create a decoder that rejects frames above `max_frame_size` bytes
    #[must_use]
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(MIN_BUFFER_CAPACITY),
            read_pos: 0,
            max_frame_size,
        }
    }

    /// Append bytes to the buffer
    pub fn push(&mut self, data: &[u8]) {
        // Compact buffer if we've consumed a lot
        if self.read_pos > self.buffer.len() / 2 && self.read_pos > MIN_BUFFER_CAPACITY {
            self.buffer.drain(..self.read_pos);
            self.read_pos = 0;
        }
        self.buffer.extend_from_slice(data);
    }

    /// Get the number of bytes available in the buffer
    #[must_use]
    pub fn available(&self) -> usize {
        self.buffer.len() - self.read_pos
    }

    /// Try to decode the next frame
    ///
    /// Returns:
    /// - `Ok(Some(payload))` if a complete frame was decoded
    /// - `Ok(None)` if more data is needed
    /// - `Err(TransportError::FrameTooLarge)` if the prefix exceeds the limit
    ///
    /// # Errors
    ///
    /// See above. After an error the stream cannot be resynchronized; the
    /// caller should drop the connection.
    pub fn decode(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        if self.available() < HEADER_SIZE {
            return Ok(None);
        }

        let mut prefix = [0u8; HEADER_SIZE];
        prefix.copy_from_slice(&self.buffer[self.read_pos..self.read_pos + HEADER_SIZE]);
        let len = u32::from_ne_bytes(prefix) as usize;

        if len > self.max_frame_size {
            return Err(TransportError::FrameTooLarge {
                len,
                max: self.max_frame_size,
            });
        }

        if self.available() < HEADER_SIZE + len {
            return Ok(None);
        }

        let payload_start = self.read_pos + HEADER_SIZE;
        let payload_end = payload_start + len;
        let payload = self.buffer[payload_start..payload_end].to_vec();

        self.read_pos = payload_end;

        Ok(Some(payload))
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.read_pos = 0;
    }
}
