//! Full messages: header plus payload, with framing over a byte stream.

use crate::error::DistfsError;
use crate::header::{Header, HEADER_LEN, MAGIC, MAX_PAYLOAD, VERSION};
use crate::message_type::MessageType;

/// A complete wire message: header plus the bytes it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// The frame header.
    pub header: Header,
    /// The payload bytes, `header.length` of them.
    pub payload: Vec<u8>,
}

/// Outcome of attempting to pull one frame off the front of a read buffer.
#[derive(Debug)]
pub enum DecodeOutcome {
    /// A complete, valid frame was parsed; it consumed `consumed` bytes.
    Complete { message: Message, consumed: usize },
    /// Not enough bytes are buffered yet to know whether the frame is
    /// valid; the caller should read more and retry.
    Incomplete,
}

impl Message {
    /// Builds a message, assigning `sequence` and computing the checksum.
    #[must_use]
    pub fn new(message_type: MessageType, flags: u32, sequence: u32, payload: Vec<u8>) -> Self {
        let header = Header::for_payload(message_type, flags, sequence, &payload);
        Self { header, payload }
    }

    /// Encodes the full frame: header followed by payload.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.extend_from_slice(&self.header.encode());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Attempts to decode one frame from the front of `buf`, which may
    /// contain more bytes than one frame (the tail of a subsequent
    /// message) or fewer than one frame needs.
    ///
    /// # Errors
    ///
    /// Returns [`DistfsError::InvalidMessage`] for a header whose magic,
    /// version, declared length, or checksum is wrong. A connection that
    /// receives this error must be moved to `CLOSING` by its caller; this
    /// function only decodes, it does not touch connection state.
    pub fn decode(buf: &[u8]) -> Result<DecodeOutcome, DistfsError> {
        if buf.len() < HEADER_LEN {
            return Ok(DecodeOutcome::Incomplete);
        }

        let mut header_bytes = [0u8; HEADER_LEN];
        header_bytes.copy_from_slice(&buf[..HEADER_LEN]);
        let header = Header::decode(&header_bytes);

        if header.magic != MAGIC {
            return Err(DistfsError::InvalidMessage(format!(
                "bad magic: expected {MAGIC:#010x}, got {:#010x}",
                header.magic
            )));
        }
        if header.version != VERSION {
            return Err(DistfsError::InvalidMessage(format!(
                "unsupported version {}",
                header.version
            )));
        }
        if header.length > MAX_PAYLOAD {
            return Err(DistfsError::InvalidMessage(format!(
                "payload length {} exceeds max {MAX_PAYLOAD}",
                header.length
            )));
        }

        let total_len = HEADER_LEN + header.length as usize;
        if buf.len() < total_len {
            return Ok(DecodeOutcome::Incomplete);
        }

        let payload = buf[HEADER_LEN..total_len].to_vec();

        if header.checksum == 0 && payload.iter().all(|&b| b == 0) {
            tracing::warn!("decoded message with zero checksum and all-zero payload");
        }
        if !header.checksum_matches(&payload) {
            return Err(DistfsError::InvalidMessage(
                "checksum mismatch".to_owned(),
            ));
        }

        Ok(DecodeOutcome::Complete {
            message: Message { header, payload },
            consumed: total_len,
        })
    }

    /// Builds the canonical empty-payload `SUCCESS` reply.
    #[must_use]
    pub fn success(sequence: u32) -> Self {
        Self::new(MessageType::SUCCESS, 0, sequence, Vec::new())
    }

    /// Builds an `ERROR` reply carrying `error.code()` as a 4-byte
    /// little-endian payload.
    #[must_use]
    pub fn error(sequence: u32, error: &DistfsError) -> Self {
        Self::new(
            MessageType::ERROR,
            0,
            sequence,
            error.code().to_le_bytes().to_vec(),
        )
    }

    /// Builds a `DATA` reply carrying `payload` verbatim.
    #[must_use]
    pub fn data(sequence: u32, payload: Vec<u8>) -> Self {
        Self::new(MessageType::DATA, 0, sequence, payload)
    }

    /// Builds the canonical empty-payload `PONG` reply.
    #[must_use]
    pub fn pong(sequence: u32) -> Self {
        Self::new(MessageType::PONG, 0, sequence, Vec::new())
    }
}
