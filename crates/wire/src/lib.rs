#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `wire` defines the framed protocol every storage-node component uses
//! to talk to its peers, plus the [`DistfsError`] taxonomy every other
//! crate in the workspace returns.
//!
//! # Design
//!
//! A frame is a fixed 24-byte [`Header`] followed by a payload of the
//! declared length. [`Message::encode`]/[`Message::decode`] are the only
//! two entry points a caller needs; [`Message::decode`] is written to be
//! called repeatedly against a growing read buffer, returning
//! [`DecodeOutcome::Incomplete`] until enough bytes have arrived.
//!
//! [`next_sequence`] hands out the one piece of process-wide mutable
//! state this crate owns: a monotonically increasing sequence number
//! stamped on every outbound message.
//!
//! # Invariants
//!
//! - `checksum = XOR of header words (excluding checksum) XOR CRC32(payload)`.
//! - A payload longer than [`header::MAX_PAYLOAD`] is rejected before any
//!   attempt is made to buffer it.
//!
//! # Errors
//!
//! [`Message::decode`] returns [`DistfsError::InvalidMessage`] for wrong
//! magic, wrong version, an oversized declared length, or a checksum
//! mismatch. Every other crate surfaces failures through the same
//! [`DistfsError`] enum so a numeric [`DistfsError::code`] can travel
//! unchanged into a framed `ERROR` reply.
//!
//! # Examples
//!
//! ```
//! use wire::{Message, MessageType};
//!
//! let seq = wire::next_sequence();
//! let msg = Message::new(MessageType::WRITE_BLOCK, 0, seq, b"payload".to_vec());
//! let encoded = msg.encode();
//! assert!(encoded.len() >= wire::header::HEADER_LEN);
//! ```

pub mod error;
pub mod flags;
pub mod header;
pub mod message;
pub mod message_type;

pub use error::{DistfsError, Result};
pub use header::Header;
pub use message::{DecodeOutcome, Message};
pub use message_type::MessageType;

use std::sync::atomic::{AtomicU32, Ordering};

static SEQUENCE: AtomicU32 = AtomicU32::new(1);

/// Returns the next value of the process-wide outbound sequence counter.
///
/// The counter wraps on overflow; sequence numbers are informational and
/// are never used to reorder or deduplicate messages.
#[must_use]
pub fn next_sequence() -> u32 {
    SEQUENCE.fetch_add(1, Ordering::Relaxed)
}
