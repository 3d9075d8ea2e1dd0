//! Header flag bits.

/// Payload is compressed. The core does not specify a compression
/// algorithm; the bit is reserved for collaborators that do.
pub const COMPRESSED: u32 = 0x01;
/// Payload is encrypted. Reserved in the same sense as [`COMPRESSED`].
pub const ENCRYPTED: u32 = 0x02;
/// Hint that a message should be scheduled ahead of non-urgent traffic.
pub const URGENT: u32 = 0x04;
/// Hint that the sender wants delivery confirmation beyond TCP itself.
pub const RELIABLE: u32 = 0x08;
