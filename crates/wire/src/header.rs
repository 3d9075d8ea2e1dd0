//! The fixed 24-byte frame header.

use crate::message_type::MessageType;

/// `"DIST"` read as a big-endian `u32`.
pub const MAGIC: u32 = 0x4449_5354;
/// Current protocol version.
pub const VERSION: u16 = 1;
/// Encoded header size in bytes.
pub const HEADER_LEN: usize = 24;
/// Largest payload a single frame may carry.
pub const MAX_PAYLOAD: u32 = 16 * 1024 * 1024;

/// The fixed-size header every wire message opens with.
///
/// Integers are encoded little-endian on the wire; this is the crate's
/// chosen canonical byte order and every peer built from this crate
/// agrees on it, which is all the layout invariant requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Must equal [`MAGIC`] for a frame to be considered well-formed.
    pub magic: u32,
    /// Protocol version the sender speaks.
    pub version: u16,
    /// The message type tag.
    pub message_type: MessageType,
    /// Bitset of [`crate::flags`] values.
    pub flags: u32,
    /// Declared payload length in bytes; must be `<= MAX_PAYLOAD`.
    pub length: u32,
    /// Sequence number assigned by [`crate::next_sequence`] at send time.
    pub sequence: u32,
    /// `XOR` of the other five fields (as 32-bit words) `XOR` `CRC32(payload)`.
    pub checksum: u32,
}

impl Header {
    /// Builds a header for `payload`, computing length and checksum.
    /// The caller supplies `sequence`, typically from [`crate::next_sequence`].
    #[must_use]
    pub fn for_payload(message_type: MessageType, flags: u32, sequence: u32, payload: &[u8]) -> Self {
        let length = payload.len() as u32;
        let checksum = checksum_of(VERSION, message_type, flags, length, sequence, payload);
        Self {
            magic: MAGIC,
            version: VERSION,
            message_type,
            flags,
            length,
            sequence,
            checksum,
        }
    }

    /// Encodes the header into its 24-byte wire representation.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6..8].copy_from_slice(&self.message_type.value().to_le_bytes());
        buf[8..12].copy_from_slice(&self.flags.to_le_bytes());
        buf[12..16].copy_from_slice(&self.length.to_le_bytes());
        buf[16..20].copy_from_slice(&self.sequence.to_le_bytes());
        buf[20..24].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Decodes a header from exactly [`HEADER_LEN`] bytes. Does not
    /// validate magic, version, or checksum; callers combine this with
    /// payload bytes before running [`crate::Message::decode`]'s full
    /// validation.
    #[must_use]
    pub fn decode(buf: &[u8; HEADER_LEN]) -> Self {
        Self {
            magic: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            version: u16::from_le_bytes(buf[4..6].try_into().unwrap()),
            message_type: MessageType::from(u16::from_le_bytes(buf[6..8].try_into().unwrap())),
            flags: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            length: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
            sequence: u32::from_le_bytes(buf[16..20].try_into().unwrap()),
            checksum: u32::from_le_bytes(buf[20..24].try_into().unwrap()),
        }
    }

    /// Recomputes the checksum this header should carry for `payload` and
    /// compares it against [`Self::checksum`].
    #[must_use]
    pub fn checksum_matches(&self, payload: &[u8]) -> bool {
        let expected = checksum_of(
            self.version,
            self.message_type,
            self.flags,
            self.length,
            self.sequence,
            payload,
        );
        expected == self.checksum
    }
}

/// Computes the checksum word for a header's fields (sans checksum
/// itself) and a payload: `XOR` of the four 32-bit header words `XOR`
/// `CRC32(payload)`.
#[must_use]
pub fn checksum_of(
    version: u16,
    message_type: MessageType,
    flags: u32,
    length: u32,
    sequence: u32,
    payload: &[u8],
) -> u32 {
    let version_type_word = u32::from(version) | (u32::from(message_type.value()) << 16);
    let header_xor = MAGIC ^ version_type_word ^ flags ^ length ^ sequence;
    header_xor ^ checksums::crc32(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips_through_bytes() {
        let header = Header::for_payload(MessageType::WRITE_BLOCK, 0, 7, b"hello");
        let encoded = header.encode();
        let decoded = Header::decode(&encoded);
        assert_eq!(header, decoded);
    }

    #[test]
    fn checksum_matches_on_untampered_payload() {
        let payload = b"hello";
        let header = Header::for_payload(MessageType::WRITE_BLOCK, 0, 1, payload);
        assert!(header.checksum_matches(payload));
    }

    #[test]
    fn checksum_mismatches_on_tampered_payload() {
        let header = Header::for_payload(MessageType::WRITE_BLOCK, 0, 1, b"hello");
        assert!(!header.checksum_matches(b"hellp"));
    }
}
