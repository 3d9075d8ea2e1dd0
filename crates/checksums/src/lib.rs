#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! CRC32 primitive shared by the wire codec and the block store.

use crc32fast::Hasher;

/// Computes the CRC-32/ISO-HDLC checksum of `data`.
#[must_use]
pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Incremental CRC32 accumulator for callers that assemble a payload in
/// more than one chunk (e.g. a streamed block write).
#[derive(Clone)]
pub struct Crc32Builder {
    hasher: Hasher,
}

impl Default for Crc32Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc32Builder {
    /// Creates a fresh accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hasher: Hasher::new(),
        }
    }

    /// Folds another chunk of bytes into the running checksum.
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
    }

    /// Consumes the accumulator and returns the final checksum.
    #[must_use]
    pub fn finalize(self) -> u32 {
        self.hasher.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slice_is_zero() {
        assert_eq!(crc32(b""), 0);
    }

    #[test]
    fn deterministic() {
        assert_eq!(crc32(b"the quick brown fox"), crc32(b"the quick brown fox"));
    }

    #[test]
    fn differs_on_single_bit_flip() {
        assert_ne!(crc32(b"hello"), crc32(b"hellp"));
    }

    #[test]
    fn incremental_matches_one_shot() {
        let mut builder = Crc32Builder::new();
        builder.update(b"hello, ");
        builder.update(b"world");
        assert_eq!(builder.finalize(), crc32(b"hello, world"));
    }

    #[test]
    fn known_vector() {
        // Standard CRC-32/ISO-HDLC test vector.
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }
}
