//! Property-based roundtrip tests for the fixed wire header.

use proptest::prelude::*;
use wire::header::{Header, MAX_PAYLOAD};
use wire::MessageType;

proptest! {
    /// Any header built for an arbitrary payload survives an
    /// encode/decode round trip byte-for-byte.
    #[test]
    fn header_roundtrips_for_arbitrary_fields(
        message_type in any::<u16>(),
        flags in any::<u32>(),
        sequence in any::<u32>(),
        payload in proptest::collection::vec(any::<u8>(), 0..4096),
    ) {
        let header = Header::for_payload(MessageType::from(message_type), flags, sequence, &payload);
        let decoded = Header::decode(&header.encode());
        prop_assert_eq!(header, decoded);
        prop_assert!(header.checksum_matches(&payload));
    }

    /// Flipping any single payload byte is detected by the checksum.
    #[test]
    fn tampering_with_the_payload_is_always_detected(
        payload in proptest::collection::vec(any::<u8>(), 1..256),
        flip_index in 0usize..256,
    ) {
        let flip_index = flip_index % payload.len();
        let header = Header::for_payload(MessageType::PING, 0, 1, &payload);
        let mut tampered = payload.clone();
        tampered[flip_index] ^= 0xFF;
        prop_assert!(!header.checksum_matches(&tampered));
    }

    /// The declared length always equals the payload's actual length,
    /// and never exceeds the maximum a single frame may carry.
    #[test]
    fn declared_length_matches_payload_len(
        payload in proptest::collection::vec(any::<u8>(), 0..4096),
    ) {
        let header = Header::for_payload(MessageType::DATA, 0, 1, &payload);
        prop_assert_eq!(header.length as usize, payload.len());
        prop_assert!(header.length <= MAX_PAYLOAD);
    }
}
