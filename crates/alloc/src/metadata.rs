//! Per-block metadata records.

/// Lifecycle status of a block id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    /// The id is not currently allocated.
    Free,
    /// The id is allocated and holds committed data.
    Allocated,
    /// The id is allocated and a write is in flight.
    Dirty,
}

impl BlockStatus {
    const fn to_u8(self) -> u8 {
        match self {
            Self::Free => 0,
            Self::Allocated => 1,
            Self::Dirty => 2,
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Allocated,
            2 => Self::Dirty,
            _ => Self::Free,
        }
    }
}

/// The fixed-size record kept per block id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMetadata {
    /// The block id this record describes.
    pub id: u64,
    /// Number of live references to the block.
    pub ref_count: u32,
    /// Lifecycle status.
    pub status: BlockStatus,
    /// Creation time, seconds since the Unix epoch.
    pub created_time: u64,
    /// Last-modification time, seconds since the Unix epoch.
    pub modified_time: u64,
}

/// Encoded size of one [`BlockMetadata`] record.
pub const RECORD_LEN: usize = 32;

impl BlockMetadata {
    /// A zeroed record for `id`, as used for a never-allocated or freed
    /// block (metadata is zeroed except for the id on free).
    #[must_use]
    pub const fn empty(id: u64) -> Self {
        Self {
            id,
            ref_count: 0,
            status: BlockStatus::Free,
            created_time: 0,
            modified_time: 0,
        }
    }

    /// Encodes this record into its fixed 32-byte wire layout.
    #[must_use]
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut buf = [0u8; RECORD_LEN];
        buf[0..8].copy_from_slice(&self.id.to_le_bytes());
        buf[8..12].copy_from_slice(&self.ref_count.to_le_bytes());
        buf[12] = self.status.to_u8();
        buf[16..24].copy_from_slice(&self.created_time.to_le_bytes());
        buf[24..32].copy_from_slice(&self.modified_time.to_le_bytes());
        buf
    }

    /// Decodes a record from its fixed 32-byte wire layout.
    #[must_use]
    pub fn decode(buf: &[u8; RECORD_LEN]) -> Self {
        Self {
            id: u64::from_le_bytes(buf[0..8].try_into().unwrap()),
            ref_count: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            status: BlockStatus::from_u8(buf[12]),
            created_time: u64::from_le_bytes(buf[16..24].try_into().unwrap()),
            modified_time: u64::from_le_bytes(buf[24..32].try_into().unwrap()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_round_trips_through_bytes() {
        let record = BlockMetadata {
            id: 42,
            ref_count: 3,
            status: BlockStatus::Allocated,
            created_time: 1000,
            modified_time: 2000,
        };
        assert_eq!(BlockMetadata::decode(&record.encode()), record);
    }

    #[test]
    fn empty_record_preserves_id_and_zeroes_the_rest() {
        let record = BlockMetadata::empty(7);
        assert_eq!(record.id, 7);
        assert_eq!(record.ref_count, 0);
        assert_eq!(record.status, BlockStatus::Free);
    }
}
