//! Message-type numeric space.

/// A message type tag carried in the wire header.
///
/// This is an open newtype over `u16` rather than a closed enum: a node
/// must be able to decode and forward a structurally valid message of a
/// type it does not implement a handler for (the dispatcher replies
/// `UnsupportedOperation` in that case instead of failing decode itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageType(pub u16);

impl MessageType {
    // Client ops: 0x0001-0x000B. Not implemented by the storage plane core;
    // listed for completeness of the numeric space.
    /// Create file.
    pub const CREATE_FILE: Self = Self(0x0001);
    /// Open file.
    pub const OPEN_FILE: Self = Self(0x0002);
    /// Read file.
    pub const READ_FILE: Self = Self(0x0003);
    /// Write file.
    pub const WRITE_FILE: Self = Self(0x0004);
    /// Close file.
    pub const CLOSE_FILE: Self = Self(0x0005);
    /// Delete file.
    pub const DELETE_FILE: Self = Self(0x0006);

    // Membership: 0x0101-0x0105.
    /// A node asking to join the cluster.
    pub const JOIN_CLUSTER: Self = Self(0x0101);
    /// A node announcing it is leaving the cluster.
    pub const LEAVE_CLUSTER: Self = Self(0x0102);
    /// Liveness/membership heartbeat.
    pub const HEARTBEAT: Self = Self(0x0103);
    /// Node status report.
    pub const NODE_STATUS: Self = Self(0x0104);
    /// Cluster topology snapshot.
    pub const CLUSTER_INFO: Self = Self(0x0105);

    // Replication: 0x0201-0x0204.
    /// Ask a node to replicate a block to one or more targets.
    pub const REPLICATE: Self = Self(0x0201);
    /// Synchronize metadata between nodes.
    pub const SYNC_METADATA: Self = Self(0x0202);
    /// Request a repair of a suspect block.
    pub const REPAIR: Self = Self(0x0203);
    /// Migrate a block's ownership to another node.
    pub const MIGRATE: Self = Self(0x0204);

    // Block ops: 0x0301-0x0303.
    /// Read a block by id.
    pub const READ_BLOCK: Self = Self(0x0301);
    /// Write a block, allocating or overwriting as needed.
    pub const WRITE_BLOCK: Self = Self(0x0302);
    /// Delete a block by id.
    pub const DELETE_BLOCK: Self = Self(0x0303);

    // Responses: 0x8000-0x8003.
    /// Generic success acknowledgement, empty payload.
    pub const SUCCESS: Self = Self(0x8000);
    /// Generic failure carrying a 4-byte numeric error code.
    pub const ERROR: Self = Self(0x8001);
    /// A data payload reply, e.g. to `READ_BLOCK`.
    pub const DATA: Self = Self(0x8002);
    /// A metadata reply.
    pub const METADATA: Self = Self(0x8003);

    // Liveness: 0xF001-0xF002.
    /// Liveness probe.
    pub const PING: Self = Self(0xF001);
    /// Liveness probe reply.
    pub const PONG: Self = Self(0xF002);

    /// Returns the raw numeric value.
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }

    /// True for the response family (`0x8000..=0x8003`).
    #[must_use]
    pub const fn is_response(self) -> bool {
        self.0 >= 0x8000 && self.0 <= 0x8003
    }
}

impl From<u16> for MessageType {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl From<MessageType> for u16 {
    fn from(value: MessageType) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_u16() {
        let mt = MessageType::WRITE_BLOCK;
        let raw: u16 = mt.into();
        assert_eq!(MessageType::from(raw), mt);
    }

    #[test]
    fn unknown_values_are_representable() {
        let mt = MessageType::from(0x1234);
        assert_eq!(mt.value(), 0x1234);
        assert!(!mt.is_response());
    }

    #[test]
    fn response_family_is_identified() {
        assert!(MessageType::SUCCESS.is_response());
        assert!(MessageType::ERROR.is_response());
        assert!(MessageType::DATA.is_response());
        assert!(MessageType::METADATA.is_response());
        assert!(!MessageType::PING.is_response());
    }
}
