//! The network operations a replication worker performs against a node.

use wire::DistfsError;

/// Abstracts "open a connection to a node and exchange block messages"
/// so the engine's retry and completion logic can be exercised without
/// real sockets. The reactor-facing implementation speaks the framed
/// wire protocol over TCP; tests substitute an in-memory fake.
pub trait BlockTransport: Send + Sync {
    /// Opens a connection to `node_id`, sends `READ_BLOCK`, and returns
    /// the `DATA` payload.
    ///
    /// # Errors
    ///
    /// Returns [`DistfsError::NodeUnavailable`] if the node cannot be
    /// reached, or whatever error the remote's `ERROR` reply carried.
    fn read_block(&self, node_id: &str, block_id: u64) -> Result<Vec<u8>, DistfsError>;

    /// Opens a connection to `node_id` and sends `WRITE_BLOCK` with
    /// `data`, waiting for `SUCCESS`.
    ///
    /// # Errors
    ///
    /// Returns [`DistfsError::NodeUnavailable`] if the node cannot be
    /// reached, or whatever error the remote's `ERROR` reply carried.
    fn write_block(&self, node_id: &str, block_id: u64, data: &[u8]) -> Result<(), DistfsError>;
}
