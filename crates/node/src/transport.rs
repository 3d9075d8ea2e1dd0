//! Node-to-node [`BlockTransport`] over the framed wire protocol.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Mutex;
use std::time::Duration;

use replication::BlockTransport;
use wire::message::DecodeOutcome;
use wire::{DistfsError, Message, MessageType};

const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Replicates blocks to peer nodes by opening a short-lived TCP
/// connection per request and speaking the same framed protocol the
/// reactor serves on the client-facing side.
///
/// Peer addresses are looked up by node id in an in-memory table kept
/// current by cluster membership messages; a node id with no known
/// address fails with [`DistfsError::NodeUnavailable`].
pub struct TcpBlockTransport {
    peers: Mutex<HashMap<String, SocketAddr>>,
}

impl TcpBlockTransport {
    /// Builds a transport with no peers registered yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            peers: Mutex::new(HashMap::new()),
        }
    }

    /// Records (or updates) the address a node id is reachable at.
    pub fn register_peer(&self, node_id: impl Into<String>, addr: SocketAddr) {
        self.peers.lock().unwrap().insert(node_id.into(), addr);
    }

    /// Forgets a peer, e.g. after it leaves the cluster.
    pub fn remove_peer(&self, node_id: &str) {
        self.peers.lock().unwrap().remove(node_id);
    }

    fn resolve(&self, node_id: &str) -> Result<SocketAddr, DistfsError> {
        self.peers
            .lock()
            .unwrap()
            .get(node_id)
            .copied()
            .ok_or_else(|| DistfsError::NodeUnavailable(format!("no known address for {node_id}")))
    }
}

impl Default for TcpBlockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockTransport for TcpBlockTransport {
    fn read_block(&self, node_id: &str, block_id: u64) -> Result<Vec<u8>, DistfsError> {
        let addr = self.resolve(node_id)?;
        let request = Message::new(MessageType::READ_BLOCK, 0, wire::next_sequence(), block_id.to_le_bytes().to_vec());
        let reply = send_request(addr, &request)?;
        match reply.header.message_type {
            MessageType::DATA => Ok(reply.payload),
            MessageType::ERROR => Err(decode_error(&reply.payload)),
            other => Err(DistfsError::NetworkFailure(format!(
                "unexpected reply type {:#06x} from {node_id}",
                other.value()
            ))),
        }
    }

    fn write_block(&self, node_id: &str, block_id: u64, data: &[u8]) -> Result<(), DistfsError> {
        let addr = self.resolve(node_id)?;
        let mut payload = block_id.to_le_bytes().to_vec();
        payload.extend_from_slice(&(data.len() as u64).to_le_bytes());
        payload.extend_from_slice(data);
        let request = Message::new(MessageType::WRITE_BLOCK, 0, wire::next_sequence(), payload);
        let reply = send_request(addr, &request)?;
        match reply.header.message_type {
            MessageType::SUCCESS => Ok(()),
            MessageType::ERROR => Err(decode_error(&reply.payload)),
            other => Err(DistfsError::NetworkFailure(format!(
                "unexpected reply type {:#06x} from {node_id}",
                other.value()
            ))),
        }
    }
}

fn decode_error(payload: &[u8]) -> DistfsError {
    payload
        .get(0..4)
        .map(|b| DistfsError::from_code(u32::from_le_bytes(b.try_into().unwrap())))
        .unwrap_or_else(|| DistfsError::Unknown("malformed error payload".to_owned()))
}

fn send_request(addr: SocketAddr, request: &Message) -> Result<Message, DistfsError> {
    let mut stream = TcpStream::connect_timeout(&addr, IO_TIMEOUT)
        .map_err(|e| DistfsError::NetworkFailure(format!("connecting to {addr}: {e}")))?;
    stream.set_read_timeout(Some(IO_TIMEOUT)).ok();
    stream.set_write_timeout(Some(IO_TIMEOUT)).ok();
    stream.set_nodelay(true).ok();

    stream
        .write_all(&request.encode())
        .map_err(|e| DistfsError::NetworkFailure(format!("writing to {addr}: {e}")))?;

    let mut buf = Vec::with_capacity(wire::header::HEADER_LEN * 2);
    let mut chunk = [0u8; 4096];
    loop {
        match Message::decode(&buf) {
            Ok(DecodeOutcome::Complete { message, .. }) => return Ok(message),
            Ok(DecodeOutcome::Incomplete) => {}
            Err(e) => return Err(e),
        }
        let n = stream
            .read(&mut chunk)
            .map_err(|e| DistfsError::NetworkFailure(format!("reading from {addr}: {e}")))?;
        if n == 0 {
            return Err(DistfsError::NetworkFailure(format!("{addr} closed the connection")));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}
