//! Maps message types to handlers.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use blockstore::BlockStore;
use wire::{DistfsError, Message, MessageType};

/// Routes a complete inbound message to its handler and produces the
/// reply to send back.
///
/// Defined by hand rather than with an `async-trait`-style macro: the
/// workspace has no such dependency, and a manually boxed future is a
/// handful of lines for a trait with a single method.
pub trait MessageHandler: Send + Sync {
    /// Handles one message and returns the reply to write back.
    fn handle<'a>(&'a self, message: &'a Message) -> Pin<Box<dyn Future<Output = Message> + Send + 'a>>;
}

/// The storage-plane core's handler set: block ops, liveness, and
/// membership acknowledgement.
pub struct StorageDispatcher {
    store: Arc<BlockStore>,
}

impl StorageDispatcher {
    /// Builds a dispatcher backed by `store`.
    #[must_use]
    pub fn new(store: Arc<BlockStore>) -> Self {
        Self { store }
    }
}

impl MessageHandler for StorageDispatcher {
    fn handle<'a>(&'a self, message: &'a Message) -> Pin<Box<dyn Future<Output = Message> + Send + 'a>> {
        let sequence = message.header.sequence;
        Box::pin(async move {
            match message.header.message_type {
                MessageType::WRITE_BLOCK => self.handle_write_block(sequence, &message.payload).await,
                MessageType::READ_BLOCK => self.handle_read_block(sequence, &message.payload).await,
                MessageType::DELETE_BLOCK => self.handle_delete_block(sequence, &message.payload).await,
                MessageType::PING => Message::pong(sequence),
                MessageType::JOIN_CLUSTER | MessageType::LEAVE_CLUSTER => Message::success(sequence),
                other => Message::error(
                    sequence,
                    &DistfsError::UnsupportedOperation(format!("message type {:#06x}", other.value())),
                ),
            }
        })
    }
}

impl StorageDispatcher {
    async fn handle_write_block(&self, sequence: u32, payload: &[u8]) -> Message {
        let Some((block_id, data)) = parse_write_block(payload) else {
            return Message::error(
                sequence,
                &DistfsError::InvalidMessage("malformed WRITE_BLOCK payload".to_owned()),
            );
        };
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || store.write(block_id, &data))
            .await
            .unwrap_or_else(|e| Err(DistfsError::SystemError(format!("write task panicked: {e}"))));
        match result {
            Ok(()) => Message::success(sequence),
            Err(err) => Message::error(sequence, &err),
        }
    }

    async fn handle_read_block(&self, sequence: u32, payload: &[u8]) -> Message {
        let Some(block_id) = parse_u64(payload) else {
            return Message::error(
                sequence,
                &DistfsError::InvalidMessage("malformed READ_BLOCK payload".to_owned()),
            );
        };
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || store.read(block_id))
            .await
            .unwrap_or_else(|e| Err(DistfsError::SystemError(format!("read task panicked: {e}"))));
        match result {
            Ok(data) => Message::data(sequence, data),
            Err(err) => Message::error(sequence, &err),
        }
    }

    async fn handle_delete_block(&self, sequence: u32, payload: &[u8]) -> Message {
        let Some(block_id) = parse_u64(payload) else {
            return Message::error(
                sequence,
                &DistfsError::InvalidMessage("malformed DELETE_BLOCK payload".to_owned()),
            );
        };
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || store.delete(block_id))
            .await
            .unwrap_or_else(|e| Err(DistfsError::SystemError(format!("delete task panicked: {e}"))));
        match result {
            Ok(()) => Message::success(sequence),
            Err(err) => Message::error(sequence, &err),
        }
    }
}

fn parse_u64(payload: &[u8]) -> Option<u64> {
    payload.get(0..8).map(|b| u64::from_le_bytes(b.try_into().unwrap()))
}

fn parse_write_block(payload: &[u8]) -> Option<(u64, Vec<u8>)> {
    if payload.len() < 16 {
        return None;
    }
    let block_id = u64::from_le_bytes(payload[0..8].try_into().unwrap());
    let size = u64::from_le_bytes(payload[8..16].try_into().unwrap()) as usize;
    let data = payload.get(16..16 + size)?.to_vec();
    Some((block_id, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ping_replies_pong() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(BlockStore::open(dir.path()).unwrap());
        let dispatcher = StorageDispatcher::new(store);

        let ping = Message::new(MessageType::PING, 0, 1, Vec::new());
        let reply = dispatcher.handle(&ping).await;
        assert_eq!(reply.header.message_type, MessageType::PONG);
    }

    #[tokio::test]
    async fn write_then_read_round_trips_through_the_dispatcher() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(BlockStore::open(dir.path()).unwrap());
        let dispatcher = StorageDispatcher::new(store);

        let mut write_payload = 7u64.to_le_bytes().to_vec();
        write_payload.extend_from_slice(&5u64.to_le_bytes());
        write_payload.extend_from_slice(b"hello");
        let write_msg = Message::new(MessageType::WRITE_BLOCK, 0, 1, write_payload);
        let reply = dispatcher.handle(&write_msg).await;
        assert_eq!(reply.header.message_type, MessageType::SUCCESS);

        let read_msg = Message::new(MessageType::READ_BLOCK, 0, 2, 7u64.to_le_bytes().to_vec());
        let reply = dispatcher.handle(&read_msg).await;
        assert_eq!(reply.header.message_type, MessageType::DATA);
        assert_eq!(reply.payload, b"hello");
    }

    #[tokio::test]
    async fn unknown_message_type_replies_unsupported_operation() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(BlockStore::open(dir.path()).unwrap());
        let dispatcher = StorageDispatcher::new(store);

        let unknown = Message::new(MessageType::from(0x1234), 0, 1, Vec::new());
        let reply = dispatcher.handle(&unknown).await;
        assert_eq!(reply.header.message_type, MessageType::ERROR);
        let code = u32::from_le_bytes(reply.payload.try_into().unwrap());
        assert_eq!(code, DistfsError::UnsupportedOperation(String::new()).code());
    }

    #[tokio::test]
    async fn join_and_leave_cluster_acknowledge_with_success() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(BlockStore::open(dir.path()).unwrap());
        let dispatcher = StorageDispatcher::new(store);

        let join = Message::new(MessageType::JOIN_CLUSTER, 0, 1, Vec::new());
        assert_eq!(dispatcher.handle(&join).await.header.message_type, MessageType::SUCCESS);

        let leave = Message::new(MessageType::LEAVE_CLUSTER, 0, 2, Vec::new());
        assert_eq!(dispatcher.handle(&leave).await.header.message_type, MessageType::SUCCESS);
    }
}
