//! Wraps [`StorageDispatcher`] to fan a successful write out to replicas.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use reactor::{MessageHandler, StorageDispatcher};
use replication::ReplicationEngine;
use ring_placement::Ring;
use wire::{Message, MessageType};

/// Delegates every message to an inner [`StorageDispatcher`]; on a
/// successful `WRITE_BLOCK`, also asks the placement ring who else
/// should hold a replica of the block and enqueues a task per target
/// other than this node.
pub struct ReplicatingDispatcher {
    inner: StorageDispatcher,
    ring: Arc<Mutex<Ring>>,
    replication: Arc<ReplicationEngine>,
    node_id: String,
    replica_count: u32,
}

impl ReplicatingDispatcher {
    /// Builds a dispatcher that replicates writes to `replica_count`
    /// ring-chosen targets (including this node, which is excluded from
    /// the resulting task).
    #[must_use]
    pub fn new(
        inner: StorageDispatcher,
        ring: Arc<Mutex<Ring>>,
        replication: Arc<ReplicationEngine>,
        node_id: impl Into<String>,
        replica_count: u32,
    ) -> Self {
        Self {
            inner,
            ring,
            replication,
            node_id: node_id.into(),
            replica_count,
        }
    }
}

impl MessageHandler for ReplicatingDispatcher {
    fn handle<'a>(&'a self, message: &'a Message) -> Pin<Box<dyn Future<Output = Message> + Send + 'a>> {
        Box::pin(async move {
            let reply = self.inner.handle(message).await;

            if message.header.message_type == MessageType::WRITE_BLOCK && reply.header.message_type == MessageType::SUCCESS {
                if let Some(block_id) = message.payload.get(0..8).map(|b| u64::from_le_bytes(b.try_into().unwrap())) {
                    self.fan_out(block_id);
                }
            }

            reply
        })
    }
}

impl ReplicatingDispatcher {
    fn fan_out(&self, block_id: u64) {
        let targets: Vec<String> = {
            let ring = self.ring.lock().unwrap();
            match ring.get_nodes(&block_id.to_le_bytes(), self.replica_count as usize) {
                Ok(nodes) => nodes
                    .into_iter()
                    .filter(|n| *n != self.node_id)
                    .map(str::to_owned)
                    .collect(),
                Err(e) => {
                    tracing::debug!(block_id, error = %e, "no replication targets available");
                    return;
                }
            }
        };

        if targets.is_empty() {
            return;
        }

        self.replication.enqueue(block_id, self.node_id.clone(), targets);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockstore::BlockStore;
    use replication::BlockTransport;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use wire::DistfsError;

    struct RecordingTransport {
        writes: StdMutex<HashMap<String, Vec<u8>>>,
    }

    impl BlockTransport for RecordingTransport {
        fn read_block(&self, _node_id: &str, _block_id: u64) -> Result<Vec<u8>, DistfsError> {
            Ok(b"hello".to_vec())
        }

        fn write_block(&self, node_id: &str, _block_id: u64, data: &[u8]) -> Result<(), DistfsError> {
            self.writes.lock().unwrap().insert(node_id.to_owned(), data.to_vec());
            Ok(())
        }
    }

    #[tokio::test]
    async fn successful_write_enqueues_replication_to_other_ring_members() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(BlockStore::open(dir.path()).unwrap());
        let inner = StorageDispatcher::new(store);

        let mut ring = Ring::new(150);
        ring.add_node("node-a");
        ring.add_node("node-b");
        let ring = Arc::new(Mutex::new(ring));

        let transport = Arc::new(RecordingTransport {
            writes: StdMutex::new(HashMap::new()),
        });
        let replication = Arc::new(ReplicationEngine::start(1, 1, transport.clone() as Arc<dyn BlockTransport>));

        let dispatcher = ReplicatingDispatcher::new(inner, ring, Arc::clone(&replication), "node-a", 2);

        let mut payload = 5u64.to_le_bytes().to_vec();
        payload.extend_from_slice(&5u64.to_le_bytes());
        payload.extend_from_slice(b"hello");
        let write = Message::new(MessageType::WRITE_BLOCK, 0, 1, payload);
        let reply = dispatcher.handle(&write).await;
        assert_eq!(reply.header.message_type, MessageType::SUCCESS);

        for _ in 0..50 {
            if !transport.writes.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(transport.writes.lock().unwrap().contains_key("node-b"));

        drop(dispatcher);
        Arc::try_unwrap(replication).unwrap_or_else(|_| panic!("replication engine still shared")).stop();
    }
}
