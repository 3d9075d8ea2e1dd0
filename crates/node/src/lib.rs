#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `node` wires every storage-plane component into one running process:
//! the block allocator, the on-disk block store, the disk I/O engine,
//! the placement ring, the replication engine, and the connection
//! reactor. [`StorageNode::start`] brings all of it up in dependency
//! order and fails fast if any component cannot initialize;
//! [`StorageNode::serve`] runs the accept loop until shutdown is
//! requested and then tears everything back down in reverse order.
//!
//! # Design
//!
//! [`BlockStore`] performs its own synchronous file I/O, offloaded from
//! the reactor's async tasks via `tokio::task::spawn_blocking` inside
//! [`reactor::StorageDispatcher`]. [`DiskIoEngine`] is started and
//! stopped alongside the other components for lifecycle symmetry and
//! because a future revision may route block payloads through it
//! instead, but today's read/write/delete path does not submit work to
//! it; see this crate's design notes for why the two were kept separate
//! rather than force-integrated.
//!
//! # Errors
//!
//! [`StorageNode::start`] surfaces the first component failure: a bad
//! listen address, an allocator image that does not match the
//! configured block size or block count, or a data directory that
//! cannot be created.

mod config;
mod dispatcher;
mod transport;

pub use config::NodeConfig;
pub use dispatcher::ReplicatingDispatcher;
pub use transport::TcpBlockTransport;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use block_alloc::Allocator;
use blockstore::BlockStore;
use diskio::DiskIoEngine;
use platform::PidFile;
use reactor::{ConnectionTimeouts, Reactor, StorageDispatcher};
use replication::ReplicationEngine;
use ring_placement::Ring;
use tokio::net::TcpListener;
use wire::DistfsError;

/// A fully wired storage node, from the moment its components are
/// brought up to the moment they are torn back down.
pub struct StorageNode {
    config: NodeConfig,
    allocator: Arc<Allocator>,
    block_store: Arc<BlockStore>,
    ring: Arc<Mutex<Ring>>,
    transport: Arc<TcpBlockTransport>,
    replication: Arc<ReplicationEngine>,
    disk_io: DiskIoEngine,
    reactor: Reactor,
    running: Arc<AtomicBool>,
    pid_file: Option<PidFile>,
}

impl StorageNode {
    /// Brings up every component in dependency order: logging, the PID
    /// file, the allocator image, the block store's shard directories,
    /// the disk I/O engine, the placement ring (seeded with this node's
    /// own id), the replication engine, and finally the listening
    /// socket.
    ///
    /// # Errors
    ///
    /// Returns the first component's failure. Nothing started before
    /// the failing step is left running; callers should treat any
    /// `Err` from this function as a clean, nothing-to-clean-up exit.
    pub async fn start(config: NodeConfig) -> Result<Self, DistfsError> {
        if let Err(e) = logging::init(config.log_level, config.log_format) {
            tracing::debug!(error = %e, "logging already initialized");
        }

        let pid_file = match &config.pid_file {
            Some(path) => Some(PidFile::create(path).map_err(|e| {
                DistfsError::AlreadyInitialized(format!("pid file {}: {e}", path.display()))
            })?),
            None => None,
        };

        std::fs::create_dir_all(&config.data_dir)
            .map_err(|e| DistfsError::SystemError(format!("creating data dir: {e}")))?;

        let allocator = Arc::new(Allocator::open(
            config.data_dir.join("alloc.img"),
            config.block_size,
            config.total_blocks,
        )?);
        let block_store = Arc::new(BlockStore::open(&config.data_dir)?);
        let disk_io = DiskIoEngine::start(config.io_workers);

        let mut ring = Ring::new(config.virtual_nodes);
        ring.add_node(config.node_id.clone());
        let ring = Arc::new(Mutex::new(ring));

        let transport = Arc::new(TcpBlockTransport::new());
        let replication = Arc::new(ReplicationEngine::start(
            config.replication_workers,
            config.max_retries,
            Arc::clone(&transport) as Arc<dyn replication::BlockTransport>,
        ));

        let listener = TcpListener::bind(config.listen)
            .await
            .map_err(|e| DistfsError::NetworkFailure(format!("binding {}: {e}", config.listen)))?;
        let reactor = Reactor::new(listener, config.max_connections, ConnectionTimeouts::default());

        tracing::info!(node_id = %config.node_id, listen = %config.listen, "storage node started");

        Ok(Self {
            config,
            allocator,
            block_store,
            ring,
            transport,
            replication,
            disk_io,
            reactor,
            running: Arc::new(AtomicBool::new(true)),
            pid_file,
        })
    }

    /// The address the reactor is actually listening on.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the underlying socket cannot report its
    /// local address.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.reactor.local_addr()
    }

    /// Registers a peer's address so the replication engine can reach
    /// it, and adds it to the placement ring.
    pub fn add_peer(&self, node_id: impl Into<String>, addr: std::net::SocketAddr) {
        let node_id = node_id.into();
        self.transport.register_peer(node_id.clone(), addr);
        self.ring.lock().unwrap().add_node(node_id);
    }

    /// Drops a peer from the placement ring and the replication
    /// transport's address table.
    pub fn remove_peer(&self, node_id: &str) {
        self.transport.remove_peer(node_id);
        self.ring.lock().unwrap().remove_node(node_id);
    }

    /// A handle callers can clear (or that `SIGINT`/`SIGTERM`, via
    /// [`platform::install_shutdown_signals`], can clear) to stop
    /// [`serve`](Self::serve).
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Runs the accept loop until the shutdown handle is cleared, then
    /// tears down the replication engine, the disk I/O engine, syncs the
    /// allocator image, and releases the PID file, in that order.
    ///
    /// # Errors
    ///
    /// Returns an error only if the final allocator sync fails; a
    /// failure there still leaves every other component stopped.
    pub async fn serve(mut self) -> Result<(), DistfsError> {
        let inner = StorageDispatcher::new(Arc::clone(&self.block_store));
        let handler = Arc::new(ReplicatingDispatcher::new(
            inner,
            Arc::clone(&self.ring),
            Arc::clone(&self.replication),
            self.config.node_id.clone(),
            self.config.replica_count,
        ));
        self.reactor.serve(handler, Arc::clone(&self.running)).await;

        tracing::info!(node_id = %self.config.node_id, "shutting down storage node");
        match Arc::try_unwrap(self.replication) {
            Ok(engine) => engine.stop(),
            Err(_) => tracing::warn!("replication engine still shared at shutdown; its workers were not joined"),
        }
        self.disk_io.stop();
        self.allocator.sync()?;
        drop(self.pid_file.take());
        Ok(())
    }

    /// Clears the shutdown handle, causing [`serve`](Self::serve) to
    /// return once its current accept-loop poll completes.
    pub fn request_shutdown(&self) {
        self.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &std::path::Path) -> NodeConfig {
        NodeConfig {
            node_id: "node-test".to_owned(),
            data_dir: dir.to_path_buf(),
            listen: "127.0.0.1:0".parse().unwrap(),
            block_size: 4096,
            total_blocks: 64,
            ..NodeConfig::default()
        }
    }

    #[tokio::test]
    async fn start_then_immediate_shutdown_tears_down_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let node = StorageNode::start(test_config(dir.path())).await.unwrap();
        let handle = node.shutdown_handle();
        handle.store(false, Ordering::Release);
        node.serve().await.unwrap();
    }

    #[tokio::test]
    async fn adding_and_removing_a_peer_updates_the_ring() {
        let dir = tempfile::tempdir().unwrap();
        let node = StorageNode::start(test_config(dir.path())).await.unwrap();
        node.add_peer("node-b", "127.0.0.1:9".parse().unwrap());
        assert_eq!(node.ring.lock().unwrap().node_count(), 2);
        node.remove_peer("node-b");
        assert_eq!(node.ring.lock().unwrap().node_count(), 1);
        node.request_shutdown();
        node.serve().await.unwrap();
    }
}
