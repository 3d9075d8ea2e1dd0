//! Storage node configuration: defaults, TOML file, and CLI overrides.

use std::net::SocketAddr;
use std::path::PathBuf;

use logging::{LogFormat, Level};
use serde::Deserialize;

/// All tunables a storage node needs to start.
///
/// Deserializable from a TOML config file; the binary entry point layers
/// CLI flags on top of whatever a `--config` file supplies.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// This node's cluster-wide identifier.
    pub node_id: String,
    /// Root directory for the allocator image and block files.
    pub data_dir: PathBuf,
    /// Address to accept connections on.
    pub listen: SocketAddr,
    /// Declared maximum payload size per block.
    pub block_size: u64,
    /// Total addressable block ids.
    pub total_blocks: u64,
    /// Replicas maintained per block.
    pub replica_count: u32,
    /// Tokio worker threads backing the connection reactor.
    pub reactor_workers: usize,
    /// Disk I/O engine worker threads.
    pub io_workers: usize,
    /// Replication engine worker threads.
    pub replication_workers: usize,
    /// Retries allowed before a replication task is permanently failed.
    pub max_retries: u32,
    /// Maximum concurrently served connections.
    pub max_connections: usize,
    /// Virtual nodes each physical node contributes to the placement ring.
    pub virtual_nodes: u32,
    /// Optional PID file path.
    pub pid_file: Option<PathBuf>,
    /// Minimum log level.
    pub log_level: Level,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: "node-0".to_owned(),
            data_dir: PathBuf::from("./data"),
            listen: "0.0.0.0:7700".parse().expect("valid default listen address"),
            block_size: 64 * 1024 * 1024,
            total_blocks: 1024 * 1024,
            replica_count: 3,
            reactor_workers: 4,
            io_workers: 4,
            replication_workers: 4,
            max_retries: 3,
            max_connections: 1024,
            virtual_nodes: 150,
            pid_file: None,
            log_level: Level::Info,
            log_format: LogFormat::Text,
        }
    }
}

impl NodeConfig {
    /// Loads a config from a TOML file, falling back to [`Default`] for
    /// any field the file does not set.
    ///
    /// # Errors
    ///
    /// Returns [`wire::DistfsError::InvalidParam`] if the file cannot be
    /// read or does not parse as valid TOML for this shape.
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self, wire::DistfsError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| wire::DistfsError::InvalidParam(format!("reading config file: {e}")))?;
        toml::from_str(&text)
            .map_err(|e| wire::DistfsError::InvalidParam(format!("parsing config file: {e}")))
    }
}
