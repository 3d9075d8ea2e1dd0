//! `distfs-node`: runs one storage-plane node until `SIGINT`/`SIGTERM`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use logging::{Level, LogFormat};
use node::{NodeConfig, StorageNode};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Command-line flags. Any flag given here overrides the same field in
/// `--config`'s TOML file, which in turn overrides the built-in default.
#[derive(Debug, Parser)]
#[command(name = "distfs-node", about = "DistFS storage node daemon")]
struct Cli {
    /// Path to a TOML config file layered under these flags.
    #[arg(long)]
    config: Option<PathBuf>,
    /// This node's cluster-wide identifier.
    #[arg(long)]
    node_id: Option<String>,
    /// Root directory for the allocator image and block files.
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Address to accept connections on.
    #[arg(long)]
    listen: Option<SocketAddr>,
    /// Declared maximum payload size per block, in bytes.
    #[arg(long)]
    block_size: Option<u64>,
    /// Total addressable block ids.
    #[arg(long)]
    total_blocks: Option<u64>,
    /// Replicas maintained per block.
    #[arg(long)]
    replicas: Option<u32>,
    /// Worker thread count applied to the reactor, disk I/O, and
    /// replication pools at once; the pool-specific flags below override
    /// it individually.
    #[arg(long)]
    workers: Option<usize>,
    /// Tokio worker threads backing the connection reactor.
    #[arg(long)]
    reactor_workers: Option<usize>,
    /// Disk I/O engine worker threads.
    #[arg(long)]
    io_workers: Option<usize>,
    /// Replication engine worker threads.
    #[arg(long)]
    replication_workers: Option<usize>,
    /// Path to a PID file to maintain for the process lifetime.
    #[arg(long)]
    pid_file: Option<PathBuf>,
    /// Minimum log level (error, warn, info, debug, trace).
    #[arg(long)]
    log_level: Option<Level>,
    /// Log output format (text, json).
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Cli {
    fn apply_to(self, mut config: NodeConfig) -> NodeConfig {
        if let Some(v) = self.node_id {
            config.node_id = v;
        }
        if let Some(v) = self.data_dir {
            config.data_dir = v;
        }
        if let Some(v) = self.listen {
            config.listen = v;
        }
        if let Some(v) = self.block_size {
            config.block_size = v;
        }
        if let Some(v) = self.total_blocks {
            config.total_blocks = v;
        }
        if let Some(v) = self.replicas {
            config.replica_count = v;
        }
        if let Some(v) = self.workers {
            config.reactor_workers = v;
            config.io_workers = v;
            config.replication_workers = v;
        }
        if let Some(v) = self.reactor_workers {
            config.reactor_workers = v;
        }
        if let Some(v) = self.io_workers {
            config.io_workers = v;
        }
        if let Some(v) = self.replication_workers {
            config.replication_workers = v;
        }
        if let Some(v) = self.pid_file {
            config.pid_file = Some(v);
        }
        if let Some(v) = self.log_level {
            config.log_level = v;
        }
        if let Some(v) = self.log_format {
            config.log_format = v;
        }
        config
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let base = match &cli.config {
        Some(path) => match NodeConfig::from_toml_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("distfs-node: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => NodeConfig::default(),
    };
    let config = cli.apply_to(base);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.reactor_workers)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("distfs-node: failed to build async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run(config))
}

async fn run(config: NodeConfig) -> ExitCode {
    let node = match StorageNode::start(config).await {
        Ok(node) => node,
        Err(e) => {
            eprintln!("distfs-node: failed to start: {e}");
            return ExitCode::FAILURE;
        }
    };

    let signalled = match platform::install_shutdown_signals() {
        Ok(flag) => flag,
        Err(e) => {
            eprintln!("distfs-node: failed to install signal handlers: {e}");
            return ExitCode::FAILURE;
        }
    };
    let shutdown = node.shutdown_handle();
    tokio::spawn(async move {
        use std::sync::atomic::Ordering;
        while !signalled.load(Ordering::Acquire) {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        }
        shutdown.store(false, Ordering::Release);
    });

    match node.serve().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("distfs-node: shutdown error: {e}");
            ExitCode::FAILURE
        }
    }
}
