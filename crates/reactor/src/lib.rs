#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `reactor` accepts inbound TCP connections and drives each one through
//! its own read-dispatch-write loop, handing complete messages to a
//! [`MessageHandler`].
//!
//! # Design
//!
//! A systems-language original would round-robin accepted sockets
//! across a fixed pool of worker threads, each running its own
//! event-multiplexer instance. [`tokio`]'s multi-threaded runtime already
//! schedules independent tasks across its worker pool, so
//! [`Reactor::serve`] spawns one task per connection and lets the
//! runtime do the round-robining; the `reactor worker count` the
//! storage-node operator surface exposes configures the size of that
//! runtime's thread pool.
//!
//! # Invariants
//!
//! - The acceptor refuses a new connection by immediate close once
//!   `max_connections` active connections are already being served.
//! - A connection moves to `Closing` on a half-close, a non-recoverable
//!   read/write error, a bad frame, or an idle timeout; it is never
//!   chosen for new writes once there.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//! use reactor::{ConnectionTimeouts, MessageHandler, Reactor};
//!
//! # async fn run(handler: Arc<dyn MessageHandler>) -> std::io::Result<()> {
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:0").await?;
//! let reactor = Reactor::new(listener, 1024, ConnectionTimeouts::default());
//! let running = Arc::new(AtomicBool::new(true));
//! reactor.serve(handler, running).await;
//! # Ok(())
//! # }
//! ```

mod connection;
mod dispatcher;

pub use connection::{Connection, ConnectionState, ConnectionTimeouts};
pub use dispatcher::{MessageHandler, StorageDispatcher};

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

/// Accepts connections and dispatches their messages to a shared handler.
pub struct Reactor {
    listener: TcpListener,
    max_connections: usize,
    timeouts: ConnectionTimeouts,
    active: Arc<AtomicUsize>,
}

impl Reactor {
    /// Builds a reactor around an already-bound listener.
    #[must_use]
    pub fn new(listener: TcpListener, max_connections: usize, timeouts: ConnectionTimeouts) -> Self {
        Self {
            listener,
            max_connections,
            timeouts,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of connections currently being served.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// The address the listener is actually bound to, useful when the
    /// configured port was `0` and the OS picked one.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the underlying socket cannot report its
    /// local address.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop until `running` is cleared. Each accepted
    /// connection is handed to its own task; `handler` is shared across
    /// all of them. The loop polls `running` on a short interval so
    /// shutdown is prompt without needing to interrupt a blocked accept.
    pub async fn serve(&self, handler: Arc<dyn MessageHandler>, running: Arc<AtomicBool>) {
        while running.load(Ordering::Acquire) {
            let accepted = tokio::time::timeout(Duration::from_millis(200), self.listener.accept()).await;
            let (stream, peer) = match accepted {
                Ok(Ok(pair)) => pair,
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "accept failed");
                    continue;
                }
                Err(_) => continue,
            };

            if self.active.load(Ordering::Acquire) >= self.max_connections {
                tracing::warn!(%peer, "max_connections reached, refusing connection");
                drop(stream);
                continue;
            }

            let connection = match Connection::accept(stream, self.timeouts) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(%peer, error = %e, "failed to configure accepted socket");
                    continue;
                }
            };

            self.active.fetch_add(1, Ordering::AcqRel);
            let active = Arc::clone(&self.active);
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                connection.serve(handler).await;
                active.fetch_sub(1, Ordering::AcqRel);
            });
        }
    }
}
