//! Per-connection state machine and read/write loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;

use wire::message::DecodeOutcome;
use wire::Message;

use crate::dispatcher::MessageHandler;

/// Lifecycle state of one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// The socket was just accepted; not yet processed a byte.
    Connecting,
    /// Normal operation: messages are read, dispatched, and replied to.
    Connected,
    /// Reserved for a future authentication handshake; the storage-plane
    /// core treats every connection as implicitly authenticated today.
    Authenticated,
    /// Shutting down: no new writes are accepted, deregistration is in
    /// progress.
    Closing,
    /// Fully torn down.
    Closed,
}

/// Configurable timeouts governing a connection's lifetime.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionTimeouts {
    /// Maximum time to wait for a read to make progress.
    pub read: Duration,
    /// Maximum time to wait for a write to make progress.
    pub write: Duration,
    /// Maximum time a connection may sit with no activity at all.
    pub idle: Duration,
}

impl Default for ConnectionTimeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(5),
            write: Duration::from_secs(5),
            idle: Duration::from_secs(5 * 60),
        }
    }
}

/// Upper bound on a buffered read: `max_message_size + header size`.
const MAX_BUFFERED: usize = wire::header::MAX_PAYLOAD as usize + wire::header::HEADER_LEN;

/// Drives one accepted socket until it closes or fails.
pub struct Connection {
    stream: TcpStream,
    state: ConnectionState,
    read_buf: Vec<u8>,
    timeouts: ConnectionTimeouts,
    messages_in: u64,
    messages_out: u64,
    bytes_in: u64,
    bytes_out: u64,
}

impl Connection {
    /// Wraps a freshly accepted socket, tuning keepalive and nodelay.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the socket options cannot be applied.
    pub fn accept(stream: TcpStream, timeouts: ConnectionTimeouts) -> std::io::Result<Self> {
        stream.set_nodelay(true)?;
        let sock_ref = socket2::SockRef::from(&stream);
        sock_ref.set_keepalive(true)?;

        Ok(Self {
            stream,
            state: ConnectionState::Connecting,
            read_buf: Vec::with_capacity(wire::header::HEADER_LEN * 4),
            timeouts,
            messages_in: 0,
            messages_out: 0,
            bytes_in: 0,
            bytes_out: 0,
        })
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Runs the connection's read-dispatch-write loop until it closes.
    pub async fn serve(mut self, handler: Arc<dyn MessageHandler>) {
        self.state = ConnectionState::Connected;
        let mut last_activity = Instant::now();
        let mut temp = vec![0u8; 64 * 1024];

        loop {
            if last_activity.elapsed() > self.timeouts.idle {
                tracing::debug!("connection idle timeout");
                break;
            }

            let read_result = tokio::time::timeout(self.timeouts.read, self.stream.read(&mut temp)).await;
            let n = match read_result {
                Ok(Ok(0)) => {
                    tracing::debug!("peer half-closed the connection");
                    break;
                }
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    tracing::debug!(error = %e, "read failed");
                    break;
                }
                Err(_) => {
                    tracing::debug!("read timeout");
                    break;
                }
            };

            last_activity = Instant::now();
            self.bytes_in += n as u64;

            if self.read_buf.len() + n > MAX_BUFFERED {
                tracing::warn!("read buffer exceeded max message size, closing connection");
                break;
            }
            self.read_buf.extend_from_slice(&temp[..n]);

            loop {
                match Message::decode(&self.read_buf) {
                    Ok(DecodeOutcome::Incomplete) => break,
                    Ok(DecodeOutcome::Complete { message, consumed }) => {
                        self.read_buf.drain(..consumed);
                        self.messages_in += 1;

                        let reply = handler.handle(&message).await;
                        let encoded = reply.encode();
                        let write_result =
                            tokio::time::timeout(self.timeouts.write, self.stream.write_all(&encoded)).await;
                        match write_result {
                            Ok(Ok(())) => {
                                self.messages_out += 1;
                                self.bytes_out += encoded.len() as u64;
                            }
                            Ok(Err(e)) => {
                                tracing::debug!(error = %e, "write failed");
                                self.state = ConnectionState::Closing;
                                return;
                            }
                            Err(_) => {
                                tracing::debug!("write timeout");
                                self.state = ConnectionState::Closing;
                                return;
                            }
                        }
                    }
                    Err(err) => {
                        tracing::debug!(error = %err, "malformed frame, closing connection");
                        self.state = ConnectionState::Closing;
                        return;
                    }
                }
            }
        }

        self.state = ConnectionState::Closing;
    }
}
