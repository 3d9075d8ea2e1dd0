//! Request and completion payload types.

use std::fs::File;
use std::sync::Arc;

use wire::DistfsError;

/// Caller-assigned identifier for an open file, used only to group
/// requests for ordering purposes; the engine never opens files itself.
pub type FdId = u64;

/// The operation a queued request performs.
pub enum RequestKind {
    /// Read `size` bytes starting at `offset`.
    Read {
        /// Byte offset to read from.
        offset: u64,
        /// Number of bytes to read.
        size: usize,
    },
    /// Write `data` starting at `offset`.
    Write {
        /// Byte offset to write at.
        offset: u64,
        /// Bytes to write.
        data: Vec<u8>,
    },
    /// Flush the file to stable storage.
    Sync,
}

/// A queued disk operation.
pub struct Request {
    /// Monotonic id assigned at submission time.
    pub id: u64,
    /// The file this request targets, for ordering.
    pub fd_id: FdId,
    /// The open file handle.
    pub file: Arc<File>,
    /// What to do.
    pub kind: RequestKind,
}

/// What a completed request produced on success.
#[derive(Debug)]
pub enum CompletionPayload {
    /// Bytes read, which may be shorter than requested at EOF.
    Read(Vec<u8>),
    /// Number of bytes written.
    Write(usize),
    /// The sync completed.
    Sync,
}

/// The callback invoked once a request finishes, successfully or not.
pub type Callback = Box<dyn FnOnce(u64, Result<CompletionPayload, DistfsError>) + Send + 'static>;
