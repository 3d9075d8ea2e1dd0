//! Replication task records.

use std::time::{SystemTime, UNIX_EPOCH};

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Lifecycle status of a replication task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Waiting in the queue or re-queued after a failed attempt.
    Pending,
    /// A worker has taken the task and is executing it.
    InProgress,
    /// At least one target succeeded.
    Completed,
    /// Every target failed and retries are exhausted.
    Failed,
}

/// A unit of work that copies one block from a source node to up to `R`
/// target nodes.
#[derive(Debug, Clone)]
pub struct ReplicationTask {
    /// Unique task id.
    pub task_id: u64,
    /// The block to copy.
    pub block_id: u64,
    /// The node to read the block from.
    pub source_node: String,
    /// Nodes to write the block to.
    pub targets: Vec<String>,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Number of times this task has been retried.
    pub retry_count: u32,
    /// Number of targets that succeeded on the most recent attempt.
    pub completed_count: usize,
    /// Creation time, seconds since the Unix epoch.
    pub created_time: u64,
    /// Last-update time, seconds since the Unix epoch.
    pub updated_time: u64,
}

impl ReplicationTask {
    /// Creates a new, `Pending` task.
    #[must_use]
    pub fn new(task_id: u64, block_id: u64, source_node: String, targets: Vec<String>) -> Self {
        let now = now_secs();
        Self {
            task_id,
            block_id,
            source_node,
            targets,
            status: TaskStatus::Pending,
            retry_count: 0,
            completed_count: 0,
            created_time: now,
            updated_time: now,
        }
    }

    pub(crate) fn touch(&mut self) {
        self.updated_time = now_secs();
    }
}
