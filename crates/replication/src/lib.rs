#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `replication` owns the FIFO queue of [`ReplicationTask`]s and the
//! pool of worker threads that execute them, copying a block from its
//! source node to one or more targets over [`BlockTransport`].
//!
//! # Design
//!
//! The queue is a plain `VecDeque` behind a mutex and condition
//! variable: `enqueue` pushes and notifies one waiter, workers block on
//! the condvar when the queue is empty. Target selection is always the
//! caller's responsibility; the engine neither consults a placement ring
//! nor garbage-collects tasks on its own.
//!
//! # Invariants
//!
//! - A task with at least one successful target becomes [`TaskStatus::Completed`].
//! - A task with zero successful targets becomes [`TaskStatus::Pending`]
//!   again if `retry_count < max_retries`, otherwise [`TaskStatus::Failed`].
//! - An individual target failing does not abort the task for other targets.
//!
//! # Errors
//!
//! Per-target failures are absorbed into the task's `completed_count`
//! rather than returned to the caller; [`ReplicationEngine::enqueue`]
//! itself cannot fail.

mod task;
mod transport;

pub use task::{ReplicationTask, TaskStatus};
pub use transport::BlockTransport;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

/// Default maximum number of retries before a task is permanently failed.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

struct Queue {
    tasks: Mutex<VecDeque<ReplicationTask>>,
    condvar: Condvar,
}

/// A pool of worker threads draining a FIFO replication task queue.
pub struct ReplicationEngine {
    queue: Arc<Queue>,
    running: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
    next_task_id: AtomicU64,
    completed: Arc<Mutex<Vec<ReplicationTask>>>,
}

impl ReplicationEngine {
    /// Starts `worker_count` workers against `transport`, retrying a
    /// failed task up to `max_retries` times.
    #[must_use]
    pub fn start(
        worker_count: usize,
        max_retries: u32,
        transport: Arc<dyn BlockTransport>,
    ) -> Self {
        let queue = Arc::new(Queue {
            tasks: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
        });
        let running = Arc::new(AtomicBool::new(true));
        let completed = Arc::new(Mutex::new(Vec::new()));

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let queue = Arc::clone(&queue);
            let running = Arc::clone(&running);
            let transport = Arc::clone(&transport);
            let completed = Arc::clone(&completed);
            workers.push(
                std::thread::Builder::new()
                    .name(format!("replication-worker-{worker_id}"))
                    .spawn(move || run_worker(&queue, &running, transport.as_ref(), &completed, max_retries))
                    .expect("failed to spawn replication worker thread"),
            );
        }

        Self {
            queue,
            running,
            workers,
            next_task_id: AtomicU64::new(1),
            completed,
        }
    }

    /// Enqueues a new task copying `block_id` from `source_node` to
    /// `targets`. Returns the assigned task id.
    pub fn enqueue(&self, block_id: u64, source_node: String, targets: Vec<String>) -> u64 {
        let task_id = self.next_task_id.fetch_add(1, Ordering::Relaxed);
        let task = ReplicationTask::new(task_id, block_id, source_node, targets);
        self.enqueue_task(task);
        task_id
    }

    fn enqueue_task(&self, task: ReplicationTask) {
        let mut tasks = self.queue.tasks.lock().unwrap();
        tasks.push_back(task);
        self.queue.condvar.notify_one();
    }

    /// Returns a snapshot of every task that has reached a terminal
    /// state ([`TaskStatus::Completed`] or [`TaskStatus::Failed`]).
    #[must_use]
    pub fn completed_tasks(&self) -> Vec<ReplicationTask> {
        self.completed.lock().unwrap().clone()
    }

    /// Stops accepting new work and joins every worker thread.
    pub fn stop(mut self) {
        self.running.store(false, Ordering::Release);
        self.queue.condvar.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn run_worker(
    queue: &Queue,
    running: &AtomicBool,
    transport: &dyn BlockTransport,
    completed: &Mutex<Vec<ReplicationTask>>,
    max_retries: u32,
) {
    while running.load(Ordering::Acquire) {
        let popped = {
            let mut tasks = queue.tasks.lock().unwrap();
            loop {
                if let Some(task) = tasks.pop_front() {
                    break Some(task);
                }
                if !running.load(Ordering::Acquire) {
                    break None;
                }
                let (guard, _timeout) = queue
                    .condvar
                    .wait_timeout(tasks, std::time::Duration::from_millis(100))
                    .unwrap();
                tasks = guard;
            }
        };

        let Some(task) = popped else { continue };
        execute_task(task, queue, transport, completed, max_retries);
    }
}

fn execute_task(
    mut task: ReplicationTask,
    queue: &Queue,
    transport: &dyn BlockTransport,
    completed: &Mutex<Vec<ReplicationTask>>,
    max_retries: u32,
) {
    task.status = TaskStatus::InProgress;
    task.touch();

    let payload = match transport.read_block(&task.source_node, task.block_id) {
        Ok(data) => data,
        Err(err) => {
            tracing::warn!(
                task_id = task.task_id,
                source = %task.source_node,
                error = %err,
                "replication source read failed"
            );
            finish_with_zero_successes(task, queue, completed, max_retries);
            return;
        }
    };

    let mut successes = 0usize;
    for target in &task.targets {
        match transport.write_block(target, task.block_id, &payload) {
            Ok(()) => successes += 1,
            Err(err) => {
                tracing::warn!(
                    task_id = task.task_id,
                    target = %target,
                    error = %err,
                    "replication target write failed"
                );
            }
        }
    }
    task.completed_count = successes;
    task.touch();

    if successes >= 1 {
        task.status = TaskStatus::Completed;
        completed.lock().unwrap().push(task);
    } else {
        finish_with_zero_successes(task, queue, completed, max_retries);
    }
}

fn finish_with_zero_successes(
    mut task: ReplicationTask,
    queue: &Queue,
    completed: &Mutex<Vec<ReplicationTask>>,
    max_retries: u32,
) {
    if task.retry_count < max_retries {
        task.retry_count += 1;
        task.status = TaskStatus::Pending;
        task.touch();
        let mut tasks = queue.tasks.lock().unwrap();
        tasks.push_back(task);
        queue.condvar.notify_one();
    } else {
        task.status = TaskStatus::Failed;
        task.touch();
        completed.lock().unwrap().push(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    struct FakeTransport {
        data: Vec<u8>,
        target_results: StdMutex<HashMap<String, bool>>,
    }

    impl BlockTransport for FakeTransport {
        fn read_block(&self, _node_id: &str, _block_id: u64) -> Result<Vec<u8>, wire::DistfsError> {
            Ok(self.data.clone())
        }

        fn write_block(&self, node_id: &str, _block_id: u64, _data: &[u8]) -> Result<(), wire::DistfsError> {
            let succeed = self
                .target_results
                .lock()
                .unwrap()
                .get(node_id)
                .copied()
                .unwrap_or(true);
            if succeed {
                Ok(())
            } else {
                Err(wire::DistfsError::NetworkFailure(format!("{node_id} refused")))
            }
        }
    }

    fn wait_for_completion(engine: &ReplicationEngine, expected: usize) -> Vec<ReplicationTask> {
        for _ in 0..50 {
            let tasks = engine.completed_tasks();
            if tasks.len() >= expected {
                return tasks;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        engine.completed_tasks()
    }

    #[test]
    fn task_with_all_targets_succeeding_completes() {
        let transport = Arc::new(FakeTransport {
            data: b"payload".to_vec(),
            target_results: StdMutex::new(HashMap::new()),
        });
        let engine = ReplicationEngine::start(2, DEFAULT_MAX_RETRIES, transport);
        engine.enqueue(42, "S".to_owned(), vec!["T1".to_owned(), "T2".to_owned()]);

        let tasks = wait_for_completion(&engine, 1);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, TaskStatus::Completed);
        assert_eq!(tasks[0].completed_count, 2);

        engine.stop();
    }

    #[test]
    fn task_with_partial_target_success_still_completes() {
        let mut results = HashMap::new();
        results.insert("T2".to_owned(), false);
        let transport = Arc::new(FakeTransport {
            data: b"payload".to_vec(),
            target_results: StdMutex::new(results),
        });
        let engine = ReplicationEngine::start(1, DEFAULT_MAX_RETRIES, transport);
        engine.enqueue(
            42,
            "S".to_owned(),
            vec!["T1".to_owned(), "T2".to_owned(), "T3".to_owned()],
        );

        let tasks = wait_for_completion(&engine, 1);
        assert_eq!(tasks[0].status, TaskStatus::Completed);
        assert_eq!(tasks[0].completed_count, 2);

        engine.stop();
    }

    #[test]
    fn task_with_zero_successes_retries_then_fails() {
        let mut results = HashMap::new();
        results.insert("T1".to_owned(), false);
        let transport = Arc::new(FakeTransport {
            data: b"payload".to_vec(),
            target_results: StdMutex::new(results),
        });
        let engine = ReplicationEngine::start(1, 2, transport);
        engine.enqueue(7, "S".to_owned(), vec!["T1".to_owned()]);

        let tasks = wait_for_completion(&engine, 1);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, TaskStatus::Failed);
        assert_eq!(tasks[0].retry_count, 2);

        engine.stop();
    }
}
