#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `diskio` is the asynchronous disk I/O engine storage-node components
//! submit block reads, writes, and syncs through. Every call enqueues a
//! request and returns immediately; a pool of worker threads performs
//! the actual I/O and a dedicated completion thread invokes the
//! caller's callback.
//!
//! # Design
//!
//! Requests are grouped by a caller-assigned [`FdId`] identifying the
//! file they target. At most one request per `FdId` is in flight at a
//! time: [`DiskIoEngine::submit`] dispatches immediately if the id is
//! idle, otherwise it queues behind whatever is already running, and the
//! completion thread pops the next queued request for that id once the
//! current one finishes. This is a strictly-serial realization of the
//! "same-range submit-order is completion-order" guarantee — disjoint
//! ranges on the same file still execute in submit order, which is a
//! stricter contract than required but never a violation of it.
//!
//! # Invariants
//!
//! - At most one in-flight request per [`FdId`].
//! - Requests for different `FdId`s may complete in any order.
//! - [`DiskIoEngine::stop`] drains every still-queued callback with a
//!   well-known cancellation error before returning.
//!
//! # Errors
//!
//! Callbacks receive `Err(`[`wire::DistfsError::SystemError`]`)` for I/O
//! failures and for requests still queued at shutdown.
//!
//! Positioned reads/writes use [`std::os::unix::fs::FileExt`]; this
//! crate targets Unix storage-node deployments only.

mod request;

pub use request::{Callback, CompletionPayload, FdId, Request, RequestKind};

use std::collections::{HashMap, HashSet, VecDeque};
use std::os::unix::fs::FileExt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use wire::DistfsError;

struct WorkItem {
    request: Request,
    callback: Callback,
}

struct CompletionMsg {
    fd_id: FdId,
    request_id: u64,
    result: Result<CompletionPayload, DistfsError>,
    callback: Callback,
}

struct Shared {
    queues: Mutex<HashMap<FdId, VecDeque<WorkItem>>>,
    active: Mutex<HashSet<FdId>>,
    work_tx: crossbeam_channel::Sender<WorkItem>,
}

impl Shared {
    fn dispatch(&self, item: WorkItem) {
        let fd_id = item.request.fd_id;
        let mut active = self.active.lock().unwrap();
        if active.insert(fd_id) {
            drop(active);
            let _ = self.work_tx.send(item);
        } else {
            drop(active);
            self.queues.lock().unwrap().entry(fd_id).or_default().push_back(item);
        }
    }

    fn on_completed(&self, fd_id: FdId) {
        let mut queues = self.queues.lock().unwrap();
        if let Some(next) = queues.get_mut(&fd_id).and_then(VecDeque::pop_front) {
            drop(queues);
            let _ = self.work_tx.send(next);
        } else {
            drop(queues);
            self.active.lock().unwrap().remove(&fd_id);
        }
    }

    fn drain_cancelled(&self) -> Vec<WorkItem> {
        let mut queues = self.queues.lock().unwrap();
        queues.drain().flat_map(|(_, queue)| queue).collect()
    }
}

/// The asynchronous disk I/O engine.
pub struct DiskIoEngine {
    shared: Arc<Shared>,
    next_request_id: AtomicU64,
    running: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
    completion_thread: Option<JoinHandle<()>>,
}

impl DiskIoEngine {
    /// Starts `worker_count` I/O workers plus one completion thread.
    #[must_use]
    pub fn start(worker_count: usize) -> Self {
        let (work_tx, work_rx) = crossbeam_channel::unbounded::<WorkItem>();
        let (comp_tx, comp_rx) = crossbeam_channel::unbounded::<CompletionMsg>();
        let running = Arc::new(AtomicBool::new(true));
        let shared = Arc::new(Shared {
            queues: Mutex::new(HashMap::new()),
            active: Mutex::new(HashSet::new()),
            work_tx,
        });

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let work_rx = work_rx.clone();
            let comp_tx = comp_tx.clone();
            let running = Arc::clone(&running);
            workers.push(
                std::thread::Builder::new()
                    .name(format!("diskio-worker-{worker_id}"))
                    .spawn(move || run_worker(&work_rx, &comp_tx, &running))
                    .expect("failed to spawn diskio worker thread"),
            );
        }

        let completion_thread = {
            let running = Arc::clone(&running);
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("diskio-completion".to_owned())
                .spawn(move || run_completion(&comp_rx, &running, &shared))
                .expect("failed to spawn diskio completion thread")
        };

        tracing::info!(worker_count, "disk I/O engine started");

        Self {
            shared,
            next_request_id: AtomicU64::new(1),
            running,
            workers,
            completion_thread: Some(completion_thread),
        }
    }

    fn submit(&self, fd_id: FdId, file: Arc<std::fs::File>, kind: RequestKind, callback: Callback) -> u64 {
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        if !self.running.load(Ordering::Acquire) {
            callback(id, Err(DistfsError::SystemError("engine is shut down".to_owned())));
            return id;
        }
        let request = Request { id, fd_id, file, kind };
        self.shared.dispatch(WorkItem { request, callback });
        id
    }

    /// Enqueues a read of `size` bytes at `offset`. Returns the assigned
    /// request id; the result arrives via `callback`.
    pub fn read_async(
        &self,
        fd_id: FdId,
        file: Arc<std::fs::File>,
        offset: u64,
        size: usize,
        callback: Callback,
    ) -> u64 {
        self.submit(fd_id, file, RequestKind::Read { offset, size }, callback)
    }

    /// Enqueues a write of `data` at `offset`.
    pub fn write_async(
        &self,
        fd_id: FdId,
        file: Arc<std::fs::File>,
        offset: u64,
        data: Vec<u8>,
        callback: Callback,
    ) -> u64 {
        self.submit(fd_id, file, RequestKind::Write { offset, data }, callback)
    }

    /// Enqueues an `fsync` of the file.
    pub fn sync_async(&self, fd_id: FdId, file: Arc<std::fs::File>, callback: Callback) -> u64 {
        self.submit(fd_id, file, RequestKind::Sync, callback)
    }

    /// Stops accepting new work, drains in-flight completions, joins
    /// every thread, and fails any request that was still queued (never
    /// dispatched to a worker) with a cancellation error.
    pub fn stop(mut self) {
        tracing::info!("disk I/O engine stopping");
        self.running.store(false, Ordering::Release);

        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        if let Some(completion) = self.completion_thread.take() {
            let _ = completion.join();
        }

        for item in self.shared.drain_cancelled() {
            (item.callback)(
                item.request.id,
                Err(DistfsError::SystemError("request cancelled by shutdown".to_owned())),
            );
        }
    }
}

fn run_worker(
    work_rx: &crossbeam_channel::Receiver<WorkItem>,
    comp_tx: &crossbeam_channel::Sender<CompletionMsg>,
    running: &AtomicBool,
) {
    while running.load(Ordering::Acquire) {
        match work_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(item) => {
                let fd_id = item.request.fd_id;
                let request_id = item.request.id;
                let result = execute(&item.request);
                let _ = comp_tx.send(CompletionMsg {
                    fd_id,
                    request_id,
                    result,
                    callback: item.callback,
                });
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn run_completion(
    comp_rx: &crossbeam_channel::Receiver<CompletionMsg>,
    running: &AtomicBool,
    shared: &Shared,
) {
    loop {
        match comp_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(msg) => {
                (msg.callback)(msg.request_id, msg.result);
                shared.on_completed(msg.fd_id);
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                if !running.load(Ordering::Acquire) {
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn execute(request: &Request) -> Result<CompletionPayload, DistfsError> {
    match &request.kind {
        RequestKind::Read { offset, size } => {
            let mut buf = vec![0u8; *size];
            let read = request
                .file
                .read_at(&mut buf, *offset)
                .map_err(|e| DistfsError::SystemError(format!("read failed: {e}")))?;
            buf.truncate(read);
            Ok(CompletionPayload::Read(buf))
        }
        RequestKind::Write { offset, data } => {
            request
                .file
                .write_at(data, *offset)
                .map_err(|e| DistfsError::SystemError(format!("write failed: {e}")))?;
            Ok(CompletionPayload::Write(data.len()))
        }
        RequestKind::Sync => {
            request
                .file
                .sync_all()
                .map_err(|e| DistfsError::SystemError(format!("fsync failed: {e}")))?;
            Ok(CompletionPayload::Sync)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn open_temp() -> (tempfile::TempDir, Arc<std::fs::File>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob");
        let file = std::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)
            .unwrap();
        (dir, Arc::new(file))
    }

    #[test]
    fn write_then_read_round_trips() {
        let (_dir, file) = open_temp();
        let engine = DiskIoEngine::start(2);

        let (tx, rx) = mpsc::channel();
        engine.write_async(1, Arc::clone(&file), 0, b"hello".to_vec(), Box::new(move |_, result| {
            tx.send(result).unwrap();
        }));
        rx.recv().unwrap().unwrap();

        let (tx, rx) = mpsc::channel();
        engine.read_async(1, Arc::clone(&file), 0, 5, Box::new(move |_, result| {
            tx.send(result).unwrap();
        }));
        match rx.recv().unwrap().unwrap() {
            CompletionPayload::Read(data) => assert_eq!(data, b"hello"),
            _ => panic!("expected a read payload"),
        }

        engine.stop();
    }

    #[test]
    fn requests_on_the_same_fd_complete_in_submit_order() {
        let (_dir, file) = open_temp();
        let engine = DiskIoEngine::start(4);

        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..20u64 {
            let order = Arc::clone(&order);
            engine.write_async(
                1,
                Arc::clone(&file),
                0,
                vec![i as u8],
                Box::new(move |_, _| {
                    order.lock().unwrap().push(i);
                }),
            );
        }

        std::thread::sleep(Duration::from_millis(200));
        let recorded = order.lock().unwrap().clone();
        assert_eq!(recorded, (0..20u64).collect::<Vec<_>>());

        engine.stop();
    }

    #[test]
    fn sync_completes_successfully() {
        let (_dir, file) = open_temp();
        let engine = DiskIoEngine::start(1);

        let (tx, rx) = mpsc::channel();
        engine.sync_async(1, file, Box::new(move |_, result| {
            tx.send(result).unwrap();
        }));
        assert!(matches!(rx.recv().unwrap(), Ok(CompletionPayload::Sync)));

        engine.stop();
    }
}
