#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! PID file and shutdown-signal handling for the storage node process.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use thiserror::Error;

/// Errors surfaced by the platform lifecycle helpers.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The PID file already exists and names a process that is still alive.
    #[error("another storage node is already running (pid file {0:?})")]
    AlreadyRunning(PathBuf),
    /// An I/O operation on the PID file failed.
    #[error("pid file I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Guard that removes its PID file when dropped.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Writes the current process id to `path`, failing if a live
    /// process already owns the file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, PlatformError> {
        let path = path.as_ref().to_path_buf();

        if let Ok(existing) = fs::read_to_string(&path) {
            if let Ok(pid) = existing.trim().parse::<i32>() {
                if process_is_alive(pid) {
                    return Err(PlatformError::AlreadyRunning(path));
                }
            }
        }

        fs::write(&path, format!("{}\n", std::process::id()))?;
        Ok(Self { path })
    }

    /// Returns the path this guard will remove on drop.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(unix)]
fn process_is_alive(pid: i32) -> bool {
    // Signal 0 performs no action but still validates that the pid exists
    // and is visible to this process, per `kill(2)`.
    unsafe { libc::kill(pid, 0) == 0 }
}

#[cfg(not(unix))]
fn process_is_alive(_pid: i32) -> bool {
    false
}

/// Registers `SIGINT` and `SIGTERM` handlers that set a shared flag.
/// Returns the flag, which starts `false` and is driven to `true` by a
/// delivered signal; callers poll it from their own loops.
#[cfg(unix)]
pub fn install_shutdown_signals() -> Result<Arc<AtomicBool>, PlatformError> {
    let signalled = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&signalled))
        .map_err(PlatformError::Io)?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&signalled))
        .map_err(PlatformError::Io)?;
    Ok(signalled)
}

/// Registers `SIGINT`/`SIGTERM` handlers. On non-Unix targets there is no
/// signal to hook; the flag is returned as-is and callers fall back to
/// whatever external shutdown trigger their platform offers.
#[cfg(not(unix))]
pub fn install_shutdown_signals() -> Result<Arc<AtomicBool>, PlatformError> {
    Ok(Arc::new(AtomicBool::new(false)))
}
