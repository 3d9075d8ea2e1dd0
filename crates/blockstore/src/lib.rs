#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `blockstore` maps block ids to files on disk, writing them
//! atomically and verifying every read against a stored CRC32.
//!
//! # Design
//!
//! Block payloads live under `data_dir/blocks/XX/YY/<16 hex>.dat`
//! (sharded by two bytes of the id, see [`path::block_path`]). An
//! in-memory chained hash table keyed by `id mod 1024` tracks each
//! block's size, checksum, and timestamps so reads do not need a
//! directory lookup to know how much to read.
//!
//! # Invariants
//!
//! - A write is durable only after `fsync` and the `rename` into place
//!   complete; a crash before rename leaves no trace but a `.tmp` file.
//! - [`BlockStore::read`] always recomputes CRC32 over the full file and
//!   fails with [`wire::DistfsError::ConsistencyViolation`] on mismatch;
//!   it never deletes the corrupt file itself.
//!
//! # Errors
//!
//! [`BlockStore::read`] and [`BlockStore::delete`] fail with
//! [`wire::DistfsError::NotFound`] for an unknown id.

mod path;

pub use path::block_path;

use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use wire::DistfsError;

const BUCKET_COUNT: usize = 1024;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// In-memory record describing one stored block.
#[derive(Debug, Clone)]
pub struct BlockInfo {
    /// The block id.
    pub id: u64,
    /// Recorded payload size in bytes.
    pub size: u64,
    /// CRC32 over the payload at write time.
    pub checksum: u32,
    /// Creation time, seconds since the Unix epoch.
    pub created_time: u64,
    /// Last-write time, seconds since the Unix epoch.
    pub modified_time: u64,
    /// Last-read time, seconds since the Unix epoch.
    pub accessed_time: u64,
    /// Live reference count.
    pub ref_count: u32,
    /// Absolute path to the backing file.
    pub path: PathBuf,
}

/// Hash-sharded on-disk block storage rooted at a data directory.
pub struct BlockStore {
    data_dir: PathBuf,
    table: Mutex<Vec<Vec<BlockInfo>>>,
}

impl BlockStore {
    /// Opens a block store rooted at `data_dir`, creating the full
    /// 256x256 shard directory tree if it does not already exist.
    ///
    /// # Errors
    ///
    /// Returns [`DistfsError::SystemError`] if the directory tree cannot
    /// be created.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, DistfsError> {
        let data_dir = data_dir.into();
        let blocks_root = data_dir.join("blocks");
        for xx in 0..256u32 {
            for yy in 0..256u32 {
                let dir = blocks_root.join(format!("{xx:02x}")).join(format!("{yy:02x}"));
                fs::create_dir_all(&dir).map_err(|e| {
                    DistfsError::SystemError(format!(
                        "creating block shard directory {}: {e}",
                        dir.display()
                    ))
                })?;
            }
        }

        let mut table = Vec::with_capacity(BUCKET_COUNT);
        table.resize_with(BUCKET_COUNT, Vec::new);

        tracing::info!(data_dir = %data_dir.display(), "block store opened");

        Ok(Self {
            data_dir,
            table: Mutex::new(table),
        })
    }

    fn bucket_index(id: u64) -> usize {
        (id % BUCKET_COUNT as u64) as usize
    }

    /// Writes `data` as block `id`, replacing any prior contents.
    ///
    /// # Errors
    ///
    /// Returns [`DistfsError::SystemError`] if the write, fsync, or
    /// rename fails; the temporary file is removed on any such failure.
    pub fn write(&self, id: u64, data: &[u8]) -> Result<(), DistfsError> {
        let final_path = path::block_path(&self.data_dir, id);
        let tmp_path = final_path.with_extension("tmp");

        let write_result = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(data)?;
            file.sync_all()?;
            fs::rename(&tmp_path, &final_path)?;
            Ok(())
        })();

        if let Err(e) = write_result {
            let _ = fs::remove_file(&tmp_path);
            return Err(DistfsError::SystemError(format!(
                "writing block {id}: {e}"
            )));
        }

        let checksum = checksums::crc32(data);
        let now = now_secs();
        let info = BlockInfo {
            id,
            size: data.len() as u64,
            checksum,
            created_time: now,
            modified_time: now,
            accessed_time: now,
            ref_count: 1,
            path: final_path,
        };

        let mut table = self.table.lock().unwrap();
        let bucket = &mut table[Self::bucket_index(id)];
        bucket.retain(|existing| existing.id != id);
        bucket.push(info);
        Ok(())
    }

    /// Reads block `id` back, verifying its checksum.
    ///
    /// # Errors
    ///
    /// Returns [`DistfsError::NotFound`] if `id` is unknown,
    /// [`DistfsError::ConsistencyViolation`] if the recomputed CRC32
    /// does not match the stored one, or [`DistfsError::SystemError`]
    /// on an unexpected I/O failure.
    pub fn read(&self, id: u64) -> Result<Vec<u8>, DistfsError> {
        let (file_path, recorded_size, recorded_checksum) = {
            let table = self.table.lock().unwrap();
            let bucket = &table[Self::bucket_index(id)];
            let info = bucket
                .iter()
                .find(|info| info.id == id)
                .ok_or_else(|| DistfsError::NotFound(format!("block {id}")))?;
            (info.path.clone(), info.size, info.checksum)
        };

        let mut file = fs::File::open(&file_path)
            .map_err(|e| DistfsError::SystemError(format!("opening block {id}: {e}")))?;
        let mut buf = Vec::with_capacity(recorded_size as usize);
        file.read_to_end(&mut buf)
            .map_err(|e| DistfsError::SystemError(format!("reading block {id}: {e}")))?;

        if checksums::crc32(&buf) != recorded_checksum {
            tracing::warn!(id, "block failed checksum verification on read");
            return Err(DistfsError::ConsistencyViolation(format!(
                "block {id} failed checksum verification"
            )));
        }

        let mut table = self.table.lock().unwrap();
        let bucket = &mut table[Self::bucket_index(id)];
        if let Some(info) = bucket.iter_mut().find(|info| info.id == id) {
            info.accessed_time = now_secs();
        }

        Ok(buf)
    }

    /// Deletes block `id`'s file and its table entry.
    ///
    /// # Errors
    ///
    /// Returns [`DistfsError::NotFound`] if the file or the table entry
    /// is already gone. Any other unlink failure is returned but leaves
    /// the table entry in place so a retry can be attempted.
    pub fn delete(&self, id: u64) -> Result<(), DistfsError> {
        let file_path = {
            let table = self.table.lock().unwrap();
            let bucket = &table[Self::bucket_index(id)];
            bucket
                .iter()
                .find(|info| info.id == id)
                .map(|info| info.path.clone())
                .ok_or_else(|| DistfsError::NotFound(format!("block {id}")))?
        };

        match fs::remove_file(&file_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DistfsError::NotFound(format!("block {id}")));
            }
            Err(e) => {
                return Err(DistfsError::SystemError(format!(
                    "deleting block {id}: {e}"
                )));
            }
        }

        let mut table = self.table.lock().unwrap();
        table[Self::bucket_index(id)].retain(|info| info.id != id);
        Ok(())
    }

    /// Returns a copy of `id`'s info record, if present.
    #[must_use]
    pub fn info(&self, id: u64) -> Option<BlockInfo> {
        let table = self.table.lock().unwrap();
        table[Self::bucket_index(id)]
            .iter()
            .find(|info| info.id == id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_returns_identical_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::open(dir.path()).unwrap();

        store.write(7, b"hello").unwrap();
        let data = store.read(7).unwrap();
        assert_eq!(data, b"hello");
    }

    #[test]
    fn read_unknown_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::open(dir.path()).unwrap();
        assert!(matches!(store.read(99), Err(DistfsError::NotFound(_))));
    }

    #[test]
    fn corrupted_payload_fails_checksum_verification() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::open(dir.path()).unwrap();
        store.write(7, b"hello").unwrap();

        let info = store.info(7).unwrap();
        let mut bytes = fs::read(&info.path).unwrap();
        bytes[0] ^= 0xFF;
        fs::write(&info.path, bytes).unwrap();

        assert!(matches!(
            store.read(7),
            Err(DistfsError::ConsistencyViolation(_))
        ));
    }

    #[test]
    fn delete_removes_file_and_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::open(dir.path()).unwrap();
        store.write(7, b"hello").unwrap();

        store.delete(7).unwrap();
        assert!(store.info(7).is_none());
        assert!(matches!(store.read(7), Err(DistfsError::NotFound(_))));
    }

    #[test]
    fn deleting_an_unknown_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::open(dir.path()).unwrap();
        assert!(matches!(store.delete(42), Err(DistfsError::NotFound(_))));
    }

    #[test]
    fn rewriting_a_block_id_replaces_its_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::open(dir.path()).unwrap();
        store.write(7, b"hello").unwrap();
        store.write(7, b"goodbye!").unwrap();
        assert_eq!(store.read(7).unwrap(), b"goodbye!");
    }
}
