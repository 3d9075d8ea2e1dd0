#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `block-alloc` owns the bitmap and per-block metadata array a storage
//! node uses to hand out and reclaim block ids. All state lives in
//! memory for O(1) operations; [`Allocator::sync`] writes a compact
//! on-disk image for durability across restarts.
//!
//! # Design
//!
//! The bitmap scans word-by-word (64 bits at a time), skipping fully
//! allocated words, so `allocate` costs O(total_blocks / 64) in the
//! worst case rather than a bit-by-bit scan. Metadata is a flat
//! `Vec<BlockMetadata>` indexed directly by block id.
//!
//! # Invariants
//!
//! - After any sequence of `allocate`/`free` calls, the bitmap's set-bit
//!   count equals `total_blocks - free_count()`.
//! - For every allocated id, `ref_count >= 1` and `created_time <= modified_time`.
//! - [`Allocator::allocate_batch`] leaves the bitmap unchanged on a
//!   `StorageFull` failure.
//!
//! # Errors
//!
//! [`Allocator::allocate`] and [`Allocator::allocate_batch`] fail with
//! [`wire::DistfsError::StorageFull`] when no ids remain.
//! [`Allocator::free`] fails with [`wire::DistfsError::InvalidParam`] for
//! an id that is not currently allocated. [`Allocator::open`] fails with
//! [`wire::DistfsError::ConsistencyViolation`] if an existing image's
//! magic, version, block size, or block count does not match.

mod bitmap;
mod image;
mod metadata;

pub use bitmap::Bitmap;
pub use metadata::{BlockMetadata, BlockStatus};

use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use wire::DistfsError;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// A persistent block allocator: a bitmap plus a parallel metadata array.
pub struct Allocator {
    bitmap: Mutex<Bitmap>,
    metadata: RwLock<Vec<BlockMetadata>>,
    block_size: u64,
    image_path: PathBuf,
}

impl Allocator {
    /// Opens (or initializes) an allocator rooted at `image_path`.
    ///
    /// If no image file exists yet, a fresh, fully-free state for
    /// `total_blocks` ids is used. If one exists, it must match
    /// `block_size` and `total_blocks` exactly.
    ///
    /// # Errors
    ///
    /// Returns [`DistfsError::ConsistencyViolation`] on a parameter
    /// mismatch against an existing image, or [`DistfsError::SystemError`]
    /// on an unexpected I/O failure reading it.
    pub fn open(
        image_path: impl AsRef<Path>,
        block_size: u64,
        total_blocks: u64,
    ) -> Result<Self, DistfsError> {
        let image_path = image_path.as_ref().to_path_buf();
        match image::read_image(&image_path, block_size, total_blocks)? {
            Some(image) => Ok(Self {
                bitmap: Mutex::new(image.bitmap),
                metadata: RwLock::new(image.metadata),
                block_size: image.block_size,
                image_path,
            }),
            None => {
                tracing::info!(path = %image_path.display(), "no allocator image found, starting fresh");
                let metadata = (0..total_blocks).map(BlockMetadata::empty).collect();
                Ok(Self {
                    bitmap: Mutex::new(Bitmap::new(total_blocks)),
                    metadata: RwLock::new(metadata),
                    block_size,
                    image_path,
                })
            }
        }
    }

    /// The block size this allocator was opened with.
    #[must_use]
    pub const fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Allocates and returns the lowest free block id.
    ///
    /// # Errors
    ///
    /// Returns [`DistfsError::StorageFull`] if no ids remain.
    pub fn allocate(&self) -> Result<u64, DistfsError> {
        let id = {
            let mut bitmap = self.bitmap.lock().unwrap();
            let id = bitmap
                .find_first_free()
                .ok_or(DistfsError::StorageFull)?;
            bitmap.set(id);
            id
        };
        self.init_metadata_for(id);
        Ok(id)
    }

    /// Allocates `n` ids in one call, rolling the bitmap back to its
    /// prior state if not all `n` can be satisfied.
    ///
    /// The ids returned are not guaranteed to be the lowest `n` free
    /// ids; only that they are distinct and newly allocated.
    ///
    /// # Errors
    ///
    /// Returns [`DistfsError::StorageFull`] if fewer than `n` ids are
    /// free; the bitmap is left exactly as it was before the call.
    pub fn allocate_batch(&self, n: u64) -> Result<Vec<u64>, DistfsError> {
        let ids = {
            let mut bitmap = self.bitmap.lock().unwrap();
            let mut ids = Vec::with_capacity(n as usize);
            let mut failed = false;
            for _ in 0..n {
                match bitmap.find_first_free() {
                    Some(id) => {
                        bitmap.set(id);
                        ids.push(id);
                    }
                    None => {
                        failed = true;
                        break;
                    }
                }
            }
            if failed {
                for &id in &ids {
                    bitmap.clear(id);
                }
                return Err(DistfsError::StorageFull);
            }
            ids
        };
        for &id in &ids {
            self.init_metadata_for(id);
        }
        Ok(ids)
    }

    fn init_metadata_for(&self, id: u64) {
        let now = now_secs();
        let mut metadata = self.metadata.write().unwrap();
        metadata[id as usize] = BlockMetadata {
            id,
            ref_count: 1,
            status: BlockStatus::Allocated,
            created_time: now,
            modified_time: now,
        };
    }

    /// Frees `id`, clearing its bitmap bit and zeroing its metadata
    /// (preserving the id itself).
    ///
    /// # Errors
    ///
    /// Returns [`DistfsError::InvalidParam`] if `id` is not currently
    /// allocated, including when called a second time on the same id.
    pub fn free(&self, id: u64) -> Result<(), DistfsError> {
        {
            let mut bitmap = self.bitmap.lock().unwrap();
            if !bitmap.is_set(id) {
                return Err(DistfsError::InvalidParam(format!(
                    "block {id} is not allocated"
                )));
            }
            bitmap.clear(id);
        }
        let mut metadata = self.metadata.write().unwrap();
        metadata[id as usize] = BlockMetadata::empty(id);
        Ok(())
    }

    /// Reports whether `id` is currently allocated.
    #[must_use]
    pub fn is_allocated(&self, id: u64) -> bool {
        self.bitmap.lock().unwrap().is_set(id)
    }

    /// Number of ids currently unallocated.
    #[must_use]
    pub fn free_count(&self) -> u64 {
        self.bitmap.lock().unwrap().free_blocks()
    }

    /// Total number of potential block ids.
    #[must_use]
    pub fn total_blocks(&self) -> u64 {
        self.bitmap.lock().unwrap().total_blocks()
    }

    /// Returns a copy of `id`'s metadata record.
    #[must_use]
    pub fn get_metadata(&self, id: u64) -> BlockMetadata {
        self.metadata.read().unwrap()[id as usize]
    }

    /// Overwrites `id`'s metadata record.
    pub fn set_metadata(&self, id: u64, record: BlockMetadata) {
        self.metadata.write().unwrap()[id as usize] = record;
    }

    /// Writes the current bitmap and metadata array to the image file.
    /// Idempotent: calling it twice in a row with no intervening
    /// mutation writes the same bytes both times.
    ///
    /// # Errors
    ///
    /// Returns [`DistfsError::SystemError`] on I/O failure.
    pub fn sync(&self) -> Result<(), DistfsError> {
        let bitmap = self.bitmap.lock().unwrap();
        let metadata = self.metadata.read().unwrap();
        image::write_image(&self.image_path, self.block_size, &bitmap, &metadata)
    }
}
