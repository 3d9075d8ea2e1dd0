//! The on-disk allocator image: header, bitmap words, metadata array.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use wire::DistfsError;

use crate::bitmap::Bitmap;
use crate::metadata::{BlockMetadata, RECORD_LEN};

/// Magic identifying an allocator image file.
pub const MAGIC: u64 = 0x4449_5354_424C_4B53;
/// Current image format version.
pub const VERSION: u64 = 1;

const HEADER_LEN: usize = 8 * 5;

/// The loaded contents of an allocator image.
pub struct Image {
    /// Configured block size, for validation against the caller's expectation.
    pub block_size: u64,
    /// The reconstructed bitmap.
    pub bitmap: Bitmap,
    /// The reconstructed metadata array, indexed by block id.
    pub metadata: Vec<BlockMetadata>,
}

/// Writes `bitmap`/`metadata` to `path` in the fixed image format.
///
/// # Errors
///
/// Returns [`DistfsError::SystemError`] on I/O failure.
pub fn write_image(
    path: impl AsRef<Path>,
    block_size: u64,
    bitmap: &Bitmap,
    metadata: &[BlockMetadata],
) -> Result<(), DistfsError> {
    let tmp_path = path.as_ref().with_extension("tmp");
    let mut buf = Vec::with_capacity(
        HEADER_LEN + bitmap.words().len() * 8 + metadata.len() * RECORD_LEN,
    );

    buf.extend_from_slice(&MAGIC.to_le_bytes());
    buf.extend_from_slice(&VERSION.to_le_bytes());
    buf.extend_from_slice(&block_size.to_le_bytes());
    buf.extend_from_slice(&bitmap.total_blocks().to_le_bytes());
    buf.extend_from_slice(&bitmap.free_blocks().to_le_bytes());
    for word in bitmap.words() {
        buf.extend_from_slice(&word.to_le_bytes());
    }
    for record in metadata {
        buf.extend_from_slice(&record.encode());
    }

    let mut file = fs::File::create(&tmp_path).map_err(|e| {
        DistfsError::SystemError(format!("creating allocator image tmp file: {e}"))
    })?;
    file.write_all(&buf)
        .map_err(|e| DistfsError::SystemError(format!("writing allocator image: {e}")))?;
    file.sync_all()
        .map_err(|e| DistfsError::SystemError(format!("fsyncing allocator image: {e}")))?;
    fs::rename(&tmp_path, path.as_ref())
        .map_err(|e| DistfsError::SystemError(format!("renaming allocator image: {e}")))?;
    Ok(())
}

/// Loads an allocator image from `path`, validating it against the
/// caller's expected `block_size` and `total_blocks`.
///
/// Returns `Ok(None)` if the file does not exist, signaling the caller
/// should start from a fresh, fully-free state.
///
/// # Errors
///
/// Returns [`DistfsError::ConsistencyViolation`] if the file exists but
/// its magic, version, block size, or block count does not match what
/// the caller expects.
pub fn read_image(
    path: impl AsRef<Path>,
    expected_block_size: u64,
    expected_total_blocks: u64,
) -> Result<Option<Image>, DistfsError> {
    let mut file = match fs::File::open(path.as_ref()) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(DistfsError::FileOpenFailed(format!(
                "opening allocator image: {e}"
            )));
        }
    };

    let mut buf = Vec::new();
    file.read_to_end(&mut buf)
        .map_err(|e| DistfsError::SystemError(format!("reading allocator image: {e}")))?;

    if buf.len() < HEADER_LEN {
        return Err(DistfsError::ConsistencyViolation(
            "allocator image truncated before header".to_owned(),
        ));
    }

    let magic = u64::from_le_bytes(buf[0..8].try_into().unwrap());
    let version = u64::from_le_bytes(buf[8..16].try_into().unwrap());
    let block_size = u64::from_le_bytes(buf[16..24].try_into().unwrap());
    let total_blocks = u64::from_le_bytes(buf[24..32].try_into().unwrap());
    let free_blocks = u64::from_le_bytes(buf[32..40].try_into().unwrap());

    if magic != MAGIC {
        return Err(DistfsError::ConsistencyViolation(
            "allocator image has wrong magic".to_owned(),
        ));
    }
    if version != VERSION {
        return Err(DistfsError::ConsistencyViolation(format!(
            "allocator image has unsupported version {version}"
        )));
    }
    if block_size != expected_block_size {
        return Err(DistfsError::ConsistencyViolation(format!(
            "allocator image block_size {block_size} does not match configured {expected_block_size}"
        )));
    }
    if total_blocks != expected_total_blocks {
        return Err(DistfsError::ConsistencyViolation(format!(
            "allocator image total_blocks {total_blocks} does not match configured {expected_total_blocks}"
        )));
    }

    let word_count = total_blocks.div_ceil(64) as usize;
    let words_start = HEADER_LEN;
    let words_end = words_start + word_count * 8;
    let metadata_end = words_end + total_blocks as usize * RECORD_LEN;

    if buf.len() < metadata_end {
        return Err(DistfsError::ConsistencyViolation(
            "allocator image truncated before metadata array".to_owned(),
        ));
    }

    let mut words = Vec::with_capacity(word_count);
    for chunk in buf[words_start..words_end].chunks_exact(8) {
        words.push(u64::from_le_bytes(chunk.try_into().unwrap()));
    }

    let mut metadata = Vec::with_capacity(total_blocks as usize);
    for chunk in buf[words_end..metadata_end].chunks_exact(RECORD_LEN) {
        let mut record_buf = [0u8; RECORD_LEN];
        record_buf.copy_from_slice(chunk);
        metadata.push(BlockMetadata::decode(&record_buf));
    }

    Ok(Some(Image {
        block_size,
        bitmap: Bitmap::from_words(words, total_blocks, free_blocks),
        metadata,
    }))
}
