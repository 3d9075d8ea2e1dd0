//! Block id to on-disk path mapping.

use std::path::PathBuf;

/// Computes the shard-relative path for `id` under `data_dir/blocks`.
///
/// `XX` is `id mod 256` and `YY` is `(id / 256) mod 256`, both
/// hex-encoded two-digit, with the filename itself the full id as 16
/// hex digits.
#[must_use]
pub fn block_path(data_dir: &std::path::Path, id: u64) -> PathBuf {
    let xx = id % 256;
    let yy = (id / 256) % 256;
    data_dir
        .join("blocks")
        .join(format!("{xx:02x}"))
        .join(format!("{yy:02x}"))
        .join(format!("{id:016x}.dat"))
}
