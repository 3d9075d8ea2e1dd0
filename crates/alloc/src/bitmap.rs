//! The packed bit array backing block allocation.

/// One bit per potential block id; a set bit means allocated.
#[derive(Debug, Clone)]
pub struct Bitmap {
    words: Vec<u64>,
    total_blocks: u64,
    free_blocks: u64,
}

impl Bitmap {
    /// Creates a fully-free bitmap for `total_blocks` ids.
    #[must_use]
    pub fn new(total_blocks: u64) -> Self {
        let word_count = total_blocks.div_ceil(64) as usize;
        Self {
            words: vec![0u64; word_count],
            total_blocks,
            free_blocks: total_blocks,
        }
    }

    /// Rebuilds a bitmap from raw words read off disk.
    #[must_use]
    pub fn from_words(words: Vec<u64>, total_blocks: u64, free_blocks: u64) -> Self {
        Self {
            words,
            total_blocks,
            free_blocks,
        }
    }

    /// Raw words, for serialization.
    #[must_use]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Total number of potential block ids.
    #[must_use]
    pub const fn total_blocks(&self) -> u64 {
        self.total_blocks
    }

    /// Number of ids currently unallocated.
    #[must_use]
    pub const fn free_blocks(&self) -> u64 {
        self.free_blocks
    }

    /// Number of ids currently allocated; kept consistent with
    /// `free_blocks` at every call boundary.
    #[must_use]
    pub const fn allocated_blocks(&self) -> u64 {
        self.total_blocks - self.free_blocks
    }

    #[must_use]
    pub fn is_set(&self, id: u64) -> bool {
        let word = self.words[(id / 64) as usize];
        (word >> (id % 64)) & 1 == 1
    }

    /// Scans word by word, skipping fully-allocated words, and returns
    /// the lowest free id, or `None` if the bitmap is full.
    #[must_use]
    pub fn find_first_free(&self) -> Option<u64> {
        for (word_idx, &word) in self.words.iter().enumerate() {
            if word == u64::MAX {
                continue;
            }
            let bit = (!word).trailing_zeros();
            let id = (word_idx as u64) * 64 + u64::from(bit);
            if id < self.total_blocks {
                return Some(id);
            }
        }
        None
    }

    /// Sets the bit for `id` and decrements the free count. Caller
    /// ensures `id` was previously free.
    pub fn set(&mut self, id: u64) {
        self.words[(id / 64) as usize] |= 1 << (id % 64);
        self.free_blocks -= 1;
    }

    /// Clears the bit for `id` and increments the free count. Caller
    /// ensures `id` was previously allocated.
    pub fn clear(&mut self, id: u64) {
        self.words[(id / 64) as usize] &= !(1 << (id % 64));
        self.free_blocks += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_bitmap_is_fully_free() {
        let bitmap = Bitmap::new(64);
        assert_eq!(bitmap.free_blocks(), 64);
        assert_eq!(bitmap.find_first_free(), Some(0));
    }

    #[test]
    fn set_and_clear_adjust_free_count() {
        let mut bitmap = Bitmap::new(64);
        bitmap.set(0);
        assert_eq!(bitmap.free_blocks(), 63);
        assert!(bitmap.is_set(0));
        bitmap.clear(0);
        assert_eq!(bitmap.free_blocks(), 64);
        assert!(!bitmap.is_set(0));
    }

    #[test]
    fn find_first_free_skips_full_words() {
        let mut bitmap = Bitmap::new(128);
        for id in 0..64 {
            bitmap.set(id);
        }
        assert_eq!(bitmap.find_first_free(), Some(64));
    }

    #[test]
    fn find_first_free_respects_total_blocks_tail() {
        let mut bitmap = Bitmap::new(65);
        for id in 0..64 {
            bitmap.set(id);
        }
        assert_eq!(bitmap.find_first_free(), Some(64));
        bitmap.set(64);
        assert_eq!(bitmap.find_first_free(), None);
    }
}
