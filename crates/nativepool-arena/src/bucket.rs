//! Size-class buckets over the arena's free blocks.
//!
//! A [`BucketIndex`] partitions free blocks by length. A free block of
//! length `L` lives in the bucket with the largest threshold `<= L`, so
//! every block in bucket `i > 0` can hold any request up to
//! `threshold(i)`. Blocks shorter than the smallest threshold share
//! bucket 0 and are checked individually.
//!
//! The arena keeps this index in sync on every carve, split, release,
//! and merge; the two are co-owned by the pool and passed together.

use indexmap::IndexMap;
use nativepool_core::PoolError;
use smallvec::SmallVec;

use crate::arena::BlockRef;

/// Smallest threshold produced by [`BucketIndex::geometric`].
pub const MIN_THRESHOLD: u32 = 16;

/// Free-block index keyed by size class.
#[derive(Clone, Debug)]
pub struct BucketIndex {
    /// Strictly ascending size thresholds, one per bucket.
    thresholds: SmallVec<[u32; 8]>,
    /// Free blocks per bucket: block → length. `IndexMap` gives O(1)
    /// insert/remove with deterministic iteration order.
    buckets: Vec<IndexMap<BlockRef, u32>>,
    /// Total number of indexed free blocks.
    free_count: usize,
}

impl BucketIndex {
    /// Build `count` thresholds spaced evenly in log2 between
    /// [`MIN_THRESHOLD`] and `capacity`.
    ///
    /// Capacity 1024 with 4 buckets yields `{16, 64, 256, 1024}`.
    /// Thresholds that would coincide for small capacities are merged,
    /// so the result may have fewer than `count` buckets. The last
    /// threshold is always `capacity` itself, so a block spanning the
    /// whole arena has a class: capacity 1008 with 4 buckets yields
    /// `{16, 64, 128, 1008}`.
    pub fn geometric(capacity: u32, count: u32) -> Self {
        let count = count.max(1);
        let hi = floor_log2(capacity.max(MIN_THRESHOLD));
        let lo = floor_log2(MIN_THRESHOLD).min(hi);
        let mut thresholds: SmallVec<[u32; 8]> = SmallVec::new();
        if count == 1 {
            thresholds.push(1 << hi);
        } else {
            let span = hi - lo;
            for i in 0..count {
                // Round to the nearest exponent so both ends are exact.
                let exp = lo + (span * i + (count - 1) / 2) / (count - 1);
                let t = 1u32 << exp;
                if thresholds.last() != Some(&t) {
                    thresholds.push(t);
                }
            }
        }
        // Every other threshold is at most `1 << hi <= capacity`.
        if let Some(last) = thresholds.last_mut() {
            *last = (*last).max(capacity);
        }
        Self::from_sorted(thresholds)
    }

    /// Build an index from explicit thresholds.
    ///
    /// Thresholds must be non-empty, non-zero, and strictly ascending.
    pub fn with_thresholds(thresholds: &[u32]) -> Result<Self, PoolError> {
        if thresholds.is_empty() {
            return Err(PoolError::InvalidConfig {
                reason: "bucket thresholds must not be empty".into(),
            });
        }
        if thresholds[0] == 0 || thresholds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PoolError::InvalidConfig {
                reason: format!(
                    "bucket thresholds must be non-zero and strictly ascending (got {thresholds:?})"
                ),
            });
        }
        Ok(Self::from_sorted(thresholds.iter().copied().collect()))
    }

    fn from_sorted(thresholds: SmallVec<[u32; 8]>) -> Self {
        let buckets = thresholds.iter().map(|_| IndexMap::new()).collect();
        Self {
            thresholds,
            buckets,
            free_count: 0,
        }
    }

    /// Bucket a free block of length `len` belongs to.
    pub fn class_of_free(&self, len: u32) -> usize {
        self.thresholds
            .partition_point(|&t| t <= len)
            .saturating_sub(1)
    }

    /// Smallest size class whose threshold is `>= len`, or the last
    /// class when `len` exceeds every threshold.
    pub fn class_for_request(&self, len: u32) -> usize {
        self.thresholds
            .partition_point(|&t| t < len)
            .min(self.thresholds.len() - 1)
    }

    /// Find a free block of at least `len` bytes.
    ///
    /// First-fit by class. Every block in a class whose threshold is
    /// `>= len` fits, so the first entry of the first non-empty such
    /// class is taken without looking at the others. Only when all of
    /// those are empty is the class straddling `len` scanned for a
    /// block long enough. Returns `None` only if no indexed block can
    /// hold `len`. Does not remove the block.
    pub fn find_fit(&self, len: u32) -> Option<(BlockRef, u32)> {
        let exact = self.thresholds.partition_point(|&t| t < len);
        let whole = self.buckets[exact..]
            .iter()
            .find_map(|bucket| bucket.first().map(|(&b, &l)| (b, l)));
        if whole.is_some() {
            return whole;
        }
        // Classes below `partial` hold blocks shorter than `len`.
        let partial = self.class_of_free(len);
        if partial >= exact {
            return None;
        }
        self.buckets[partial]
            .iter()
            .find(|(_, l)| **l >= len)
            .map(|(&b, &l)| (b, l))
    }

    /// Register a free block.
    pub fn insert(&mut self, block: BlockRef, len: u32) {
        let class = self.class_of_free(len);
        let previous = self.buckets[class].insert(block, len);
        debug_assert!(previous.is_none(), "{block:?} indexed twice");
        if previous.is_none() {
            self.free_count += 1;
        }
    }

    /// Unregister a free block. `len` must be the length it was inserted with.
    ///
    /// Returns `false` if the block was not indexed under that length.
    pub fn remove(&mut self, block: BlockRef, len: u32) -> bool {
        let class = self.class_of_free(len);
        let removed = self.buckets[class].swap_remove(&block).is_some();
        if removed {
            self.free_count -= 1;
        }
        removed
    }

    /// Number of buckets indexing `block`; 0 or 1 in a consistent index.
    pub fn occurrences(&self, block: BlockRef) -> usize {
        self.buckets
            .iter()
            .filter(|b| b.contains_key(&block))
            .count()
    }

    /// Length of the largest indexed free block, or 0 if none.
    pub fn largest_free(&self) -> u32 {
        self.buckets
            .iter()
            .rev()
            .find(|b| !b.is_empty())
            .and_then(|b| b.values().copied().max())
            .unwrap_or(0)
    }

    /// Drop every entry, keeping the thresholds.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.free_count = 0;
    }

    /// Number of size classes.
    pub fn bucket_count(&self) -> usize {
        self.thresholds.len()
    }

    /// Threshold of size class `class`.
    ///
    /// # Panics
    ///
    /// Panics if `class >= bucket_count()`.
    pub fn threshold(&self, class: usize) -> u32 {
        self.thresholds[class]
    }

    /// All thresholds in ascending order.
    pub fn thresholds(&self) -> &[u32] {
        &self.thresholds
    }

    /// Number of free blocks in size class `class`.
    pub fn bucket_len(&self, class: usize) -> usize {
        self.buckets[class].len()
    }

    /// Total number of indexed free blocks.
    pub fn free_count(&self) -> usize {
        self.free_count
    }

    /// Iterate over every indexed `(block, len, class)`.
    pub fn iter(&self) -> impl Iterator<Item = (BlockRef, u32, usize)> + '_ {
        self.buckets
            .iter()
            .enumerate()
            .flat_map(|(class, b)| b.iter().map(move |(&r, &l)| (r, l, class)))
    }
}

fn floor_log2(v: u32) -> u32 {
    31 - v.leading_zeros()
}
