//! Open-addressing map from [`BlockId`] to handle-table slot.
//!
//! Linear probing over a power-of-two table, hashed with foldhash's
//! fixed-seed hasher so probe sequences are reproducible across runs.
//! Deletion uses backward shifting, so there are no tombstones and
//! lookups never degrade after heavy churn.

use std::hash::BuildHasher;

use foldhash::fast::FixedState;
use nativepool_core::BlockId;

const MIN_CAPACITY: usize = 8;

/// `BlockId -> u32` map with linear probing.
#[derive(Clone, Debug)]
pub struct LinearMap {
    entries: Vec<Option<(BlockId, u32)>>,
    len: usize,
    hasher: FixedState,
}

impl LinearMap {
    /// Create an empty map with the minimum table size.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty map able to hold `capacity` entries without rehashing.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut table = MIN_CAPACITY;
        while table * 7 / 8 < capacity {
            table *= 2;
        }
        Self {
            entries: vec![None; table],
            len: 0,
            hasher: FixedState::default(),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of table positions.
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    fn mask(&self) -> usize {
        self.entries.len() - 1
    }

    fn home(&self, id: BlockId) -> usize {
        self.hasher.hash_one(id.0) as usize & self.mask()
    }

    fn find(&self, id: BlockId) -> Option<usize> {
        let mask = self.mask();
        let mut pos = self.home(id);
        loop {
            match self.entries[pos] {
                None => return None,
                Some((key, _)) if key == id => return Some(pos),
                Some(_) => pos = (pos + 1) & mask,
            }
        }
    }

    /// Look up the slot for `id`.
    pub fn get(&self, id: BlockId) -> Option<u32> {
        self.find(id).and_then(|pos| self.entries[pos].map(|(_, v)| v))
    }

    /// Whether `id` has an entry.
    pub fn contains(&self, id: BlockId) -> bool {
        self.find(id).is_some()
    }

    /// Insert or overwrite, returning the previous value.
    pub fn insert(&mut self, id: BlockId, value: u32) -> Option<u32> {
        if (self.len + 1) * 8 > self.entries.len() * 7 {
            self.rehash(self.entries.len() * 2);
        }
        let mask = self.mask();
        let mut pos = self.home(id);
        loop {
            match self.entries[pos] {
                None => {
                    self.entries[pos] = Some((id, value));
                    self.len += 1;
                    return None;
                }
                Some((key, _)) if key == id => {
                    return self.entries[pos].replace((id, value)).map(|(_, v)| v);
                }
                Some(_) => pos = (pos + 1) & mask,
            }
        }
    }

    /// Remove `id`, returning its value.
    pub fn remove(&mut self, id: BlockId) -> Option<u32> {
        let mut hole = self.find(id)?;
        let (_, value) = self.entries[hole].take()?;
        self.len -= 1;

        // Backward shift: pull later entries of the same cluster into the
        // hole when the hole lies on their probe path.
        let mask = self.mask();
        let mut pos = (hole + 1) & mask;
        while let Some((key, _)) = self.entries[pos] {
            let home = self.home(key);
            let dist_to_pos = pos.wrapping_sub(home) & mask;
            let dist_to_hole = hole.wrapping_sub(home) & mask;
            if dist_to_hole < dist_to_pos {
                self.entries[hole] = self.entries[pos].take();
                hole = pos;
            }
            pos = (pos + 1) & mask;
        }
        Some(value)
    }

    /// Remove every entry, keeping the table size.
    pub fn clear(&mut self) {
        self.entries.iter_mut().for_each(|e| *e = None);
        self.len = 0;
    }

    /// Iterate over entries in table order.
    pub fn iter(&self) -> impl Iterator<Item = (BlockId, u32)> + '_ {
        self.entries.iter().filter_map(|e| *e)
    }

    fn rehash(&mut self, new_capacity: usize) {
        let old = std::mem::replace(&mut self.entries, vec![None; new_capacity]);
        self.len = 0;
        for (id, value) in old.into_iter().flatten() {
            self.insert(id, value);
        }
    }
}

impl Default for LinearMap {
    fn default() -> Self {
        Self::new()
    }
}
