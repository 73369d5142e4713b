//! Handle table: maps issued [`MemoryBlock`] handles to arena blocks.
//!
//! Each live handle owns a slot. A slot carries the handle's
//! [`BlockId`], a generation counter, and the [`BlockRef`] of the block
//! it names. Releasing a handle bumps the slot's generation and
//! recycles the slot, so any copy of the old handle stops resolving.
//! Ids are monotonic and never reused within a pool generation; the
//! [`LinearMap`] finds the slot for an id in O(1).

use nativepool_core::{BlockId, MemoryBlock, PoolError, PoolId, StaleReason};

use crate::arena::BlockRef;
use crate::linear_map::LinearMap;

#[derive(Clone, Debug)]
struct Slot {
    id: BlockId,
    generation: u32,
    block: Option<BlockRef>,
}

/// Live-handle registry for one pool.
#[derive(Clone, Debug)]
pub struct HandleTable {
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    index: LinearMap,
    next_id: u64,
    live: usize,
}

impl HandleTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_slots: Vec::new(),
            index: LinearMap::new(),
            next_id: 1,
            live: 0,
        }
    }

    /// Register `block` and return the new handle's id and generation.
    pub fn issue(&mut self, block: BlockRef) -> (BlockId, u32) {
        let id = BlockId(self.next_id);
        self.next_id += 1;

        let slot_index = match self.free_slots.pop() {
            Some(i) => {
                let slot = &mut self.slots[i as usize];
                slot.id = id;
                slot.block = Some(block);
                i
            }
            None => {
                let i = self.slots.len() as u32;
                self.slots.push(Slot {
                    id,
                    generation: 0,
                    block: Some(block),
                });
                i
            }
        };
        self.index.insert(id, slot_index);
        self.live += 1;
        (id, self.slots[slot_index as usize].generation)
    }

    fn lookup(&self, handle: &MemoryBlock, pool: PoolId) -> Result<(u32, BlockRef), StaleReason> {
        if handle.is_invalid() {
            return Err(StaleReason::Invalid);
        }
        if handle.pool() != pool {
            return Err(StaleReason::WrongPool);
        }
        let slot_index = self.index.get(handle.id()).ok_or(StaleReason::UnknownId)?;
        let slot = &self.slots[slot_index as usize];
        if slot.generation != handle.generation() {
            return Err(StaleReason::GenerationMismatch {
                current: slot.generation,
            });
        }
        let block = slot.block.ok_or(StaleReason::UnknownId)?;
        Ok((slot_index, block))
    }

    /// Find the arena block named by `handle`.
    ///
    /// # Errors
    ///
    /// [`PoolError::StaleOrUnknownHandle`] naming the first failed check:
    /// sentinel, pool identity, id liveness, then generation.
    pub fn resolve(&self, handle: &MemoryBlock, pool: PoolId) -> Result<BlockRef, PoolError> {
        self.lookup(handle, pool)
            .map(|(_, block)| block)
            .map_err(|reason| PoolError::StaleOrUnknownHandle {
                block: *handle,
                reason,
            })
    }

    /// Retire `handle`, returning the block it named.
    ///
    /// The slot's generation is bumped. A slot whose generation would
    /// wrap is retired permanently instead of being recycled.
    ///
    /// # Errors
    ///
    /// Same as [`HandleTable::resolve`]; the table is unchanged on error.
    pub fn retire(&mut self, handle: &MemoryBlock, pool: PoolId) -> Result<BlockRef, PoolError> {
        let (slot_index, block) =
            self.lookup(handle, pool)
                .map_err(|reason| PoolError::StaleOrUnknownHandle {
                    block: *handle,
                    reason,
                })?;
        self.index.remove(handle.id());
        let slot = &mut self.slots[slot_index as usize];
        slot.block = None;
        slot.id = BlockId::NONE;
        if slot.generation == u32::MAX {
            tracing::debug!(slot = slot_index, "retiring exhausted handle slot");
        } else {
            slot.generation += 1;
            self.free_slots.push(slot_index);
        }
        self.live -= 1;
        Ok(block)
    }

    /// Forget every live handle.
    ///
    /// Slots are kept and their generations bumped so that any
    /// surviving handle also fails the generation check. Ids keep
    /// counting from where they were.
    pub fn clear(&mut self) {
        self.index.clear();
        self.free_slots.clear();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            slot.id = BlockId::NONE;
            slot.block = None;
            if slot.generation < u32::MAX {
                slot.generation += 1;
                self.free_slots.push(i as u32);
            }
        }
        // Pop order hands out the lowest slot first.
        self.free_slots.reverse();
        self.live = 0;
    }

    /// Number of live handles.
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Number of slots ever allocated.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Iterate over live `(id, generation, block)` entries.
    pub fn iter_live(&self) -> impl Iterator<Item = (BlockId, u32, BlockRef)> + '_ {
        self.slots
            .iter()
            .filter_map(|s| s.block.map(|b| (s.id, s.generation, b)))
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(pool: PoolId, id: BlockId, generation: u32) -> MemoryBlock {
        MemoryBlock::new(pool, id, generation)
    }

    #[test]
    fn issue_then_resolve() {
        let pool = PoolId::next();
        let mut table = HandleTable::new();
        let (id, generation) = table.issue(BlockRef::from_raw(3));
        assert_eq!(id, BlockId(1));
        assert_eq!(generation, 0);
        let block = table.resolve(&handle(pool, id, generation), pool).unwrap();
        assert_eq!(block, BlockRef::from_raw(3));
        assert_eq!(table.live_count(), 1);
    }

    #[test]
    fn ids_are_monotonic_across_reuse() {
        let pool = PoolId::next();
        let mut table = HandleTable::new();
        let (a, ga) = table.issue(BlockRef::from_raw(0));
        table.retire(&handle(pool, a, ga), pool).unwrap();
        let (b, gb) = table.issue(BlockRef::from_raw(0));
        assert!(b > a);
        assert_eq!(gb, ga + 1);
        assert_eq!(table.slot_count(), 1);
    }

    #[test]
    fn retired_handle_is_unknown() {
        let pool = PoolId::next();
        let mut table = HandleTable::new();
        let (id, generation) = table.issue(BlockRef::from_raw(0));
        let h = handle(pool, id, generation);
        table.retire(&h, pool).unwrap();
        let err = table.resolve(&h, pool).unwrap_err();
        assert_eq!(
            err,
            PoolError::StaleOrUnknownHandle {
                block: h,
                reason: StaleReason::UnknownId
            }
        );
        assert!(table.retire(&h, pool).is_err());
        assert_eq!(table.live_count(), 0);
    }

    #[test]
    fn generation_mismatch_is_reported() {
        let pool = PoolId::next();
        let mut table = HandleTable::new();
        let (id, generation) = table.issue(BlockRef::from_raw(0));
        let forged = handle(pool, id, generation + 5);
        let err = table.resolve(&forged, pool).unwrap_err();
        assert!(matches!(
            err,
            PoolError::StaleOrUnknownHandle {
                reason: StaleReason::GenerationMismatch { current: 0 },
                ..
            }
        ));
    }

    #[test]
    fn checks_run_in_order() {
        let pool = PoolId::next();
        let other = PoolId::next();
        let mut table = HandleTable::new();
        let (id, generation) = table.issue(BlockRef::from_raw(0));

        let reason = |h: MemoryBlock| match table.resolve(&h, pool) {
            Err(PoolError::StaleOrUnknownHandle { reason, .. }) => reason,
            unexpected => panic!("expected stale error, got {unexpected:?}"),
        };
        assert_eq!(reason(MemoryBlock::INVALID), StaleReason::Invalid);
        assert_eq!(reason(handle(other, id, generation)), StaleReason::WrongPool);
        assert_eq!(reason(handle(pool, BlockId(99), 0)), StaleReason::UnknownId);
    }

    #[test]
    fn clear_invalidates_everything() {
        let pool = PoolId::next();
        let mut table = HandleTable::new();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let (id, g) = table.issue(BlockRef::from_raw(i));
                handle(pool, id, g)
            })
            .collect();
        table.clear();
        assert_eq!(table.live_count(), 0);
        for h in &handles {
            assert!(table.resolve(h, pool).is_err());
        }
        let (id, generation) = table.issue(BlockRef::from_raw(0));
        assert_eq!(id, BlockId(5));
        assert_eq!(generation, 1);
    }

    #[test]
    fn exhausted_slot_is_never_reused() {
        let pool = PoolId::next();
        let mut table = HandleTable::new();
        let (id, _) = table.issue(BlockRef::from_raw(0));
        table.slots[0].generation = u32::MAX;
        table.retire(&handle(pool, id, u32::MAX), pool).unwrap();
        let (_, generation) = table.issue(BlockRef::from_raw(1));
        assert_eq!(generation, 0);
        assert_eq!(table.slot_count(), 2);
    }

    #[test]
    fn iter_live_skips_retired() {
        let pool = PoolId::next();
        let mut table = HandleTable::new();
        let (a, ga) = table.issue(BlockRef::from_raw(0));
        let (b, _) = table.issue(BlockRef::from_raw(1));
        table.retire(&handle(pool, a, ga), pool).unwrap();
        let live: Vec<_> = table.iter_live().map(|(id, _, _)| id).collect();
        assert_eq!(live, vec![b]);
    }
}
