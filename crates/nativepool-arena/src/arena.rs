//! The byte arena and its block bookkeeping.
//!
//! A [`BlockArena`] owns one contiguous `Vec<u8>` and tiles it with
//! blocks. Blocks are nodes in a slab, linked to their address-order
//! neighbours so that release can coalesce in O(1). At all times the
//! blocks cover `[0, capacity)` exactly, with no gaps and no overlaps.
//!
//! The arena never searches for space itself; it asks the
//! [`BucketIndex`] passed alongside it, and reports every free-block
//! change back to that index.

use nativepool_core::PoolError;

use crate::bucket::BucketIndex;

/// Index of a block node inside a [`BlockArena`].
///
/// Internal to the pool. External code holds
/// [`MemoryBlock`](nativepool_core::MemoryBlock) handles instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockRef(u32);

impl BlockRef {
    /// Wrap a raw node index.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// The raw node index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Whether a block is handed out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockState {
    /// Indexed in exactly one bucket, available for carving.
    Free,
    /// Handed out; indexed in no bucket.
    InUse,
}

/// Read-only view of one block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockView {
    /// Byte offset of the block within the arena.
    pub offset: u32,
    /// Block length in bytes.
    pub len: u32,
    /// Free or in use.
    pub state: BlockState,
}

impl BlockView {
    /// One past the last byte of the block.
    pub fn end(&self) -> u32 {
        self.offset + self.len
    }
}

#[derive(Clone, Copy, Debug)]
struct BlockNode {
    offset: u32,
    len: u32,
    state: BlockState,
    /// Neighbour at the next lower address.
    prev: Option<BlockRef>,
    /// Neighbour at the next higher address.
    next: Option<BlockRef>,
    /// False once the node has been merged away and sits on the node free list.
    live: bool,
}

/// Contiguous byte buffer subdivided into free and in-use blocks.
#[derive(Debug)]
pub struct BlockArena {
    /// Backing storage. Zero-initialised; grows only through [`BlockArena::reset`].
    data: Vec<u8>,
    /// Block nodes, live and dead.
    nodes: Vec<BlockNode>,
    /// Dead node slots available for reuse.
    free_nodes: Vec<BlockRef>,
    /// The block at offset 0. Merges always keep the lower node, so the
    /// head never dies.
    head: BlockRef,
    /// Bytes in in-use blocks.
    used: usize,
    /// Number of in-use blocks.
    in_use: usize,
}

impl BlockArena {
    /// Create an arena of `capacity` bytes holding one free block, and
    /// register that block in `buckets`.
    ///
    /// `buckets` must be empty.
    pub fn new(capacity: u32, buckets: &mut BucketIndex) -> Self {
        let mut arena = Self {
            data: Vec::new(),
            nodes: Vec::new(),
            free_nodes: Vec::new(),
            head: BlockRef(0),
            used: 0,
            in_use: 0,
        };
        arena.reset(capacity, buckets);
        arena
    }

    /// Forget every block and re-tile the arena as a single free block of
    /// `capacity` bytes.
    ///
    /// Existing bytes are kept (the buffer is resized, not reallocated
    /// from scratch); new bytes are zero. `buckets` is cleared and then
    /// receives the new block.
    pub fn reset(&mut self, capacity: u32, buckets: &mut BucketIndex) {
        self.data.resize(capacity as usize, 0);
        self.nodes.clear();
        self.free_nodes.clear();
        self.used = 0;
        self.in_use = 0;
        buckets.clear();

        self.nodes.push(BlockNode {
            offset: 0,
            len: capacity,
            state: BlockState::Free,
            prev: None,
            next: None,
            live: true,
        });
        self.head = BlockRef(0);
        buckets.insert(self.head, capacity);
    }

    /// Carve an in-use block of exactly `len` bytes out of the first fit
    /// the bucket index offers.
    ///
    /// The remainder of the chosen free block (if any) becomes a new free
    /// block directly after the carved one.
    ///
    /// # Errors
    ///
    /// - [`PoolError::InvalidRequest`] if `len == 0`.
    /// - [`PoolError::OutOfSpace`] if no single free block can hold `len`.
    pub fn carve(&mut self, len: u32, buckets: &mut BucketIndex) -> Result<BlockRef, PoolError> {
        if len == 0 {
            return Err(PoolError::InvalidRequest { requested: 0 });
        }
        let Some((block, block_len)) = buckets.find_fit(len) else {
            return Err(PoolError::OutOfSpace {
                requested: len as usize,
                largest_free: buckets.largest_free() as usize,
            });
        };
        let removed = buckets.remove(block, block_len);
        debug_assert!(removed, "bucket entry for {block:?} vanished");

        let node = self.nodes[block.index()];
        debug_assert!(node.live && node.state == BlockState::Free);
        debug_assert_eq!(node.len, block_len);

        let remainder = block_len - len;
        if remainder > 0 {
            let split = self.alloc_node(BlockNode {
                offset: node.offset + len,
                len: remainder,
                state: BlockState::Free,
                prev: Some(block),
                next: node.next,
                live: true,
            });
            if let Some(next) = node.next {
                self.nodes[next.index()].prev = Some(split);
            }
            self.nodes[block.index()].next = Some(split);
            self.nodes[block.index()].len = len;
            buckets.insert(split, remainder);
        }

        self.nodes[block.index()].state = BlockState::InUse;
        self.used += len as usize;
        self.in_use += 1;
        tracing::trace!(offset = node.offset, len, remainder, "carved block");
        Ok(block)
    }

    /// Return an in-use block to the free pool, merging it with free
    /// address neighbours.
    ///
    /// Returns the coalesced free block, or `None` (leaving the arena
    /// untouched) if `block` is not a live in-use block.
    pub fn release(&mut self, block: BlockRef, buckets: &mut BucketIndex) -> Option<BlockRef> {
        let node = *self.nodes.get(block.index())?;
        if !node.live || node.state != BlockState::InUse {
            return None;
        }
        self.nodes[block.index()].state = BlockState::Free;
        self.used -= node.len as usize;
        self.in_use -= 1;

        let mut merged = block;
        if let Some(prev) = node.prev {
            let prev_node = self.nodes[prev.index()];
            if prev_node.state == BlockState::Free {
                buckets.remove(prev, prev_node.len);
                self.nodes[prev.index()].len += self.nodes[merged.index()].len;
                self.unlink(merged);
                merged = prev;
            }
        }
        if let Some(next) = self.nodes[merged.index()].next {
            let next_node = self.nodes[next.index()];
            if next_node.state == BlockState::Free {
                buckets.remove(next, next_node.len);
                self.nodes[merged.index()].len += next_node.len;
                self.unlink(next);
            }
        }

        let merged_len = self.nodes[merged.index()].len;
        buckets.insert(merged, merged_len);
        tracing::trace!(
            offset = node.offset,
            len = node.len,
            merged_len,
            "released block"
        );
        Some(merged)
    }

    /// Detach a node from the address list and recycle its slot.
    fn unlink(&mut self, block: BlockRef) {
        let node = self.nodes[block.index()];
        if let Some(prev) = node.prev {
            self.nodes[prev.index()].next = node.next;
        }
        if let Some(next) = node.next {
            self.nodes[next.index()].prev = node.prev;
        }
        let dead = &mut self.nodes[block.index()];
        dead.live = false;
        dead.prev = None;
        dead.next = None;
        self.free_nodes.push(block);
    }

    fn alloc_node(&mut self, node: BlockNode) -> BlockRef {
        if let Some(slot) = self.free_nodes.pop() {
            self.nodes[slot.index()] = node;
            slot
        } else {
            let slot = BlockRef(self.nodes.len() as u32);
            self.nodes.push(node);
            slot
        }
    }

    /// View a live block, or `None` if `block` is dead or out of range.
    pub fn block(&self, block: BlockRef) -> Option<BlockView> {
        let node = self.nodes.get(block.index())?;
        node.live.then_some(BlockView {
            offset: node.offset,
            len: node.len,
            state: node.state,
        })
    }

    /// Bytes of a block.
    ///
    /// # Panics
    ///
    /// Panics if the range exceeds the arena.
    pub fn bytes(&self, view: &BlockView) -> &[u8] {
        &self.data[view.offset as usize..view.end() as usize]
    }

    /// Mutable bytes of a block.
    ///
    /// # Panics
    ///
    /// Panics if the range exceeds the arena.
    pub fn bytes_mut(&mut self, view: &BlockView) -> &mut [u8] {
        &mut self.data[view.offset as usize..view.end() as usize]
    }

    /// Iterate over live blocks in address order.
    pub fn iter_blocks(&self) -> impl Iterator<Item = (BlockRef, BlockView)> + '_ {
        let mut cursor = Some(self.head);
        std::iter::from_fn(move || {
            let current = cursor?;
            let node = &self.nodes[current.index()];
            cursor = node.next;
            Some((
                current,
                BlockView {
                    offset: node.offset,
                    len: node.len,
                    state: node.state,
                },
            ))
        })
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes in in-use blocks.
    pub fn used_bytes(&self) -> usize {
        self.used
    }

    /// Bytes in free blocks.
    pub fn free_bytes(&self) -> usize {
        self.data.len() - self.used
    }

    /// Number of in-use blocks.
    pub fn in_use_count(&self) -> usize {
        self.in_use
    }

    /// Number of live blocks, free and in use.
    pub fn block_count(&self) -> usize {
        self.nodes.len() - self.free_nodes.len()
    }

    /// Check the tiling and bucket invariants.
    ///
    /// Walks the address list and verifies that blocks tile
    /// `[0, capacity)` exactly, that neighbour links agree, that no two
    /// free blocks are adjacent, that every free block is indexed in
    /// exactly one bucket under its current length, and that no in-use
    /// block is indexed. Returns a description of the first violation.
    pub fn verify(&self, buckets: &BucketIndex) -> Result<(), String> {
        let mut expected_offset = 0u64;
        let mut prev: Option<(BlockRef, BlockState)> = None;
        let mut free_blocks = 0usize;
        let mut used = 0usize;
        let mut in_use = 0usize;
        let mut visited = 0usize;

        for (block, view) in self.iter_blocks() {
            visited += 1;
            if visited > self.nodes.len() {
                return Err("address list contains a cycle".into());
            }
            if !self.nodes[block.index()].live {
                return Err(format!("{block:?} is dead but linked"));
            }
            if u64::from(view.offset) != expected_offset {
                return Err(format!(
                    "{block:?} starts at {} but previous block ended at {expected_offset}",
                    view.offset
                ));
            }
            if view.len == 0 {
                return Err(format!("{block:?} has zero length"));
            }
            if self.nodes[block.index()].prev != prev.map(|(r, _)| r) {
                return Err(format!("{block:?} has a stale prev link"));
            }
            match view.state {
                BlockState::Free => {
                    if let Some((p, BlockState::Free)) = prev {
                        return Err(format!("free blocks {p:?} and {block:?} are adjacent"));
                    }
                    free_blocks += 1;
                    let class = buckets.class_of_free(view.len);
                    if buckets.occurrences(block) != 1 {
                        return Err(format!("free {block:?} is not indexed exactly once"));
                    }
                    if !buckets.iter().any(|(r, l, c)| r == block && l == view.len && c == class) {
                        return Err(format!("free {block:?} is indexed under the wrong length"));
                    }
                }
                BlockState::InUse => {
                    if buckets.occurrences(block) != 0 {
                        return Err(format!("in-use {block:?} is indexed in a bucket"));
                    }
                    used += view.len as usize;
                    in_use += 1;
                }
            }
            expected_offset += u64::from(view.len);
            prev = Some((block, view.state));
        }

        if expected_offset != self.data.len() as u64 {
            return Err(format!(
                "blocks cover {expected_offset} bytes of {}",
                self.data.len()
            ));
        }
        if free_blocks != buckets.free_count() {
            return Err(format!(
                "{free_blocks} free blocks but {} bucket entries",
                buckets.free_count()
            ));
        }
        if used != self.used || in_use != self.in_use {
            return Err(format!(
                "counters say {} bytes in {} blocks, walk found {used} in {in_use}",
                self.used, self.in_use
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_arena(capacity: u32) -> (BlockArena, BucketIndex) {
        let mut buckets = BucketIndex::geometric(capacity, 4);
        let arena = BlockArena::new(capacity, &mut buckets);
        (arena, buckets)
    }

    fn layout(arena: &BlockArena) -> Vec<(u32, u32, BlockState)> {
        arena
            .iter_blocks()
            .map(|(_, v)| (v.offset, v.len, v.state))
            .collect()
    }

    #[test]
    fn new_arena_is_one_free_block() {
        let (arena, buckets) = make_arena(1024);
        assert_eq!(layout(&arena), vec![(0, 1024, BlockState::Free)]);
        assert_eq!(buckets.free_count(), 1);
        assert_eq!(arena.free_bytes(), 1024);
        arena.verify(&buckets).unwrap();
    }

    #[test]
    fn carve_splits_off_remainder() {
        let (mut arena, mut buckets) = make_arena(1024);
        let a = arena.carve(16, &mut buckets).unwrap();
        assert_eq!(
            layout(&arena),
            vec![(0, 16, BlockState::InUse), (16, 1008, BlockState::Free)]
        );
        assert_eq!(arena.block(a).unwrap().len, 16);
        assert_eq!(arena.used_bytes(), 16);
        arena.verify(&buckets).unwrap();
    }

    #[test]
    fn carve_exact_fit_leaves_no_remainder() {
        let (mut arena, mut buckets) = make_arena(1024);
        arena.carve(1024, &mut buckets).unwrap();
        assert_eq!(layout(&arena), vec![(0, 1024, BlockState::InUse)]);
        assert_eq!(buckets.free_count(), 0);
        arena.verify(&buckets).unwrap();
    }

    #[test]
    fn carve_zero_is_invalid_request() {
        let (mut arena, mut buckets) = make_arena(1024);
        let result = arena.carve(0, &mut buckets);
        assert!(matches!(result, Err(PoolError::InvalidRequest { .. })));
        assert_eq!(arena.used_bytes(), 0);
    }

    #[test]
    fn carve_fails_when_no_block_is_large_enough() {
        let (mut arena, mut buckets) = make_arena(1024);
        arena.carve(512, &mut buckets).unwrap();
        let result = arena.carve(600, &mut buckets);
        assert_eq!(
            result,
            Err(PoolError::OutOfSpace {
                requested: 600,
                largest_free: 512
            })
        );
        arena.verify(&buckets).unwrap();
    }

    #[test]
    fn release_merges_with_next() {
        let (mut arena, mut buckets) = make_arena(1024);
        let a = arena.carve(100, &mut buckets).unwrap();
        let merged = arena.release(a, &mut buckets).unwrap();
        assert_eq!(merged, a);
        assert_eq!(layout(&arena), vec![(0, 1024, BlockState::Free)]);
        arena.verify(&buckets).unwrap();
    }

    #[test]
    fn release_merges_with_prev_and_next() {
        let (mut arena, mut buckets) = make_arena(1024);
        let a = arena.carve(100, &mut buckets).unwrap();
        let b = arena.carve(100, &mut buckets).unwrap();
        let c = arena.carve(100, &mut buckets).unwrap();
        arena.release(a, &mut buckets).unwrap();
        arena.release(c, &mut buckets).unwrap();
        assert_eq!(
            layout(&arena),
            vec![
                (0, 100, BlockState::Free),
                (100, 100, BlockState::InUse),
                (200, 824, BlockState::Free),
            ]
        );
        let merged = arena.release(b, &mut buckets).unwrap();
        assert_eq!(merged, a);
        assert_eq!(layout(&arena), vec![(0, 1024, BlockState::Free)]);
        assert_eq!(arena.block_count(), 1);
        arena.verify(&buckets).unwrap();
    }

    #[test]
    fn release_of_free_block_is_noop() {
        let (mut arena, mut buckets) = make_arena(1024);
        let a = arena.carve(100, &mut buckets).unwrap();
        arena.carve(100, &mut buckets).unwrap();
        arena.release(a, &mut buckets).unwrap();
        assert!(arena.release(a, &mut buckets).is_none());
        arena.verify(&buckets).unwrap();
    }

    #[test]
    fn release_of_unknown_ref_is_noop() {
        let (mut arena, mut buckets) = make_arena(1024);
        assert!(arena.release(BlockRef::from_raw(99), &mut buckets).is_none());
        arena.verify(&buckets).unwrap();
    }

    #[test]
    fn dead_nodes_are_recycled() {
        let (mut arena, mut buckets) = make_arena(1024);
        for _ in 0..50 {
            let a = arena.carve(64, &mut buckets).unwrap();
            let b = arena.carve(64, &mut buckets).unwrap();
            arena.release(b, &mut buckets).unwrap();
            arena.release(a, &mut buckets).unwrap();
        }
        assert!(arena.nodes.len() <= 3, "node slab grew to {}", arena.nodes.len());
        arena.verify(&buckets).unwrap();
    }

    #[test]
    fn bytes_are_disjoint_between_blocks() {
        let (mut arena, mut buckets) = make_arena(256);
        let a = arena.carve(32, &mut buckets).unwrap();
        let b = arena.carve(32, &mut buckets).unwrap();
        let va = arena.block(a).unwrap();
        let vb = arena.block(b).unwrap();
        arena.bytes_mut(&va).fill(0xAA);
        arena.bytes_mut(&vb).fill(0xBB);
        assert!(arena.bytes(&va).iter().all(|&x| x == 0xAA));
        assert!(arena.bytes(&vb).iter().all(|&x| x == 0xBB));
    }

    #[test]
    fn reset_grows_and_preserves_bytes() {
        let (mut arena, mut buckets) = make_arena(64);
        let a = arena.carve(16, &mut buckets).unwrap();
        let view = arena.block(a).unwrap();
        arena.bytes_mut(&view).fill(7);
        arena.reset(128, &mut buckets);
        assert_eq!(arena.capacity(), 128);
        assert_eq!(layout(&arena), vec![(0, 128, BlockState::Free)]);
        assert!(arena.data[..16].iter().all(|&x| x == 7));
        assert!(arena.data[64..].iter().all(|&x| x == 0));
        arena.verify(&buckets).unwrap();
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Clone, Debug)]
        enum Op {
            Carve(u32),
            Release(usize),
        }

        fn arb_op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (1u32..300).prop_map(Op::Carve),
                (0usize..64).prop_map(Op::Release),
            ]
        }

        proptest! {
            #[test]
            fn invariants_hold_under_churn(ops in proptest::collection::vec(arb_op(), 1..120)) {
                let (mut arena, mut buckets) = make_arena(4096);
                let mut live: Vec<BlockRef> = Vec::new();
                for op in ops {
                    match op {
                        Op::Carve(len) => {
                            if let Ok(r) = arena.carve(len, &mut buckets) {
                                live.push(r);
                            }
                        }
                        Op::Release(i) => {
                            if !live.is_empty() {
                                let r = live.swap_remove(i % live.len());
                                prop_assert!(arena.release(r, &mut buckets).is_some());
                            }
                        }
                    }
                    prop_assert_eq!(arena.verify(&buckets), Ok(()));
                }
                for r in live.drain(..) {
                    arena.release(r, &mut buckets);
                }
                prop_assert_eq!(arena.block_count(), 1);
                prop_assert_eq!(arena.free_bytes(), 4096);
            }
        }
    }
}
