//! ## grenverk-core::alloc::arena
//! **Bump arena and the containers built on it, using `bumpalo`**
//!
//! The arena never frees an individual allocation; everything is released in
//! bulk by [`Arena::reset`] or when the arena is dropped. An optional byte limit
//! turns exhaustion into an [`AllocError`] instead of an abort.
//!
//! [`ArenaArray`] grows in place while its buffer is still the most recent
//! allocation in the arena and otherwise moves to a block twice the size.
//! [`ChunkedList`] never moves an element once pushed.

use std::mem;

use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;

use super::stats::AllocStats;
use crate::error::AllocError;

/// Bump-allocating memory region.
#[derive(Debug)]
pub struct Arena {
    bump: Bump,
    limit: Option<usize>,
    stats: AllocStats,
}

impl Arena {
    /// Creates an unbounded arena.
    pub fn new() -> Self {
        Arena {
            bump: Bump::new(),
            limit: None,
            stats: AllocStats::new(),
        }
    }

    /// Creates an arena that refuses to grow past `limit` bytes of chunks.
    pub fn with_limit(limit: usize) -> Self {
        let bump = Bump::new();
        bump.set_allocation_limit(Some(limit));
        Arena {
            bump,
            limit: Some(limit),
            stats: AllocStats::new(),
        }
    }

    /// Moves `value` into the arena.
    pub fn alloc<T>(&self, value: T) -> Result<&mut T, AllocError> {
        let slot = self.bump.try_alloc(value).map_err(|_| self.exhausted())?;
        self.stats.increment_arena_allocations();
        Ok(slot)
    }

    /// Starts an empty growable array backed by this arena.
    pub fn array<T>(&self) -> ArenaArray<'_, T> {
        ArenaArray {
            arena: self,
            items: BumpVec::new_in(&self.bump),
        }
    }

    /// Starts an array with room for `capacity` elements.
    pub fn array_with_capacity<T>(&self, capacity: usize) -> Result<ArenaArray<'_, T>, AllocError> {
        let mut array = self.array();
        array
            .items
            .try_reserve_exact(capacity)
            .map_err(|_| self.exhausted())?;
        self.stats.increment_arena_allocations();
        Ok(array)
    }

    /// Starts a list whose parts each hold `part_capacity` elements.
    ///
    /// # Panics
    ///
    /// Panics if `part_capacity` is zero.
    pub fn list<T>(&self, part_capacity: usize) -> ChunkedList<'_, T> {
        assert!(part_capacity > 0, "List part capacity must be greater than zero");
        ChunkedList {
            arena: self,
            part_capacity,
            parts: BumpVec::new_in(&self.bump),
            len: 0,
        }
    }

    /// Bytes currently claimed from the system, including unused chunk space.
    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }

    pub fn stats(&self) -> &AllocStats {
        &self.stats
    }

    /// Releases every allocation at once.
    pub fn reset(&mut self) {
        self.bump.reset();
        self.stats.increment_arena_resets();
    }

    fn exhausted(&self) -> AllocError {
        AllocError::ArenaExhausted {
            limit: self.limit.unwrap_or(usize::MAX),
        }
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

/// Growable array living in an [`Arena`].
#[derive(Debug)]
pub struct ArenaArray<'a, T> {
    arena: &'a Arena,
    items: BumpVec<'a, T>,
}

impl<'a, T> ArenaArray<'a, T> {
    /// Appends `value`, growing the backing block when it is full.
    pub fn push(&mut self, value: T) -> Result<&mut T, AllocError> {
        self.grow_for(1)?;
        self.items.push(value);
        let last = self.items.len() - 1;
        Ok(&mut self.items[last])
    }

    /// Appends `n` copies of `value` and returns them as one slice.
    pub fn push_n(&mut self, n: usize, value: T) -> Result<&mut [T], AllocError>
    where
        T: Clone,
    {
        self.grow_for(n)?;
        let start = self.items.len();
        self.items.resize(start + n, value);
        Ok(&mut self.items[start..])
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    fn grow_for(&mut self, additional: usize) -> Result<(), AllocError> {
        if self.items.len() + additional <= self.items.capacity() {
            return Ok(());
        }
        // Extended in place while this block is the arena's latest allocation.
        let old_end = self.block_end();
        let target = (self.items.capacity() * 2).max(self.items.len() + additional);
        self.items
            .try_reserve_exact(target - self.items.len())
            .map_err(|_| self.arena.exhausted())?;

        // An in-place extension keeps the block's upper end where it was.
        match old_end {
            Some(end) if Some(end) == self.block_end() => {
                self.arena.stats.increment_arena_extensions()
            }
            _ => self.arena.stats.increment_arena_allocations(),
        }
        Ok(())
    }

    /// Address one past the backing block, `None` before the first growth.
    fn block_end(&self) -> Option<usize> {
        let bytes = self.items.capacity() * mem::size_of::<T>();
        (bytes > 0).then(|| self.items.as_ptr() as usize + bytes)
    }
}

/// Linked list of fixed-size parts living in an [`Arena`].
#[derive(Debug)]
pub struct ChunkedList<'a, T> {
    arena: &'a Arena,
    part_capacity: usize,
    parts: BumpVec<'a, BumpVec<'a, T>>,
    len: usize,
}

impl<'a, T> ChunkedList<'a, T> {
    /// Appends `value` to the last part, opening a new part when it is full.
    pub fn push(&mut self, value: T) -> Result<&mut T, AllocError> {
        let needs_part = self
            .parts
            .last()
            .map_or(true, |part| part.len() == self.part_capacity);

        if needs_part {
            let arena = self.arena;
            let mut part = BumpVec::new_in(&arena.bump);
            part.try_reserve_exact(self.part_capacity)
                .map_err(|_| self.arena.exhausted())?;
            self.parts
                .try_reserve(1)
                .map_err(|_| self.arena.exhausted())?;
            self.parts.push(part);
            self.arena.stats.increment_arena_allocations();
        }

        let last = self.parts.len() - 1;
        let part = &mut self.parts[last];
        part.push(value);
        self.len += 1;
        let slot = part.len() - 1;
        Ok(&mut part[slot])
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of parts allocated so far.
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Iterates elements in push order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.parts.iter().flat_map(|part| part.iter())
    }
}
