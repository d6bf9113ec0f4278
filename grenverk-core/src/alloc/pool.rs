//! ## grenverk-core::alloc::pool
//! **Slab-backed node pools with free-list reuse**
//!
//! Node storage for the index structures. Slots are carved out of page-sized
//! slabs; a slab is only reserved once the previous one is full, and slabs never
//! move once reserved. Released slots are chained onto an intrusive free list and
//! handed out again before any fresh slot is used.
//!
//! Every slot carries a generation counter, so a [`PoolKey`] that outlived its
//! slot is detected instead of silently aliasing whatever reuses the slot.

use std::mem;
use std::ops::{Index, IndexMut};

use tracing::debug;

use super::stats::AllocStats;
use crate::error::AllocError;

/// Page size assumed when the caller does not supply one.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Handle to a slot in a [`NodePool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolKey {
    index: u32,
    generation: u32,
}

impl PoolKey {
    /// Position of the slot inside the pool.
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot at the time the key was handed out.
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// A key that never resolves to a slot.
    pub(crate) const fn dangling() -> Self {
        PoolKey {
            index: u32::MAX,
            generation: u32::MAX,
        }
    }
}

#[derive(Debug)]
enum Slot<T> {
    Occupied { generation: u32, value: T },
    Free { generation: u32, next: Option<u32> },
}

/// Fixed-size object pool growing one page-sized slab at a time.
#[derive(Debug)]
pub struct NodePool<T> {
    slab_capacity: usize,
    slabs: Vec<Vec<Slot<T>>>,
    free_head: Option<u32>,
    allocated_count: usize,
    limit: Option<usize>,
    stats: AllocStats,
}

impl<T> NodePool<T> {
    /// Creates a pool whose slabs each span `page_size` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `page_size` is zero.
    pub fn new(page_size: usize) -> Self {
        assert!(page_size > 0, "Page size must be greater than zero");

        let slab_capacity = (page_size / mem::size_of::<Slot<T>>()).max(1);

        Self {
            slab_capacity,
            slabs: Vec::new(),
            free_head: None,
            allocated_count: 0,
            limit: None,
            stats: AllocStats::new(),
        }
    }

    /// Caps the number of simultaneously live slots.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Stores `value` in a slot, preferring previously released slots.
    pub fn allocate(&mut self, value: T) -> Result<PoolKey, AllocError> {
        if let Some(limit) = self.limit {
            if self.allocated_count >= limit {
                return Err(AllocError::NodeLimit { limit });
            }
        }

        if let Some(index) = self.free_head {
            let slot = self.slot_mut(index);
            let Slot::Free { generation, next } = *slot else {
                unreachable!("free list points at an occupied slot {index}");
            };
            *slot = Slot::Occupied { generation, value };
            self.free_head = next;
            self.allocated_count += 1;
            self.stats.increment_reused();
            return Ok(PoolKey { index, generation });
        }

        if self
            .slabs
            .last()
            .map_or(true, |slab| slab.len() == self.slab_capacity)
        {
            self.reserve_slab()?;
        }

        let slab_index = self.slabs.len() - 1;
        let position = self.slabs[slab_index].len();
        let index = u32::try_from(slab_index * self.slab_capacity + position)
            .map_err(|_| AllocError::NodeLimit {
                limit: u32::MAX as usize,
            })?;

        self.slabs[slab_index].push(Slot::Occupied {
            generation: 0,
            value,
        });
        self.allocated_count += 1;
        self.stats.increment_fresh();
        Ok(PoolKey {
            index,
            generation: 0,
        })
    }

    /// Returns the slot of `key` to the free list and hands back its value.
    ///
    /// # Panics
    ///
    /// Panics if `key` is stale or does not belong to this pool.
    pub fn release(&mut self, key: PoolKey) -> T {
        let free_head = self.free_head;
        let slot = self.slot_mut(key.index);
        match slot {
            Slot::Occupied { generation, .. } if *generation == key.generation => {}
            _ => panic!("release of stale pool key {key:?}"),
        }

        let next_generation = key.generation.wrapping_add(1);
        let old = mem::replace(
            slot,
            Slot::Free {
                generation: next_generation,
                next: free_head,
            },
        );
        self.free_head = Some(key.index);
        self.allocated_count -= 1;
        self.stats.increment_released();

        match old {
            Slot::Occupied { value, .. } => value,
            Slot::Free { .. } => unreachable!(),
        }
    }

    pub fn get(&self, key: PoolKey) -> Option<&T> {
        let (slab, position) = self.locate(key.index);
        match self.slabs.get(slab)?.get(position)? {
            Slot::Occupied { generation, value } if *generation == key.generation => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, key: PoolKey) -> Option<&mut T> {
        let (slab, position) = self.locate(key.index);
        match self.slabs.get_mut(slab)?.get_mut(position)? {
            Slot::Occupied { generation, value } if *generation == key.generation => Some(value),
            _ => None,
        }
    }

    pub fn contains(&self, key: PoolKey) -> bool {
        self.get(key).is_some()
    }

    /// Returns the current number of live slots.
    pub fn allocated_count(&self) -> usize {
        self.allocated_count
    }

    /// Number of slots a single slab holds.
    pub fn slab_capacity(&self) -> usize {
        self.slab_capacity
    }

    pub fn slab_count(&self) -> usize {
        self.slabs.len()
    }

    pub fn stats(&self) -> &AllocStats {
        &self.stats
    }

    fn reserve_slab(&mut self) -> Result<(), AllocError> {
        let bytes = self.slab_capacity * mem::size_of::<Slot<T>>();
        let mut slab = Vec::new();
        slab.try_reserve_exact(self.slab_capacity)
            .map_err(|_| AllocError::SlabReservation { bytes })?;
        self.slabs.push(slab);
        self.stats.increment_slabs();
        debug!(
            slab = self.slabs.len(),
            bytes,
            slots = self.slab_capacity,
            "pool slab reserved"
        );
        Ok(())
    }

    #[inline]
    fn locate(&self, index: u32) -> (usize, usize) {
        let index = index as usize;
        (index / self.slab_capacity, index % self.slab_capacity)
    }

    fn slot_mut(&mut self, index: u32) -> &mut Slot<T> {
        let (slab, position) = self.locate(index);
        &mut self.slabs[slab][position]
    }
}

impl<T> Index<PoolKey> for NodePool<T> {
    type Output = T;

    fn index(&self, key: PoolKey) -> &Self::Output {
        match self.get(key) {
            Some(value) => value,
            None => panic!("access through stale pool key {key:?}"),
        }
    }
}

impl<T> IndexMut<PoolKey> for NodePool<T> {
    fn index_mut(&mut self, key: PoolKey) -> &mut Self::Output {
        match self.get_mut(key) {
            Some(value) => value,
            None => panic!("access through stale pool key {key:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_allocate_release() {
        let mut pool: NodePool<u64> = NodePool::new(DEFAULT_PAGE_SIZE);
        let key = pool.allocate(7).unwrap();
        assert_eq!(pool[key], 7);
        assert_eq!(pool.allocated_count(), 1);

        assert_eq!(pool.release(key), 7);
        assert_eq!(pool.allocated_count(), 0);
        assert!(pool.get(key).is_none());
    }

    #[test]
    fn test_pool_reuses_released_slots() {
        let mut pool: NodePool<u64> = NodePool::new(DEFAULT_PAGE_SIZE);
        let first = pool.allocate(1).unwrap();
        let _second = pool.allocate(2).unwrap();
        pool.release(first);

        let third = pool.allocate(3).unwrap();
        assert_eq!(third.index(), first.index());
        assert_ne!(third.generation(), first.generation());

        let stats = pool.stats().snapshot();
        assert_eq!(stats.fresh_allocations, 2);
        assert_eq!(stats.reused_allocations, 1);
        assert_eq!(stats.releases, 1);
    }

    #[test]
    fn test_pool_grows_one_slab_at_a_time() {
        let mut pool: NodePool<u64> = NodePool::new(256);
        let per_slab = pool.slab_capacity();
        assert!(per_slab > 1);

        for i in 0..per_slab {
            pool.allocate(i as u64).unwrap();
        }
        assert_eq!(pool.slab_count(), 1);

        pool.allocate(0).unwrap();
        assert_eq!(pool.slab_count(), 2);
        assert_eq!(pool.stats().snapshot().slabs_reserved, 2);
    }

    #[test]
    fn test_pool_limit() {
        let mut pool: NodePool<u8> = NodePool::new(DEFAULT_PAGE_SIZE).with_limit(Some(2));
        pool.allocate(1).unwrap();
        let key = pool.allocate(2).unwrap();
        assert_eq!(
            pool.allocate(3),
            Err(AllocError::NodeLimit { limit: 2 })
        );

        pool.release(key);
        assert!(pool.allocate(3).is_ok());
    }

    #[test]
    #[should_panic]
    fn test_pool_zero_page_size() {
        NodePool::<u32>::new(0);
    }

    #[test]
    #[should_panic(expected = "stale pool key")]
    fn test_pool_double_release() {
        let mut pool: NodePool<u32> = NodePool::new(DEFAULT_PAGE_SIZE);
        let key = pool.allocate(1).unwrap();
        pool.release(key);
        pool.release(key);
    }
}
