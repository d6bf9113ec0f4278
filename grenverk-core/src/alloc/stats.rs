//! ## grenverk-core::alloc::stats
//! **Allocation accounting for pools and arenas**
//!
//! Counters are atomics so a snapshot can be read through a shared reference,
//! e.g. by a metrics exporter, while the owning index keeps mutating.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Running allocation counters.
#[derive(Debug)]
pub struct AllocStats {
    slabs_reserved: AtomicUsize,
    fresh_allocations: AtomicUsize,
    reused_allocations: AtomicUsize,
    releases: AtomicUsize,
    arena_allocations: AtomicUsize,
    arena_extensions: AtomicUsize,
    arena_resets: AtomicUsize,
}

/// Point-in-time copy of [`AllocStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub slabs_reserved: usize,
    pub fresh_allocations: usize,
    pub reused_allocations: usize,
    pub releases: usize,
    pub arena_allocations: usize,
    /// Array growths absorbed by extending the latest block in place.
    pub arena_extensions: usize,
    pub arena_resets: usize,
}

impl StatsSnapshot {
    /// Allocations served either fresh or from the free list.
    pub fn total_allocations(&self) -> usize {
        self.fresh_allocations + self.reused_allocations
    }
}

impl AllocStats {
    /// Creates a new `AllocStats` instance with all counters initialized to zero.
    pub const fn new() -> Self {
        AllocStats {
            slabs_reserved: AtomicUsize::new(0),
            fresh_allocations: AtomicUsize::new(0),
            reused_allocations: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            arena_allocations: AtomicUsize::new(0),
            arena_extensions: AtomicUsize::new(0),
            arena_resets: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn increment_slabs(&self) {
        self.slabs_reserved.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_fresh(&self) {
        self.fresh_allocations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_reused(&self) {
        self.reused_allocations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_released(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_arena_allocations(&self) {
        self.arena_allocations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_arena_extensions(&self) {
        self.arena_extensions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_arena_resets(&self) {
        self.arena_resets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            slabs_reserved: self.slabs_reserved.load(Ordering::Relaxed),
            fresh_allocations: self.fresh_allocations.load(Ordering::Relaxed),
            reused_allocations: self.reused_allocations.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            arena_allocations: self.arena_allocations.load(Ordering::Relaxed),
            arena_extensions: self.arena_extensions.load(Ordering::Relaxed),
            arena_resets: self.arena_resets.load(Ordering::Relaxed),
        }
    }
}

impl Default for AllocStats {
    fn default() -> Self {
        Self::new()
    }
}
