//! ## grenverk-core::sync
//! **Spin-then-yield lock for shared indexes**
//!
//! The indexes themselves take `&mut self` and know nothing about locking.
//! [`SharedIndex`] puts one behind a [`RawSpinLock`] through `lock_api`, so
//! access is scoped to a guard and the lock is released on drop.
//!
//! The lock word stores the owner id (the process id) instead of a flag, which
//! lets a supervisor clear a lock whose holder vanished without unlocking
//! ([`SharedIndex::force_unlock`]).

use std::hint;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use once_cell::sync::Lazy;
use parking_lot::lock_api::{GuardSend, Mutex, MutexGuard, RawMutex};
use tracing::warn;

/// Back-off ceiling used when none is configured.
pub const DEFAULT_SPIN: u32 = 2048;

static CPU_COUNT: Lazy<usize> = Lazy::new(num_cpus::get);

/// Owner id written into the lock word by this process.
pub fn current_owner() -> u64 {
    u64::from(std::process::id())
}

/// Raw lock that busy-waits with exponential back-off before yielding.
#[derive(Debug)]
pub struct RawSpinLock {
    owner: AtomicU64,
    spin: u32,
}

impl RawSpinLock {
    /// Unlocked lock spinning up to `spin` pause iterations between yields.
    pub const fn with_spin(spin: u32) -> Self {
        Self {
            owner: AtomicU64::new(0),
            spin,
        }
    }

    /// Current owner id, `None` when unlocked.
    pub fn owner(&self) -> Option<u64> {
        match self.owner.load(Ordering::Acquire) {
            0 => None,
            owner => Some(owner),
        }
    }

    /// Clears the lock only if `owner` holds it.
    pub fn force_unlock(&self, owner: u64) -> bool {
        owner != 0
            && self
                .owner
                .compare_exchange(owner, 0, Ordering::Release, Ordering::Relaxed)
                .is_ok()
    }

    #[inline]
    fn try_acquire(&self, owner: u64) -> bool {
        self.owner.load(Ordering::Relaxed) == 0
            && self
                .owner
                .compare_exchange(0, owner, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
    }
}

unsafe impl RawMutex for RawSpinLock {
    const INIT: Self = RawSpinLock::with_spin(DEFAULT_SPIN);

    type GuardMarker = GuardSend;

    fn lock(&self) {
        let owner = current_owner();

        loop {
            if self.try_acquire(owner) {
                return;
            }

            // Spinning only helps when another CPU can release the lock.
            if *CPU_COUNT > 1 {
                let mut n = 1;
                while n < self.spin {
                    for _ in 0..n {
                        hint::spin_loop();
                    }
                    if self.try_acquire(owner) {
                        return;
                    }
                    n <<= 1;
                }
            }

            thread::yield_now();
        }
    }

    fn try_lock(&self) -> bool {
        self.try_acquire(current_owner())
    }

    unsafe fn unlock(&self) {
        self.owner.store(0, Ordering::Release);
    }

    fn is_locked(&self) -> bool {
        self.owner.load(Ordering::Relaxed) != 0
    }
}

/// Guard returned by [`SharedIndex::lock`].
pub type SharedGuard<'a, T> = MutexGuard<'a, RawSpinLock, T>;

/// An index shared between threads behind a [`RawSpinLock`].
#[derive(Debug)]
pub struct SharedIndex<T> {
    inner: Mutex<RawSpinLock, T>,
}

impl<T> SharedIndex<T> {
    pub fn new(index: T) -> Self {
        Self::with_spin(index, DEFAULT_SPIN)
    }

    pub fn with_spin(index: T, spin: u32) -> Self {
        Self {
            inner: Mutex::from_raw(RawSpinLock::with_spin(spin), index),
        }
    }

    /// Blocks until the lock is held.
    pub fn lock(&self) -> SharedGuard<'_, T> {
        self.inner.lock()
    }

    pub fn try_lock(&self) -> Option<SharedGuard<'_, T>> {
        self.inner.try_lock()
    }

    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    /// Releases a lock left held by `owner`, e.g. after its guard was leaked.
    ///
    /// Returns `false` when the lock is free or held by someone else. Calling
    /// this while a live guard exists lets two holders in at once.
    pub fn force_unlock(&self, owner: u64) -> bool {
        // SAFETY: the raw lock is only used through its own atomic protocol.
        let raw = unsafe { self.inner.raw() };
        let released = raw.force_unlock(owner);
        if released {
            warn!(owner, "forced unlock of shared index");
        }
        released
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use std::mem;
    use std::sync::Arc;

    use super::*;
    use crate::rbtree::RbTree;

    #[test]
    fn try_lock_excludes_second_holder() {
        let shared = SharedIndex::new(0u32);
        let guard = shared.try_lock().unwrap();
        assert!(shared.is_locked());
        assert!(shared.try_lock().is_none());
        drop(guard);
        assert!(!shared.is_locked());
        assert!(shared.try_lock().is_some());
    }

    #[test]
    fn lock_records_owner() {
        let raw = RawSpinLock::with_spin(16);
        assert_eq!(raw.owner(), None);
        raw.lock();
        assert_eq!(raw.owner(), Some(current_owner()));
        unsafe { raw.unlock() };
        assert_eq!(raw.owner(), None);
    }

    #[test]
    fn contending_threads_serialize_tree_updates() {
        let shared = Arc::new(SharedIndex::with_spin(RbTree::<u32, u32>::new(), 64));

        let workers: Vec<_> = (0..4u32)
            .map(|worker| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    for i in 0..500 {
                        let key = worker * 1_000 + i;
                        shared.lock().insert(key, worker);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let tree = shared.lock();
        assert_eq!(tree.len(), 2_000);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn force_unlock_requires_matching_owner() {
        let shared = SharedIndex::new(vec![1, 2, 3]);
        mem::forget(shared.lock());
        assert!(shared.is_locked());

        assert!(!shared.force_unlock(current_owner().wrapping_add(1)));
        assert!(!shared.force_unlock(0));
        assert!(shared.is_locked());

        assert!(shared.force_unlock(current_owner()));
        assert_eq!(shared.lock().len(), 3);
        assert!(!shared.force_unlock(current_owner()));
    }
}
