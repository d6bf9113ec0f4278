use std::time::Duration;

use tracing::debug;

use super::clock::MsecClock;
use crate::rbtree::{NodeHandle, RbTree, TimerOrder};

/// Re-arming a timer closer than this to its current deadline is skipped.
pub const TIMER_LAZY_DELAY_MS: u32 = 300;

/// Handle of a pending timer, valid until it fires or is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(NodeHandle);

/// How long the event loop may block before the next timer is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerDelay {
    Infinite,
    After(u32),
}

impl TimerDelay {
    /// `None` for [`TimerDelay::Infinite`].
    pub fn as_duration(self) -> Option<Duration> {
        match self {
            TimerDelay::Infinite => None,
            TimerDelay::After(ms) => Some(Duration::from_millis(u64::from(ms))),
        }
    }
}

#[derive(Debug)]
struct TimerEntry<E> {
    event: E,
    /// Does not keep a shutting-down worker alive.
    cancelable: bool,
}

/// Pending timers ordered by deadline.
#[derive(Debug)]
pub struct Timers<E> {
    tree: RbTree<u32, TimerEntry<E>, TimerOrder>,
    clock: MsecClock,
}

impl<E> Timers<E> {
    pub fn new(clock: MsecClock) -> Self {
        Self {
            tree: RbTree::new(),
            clock,
        }
    }

    pub fn clock(&self) -> &MsecClock {
        &self.clock
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Arms a timer firing `delay_ms` after the clock's cached time.
    pub fn add(&mut self, event: E, delay_ms: u32) -> TimerId {
        self.insert(event, delay_ms, false)
    }

    /// Like [`add`](Self::add), but the timer does not count in
    /// [`no_timers_left`](Self::no_timers_left).
    pub fn add_cancelable(&mut self, event: E, delay_ms: u32) -> TimerId {
        self.insert(event, delay_ms, true)
    }

    /// Moves a pending timer to `delay_ms` from now.
    ///
    /// When the new deadline is within [`TIMER_LAZY_DELAY_MS`] of the old one
    /// the timer is left alone and the same id is returned. Returns `None` if
    /// `id` is no longer pending.
    pub fn rearm(&mut self, id: TimerId, delay_ms: u32) -> Option<TimerId> {
        let current = *self.tree.get(id.0)?.0;
        let key = self.clock.now().wrapping_add(delay_ms);

        if (key.wrapping_sub(current) as i32).unsigned_abs() < TIMER_LAZY_DELAY_MS {
            return Some(id);
        }

        let (_, entry) = self.tree.delete(id.0);
        Some(self.insert(entry.event, delay_ms, entry.cancelable))
    }

    /// Cancels a pending timer and hands back its event.
    pub fn del(&mut self, id: TimerId) -> Option<E> {
        if !self.tree.contains(id.0) {
            return None;
        }
        let (key, entry) = self.tree.delete(id.0);
        debug!(key, "event timer del");
        Some(entry.event)
    }

    /// Deadline of `id` in clock milliseconds.
    pub fn deadline(&self, id: TimerId) -> Option<u32> {
        self.tree.get(id.0).map(|(key, _)| *key)
    }

    /// Time until the earliest timer, zero if it is already due.
    pub fn find_timer(&self) -> TimerDelay {
        let Some(first) = self.tree.minimum() else {
            return TimerDelay::Infinite;
        };

        let delta = self.tree.key(first).wrapping_sub(self.clock.now()) as i32;
        TimerDelay::After(delta.max(0) as u32)
    }

    /// Removes every timer whose deadline is not in the future and passes its
    /// event to `handler`, earliest first. Returns how many fired.
    pub fn expire_timers<F>(&mut self, mut handler: F) -> usize
    where
        F: FnMut(E),
    {
        let now = self.clock.now();
        let mut fired = 0;

        while let Some(first) = self.tree.minimum() {
            let key = *self.tree.key(first);
            if (key.wrapping_sub(now) as i32) > 0 {
                break;
            }

            let (_, entry) = self.tree.delete(first);
            debug!(key, now, "event timer expired");
            fired += 1;
            handler(entry.event);
        }

        fired
    }

    /// `true` when every pending timer is cancelable.
    pub fn no_timers_left(&self) -> bool {
        self.tree.iter().all(|(_, _, entry)| entry.cancelable)
    }

    fn insert(&mut self, event: E, delay_ms: u32, cancelable: bool) -> TimerId {
        let key = self.clock.now().wrapping_add(delay_ms);
        let handle = self.tree.insert(key, TimerEntry { event, cancelable });
        debug!(key, delay_ms, cancelable, "event timer add");
        TimerId(handle)
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;

    fn timers_at(start: u32) -> Timers<&'static str> {
        Timers::new(MsecClock::manual(start))
    }

    #[test]
    fn empty_set_waits_forever() {
        let timers = timers_at(0);
        assert_eq!(timers.find_timer(), TimerDelay::Infinite);
        assert_eq!(timers.find_timer().as_duration(), None);
        assert!(timers.no_timers_left());
    }

    #[test]
    fn find_timer_reports_nearest_deadline() {
        let mut timers = timers_at(1_000);
        timers.add("slow", 500);
        timers.add("fast", 20);
        assert_eq!(timers.find_timer(), TimerDelay::After(20));

        timers.clock().advance(30);
        assert_eq!(timers.find_timer(), TimerDelay::After(0));
    }

    #[test]
    fn expire_fires_due_timers_in_order() {
        let mut timers = timers_at(0);
        timers.add("c", 30);
        timers.add("a", 10);
        timers.add("later", 100);
        timers.add("b", 20);

        timers.clock().advance(30);
        let mut fired = Vec::new();
        assert_eq!(timers.expire_timers(|event| fired.push(event)), 3);
        assert_eq!(fired, vec!["a", "b", "c"]);
        assert_eq!(timers.len(), 1);
        assert_eq!(timers.find_timer(), TimerDelay::After(70));
    }

    #[test]
    fn deadlines_straddling_wraparound() {
        let mut timers = timers_at(u32::MAX - 50);
        timers.add("after-wrap", 100);
        timers.add("before-wrap", 10);
        assert_eq!(timers.find_timer(), TimerDelay::After(10));

        timers.clock().advance(60);
        let mut fired = Vec::new();
        timers.expire_timers(|event| fired.push(event));
        assert_eq!(fired, vec!["before-wrap"]);
        assert_eq!(timers.find_timer(), TimerDelay::After(40));
    }

    #[test]
    fn deleted_timer_never_fires() {
        let mut timers = timers_at(0);
        let id = timers.add("gone", 5);
        timers.add("kept", 5);
        assert_eq!(timers.del(id), Some("gone"));
        assert_eq!(timers.del(id), None);

        timers.clock().advance(5);
        let mut fired = Vec::new();
        timers.expire_timers(|event| fired.push(event));
        assert_eq!(fired, vec!["kept"]);
    }

    #[test]
    fn ids_from_another_timer_set_are_ignored() {
        let mut ours = timers_at(0);
        let mut theirs = timers_at(0);
        let own = ours.add("ours", 10);
        let foreign = theirs.add("theirs", 10);

        assert_eq!(ours.del(foreign), None);
        assert_eq!(ours.rearm(foreign, 5_000), None);
        assert_eq!(ours.deadline(foreign), None);
        assert_eq!(ours.deadline(own), Some(10));
        assert_eq!(theirs.del(foreign), Some("theirs"));
    }

    #[test]
    fn cancelable_timers_do_not_count() {
        let mut timers = timers_at(0);
        timers.add_cancelable("keepalive", 60_000);
        assert!(timers.no_timers_left());

        let id = timers.add("request", 1_000);
        assert!(!timers.no_timers_left());
        timers.del(id);
        assert!(timers.no_timers_left());
    }

    #[test]
    fn rearm_is_lazy_for_small_moves() {
        let mut timers = timers_at(0);
        let id = timers.add("conn", 1_000);

        timers.clock().advance(100);
        assert_eq!(timers.rearm(id, 1_000), Some(id));
        assert_eq!(timers.deadline(id), Some(1_000));

        let moved = timers.rearm(id, 5_000).unwrap();
        assert_ne!(moved, id);
        assert_eq!(timers.deadline(id), None);
        assert_eq!(timers.deadline(moved), Some(5_100));
    }

    #[test]
    #[traced_test]
    fn timer_events_are_logged() {
        let mut timers = timers_at(0);
        let id = timers.add("logged", 10);
        timers.del(id);
        assert!(logs_contain("event timer add"));
        assert!(logs_contain("event timer del"));
    }
}
