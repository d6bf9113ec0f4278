use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
enum Source {
    /// Milliseconds elapsed since `epoch`, added to the starting value.
    Monotonic { epoch: Instant, start: u32 },
    Manual,
}

/// Cached millisecond clock shared by timer sets.
///
/// Reading the time is a single atomic load; the cached value only moves on
/// [`update`](Self::update) or [`advance`](Self::advance). Values are 32-bit
/// and wrap roughly every 49.7 days, which timer keys tolerate.
#[derive(Debug, Clone)]
pub struct MsecClock {
    current: Arc<AtomicU32>,
    source: Source,
}

impl MsecClock {
    /// Clock following the monotonic system time, starting at zero.
    pub fn monotonic() -> Self {
        Self::monotonic_from(0)
    }

    /// Monotonic clock whose first reading is `start`.
    pub fn monotonic_from(start: u32) -> Self {
        Self {
            current: Arc::new(AtomicU32::new(start)),
            source: Source::Monotonic {
                epoch: Instant::now(),
                start,
            },
        }
    }

    /// Clock that only moves through [`advance`](Self::advance).
    pub fn manual(start: u32) -> Self {
        Self {
            current: Arc::new(AtomicU32::new(start)),
            source: Source::Manual,
        }
    }

    /// Cached current time in milliseconds.
    #[inline]
    pub fn now(&self) -> u32 {
        self.current.load(Ordering::Acquire)
    }

    /// Refreshes the cached time from the clock source and returns it.
    pub fn update(&self) -> u32 {
        match self.source {
            Source::Monotonic { epoch, start } => {
                // Truncation is the intended wraparound.
                let elapsed = epoch.elapsed().as_millis() as u32;
                let now = start.wrapping_add(elapsed);
                self.current.store(now, Ordering::Release);
                now
            }
            Source::Manual => self.now(),
        }
    }

    /// Moves the cached time forward by `ms`, wrapping on overflow.
    ///
    /// On a monotonic clock the next [`update`](Self::update) overwrites it.
    pub fn advance(&self, ms: u32) -> u32 {
        let previous = self.current.fetch_add(ms, Ordering::AcqRel);
        previous.wrapping_add(ms)
    }

    pub fn is_manual(&self) -> bool {
        matches!(self.source, Source::Manual)
    }
}
