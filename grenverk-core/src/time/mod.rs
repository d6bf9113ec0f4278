//! ## grenverk-core::time
//! **Millisecond clock & event timers**
//!
//! Timers are keyed by their absolute deadline in a red-black tree ordered
//! with [`TimerOrder`](crate::rbtree::TimerOrder), so the earliest deadline is
//! always the tree minimum and deadlines may cross the 32-bit wrap.
//!
//! ### Key Submodules:
//! - `clock/`: `MsecClock`, a cached time source (monotonic or manual)
//! - `timers/`: `Timers`, add/delete/expire on top of the tree

mod clock;
mod timers;

pub use clock::MsecClock;
pub use timers::{TimerDelay, TimerId, Timers, TIMER_LAZY_DELAY_MS};
