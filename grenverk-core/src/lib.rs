//! # grenverk-core
//!
//! Indexing substrate for an event-driven network server: an ordered
//! red-black tree that drives timer expiry and a binary radix trie for
//! longest-prefix-match address lookups, both allocating their nodes from
//! slab pools with free-list reuse.
//!
//! ### Key Submodules:
//! - `alloc`: Node pools and arena allocators using `bumpalo`
//! - `rbtree`: Handle-based red-black tree with pluggable key order
//! - `radix`: 32-bit and 128-bit radix trie
//! - `time`: Millisecond clock and event timers on the tree
//! - `sync`: Spin-then-yield lock for sharing an index across threads

pub mod alloc;
pub mod error;
pub mod radix;
pub mod rbtree;
pub mod sync;
pub mod time;

pub mod prelude {
    pub use crate::alloc::*;
    pub use crate::error::*;
    pub use crate::radix::{Preallocate, RadixKey, RadixOptions, RadixTree};
    pub use crate::rbtree::{KeyOrder, NodeHandle, RbTree, TimerOrder, ValueOrder};
    pub use crate::sync::{RawSpinLock, SharedIndex};
    pub use crate::time::{MsecClock, TimerDelay, TimerId, Timers};
}

pub use error::{AllocError, RadixError};
