//! ## grenverk-core::alloc
//! **Node pools and arena allocators using `bumpalo`**
//!
//! ### Key Submodules:
//! - `pool/`: Page-sized slabs with free-list reuse, backing index nodes
//! - `arena/`: Bump arena with growable arrays and chunked lists
//! - `stats/`: Allocation counters shared by both

pub mod arena;
pub mod pool;
pub mod stats;

pub use arena::{Arena, ArenaArray, ChunkedList};
pub use pool::{NodePool, PoolKey, DEFAULT_PAGE_SIZE};
pub use stats::{AllocStats, StatsSnapshot};
