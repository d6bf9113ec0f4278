//! Node allocation configuration.
//!
//! Slab size, node cap and eager pre-allocation for the radix tries.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

/// Node pool parameters shared by every index.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
#[validate(schema(function = validation::validate_arena))]
pub struct ArenaConfig {
    /// Bytes per node slab (must be a power of two).
    #[serde(default = "default_page_size")]
    #[validate(range(min = 512, max = 65536))]
    pub page_size: usize,

    /// Maximum live nodes per trie, unbounded when absent.
    #[serde(default)]
    #[validate(range(min = 1))]
    pub node_limit: Option<usize>,

    /// Eager construction of the first trie levels.
    #[serde(default)]
    pub preallocate: PreallocateSetting,
}

/// `none`, `auto`, or `{ levels: n }`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PreallocateSetting {
    #[default]
    None,
    Auto,
    Levels(u32),
}

fn default_page_size() -> usize {
    4096
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            node_limit: None,
            preallocate: PreallocateSetting::default(),
        }
    }
}
