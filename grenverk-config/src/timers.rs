//! Event timer and lock configuration.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

/// Timer set parameters.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq, Eq)]
pub struct TimersConfig {
    /// Back-off ceiling of the shared index lock, in pause iterations.
    #[serde(default = "default_spin")]
    #[validate(range(min = 1, max = 1_048_576))]
    pub spin: u32,

    /// Delay used when a timer is armed without an explicit one.
    #[serde(default = "default_timeout_ms")]
    #[validate(range(min = 1, max = 86_400_000))]
    pub default_timeout_ms: u32,
}

/// Spinning is pointless on a single CPU.
fn default_spin() -> u32 {
    if num_cpus::get() > 1 {
        2048
    } else {
        1
    }
}

fn default_timeout_ms() -> u32 {
    60_000
}

impl Default for TimersConfig {
    fn default() -> Self {
        Self {
            spin: default_spin(),
            default_timeout_ms: default_timeout_ms(),
        }
    }
}
