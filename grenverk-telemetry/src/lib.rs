//! # Grenverk Telemetry
//!
//! Logging setup and prometheus counters for index operations.

pub mod logging;
pub mod metrics;

pub use logging::IndexLogger;
pub use metrics::IndexMetrics;
