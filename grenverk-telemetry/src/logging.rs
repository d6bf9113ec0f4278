//! ## grenverk-telemetry::logging
//! **`tracing` subscriber setup and structured index events**
//!
//! The subscriber honours `RUST_LOG` and falls back to the configured level.

use std::error::Error;

use opentelemetry::KeyValue;
use tracing::info_span;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Copy)]
pub struct IndexLogger;

impl IndexLogger {
    /// Installs the global fmt subscriber, `default_level` applying when
    /// `RUST_LOG` is unset. Fails if a subscriber is already installed.
    pub fn init(default_level: &str) -> Result<(), Box<dyn Error + Send + Sync + 'static>> {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new(default_level)),
            )
            .with_thread_names(true)
            .with_span_events(FmtSpan::ENTER)
            .try_init()
    }

    /// Records one index event with its metadata inside an `index_event` span.
    #[inline]
    pub fn log_index_event(event_type: &str, metadata: &[KeyValue]) {
        let span = info_span!("index_event", event_type = event_type, otel.kind = "INTERNAL");
        let _entered = span.enter();

        tracing::info!(metadata = ?metadata, "Index event recorded");
    }
}
