//! ## grenverk-telemetry::metrics
//! **Prometheus counters for index operations**
//!
//! ### Components:
//! - radix trie: inserts, conflicts, deletes, lookups and their latency
//! - timers: additions, expirations, pending gauge

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Debug, Clone)]
pub struct IndexMetrics {
    pub registry: Registry,
    pub radix_inserts: IntCounter,
    pub radix_conflicts: IntCounter,
    pub radix_deletes: IntCounter,
    pub radix_lookups: IntCounter,
    pub lookup_latency: Histogram,
    pub timers_added: IntCounter,
    pub timers_expired: IntCounter,
    pub timers_pending: IntGauge,
}

impl IndexMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registration(true)
    }

    /// Builds the counters, registering them only when `enabled`.
    ///
    /// Unregistered counters still accept updates but never appear in
    /// [`gather_metrics`](Self::gather_metrics).
    pub fn with_registration(enabled: bool) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let radix_inserts = IntCounter::new("grenverk_radix_inserts_total", "Prefixes inserted")?;
        let radix_conflicts = IntCounter::new(
            "grenverk_radix_conflicts_total",
            "Inserts rejected because the prefix already held a value",
        )?;
        let radix_deletes = IntCounter::new("grenverk_radix_deletes_total", "Prefixes deleted")?;
        let radix_lookups =
            IntCounter::new("grenverk_radix_lookups_total", "Longest-prefix-match lookups")?;
        let lookup_latency = Histogram::with_opts(
            HistogramOpts::new("grenverk_radix_lookup_latency_ns", "Radix lookup time")
                .buckets(vec![50.0, 100.0, 250.0, 500.0, 1_000.0, 10_000.0]),
        )?;
        let timers_added = IntCounter::new("grenverk_timers_added_total", "Timers armed")?;
        let timers_expired = IntCounter::new("grenverk_timers_expired_total", "Timers fired")?;
        let timers_pending = IntGauge::new("grenverk_timers_pending", "Timers waiting to fire")?;

        if enabled {
            registry.register(Box::new(radix_inserts.clone()))?;
            registry.register(Box::new(radix_conflicts.clone()))?;
            registry.register(Box::new(radix_deletes.clone()))?;
            registry.register(Box::new(radix_lookups.clone()))?;
            registry.register(Box::new(lookup_latency.clone()))?;
            registry.register(Box::new(timers_added.clone()))?;
            registry.register(Box::new(timers_expired.clone()))?;
            registry.register(Box::new(timers_pending.clone()))?;
        }

        Ok(Self {
            registry,
            radix_inserts,
            radix_conflicts,
            radix_deletes,
            radix_lookups,
            lookup_latency,
            timers_added,
            timers_expired,
            timers_pending,
        })
    }

    /// Text exposition of every registered metric.
    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }

    pub fn observe_lookup(&self, latency_ns: f64) {
        self.radix_lookups.inc();
        self.lookup_latency.observe(latency_ns);
    }
}
