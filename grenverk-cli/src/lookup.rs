use std::time::Instant;

use grenverk_acl::AccessList;
use grenverk_config::GrenverkConfig;
use grenverk_telemetry::logging::IndexLogger;
use grenverk_telemetry::metrics::IndexMetrics;
use opentelemetry::KeyValue;
use tracing::warn;

use crate::commands::AclArgs;

pub fn run_lookup(
    args: AclArgs,
    config: &GrenverkConfig,
    metrics: &IndexMetrics,
) -> anyhow::Result<()> {
    let mut acl = AccessList::from_config(&config.acl, &config.arena)?;
    metrics.radix_inserts.inc_by(config.acl.rules.len() as u64);

    for rule in &args.rules {
        match acl.add_rule(rule.network, rule.policy) {
            Ok(()) => metrics.radix_inserts.inc(),
            Err(err) if err.is_conflict() => {
                metrics.radix_conflicts.inc();
                warn!(network = %rule.network, "rule from the command line shadows nothing");
            }
            Err(err) => return Err(err.into()),
        }
    }

    for addr in args.addresses {
        let started = Instant::now();
        let policy = acl.check(addr);
        metrics.observe_lookup(started.elapsed().as_nanos() as f64);

        IndexLogger::log_index_event(
            "acl_check",
            &[
                KeyValue::new("address", addr.to_string()),
                KeyValue::new("policy", format!("{policy:?}")),
            ],
        );
        println!("{addr}\t{policy:?}");
    }

    Ok(())
}
