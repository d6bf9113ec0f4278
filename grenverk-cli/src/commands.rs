use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use grenverk_config::{AclPolicy, AclRule, GrenverkConfig};
use grenverk_telemetry::metrics::IndexMetrics;
use tracing::warn;

use crate::{lookup, stats, timer_loop};

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Configuration file; defaults to config/grenverk.yaml plus overrides
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Print prometheus metrics when the command finishes
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check addresses against the access list
    Acl(AclArgs),
    /// Arm random timers and run the expiry loop until only cancelable ones remain
    Timers(TimersArgs),
    /// Fill the indexes with random keys and report allocation statistics
    Stats(StatsArgs),
}

#[derive(Args, Debug, Clone)]
pub struct AclArgs {
    /// Addresses to check
    #[arg(required = true)]
    pub addresses: Vec<IpAddr>,

    /// Extra rule, e.g. `10.0.0.0/8=deny`
    #[arg(short, long = "rule", value_parser = parse_rule)]
    pub rules: Vec<AclRule>,
}

#[derive(Args, Debug, Clone)]
pub struct TimersArgs {
    /// Number of timers to arm
    #[arg(long, default_value_t = 16)]
    pub count: usize,

    /// Upper bound of the random delays; the configured default timeout when absent
    #[arg(long)]
    pub max_delay_ms: Option<u32>,

    /// Every n-th timer is cancelled by a concurrent task (0 disables)
    #[arg(long, default_value_t = 5)]
    pub cancel_every: usize,

    /// Every n-th timer is armed as cancelable (0 disables)
    #[arg(long, default_value_t = 4)]
    pub cancelable_every: usize,

    /// Sleep on the wall clock instead of advancing a manual one
    #[arg(long)]
    pub realtime: bool,

    /// Initial manual clock reading, handy for exercising the wraparound
    #[arg(long, default_value_t = 0)]
    pub start_ms: u32,

    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

#[derive(Args, Debug, Clone)]
pub struct StatsArgs {
    /// Random prefixes inserted into the IPv4 trie
    #[arg(long, default_value_t = 1024)]
    pub prefixes: usize,

    /// Random keys inserted into the red-black tree
    #[arg(long, default_value_t = 1024)]
    pub keys: usize,

    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

pub async fn run_command(
    cli: Cli,
    config: GrenverkConfig,
    metrics: &IndexMetrics,
) -> anyhow::Result<()> {
    match cli.command {
        Commands::Acl(args) => lookup::run_lookup(args, &config, metrics)?,
        Commands::Timers(args) => timer_loop::run_timer_loop(args, &config, metrics).await?,
        Commands::Stats(args) => stats::run_stats(args, &config, metrics)?,
    }

    if cli.metrics {
        if !config.telemetry.metrics {
            warn!("--metrics given but telemetry.metrics is disabled in the configuration");
        }
        print!("{}", metrics.gather_metrics()?);
    }
    Ok(())
}

fn parse_rule(raw: &str) -> Result<AclRule, String> {
    let (network, policy) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected <cidr>=<allow|deny>, got `{raw}`"))?;
    let network = network
        .trim()
        .parse()
        .map_err(|err| format!("invalid network `{network}`: {err}"))?;
    let policy = match policy.trim().to_ascii_lowercase().as_str() {
        "allow" => AclPolicy::Allow,
        "deny" => AclPolicy::Deny,
        other => return Err(format!("unknown policy `{other}`")),
    };
    Ok(AclRule { network, policy })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rules() {
        let rule = parse_rule("10.0.0.0/8=Deny").unwrap();
        assert_eq!(rule.network, "10.0.0.0/8".parse().unwrap());
        assert_eq!(rule.policy, AclPolicy::Deny);

        assert!(parse_rule("10.0.0.0/8").is_err());
        assert!(parse_rule("10.0.0.0/33=allow").is_err());
        assert!(parse_rule("10.0.0.0/8=maybe").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
