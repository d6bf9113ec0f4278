//! Custom validation functions for configuration.
//!
//! Shared validation logic used across the configuration modules.

use once_cell::sync::Lazy;
use regex::Regex;
use validator::ValidationError;

use crate::acl::AclRule;
use crate::arena::{ArenaConfig, PreallocateSetting};

/// Deepest pre-allocation accepted; 2^17 - 1 nodes already span many slabs.
pub const MAX_PREALLOCATE_LEVELS: u32 = 16;

static LOG_LEVEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new("^(trace|debug|info|warn|error)$").expect("log level pattern is valid")
});

/// Slab size must be a power of two and pre-allocation bounded.
pub fn validate_arena(config: &ArenaConfig) -> Result<(), ValidationError> {
    validate_power_of_two(config.page_size)?;
    if let PreallocateSetting::Levels(levels) = config.preallocate {
        if levels > MAX_PREALLOCATE_LEVELS {
            return Err(ValidationError::new("preallocate_too_deep"));
        }
    }
    Ok(())
}

/// Validate that a given value is a power of two.
pub fn validate_power_of_two(value: usize) -> Result<(), ValidationError> {
    if value.is_power_of_two() {
        Ok(())
    } else {
        Err(ValidationError::new("must_be_power_of_two"))
    }
}

/// Rejects host bits beyond the prefix and duplicate networks.
///
/// `0.0.0.0/0` and `::/0` are default routes and stay valid.
pub fn validate_rules(rules: &[AclRule]) -> Result<(), ValidationError> {
    for (i, rule) in rules.iter().enumerate() {
        if rule.network.ip() != rule.network.network() {
            return Err(ValidationError::new("host_bits_set"));
        }
        if rules[..i].iter().any(|earlier| earlier.network == rule.network) {
            return Err(ValidationError::new("duplicate_network"));
        }
    }
    Ok(())
}

pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    if LOG_LEVEL.is_match(&level.to_lowercase()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::AclPolicy;

    fn rule(network: &str) -> AclRule {
        AclRule {
            network: network.parse().unwrap(),
            policy: AclPolicy::Deny,
        }
    }

    #[test]
    fn rules_accept_distinct_networks() {
        let rules = [rule("10.0.0.0/8"), rule("10.1.0.0/16"), rule("2001:db8::/32")];
        assert!(validate_rules(&rules).is_ok());
    }

    #[test]
    fn rules_accept_default_routes() {
        assert!(validate_rules(&[rule("0.0.0.0/0")]).is_ok());
        assert!(validate_rules(&[rule("::/0")]).is_ok());
        assert!(validate_rules(&[rule("0.0.0.0/0"), rule("::/0")]).is_ok());
    }

    #[test]
    fn rules_reject_bad_networks() {
        assert!(validate_rules(&[rule("0.0.0.0/8")]).is_ok());
        assert!(validate_rules(&[rule("0.0.0.1/0")]).is_err());
        assert!(validate_rules(&[rule("10.0.0.1/8")]).is_err());
        assert!(validate_rules(&[rule("10.0.0.0/8"), rule("10.0.0.0/8")]).is_err());
    }

    #[test]
    fn log_levels() {
        assert!(validate_log_level("debug").is_ok());
        assert!(validate_log_level("WARN").is_ok());
        assert!(validate_log_level("verbose").is_err());
    }
}
