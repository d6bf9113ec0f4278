//! Address access list configuration.
//!
//! Rules are CIDR networks with an allow/deny policy; the most specific
//! matching rule wins and `default_policy` applies when none matches.

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

/// Decision attached to a rule.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AclPolicy {
    #[default]
    Allow,
    Deny,
}

/// Single CIDR rule.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AclRule {
    pub network: IpNetwork,
    pub policy: AclPolicy,
}

/// Access list configuration.
#[derive(Default, Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct AclConfig {
    /// Applied to addresses no rule covers.
    #[serde(default)]
    pub default_policy: AclPolicy,

    #[serde(default)]
    #[validate(custom(function = validation::validate_rules))]
    pub rules: Vec<AclRule>,
}
