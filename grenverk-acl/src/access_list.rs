//! ## grenverk-acl::access_list
//! **CIDR allow/deny rules on radix tries**
//!
//! IPv4 rules live in a 32-bit trie and IPv6 rules in a 128-bit one. A lookup
//! returns the policy of the most specific rule covering the address, or the
//! list's default policy. IPv4-mapped IPv6 addresses are checked against the
//! IPv4 rules.

use std::net::IpAddr;

use grenverk_config::{AclConfig, ArenaConfig, PreallocateSetting};
use grenverk_core::radix::{Preallocate, RadixKey, RadixOptions, RadixTree};
use grenverk_core::RadixError;
use ipnetwork::IpNetwork;
use thiserror::Error;
use tracing::{debug, warn};

pub use grenverk_config::AclPolicy as Policy;

#[derive(Debug, Error)]
pub enum AclError {
    #[error("Rule {network} rejected: {source}")]
    Rule {
        network: IpNetwork,
        #[source]
        source: RadixError,
    },

    #[error("Access list allocation failed: {0}")]
    Allocation(#[from] RadixError),
}

impl AclError {
    /// `true` when a rule for the same network already exists.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            AclError::Rule {
                source: RadixError::KeyConflict,
                ..
            }
        )
    }
}

/// Trie construction parameters from the arena configuration.
pub fn radix_options(config: &ArenaConfig) -> RadixOptions {
    RadixOptions {
        page_size: config.page_size,
        node_limit: config.node_limit,
        preallocate: match config.preallocate {
            PreallocateSetting::None => Preallocate::None,
            PreallocateSetting::Auto => Preallocate::Auto,
            PreallocateSetting::Levels(levels) => Preallocate::Levels(levels),
        },
    }
}

#[derive(Debug)]
pub struct AccessList {
    v4: RadixTree<u32, Policy>,
    v6: RadixTree<u128, Policy>,
    default_policy: Policy,
}

impl AccessList {
    pub fn new(default_policy: Policy) -> Self {
        Self {
            v4: RadixTree::new(),
            v6: RadixTree::new(),
            default_policy,
        }
    }

    pub fn with_options(default_policy: Policy, options: RadixOptions) -> Result<Self, AclError> {
        Ok(Self {
            v4: RadixTree::with_options(options)?,
            v6: RadixTree::with_options(options)?,
            default_policy,
        })
    }

    /// Builds the list described by `acl`, tries shaped by `arena`.
    pub fn from_config(acl: &AclConfig, arena: &ArenaConfig) -> Result<Self, AclError> {
        let mut list = Self::with_options(acl.default_policy, radix_options(arena))?;
        for rule in &acl.rules {
            list.add_rule(rule.network, rule.policy)?;
        }
        debug!(
            rules = list.rule_count(),
            nodes = list.node_count(),
            "access list built"
        );
        Ok(list)
    }

    pub fn default_policy(&self) -> Policy {
        self.default_policy
    }

    /// Adds a rule. A second rule for the same network is rejected and the
    /// first one kept.
    pub fn add_rule(&mut self, network: IpNetwork, policy: Policy) -> Result<(), AclError> {
        let result = match network {
            IpNetwork::V4(net) => self.v4.insert(
                u32::from(net.network()),
                u32::prefix_mask(u32::from(net.prefix())),
                policy,
            ),
            IpNetwork::V6(net) => self.v6.insert(
                u128::from(net.network()),
                u128::prefix_mask(u32::from(net.prefix())),
                policy,
            ),
        };

        match result {
            Ok(()) => {
                debug!(%network, ?policy, "access rule added");
                Ok(())
            }
            Err(source) => {
                if source == RadixError::KeyConflict {
                    warn!(%network, ?policy, "conflicting access rule ignored");
                }
                Err(AclError::Rule { network, source })
            }
        }
    }

    /// Removes the rule for exactly `network` and returns its policy.
    pub fn remove_rule(&mut self, network: IpNetwork) -> Result<Policy, AclError> {
        let result = match network {
            IpNetwork::V4(net) => self
                .v4
                .delete_prefix(u32::from(net.network()), u32::from(net.prefix())),
            IpNetwork::V6(net) => self
                .v6
                .delete_prefix(u128::from(net.network()), u32::from(net.prefix())),
        };
        result.map_err(|source| AclError::Rule { network, source })
    }

    /// Policy of the most specific rule covering `addr`.
    pub fn check(&self, addr: IpAddr) -> Policy {
        let matched = match addr {
            IpAddr::V4(v4) => self.v4.find(u32::from(v4)),
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => self.v4.find(u32::from(v4)),
                None => self.v6.find(u128::from(v6)),
            },
        };
        matched.copied().unwrap_or(self.default_policy)
    }

    pub fn rule_count(&self) -> usize {
        self.v4.len() + self.v6.len()
    }

    /// Trie nodes held by both families.
    pub fn node_count(&self) -> usize {
        self.v4.node_count() + self.v6.node_count()
    }
}
