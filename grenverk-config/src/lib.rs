//! # Grenverk Configuration System
//!
//! Hierarchical configuration for the index workspace: node allocation,
//! timers, the address access list and telemetry.
//!
//! ## Features
//! - **Layered Sources**: defaults, YAML files and `GRENVERK_*` environment
//! - **Validation**: every section checked with `validator` after merging

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod acl;
mod arena;
mod error;
mod telemetry;
mod timers;
mod validation;

pub use acl::{AclConfig, AclPolicy, AclRule};
pub use arena::{ArenaConfig, PreallocateSetting};
pub use error::ConfigError;
pub use telemetry::TelemetryConfig;
pub use timers::TimersConfig;
pub use validation::MAX_PREALLOCATE_LEVELS;

/// Base configuration file, relative to the working directory.
pub const BASE_CONFIG_PATH: &str = "config/grenverk.yaml";

/// Top-level configuration container.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone, PartialEq)]
pub struct GrenverkConfig {
    /// Node slabs, node cap and trie pre-allocation.
    #[serde(default)]
    #[validate(nested)]
    pub arena: ArenaConfig,

    /// Timer defaults and lock back-off.
    #[serde(default)]
    #[validate(nested)]
    pub timers: TimersConfig,

    /// Address access list.
    #[serde(default)]
    #[validate(nested)]
    pub acl: AclConfig,

    #[serde(default)]
    #[validate(nested)]
    pub telemetry: TelemetryConfig,
}

impl GrenverkConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default Values
    /// 2. `config/grenverk.yaml`, skipped when missing
    /// 3. `config/<GRENVERK_ENV>.yaml` (`production` by default)
    /// 4. `GRENVERK_*` environment variables, `__` separating nested keys
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(GrenverkConfig::default()));

        if Path::new(BASE_CONFIG_PATH).exists() {
            figment = figment.merge(Yaml::file(BASE_CONFIG_PATH));
        } else {
            println!("{BASE_CONFIG_PATH} not found, using default configuration");
        }

        let env = std::env::var("GRENVERK_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::extract(figment.merge(Env::prefixed("GRENVERK_").split("__")))
    }

    /// Load configuration from a specific file, with environment overrides.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        Self::extract(
            Figment::from(Serialized::defaults(GrenverkConfig::default()))
                .merge(Yaml::file(path))
                .merge(Env::prefixed("GRENVERK_").split("__")),
        )
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    fn in_config_dir(jail: &mut Jail, name: &str, contents: &str) -> figment::error::Result<()> {
        std::fs::create_dir_all(jail.directory().join("config")).map_err(|e| e.to_string())?;
        jail.create_file(format!("config/{name}"), contents)?;
        Ok(())
    }

    #[test]
    fn full_config_validation() {
        let config = GrenverkConfig::default();
        config.validate().expect("Default config should validate");
    }

    #[test]
    fn defaults_without_files() {
        Jail::expect_with(|_| {
            let config = GrenverkConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config, GrenverkConfig::default());
            Ok(())
        });
    }

    #[test]
    fn yaml_layers_and_environment_override() {
        Jail::expect_with(|jail| {
            in_config_dir(
                jail,
                "grenverk.yaml",
                r#"
arena:
  page_size: 8192
  preallocate: auto
acl:
  default_policy: deny
  rules:
    - network: 10.0.0.0/8
      policy: allow
    - network: "2001:db8::/32"
      policy: allow
"#,
            )?;
            in_config_dir(jail, "staging.yaml", "telemetry:\n  log_level: debug\n")?;
            jail.set_env("GRENVERK_ENV", "staging");
            jail.set_env("GRENVERK_TIMERS__DEFAULT_TIMEOUT_MS", "1500");

            let config = GrenverkConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.arena.page_size, 8192);
            assert_eq!(config.arena.preallocate, PreallocateSetting::Auto);
            assert_eq!(config.acl.default_policy, AclPolicy::Deny);
            assert_eq!(config.acl.rules.len(), 2);
            assert_eq!(config.telemetry.log_level, "debug");
            assert_eq!(config.timers.default_timeout_ms, 1500);
            Ok(())
        });
    }

    #[test]
    fn preallocate_levels_from_yaml() {
        Jail::expect_with(|jail| {
            jail.create_file("index.yaml", "arena:\n  preallocate:\n    levels: 6\n")?;
            let config = GrenverkConfig::load_from_path("index.yaml").map_err(|e| e.to_string())?;
            assert_eq!(config.arena.preallocate, PreallocateSetting::Levels(6));
            Ok(())
        });
    }

    #[test]
    fn metrics_switch_from_environment() {
        Jail::expect_with(|jail| {
            jail.set_env("GRENVERK_TELEMETRY__METRICS", "false");
            let config = GrenverkConfig::load().map_err(|e| e.to_string())?;
            assert!(!config.telemetry.metrics);
            assert!(GrenverkConfig::default().telemetry.metrics);
            Ok(())
        });
    }

    #[test]
    fn rejects_invalid_values() {
        Jail::expect_with(|jail| {
            jail.create_file("bad_page.yaml", "arena:\n  page_size: 3000\n")?;
            assert!(matches!(
                GrenverkConfig::load_from_path("bad_page.yaml"),
                Err(ConfigError::Validation(_))
            ));

            jail.create_file(
                "bad_rule.yaml",
                "acl:\n  rules:\n    - network: 10.0.0.1/8\n      policy: deny\n",
            )?;
            assert!(matches!(
                GrenverkConfig::load_from_path("bad_rule.yaml"),
                Err(ConfigError::Validation(_))
            ));

            jail.create_file("bad_policy.yaml", "acl:\n  default_policy: maybe\n")?;
            assert!(matches!(
                GrenverkConfig::load_from_path("bad_policy.yaml"),
                Err(ConfigError::Parsing(_))
            ));
            Ok(())
        });
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            GrenverkConfig::load_from_path("does/not/exist.yaml"),
            Err(ConfigError::FileNotFound(_))
        ));
    }

    #[test]
    fn config_serializes_back_to_yaml() {
        let yaml = serde_yaml::to_string(&GrenverkConfig::default()).unwrap();
        assert!(yaml.contains("page_size: 4096"));
        assert!(yaml.contains("default_policy: allow"));
    }
}
