//! Deployment configuration.
//!
//! ```yaml
//! presets:
//!   short: { max_age: 1s, stale_while_revalidate: 9s, scope: public }
//!   long:  { max_age: 1h, stale_while_revalidate: 23h, scope: public }
//! key:
//!   prefix: gql
//!   version: 1
//!   exclude_headers: [x-session-id]
//!   hash_headers: [x-customer-token]
//! ```
//!
//! Every section and field is optional; missing values fall back to the
//! defaults of [`StrategyPresets`] and [`CacheKeyBuilder`].

use std::time::Duration;

use gqlcache_core::{CacheKeyBuilder, CachePolicy, CacheScope, StrategyPresets};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

/// Configuration loading failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not valid YAML or does not match the schema.
    #[error("invalid configuration: {0}")]
    Yaml(#[from] serde_saphyr::Error),
    /// A preset window is not a whole number of seconds.
    #[error("preset `{preset}`: {field} must be a whole number of seconds, got {value:?}")]
    SubSecond {
        /// Preset name.
        preset: &'static str,
        /// Offending field.
        field: &'static str,
        /// Configured value.
        value: Duration,
    },
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Values behind the `short` and `long` strategies.
    pub presets: PresetsConfig,
    /// Cache key construction.
    pub key: KeyConfig,
}

impl Config {
    /// Parses and validates a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_saphyr::from_str(yaml)?;
        config.presets.validate()?;
        Ok(config)
    }

    /// Resolved strategy presets.
    pub fn presets(&self) -> StrategyPresets {
        StrategyPresets {
            short: self.presets.short.policy(),
            long: self.presets.long.policy(),
        }
    }

    /// Key builder configured from the `key` section.
    pub fn key_builder(&self) -> CacheKeyBuilder {
        let builder = CacheKeyBuilder::new()
            .prefix(self.key.prefix.clone())
            .version(self.key.version);
        let builder = self
            .key
            .exclude_headers
            .iter()
            .fold(builder, |builder, name| builder.exclude_header(name));
        self.key
            .hash_headers
            .iter()
            .fold(builder, |builder, name| builder.hash_header(name))
    }
}

/// `presets` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresetsConfig {
    /// Resolution of the `short` strategy.
    pub short: PresetConfig,
    /// Resolution of the `long` strategy.
    pub long: PresetConfig,
}

impl Default for PresetsConfig {
    fn default() -> Self {
        Self {
            short: CachePolicy::SHORT.into(),
            long: CachePolicy::LONG.into(),
        }
    }
}

impl PresetsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.short.validate("short")?;
        self.long.validate("long")
    }
}

/// A single preset, with human readable durations (`"90s"`, `"1h"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetConfig {
    /// Fresh window.
    #[serde(with = "humantime_serde")]
    pub max_age: Duration,
    /// Stale window.
    #[serde(with = "humantime_serde")]
    pub stale_while_revalidate: Duration,
    /// Cache scope.
    #[serde(default)]
    pub scope: CacheScope,
}

impl PresetConfig {
    fn validate(&self, preset: &'static str) -> Result<(), ConfigError> {
        for (field, value) in [
            ("max_age", self.max_age),
            ("stale_while_revalidate", self.stale_while_revalidate),
        ] {
            if value.subsec_nanos() != 0 {
                return Err(ConfigError::SubSecond {
                    preset,
                    field,
                    value,
                });
            }
        }
        Ok(())
    }

    /// Converts to a [`CachePolicy`], truncating to whole seconds.
    pub fn policy(&self) -> CachePolicy {
        CachePolicy {
            max_age: self.max_age.as_secs(),
            stale_while_revalidate: self.stale_while_revalidate.as_secs(),
            scope: self.scope,
        }
    }
}

impl From<CachePolicy> for PresetConfig {
    fn from(policy: CachePolicy) -> Self {
        Self {
            max_age: Duration::from_secs(policy.max_age),
            stale_while_revalidate: Duration::from_secs(policy.stale_while_revalidate),
            scope: policy.scope,
        }
    }
}

/// `key` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// Key prefix.
    pub prefix: SmolStr,
    /// Key version. Bumping it orphans all stored entries.
    pub version: u32,
    /// Headers left out of the key in addition to the built-in list.
    pub exclude_headers: Vec<String>,
    /// Headers included only as a digest in addition to the built-in list.
    pub hash_headers: Vec<String>,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            prefix: SmolStr::new_static("gql"),
            version: 0,
            exclude_headers: Vec::new(),
            hash_headers: Vec::new(),
        }
    }
}
