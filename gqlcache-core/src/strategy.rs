//! Caching strategies and their `Cache-Control` rendering.
//!
//! A [`CachingStrategy`] is chosen per request by the caller. It resolves to
//! a [`CachePolicy`] (max-age, stale-while-revalidate window and scope) or to
//! nothing at all for [`CachingStrategy::None`]. The same resolution drives
//! freshness classification, the store TTL hint and the outgoing header, so
//! they can never disagree.
//!
//! ```
//! use gqlcache_core::{CacheScope, CachingStrategy, generate_cache_control_header};
//!
//! let strategy = CachingStrategy::custom(120, 30, CacheScope::Private);
//! assert_eq!(
//!     generate_cache_control_header(&strategy),
//!     "private, max-age=120, stale-while-revalidate=30",
//! );
//! assert_eq!(generate_cache_control_header(&CachingStrategy::None), "no-store");
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Directive emitted for [`CachingStrategy::None`].
pub const NO_STORE: &str = "no-store";

/// Who may keep a copy of the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheScope {
    /// Shared caches may store the response.
    #[default]
    Public,
    /// Only the requesting client may store the response.
    Private,
}

impl CacheScope {
    /// Returns the `Cache-Control` directive for this scope.
    pub const fn as_str(&self) -> &'static str {
        match self {
            CacheScope::Public => "public",
            CacheScope::Private => "private",
        }
    }
}

impl fmt::Display for CacheScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved freshness windows of a storing strategy. All values in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CachePolicy {
    /// How long an entry is served without revalidation.
    pub max_age: u64,
    /// How long past `max_age` an entry is served while refreshing.
    pub stale_while_revalidate: u64,
    /// Cache scope.
    #[serde(default)]
    pub scope: CacheScope,
}

impl CachePolicy {
    /// Preset behind [`CachingStrategy::Short`] by default.
    pub const SHORT: CachePolicy = CachePolicy {
        max_age: 1,
        stale_while_revalidate: 9,
        scope: CacheScope::Public,
    };

    /// Preset behind [`CachingStrategy::Long`] by default.
    pub const LONG: CachePolicy = CachePolicy {
        max_age: 3600,
        stale_while_revalidate: 82800,
        scope: CacheScope::Public,
    };

    /// Total lifetime of an entry: fresh window plus stale window.
    ///
    /// Used as the TTL hint for the store; past this age the entry is
    /// useless to the classifier.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.max_age.saturating_add(self.stale_while_revalidate))
    }

    /// Renders the `Cache-Control` value for this policy.
    pub fn cache_control(&self) -> String {
        format!(
            "{}, max-age={}, stale-while-revalidate={}",
            self.scope, self.max_age, self.stale_while_revalidate
        )
    }
}

/// Caching strategy selected for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachingStrategy {
    /// Never store, never read.
    None,
    /// Short lived preset.
    #[default]
    Short,
    /// Long lived preset.
    Long,
    /// Explicit windows.
    Custom {
        /// Fresh window in seconds.
        max_age: u64,
        /// Stale window in seconds.
        stale_while_revalidate: u64,
        /// Cache scope.
        #[serde(default)]
        scope: CacheScope,
    },
}

impl CachingStrategy {
    /// Shorthand for [`CachingStrategy::Custom`].
    pub const fn custom(max_age: u64, stale_while_revalidate: u64, scope: CacheScope) -> Self {
        CachingStrategy::Custom {
            max_age,
            stale_while_revalidate,
            scope,
        }
    }

    /// Resolves the strategy with the default presets.
    ///
    /// Returns `None` for [`CachingStrategy::None`].
    pub fn resolve(&self) -> Option<CachePolicy> {
        StrategyPresets::default().resolve(self)
    }

    /// Whether the strategy stores anything.
    pub fn is_none(&self) -> bool {
        matches!(self, CachingStrategy::None)
    }
}

/// Values behind the [`CachingStrategy::Short`] and [`CachingStrategy::Long`] presets.
///
/// The presets are a policy choice of the deployment, not of the cache.
/// Defaults are [`CachePolicy::SHORT`] and [`CachePolicy::LONG`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyPresets {
    /// Resolution of [`CachingStrategy::Short`].
    pub short: CachePolicy,
    /// Resolution of [`CachingStrategy::Long`].
    pub long: CachePolicy,
}

impl Default for StrategyPresets {
    fn default() -> Self {
        Self {
            short: CachePolicy::SHORT,
            long: CachePolicy::LONG,
        }
    }
}

impl StrategyPresets {
    /// Resolves a strategy against these presets.
    pub fn resolve(&self, strategy: &CachingStrategy) -> Option<CachePolicy> {
        match *strategy {
            CachingStrategy::None => None,
            CachingStrategy::Short => Some(self.short),
            CachingStrategy::Long => Some(self.long),
            CachingStrategy::Custom {
                max_age,
                stale_while_revalidate,
                scope,
            } => Some(CachePolicy {
                max_age,
                stale_while_revalidate,
                scope,
            }),
        }
    }

    /// Renders the `Cache-Control` value of a strategy against these presets.
    pub fn cache_control_header(&self, strategy: &CachingStrategy) -> String {
        self.resolve(strategy)
            .map(|policy| policy.cache_control())
            .unwrap_or_else(|| NO_STORE.to_owned())
    }
}

/// Renders the `Cache-Control` value of a strategy with the default presets.
pub fn generate_cache_control_header(strategy: &CachingStrategy) -> String {
    StrategyPresets::default().cache_control_header(strategy)
}
