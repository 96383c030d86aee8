//! Stored responses and their freshness.
//!
//! A [`CacheEntry`] is written once per successful, cacheable upstream call
//! and never modified afterwards; a refresh writes a new entry over the old
//! one. Whether an entry may be served is decided by [`classify`]:
//!
//! | age                                   | result              |
//! |---------------------------------------|---------------------|
//! | `age <= max_age`                      | [`Freshness::Fresh`] |
//! | `max_age < age <= max_age + swr`      | [`Freshness::Stale`] |
//! | `age > max_age + swr`                 | [`Freshness::Absent`] |
//!
//! ```
//! use chrono::{Duration, Utc};
//! use gqlcache_core::{CacheEntry, CachingStrategy, Freshness, classify};
//!
//! let strategy = CachingStrategy::custom(60, 30, Default::default());
//! let now = Utc::now();
//! let entry = CacheEntry::new(
//!     serde_json::json!({"shop": "demo"}),
//!     now - Duration::seconds(75),
//!     strategy,
//! );
//!
//! assert_eq!(classify(Some(&entry), &strategy, now), Freshness::Stale);
//! ```

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::strategy::{CachePolicy, CachingStrategy, StrategyPresets};

/// A stored response payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    value: Value,
    stored_at: DateTime<Utc>,
    strategy: CachingStrategy,
}

impl CacheEntry {
    /// Creates an entry.
    pub fn new(value: Value, stored_at: DateTime<Utc>, strategy: CachingStrategy) -> Self {
        Self {
            value,
            stored_at,
            strategy,
        }
    }

    /// Creates an entry stored now.
    pub fn now(value: Value, strategy: CachingStrategy) -> Self {
        Self::new(value, Utc::now(), strategy)
    }

    /// Returns the stored payload.
    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns when the entry was written.
    #[inline]
    pub fn stored_at(&self) -> DateTime<Utc> {
        self.stored_at
    }

    /// Returns the strategy the entry was written under.
    #[inline]
    pub fn strategy(&self) -> &CachingStrategy {
        &self.strategy
    }

    /// Age of the entry at `now`. Negative ages (clock skew) are clamped to zero.
    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        (now - self.stored_at).max(TimeDelta::zero())
    }

    /// Consumes the entry and returns the payload.
    pub fn into_value(self) -> Value {
        self.value
    }
}

/// Outcome of classifying a stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Freshness {
    /// Serve without contacting upstream.
    Fresh,
    /// Serve, then refresh in the background.
    Stale,
    /// Treat as a miss.
    Absent,
}

/// Classifies an entry against a strategy resolved with the default presets.
///
/// The strategy of the current request governs, not the one recorded in the
/// entry: a caller asking for a shorter window sees older entries as stale.
pub fn classify(
    entry: Option<&CacheEntry>,
    strategy: &CachingStrategy,
    now: DateTime<Utc>,
) -> Freshness {
    StrategyPresets::default().classify(entry, strategy, now)
}

impl StrategyPresets {
    /// Classifies an entry against a strategy resolved with these presets.
    pub fn classify(
        &self,
        entry: Option<&CacheEntry>,
        strategy: &CachingStrategy,
        now: DateTime<Utc>,
    ) -> Freshness {
        match (entry, self.resolve(strategy)) {
            (Some(entry), Some(policy)) => classify_age(entry.age(now), &policy),
            _ => Freshness::Absent,
        }
    }
}

fn classify_age(age: TimeDelta, policy: &CachePolicy) -> Freshness {
    let max_age = seconds(policy.max_age);
    let stale_until = seconds(policy.max_age.saturating_add(policy.stale_while_revalidate));

    if age <= max_age {
        Freshness::Fresh
    } else if age <= stale_until {
        Freshness::Stale
    } else {
        Freshness::Absent
    }
}

fn seconds(secs: u64) -> TimeDelta {
    TimeDelta::try_seconds(i64::try_from(secs).unwrap_or(i64::MAX / 1_000))
        .unwrap_or(TimeDelta::MAX)
}
