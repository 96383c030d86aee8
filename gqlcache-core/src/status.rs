//! How a response was produced.

use std::fmt;

/// Whether a response came from the store, from upstream, or bypassed the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CacheStatus {
    /// A fresh entry was served.
    Hit,
    /// Nothing usable was stored; the response came from upstream.
    #[default]
    Miss,
    /// A stale entry was served and a refresh may have been scheduled.
    Stale,
    /// The store was not consulted (no-store strategy or mutation).
    Bypass,
}

impl CacheStatus {
    /// Returns the status as an upper-case header value.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Stale => "STALE",
            CacheStatus::Bypass => "BYPASS",
        }
    }

    /// Whether the payload came from the store.
    pub const fn is_cached(&self) -> bool {
        matches!(self, CacheStatus::Hit | CacheStatus::Stale)
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
