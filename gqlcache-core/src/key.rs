//! Cache key types.
//!
//! A [`CacheKey`] is the fingerprint of a GraphQL request: a prefix, a
//! version and an ordered list of [`KeyPart`]s. Keys are normally produced by
//! [`CacheKeyBuilder`](crate::CacheKeyBuilder), which guarantees the part
//! order is stable.
//!
//! ## Format
//!
//! The string form is `{prefix}:v{version}:key1=value1&key2=value2`.
//! The prefix is omitted if empty and the version is omitted if zero.
//!
//! ```
//! use gqlcache_core::{CacheKey, KeyPart};
//!
//! let key = CacheKey::new("gql", 1, vec![KeyPart::new("method", Some("POST"))]);
//! assert_eq!(key.to_string(), "gql:v1:method=POST");
//!
//! let key = CacheKey::new("", 0, vec![KeyPart::new("flag", None::<&str>)]);
//! assert_eq!(key.to_string(), "flag");
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use smol_str::SmolStr;

#[derive(Debug, Clone, Eq, PartialEq, Hash, serde::Serialize)]
struct CacheKeyInner {
    parts: Vec<KeyPart>,
    version: u32,
    prefix: SmolStr,
}

/// Fingerprint of a request, used to address the store and the coalescer.
///
/// `CacheKey` wraps its data in [`Arc`], so cloning only bumps a reference
/// count. Keys are cloned into the in-flight map, into background tasks and
/// into store calls.
#[derive(Clone, Debug, serde::Serialize)]
#[serde(into = "CacheKeyInner")]
pub struct CacheKey {
    inner: Arc<CacheKeyInner>,
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner == other.inner
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash(state);
    }
}

impl From<CacheKey> for CacheKeyInner {
    fn from(key: CacheKey) -> Self {
        Arc::try_unwrap(key.inner).unwrap_or_else(|arc| (*arc).clone())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.inner.prefix.is_empty() {
            write!(f, "{}:", self.inner.prefix)?;
        }
        if self.inner.version > 0 {
            write!(f, "v{}:", self.inner.version)?;
        }
        for (i, part) in self.inner.parts.iter().enumerate() {
            if i > 0 {
                write!(f, "&")?;
            }
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}

impl CacheKey {
    /// Creates a new cache key with the given components.
    pub fn new(prefix: impl Into<SmolStr>, version: u32, parts: Vec<KeyPart>) -> Self {
        CacheKey {
            inner: Arc::new(CacheKeyInner {
                parts,
                version,
                prefix: prefix.into(),
            }),
        }
    }

    /// Returns an iterator over the key parts.
    pub fn parts(&self) -> impl Iterator<Item = &KeyPart> {
        self.inner.parts.iter()
    }

    /// Returns the value of the first part named `key`.
    pub fn part(&self, key: &str) -> Option<&KeyPart> {
        self.inner.parts.iter().find(|part| part.key() == key)
    }

    /// Returns the cache key version number.
    pub fn version(&self) -> u32 {
        self.inner.version
    }

    /// Returns the cache key prefix.
    pub fn prefix(&self) -> &str {
        &self.inner.prefix
    }

    /// Hex encoded SHA-256 digest of the string form.
    ///
    /// Stable across processes, suitable for stores that address entries
    /// by plain strings.
    pub fn fingerprint(&self) -> SmolStr {
        let digest = Sha256::digest(self.to_string().as_bytes());
        SmolStr::new(hex::encode(digest))
    }

    /// Returns the estimated memory usage of this key in bytes.
    pub fn memory_size(&self) -> usize {
        use std::mem::size_of;

        let arc_overhead = 2 * size_of::<usize>() + size_of::<CacheKeyInner>();
        let parts = self
            .inner
            .parts
            .iter()
            .map(|p| size_of::<KeyPart>() + p.key().len() + p.value().map_or(0, str::len))
            .sum::<usize>();

        arc_overhead + self.inner.prefix.len() + parts
    }
}

/// A single component of a cache key.
///
/// ```
/// use gqlcache_core::KeyPart;
///
/// let method = KeyPart::new("method", Some("POST"));
/// assert_eq!(method.key(), "method");
/// assert_eq!(method.value(), Some("POST"));
/// assert_eq!(method.to_string(), "method=POST");
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct KeyPart {
    key: SmolStr,
    value: Option<SmolStr>,
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)?;
        if let Some(ref value) = self.value {
            write!(f, "={}", value)?;
        }
        Ok(())
    }
}

impl KeyPart {
    /// Creates a new key part.
    pub fn new<K: AsRef<str>, V: AsRef<str>>(key: K, value: Option<V>) -> Self {
        KeyPart {
            key: SmolStr::new(key),
            value: value.map(SmolStr::new),
        }
    }

    /// Returns the key name.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the optional value.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}
