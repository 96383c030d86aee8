//! Request fingerprinting.
//!
//! [`CacheKeyBuilder`] turns a request into a [`CacheKey`]. The resulting key
//! parts are, in order:
//!
//! 1. `url` - the endpoint URL, verbatim
//! 2. `method` - the HTTP method
//! 3. `h:{name}` - one part per cache relevant header, names lower-cased and sorted.
//!    A value that is not valid UTF-8 is hex encoded under `hx:{name}` instead.
//! 4. `body` - SHA-256 digest of the exact body bytes
//!
//! Volatile headers (correlation ids, client addresses, cookies) are left out
//! so they never split entries. Credential headers are kept, but only as a
//! digest, so token identity still separates entries without the raw token
//! ending up in a key.

use std::collections::{BTreeMap, BTreeSet};

use http::{HeaderMap, Method};
use sha2::{Digest, Sha256};
use smol_str::SmolStr;

use crate::key::{CacheKey, KeyPart};
use crate::request::GraphQLRequest;

/// Headers that never take part in the fingerprint.
pub const DEFAULT_EXCLUDED_HEADERS: &[&str] = &[
    "content-length",
    "cookie",
    "forwarded",
    "traceparent",
    "tracestate",
    "user-agent",
    "x-amzn-trace-id",
    "x-correlation-id",
    "x-forwarded-for",
    "x-real-ip",
    "x-request-id",
];

/// Headers whose values enter the fingerprint only as a digest.
pub const DEFAULT_HASHED_HEADERS: &[&str] = &[
    "authorization",
    "x-access-token",
    "x-shopify-storefront-access-token",
];

/// Builds [`CacheKey`]s from requests.
///
/// Building is pure: no I/O, no shared state, safe to call any number of
/// times for the same request.
///
/// ```
/// use gqlcache_core::CacheKeyBuilder;
/// use http::{HeaderMap, HeaderValue, Method};
///
/// let builder = CacheKeyBuilder::default();
///
/// let mut first = HeaderMap::new();
/// first.insert("accept", HeaderValue::from_static("application/json"));
/// first.insert("x-request-id", HeaderValue::from_static("a1"));
///
/// let mut second = HeaderMap::new();
/// second.insert("x-request-id", HeaderValue::from_static("b2"));
/// second.insert("accept", HeaderValue::from_static("application/json"));
///
/// let url = "https://shop.test/api/graphql";
/// assert_eq!(
///     builder.build(url, &Method::POST, &first, b"{}"),
///     builder.build(url, &Method::POST, &second, b"{}"),
/// );
/// ```
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    prefix: SmolStr,
    version: u32,
    excluded: BTreeSet<SmolStr>,
    hashed: BTreeSet<SmolStr>,
}

impl Default for CacheKeyBuilder {
    fn default() -> Self {
        Self {
            prefix: SmolStr::new_static("gql"),
            version: 0,
            excluded: DEFAULT_EXCLUDED_HEADERS
                .iter()
                .copied()
                .map(SmolStr::new_static)
                .collect(),
            hashed: DEFAULT_HASHED_HEADERS
                .iter()
                .copied()
                .map(SmolStr::new_static)
                .collect(),
        }
    }
}

impl CacheKeyBuilder {
    /// Creates a builder with the default prefix and header lists.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the key prefix.
    pub fn prefix(self, prefix: impl Into<SmolStr>) -> Self {
        Self {
            prefix: prefix.into(),
            ..self
        }
    }

    /// Sets the key version. Bumping it orphans every previously stored entry.
    pub fn version(self, version: u32) -> Self {
        Self { version, ..self }
    }

    /// Excludes an additional header from the fingerprint.
    pub fn exclude_header(mut self, name: impl AsRef<str>) -> Self {
        self.excluded.insert(normalize(name.as_ref()));
        self
    }

    /// Includes an additional header only as a digest of its value.
    pub fn hash_header(mut self, name: impl AsRef<str>) -> Self {
        self.hashed.insert(normalize(name.as_ref()));
        self
    }

    /// Whether `name` takes part in the fingerprint.
    pub fn is_relevant(&self, name: &str) -> bool {
        !self.excluded.contains(normalize(name).as_str())
    }

    /// Builds the key for the given request attributes.
    pub fn build(&self, url: &str, method: &Method, headers: &HeaderMap, body: &[u8]) -> CacheKey {
        // Sorted by lower-cased name; values of a repeated header keep
        // their insertion order.
        let mut relevant: BTreeMap<SmolStr, Vec<u8>> = BTreeMap::new();
        for (name, value) in headers.iter() {
            let name = normalize(name.as_str());
            if self.excluded.contains(&name) {
                continue;
            }
            let joined = relevant.entry(name).or_default();
            if !joined.is_empty() {
                joined.push(b',');
            }
            joined.extend_from_slice(value.as_bytes());
        }

        let mut parts = Vec::with_capacity(relevant.len() + 3);
        parts.push(KeyPart::new("url", Some(url)));
        parts.push(KeyPart::new("method", Some(method.as_str())));
        for (name, joined) in relevant {
            let part = if self.hashed.contains(&name) {
                KeyPart::new(format!("h:{name}"), Some(digest(&joined)))
            } else {
                match String::from_utf8(joined) {
                    Ok(text) => KeyPart::new(format!("h:{name}"), Some(text)),
                    // Header names never contain ':', so `hx:` cannot clash with `h:`.
                    Err(raw) => {
                        KeyPart::new(format!("hx:{name}"), Some(hex::encode(raw.into_bytes())))
                    }
                }
            };
            parts.push(part);
        }
        parts.push(KeyPart::new("body", Some(digest(body))));

        CacheKey::new(self.prefix.clone(), self.version, parts)
    }

    /// Builds the key for a [`GraphQLRequest`].
    pub fn build_request(&self, request: &GraphQLRequest) -> CacheKey {
        self.build(
            request.url(),
            request.method(),
            request.headers(),
            request.body(),
        )
    }
}

fn normalize(name: &str) -> SmolStr {
    SmolStr::new(name.trim().to_ascii_lowercase())
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
