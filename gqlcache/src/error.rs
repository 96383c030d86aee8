//! Errors surfaced to callers of the cache.

use std::fmt;
use std::sync::Arc;

use gqlcache_core::TransportError;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A single error object as found in a GraphQL response.
///
/// Only `message` is required; everything else is carried through verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    /// Human readable description.
    pub message: String,
    /// Source locations the error refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Value>,
    /// Response path of the failing field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Value>,
    /// Implementation specific details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl GraphQLError {
    /// Creates an error with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: None,
            path: None,
            extensions: None,
        }
    }
}

impl fmt::Display for GraphQLError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Failure of a cached fetch.
///
/// Cloneable: every caller coalesced onto the same upstream call receives
/// the same error. Store failures never show up here.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The transport failed before a response was received.
    #[error("network error: {0}")]
    Network(Arc<TransportError>),
    /// Upstream answered with a non-success status.
    #[error("upstream responded with {status}: {}", summary(.errors))]
    UpstreamHttp {
        /// Response status.
        status: StatusCode,
        /// Errors extracted from the body, or the raw body as a single message.
        errors: Vec<GraphQLError>,
    },
    /// Upstream answered successfully but the body carries GraphQL errors.
    #[error("graphql errors: {}", summary(.errors))]
    GraphQLResponse {
        /// Errors from the response body.
        errors: Vec<GraphQLError>,
    },
    /// The upstream call was lost before it settled.
    #[error("upstream call aborted before completion")]
    Aborted,
}

impl CacheError {
    /// Returns the GraphQL errors carried by this error, if any.
    pub fn errors(&self) -> &[GraphQLError] {
        match self {
            CacheError::UpstreamHttp { errors, .. } | CacheError::GraphQLResponse { errors } => {
                errors
            }
            CacheError::Network(_) | CacheError::Aborted => &[],
        }
    }

    /// Returns the upstream status for [`CacheError::UpstreamHttp`].
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            CacheError::UpstreamHttp { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<TransportError> for CacheError {
    fn from(error: TransportError) -> Self {
        CacheError::Network(Arc::new(error))
    }
}

fn summary(errors: &[GraphQLError]) -> String {
    errors
        .iter()
        .map(|error| error.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
