//! Upstream transport abstraction.
//!
//! The cache never talks to the network itself. A [`Transport`] sends a
//! [`GraphQLRequest`] and hands back the raw status and body; classifying
//! the outcome is the fetch executor's job. Timeouts, retries and TLS belong
//! to the transport implementation.
//!
//! # Examples
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use gqlcache_core::{GraphQLRequest, Transport, TransportError, TransportResponse};
//!
//! struct Canned;
//!
//! #[async_trait]
//! impl Transport for Canned {
//!     async fn send(&self, _req: &GraphQLRequest) -> Result<TransportResponse, TransportError> {
//!         Ok(TransportResponse::new(http::StatusCode::OK, r#"{"data":{}}"#))
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use thiserror::Error;

use crate::request::GraphQLRequest;

/// Status and body of an upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Raw response body.
    pub body: Bytes,
}

impl TransportResponse {
    /// Creates a response.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Transport-level failure: no response was received.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connecting, sending or receiving failed.
    #[error(transparent)]
    Connection(Box<dyn std::error::Error + Send + Sync>),
    /// The request could not be built from the given parts.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Wraps any error as a connection failure.
    pub fn connection<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        TransportError::Connection(Box::new(error))
    }
}

/// Sends GraphQL requests to the upstream endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request and returns whatever the endpoint answered.
    ///
    /// Non-success statuses are not errors at this level.
    async fn send(&self, request: &GraphQLRequest) -> Result<TransportResponse, TransportError>;
}

#[async_trait]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    async fn send(&self, request: &GraphQLRequest) -> Result<TransportResponse, TransportError> {
        (**self).send(request).await
    }
}

#[async_trait]
impl Transport for Box<dyn Transport> {
    async fn send(&self, request: &GraphQLRequest) -> Result<TransportResponse, TransportError> {
        (**self).send(request).await
    }
}
