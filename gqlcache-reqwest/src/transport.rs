//! [`Transport`] implementation over a reqwest [`Client`].

use std::time::Duration;

use async_trait::async_trait;
use gqlcache_core::{GraphQLRequest, Transport, TransportError, TransportResponse};
use http::Uri;
use reqwest::Client;
use tracing::trace;

/// Sends GraphQL requests with reqwest.
///
/// The request is sent as built: method, headers and body are taken from the
/// [`GraphQLRequest`] verbatim. Any status is returned as a response; only
/// failures to obtain one (connect, TLS, timeout, body read) are errors.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    /// Creates a transport with a default client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport over a pre-configured client.
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            timeout: None,
        }
    }

    /// Sets a per-request timeout, on top of any client-wide timeout.
    pub fn timeout(self, timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..self
        }
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn build(&self, request: &GraphQLRequest) -> Result<reqwest::Request, TransportError> {
        let uri: Uri = request
            .url()
            .parse()
            .map_err(|e: http::uri::InvalidUri| TransportError::InvalidRequest(e.to_string()))?;

        let mut http_request = http::Request::new(request.body().clone());
        *http_request.method_mut() = request.method().clone();
        *http_request.uri_mut() = uri;
        *http_request.headers_mut() = request.headers().clone();

        let mut reqwest_request = reqwest::Request::try_from(http_request)
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        if let Some(timeout) = self.timeout {
            *reqwest_request.timeout_mut() = Some(timeout);
        }
        Ok(reqwest_request)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &GraphQLRequest) -> Result<TransportResponse, TransportError> {
        let reqwest_request = self.build(request)?;

        let response = self
            .client
            .execute(reqwest_request)
            .await
            .map_err(TransportError::connection)?;
        let status = response.status();
        let body = response.bytes().await.map_err(TransportError::connection)?;
        trace!(%status, bytes = body.len(), "upstream response received");

        Ok(TransportResponse::new(status, body))
    }
}
