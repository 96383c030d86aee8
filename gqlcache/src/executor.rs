//! Upstream calls and classification of their outcome.
//!
//! [`FetchExecutor`] sends a request through a [`Transport`] and turns the
//! raw status and body into either a [`Fetched`] payload or a
//! [`CacheError`]:
//!
//! | outcome                               | result                          |
//! |---------------------------------------|---------------------------------|
//! | transport failure                     | [`CacheError::Network`]         |
//! | non-2xx status                        | [`CacheError::UpstreamHttp`]    |
//! | 2xx, body is not a GraphQL response   | [`CacheError::UpstreamHttp`]    |
//! | 2xx, non-empty `errors`               | [`CacheError::GraphQLResponse`] |
//! | 2xx otherwise                         | `Ok(Fetched)` with `data`       |

use std::time::Instant;

use gqlcache_core::{CachingStrategy, GraphQLRequest, Transport, TransportResponse};
use http::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{CacheError, GraphQLError};

/// Successful upstream outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    /// The `data` member of the response.
    pub payload: Value,
    /// Whether the payload may be written to the store.
    pub cacheable: bool,
}

/// Sends requests upstream and classifies the responses.
#[derive(Debug, Clone)]
pub struct FetchExecutor<T> {
    transport: T,
}

impl<T> FetchExecutor<T>
where
    T: Transport,
{
    /// Creates an executor over `transport`.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Performs one upstream call.
    ///
    /// Never touches the store. The result is cacheable unless the strategy
    /// stores nothing or the request is a mutation.
    pub async fn fetch(
        &self,
        request: &GraphQLRequest,
        strategy: &CachingStrategy,
    ) -> Result<Fetched, CacheError> {
        let started = Instant::now();
        let response = self.transport.send(request).await;
        crate::metrics::record_upstream(started.elapsed());

        let payload = classify_response(response?)?;
        let cacheable = !(strategy.is_none() || request.is_mutation());
        debug!(cacheable, "upstream call succeeded");

        Ok(Fetched { payload, cacheable })
    }
}

#[derive(Deserialize)]
struct ResponseBody {
    #[serde(default)]
    data: Value,
    #[serde(default)]
    errors: Option<Vec<GraphQLError>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Wrapped { errors: Vec<GraphQLError> },
    List(Vec<GraphQLError>),
    Single(GraphQLError),
}

/// Classifies a raw upstream response.
pub fn classify_response(response: TransportResponse) -> Result<Value, CacheError> {
    let TransportResponse { status, body } = response;

    if !status.is_success() {
        return Err(CacheError::UpstreamHttp {
            status,
            errors: error_body(status, &body),
        });
    }

    match serde_json::from_slice::<ResponseBody>(&body) {
        Ok(ResponseBody {
            errors: Some(errors),
            ..
        }) if !errors.is_empty() => Err(CacheError::GraphQLResponse { errors }),
        Ok(ResponseBody { data, .. }) => Ok(data),
        Err(_) => Err(CacheError::UpstreamHttp {
            status,
            errors: vec![raw_message(status, &body)],
        }),
    }
}

fn error_body(status: StatusCode, body: &[u8]) -> Vec<GraphQLError> {
    let errors = match serde_json::from_slice::<ErrorBody>(body) {
        Ok(ErrorBody::Wrapped { errors }) | Ok(ErrorBody::List(errors)) => errors,
        Ok(ErrorBody::Single(error)) => vec![error],
        Err(_) => Vec::new(),
    };

    if errors.is_empty() {
        vec![raw_message(status, body)]
    } else {
        errors
    }
}

fn raw_message(status: StatusCode, body: &[u8]) -> GraphQLError {
    if body.is_empty() {
        GraphQLError::new(status.to_string())
    } else {
        GraphQLError::new(String::from_utf8_lossy(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: u16, body: &str) -> TransportResponse {
        TransportResponse::new(
            StatusCode::from_u16(status).unwrap(),
            body.as_bytes().to_vec(),
        )
    }

    fn messages(error: &CacheError) -> Vec<&str> {
        error.errors().iter().map(|e| e.message.as_str()).collect()
    }

    #[test]
    fn data_member_is_the_payload() {
        let payload =
            classify_response(response(200, r#"{"data":{"shop":{"name":"demo"}}}"#)).unwrap();
        assert_eq!(payload, json!({"shop": {"name": "demo"}}));
    }

    #[test]
    fn empty_errors_list_is_success() {
        let payload = classify_response(response(200, r#"{"data":{"a":1},"errors":[]}"#)).unwrap();
        assert_eq!(payload, json!({"a": 1}));
    }

    #[test]
    fn graphql_errors_on_success_status() {
        let error = classify_response(response(
            200,
            r#"{"data":null,"errors":[{"message":"Field 'x' doesn't exist","path":["x"]}]}"#,
        ))
        .unwrap_err();

        assert!(matches!(error, CacheError::GraphQLResponse { .. }));
        assert_eq!(messages(&error), ["Field 'x' doesn't exist"]);
        assert_eq!(error.errors()[0].path, Some(json!(["x"])));
    }

    #[test]
    fn non_json_error_body_becomes_single_message() {
        let error = classify_response(response(500, "Internal Server Error")).unwrap_err();

        assert_eq!(error.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(messages(&error), ["Internal Server Error"]);
    }

    #[test]
    fn json_error_bodies_are_parsed() {
        let wrapped = classify_response(response(400, r#"{"errors":[{"message":"bad query"}]}"#))
            .unwrap_err();
        assert_eq!(messages(&wrapped), ["bad query"]);

        let list = classify_response(response(
            502,
            r#"[{"message":"one"},{"message":"two"}]"#,
        ))
        .unwrap_err();
        assert_eq!(messages(&list), ["one", "two"]);

        let single = classify_response(response(401, r#"{"message":"unauthorized"}"#)).unwrap_err();
        assert_eq!(messages(&single), ["unauthorized"]);
    }

    #[test]
    fn unrecognised_json_error_body_is_kept_raw() {
        let error = classify_response(response(503, r#"{"retry":true}"#)).unwrap_err();
        assert_eq!(messages(&error), [r#"{"retry":true}"#]);
    }

    #[test]
    fn empty_error_body_uses_status_line() {
        let error = classify_response(response(504, "")).unwrap_err();
        assert_eq!(messages(&error), ["504 Gateway Timeout"]);
    }

    #[test]
    fn error_body_text_is_kept_verbatim() {
        let error = classify_response(response(500, "  upstream exploded\n")).unwrap_err();
        assert_eq!(messages(&error), ["  upstream exploded\n"]);

        let error = classify_response(response(502, " ")).unwrap_err();
        assert_eq!(messages(&error), [" "]);
    }

    #[test]
    fn success_status_with_html_body_is_upstream_error() {
        let error = classify_response(response(200, "<html>maintenance</html>")).unwrap_err();
        assert_eq!(error.status(), Some(StatusCode::OK));
        assert_eq!(messages(&error), ["<html>maintenance</html>"]);
    }
}
