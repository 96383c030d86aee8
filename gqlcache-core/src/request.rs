//! Outgoing GraphQL request model.
//!
//! [`GraphQLRequest`] carries everything the cache needs to fingerprint and
//! forward a request: the endpoint URL, the HTTP method, headers and the
//! already serialized JSON body. The [`OperationKind`] decides whether the
//! request may touch the store at all.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of GraphQL operation a document executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Read-only query, eligible for caching.
    #[default]
    Query,
    /// Mutation. Never read from or written to the store.
    Mutation,
    /// Subscription. Handled like a mutation.
    Subscription,
}

impl OperationKind {
    /// Detects the operation kind of a GraphQL document.
    ///
    /// Only top-level definitions are inspected. A document containing any
    /// mutation (or subscription) definition is reported as such, even when
    /// it also contains queries.
    ///
    /// ```
    /// use gqlcache_core::OperationKind;
    ///
    /// assert_eq!(OperationKind::detect("{ shop { name } }"), OperationKind::Query);
    /// assert_eq!(
    ///     OperationKind::detect("# add\nmutation Add($id: ID!) { cartAdd(id: $id) { id } }"),
    ///     OperationKind::Mutation,
    /// );
    /// ```
    pub fn detect(document: &str) -> Self {
        let bytes = document.as_bytes();
        let mut depth = 0usize;
        let mut i = 0;

        while i < bytes.len() {
            match bytes[i] {
                b'#' => {
                    while i < bytes.len() && bytes[i] != b'\n' && bytes[i] != b'\r' {
                        i += 1;
                    }
                }
                b'"' => i = skip_string(bytes, i),
                b'{' | b'(' => {
                    depth += 1;
                    i += 1;
                }
                b'}' | b')' => {
                    depth = depth.saturating_sub(1);
                    i += 1;
                }
                b'$' | b'@' => {
                    i = skip_name(bytes, i + 1);
                }
                c if is_name_start(c) => {
                    let end = skip_name(bytes, i);
                    if depth == 0 {
                        match &document[i..end] {
                            "mutation" => return OperationKind::Mutation,
                            "subscription" => return OperationKind::Subscription,
                            _ => {}
                        }
                    }
                    i = end;
                }
                _ => i += 1,
            }
        }

        OperationKind::Query
    }

    /// Whether responses to this operation may be stored.
    pub fn is_cacheable(&self) -> bool {
        matches!(self, OperationKind::Query)
    }
}

fn is_name_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn skip_name(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
    }
    i
}

/// Returns the index just past the string literal starting at `start`.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    if bytes[start..].starts_with(b"\"\"\"") {
        let mut i = start + 3;
        while i < bytes.len() {
            if bytes[i] == b'\\' && bytes[i..].starts_with(b"\\\"\"\"") {
                i += 4;
            } else if bytes[i..].starts_with(b"\"\"\"") {
                return i + 3;
            } else {
                i += 1;
            }
        }
        return bytes.len();
    }

    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' | b'\n' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// A GraphQL request about to be sent upstream.
#[derive(Debug, Clone)]
pub struct GraphQLRequest {
    url: String,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
    operation: OperationKind,
}

impl GraphQLRequest {
    /// Starts building a `POST` request for `query` against `url`.
    pub fn builder(url: impl Into<String>, query: impl Into<String>) -> GraphQLRequestBuilder {
        GraphQLRequestBuilder::new(url.into(), query.into())
    }

    /// Creates a request from already prepared parts.
    ///
    /// The body is used verbatim; the caller states the operation kind.
    pub fn from_parts(
        url: impl Into<String>,
        method: Method,
        headers: HeaderMap,
        body: impl Into<Bytes>,
        operation: OperationKind,
    ) -> Self {
        Self {
            url: url.into(),
            method,
            headers,
            body: body.into(),
            operation,
        }
    }

    /// Endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Serialized request body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Operation kind of the document.
    pub fn operation(&self) -> OperationKind {
        self.operation
    }

    /// Shorthand for mutations and subscriptions.
    pub fn is_mutation(&self) -> bool {
        !self.operation.is_cacheable()
    }
}

/// Builder for [`GraphQLRequest`].
#[derive(Debug)]
pub struct GraphQLRequestBuilder {
    url: String,
    query: String,
    variables: Option<Value>,
    operation_name: Option<String>,
    headers: HeaderMap,
    operation: Option<OperationKind>,
}

impl GraphQLRequestBuilder {
    fn new(url: String, query: String) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self {
            url,
            query,
            variables: None,
            operation_name: None,
            headers,
            operation: None,
        }
    }

    /// Sets the operation variables.
    pub fn variables(self, variables: Value) -> Self {
        Self {
            variables: Some(variables),
            ..self
        }
    }

    /// Sets the operation name.
    pub fn operation_name(self, name: impl Into<String>) -> Self {
        Self {
            operation_name: Some(name.into()),
            ..self
        }
    }

    /// Adds a header, replacing any previous value with the same name.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Overrides the detected operation kind.
    pub fn operation(self, kind: OperationKind) -> Self {
        Self {
            operation: Some(kind),
            ..self
        }
    }

    /// Serializes the body and returns the request.
    pub fn build(self) -> GraphQLRequest {
        let operation = self
            .operation
            .unwrap_or_else(|| OperationKind::detect(&self.query));

        let mut body = serde_json::Map::new();
        body.insert("query".to_owned(), Value::String(self.query));
        body.insert(
            "variables".to_owned(),
            self.variables.unwrap_or_else(|| Value::Object(Default::default())),
        );
        if let Some(name) = self.operation_name {
            body.insert("operationName".to_owned(), Value::String(name));
        }

        GraphQLRequest {
            url: self.url,
            method: Method::POST,
            headers: self.headers,
            body: Bytes::from(Value::Object(body).to_string()),
            operation,
        }
    }
}
