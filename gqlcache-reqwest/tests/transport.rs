//! Integration tests for ReqwestTransport using wiremock.

use std::time::Duration;

use gqlcache::{CacheError, CacheOrchestrator, CacheStatus, CachingStrategy, GraphQLRequest};
use gqlcache_moka::MokaBackend;
use gqlcache_reqwest::ReqwestTransport;
use http::{HeaderName, HeaderValue};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SHOP: &str = "query Shop($first: Int) { products(first: $first) { nodes { id } } }";

fn request(server: &MockServer) -> GraphQLRequest {
    GraphQLRequest::builder(format!("{}/graphql", server.uri()), SHOP)
        .variables(json!({"first": 3}))
        .header(
            HeaderName::from_static("x-shopify-storefront-access-token"),
            HeaderValue::from_static("public-token"),
        )
        .build()
}

#[tokio::test]
async fn posts_json_body_and_caches_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("content-type", "application/json"))
        .and(header("x-shopify-storefront-access-token", "public-token"))
        .and(body_json(json!({"query": SHOP, "variables": {"first": 3}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"products": {"nodes": [{"id": "1"}]}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cache = CacheOrchestrator::builder()
        .store(MokaBackend::builder().max_entries(100).build())
        .transport(ReqwestTransport::new())
        .build();
    let request = request(&server);

    let first = cache.fetch(&request, CachingStrategy::Long).await.unwrap();
    let second = cache.fetch(&request, CachingStrategy::Long).await.unwrap();

    assert_eq!(first.status, CacheStatus::Miss);
    assert_eq!(second.status, CacheStatus::Hit);
    assert_eq!(second.data, json!({"products": {"nodes": [{"id": "1"}]}}));
}

#[tokio::test]
async fn server_error_with_plain_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .expect(2)
        .mount(&server)
        .await;

    let cache = CacheOrchestrator::builder()
        .store(MokaBackend::builder().max_entries(100).build())
        .transport(ReqwestTransport::new())
        .build();
    let request = request(&server);

    for _ in 0..2 {
        let error = cache
            .fetch(&request, CachingStrategy::Short)
            .await
            .unwrap_err();
        match error {
            CacheError::UpstreamHttp { status, errors } => {
                assert_eq!(status, 500);
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].message, "Internal Server Error");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

#[tokio::test]
async fn graphql_errors_are_not_cached() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{"message": "Field 'products' is missing required arguments"}]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let cache = CacheOrchestrator::builder()
        .store(MokaBackend::builder().max_entries(100).build())
        .transport(ReqwestTransport::new())
        .build();
    let request = request(&server);

    for _ in 0..2 {
        let error = cache
            .fetch(&request, CachingStrategy::Long)
            .await
            .unwrap_err();
        assert!(matches!(error, CacheError::GraphQLResponse { .. }));
    }
}

#[tokio::test]
async fn slow_upstream_times_out_as_network_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": {}}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let cache = CacheOrchestrator::builder()
        .store(MokaBackend::builder().max_entries(100).build())
        .transport(ReqwestTransport::new().timeout(Duration::from_millis(50)))
        .build();

    let error = cache
        .fetch(&request(&server), CachingStrategy::Short)
        .await
        .unwrap_err();
    assert!(matches!(error, CacheError::Network(_)));
}

#[tokio::test]
async fn unreachable_upstream_is_network_error() {
    let cache = CacheOrchestrator::builder()
        .store(MokaBackend::builder().max_entries(100).build())
        .transport(ReqwestTransport::new())
        .build();
    let request = GraphQLRequest::builder("http://127.0.0.1:1/graphql", SHOP).build();

    let error = cache
        .fetch(&request, CachingStrategy::None)
        .await
        .unwrap_err();
    assert!(matches!(error, CacheError::Network(_)));
}
