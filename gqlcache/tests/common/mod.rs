#![allow(dead_code)]

pub mod offload;
pub mod store;
pub mod tracing;
pub mod transport;

use gqlcache::GraphQLRequest;

pub const ENDPOINT: &str = "https://shop.test/api/2024-01/graphql.json";

pub fn query(document: &str) -> GraphQLRequest {
    GraphQLRequest::builder(ENDPOINT, document).build()
}
