#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

mod transport;

pub use transport::ReqwestTransport;

/// Re-export of the client type accepted by [`ReqwestTransport::with_client`].
pub use reqwest::Client;
