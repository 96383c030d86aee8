//! Serialization of cache entries to store bytes.

use std::fmt::Debug;

use bytes::Bytes;
use gqlcache_core::{CacheEntry, Raw};
use thiserror::Error;

/// Entry (de)serialization failure.
#[derive(Error, Debug)]
pub enum FormatError {
    /// Encoding an entry failed.
    #[error(transparent)]
    Serialize(Box<dyn std::error::Error + Send + Sync>),
    /// Decoding stored bytes failed.
    #[error(transparent)]
    Deserialize(Box<dyn std::error::Error + Send + Sync>),
}

/// Converts [`CacheEntry`] values to and from the bytes a backend stores.
pub trait Format: Debug + Send + Sync {
    /// Encodes an entry.
    fn serialize(&self, entry: &CacheEntry) -> Result<Raw, FormatError>;

    /// Decodes an entry.
    fn deserialize(&self, data: &[u8]) -> Result<CacheEntry, FormatError>;
}

/// JSON format (default).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

impl Format for JsonFormat {
    fn serialize(&self, entry: &CacheEntry) -> Result<Raw, FormatError> {
        serde_json::to_vec(entry)
            .map(Bytes::from)
            .map_err(|err| FormatError::Serialize(Box::new(err)))
    }

    fn deserialize(&self, data: &[u8]) -> Result<CacheEntry, FormatError> {
        serde_json::from_slice(data).map_err(|err| FormatError::Deserialize(Box::new(err)))
    }
}
