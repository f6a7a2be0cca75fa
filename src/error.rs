//! Error types for the indexer

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, IndexerError>;

/// Indexer error types
#[derive(Error, Debug)]
pub enum IndexerError {
    /// Chain node unreachable or returned an error
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Log did not decode against the expected event ABI
    #[error("Decode error: {0}")]
    Decode(String),

    /// Event decoded but cannot be applied to its record
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Remote mirror request failed
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for IndexerError {
    fn from(err: std::io::Error) -> Self {
        IndexerError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for IndexerError {
    fn from(err: serde_json::Error) -> Self {
        IndexerError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for IndexerError {
    fn from(err: reqwest::Error) -> Self {
        IndexerError::Http(err.to_string())
    }
}

impl From<toml::de::Error> for IndexerError {
    fn from(err: toml::de::Error) -> Self {
        IndexerError::Config(err.to_string())
    }
}

impl From<alloy::sol_types::Error> for IndexerError {
    fn from(err: alloy::sol_types::Error) -> Self {
        IndexerError::Decode(err.to_string())
    }
}
