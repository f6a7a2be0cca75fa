//! Indexer Configuration
//!
//! Loaded from a TOML file with every field defaulted, then overridden by
//! command-line flags and environment variables in the binary.

use crate::block_sync::SyncSettings;
use crate::error::{IndexerError, Result};
use crate::util::parse_address;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound most RPC providers accept for one `eth_getLogs` range
pub const MAX_CHUNK_SIZE: u64 = 10_000;

/// Complete indexer configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub chain: ChainConfig,
    pub sync: SyncConfig,
    pub storage: StorageConfig,
    /// Which backend serves queries
    pub backend: QueryBackend,
    pub mirror: MirrorConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum QueryBackend {
    /// In-process index synced from the chain
    #[default]
    Local,
    /// Shared external indexing service
    Remote,
}

/// Chain endpoints and contract addresses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub factory_address: String,
    pub identity_registry: Option<String>,
    /// Block the factory was deployed at
    pub start_block: u64,
    pub confirmations: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            chain_id: 8453, // Base mainnet
            factory_address: "0x0000000000000000000000000000000000000000".to_string(),
            identity_registry: None,
            start_block: 0,
            confirmations: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Blocks per log query
    pub chunk_size: u64,
    pub poll_interval_secs: u64,
    pub max_addresses_per_query: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2_000,
            poll_interval_secs: 15,
            max_addresses_per_query: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub snapshot_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("data/bounty-index.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    pub base_url: Option<String>,
    pub request_timeout_secs: u64,
    /// First `await_indexed` delay; doubles each poll
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_secs: 10,
            backoff_initial_ms: 1_000,
            backoff_max_ms: 8_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl IndexerConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            IndexerError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sync.chunk_size == 0 || self.sync.chunk_size > MAX_CHUNK_SIZE {
            return Err(IndexerError::Config(format!(
                "sync.chunk_size must be between 1 and {}, got {}",
                MAX_CHUNK_SIZE, self.sync.chunk_size
            )));
        }
        if self.sync.poll_interval_secs == 0 {
            return Err(IndexerError::Config(
                "sync.poll_interval_secs must be positive".to_string(),
            ));
        }
        if self.sync.max_addresses_per_query == 0 {
            return Err(IndexerError::Config(
                "sync.max_addresses_per_query must be positive".to_string(),
            ));
        }

        parse_address(&self.chain.factory_address).map_err(|_| {
            IndexerError::Config(format!(
                "chain.factory_address is not an address: {}",
                self.chain.factory_address
            ))
        })?;
        if let Some(registry) = &self.chain.identity_registry {
            parse_address(registry).map_err(|_| {
                IndexerError::Config(format!(
                    "chain.identity_registry is not an address: {}",
                    registry
                ))
            })?;
        }

        if self.backend == QueryBackend::Remote
            && self.mirror.base_url.as_deref().map_or(true, str::is_empty)
        {
            return Err(IndexerError::Config(
                "backend = \"remote\" requires mirror.base_url".to_string(),
            ));
        }
        Ok(())
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            chain_id: self.chain.chain_id,
            factory_address: self.chain.factory_address.clone(),
            identity_registry: self.chain.identity_registry.clone(),
            start_block: self.chain.start_block,
            chunk_size: self.sync.chunk_size,
            confirmations: self.chain.confirmations,
            max_addresses_per_query: self.sync.max_addresses_per_query,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.sync.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.mirror.request_timeout_secs)
    }

    pub fn backoff(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.mirror.backoff_initial_ms),
            Duration::from_millis(self.mirror.backoff_max_ms),
        )
    }
}
