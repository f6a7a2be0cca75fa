//! Chain log source.
//!
//! The sync engine needs exactly two things from a chain node: the current
//! head and the logs matching an address/topic filter over a block range.
//! `RpcLogSource` serves them over JSON-RPC; `InMemoryLogSource` replays a
//! fixed log set and can inject failures.

use crate::error::{IndexerError, Result};
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::Filter;
use alloy::sol_types::SolEvent;
use alloy::transports::http::Http;
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// Timeout for a single RPC call
const RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// Filter for one `eth_getLogs` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub addresses: Vec<Address>,
    /// topic0 alternatives
    pub event_topics: Vec<B256>,
    pub from_block: u64,
    pub to_block: u64,
}

/// A log as returned by the node, before ABI decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: u64,
    pub log_index: u64,
    pub transaction_hash: Option<B256>,
}

impl RawLog {
    /// ABI-encode an event as if `address` emitted it
    pub fn from_event<E: SolEvent>(
        address: Address,
        event: &E,
        block_number: u64,
        log_index: u64,
    ) -> Self {
        let encoded = event.encode_log_data();
        Self {
            address,
            topics: encoded.topics().to_vec(),
            data: encoded.data.clone(),
            block_number,
            log_index,
            transaction_hash: None,
        }
    }

    pub fn with_tx_hash(mut self, hash: B256) -> Self {
        self.transaction_hash = Some(hash);
        self
    }

    pub fn topic0(&self) -> Option<B256> {
        self.topics.first().copied()
    }

    /// Ordering key within the chain: (block, log index)
    pub fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

#[async_trait]
pub trait LogSource: Send + Sync {
    /// Current chain head
    async fn block_number(&self) -> Result<u64>;

    /// Logs matching the query, ascending by (block, log index)
    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>>;
}

// ============================================================================
// JSON-RPC SOURCE
// ============================================================================

pub struct RpcLogSource {
    provider: RootProvider<Http<Client>>,
    rpc_url: String,
}

impl RpcLogSource {
    pub fn new(rpc_url: &str) -> Result<Self> {
        let url: reqwest::Url = rpc_url
            .parse()
            .map_err(|e| IndexerError::Config(format!("Invalid RPC URL {}: {}", rpc_url, e)))?;
        Ok(Self {
            provider: ProviderBuilder::new().on_http(url),
            rpc_url: rpc_url.to_string(),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }
}

#[async_trait]
impl LogSource for RpcLogSource {
    async fn block_number(&self) -> Result<u64> {
        tokio::time::timeout(RPC_TIMEOUT, self.provider.get_block_number())
            .await
            .map_err(|_| IndexerError::Rpc("eth_blockNumber timed out".to_string()))?
            .map_err(|e| IndexerError::Rpc(format!("eth_blockNumber failed: {}", e)))
    }

    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>> {
        let filter = Filter::new()
            .address(query.addresses.clone())
            .event_signature(query.event_topics.clone())
            .from_block(query.from_block)
            .to_block(query.to_block);

        let logs = tokio::time::timeout(RPC_TIMEOUT, self.provider.get_logs(&filter))
            .await
            .map_err(|_| {
                IndexerError::Rpc(format!(
                    "eth_getLogs [{}, {}] timed out",
                    query.from_block, query.to_block
                ))
            })?
            .map_err(|e| {
                IndexerError::Rpc(format!(
                    "eth_getLogs [{}, {}] failed: {}",
                    query.from_block, query.to_block, e
                ))
            })?;

        let mut raw = Vec::with_capacity(logs.len());
        for log in logs {
            // pending logs carry no position and cannot be checkpointed
            let (Some(block_number), Some(log_index)) = (log.block_number, log.log_index) else {
                debug!("Skipping pending log from {}", log.inner.address);
                continue;
            };
            raw.push(RawLog {
                address: log.inner.address,
                topics: log.inner.data.topics().to_vec(),
                data: log.inner.data.data.clone(),
                block_number,
                log_index,
                transaction_hash: log.transaction_hash,
            });
        }
        raw.sort_by_key(RawLog::position);
        Ok(raw)
    }
}

// ============================================================================
// IN-MEMORY SOURCE
// ============================================================================

/// Deterministic log source over a fixed set of logs
#[derive(Default)]
pub struct InMemoryLogSource {
    logs: Mutex<Vec<RawLog>>,
    head: AtomicU64,
    calls: AtomicUsize,
    /// Fail the call with this 1-based sequence number
    fail_on_call: Mutex<Option<usize>>,
}

impl InMemoryLogSource {
    pub fn new(head: u64) -> Self {
        let source = Self::default();
        source.head.store(head, Ordering::SeqCst);
        source
    }

    pub fn push(&self, log: RawLog) {
        self.logs.lock().push(log);
    }

    pub fn extend(&self, logs: impl IntoIterator<Item = RawLog>) {
        self.logs.lock().extend(logs);
    }

    pub fn set_head(&self, head: u64) {
        self.head.store(head, Ordering::SeqCst);
    }

    /// Number of `get_logs` calls served so far
    pub fn get_logs_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make the nth `get_logs` call from now fail (1 = the next call)
    pub fn fail_nth_call(&self, n: usize) {
        let target = self.calls.load(Ordering::SeqCst) + n;
        *self.fail_on_call.lock() = Some(target);
    }
}

#[async_trait]
impl LogSource for InMemoryLogSource {
    async fn block_number(&self) -> Result<u64> {
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut fail = self.fail_on_call.lock();
            if *fail == Some(call) {
                *fail = None;
                return Err(IndexerError::Rpc(format!(
                    "simulated failure on call {}",
                    call
                )));
            }
        }

        let addresses: HashSet<&Address> = query.addresses.iter().collect();
        let topics: HashSet<&B256> = query.event_topics.iter().collect();

        let mut matched: Vec<RawLog> = self
            .logs
            .lock()
            .iter()
            .filter(|log| {
                log.block_number >= query.from_block
                    && log.block_number <= query.to_block
                    && addresses.contains(&log.address)
                    && log.topics.first().is_some_and(|t| topics.contains(t))
            })
            .cloned()
            .collect();
        matched.sort_by_key(RawLog::position);
        Ok(matched)
    }
}
