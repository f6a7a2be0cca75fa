//! Chunked log-scanning sync engine.
//!
//! One cycle brings the resident snapshot up to the confirmed chain head:
//! - Scans `[last_block + 1, head - confirmations]` in fixed-size chunks
//! - Per chunk, folds factory creations, then lifecycle events of every
//!   known child contract, then identity registrations
//! - Persists the whole snapshot and publishes it before the next chunk
//!
//! Every chunk is built on a private copy of the snapshot. A fetch or save
//! failure drops that copy, so neither the checkpoint nor any partial fold
//! of the chunk survives and the next cycle retries the range in full.

use crate::chain::events::{
    creation_topics, decode_creation, decode_lifecycle, decode_registry, lifecycle_topics,
    registry_topics,
};
use crate::chain::fold::{apply_creation, apply_lifecycle, apply_registry, FoldOutcome};
use crate::chain::source::{LogQuery, LogSource, RawLog};
use crate::error::{IndexerError, Result};
use crate::model::BountyIndex;
use crate::snapshot::SnapshotHandle;
use crate::storage::SnapshotStore;
use crate::util::{normalize_address, parse_address};
use alloy::primitives::Address;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Settings for the sync engine
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub chain_id: u64,
    pub factory_address: String,
    /// Identity registry; agents are not indexed when absent
    pub identity_registry: Option<String>,
    /// First block scanned by a fresh index. Genesis carries no logs, so
    /// 0 and 1 both start the scan at block 1.
    pub start_block: u64,
    /// Blocks per `eth_getLogs` range
    pub chunk_size: u64,
    /// Blocks behind head considered final
    pub confirmations: u64,
    /// Child addresses per lifecycle log query
    pub max_addresses_per_query: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            chain_id: 8453,
            factory_address: "0x0000000000000000000000000000000000000000".to_string(),
            identity_registry: None,
            start_block: 0,
            chunk_size: 2_000,
            confirmations: 0,
            max_addresses_per_query: 500,
        }
    }
}

/// Outcome of one sync cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub from_block: u64,
    /// Last block persisted by this cycle (equal to `from_block - 1` on no-op)
    pub to_block: u64,
    pub chunks: u32,
    pub new_bounties: u32,
    pub new_challenges: u32,
    pub new_agents: u32,
    pub events_applied: u32,
    /// Replays, duplicates, untracked emitters and malformed events
    pub events_skipped: u32,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.chunks == 0
    }

    fn merge(&mut self, chunk: &SyncReport) {
        self.to_block = chunk.to_block;
        self.chunks += 1;
        self.new_bounties += chunk.new_bounties;
        self.new_challenges += chunk.new_challenges;
        self.new_agents += chunk.new_agents;
        self.events_applied += chunk.events_applied;
        self.events_skipped += chunk.events_skipped;
    }
}

/// Sync engine. The only writer of the resident snapshot.
pub struct SyncEngine {
    settings: SyncSettings,
    factory: Address,
    registry: Option<Address>,
    source: Arc<dyn LogSource>,
    store: Arc<dyn SnapshotStore>,
    handle: SnapshotHandle,
    /// At most one cycle in flight
    sync_lock: Mutex<()>,
}

impl SyncEngine {
    pub fn new(
        settings: SyncSettings,
        source: Arc<dyn LogSource>,
        store: Arc<dyn SnapshotStore>,
        handle: SnapshotHandle,
    ) -> Result<Self> {
        let factory = parse_address(&settings.factory_address)?;
        let registry = settings
            .identity_registry
            .as_deref()
            .map(parse_address)
            .transpose()?;

        Ok(Self {
            settings,
            factory,
            registry,
            source,
            store,
            handle,
            sync_lock: Mutex::new(()),
        })
    }

    pub fn handle(&self) -> &SnapshotHandle {
        &self.handle
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    fn fresh_index(&self) -> BountyIndex {
        BountyIndex::new(
            self.settings.chain_id,
            &self.settings.factory_address,
            self.settings.identity_registry.as_deref(),
            self.settings.start_block,
        )
    }

    /// Resident snapshot, loading it from the store on first use
    pub fn load_resident(&self) -> Result<Arc<BountyIndex>> {
        if let Some(current) = self.handle.current() {
            return Ok(current);
        }

        let index = match self.store.load()? {
            Some(index)
                if index.matches_deployment(
                    self.settings.chain_id,
                    &self.settings.factory_address,
                ) =>
            {
                index
            }
            Some(index) => {
                warn!(
                    "Discarding snapshot for chain {} factory {} (schema v{}); expected chain {} factory {}",
                    index.chain_id,
                    index.factory_address,
                    index.schema_version,
                    self.settings.chain_id,
                    normalize_address(&self.settings.factory_address)
                );
                self.fresh_index()
            }
            None => {
                info!(
                    "No snapshot found, indexing from block {}",
                    self.settings.start_block
                );
                self.fresh_index()
            }
        };

        Ok(self.handle.publish(index))
    }

    /// Run one sync cycle up to the confirmed head
    pub async fn sync_once(&self) -> Result<SyncReport> {
        let _guard = self.sync_lock.lock().await;

        let mut current = self.load_resident()?;
        let from_block = current.last_block + 1;
        let mut report = SyncReport {
            from_block,
            to_block: current.last_block,
            ..Default::default()
        };

        let head = self.source.block_number().await?;
        let safe_head = head.saturating_sub(self.settings.confirmations);
        if from_block > safe_head {
            debug!("Up to date at block {} (head {})", current.last_block, head);
            return Ok(report);
        }

        let started = Instant::now();
        let chunk_size = self.settings.chunk_size.max(1);
        let mut chunk_start = from_block;

        while chunk_start <= safe_head {
            let chunk_end = chunk_start.saturating_add(chunk_size - 1).min(safe_head);

            let mut next = (*current).clone();
            let chunk = self.process_chunk(&mut next, chunk_start, chunk_end).await?;

            next.advance_checkpoint(chunk_end);
            next.saved_at = Some(Utc::now());
            let next = self.persist(next).await?;
            current = self.handle.publish(next);

            debug!(
                "Chunk [{}, {}] done: {} applied, {} skipped",
                chunk_start, chunk_end, chunk.events_applied, chunk.events_skipped
            );
            report.merge(&chunk);
            chunk_start = chunk_end + 1;
        }

        info!(
            "Synced blocks {}..={} in {} chunk(s) ({:.1}s): +{} bounties, +{} challenges, +{} agents, {} events applied, {} skipped",
            report.from_block,
            report.to_block,
            report.chunks,
            started.elapsed().as_secs_f64(),
            report.new_bounties,
            report.new_challenges,
            report.new_agents,
            report.events_applied,
            report.events_skipped
        );
        Ok(report)
    }

    /// Save off the runtime threads; the write serializes and fsyncs the
    /// whole snapshot. Hands the snapshot back for publishing.
    async fn persist(&self, index: BountyIndex) -> Result<BountyIndex> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.save(&index).map(|()| index))
            .await
            .map_err(|e| IndexerError::Storage(format!("Snapshot save task failed: {}", e)))?
    }

    /// Fold one block range into `index`. Errors only on fetch failures.
    async fn process_chunk(
        &self,
        index: &mut BountyIndex,
        from_block: u64,
        to_block: u64,
    ) -> Result<SyncReport> {
        let mut chunk = SyncReport {
            from_block,
            to_block,
            ..Default::default()
        };

        // 1. creations
        let logs = self
            .source
            .get_logs(&LogQuery {
                addresses: vec![self.factory],
                event_topics: creation_topics(),
                from_block,
                to_block,
            })
            .await?;
        for log in &logs {
            let event = match decode_creation(log) {
                Ok(Some(event)) => event,
                Ok(None) => {
                    debug!("Unknown factory topic at block {}", log.block_number);
                    chunk.events_skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!("Skipping factory log: {}", e);
                    chunk.events_skipped += 1;
                    continue;
                }
            };
            let is_bounty = matches!(event, crate::chain::CreationEvent::Bounty { .. });
            match apply_creation(index, event, log) {
                Ok(FoldOutcome::Applied) => {
                    chunk.events_applied += 1;
                    if is_bounty {
                        chunk.new_bounties += 1;
                    } else {
                        chunk.new_challenges += 1;
                    }
                }
                Ok(_) => chunk.events_skipped += 1,
                Err(e) => {
                    warn!("Skipping creation event: {}", e);
                    chunk.events_skipped += 1;
                }
            }
        }

        // 2. lifecycle, over every child discovered so far (including this chunk)
        let logs = self
            .fetch_lifecycle_logs(index, from_block, to_block)
            .await?;
        for log in &logs {
            let event = match decode_lifecycle(log) {
                Ok(Some(event)) => event,
                Ok(None) => {
                    debug!("Unknown lifecycle topic from {}", log.address);
                    chunk.events_skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!("Skipping lifecycle log from {}: {}", log.address, e);
                    chunk.events_skipped += 1;
                    continue;
                }
            };
            match apply_lifecycle(index, &event, log) {
                Ok(FoldOutcome::Applied) => chunk.events_applied += 1,
                Ok(_) => chunk.events_skipped += 1,
                Err(e) => {
                    warn!("Skipping {} from {}: {}", event.name(), log.address, e);
                    chunk.events_skipped += 1;
                }
            }
        }

        // 3. identity registry
        if let Some(registry) = self.registry {
            let logs = self
                .source
                .get_logs(&LogQuery {
                    addresses: vec![registry],
                    event_topics: registry_topics(),
                    from_block,
                    to_block,
                })
                .await?;
            for log in &logs {
                let event = match decode_registry(log) {
                    Ok(Some(event)) => event,
                    Ok(None) => {
                        chunk.events_skipped += 1;
                        continue;
                    }
                    Err(e) => {
                        warn!("Skipping registry log: {}", e);
                        chunk.events_skipped += 1;
                        continue;
                    }
                };
                match apply_registry(index, event, log) {
                    Ok(FoldOutcome::Applied) => {
                        chunk.events_applied += 1;
                        chunk.new_agents += 1;
                    }
                    Ok(_) => chunk.events_skipped += 1,
                    Err(e) => {
                        warn!("Skipping registry event: {}", e);
                        chunk.events_skipped += 1;
                    }
                }
            }
        }

        Ok(chunk)
    }

    /// Lifecycle logs of all tracked children, batched by address, merged in
    /// (block, log index) order
    async fn fetch_lifecycle_logs(
        &self,
        index: &BountyIndex,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>> {
        let mut addresses = Vec::new();
        for key in index.tracked_addresses() {
            match parse_address(&key) {
                Ok(address) => addresses.push(address),
                Err(e) => warn!("Tracked key {} is not an address: {}", key, e),
            }
        }
        // an empty address filter would match every contract on chain
        if addresses.is_empty() {
            return Ok(Vec::new());
        }

        let topics = lifecycle_topics();
        let batch_size = self.settings.max_addresses_per_query.max(1);
        let mut logs = Vec::new();
        for batch in addresses.chunks(batch_size) {
            let mut batch_logs = self
                .source
                .get_logs(&LogQuery {
                    addresses: batch.to_vec(),
                    event_topics: topics.clone(),
                    from_block,
                    to_block,
                })
                .await?;
            logs.append(&mut batch_logs);
        }
        logs.sort_by_key(RawLog::position);
        Ok(logs)
    }
}
