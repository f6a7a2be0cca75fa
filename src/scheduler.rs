//! Background polling service.
//!
//! Runs `SyncEngine::sync_once` every poll interval on a single task, so at
//! most one cycle is ever in flight. Cycle errors are logged and the loop
//! keeps going with exponential backoff. `stop()` wakes the loop from its
//! sleep but never interrupts a running cycle.

use crate::block_sync::SyncEngine;
use crate::model::BountyIndex;
use crate::snapshot::SnapshotHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Cap on the backoff multiplier after consecutive failures (2^5)
const MAX_BACKOFF_SHIFT: u32 = 5;

pub struct IndexerService {
    engine: Arc<SyncEngine>,
    poll_interval: Duration,
    running: Arc<RwLock<bool>>,
    shutdown: Arc<Notify>,
    task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl IndexerService {
    pub fn new(engine: Arc<SyncEngine>, poll_interval: Duration) -> Self {
        Self {
            engine,
            poll_interval,
            running: Arc::new(RwLock::new(false)),
            shutdown: Arc::new(Notify::new()),
            task: parking_lot::Mutex::new(None),
        }
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    pub fn handle(&self) -> SnapshotHandle {
        self.engine.handle().clone()
    }

    /// Resident snapshot, `None` before the first load
    pub fn current_snapshot(&self) -> Option<Arc<BountyIndex>> {
        self.engine.handle().current()
    }

    /// Start the polling loop. A second call while running is a no-op.
    pub async fn start(&self) {
        {
            let mut running = self.running.write().await;
            if *running {
                return;
            }
            *running = true;
        }

        let engine = self.engine.clone();
        let running = self.running.clone();
        let shutdown = self.shutdown.clone();
        let poll_interval = self.poll_interval;

        let task = tokio::spawn(async move {
            let mut consecutive_failures = 0u32;

            loop {
                if !*running.read().await {
                    break;
                }

                match engine.sync_once().await {
                    Ok(_) => consecutive_failures = 0,
                    Err(e) => {
                        consecutive_failures += 1;
                        warn!(
                            "Sync cycle failed: {} (attempt {})",
                            e, consecutive_failures
                        );
                        if consecutive_failures == 10 {
                            error!("Sync has failed {} times in a row", consecutive_failures);
                        }
                    }
                }

                let sleep_duration = if consecutive_failures > 0 {
                    poll_interval * (1 << consecutive_failures.min(MAX_BACKOFF_SHIFT))
                } else {
                    poll_interval
                };

                tokio::select! {
                    _ = tokio::time::sleep(sleep_duration) => {}
                    _ = shutdown.notified() => {}
                }
            }

            info!("Indexer polling stopped");
        });

        *self.task.lock() = Some(task);
        info!(
            "Indexer polling started (every {}s)",
            self.poll_interval.as_secs()
        );
    }

    /// Stop polling and wait for any in-flight cycle to finish
    pub async fn stop(&self) {
        *self.running.write().await = false;
        self.shutdown.notify_one();

        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("Indexer task ended abnormally: {}", e);
            }
        }
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_sync::SyncSettings;
    use crate::chain::source::InMemoryLogSource;
    use crate::storage::MemoryStore;

    fn service(source: Arc<InMemoryLogSource>, store: Arc<MemoryStore>) -> IndexerService {
        let settings = SyncSettings {
            chain_id: 1,
            factory_address: "0x00000000000000000000000000000000000000f1".to_string(),
            start_block: 1,
            chunk_size: 100,
            ..Default::default()
        };
        let engine = SyncEngine::new(settings, source, store, SnapshotHandle::new()).unwrap();
        IndexerService::new(Arc::new(engine), Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_start_syncs_and_stop_is_clean() {
        let source = Arc::new(InMemoryLogSource::new(50));
        let store = Arc::new(MemoryStore::new());
        let service = service(source, store.clone());

        assert!(service.current_snapshot().is_none());
        service.start().await;
        assert!(service.is_running().await);

        for _ in 0..100 {
            if service.handle().last_block() == Some(50) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        service.stop().await;

        assert!(!service.is_running().await);
        assert_eq!(service.current_snapshot().unwrap().last_block, 50);
        assert_eq!(store.stored().unwrap().last_block, 50);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_loop() {
        let source = Arc::new(InMemoryLogSource::new(50));
        source.fail_nth_call(1);
        let store = Arc::new(MemoryStore::new());
        let service = service(source, store);

        service.start().await;
        for _ in 0..200 {
            if service.handle().last_block() == Some(50) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        service.stop().await;

        // first cycle failed, a later one caught up
        assert_eq!(service.handle().last_block(), Some(50));
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let service = service(Arc::new(InMemoryLogSource::new(0)), Arc::new(MemoryStore::new()));
        service.stop().await;
        assert!(!service.is_running().await);
    }
}
