//! Snapshot persistence.
//!
//! The whole `BountyIndex` is saved after every chunk. `JsonFileStore`
//! writes to a temp file in the target directory and renames it over the
//! old snapshot, so a crash mid-write leaves the previous snapshot intact.

use crate::error::{IndexerError, Result};
use crate::model::BountyIndex;
use parking_lot::Mutex;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{debug, info};

/// Durable storage for the derived snapshot
pub trait SnapshotStore: Send + Sync {
    /// Last persisted snapshot, `None` if nothing was ever saved
    fn load(&self) -> Result<Option<BountyIndex>>;

    /// Persist a snapshot, replacing the previous one
    fn save(&self, index: &BountyIndex) -> Result<()>;
}

// ============================================================================
// JSON FILE STORE
// ============================================================================

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> Result<Option<BountyIndex>> {
        if !self.path.exists() {
            debug!("No snapshot at {:?}", self.path);
            return Ok(None);
        }

        let file = std::fs::File::open(&self.path)?;
        let index: BountyIndex = serde_json::from_reader(BufReader::new(file))?;

        info!(
            "Loaded snapshot from {:?}: last_block={}, bounties={}, challenges={}, agents={}",
            self.path,
            index.last_block,
            index.bounties.len(),
            index.challenges.len(),
            index.agents.len()
        );
        Ok(Some(index))
    }

    fn save(&self, index: &BountyIndex) -> Result<()> {
        let dir = self.parent_dir();
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, index)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| IndexerError::Storage(format!("Failed to persist snapshot: {}", e)))?;

        debug!(
            "Saved snapshot to {:?} at block {}",
            self.path, index.last_block
        );
        Ok(())
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// Volatile store for tests and dry runs. Saves can be made to fail.
#[derive(Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<BountyIndex>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(index: BountyIndex) -> Self {
        let store = Self::new();
        *store.snapshot.lock() = Some(index);
        store
    }

    /// Make every subsequent `save` fail until reset
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Option<BountyIndex> {
        self.snapshot.lock().clone()
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<Option<BountyIndex>> {
        Ok(self.snapshot.lock().clone())
    }

    fn save(&self, index: &BountyIndex) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(IndexerError::Storage("simulated write failure".to_string()));
        }
        *self.snapshot.lock() = Some(index.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
