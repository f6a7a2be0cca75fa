//! Challenge Indexer
//!
//! Event-sourced read path for a permissionless marketplace of on-chain
//! bounties and challenges. Factory, child-contract and identity-registry
//! logs are folded into a derived snapshot that answers the questions the
//! chain cannot answer directly (open challenges by deadline, leaderboards,
//! per-agent history).
//!
//! ## Module Structure
//!
//! - `model`: Derived state entities and the root `BountyIndex` snapshot
//! - `snapshot`: Resident snapshot handle (atomic swap of immutable snapshots)
//! - `storage`: Snapshot persistence (JSON file, in-memory)
//! - `chain`: Event ABI, log source collaborator, state-transition fold
//! - `block_sync`: Chunked log-scanning sync engine
//! - `scheduler`: Background polling service with clean stop
//! - `query`: Read-only projections and the `ChallengeQueries` surface
//! - `mirror`: Remote mirror adapter over the shared indexing service
//! - `server`: REST front end over either backend

/// Shared utility functions
pub mod util;

/// Error types
pub mod error;

/// Configuration
pub mod config;

/// Derived state data model
pub mod model;

/// Resident snapshot handle
pub mod snapshot;

/// Snapshot persistence
pub mod storage;

/// Chain integration (events, log source, fold)
pub mod chain;

/// Sync engine
pub mod block_sync;

/// Polling scheduler
pub mod scheduler;

/// Query layer
pub mod query;

/// Remote mirror adapter
pub mod mirror;

/// REST API
pub mod server;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use block_sync::{SyncEngine, SyncReport, SyncSettings};
pub use chain::events::LifecycleEvent;
pub use chain::source::{InMemoryLogSource, LogQuery, LogSource, RawLog, RpcLogSource};
pub use config::{IndexerConfig, QueryBackend};
pub use error::{IndexerError, Result};
pub use mirror::{MirrorClient, TxStatus, TxStatusResponse};
pub use model::{
    AgentRecord, BountyIndex, BountyRecord, BountyStatus, ChallengeRecord, ChallengeStatus,
    SubmissionRecord, WinnerRecord,
};
pub use query::{
    AgentChallengeEntry, AgentChallengeStats, BountyFilter, ChallengeFilter, ChallengeQueries,
    IndexStatus, LocalQueries,
};
pub use scheduler::IndexerService;
pub use snapshot::SnapshotHandle;
pub use storage::{JsonFileStore, MemoryStore, SnapshotStore};
