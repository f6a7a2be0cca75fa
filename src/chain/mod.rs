//! Chain integration.
//!
//! - `events`: contract event ABI and decoding into typed events
//! - `source`: the narrow log-source collaborator (RPC and in-memory)
//! - `fold`: pure state transitions applying decoded events to records

pub mod events;
pub mod fold;
pub mod source;

pub use events::{CreationEvent, LifecycleEvent, RegistryEvent};
pub use fold::{apply_creation, apply_lifecycle, apply_registry, FoldOutcome};
pub use source::{InMemoryLogSource, LogQuery, LogSource, RawLog, RpcLogSource};
