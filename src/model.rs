//! Derived State Data Model
//!
//! Entities mirrored from the chain: bounties, challenges (with their
//! submissions and winners) and registered agents, all held in one
//! `BountyIndex` snapshot checkpointed by a single `last_block`.
//!
//! Records are created by their first on-chain event and only mutated by
//! later events for the same address. Nothing is ever deleted.

use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Snapshot format version for compatibility checks on load
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Basis-point denominator for payout shares
pub const BPS_DENOMINATOR: u64 = 10_000;

// ============================================================================
// STATUS ENUMS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Open,
    Scoring,
    Finalized,
    Cancelled,
    Expired,
}

impl ChallengeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeStatus::Open => "open",
            ChallengeStatus::Scoring => "scoring",
            ChallengeStatus::Finalized => "finalized",
            ChallengeStatus::Cancelled => "cancelled",
            ChallengeStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChallengeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(ChallengeStatus::Open),
            "scoring" => Ok(ChallengeStatus::Scoring),
            "finalized" => Ok(ChallengeStatus::Finalized),
            "cancelled" | "canceled" => Ok(ChallengeStatus::Cancelled),
            "expired" => Ok(ChallengeStatus::Expired),
            other => Err(format!("unknown challenge status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BountyStatus {
    Open,
    Claimed,
    Submitted,
    Approved,
    Expired,
    Cancelled,
}

impl BountyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BountyStatus::Open => "open",
            BountyStatus::Claimed => "claimed",
            BountyStatus::Submitted => "submitted",
            BountyStatus::Approved => "approved",
            BountyStatus::Expired => "expired",
            BountyStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BountyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BountyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(BountyStatus::Open),
            "claimed" => Ok(BountyStatus::Claimed),
            "submitted" => Ok(BountyStatus::Submitted),
            "approved" => Ok(BountyStatus::Approved),
            "expired" => Ok(BountyStatus::Expired),
            "cancelled" | "canceled" => Ok(BountyStatus::Cancelled),
            other => Err(format!("unknown bounty status: {}", other)),
        }
    }
}

// ============================================================================
// RECORDS
// ============================================================================

/// One submitter's slot in a challenge. Resubmission overwrites in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub submitter: String,
    pub agent_id: String,
    #[serde(rename = "solutionURI")]
    pub solution_uri: String,
    pub solution_hash: String,
    pub submitted_at: u64,
    /// Starts at 1, +1 per resubmission
    pub version: u32,
    #[serde(default, with = "crate::util::decimal::option")]
    pub score: Option<U256>,
    #[serde(default)]
    pub rank: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerRecord {
    pub address: String,
    pub agent_id: String,
    /// 1-based, dense
    pub rank: u32,
    #[serde(with = "crate::util::decimal")]
    pub score: U256,
    #[serde(with = "crate::util::decimal")]
    pub prize_amount: U256,
    /// false -> true only
    pub claimed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRecord {
    pub challenge_address: String,
    pub poster: String,
    pub evaluator: String,
    pub token: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(with = "crate::util::decimal")]
    pub prize_pool: U256,
    pub winner_count: u32,
    pub payout_bps: Vec<u32>,
    /// 0 means unlimited
    #[serde(default)]
    pub max_participants: u32,
    pub deadline: u64,
    pub scoring_deadline: u64,
    #[serde(default)]
    pub score_posted_at: Option<u64>,
    pub status: ChallengeStatus,
    /// Keyed by lowercased submitter address
    #[serde(default)]
    pub submissions: BTreeMap<String, SubmissionRecord>,
    #[serde(default)]
    pub winners: Vec<WinnerRecord>,
    /// Unique submitters; always equals `submissions.len()`
    pub submission_count: u32,
    pub created_block: u64,
    #[serde(default)]
    pub created_tx_hash: Option<String>,
    pub updated_block: u64,
    #[serde(default)]
    pub updated_log_index: u64,
}

impl ChallengeRecord {
    /// Prize for a 1-based rank: `prize_pool * payout_bps[rank-1] / 10000`, truncating
    pub fn prize_for_rank(&self, rank: u32) -> U256 {
        prize_for_rank(self.prize_pool, &self.payout_bps, rank)
    }

    /// Case-insensitive substring match against any skill tag
    pub fn matches_skill(&self, needle: &str) -> bool {
        matches_any_skill(&self.skills, needle)
    }

    pub fn winner_for(&self, address: &str) -> Option<&WinnerRecord> {
        self.winners.iter().find(|w| w.address == address)
    }

    pub fn has_scores(&self) -> bool {
        self.submissions.values().any(|s| s.score.is_some())
    }

    pub fn is_full(&self) -> bool {
        self.max_participants != 0 && self.submission_count >= self.max_participants
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BountyRecord {
    pub bounty_address: String,
    pub poster: String,
    pub token: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(with = "crate::util::decimal")]
    pub reward: U256,
    pub deadline: u64,
    pub status: BountyStatus,
    #[serde(default)]
    pub claimer: Option<String>,
    #[serde(default)]
    pub claimer_agent_id: Option<String>,
    #[serde(default, rename = "submissionURI")]
    pub submission_uri: Option<String>,
    #[serde(default, with = "crate::util::decimal::option")]
    pub payout: Option<U256>,
    pub created_block: u64,
    #[serde(default)]
    pub created_tx_hash: Option<String>,
    pub updated_block: u64,
    #[serde(default)]
    pub updated_log_index: u64,
}

impl BountyRecord {
    pub fn matches_skill(&self, needle: &str) -> bool {
        matches_any_skill(&self.skills, needle)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub agent_id: String,
    pub owner: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub description: String,
    pub registered_block: u64,
    #[serde(default)]
    pub registered_tx_hash: Option<String>,
}

// ============================================================================
// ROOT SNAPSHOT
// ============================================================================

/// The root snapshot. `last_block` is the only checkpoint and only increases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BountyIndex {
    pub schema_version: u32,
    pub last_block: u64,
    pub chain_id: u64,
    pub factory_address: String,
    #[serde(default)]
    pub identity_registry: Option<String>,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub bounties: BTreeMap<String, BountyRecord>,
    #[serde(default)]
    pub challenges: BTreeMap<String, ChallengeRecord>,
    /// Keyed by decimal agent id
    #[serde(default)]
    pub agents: BTreeMap<String, AgentRecord>,
}

impl BountyIndex {
    /// Fresh index whose first processed block will be `start_block`.
    /// Block 0 is never scanned; genesis emits no logs.
    pub fn new(
        chain_id: u64,
        factory_address: &str,
        identity_registry: Option<&str>,
        start_block: u64,
    ) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            last_block: start_block.saturating_sub(1),
            chain_id,
            factory_address: crate::util::normalize_address(factory_address),
            identity_registry: identity_registry.map(crate::util::normalize_address),
            saved_at: None,
            bounties: BTreeMap::new(),
            challenges: BTreeMap::new(),
            agents: BTreeMap::new(),
        }
    }

    /// Move the checkpoint forward. Never moves it backwards.
    pub fn advance_checkpoint(&mut self, block: u64) {
        if block > self.last_block {
            self.last_block = block;
        }
    }

    /// Every child contract discovered so far (bounties then challenges)
    pub fn tracked_addresses(&self) -> Vec<String> {
        self.bounties
            .keys()
            .chain(self.challenges.keys())
            .cloned()
            .collect()
    }

    pub fn is_tracked(&self, key: &str) -> bool {
        self.bounties.contains_key(key) || self.challenges.contains_key(key)
    }

    /// True when this snapshot was built for the given chain and factory
    pub fn matches_deployment(&self, chain_id: u64, factory_address: &str) -> bool {
        self.schema_version == SNAPSHOT_SCHEMA_VERSION
            && self.chain_id == chain_id
            && self.factory_address == crate::util::normalize_address(factory_address)
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Integer-exact basis-point share of a pool. Missing shares pay zero.
pub fn prize_for_rank(pool: U256, payout_bps: &[u32], rank: u32) -> U256 {
    let Some(bps) = rank
        .checked_sub(1)
        .and_then(|idx| payout_bps.get(idx as usize))
    else {
        return U256::ZERO;
    };
    let bps = U256::from(*bps);
    let denominator = U256::from(BPS_DENOMINATOR);
    match pool.checked_mul(bps) {
        Some(product) => product / denominator,
        // pool * bps overflowed 256 bits; divide first and accept the truncation
        None => pool / denominator * bps,
    }
}

fn matches_any_skill(skills: &[String], needle: &str) -> bool {
    let needle = needle.to_lowercase();
    skills.iter().any(|s| s.to_lowercase().contains(&needle))
}
