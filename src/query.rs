//! Query layer.
//!
//! Read-only projections over a `BountyIndex`. The free functions are pure
//! and work on any snapshot; `LocalQueries` runs them against the resident
//! snapshot, and `ChallengeQueries` is the surface shared with the remote
//! mirror. Nothing here errors on missing data: unknown entities give
//! `None` and an absent snapshot gives empty results.

use crate::model::{
    AgentRecord, BountyIndex, BountyRecord, BountyStatus, ChallengeRecord, ChallengeStatus,
    SubmissionRecord, WinnerRecord,
};
use crate::snapshot::SnapshotHandle;
use crate::util::{decimal, normalize_address, parse_u256};
use alloy::primitives::U256;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default page size for list queries
pub const DEFAULT_LIMIT: usize = 20;

// ============================================================================
// FILTERS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeFilter {
    /// Defaults to `open`
    #[serde(default)]
    pub status: Option<ChallengeStatus>,
    /// Case-insensitive substring of any one skill tag
    #[serde(default)]
    pub skill: Option<String>,
    #[serde(default, with = "decimal::option")]
    pub min_prize: Option<U256>,
    #[serde(default, with = "decimal::option")]
    pub max_prize: Option<U256>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl ChallengeFilter {
    /// True when a predicate the mirror's `open` endpoint cannot evaluate
    /// is set, so a page cut by the server may miss matching rows
    pub(crate) fn has_local_predicates(&self) -> bool {
        self.min_prize.is_some()
            || self.max_prize.is_some()
            || self.status.map_or(false, |s| s != ChallengeStatus::Open)
    }

    pub(crate) fn matches(&self, challenge: &ChallengeRecord) -> bool {
        challenge.status == self.status.unwrap_or(ChallengeStatus::Open)
            && self
                .skill
                .as_deref()
                .map_or(true, |skill| challenge.matches_skill(skill))
            && self.min_prize.map_or(true, |min| challenge.prize_pool >= min)
            && self.max_prize.map_or(true, |max| challenge.prize_pool <= max)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BountyFilter {
    /// Defaults to `open`
    #[serde(default)]
    pub status: Option<BountyStatus>,
    #[serde(default)]
    pub skill: Option<String>,
    #[serde(default, with = "decimal::option")]
    pub min_reward: Option<U256>,
    #[serde(default, with = "decimal::option")]
    pub max_reward: Option<U256>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl BountyFilter {
    pub(crate) fn has_local_predicates(&self) -> bool {
        self.min_reward.is_some()
            || self.max_reward.is_some()
            || self.status.map_or(false, |s| s != BountyStatus::Open)
    }

    pub(crate) fn matches(&self, bounty: &BountyRecord) -> bool {
        bounty.status == self.status.unwrap_or(BountyStatus::Open)
            && self
                .skill
                .as_deref()
                .map_or(true, |skill| bounty.matches_skill(skill))
            && self.min_reward.map_or(true, |min| bounty.reward >= min)
            && self.max_reward.map_or(true, |max| bounty.reward <= max)
    }
}

// ============================================================================
// RESULT SHAPES
// ============================================================================

/// Challenge fields carried by a history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRef {
    pub challenge_address: String,
    pub title: String,
    pub status: ChallengeStatus,
    #[serde(with = "decimal")]
    pub prize_pool: U256,
    pub deadline: u64,
    pub winner_count: u32,
    pub submission_count: u32,
}

impl From<&ChallengeRecord> for ChallengeRef {
    fn from(c: &ChallengeRecord) -> Self {
        Self {
            challenge_address: c.challenge_address.clone(),
            title: c.title.clone(),
            status: c.status,
            prize_pool: c.prize_pool,
            deadline: c.deadline,
            winner_count: c.winner_count,
            submission_count: c.submission_count,
        }
    }
}

/// One challenge an agent competed in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentChallengeEntry {
    pub challenge: ChallengeRef,
    pub submission: SubmissionRecord,
    /// `None` when the agent competed but did not place
    pub winner: Option<WinnerRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentChallengeStats {
    pub agent_id: String,
    pub entered: u32,
    pub won: u32,
    #[serde(with = "decimal")]
    pub total_prize_earned: U256,
    /// 0 when no rank was observed
    pub best_rank: u32,
    /// 0.0 when no rank was observed
    pub avg_rank: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatus {
    pub last_block: u64,
    pub chain_id: u64,
    pub factory_address: String,
    pub saved_at: Option<DateTime<Utc>>,
    pub bounties: usize,
    pub challenges: usize,
    pub agents: usize,
}

// ============================================================================
// PROJECTIONS
// ============================================================================

/// Canonical decimal form of an agent id; non-numeric ids pass through trimmed
pub fn normalize_agent_id(agent_id: &str) -> String {
    let trimmed = agent_id.trim();
    match parse_u256(trimmed) {
        Ok(id) => id.to_string(),
        Err(_) => trimmed.to_string(),
    }
}

pub fn list_open_challenges(index: &BountyIndex, filter: &ChallengeFilter) -> Vec<ChallengeRecord> {
    let mut matched: Vec<&ChallengeRecord> = index
        .challenges
        .values()
        .filter(|c| filter.matches(c))
        .collect();
    matched.sort_by_key(|c| c.deadline);
    matched
        .into_iter()
        .take(filter.limit.unwrap_or(DEFAULT_LIMIT))
        .cloned()
        .collect()
}

pub fn get_challenge_by_address(index: &BountyIndex, address: &str) -> Option<ChallengeRecord> {
    index.challenges.get(&normalize_address(address)).cloned()
}

pub fn get_challenges_by_poster(index: &BountyIndex, poster: &str) -> Vec<ChallengeRecord> {
    let poster = normalize_address(poster);
    index
        .challenges
        .values()
        .filter(|c| c.poster == poster)
        .cloned()
        .collect()
}

/// Scored challenges rank by score; unscored ones by resubmission count
pub fn get_challenge_leaderboard(
    index: &BountyIndex,
    address: &str,
    limit: Option<usize>,
) -> Vec<SubmissionRecord> {
    let Some(challenge) = index.challenges.get(&normalize_address(address)) else {
        return Vec::new();
    };
    let mut entries: Vec<SubmissionRecord> = challenge.submissions.values().cloned().collect();
    order_leaderboard(&mut entries);
    entries.truncate(limit.unwrap_or(DEFAULT_LIMIT));
    entries
}

/// Score descending once any submission is scored, otherwise version
/// descending. Stable, so ties keep their incoming order.
pub fn order_leaderboard(entries: &mut [SubmissionRecord]) {
    if entries.iter().any(|s| s.score.is_some()) {
        entries.sort_by(|a, b| b.score.unwrap_or_default().cmp(&a.score.unwrap_or_default()));
    } else {
        entries.sort_by(|a, b| b.version.cmp(&a.version));
    }
}

pub fn get_agent_challenge_history(index: &BountyIndex, agent_id: &str) -> Vec<AgentChallengeEntry> {
    let agent_id = normalize_agent_id(agent_id);
    let mut entries: Vec<(u64, AgentChallengeEntry)> = Vec::new();

    for challenge in index.challenges.values() {
        let Some(submission) = challenge
            .submissions
            .values()
            .find(|s| s.agent_id == agent_id)
        else {
            continue;
        };
        entries.push((
            challenge.created_block,
            AgentChallengeEntry {
                challenge: ChallengeRef::from(challenge),
                submission: submission.clone(),
                winner: challenge.winner_for(&submission.submitter).cloned(),
            },
        ));
    }

    entries.sort_by_key(|(block, _)| *block);
    entries.into_iter().map(|(_, entry)| entry).collect()
}

/// Aggregate a history. Each challenge contributes at most one rank: the
/// winner rank when placed, else the submission rank when scored.
pub fn compute_agent_stats(agent_id: &str, history: &[AgentChallengeEntry]) -> AgentChallengeStats {
    let mut stats = AgentChallengeStats {
        agent_id: normalize_agent_id(agent_id),
        entered: history.len() as u32,
        ..Default::default()
    };

    let mut ranks: Vec<u32> = Vec::new();
    for entry in history {
        if let Some(winner) = &entry.winner {
            stats.won += 1;
            stats.total_prize_earned = stats.total_prize_earned.saturating_add(winner.prize_amount);
        }
        let rank = entry
            .winner
            .as_ref()
            .map(|w| w.rank)
            .or(entry.submission.rank);
        if let Some(rank) = rank {
            ranks.push(rank);
        }
    }

    if !ranks.is_empty() {
        stats.best_rank = ranks.iter().copied().min().unwrap_or(0);
        stats.avg_rank = ranks.iter().map(|r| *r as f64).sum::<f64>() / ranks.len() as f64;
    }
    stats
}

pub fn list_open_bounties(index: &BountyIndex, filter: &BountyFilter) -> Vec<BountyRecord> {
    let mut matched: Vec<&BountyRecord> = index
        .bounties
        .values()
        .filter(|b| filter.matches(b))
        .collect();
    matched.sort_by_key(|b| b.deadline);
    matched
        .into_iter()
        .take(filter.limit.unwrap_or(DEFAULT_LIMIT))
        .cloned()
        .collect()
}

pub fn get_bounty_by_address(index: &BountyIndex, address: &str) -> Option<BountyRecord> {
    index.bounties.get(&normalize_address(address)).cloned()
}

pub fn get_agent(index: &BountyIndex, agent_id: &str) -> Option<AgentRecord> {
    index.agents.get(&normalize_agent_id(agent_id)).cloned()
}

pub fn index_status(index: &BountyIndex) -> IndexStatus {
    IndexStatus {
        last_block: index.last_block,
        chain_id: index.chain_id,
        factory_address: index.factory_address.clone(),
        saved_at: index.saved_at,
        bounties: index.bounties.len(),
        challenges: index.challenges.len(),
        agents: index.agents.len(),
    }
}

// ============================================================================
// QUERY SURFACE
// ============================================================================

/// Query surface served by the local index or the remote mirror
#[async_trait]
pub trait ChallengeQueries: Send + Sync {
    async fn list_open_challenges(&self, filter: &ChallengeFilter) -> Vec<ChallengeRecord>;

    async fn get_challenge_by_address(&self, address: &str) -> Option<ChallengeRecord>;

    async fn get_challenges_by_poster(&self, poster: &str) -> Vec<ChallengeRecord>;

    async fn get_challenge_leaderboard(
        &self,
        address: &str,
        limit: Option<usize>,
    ) -> Vec<SubmissionRecord>;

    async fn get_agent_challenge_history(&self, agent_id: &str) -> Vec<AgentChallengeEntry>;

    async fn get_agent_challenge_stats(&self, agent_id: &str) -> AgentChallengeStats {
        let history = self.get_agent_challenge_history(agent_id).await;
        compute_agent_stats(agent_id, &history)
    }

    async fn list_open_bounties(&self, filter: &BountyFilter) -> Vec<BountyRecord>;

    async fn get_bounty_by_address(&self, address: &str) -> Option<BountyRecord>;

    async fn get_agent(&self, agent_id: &str) -> Option<AgentRecord>;

    /// `None` when no snapshot is available
    async fn index_status(&self) -> Option<IndexStatus>;
}

/// Queries against the in-process resident snapshot
#[derive(Clone)]
pub struct LocalQueries {
    handle: SnapshotHandle,
}

impl LocalQueries {
    pub fn new(handle: SnapshotHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl ChallengeQueries for LocalQueries {
    async fn list_open_challenges(&self, filter: &ChallengeFilter) -> Vec<ChallengeRecord> {
        self.handle
            .current()
            .map(|s| list_open_challenges(&s, filter))
            .unwrap_or_default()
    }

    async fn get_challenge_by_address(&self, address: &str) -> Option<ChallengeRecord> {
        self.handle
            .current()
            .and_then(|s| get_challenge_by_address(&s, address))
    }

    async fn get_challenges_by_poster(&self, poster: &str) -> Vec<ChallengeRecord> {
        self.handle
            .current()
            .map(|s| get_challenges_by_poster(&s, poster))
            .unwrap_or_default()
    }

    async fn get_challenge_leaderboard(
        &self,
        address: &str,
        limit: Option<usize>,
    ) -> Vec<SubmissionRecord> {
        self.handle
            .current()
            .map(|s| get_challenge_leaderboard(&s, address, limit))
            .unwrap_or_default()
    }

    async fn get_agent_challenge_history(&self, agent_id: &str) -> Vec<AgentChallengeEntry> {
        self.handle
            .current()
            .map(|s| get_agent_challenge_history(&s, agent_id))
            .unwrap_or_default()
    }

    async fn list_open_bounties(&self, filter: &BountyFilter) -> Vec<BountyRecord> {
        self.handle
            .current()
            .map(|s| list_open_bounties(&s, filter))
            .unwrap_or_default()
    }

    async fn get_bounty_by_address(&self, address: &str) -> Option<BountyRecord> {
        self.handle
            .current()
            .and_then(|s| get_bounty_by_address(&s, address))
    }

    async fn get_agent(&self, agent_id: &str) -> Option<AgentRecord> {
        self.handle.current().and_then(|s| get_agent(&s, agent_id))
    }

    async fn index_status(&self) -> Option<IndexStatus> {
        self.handle.current().map(|s| index_status(&s))
    }
}
