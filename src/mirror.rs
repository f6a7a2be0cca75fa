//! Remote mirror adapter.
//!
//! Serves the `ChallengeQueries` surface from a shared indexing service
//! over HTTP instead of the in-process snapshot. The service's JSON is
//! loosely typed (big integers as strings or numbers, submissions as a list
//! or an address-keyed map, a separate `effectiveStatus`), so responses go
//! through tolerant DTOs before becoming the same record types the local
//! index produces.
//!
//! Transport failures never reach query callers: they are logged and the
//! query yields an empty or `None` result.

use crate::error::{IndexerError, Result};
use crate::model::{
    AgentRecord, BountyRecord, BountyStatus, ChallengeRecord, ChallengeStatus, SubmissionRecord,
    WinnerRecord,
};
use crate::query::{
    normalize_agent_id, order_leaderboard, AgentChallengeEntry, BountyFilter, ChallengeFilter,
    ChallengeQueries, ChallengeRef, IndexStatus, DEFAULT_LIMIT,
};
use crate::util::decimal::NumberOrString;
use crate::util::normalize_address;
use alloy::primitives::U256;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

// ============================================================================
// TX STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Indexed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxStatusResponse {
    #[serde(default, alias = "hash")]
    pub tx_hash: String,
    pub status: TxStatus,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub block_number: Option<u64>,
}

// ============================================================================
// WIRE DTOS
// ============================================================================

mod lenient {
    use crate::util::decimal::NumberOrString;
    use serde::{Deserialize, Deserializer};

    pub fn opt_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        Option::<NumberOrString>::deserialize(deserializer)?
            .map(|raw| raw.to_u64())
            .transpose()
            .map_err(serde::de::Error::custom)
    }
}

fn num_u256(raw: &Option<NumberOrString>, field: &str) -> std::result::Result<U256, String> {
    match raw {
        Some(v) => v.to_u256().map_err(|e| format!("{}: {}", field, e)),
        None => Ok(U256::ZERO),
    }
}

fn num_u64(raw: &Option<NumberOrString>, field: &str) -> std::result::Result<u64, String> {
    match raw {
        Some(v) => v.to_u64().map_err(|e| format!("{}: {}", field, e)),
        None => Ok(0),
    }
}

fn num_u32(raw: &Option<NumberOrString>, field: &str) -> std::result::Result<u32, String> {
    let value = num_u64(raw, field)?;
    u32::try_from(value).map_err(|_| format!("{}: {} does not fit in u32", field, value))
}

fn opt_num_u256(
    raw: &Option<NumberOrString>,
    field: &str,
) -> std::result::Result<Option<U256>, String> {
    raw.as_ref()
        .map(|v| v.to_u256().map_err(|e| format!("{}: {}", field, e)))
        .transpose()
}

fn id_string(raw: &Option<NumberOrString>) -> String {
    match raw {
        Some(NumberOrString::Number(n)) => n.to_string(),
        Some(NumberOrString::String(s)) => normalize_agent_id(s),
        None => String::new(),
    }
}

/// A list that may arrive bare or wrapped in an envelope object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListDto<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(
            alias = "items",
            alias = "challenges",
            alias = "bounties",
            alias = "leaderboard",
            alias = "entries"
        )]
        data: Vec<T>,
    },
}

impl<T> ListDto<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            ListDto::Bare(items) => items,
            ListDto::Wrapped { data } => data,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmissionDto {
    #[serde(default, alias = "address")]
    submitter: String,
    #[serde(default)]
    agent_id: Option<NumberOrString>,
    #[serde(default, alias = "solutionURI", alias = "solutionUri")]
    solution_uri: String,
    #[serde(default)]
    solution_hash: String,
    #[serde(default)]
    submitted_at: Option<NumberOrString>,
    #[serde(default)]
    version: Option<NumberOrString>,
    #[serde(default)]
    score: Option<NumberOrString>,
    #[serde(default)]
    rank: Option<NumberOrString>,
}

impl SubmissionDto {
    fn into_record(self, fallback_submitter: Option<&str>) -> std::result::Result<SubmissionRecord, String> {
        let submitter = if self.submitter.is_empty() {
            fallback_submitter.unwrap_or_default().to_string()
        } else {
            self.submitter
        };
        let rank = match &self.rank {
            Some(_) => Some(num_u32(&self.rank, "rank")?),
            None => None,
        };
        Ok(SubmissionRecord {
            submitter: normalize_address(&submitter),
            agent_id: id_string(&self.agent_id),
            solution_uri: self.solution_uri,
            solution_hash: self.solution_hash,
            submitted_at: num_u64(&self.submitted_at, "submittedAt")?,
            version: num_u32(&self.version, "version")?.max(1),
            score: opt_num_u256(&self.score, "score")?,
            rank,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SubmissionsDto {
    List(Vec<SubmissionDto>),
    Map(BTreeMap<String, SubmissionDto>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WinnerDto {
    #[serde(default, alias = "winner")]
    address: String,
    #[serde(default)]
    agent_id: Option<NumberOrString>,
    #[serde(default)]
    rank: Option<NumberOrString>,
    #[serde(default)]
    score: Option<NumberOrString>,
    #[serde(default, alias = "prize")]
    prize_amount: Option<NumberOrString>,
    #[serde(default)]
    claimed: bool,
}

impl WinnerDto {
    fn into_record(self) -> std::result::Result<WinnerRecord, String> {
        Ok(WinnerRecord {
            address: normalize_address(&self.address),
            agent_id: id_string(&self.agent_id),
            rank: num_u32(&self.rank, "rank")?,
            score: num_u256(&self.score, "score")?,
            prize_amount: num_u256(&self.prize_amount, "prizeAmount")?,
            claimed: self.claimed,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChallengeDto {
    #[serde(alias = "address")]
    challenge_address: String,
    #[serde(default)]
    poster: String,
    #[serde(default)]
    evaluator: String,
    #[serde(default)]
    token: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    skills: Vec<String>,
    #[serde(default)]
    prize_pool: Option<NumberOrString>,
    #[serde(default)]
    winner_count: Option<NumberOrString>,
    #[serde(default)]
    payout_bps: Vec<NumberOrString>,
    #[serde(default)]
    max_participants: Option<NumberOrString>,
    #[serde(default)]
    deadline: Option<NumberOrString>,
    #[serde(default)]
    scoring_deadline: Option<NumberOrString>,
    #[serde(default)]
    score_posted_at: Option<NumberOrString>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    effective_status: Option<String>,
    #[serde(default)]
    submissions: Option<SubmissionsDto>,
    #[serde(default)]
    winners: Vec<WinnerDto>,
    #[serde(default)]
    submission_count: Option<NumberOrString>,
    #[serde(default)]
    created_block: Option<NumberOrString>,
    #[serde(default)]
    created_tx_hash: Option<String>,
    #[serde(default)]
    updated_block: Option<NumberOrString>,
}

/// Local status for a remote record. An externally computed
/// `effectiveStatus` of expired wins over the stored status.
fn challenge_status(status: &str, effective: Option<&str>) -> ChallengeStatus {
    if effective.is_some_and(|e| e.eq_ignore_ascii_case("expired")) {
        return ChallengeStatus::Expired;
    }
    status.parse().unwrap_or(ChallengeStatus::Open)
}

fn bounty_status(status: &str, effective: Option<&str>) -> BountyStatus {
    if effective.is_some_and(|e| e.eq_ignore_ascii_case("expired")) {
        return BountyStatus::Expired;
    }
    status.parse().unwrap_or(BountyStatus::Open)
}

impl ChallengeDto {
    fn into_record(self) -> std::result::Result<ChallengeRecord, String> {
        let mut submissions = BTreeMap::new();
        match self.submissions {
            Some(SubmissionsDto::List(list)) => {
                for dto in list {
                    let record = dto.into_record(None)?;
                    submissions.insert(record.submitter.clone(), record);
                }
            }
            Some(SubmissionsDto::Map(map)) => {
                for (key, dto) in map {
                    let record = dto.into_record(Some(&key))?;
                    submissions.insert(record.submitter.clone(), record);
                }
            }
            None => {}
        }

        let submission_count = if submissions.is_empty() {
            num_u32(&self.submission_count, "submissionCount")?
        } else {
            submissions.len() as u32
        };

        let payout_bps = self
            .payout_bps
            .iter()
            .map(|b| num_u32(&Some(b.clone()), "payoutBps"))
            .collect::<std::result::Result<Vec<u32>, String>>()?;

        let mut winners = self
            .winners
            .into_iter()
            .map(WinnerDto::into_record)
            .collect::<std::result::Result<Vec<WinnerRecord>, String>>()?;
        winners.sort_by_key(|w| w.rank);

        let score_posted_at = match &self.score_posted_at {
            Some(_) => Some(num_u64(&self.score_posted_at, "scorePostedAt")?),
            None => None,
        };

        Ok(ChallengeRecord {
            challenge_address: normalize_address(&self.challenge_address),
            poster: normalize_address(&self.poster),
            evaluator: normalize_address(&self.evaluator),
            token: normalize_address(&self.token),
            title: self.title,
            description: self.description,
            skills: self.skills,
            prize_pool: num_u256(&self.prize_pool, "prizePool")?,
            winner_count: num_u32(&self.winner_count, "winnerCount")?,
            payout_bps,
            max_participants: num_u32(&self.max_participants, "maxParticipants")?,
            deadline: num_u64(&self.deadline, "deadline")?,
            scoring_deadline: num_u64(&self.scoring_deadline, "scoringDeadline")?,
            score_posted_at,
            status: challenge_status(&self.status, self.effective_status.as_deref()),
            submissions,
            winners,
            submission_count,
            created_block: num_u64(&self.created_block, "createdBlock")?,
            created_tx_hash: self.created_tx_hash,
            updated_block: num_u64(&self.updated_block, "updatedBlock")?,
            updated_log_index: 0,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BountyDto {
    #[serde(alias = "address")]
    bounty_address: String,
    #[serde(default)]
    poster: String,
    #[serde(default)]
    token: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    skills: Vec<String>,
    #[serde(default)]
    reward: Option<NumberOrString>,
    #[serde(default)]
    deadline: Option<NumberOrString>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    effective_status: Option<String>,
    #[serde(default)]
    claimer: Option<String>,
    #[serde(default)]
    claimer_agent_id: Option<NumberOrString>,
    #[serde(default, alias = "submissionURI", alias = "submissionUri")]
    submission_uri: Option<String>,
    #[serde(default)]
    payout: Option<NumberOrString>,
    #[serde(default)]
    created_block: Option<NumberOrString>,
    #[serde(default)]
    created_tx_hash: Option<String>,
    #[serde(default)]
    updated_block: Option<NumberOrString>,
}

impl BountyDto {
    fn into_record(self) -> std::result::Result<BountyRecord, String> {
        Ok(BountyRecord {
            bounty_address: normalize_address(&self.bounty_address),
            poster: normalize_address(&self.poster),
            token: normalize_address(&self.token),
            title: self.title,
            description: self.description,
            skills: self.skills,
            reward: num_u256(&self.reward, "reward")?,
            deadline: num_u64(&self.deadline, "deadline")?,
            status: bounty_status(&self.status, self.effective_status.as_deref()),
            claimer: self.claimer.as_deref().map(normalize_address),
            claimer_agent_id: self.claimer_agent_id.as_ref().map(|id| id_string(&Some(id.clone()))),
            submission_uri: self.submission_uri,
            payout: opt_num_u256(&self.payout, "payout")?,
            created_block: num_u64(&self.created_block, "createdBlock")?,
            created_tx_hash: self.created_tx_hash,
            updated_block: num_u64(&self.updated_block, "updatedBlock")?,
            updated_log_index: 0,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentDto {
    agent_id: NumberOrString,
    #[serde(default)]
    owner: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    skills: Vec<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    registered_block: Option<NumberOrString>,
    #[serde(default)]
    registered_tx_hash: Option<String>,
}

impl AgentDto {
    fn into_record(self) -> std::result::Result<AgentRecord, String> {
        Ok(AgentRecord {
            agent_id: id_string(&Some(self.agent_id)),
            owner: normalize_address(&self.owner),
            name: self.name,
            skills: self.skills,
            description: self.description,
            registered_block: num_u64(&self.registered_block, "registeredBlock")?,
            registered_tx_hash: self.registered_tx_hash,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryEntryDto {
    challenge: ChallengeDto,
    submission: SubmissionDto,
    #[serde(default)]
    winner: Option<WinnerDto>,
}

impl HistoryEntryDto {
    fn into_entry(self) -> std::result::Result<AgentChallengeEntry, String> {
        let challenge = self.challenge.into_record()?;
        Ok(AgentChallengeEntry {
            challenge: ChallengeRef::from(&challenge),
            submission: self.submission.into_record(None)?,
            winner: self.winner.map(WinnerDto::into_record).transpose()?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusDto {
    #[serde(default, alias = "lastIndexedBlock")]
    last_block: Option<NumberOrString>,
    #[serde(default)]
    chain_id: Option<NumberOrString>,
    #[serde(default)]
    factory_address: String,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    bounties: usize,
    #[serde(default)]
    challenges: usize,
    #[serde(default)]
    agents: usize,
}

/// Convert a list, dropping (and logging) entries that fail to convert
fn convert_all<D, T>(
    items: Vec<D>,
    what: &str,
    convert: impl Fn(D) -> std::result::Result<T, String>,
) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| match convert(item) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Dropping malformed {} from mirror: {}", what, e);
                None
            }
        })
        .collect()
}

// ============================================================================
// CLIENT
// ============================================================================

pub struct MirrorClient {
    base_url: String,
    client: reqwest::Client,
    backoff_initial: Duration,
    backoff_max: Duration,
}

impl MirrorClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(10))
    }

    pub fn with_timeout(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| IndexerError::Http(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            backoff_initial: Duration::from_secs(1),
            backoff_max: Duration::from_secs(8),
        })
    }

    /// Delays between `await_indexed` polls: `initial`, doubling up to `max`
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.backoff_initial = initial;
        self.backoff_max = max.max(initial);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET a JSON document. 404 is `Ok(None)`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Mirror GET {}", url);

        let response = self.client.get(&url).query(query).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(IndexerError::Http(format!(
                "GET {} returned {}",
                path,
                response.status()
            )));
        }
        let body = response.json::<T>().await?;
        Ok(Some(body))
    }

    /// Fetch a list endpoint; failures and 404 become an empty list
    async fn get_list<D: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Vec<D> {
        match self.get_json::<ListDto<D>>(path, query).await {
            Ok(Some(list)) => list.into_vec(),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Mirror request {} failed: {}", path, e);
                Vec::new()
            }
        }
    }

    /// Fetch a single-entity endpoint; failures and 404 become `None`
    async fn get_one<D: DeserializeOwned>(&self, path: &str) -> Option<D> {
        match self.get_json::<D>(path, &[]).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Mirror request {} failed: {}", path, e);
                None
            }
        }
    }

    /// Indexing status of one transaction. 404 means not seen yet.
    pub async fn tx_status(&self, tx_hash: &str) -> Result<TxStatusResponse> {
        let hash = tx_hash.trim().to_lowercase();
        let found = self
            .get_json::<TxStatusResponse>(&format!("/v1/tx/{}", hash), &[])
            .await?;
        let mut status = found.unwrap_or(TxStatusResponse {
            tx_hash: hash.clone(),
            status: TxStatus::Pending,
            block_number: None,
        });
        if status.tx_hash.is_empty() {
            status.tx_hash = hash;
        }
        Ok(status)
    }

    /// Poll until the mirror reports `tx_hash` indexed, backing off
    /// exponentially between polls. `None` once `max_wait` elapses.
    pub async fn await_indexed(&self, tx_hash: &str, max_wait: Duration) -> Option<TxStatusResponse> {
        let deadline = Instant::now() + max_wait;
        let mut delay = self.backoff_initial;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, self.tx_status(tx_hash)).await {
                Ok(Ok(status)) if status.status == TxStatus::Indexed => {
                    debug!("{} indexed after {} poll(s)", tx_hash, attempt);
                    return Some(status);
                }
                Ok(Ok(_)) => debug!("{} still pending (poll {})", tx_hash, attempt),
                Ok(Err(e)) => warn!("Tx status poll {} for {} failed: {}", attempt, tx_hash, e),
                Err(_) => {}
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!("Gave up waiting for {} after {:?}", tx_hash, max_wait);
                return None;
            }
            tokio::time::sleep(delay.min(remaining)).await;
            delay = (delay * 2).min(self.backoff_max);
        }
    }
}

#[async_trait]
impl ChallengeQueries for MirrorClient {
    async fn list_open_challenges(&self, filter: &ChallengeFilter) -> Vec<ChallengeRecord> {
        let limit = filter.limit.unwrap_or(DEFAULT_LIMIT);
        let mut query = Vec::new();
        // the endpoint pages on skill alone; any other predicate needs the
        // full list or rows it rejects would use up the page
        if !filter.has_local_predicates() {
            query.push(("limit", limit.to_string()));
        }
        if let Some(skill) = &filter.skill {
            query.push(("skill", skill.clone()));
        }
        if let Some(status) = filter.status {
            query.push(("status", status.to_string()));
        }

        let dtos: Vec<ChallengeDto> = self.get_list("/v1/challenges/open", &query).await;
        let mut records = convert_all(dtos, "challenge", ChallengeDto::into_record);
        // re-apply locally so results match the in-process backend
        records.retain(|c| filter.matches(c));
        records.sort_by_key(|c| c.deadline);
        records.truncate(limit);
        records
    }

    async fn get_challenge_by_address(&self, address: &str) -> Option<ChallengeRecord> {
        let path = format!("/v1/challenges/{}", normalize_address(address));
        let dto: ChallengeDto = self.get_one(&path).await?;
        dto.into_record()
            .map_err(|e| warn!("Dropping malformed challenge from mirror: {}", e))
            .ok()
    }

    async fn get_challenges_by_poster(&self, poster: &str) -> Vec<ChallengeRecord> {
        let poster = normalize_address(poster);
        let dtos: Vec<ChallengeDto> = self
            .get_list("/v1/challenges", &[("poster", poster.clone())])
            .await;
        let mut records = convert_all(dtos, "challenge", ChallengeDto::into_record);
        records.retain(|c| c.poster == poster);
        records
    }

    async fn get_challenge_leaderboard(
        &self,
        address: &str,
        limit: Option<usize>,
    ) -> Vec<SubmissionRecord> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        let path = format!("/v1/challenges/{}/leaderboard", normalize_address(address));
        let dtos: Vec<SubmissionDto> = self.get_list(&path, &[("limit", limit.to_string())]).await;
        let mut records = convert_all(dtos, "submission", |d| d.into_record(None));
        order_leaderboard(&mut records);
        records.truncate(limit);
        records
    }

    async fn get_agent_challenge_history(&self, agent_id: &str) -> Vec<AgentChallengeEntry> {
        let path = format!("/v1/agents/{}/challenges", normalize_agent_id(agent_id));
        let dtos: Vec<HistoryEntryDto> = self.get_list(&path, &[]).await;
        convert_all(dtos, "history entry", HistoryEntryDto::into_entry)
    }

    async fn list_open_bounties(&self, filter: &BountyFilter) -> Vec<BountyRecord> {
        let limit = filter.limit.unwrap_or(DEFAULT_LIMIT);
        let mut query = Vec::new();
        if !filter.has_local_predicates() {
            query.push(("limit", limit.to_string()));
        }
        if let Some(skill) = &filter.skill {
            query.push(("skill", skill.clone()));
        }
        if let Some(status) = filter.status {
            query.push(("status", status.to_string()));
        }

        let dtos: Vec<BountyDto> = self.get_list("/v1/bounties/open", &query).await;
        let mut records = convert_all(dtos, "bounty", BountyDto::into_record);
        records.retain(|b| filter.matches(b));
        records.sort_by_key(|b| b.deadline);
        records.truncate(limit);
        records
    }

    async fn get_bounty_by_address(&self, address: &str) -> Option<BountyRecord> {
        let path = format!("/v1/bounties/{}", normalize_address(address));
        let dto: BountyDto = self.get_one(&path).await?;
        dto.into_record()
            .map_err(|e| warn!("Dropping malformed bounty from mirror: {}", e))
            .ok()
    }

    async fn get_agent(&self, agent_id: &str) -> Option<AgentRecord> {
        let path = format!("/v1/agents/{}", normalize_agent_id(agent_id));
        let dto: AgentDto = self.get_one(&path).await?;
        dto.into_record()
            .map_err(|e| warn!("Dropping malformed agent from mirror: {}", e))
            .ok()
    }

    async fn index_status(&self) -> Option<IndexStatus> {
        let dto: StatusDto = self.get_one("/v1/status").await?;
        Some(IndexStatus {
            last_block: num_u64(&dto.last_block, "lastBlock").ok()?,
            chain_id: num_u64(&dto.chain_id, "chainId").ok()?,
            factory_address: dto.factory_address,
            saved_at: dto.saved_at,
            bounties: dto.bounties,
            challenges: dto.challenges,
            agents: dto.agents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_status_overrides() {
        assert_eq!(challenge_status("open", Some("expired")), ChallengeStatus::Expired);
        assert_eq!(challenge_status("scoring", Some("scoring")), ChallengeStatus::Scoring);
        assert_eq!(challenge_status("finalized", None), ChallengeStatus::Finalized);
        assert_eq!(bounty_status("claimed", Some("EXPIRED")), BountyStatus::Expired);
    }

    #[test]
    fn test_challenge_dto_string_numbers_and_map_submissions() {
        let json = r#"{
            "address": "0xC1",
            "poster": "0xA1",
            "prizePool": "1000000000000000000000000",
            "winnerCount": "3",
            "payoutBps": ["6000", 2500, "1500"],
            "deadline": 1700000000,
            "status": "open",
            "effectiveStatus": "expired",
            "submissions": {
                "0xA2": {"agentId": "7", "solutionURI": "ipfs://x", "version": "2", "score": "9500"}
            }
        }"#;
        let dto: ChallengeDto = serde_json::from_str(json).unwrap();
        let record = dto.into_record().unwrap();

        assert_eq!(record.challenge_address, "0xc1");
        assert_eq!(record.status, ChallengeStatus::Expired);
        assert_eq!(record.payout_bps, vec![6000, 2500, 1500]);
        assert_eq!(
            record.prize_pool,
            U256::from(10u64).pow(U256::from(24u64))
        );
        let sub = &record.submissions["0xa2"];
        assert_eq!(sub.submitter, "0xa2");
        assert_eq!(sub.agent_id, "7");
        assert_eq!(sub.version, 2);
        assert_eq!(sub.score, Some(U256::from(9500u64)));
        assert_eq!(record.submission_count, 1);
    }

    #[test]
    fn test_bad_number_is_conversion_error() {
        let json = r#"{"address": "0xc1", "prizePool": "lots"}"#;
        let dto: ChallengeDto = serde_json::from_str(json).unwrap();
        assert!(dto.into_record().is_err());
    }

    #[test]
    fn test_list_envelope_forms() {
        let bare: ListDto<u32> = serde_json::from_str("[1, 2]").unwrap();
        assert_eq!(bare.into_vec(), vec![1, 2]);
        let wrapped: ListDto<u32> = serde_json::from_str(r#"{"challenges": [3]}"#).unwrap();
        assert_eq!(wrapped.into_vec(), vec![3]);
    }

    #[test]
    fn test_base_url_trimmed() {
        let client = MirrorClient::new("http://mirror.local/").unwrap();
        assert_eq!(client.base_url(), "http://mirror.local");
    }
}
