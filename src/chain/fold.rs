//! State transitions.
//!
//! Each decoded event is folded into the record it targets. Folds validate
//! the whole event before touching the record, so a malformed event leaves
//! the record exactly as it was.
//!
//! Every record remembers the (block, log index) of the last event applied
//! to it. Events at or before that position are replays and are ignored,
//! which keeps re-processing an already folded block range a no-op.

use super::events::{CreationEvent, LifecycleEvent, RegistryEvent};
use super::source::RawLog;
use crate::error::{IndexerError, Result};
use crate::model::{
    AgentRecord, BountyIndex, BountyRecord, BountyStatus, ChallengeRecord, ChallengeStatus,
    SubmissionRecord, WinnerRecord, BPS_DENOMINATOR,
};
use crate::util::address_key;
use alloy::primitives::{Address, U256};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOutcome {
    /// Record created or mutated
    Applied,
    /// Record already exists or event already folded
    Duplicate,
    /// Emitter is not a contract this index discovered
    Untracked,
}

fn malformed(log: &RawLog, msg: impl Into<String>) -> IndexerError {
    IndexerError::MalformedEvent(format!(
        "{} (block {}, log {})",
        msg.into(),
        log.block_number,
        log.log_index
    ))
}

fn to_u64(value: U256, field: &str, log: &RawLog) -> Result<u64> {
    u64::try_from(value).map_err(|_| malformed(log, format!("{} out of range: {}", field, value)))
}

fn to_u32(value: U256, field: &str, log: &RawLog) -> Result<u32> {
    u32::try_from(value).map_err(|_| malformed(log, format!("{} out of range: {}", field, value)))
}

fn tx_hash(log: &RawLog) -> Option<String> {
    log.transaction_hash.map(|h| h.to_string())
}

fn is_replay(log: &RawLog, updated_block: u64, updated_log_index: u64) -> bool {
    log.position() <= (updated_block, updated_log_index)
}

// ============================================================================
// CREATION
// ============================================================================

/// Insert a new bounty or challenge. Existing addresses are left untouched.
pub fn apply_creation(
    index: &mut BountyIndex,
    event: CreationEvent,
    log: &RawLog,
) -> Result<FoldOutcome> {
    match event {
        CreationEvent::Bounty {
            bounty,
            poster,
            token,
            title,
            description,
            reward,
            deadline,
            skills,
        } => {
            let key = address_key(&bounty);
            if index.bounties.contains_key(&key) {
                return Ok(FoldOutcome::Duplicate);
            }
            let deadline = to_u64(deadline, "deadline", log)?;
            index.bounties.insert(
                key.clone(),
                BountyRecord {
                    bounty_address: key,
                    poster: address_key(&poster),
                    token: address_key(&token),
                    title,
                    description,
                    skills,
                    reward,
                    deadline,
                    status: BountyStatus::Open,
                    claimer: None,
                    claimer_agent_id: None,
                    submission_uri: None,
                    payout: None,
                    created_block: log.block_number,
                    created_tx_hash: tx_hash(log),
                    updated_block: log.block_number,
                    updated_log_index: log.log_index,
                },
            );
            Ok(FoldOutcome::Applied)
        }
        CreationEvent::Challenge {
            challenge,
            poster,
            evaluator,
            token,
            title,
            description,
            prize_pool,
            deadline,
            scoring_deadline,
            winner_count,
            payout_bps,
            max_participants,
            skills,
        } => {
            let key = address_key(&challenge);
            if index.challenges.contains_key(&key) {
                return Ok(FoldOutcome::Duplicate);
            }

            let payout_bps = payout_bps
                .into_iter()
                .map(|bps| to_u32(bps, "payoutBps", log))
                .collect::<Result<Vec<u32>>>()?;
            let bps_total: u64 = payout_bps.iter().map(|b| *b as u64).sum();
            if bps_total > BPS_DENOMINATOR {
                return Err(malformed(
                    log,
                    format!("payoutBps sum {} exceeds {}", bps_total, BPS_DENOMINATOR),
                ));
            }

            let record = ChallengeRecord {
                challenge_address: key.clone(),
                poster: address_key(&poster),
                evaluator: address_key(&evaluator),
                token: address_key(&token),
                title,
                description,
                skills,
                prize_pool,
                winner_count: to_u32(winner_count, "winnerCount", log)?,
                payout_bps,
                max_participants: to_u32(max_participants, "maxParticipants", log)?,
                deadline: to_u64(deadline, "deadline", log)?,
                scoring_deadline: to_u64(scoring_deadline, "scoringDeadline", log)?,
                score_posted_at: None,
                status: ChallengeStatus::Open,
                submissions: BTreeMap::new(),
                winners: Vec::new(),
                submission_count: 0,
                created_block: log.block_number,
                created_tx_hash: tx_hash(log),
                updated_block: log.block_number,
                updated_log_index: log.log_index,
            };
            index.challenges.insert(key, record);
            Ok(FoldOutcome::Applied)
        }
    }
}

// ============================================================================
// LIFECYCLE
// ============================================================================

/// Route a lifecycle event to the bounty or challenge at the emitting address
pub fn apply_lifecycle(
    index: &mut BountyIndex,
    event: &LifecycleEvent,
    log: &RawLog,
) -> Result<FoldOutcome> {
    let key = address_key(&log.address);

    if let Some(bounty) = index.bounties.get_mut(&key) {
        return fold_bounty(bounty, event, log);
    }
    if let Some(challenge) = index.challenges.get_mut(&key) {
        return fold_challenge(challenge, event, log);
    }

    debug!("Ignoring {} from untracked address {}", event.name(), key);
    Ok(FoldOutcome::Untracked)
}

pub fn fold_bounty(
    record: &mut BountyRecord,
    event: &LifecycleEvent,
    log: &RawLog,
) -> Result<FoldOutcome> {
    if is_replay(log, record.updated_block, record.updated_log_index) {
        return Ok(FoldOutcome::Duplicate);
    }

    match event {
        LifecycleEvent::BountyClaimed { claimer, agent_id } => {
            record.status = BountyStatus::Claimed;
            record.claimer = Some(address_key(claimer));
            record.claimer_agent_id = Some(agent_id.to_string());
        }
        LifecycleEvent::WorkSubmitted {
            claimer,
            submission_uri,
        } => {
            record.status = BountyStatus::Submitted;
            record.claimer = Some(address_key(claimer));
            record.submission_uri = Some(submission_uri.clone());
        }
        LifecycleEvent::BountyApproved { claimer, payout } => {
            record.status = BountyStatus::Approved;
            record.claimer = Some(address_key(claimer));
            record.payout = Some(*payout);
        }
        LifecycleEvent::BountyExpired => record.status = BountyStatus::Expired,
        LifecycleEvent::BountyCancelled => record.status = BountyStatus::Cancelled,
        other => {
            return Err(malformed(
                log,
                format!("{} emitted by bounty {}", other.name(), record.bounty_address),
            ))
        }
    }

    record.updated_block = log.block_number;
    record.updated_log_index = log.log_index;
    Ok(FoldOutcome::Applied)
}

pub fn fold_challenge(
    record: &mut ChallengeRecord,
    event: &LifecycleEvent,
    log: &RawLog,
) -> Result<FoldOutcome> {
    if is_replay(log, record.updated_block, record.updated_log_index) {
        return Ok(FoldOutcome::Duplicate);
    }

    match event {
        LifecycleEvent::SolutionSubmitted {
            submitter,
            agent_id,
            solution_uri,
            solution_hash,
            submitted_at,
        } => {
            let submitted_at = to_u64(*submitted_at, "submittedAt", log)?;
            let key = address_key(submitter);

            match record.submissions.get_mut(&key) {
                Some(existing) => {
                    existing.version += 1;
                    existing.agent_id = agent_id.to_string();
                    existing.solution_uri = solution_uri.clone();
                    existing.solution_hash = solution_hash.to_string();
                    existing.submitted_at = submitted_at;
                }
                None => {
                    if record.is_full() {
                        return Err(malformed(
                            log,
                            format!(
                                "challenge {} already has {} of {} participants",
                                record.challenge_address,
                                record.submission_count,
                                record.max_participants
                            ),
                        ));
                    }
                    record.submissions.insert(
                        key.clone(),
                        SubmissionRecord {
                            submitter: key,
                            agent_id: agent_id.to_string(),
                            solution_uri: solution_uri.clone(),
                            solution_hash: solution_hash.to_string(),
                            submitted_at,
                            version: 1,
                            score: None,
                            rank: None,
                        },
                    );
                }
            }
            record.submission_count = record.submissions.len() as u32;
        }
        LifecycleEvent::ScoresPosted {
            submitters,
            scores,
            posted_at,
        } => {
            if submitters.len() != scores.len() {
                return Err(malformed(
                    log,
                    format!(
                        "ScoresPosted has {} submitters but {} scores",
                        submitters.len(),
                        scores.len()
                    ),
                ));
            }
            let posted_at = to_u64(*posted_at, "postedAt", log)?;

            for (submitter, score) in submitters.iter().zip(scores) {
                match record.submissions.get_mut(&address_key(submitter)) {
                    Some(submission) => submission.score = Some(*score),
                    None => debug!(
                        "Score for unknown submitter {} on {}",
                        submitter, record.challenge_address
                    ),
                }
            }
            record.score_posted_at = Some(posted_at);
            record.status = ChallengeStatus::Scoring;
            rerank(record, &[]);
        }
        LifecycleEvent::ChallengeFinalized { winners, scores } => {
            if winners.len() != scores.len() {
                return Err(malformed(
                    log,
                    format!(
                        "ChallengeFinalized has {} winners but {} scores",
                        winners.len(),
                        scores.len()
                    ),
                ));
            }
            if winners.len() > record.winner_count as usize {
                return Err(malformed(
                    log,
                    format!(
                        "{} winners exceed winnerCount {}",
                        winners.len(),
                        record.winner_count
                    ),
                ));
            }
            let unique: HashSet<&Address> = winners.iter().collect();
            if unique.len() != winners.len() {
                return Err(malformed(log, "duplicate winner address"));
            }

            let mut placed = Vec::with_capacity(winners.len());
            for (i, (winner, score)) in winners.iter().zip(scores).enumerate() {
                let rank = i as u32 + 1;
                let address = address_key(winner);
                let agent_id = record
                    .submissions
                    .get(&address)
                    .map(|s| s.agent_id.clone())
                    .unwrap_or_default();
                placed.push(WinnerRecord {
                    prize_amount: record.prize_for_rank(rank),
                    address,
                    agent_id,
                    rank,
                    score: *score,
                    claimed: false,
                });
            }

            let order: Vec<String> = placed.iter().map(|w| w.address.clone()).collect();
            record.winners = placed;
            record.status = ChallengeStatus::Finalized;
            rerank(record, &order);
        }
        LifecycleEvent::PrizeClaimed { winner, .. } => {
            let address = address_key(winner);
            match record.winners.iter_mut().find(|w| w.address == address) {
                Some(w) => w.claimed = true,
                None => {
                    return Err(malformed(
                        log,
                        format!(
                            "PrizeClaimed by non-winner {} on {}",
                            address, record.challenge_address
                        ),
                    ))
                }
            }
        }
        LifecycleEvent::ChallengeCancelled => record.status = ChallengeStatus::Cancelled,
        LifecycleEvent::ChallengeExpired => record.status = ChallengeStatus::Expired,
        other => {
            return Err(malformed(
                log,
                format!(
                    "{} emitted by challenge {}",
                    other.name(),
                    record.challenge_address
                ),
            ))
        }
    }

    record.updated_block = log.block_number;
    record.updated_log_index = log.log_index;
    Ok(FoldOutcome::Applied)
}

/// Assign dense 1-based submission ranks: `placed` addresses first in the
/// given order, then remaining scored submissions by score descending
/// (earlier submission, then address, break ties).
fn rerank(record: &mut ChallengeRecord, placed: &[String]) {
    let placed_set: HashSet<&String> = placed.iter().collect();

    let mut rest: Vec<(U256, u64, String)> = record
        .submissions
        .values()
        .filter(|s| !placed_set.contains(&s.submitter))
        .filter_map(|s| s.score.map(|score| (score, s.submitted_at, s.submitter.clone())))
        .collect();
    rest.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    for submission in record.submissions.values_mut() {
        submission.rank = None;
    }

    let ordered = placed
        .iter()
        .cloned()
        .chain(rest.into_iter().map(|(_, _, address)| address));
    for (i, address) in ordered.enumerate() {
        if let Some(submission) = record.submissions.get_mut(&address) {
            submission.rank = Some(i as u32 + 1);
        }
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

pub fn apply_registry(
    index: &mut BountyIndex,
    event: RegistryEvent,
    log: &RawLog,
) -> Result<FoldOutcome> {
    match event {
        RegistryEvent::AgentRegistered {
            agent_id,
            owner,
            name,
            skills,
            description,
        } => {
            let key = agent_id.to_string();
            if index.agents.contains_key(&key) {
                return Ok(FoldOutcome::Duplicate);
            }
            index.agents.insert(
                key.clone(),
                AgentRecord {
                    agent_id: key,
                    owner: address_key(&owner),
                    name,
                    skills,
                    description,
                    registered_block: log.block_number,
                    registered_tx_hash: tx_hash(log),
                },
            );
            Ok(FoldOutcome::Applied)
        }
    }
}
