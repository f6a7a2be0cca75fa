//! Contract event ABI and typed decoding.
//!
//! Raw logs are classified by topic0 into three families (factory
//! creation, child-contract lifecycle, identity registry) and decoded into
//! owned Rust enums. A topic0 that matches no known signature decodes to
//! `None`; a known topic0 whose payload fails ABI validation is an error.

use super::source::RawLog;
use crate::error::{IndexerError, Result};
use alloy::primitives::{Address, B256, U256};
use alloy::sol;
use alloy::sol_types::SolEvent;

sol! {
    interface IBountyFactory {
        event BountyCreated(
            address indexed bounty,
            address indexed poster,
            address token,
            string title,
            string description,
            uint256 reward,
            uint256 deadline,
            string[] skills
        );

        event ChallengeCreated(
            address indexed challenge,
            address indexed poster,
            address indexed evaluator,
            address token,
            string title,
            string description,
            uint256 prizePool,
            uint256 deadline,
            uint256 scoringDeadline,
            uint256 winnerCount,
            uint256[] payoutBps,
            uint256 maxParticipants,
            string[] skills
        );
    }

    interface IBounty {
        event BountyClaimed(address indexed claimer, uint256 indexed agentId);
        event WorkSubmitted(address indexed claimer, string submissionURI);
        event BountyApproved(address indexed claimer, uint256 payout);
        event BountyExpired();
        event BountyCancelled();
    }

    interface IChallenge {
        event SolutionSubmitted(
            address indexed submitter,
            uint256 indexed agentId,
            string solutionURI,
            bytes32 solutionHash,
            uint256 submittedAt
        );
        event ScoresPosted(address[] submitters, uint256[] scores, uint256 postedAt);
        event ChallengeFinalized(address[] winners, uint256[] scores);
        event PrizeClaimed(address indexed winner, uint256 amount);
        event ChallengeCancelled();
        event ChallengeExpired();
    }

    interface IIdentityRegistry {
        event AgentRegistered(
            uint256 indexed agentId,
            address indexed owner,
            string name,
            string[] skills,
            string description
        );
    }
}

// ============================================================================
// TYPED EVENTS
// ============================================================================

/// Factory events that create a new tracked child contract
#[derive(Debug, Clone, PartialEq)]
pub enum CreationEvent {
    Bounty {
        bounty: Address,
        poster: Address,
        token: Address,
        title: String,
        description: String,
        reward: U256,
        deadline: U256,
        skills: Vec<String>,
    },
    Challenge {
        challenge: Address,
        poster: Address,
        evaluator: Address,
        token: Address,
        title: String,
        description: String,
        prize_pool: U256,
        deadline: U256,
        scoring_deadline: U256,
        winner_count: U256,
        payout_bps: Vec<U256>,
        max_participants: U256,
        skills: Vec<String>,
    },
}

/// Child-contract lifecycle events, folded into the emitting record
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    BountyClaimed {
        claimer: Address,
        agent_id: U256,
    },
    WorkSubmitted {
        claimer: Address,
        submission_uri: String,
    },
    BountyApproved {
        claimer: Address,
        payout: U256,
    },
    BountyExpired,
    BountyCancelled,
    SolutionSubmitted {
        submitter: Address,
        agent_id: U256,
        solution_uri: String,
        solution_hash: B256,
        submitted_at: U256,
    },
    ScoresPosted {
        submitters: Vec<Address>,
        scores: Vec<U256>,
        posted_at: U256,
    },
    ChallengeFinalized {
        winners: Vec<Address>,
        scores: Vec<U256>,
    },
    PrizeClaimed {
        winner: Address,
        amount: U256,
    },
    ChallengeCancelled,
    ChallengeExpired,
}

impl LifecycleEvent {
    /// Event name as emitted on chain
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::BountyClaimed { .. } => "BountyClaimed",
            LifecycleEvent::WorkSubmitted { .. } => "WorkSubmitted",
            LifecycleEvent::BountyApproved { .. } => "BountyApproved",
            LifecycleEvent::BountyExpired => "BountyExpired",
            LifecycleEvent::BountyCancelled => "BountyCancelled",
            LifecycleEvent::SolutionSubmitted { .. } => "SolutionSubmitted",
            LifecycleEvent::ScoresPosted { .. } => "ScoresPosted",
            LifecycleEvent::ChallengeFinalized { .. } => "ChallengeFinalized",
            LifecycleEvent::PrizeClaimed { .. } => "PrizeClaimed",
            LifecycleEvent::ChallengeCancelled => "ChallengeCancelled",
            LifecycleEvent::ChallengeExpired => "ChallengeExpired",
        }
    }
}

/// Identity registry events
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    AgentRegistered {
        agent_id: U256,
        owner: Address,
        name: String,
        skills: Vec<String>,
        description: String,
    },
}

// ============================================================================
// TOPIC SETS
// ============================================================================

pub fn creation_topics() -> Vec<B256> {
    vec![
        IBountyFactory::BountyCreated::SIGNATURE_HASH,
        IBountyFactory::ChallengeCreated::SIGNATURE_HASH,
    ]
}

pub fn lifecycle_topics() -> Vec<B256> {
    vec![
        IBounty::BountyClaimed::SIGNATURE_HASH,
        IBounty::WorkSubmitted::SIGNATURE_HASH,
        IBounty::BountyApproved::SIGNATURE_HASH,
        IBounty::BountyExpired::SIGNATURE_HASH,
        IBounty::BountyCancelled::SIGNATURE_HASH,
        IChallenge::SolutionSubmitted::SIGNATURE_HASH,
        IChallenge::ScoresPosted::SIGNATURE_HASH,
        IChallenge::ChallengeFinalized::SIGNATURE_HASH,
        IChallenge::PrizeClaimed::SIGNATURE_HASH,
        IChallenge::ChallengeCancelled::SIGNATURE_HASH,
        IChallenge::ChallengeExpired::SIGNATURE_HASH,
    ]
}

pub fn registry_topics() -> Vec<B256> {
    vec![IIdentityRegistry::AgentRegistered::SIGNATURE_HASH]
}

// ============================================================================
// DECODING
// ============================================================================

fn decode<E: SolEvent>(log: &RawLog) -> Result<E> {
    E::decode_raw_log(log.topics.iter().copied(), &log.data, true).map_err(|e| {
        IndexerError::Decode(format!(
            "{} at block {} log {}: {}",
            E::SIGNATURE,
            log.block_number,
            log.log_index,
            e
        ))
    })
}

pub fn decode_creation(log: &RawLog) -> Result<Option<CreationEvent>> {
    let Some(topic0) = log.topic0() else {
        return Ok(None);
    };

    let event = if topic0 == IBountyFactory::BountyCreated::SIGNATURE_HASH {
        let e = decode::<IBountyFactory::BountyCreated>(log)?;
        CreationEvent::Bounty {
            bounty: e.bounty,
            poster: e.poster,
            token: e.token,
            title: e.title,
            description: e.description,
            reward: e.reward,
            deadline: e.deadline,
            skills: e.skills,
        }
    } else if topic0 == IBountyFactory::ChallengeCreated::SIGNATURE_HASH {
        let e = decode::<IBountyFactory::ChallengeCreated>(log)?;
        CreationEvent::Challenge {
            challenge: e.challenge,
            poster: e.poster,
            evaluator: e.evaluator,
            token: e.token,
            title: e.title,
            description: e.description,
            prize_pool: e.prizePool,
            deadline: e.deadline,
            scoring_deadline: e.scoringDeadline,
            winner_count: e.winnerCount,
            payout_bps: e.payoutBps,
            max_participants: e.maxParticipants,
            skills: e.skills,
        }
    } else {
        return Ok(None);
    };

    Ok(Some(event))
}

pub fn decode_lifecycle(log: &RawLog) -> Result<Option<LifecycleEvent>> {
    let Some(topic0) = log.topic0() else {
        return Ok(None);
    };

    let event = if topic0 == IBounty::BountyClaimed::SIGNATURE_HASH {
        let e = decode::<IBounty::BountyClaimed>(log)?;
        LifecycleEvent::BountyClaimed {
            claimer: e.claimer,
            agent_id: e.agentId,
        }
    } else if topic0 == IBounty::WorkSubmitted::SIGNATURE_HASH {
        let e = decode::<IBounty::WorkSubmitted>(log)?;
        LifecycleEvent::WorkSubmitted {
            claimer: e.claimer,
            submission_uri: e.submissionURI,
        }
    } else if topic0 == IBounty::BountyApproved::SIGNATURE_HASH {
        let e = decode::<IBounty::BountyApproved>(log)?;
        LifecycleEvent::BountyApproved {
            claimer: e.claimer,
            payout: e.payout,
        }
    } else if topic0 == IBounty::BountyExpired::SIGNATURE_HASH {
        decode::<IBounty::BountyExpired>(log)?;
        LifecycleEvent::BountyExpired
    } else if topic0 == IBounty::BountyCancelled::SIGNATURE_HASH {
        decode::<IBounty::BountyCancelled>(log)?;
        LifecycleEvent::BountyCancelled
    } else if topic0 == IChallenge::SolutionSubmitted::SIGNATURE_HASH {
        let e = decode::<IChallenge::SolutionSubmitted>(log)?;
        LifecycleEvent::SolutionSubmitted {
            submitter: e.submitter,
            agent_id: e.agentId,
            solution_uri: e.solutionURI,
            solution_hash: e.solutionHash,
            submitted_at: e.submittedAt,
        }
    } else if topic0 == IChallenge::ScoresPosted::SIGNATURE_HASH {
        let e = decode::<IChallenge::ScoresPosted>(log)?;
        LifecycleEvent::ScoresPosted {
            submitters: e.submitters,
            scores: e.scores,
            posted_at: e.postedAt,
        }
    } else if topic0 == IChallenge::ChallengeFinalized::SIGNATURE_HASH {
        let e = decode::<IChallenge::ChallengeFinalized>(log)?;
        LifecycleEvent::ChallengeFinalized {
            winners: e.winners,
            scores: e.scores,
        }
    } else if topic0 == IChallenge::PrizeClaimed::SIGNATURE_HASH {
        let e = decode::<IChallenge::PrizeClaimed>(log)?;
        LifecycleEvent::PrizeClaimed {
            winner: e.winner,
            amount: e.amount,
        }
    } else if topic0 == IChallenge::ChallengeCancelled::SIGNATURE_HASH {
        decode::<IChallenge::ChallengeCancelled>(log)?;
        LifecycleEvent::ChallengeCancelled
    } else if topic0 == IChallenge::ChallengeExpired::SIGNATURE_HASH {
        decode::<IChallenge::ChallengeExpired>(log)?;
        LifecycleEvent::ChallengeExpired
    } else {
        return Ok(None);
    };

    Ok(Some(event))
}

pub fn decode_registry(log: &RawLog) -> Result<Option<RegistryEvent>> {
    match log.topic0() {
        Some(topic0) if topic0 == IIdentityRegistry::AgentRegistered::SIGNATURE_HASH => {
            let e = decode::<IIdentityRegistry::AgentRegistered>(log)?;
            Ok(Some(RegistryEvent::AgentRegistered {
                agent_id: e.agentId,
                owner: e.owner,
                name: e.name,
                skills: e.skills,
                description: e.description,
            }))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    fn raw(event: &impl SolEvent, emitter: Address) -> RawLog {
        RawLog::from_event(emitter, event, 10, 0)
    }

    #[test]
    fn test_topic_sets_are_distinct() {
        let mut all = creation_topics();
        all.extend(lifecycle_topics());
        all.extend(registry_topics());
        let unique: std::collections::HashSet<_> = all.iter().collect();
        assert_eq!(unique.len(), all.len());
    }

    #[test]
    fn test_decode_solution_submitted() {
        let challenge = address!("00000000000000000000000000000000000000c1");
        let submitter = address!("00000000000000000000000000000000000000a1");
        let event = IChallenge::SolutionSubmitted {
            submitter,
            agentId: U256::from(42u64),
            solutionURI: "ipfs://solution".to_string(),
            solutionHash: B256::repeat_byte(0xab),
            submittedAt: U256::from(1_700_000_000u64),
        };

        let decoded = decode_lifecycle(&raw(&event, challenge)).unwrap().unwrap();
        match decoded {
            LifecycleEvent::SolutionSubmitted {
                submitter: s,
                agent_id,
                solution_uri,
                ..
            } => {
                assert_eq!(s, submitter);
                assert_eq!(agent_id, U256::from(42u64));
                assert_eq!(solution_uri, "ipfs://solution");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_topic_is_none() {
        let log = RawLog {
            address: Address::ZERO,
            topics: vec![B256::repeat_byte(0x11)],
            data: Default::default(),
            block_number: 1,
            log_index: 0,
            transaction_hash: None,
        };
        assert!(decode_lifecycle(&log).unwrap().is_none());
        assert!(decode_creation(&log).unwrap().is_none());
        assert!(decode_registry(&log).unwrap().is_none());
    }

    #[test]
    fn test_decode_truncated_payload_is_error() {
        let event = IChallenge::PrizeClaimed {
            winner: Address::ZERO,
            amount: U256::from(5u64),
        };
        let mut log = raw(&event, Address::ZERO);
        log.data = Default::default();
        assert!(matches!(
            decode_lifecycle(&log),
            Err(IndexerError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_agent_registered() {
        let event = IIdentityRegistry::AgentRegistered {
            agentId: U256::from(7u64),
            owner: address!("00000000000000000000000000000000000000a7"),
            name: "solver".to_string(),
            skills: vec!["Solidity".to_string()],
            description: "audits".to_string(),
        };
        let decoded = decode_registry(&raw(&event, Address::ZERO)).unwrap().unwrap();
        let RegistryEvent::AgentRegistered { agent_id, skills, .. } = decoded;
        assert_eq!(agent_id, U256::from(7u64));
        assert_eq!(skills, vec!["Solidity".to_string()]);
    }
}
