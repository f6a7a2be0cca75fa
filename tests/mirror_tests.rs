//! Integration tests for the remote mirror adapter
//!
//! Uses httpmock to stand in for the shared indexing service.

use alloy::primitives::U256;
use challenge_indexer::{
    BountyFilter, BountyStatus, ChallengeFilter, ChallengeQueries, ChallengeStatus, MirrorClient,
    TxStatus,
};
use httpmock::prelude::*;
use serde_json::json;
use std::time::{Duration, Instant};

const CHALLENGE: &str = "0x00000000000000000000000000000000000000c1";
const TX: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";

fn client(server: &MockServer) -> MirrorClient {
    MirrorClient::with_timeout(&server.base_url(), Duration::from_secs(2))
        .unwrap()
        .with_backoff(Duration::from_millis(10), Duration::from_millis(40))
}

fn challenge_json(address: &str, status: &str, effective: Option<&str>, deadline: u64) -> serde_json::Value {
    with_prize(address, status, effective, deadline, "1000000000")
}

fn with_prize(
    address: &str,
    status: &str,
    effective: Option<&str>,
    deadline: u64,
    prize: &str,
) -> serde_json::Value {
    json!({
        "challengeAddress": address,
        "poster": "0x00000000000000000000000000000000000000D1",
        "title": "Gas golf",
        "skills": ["Solidity"],
        "prizePool": prize,
        "winnerCount": "3",
        "payoutBps": ["6000", "2500", "1500"],
        "maxParticipants": 0,
        "deadline": deadline.to_string(),
        "scoringDeadline": "0",
        "status": status,
        "effectiveStatus": effective,
        "submissions": [],
        "winners": [],
        "submissionCount": "4"
    })
}

#[tokio::test]
async fn test_open_challenges_parsed_and_expired_dropped() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/challenges/open")
                .query_param("skill", "solidity")
                .query_param("limit", "5");
            then.status(200).json_body(json!([
                challenge_json("0x00000000000000000000000000000000000000c2", "open", None, 300),
                challenge_json(CHALLENGE, "open", None, 100),
                challenge_json("0x00000000000000000000000000000000000000c3", "open", Some("expired"), 50),
            ]));
        })
        .await;

    let mirror = client(&server);
    let open = mirror
        .list_open_challenges(&ChallengeFilter {
            skill: Some("solidity".to_string()),
            limit: Some(5),
            ..Default::default()
        })
        .await;

    let addrs: Vec<&str> = open.iter().map(|c| c.challenge_address.as_str()).collect();
    assert_eq!(
        addrs,
        vec![CHALLENGE, "0x00000000000000000000000000000000000000c2"]
    );
    assert_eq!(open[0].prize_pool, U256::from(1_000_000_000u64));
    assert_eq!(open[0].payout_bps, vec![6000, 2500, 1500]);
    assert_eq!(open[0].submission_count, 4);
    assert_eq!(open[0].poster, "0x00000000000000000000000000000000000000d1");
}

#[tokio::test]
async fn test_prize_filter_fetches_unpaged_list() {
    let server = MockServer::start_async().await;
    // a mirror that only understands skill/limit: a page of one holds the
    // earliest deadline, which is below the prize floor
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/challenges/open")
                .query_param("limit", "1");
            then.status(200)
                .json_body(json!([with_prize(CHALLENGE, "open", None, 10, "100")]));
        })
        .await;
    let full = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/challenges/open")
                .matches(|req| {
                    !req.query_params
                        .as_ref()
                        .map_or(false, |q| q.iter().any(|(k, _)| k == "limit"))
                });
            then.status(200).json_body(json!([
                with_prize(CHALLENGE, "open", None, 10, "100"),
                with_prize("0x00000000000000000000000000000000000000c2", "open", None, 30, "900"),
                with_prize("0x00000000000000000000000000000000000000c3", "open", None, 20, "700"),
            ]));
        })
        .await;

    let open = client(&server)
        .list_open_challenges(&ChallengeFilter {
            min_prize: Some(U256::from(500u64)),
            limit: Some(1),
            ..Default::default()
        })
        .await;

    assert_eq!(open.len(), 1);
    assert_eq!(
        open[0].challenge_address,
        "0x00000000000000000000000000000000000000c3"
    );
    full.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_reward_filter_on_bounties_fetches_unpaged_list() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/bounties/open")
                .matches(|req| {
                    !req.query_params
                        .as_ref()
                        .map_or(false, |q| q.iter().any(|(k, _)| k == "limit"))
                });
            then.status(200).json_body(json!([
                {"bountyAddress": "0xB1", "reward": "50", "deadline": "5", "status": "open"},
                {"bountyAddress": "0xB2", "reward": "800", "deadline": "9", "status": "open"}
            ]));
        })
        .await;

    let bounties = client(&server)
        .list_open_bounties(&BountyFilter {
            max_reward: Some(U256::from(1_000u64)),
            min_reward: Some(U256::from(100u64)),
            limit: Some(1),
            ..Default::default()
        })
        .await;
    assert_eq!(bounties.len(), 1);
    assert_eq!(bounties[0].bounty_address, "0xb2");
}

#[tokio::test]
async fn test_effectively_expired_challenge_maps_to_expired() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/v1/challenges/{}", CHALLENGE));
            then.status(200)
                .json_body(challenge_json(CHALLENGE, "open", Some("expired"), 10));
        })
        .await;

    let challenge = client(&server)
        .get_challenge_by_address(&CHALLENGE.to_uppercase().replace("0X", "0x"))
        .await
        .expect("challenge returned");
    assert_eq!(challenge.status, ChallengeStatus::Expired);
}

#[tokio::test]
async fn test_missing_and_failing_lookups_are_empty() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/v1/challenges/{}", CHALLENGE));
            then.status(404);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/challenges/open");
            then.status(500);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/bounties/open");
            then.status(200).body("not valid json");
        })
        .await;

    let mirror = client(&server);
    assert!(mirror.get_challenge_by_address(CHALLENGE).await.is_none());
    assert!(mirror
        .list_open_challenges(&ChallengeFilter::default())
        .await
        .is_empty());
    assert!(mirror
        .list_open_bounties(&BountyFilter::default())
        .await
        .is_empty());
}

#[tokio::test]
async fn test_leaderboard_and_open_bounties() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("/v1/challenges/{}/leaderboard", CHALLENGE))
                .query_param("limit", "2");
            then.status(200).json_body(json!({
                "leaderboard": [
                    {"submitter": "0xA3", "agentId": "13", "version": "2", "score": 8000, "rank": "2"},
                    {"submitter": "0xA2", "agentId": 12, "version": 1, "score": "9500", "rank": 1}
                ]
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/bounties/open");
            then.status(200).json_body(json!([
                {"bountyAddress": "0xB1", "reward": "500", "deadline": "20", "status": "open"},
                {"bountyAddress": "0xB2", "reward": "900", "deadline": "10", "status": "claimed",
                 "effectiveStatus": "expired"}
            ]));
        })
        .await;

    let mirror = client(&server);
    let board = mirror.get_challenge_leaderboard(CHALLENGE, Some(2)).await;
    assert_eq!(board.len(), 2);
    assert_eq!(board[0].score, Some(U256::from(9500u64)));
    assert_eq!(board[1].agent_id, "13");
    assert_eq!(board[1].rank, Some(2));
    assert_eq!(board[0].submitter, "0xa2");

    let bounties = mirror.list_open_bounties(&BountyFilter::default()).await;
    assert_eq!(bounties.len(), 1);
    assert_eq!(bounties[0].bounty_address, "0xb1");
    assert_eq!(bounties[0].status, BountyStatus::Open);
}

#[tokio::test]
async fn test_stats_computed_from_history() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/agents/7/challenges");
            then.status(200).json_body(json!([
                {
                    "challenge": challenge_json(CHALLENGE, "finalized", None, 10),
                    "submission": {"submitter": "0xA1", "agentId": "7", "version": 1, "score": "9000", "rank": 1},
                    "winner": {"address": "0xA1", "agentId": "7", "rank": 1, "score": "9000",
                               "prizeAmount": "600000000", "claimed": true}
                },
                {
                    "challenge": challenge_json("0x00000000000000000000000000000000000000c2", "scoring", None, 20),
                    "submission": {"submitter": "0xA1", "agentId": "7", "version": 3, "score": "10", "rank": 4},
                    "winner": null
                }
            ]));
        })
        .await;

    let mirror = client(&server);
    let history = mirror.get_agent_challenge_history("7").await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].challenge.status, ChallengeStatus::Finalized);

    let stats = mirror.get_agent_challenge_stats("7").await;
    assert_eq!(stats.entered, 2);
    assert_eq!(stats.won, 1);
    assert_eq!(stats.best_rank, 1);
    assert_eq!(stats.avg_rank, 2.5);
    assert_eq!(stats.total_prize_earned, U256::from(600_000_000u64));
}

#[tokio::test]
async fn test_await_indexed_returns_once_indexed() {
    let server = MockServer::start_async().await;
    let status = server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/v1/tx/{}", TX));
            then.status(200)
                .json_body(json!({"txHash": TX, "status": "indexed", "blockNumber": "123"}));
        })
        .await;

    let result = client(&server)
        .await_indexed(TX, Duration::from_secs(5))
        .await
        .expect("indexed");
    assert_eq!(result.status, TxStatus::Indexed);
    assert_eq!(result.block_number, Some(123));
    status.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_await_indexed_times_out_with_backoff() {
    let server = MockServer::start_async().await;
    let status = server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/v1/tx/{}", TX));
            then.status(200).json_body(json!({"status": "pending"}));
        })
        .await;

    let started = Instant::now();
    let result = client(&server)
        .await_indexed(TX, Duration::from_millis(300))
        .await;

    assert!(result.is_none());
    assert!(started.elapsed() < Duration::from_secs(2));
    // 10ms, 20ms, 40ms, 40ms... leaves room for several polls
    assert!(status.hits_async().await >= 3);
}

#[tokio::test]
async fn test_await_indexed_retries_through_server_errors() {
    let server = MockServer::start_async().await;
    let failing = server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/v1/tx/{}", TX));
            then.status(500);
        })
        .await;

    let mirror = client(&server);
    let waiter =
        tokio::spawn(async move { mirror.await_indexed(TX, Duration::from_secs(5)).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(failing.hits_async().await >= 1);
    failing.delete_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/v1/tx/{}", TX));
            then.status(200)
                .json_body(json!({"txHash": TX, "status": "indexed", "blockNumber": 77}));
        })
        .await;

    let result = waiter.await.unwrap().expect("indexed after errors");
    assert_eq!(result.status, TxStatus::Indexed);
    assert_eq!(result.block_number, Some(77));
}

#[tokio::test]
async fn test_await_indexed_persistent_errors_end_at_deadline() {
    let server = MockServer::start_async().await;
    let failing = server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/v1/tx/{}", TX));
            then.status(500);
        })
        .await;

    let started = Instant::now();
    let result = client(&server)
        .await_indexed(TX, Duration::from_millis(200))
        .await;

    assert!(result.is_none());
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(failing.hits_async().await >= 2);
}

#[tokio::test]
async fn test_await_indexed_unknown_tx_is_pending() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/v1/tx/{}", TX));
            then.status(404);
        })
        .await;

    let mirror = client(&server);
    let status = mirror.tx_status(TX).await.unwrap();
    assert_eq!(status.status, TxStatus::Pending);
    assert_eq!(status.tx_hash, TX);
    assert!(mirror
        .await_indexed(TX, Duration::from_millis(50))
        .await
        .is_none());
}
