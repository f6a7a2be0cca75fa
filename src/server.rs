//! REST front end.
//!
//! Exposes the `ChallengeQueries` surface over HTTP. The router is backend
//! agnostic: it serves the local index and the remote mirror alike.

use crate::error::IndexerError;
use crate::query::{BountyFilter, ChallengeFilter, ChallengeQueries};
use crate::util::{parse_address, parse_u256};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub queries: Arc<dyn ChallengeQueries>,
    /// "local" or "remote", reported by /health
    pub backend: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Error response for a request the query layer cannot answer
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

impl From<IndexerError> for ApiError {
    fn from(err: IndexerError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

fn checked_address(raw: &str) -> Result<String, ApiError> {
    parse_address(raw)?;
    Ok(raw.to_string())
}

fn checked_agent_id(raw: &str) -> Result<String, ApiError> {
    parse_u256(raw).map_err(|e| ApiError::BadRequest(format!("Invalid agent id: {}", e)))?;
    Ok(raw.to_string())
}

// ============================================================================
// HANDLERS
// ============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    backend: &'static str,
    indexed_block: Option<u64>,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.queries.index_status().await;
    Json(HealthResponse {
        status: "ok",
        backend: state.backend,
        indexed_block: status.map(|s| s.last_block),
    })
}

async fn index_status(State(state): State<AppState>) -> impl IntoResponse {
    match state.queries.index_status().await {
        Some(status) => Json(status).into_response(),
        None => ApiError::NotFound("Index not loaded yet".to_string()).into_response(),
    }
}

async fn open_challenges(
    State(state): State<AppState>,
    Query(filter): Query<ChallengeFilter>,
) -> impl IntoResponse {
    Json(state.queries.list_open_challenges(&filter).await)
}

#[derive(Debug, Deserialize)]
struct PosterQuery {
    poster: String,
}

async fn challenges_by_poster(
    State(state): State<AppState>,
    Query(query): Query<PosterQuery>,
) -> ApiResult<Vec<crate::model::ChallengeRecord>> {
    let poster = checked_address(&query.poster)?;
    Ok(Json(state.queries.get_challenges_by_poster(&poster).await))
}

async fn challenge(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<crate::model::ChallengeRecord> {
    let address = checked_address(&address)?;
    state
        .queries
        .get_challenge_by_address(&address)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Challenge {} not found", address)))
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

async fn leaderboard(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Vec<crate::model::SubmissionRecord>> {
    let address = checked_address(&address)?;
    Ok(Json(
        state
            .queries
            .get_challenge_leaderboard(&address, query.limit)
            .await,
    ))
}

async fn agent(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> ApiResult<crate::model::AgentRecord> {
    let agent_id = checked_agent_id(&agent_id)?;
    state
        .queries
        .get_agent(&agent_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Agent {} not found", agent_id)))
}

async fn agent_challenges(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> ApiResult<Vec<crate::query::AgentChallengeEntry>> {
    let agent_id = checked_agent_id(&agent_id)?;
    Ok(Json(state.queries.get_agent_challenge_history(&agent_id).await))
}

async fn agent_stats(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> ApiResult<crate::query::AgentChallengeStats> {
    let agent_id = checked_agent_id(&agent_id)?;
    Ok(Json(state.queries.get_agent_challenge_stats(&agent_id).await))
}

async fn open_bounties(
    State(state): State<AppState>,
    Query(filter): Query<BountyFilter>,
) -> impl IntoResponse {
    Json(state.queries.list_open_bounties(&filter).await)
}

async fn bounty(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<crate::model::BountyRecord> {
    let address = checked_address(&address)?;
    state
        .queries
        .get_bounty_by_address(&address)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Bounty {} not found", address)))
}

// ============================================================================
// SERVER
// ============================================================================

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/status", get(index_status))
        .route("/v1/challenges", get(challenges_by_poster))
        .route("/v1/challenges/open", get(open_challenges))
        .route("/v1/challenges/:address", get(challenge))
        .route("/v1/challenges/:address/leaderboard", get(leaderboard))
        .route("/v1/agents/:id", get(agent))
        .route("/v1/agents/:id/challenges", get(agent_challenges))
        .route("/v1/agents/:id/stats", get(agent_stats))
        .route("/v1/bounties/open", get(open_bounties))
        .route("/v1/bounties/:address", get(bounty))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn run_server(
    state: AppState,
    host: &str,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let backend = state.backend;
    let app = router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("╔══════════════════════════════════════════════════════════════╗");
    info!("║              Challenge Indexer - Query API                   ║");
    info!("╠══════════════════════════════════════════════════════════════╣");
    info!("║  Backend:      {:44} ║", backend);
    info!("║  Listening on: {:44} ║", addr);
    info!("╠══════════════════════════════════════════════════════════════╣");
    info!("║  GET /v1/challenges/open          - Open challenges          ║");
    info!("║  GET /v1/challenges/:address      - Challenge detail         ║");
    info!("║  GET /v1/agents/:id/stats         - Agent statistics         ║");
    info!("║  GET /v1/bounties/open            - Open bounties            ║");
    info!("╚══════════════════════════════════════════════════════════════╝");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BountyIndex, ChallengeRecord, ChallengeStatus};
    use crate::query::LocalQueries;
    use crate::snapshot::SnapshotHandle;
    use alloy::primitives::U256;

    const CHALLENGE: &str = "0x00000000000000000000000000000000000000c1";

    fn sample_index() -> BountyIndex {
        let mut index = BountyIndex::new(1, "0x00000000000000000000000000000000000000f1", None, 0);
        index.advance_checkpoint(42);
        index.challenges.insert(
            CHALLENGE.to_string(),
            ChallengeRecord {
                challenge_address: CHALLENGE.to_string(),
                poster: "0x00000000000000000000000000000000000000a1".to_string(),
                evaluator: String::new(),
                token: String::new(),
                title: "Gas golf".to_string(),
                description: String::new(),
                skills: vec!["solidity".to_string()],
                prize_pool: U256::from(1_000u64),
                winner_count: 1,
                payout_bps: vec![10_000],
                max_participants: 0,
                deadline: 10,
                scoring_deadline: 20,
                score_posted_at: None,
                status: ChallengeStatus::Open,
                submissions: Default::default(),
                winners: vec![],
                submission_count: 0,
                created_block: 1,
                created_tx_hash: None,
                updated_block: 1,
                updated_log_index: 0,
            },
        );
        index
    }

    async fn spawn(handle: SnapshotHandle) -> String {
        let state = AppState {
            queries: Arc::new(LocalQueries::new(handle)),
            backend: "local",
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_routes_over_local_index() {
        let base = spawn(SnapshotHandle::with_snapshot(sample_index())).await;
        let client = reqwest::Client::new();

        let health: serde_json::Value = client
            .get(format!("{}/health", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["indexed_block"], 42);

        let open: serde_json::Value = client
            .get(format!("{}/v1/challenges/open?skill=SOLID", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(open.as_array().unwrap().len(), 1);
        assert_eq!(open[0]["prizePool"], "1000");

        let resp = client
            .get(format!("{}/v1/challenges/{}", base, CHALLENGE.to_uppercase().replace("0X", "0x")))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let stats: serde_json::Value = client
            .get(format!("{}/v1/agents/7/stats", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(stats["entered"], 0);
        assert_eq!(stats["totalPrizeEarned"], "0");
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let base = spawn(SnapshotHandle::with_snapshot(sample_index())).await;
        let client = reqwest::Client::new();

        let bad = client
            .get(format!("{}/v1/challenges/not-an-address", base))
            .send()
            .await
            .unwrap();
        assert_eq!(bad.status(), 400);

        let missing = client
            .get(format!(
                "{}/v1/bounties/0x00000000000000000000000000000000000000b9",
                base
            ))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), 404);

        let bad_agent = client
            .get(format!("{}/v1/agents/abc", base))
            .send()
            .await
            .unwrap();
        assert_eq!(bad_agent.status(), 400);

        let empty_board = client
            .get(format!(
                "{}/v1/challenges/0x00000000000000000000000000000000000000c9/leaderboard",
                base
            ))
            .send()
            .await
            .unwrap();
        assert_eq!(empty_board.status(), 200);
    }

    #[tokio::test]
    async fn test_status_before_first_sync() {
        let base = spawn(SnapshotHandle::new()).await;
        let resp = reqwest::get(format!("{}/v1/status", base)).await.unwrap();
        assert_eq!(resp.status(), 404);

        let open: serde_json::Value = reqwest::get(format!("{}/v1/challenges/open", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(open.as_array().unwrap().is_empty());
    }
}
