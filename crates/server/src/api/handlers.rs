//! Query API handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use common::Block;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use storage::keys::ROUND_STATUS_SLOT;
use storage::{Ledger, StorageError};
use tracing::error;

const DEFAULT_LATEST: usize = 10;
const MAX_LATEST: usize = 100;

/// Static facts about the running node
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub address: String,
    pub quote: String,
}

#[derive(Clone)]
pub struct ApiState {
    pub ledger: Ledger,
    pub node: Arc<NodeInfo>,
}

impl ApiState {
    pub fn new(ledger: Ledger, node: NodeInfo) -> Self {
        Self {
            ledger,
            node: Arc::new(node),
        }
    }
}

/// Storage failure mapped onto an HTTP status
///
/// Missing records are 404. Records that exist but fail to decode or
/// verify are 500, so clients can tell the two apart.
#[derive(Debug)]
pub struct ApiError(pub StorageError);

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            StorageError::NotFound(_) => StatusCode::NOT_FOUND,
            StorageError::Connection(_) | StorageError::Backend(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status != StatusCode::NOT_FOUND {
            error!(error = %self.0, "Ledger query failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    pub limit: Option<usize>,
}

/// Liveness plus the current chain height
pub async fn health(State(state): State<ApiState>) -> (StatusCode, Json<Value>) {
    let (status, height) = match state.ledger.head().await {
        Ok(head) => (StatusCode::OK, head.map(|b| b.height)),
        Err(e) => {
            error!(error = %e, "Health check could not read the chain head");
            (StatusCode::SERVICE_UNAVAILABLE, None)
        }
    };

    let body = json!({
        "status": if status == StatusCode::OK { "ok" } else { "degraded" },
        "node": state.node.address,
        "quote": state.node.quote,
        "backend": state.ledger.backend_name(),
        "height": height,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    });
    (status, Json(body))
}

pub async fn chain_head(State(state): State<ApiState>) -> ApiResult<Block> {
    state
        .ledger
        .head()
        .await?
        .map(Json)
        .ok_or_else(|| ApiError(StorageError::NotFound("chain is empty".to_string())))
}

/// Most recent blocks, newest first
pub async fn latest_blocks(
    State(state): State<ApiState>,
    Query(query): Query<LatestQuery>,
) -> ApiResult<Vec<Block>> {
    let limit = query.limit.unwrap_or(DEFAULT_LATEST).min(MAX_LATEST);
    Ok(Json(state.ledger.get_latest(limit).await?))
}

pub async fn block_by_hash(
    State(state): State<ApiState>,
    Path(hash): Path<String>,
) -> ApiResult<Block> {
    Ok(Json(state.ledger.get_by_hash(&hash).await?))
}

pub async fn block_by_height(
    State(state): State<ApiState>,
    Path(height): Path<u64>,
) -> ApiResult<Block> {
    Ok(Json(state.ledger.get_by_height(height).await?))
}

pub async fn block_by_timestamp(
    State(state): State<ApiState>,
    Path(timestamp): Path<u64>,
) -> ApiResult<Block> {
    Ok(Json(state.ledger.get_by_timestamp(timestamp).await?))
}

/// Outcome of the most recent round, as recorded by the round processor
pub async fn last_round(State(state): State<ApiState>) -> ApiResult<Value> {
    let raw = state.ledger.get_raw(ROUND_STATUS_SLOT).await?;
    let status = serde_json::from_slice(&raw)
        .map_err(|e| StorageError::Corrupted(format!("{}: {}", ROUND_STATUS_SLOT, e)))?;
    Ok(Json(status))
}
