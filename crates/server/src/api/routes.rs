//! Query API routes

use axum::{routing::get, Router};

use super::handlers::*;

/// Create the query router
///
/// Routes:
/// - GET /health                             - Liveness and chain height
/// - GET /api/v1/chain/head                  - Block with the greatest height
/// - GET /api/v1/rounds/last                 - Outcome of the most recent round
/// - GET /api/v1/blocks/latest?limit=n       - Newest blocks, head first
/// - GET /api/v1/blocks/hash/:hash           - Block by hash
/// - GET /api/v1/blocks/height/:height       - Block by height
/// - GET /api/v1/blocks/timestamp/:timestamp - Block by round timestamp (ms)
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/chain/head", get(chain_head))
        .route("/api/v1/rounds/last", get(last_round))
        .route("/api/v1/blocks/latest", get(latest_blocks))
        .route("/api/v1/blocks/hash/:hash", get(block_by_hash))
        .route("/api/v1/blocks/height/:height", get(block_by_height))
        .route("/api/v1/blocks/timestamp/:timestamp", get(block_by_timestamp))
        .with_state(state)
}
