//! HTTP query API over the block ledger

pub mod handlers;
pub mod routes;

pub use handlers::{ApiError, ApiState, NodeInfo};
pub use routes::create_router;
