//! Health check endpoint
//!
//! Provides a simple health check for test harnesses waiting on startup.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::handlers::AppState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Number of metric names currently registered
    pub registered_metrics: usize,
}

/// Health check handler
///
/// Returns 200 OK; does not advance any series.
pub async fn handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let registered_metrics = state.registry().len().await;

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "OK".to_string(),
            registered_metrics,
        }),
    )
}
