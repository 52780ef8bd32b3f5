//! Prometheus metrics endpoint
//!
//! Every scrape advances each registered series by one scripted value and
//! then exposes the result in Prometheus text format.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::handlers::AppState;

/// Metrics handler for Prometheus scraping
///
/// # Response
///
/// - `200 OK` with metrics in Prometheus text format
/// - `500 Internal Server Error` if encoding fails
///
/// # Example
///
/// ```bash
/// curl http://localhost:8080/metrics
/// # HELP test1 Synthetic counter generated from recipe
/// # TYPE test1 counter
/// test1{aaa="aaa_val1",bbb="bbb_val1"} 1
/// ```
pub async fn handler(State(state): State<AppState>) -> Response {
    exposition(state.registry().scrape().await)
}

/// `HEAD /metrics`: same headers as a scrape, without advancing any series
pub async fn head_handler(State(state): State<AppState>) -> Response {
    exposition(state.registry().gather().await)
}

fn exposition(result: Result<String, prometheus::Error>) -> Response {
    match result {
        Ok(output) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], output).into_response(),
        Err(e) => {
            tracing::error!(
                error = %e,
                "Failed to gather metrics for Prometheus scraping"
            );
            AppError::Metrics(e).into_response()
        }
    }
}
