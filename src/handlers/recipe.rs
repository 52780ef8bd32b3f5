//! Recipe endpoint
//!
//! `POST /recipe` registers the recipes in the request body, `DELETE /recipe`
//! retires metrics.

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::handlers::AppState;

/// Response body of a successful registration
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub registered: Vec<String>,
}

/// Response body of a delete request
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub removed: Vec<String>,
}

/// Query parameters of `DELETE /recipe`
#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
    /// Only the literal `true` forces removal
    pub force: Option<String>,
}

impl DeleteParams {
    pub fn is_forced(&self) -> bool {
        self.force.as_deref() == Some("true")
    }
}

/// Register a YAML recipe stream
///
/// # Response
///
/// - `200 OK` with the registered names
/// - `400 Bad Request` if the body is not UTF-8 or any recipe is invalid
/// - `409 Conflict` if any name is already registered
/// - `413 Payload Too Large` if the body exceeds `server.max_recipe_bytes`
///
/// # Example
///
/// ```bash
/// curl -X POST --data-binary @counter.yaml http://localhost:8080/recipe
/// {"registered":["test1"]}
/// ```
pub async fn post_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<RegisterResponse>> {
    let text = std::str::from_utf8(&body).map_err(|e| {
        tracing::warn!(error = %e, "Recipe body is not valid UTF-8");
        AppError::BadRequest(format!("recipe body is not valid UTF-8: {e}"))
    })?;

    let registered = state.registry().register(text).await.map_err(|e| {
        tracing::warn!(
            error = %e,
            status = %e.status(),
            recipe_index = ?e.index(),
            "Recipe rejected"
        );
        AppError::from(e)
    })?;

    Ok(Json(RegisterResponse { registered }))
}

/// Remove drained metrics, or all metrics with `?force=true`
///
/// Always succeeds; metrics that are not eligible are skipped.
pub async fn delete_handler(
    State(state): State<AppState>,
    Query(params): Query<DeleteParams>,
) -> Json<DeleteResponse> {
    let force = params.is_forced();
    let removed = state.registry().clear(force).await;

    tracing::debug!(force, removed = removed.len(), "Recipe delete completed");

    Json(DeleteResponse { removed })
}
