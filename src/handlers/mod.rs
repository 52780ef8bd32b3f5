//! HTTP request handlers for the any-exporter API

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::registry::RecipeRegistry;

pub mod health;
pub mod metrics;
pub mod recipe;

/// Application state shared across all handlers
///
/// All fields are Arc'd for cheap cloning across Axum handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    registry: Arc<RecipeRegistry>,
}

impl AppState {
    /// Create a new AppState with an empty recipe registry
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            registry: Arc::new(RecipeRegistry::new()),
        }
    }

    /// Get reference to the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get reference to the recipe registry
    pub fn registry(&self) -> &RecipeRegistry {
        &self.registry
    }
}

/// Build the application router
///
/// - `POST /recipe`: register recipes
/// - `DELETE /recipe[?force=true]`: remove drained (or all) metrics
/// - `GET /metrics`: advance one step and expose current values
/// - `GET /health`: liveness
pub fn router(state: AppState) -> Router {
    let max_recipe_bytes = state.config().server.max_recipe_bytes;

    Router::new()
        .route(
            "/recipe",
            post(recipe::post_handler)
                .delete(recipe::delete_handler)
                .layer(DefaultBodyLimit::max(max_recipe_bytes)),
        )
        .route(
            "/metrics",
            get(metrics::handler).head(metrics::head_handler),
        )
        .route("/health", get(health::handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appstate_new_creates_empty_registry() {
        let state = AppState::new(Arc::new(Config::default()));
        assert_eq!(state.config().server.port, 8080);
    }

    #[tokio::test]
    async fn test_appstate_clones_share_registry() {
        let state = AppState::new(Arc::new(Config::default()));
        let clone = state.clone();

        state
            .registry()
            .register("spec: {name: shared, type: gauge, labels: [a]}")
            .await
            .unwrap();

        assert!(clone.registry().contains("shared").await);
    }
}
