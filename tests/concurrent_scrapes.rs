//! Concurrency tests for scrape/register/delete interleavings
//!
//! All registry operations serialize on one lock, so concurrent scrapes
//! must each consume exactly one value and never observe a partial batch.

use any_exporter::{
    config::Config,
    handlers::{self, AppState},
    registry::RecipeRegistry,
};
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use std::sync::Arc;
use tower::ServiceExt;

fn counter_recipe(name: &str, steps: usize) -> String {
    format!(
        "spec: {{name: {name}, type: counter, labels: [worker]}}\n\
         data:\n  - labels: [{{key: worker, value: w1}}]\n    sequence: \"1+1x{}\"\n",
        steps - 1
    )
}

#[tokio::test]
async fn test_concurrent_http_scrapes_each_advance_once() {
    let state = AppState::new(Arc::new(Config::default()));
    state
        .registry()
        .register(&counter_recipe("jobs_total", 200))
        .await
        .unwrap();
    let app = handlers::router(state.clone());

    let scrapes = (0..40).map(|_| {
        let app = app.clone();
        async move {
            let request = Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap();
            app.oneshot(request).await.unwrap().status()
        }
    });
    let statuses = futures::future::join_all(scrapes).await;

    assert!(statuses.iter().all(|status| *status == StatusCode::OK));
    let body = state.registry().gather().await.unwrap();
    assert!(body.contains(r#"jobs_total{worker="w1"} 40"#), "{body}");
}

#[tokio::test]
async fn test_concurrent_scrapes_return_distinct_steps() {
    let registry = Arc::new(RecipeRegistry::new());
    registry
        .register(&counter_recipe("steps_total", 30))
        .await
        .unwrap();

    let handles: Vec<_> = (0..30)
        .map(|_| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.scrape().await.unwrap() })
        })
        .collect();

    let mut observed: Vec<u32> = Vec::new();
    for handle in futures::future::join_all(handles).await {
        let body = handle.unwrap();
        let line = body
            .lines()
            .find(|line| line.starts_with("steps_total{"))
            .expect("series line present");
        let value = line.rsplit(' ').next().unwrap().parse().unwrap();
        observed.push(value);
    }

    observed.sort_unstable();
    let expected: Vec<u32> = (1..=30).collect();
    assert_eq!(observed, expected);
    assert_eq!(registry.active_series("steps_total").await, Some(0));
}

#[tokio::test]
async fn test_registration_during_scrapes_is_atomic() {
    let registry = Arc::new(RecipeRegistry::new());
    let batch = format!(
        "{}---\n{}",
        counter_recipe("batch_a_total", 5),
        counter_recipe("batch_b_total", 5)
    );

    let scraper = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            let mut bodies = Vec::new();
            for _ in 0..20 {
                bodies.push(registry.scrape().await.unwrap());
                tokio::task::yield_now().await;
            }
            bodies
        })
    };
    registry.register(&batch).await.unwrap();

    for body in scraper.await.unwrap() {
        assert_eq!(
            body.contains("batch_a_total{"),
            body.contains("batch_b_total{"),
            "a scrape observed half a batch: {body}"
        );
    }
}
