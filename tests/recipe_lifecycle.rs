//! End-to-end recipe lifecycle tests
//!
//! Drives the full router in-process: register recipes, scrape them step by
//! step, then retire them gracefully or by force.

use any_exporter::{
    config::Config,
    handlers::{self, AppState, recipe::DeleteResponse},
};
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use std::sync::Arc;
use tower::ServiceExt;

const COUNTER_AND_GAUGE: &str = include_str!("fixtures/counter-and-gauge.yaml");
const HISTOGRAM: &str = include_str!("fixtures/histogram.yaml");

fn create_test_app() -> Router {
    handlers::router(AppState::new(Arc::new(Config::default())))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn post_recipe(app: &Router, recipe: &str) -> StatusCode {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/recipe")
        .header("content-type", "application/yaml")
        .body(Body::from(recipe.to_string()))
        .unwrap();
    send(app, request).await.0
}

async fn get_metrics(app: &Router) -> String {
    let request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    body
}

async fn delete_recipe(app: &Router, force: bool) -> Vec<String> {
    let uri = if force { "/recipe?force=true" } else { "/recipe" };
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_str::<DeleteResponse>(&body).unwrap().removed
}

#[tokio::test]
async fn test_counter_and_gauge() {
    let app = create_test_app();

    assert_eq!(post_recipe(&app, COUNTER_AND_GAUGE).await, StatusCode::OK);
    assert_eq!(
        post_recipe(&app, COUNTER_AND_GAUGE).await,
        StatusCode::CONFLICT
    );

    let metrics = get_metrics(&app).await;
    assert!(metrics.contains(r#"test1{aaa="aaa_val1",bbb="bbb_val1"} 1"#), "{metrics}");
    assert!(metrics.contains(r#"test1{aaa="aaa_val1",bbb="bbb_val2"} 0"#), "{metrics}");
    assert!(metrics.contains(r#"test2{aaa="aaa_val2",ccc="ccc_val1"} 0"#), "{metrics}");

    let metrics = get_metrics(&app).await;
    assert!(metrics.contains(r#"test1{aaa="aaa_val1",bbb="bbb_val1"} 2"#), "{metrics}");
    assert!(metrics.contains(r#"test1{aaa="aaa_val1",bbb="bbb_val2"} 1"#), "{metrics}");
    assert!(metrics.contains(r#"test2{aaa="aaa_val2",ccc="ccc_val1"} 1"#), "{metrics}");

    // test2 drains here
    let metrics = get_metrics(&app).await;
    assert!(metrics.contains(r#"test1{aaa="aaa_val1",bbb="bbb_val1"} 3"#), "{metrics}");
    assert!(metrics.contains(r#"test1{aaa="aaa_val1",bbb="bbb_val2"} 1"#), "{metrics}");
    assert!(metrics.contains(r#"test2{aaa="aaa_val2",ccc="ccc_val1"} 0"#), "{metrics}");

    // test1{bbb="bbb_val1"} drains here
    let metrics = get_metrics(&app).await;
    assert!(metrics.contains(r#"test1{aaa="aaa_val1",bbb="bbb_val1"} 3"#), "{metrics}");
    assert!(metrics.contains(r#"test1{aaa="aaa_val1",bbb="bbb_val2"} 1"#), "{metrics}");
    assert!(metrics.contains(r#"test2{aaa="aaa_val2",ccc="ccc_val1"} 0"#), "{metrics}");

    // Graceful delete only takes the fully drained test2
    assert_eq!(delete_recipe(&app, false).await, vec!["test2"]);

    let metrics = get_metrics(&app).await;
    assert!(metrics.contains(r#"test1{aaa="aaa_val1",bbb="bbb_val1"} 3"#), "{metrics}");
    assert!(metrics.contains(r#"test1{aaa="aaa_val1",bbb="bbb_val2"} 1"#), "{metrics}");
    assert!(!metrics.contains("test2"), "{metrics}");

    // test2 is free again, test1 still owns its name
    assert_eq!(
        post_recipe(&app, COUNTER_AND_GAUGE).await,
        StatusCode::CONFLICT
    );

    assert_eq!(delete_recipe(&app, true).await, vec!["test1"]);
    assert_eq!(post_recipe(&app, COUNTER_AND_GAUGE).await, StatusCode::OK);

    assert_eq!(delete_recipe(&app, true).await, vec!["test1", "test2"]);
}

#[tokio::test]
async fn test_histogram() {
    let app = create_test_app();

    assert_eq!(post_recipe(&app, HISTOGRAM).await, StatusCode::OK);
    assert_eq!(post_recipe(&app, HISTOGRAM).await, StatusCode::CONFLICT);

    let metrics = get_metrics(&app).await;
    assert!(metrics.contains(r#"test3_bucket{ccc="ccc_val1",ddd="ddd_val1",le="0.5"} 0"#), "{metrics}");
    assert!(metrics.contains(r#"test3_bucket{ccc="ccc_val1",ddd="ddd_val1",le="1"} 1"#), "{metrics}");
    assert!(metrics.contains(r#"test3_bucket{ccc="ccc_val2",ddd="ddd_val2",le="0.5"} 1"#), "{metrics}");

    let metrics = get_metrics(&app).await;
    assert!(metrics.contains(r#"test3_bucket{ccc="ccc_val1",ddd="ddd_val1",le="1"} 1"#), "{metrics}");
    assert!(metrics.contains(r#"test3_bucket{ccc="ccc_val1",ddd="ddd_val1",le="2"} 2"#), "{metrics}");
    assert!(metrics.contains(r#"test3_bucket{ccc="ccc_val2",ddd="ddd_val2",le="2"} 1"#), "{metrics}");
    assert!(metrics.contains(r#"test3_bucket{ccc="ccc_val2",ddd="ddd_val2",le="4"} 2"#), "{metrics}");

    let metrics = get_metrics(&app).await;
    assert!(metrics.contains(r#"test3_bucket{ccc="ccc_val1",ddd="ddd_val1",le="32"} 2"#), "{metrics}");
    assert!(metrics.contains(r#"test3_bucket{ccc="ccc_val1",ddd="ddd_val1",le="+Inf"} 3"#), "{metrics}");
    assert!(metrics.contains(r#"test3_bucket{ccc="ccc_val2",ddd="ddd_val2",le="4"} 2"#), "{metrics}");
    assert!(metrics.contains(r#"test3_bucket{ccc="ccc_val2",ddd="ddd_val2",le="8"} 3"#), "{metrics}");

    assert_eq!(delete_recipe(&app, false).await, vec!["test3"]);
}

#[tokio::test]
async fn test_scripted_counter_example() {
    let app = create_test_app();
    let recipe = r#"
spec:
  name: test1
  type: counter
  labels: [aaa, bbb]
data:
  - labels: [{key: aaa, value: aaa_val1}, {key: bbb, value: bbb_val1}]
    sequence: "1 2 3"
  - labels: [{key: aaa, value: aaa_val1}, {key: bbb, value: bbb_val2}]
    sequence: "0 1 1"
"#;
    assert_eq!(post_recipe(&app, recipe).await, StatusCode::OK);

    let expected = [("1", "0"), ("2", "1"), ("3", "1"), ("3", "1")];
    for (first, second) in expected {
        let metrics = get_metrics(&app).await;
        let line1 = format!(r#"test1{{aaa="aaa_val1",bbb="bbb_val1"}} {first}"#);
        let line2 = format!(r#"test1{{aaa="aaa_val1",bbb="bbb_val2"}} {second}"#);
        assert!(metrics.contains(&line1), "{metrics}");
        assert!(metrics.contains(&line2), "{metrics}");
    }

    assert_eq!(post_recipe(&app, recipe).await, StatusCode::CONFLICT);
    assert_eq!(delete_recipe(&app, false).await, vec!["test1"]);
    assert_eq!(post_recipe(&app, recipe).await, StatusCode::OK);
}

#[tokio::test]
async fn test_rejected_batch_registers_nothing() {
    let app = create_test_app();
    let batch = format!(
        "{COUNTER_AND_GAUGE}\n---\n{}",
        "spec: {name: broken, type: gauge, labels: [a]}\n\
         data:\n  - labels: [{key: a, value: x}]\n    sequence: \"1+2x3.4\"\n"
    );

    assert_eq!(post_recipe(&app, &batch).await, StatusCode::BAD_REQUEST);
    assert!(!get_metrics(&app).await.contains("test1"));

    // Nothing from the failed batch claimed a name
    assert_eq!(post_recipe(&app, COUNTER_AND_GAUGE).await, StatusCode::OK);
}
