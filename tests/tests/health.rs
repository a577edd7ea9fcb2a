//! Tests for health check endpoints.
//!
//! Component health is process-global, so every probing assertion lives in
//! a single test.

use axum::http::StatusCode;
use integration_tests::fixtures::Dataset;
use integration_tests::setup::TestContext;
use serde_json::Value;

/// Test /health/live does not depend on components
#[tokio::test]
async fn test_liveness_probe() {
    let ctx = TestContext::new();
    let server = ctx.server();

    server.get("/health/live").await.assert_status_ok();
}

/// Test /health structure, readiness and degradation without a raw zone
#[tokio::test]
async fn test_health_reports_components() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();

    assert_eq!(body["status"], "healthy");
    assert_eq!(body["backend"], "memory");
    assert_eq!(body["warehouse_connected"], true);
    assert_eq!(body["data_lake_available"], true);
    assert_eq!(body["run_in_progress"], false);
    let components = body["report"]["components"]
        .as_array()
        .expect("components");
    assert_eq!(components.len(), 2);

    server.get("/health/ready").await.assert_status_ok();

    // Alias
    let alias: Value = server.get("/api/health").await.json();
    assert_eq!(alias["backend"], "memory");

    // A finished run is reported
    ctx.write_phase("raw_v1", &Dataset::sample());
    server
        .post("/api/datalake/pipeline")
        .await
        .assert_status_ok();
    let body: Value = server.get("/health").await.json();
    assert!(body["last_run_finished_at"].as_i64().unwrap_or(0) > 0);

    // Without the raw zone the service still serves insights
    std::fs::remove_dir_all(ctx.raw_dir()).expect("remove raw zone");
    let body: Value = server.get("/health").await.json();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["data_lake_available"], false);
    server
        .get("/health/ready")
        .await
        .assert_status(StatusCode::OK);
    server
        .get("/api/insights/by-country")
        .await
        .assert_status_ok();
}
