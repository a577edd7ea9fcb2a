//! Handler behavior when the store is unreachable.

use axum::http::StatusCode;
use integration_tests::fixtures::{movie_body, rating_body, Dataset};
use integration_tests::setup::TestContext;
use serde_json::Value;

async fn assert_store_error(response: axum_test::TestResponse) {
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["code"], "DB_001");
    assert!(
        body["error"]
            .as_str()
            .unwrap_or("")
            .contains("connection refused"),
        "{}",
        body
    );
}

#[tokio::test]
async fn test_catalog_store_failures_are_internal_errors() {
    let ctx = TestContext::failing();
    let server = ctx.server();

    assert_store_error(server.get("/movies").await).await;
    assert_store_error(server.get("/movies/1").await).await;
    assert_store_error(
        server
            .post("/movies")
            .json(&movie_body("Heat", None, None))
            .await,
    )
    .await;
    assert_store_error(server.delete("/movies/1").await).await;
    assert_store_error(server.get("/ratings").await).await;
    assert_store_error(
        server
            .post("/ratings")
            .json(&rating_body(1, None, 5.0))
            .await,
    )
    .await;
}

#[tokio::test]
async fn test_validation_runs_before_store_access() {
    let ctx = TestContext::failing();
    let server = ctx.server();

    let response = server
        .post("/ratings")
        .json(&rating_body(1, None, 42.0))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_insight_and_quality_failures_are_internal_errors() {
    let ctx = TestContext::failing();
    let server = ctx.server();

    assert_store_error(server.get("/api/insights/top10-by-genre").await).await;
    assert_store_error(server.get("/api/insights/avg-by-age").await).await;
    assert_store_error(server.get("/api/insights/by-country").await).await;
    assert_store_error(server.get("/api/quality/metrics").await).await;
    assert_store_error(server.get("/api/export").await).await;
}

#[tokio::test]
async fn test_pipeline_failure_releases_lock() {
    let ctx = TestContext::failing();
    ctx.write_phase("raw_v1", &Dataset::sample());
    let server = ctx.server();

    for _ in 0..2 {
        assert_store_error(server.post("/api/datalake/pipeline").await).await;
    }
    assert!(!ctx.runner.is_running());
    assert!(!ctx.raw_dir().join(".locks").join("movieflix.lock").exists());
}

#[tokio::test]
async fn test_input_errors_win_over_store_errors() {
    let ctx = TestContext::failing();
    let server = ctx.server();

    let response = server
        .post("/api/datalake/ingest")
        .add_query_param("phase", "raw_v1")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "ETL_001");
}

#[tokio::test]
async fn test_readiness_fails_without_warehouse() {
    let ctx = TestContext::failing();
    let server = ctx.server();

    server
        .get("/health/ready")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = server.get("/health").await.json();
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["backend"], "failing");
    assert_eq!(body["warehouse_connected"], false);
}
