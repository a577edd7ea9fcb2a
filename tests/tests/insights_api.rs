//! Pipeline and insight API tests over the in-memory store.

use axum::http::StatusCode;
use integration_tests::fixtures::{Dataset, RATINGS_HEADER};
use integration_tests::setup::TestContext;
use serde_json::{json, Value};

async fn run_pipeline(server: &axum_test::TestServer, phase: &str) -> Value {
    let response = server
        .post("/api/datalake/pipeline")
        .add_query_param("phase", phase)
        .await;
    response.assert_status_ok();
    response.json()
}

#[tokio::test]
async fn test_marts_are_empty_before_any_run() {
    let ctx = TestContext::new();
    let server = ctx.server();

    for path in [
        "/api/insights/top10-by-genre",
        "/api/insights/avg-by-age",
        "/api/insights/by-country",
    ] {
        let response = server.get(path).await;
        response.assert_status_ok();
        response.assert_json(&json!([]));
    }
}

#[tokio::test]
async fn test_pipeline_run_feeds_insights() {
    let ctx = TestContext::new();
    ctx.write_phase("raw_v1", &Dataset::sample());
    let server = ctx.server();

    let report = run_pipeline(&server, "raw_v1").await;
    assert_eq!(report["run"]["phase"], "raw_v1");
    assert_eq!(report["run"]["policy"], "skip");
    assert_eq!(report["run"]["staged"]["ratings"], 5);
    assert_eq!(report["run"]["loaded"]["movies"], 4);
    assert_eq!(report["run"]["loaded"]["ratings"], 4);
    assert_eq!(report["run"]["rejected"], 1);
    let rejection = report["run"]["rejections"][0].as_str().expect("rejection");
    assert!(rejection.starts_with("ratings.csv line 6"), "{}", rejection);

    server
        .get("/api/insights/top10-by-genre")
        .await
        .assert_json(&json!([
            { "genre": "Crime", "movie_id": 2, "title": "Heat", "avg_rating": 10.0, "n_ratings": 1 },
            { "genre": "Drama", "movie_id": 1, "title": "The Godfather", "avg_rating": 7.0, "n_ratings": 2 },
            { "genre": "Horror", "movie_id": 3, "title": "Alien", "avg_rating": 9.0, "n_ratings": 1 },
        ]));

    server
        .get("/api/insights/avg-by-age")
        .await
        .assert_json(&json!([
            { "age_range": "26-35", "avg_rating": 10.0, "n": 1 },
            { "age_range": "UNKNOWN", "avg_rating": 9.0, "n": 1 },
            { "age_range": "18-25", "avg_rating": 7.0, "n": 2 },
        ]));

    server
        .get("/api/insights/by-country")
        .await
        .assert_json(&json!([
            { "country": "BR", "n": 3 },
            { "country": "US", "n": 1 },
        ]));
}

#[tokio::test]
async fn test_pipeline_defaults_to_raw_v1() {
    let ctx = TestContext::new();
    ctx.write_phase("raw_v1", &Dataset::sample());
    let server = ctx.server();

    let response = server.post("/api/datalake/pipeline").await;
    response.assert_status_ok();
    let report: Value = response.json();
    assert_eq!(report["run"]["phase"], "raw_v1");
}

#[tokio::test]
async fn test_reformulated_headers_give_same_marts() {
    let ctx = TestContext::new();
    ctx.write_phase("raw_v1", &Dataset::sample());
    ctx.write_phase("reformulated_v3", &Dataset::sample_reformulated());
    let server = ctx.server();

    run_pipeline(&server, "raw_v1").await;
    let canonical: Value = server.get("/api/insights/top10-by-genre").await.json();

    run_pipeline(&server, "reformulated_v3").await;
    let reformulated: Value = server.get("/api/insights/top10-by-genre").await.json();

    assert_eq!(canonical, reformulated);
}

#[tokio::test]
async fn test_new_run_replaces_cached_insights() {
    let ctx = TestContext::new();
    ctx.write_phase("raw_v1", &Dataset::sample());
    ctx.write_phase("improved_v2", &Dataset::without_ratings());
    let server = ctx.server();

    run_pipeline(&server, "raw_v1").await;
    let first: Vec<Value> = server.get("/api/insights/by-country").await.json();
    assert_eq!(first.len(), 2);

    let report = run_pipeline(&server, "improved_v2").await;
    assert_eq!(report["run"]["loaded"]["ratings"], 0);

    server
        .get("/api/insights/by-country")
        .await
        .assert_json(&json!([]));
    server
        .get("/api/insights/top10-by-genre")
        .await
        .assert_json(&json!([]));
}

#[tokio::test]
async fn test_ingest_only_loads_staging() {
    let ctx = TestContext::new();
    ctx.write_phase("raw_v1", &Dataset::sample());
    let server = ctx.server();

    let response = server
        .post("/api/datalake/ingest")
        .add_query_param("phase", "raw_v1")
        .await;
    response.assert_status_ok();
    let report: Value = response.json();
    assert_eq!(report["staged"]["movies"], 4);
    assert_eq!(report["staged"]["users"], 4);
    assert_eq!(report["staged"]["ratings"], 5);

    server
        .get("/api/insights/by-country")
        .await
        .assert_json(&json!([]));
}

#[tokio::test]
async fn test_pipeline_writes_export_files() {
    let ctx = TestContext::new();
    ctx.write_phase("raw_v1", &Dataset::sample());
    let server = ctx.server();

    let report = run_pipeline(&server, "raw_v1").await;
    let files = report["export"]["files"].as_array().expect("files");
    assert_eq!(files.len(), 6);

    let dir = ctx.normalized_dir();
    let movies = std::fs::read_to_string(dir.join("dw_movies.csv")).expect("dw_movies.csv");
    assert!(movies.starts_with("id,title,year,genre,imdb_id\n"));
    assert_eq!(movies.lines().count(), 5);

    let by_country = std::fs::read_to_string(dir.join("marts").join("ratings_by_country.csv"))
        .expect("ratings_by_country.csv");
    assert_eq!(by_country, "country,n\nBR,3\nUS,1\n");

    std::fs::remove_dir_all(&dir).expect("remove export dir");
    let response = server.get("/api/export").await;
    response.assert_status_ok();
    let summary: Value = response.json();
    assert_eq!(summary["files"].as_array().map(Vec::len), Some(6));
    assert!(dir.join("dw_ratings.csv").is_file());
}

#[tokio::test]
async fn test_pipeline_and_export_rejected_while_lock_held_elsewhere() {
    let ctx = TestContext::new();
    ctx.write_phase("raw_v1", &Dataset::sample());
    let server = ctx.server();
    run_pipeline(&server, "raw_v1").await;

    // A CLI export in another process holds the lock file
    let other = pipeline::RunLock::new(
        ctx.raw_dir().join(pipeline::runner::LOCK_DIR),
        std::time::Duration::from_secs(3600),
    );
    let held = other.acquire("movieflix", "export").expect("acquire");

    for response in [
        server.post("/api/datalake/pipeline").await,
        server.get("/api/export").await,
    ] {
        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["code"], "ETL_005");
    }

    drop(held);
    run_pipeline(&server, "raw_v1").await;
    server.get("/api/export").await.assert_status_ok();
}

#[tokio::test]
async fn test_quality_metrics_after_run() {
    let ctx = TestContext::new();
    ctx.write_phase("raw_v1", &Dataset::sample());
    let server = ctx.server();

    run_pipeline(&server, "raw_v1").await;

    let metrics: Vec<Value> = server.get("/api/quality/metrics").await.json();
    let value = |name: &str| {
        metrics
            .iter()
            .find(|m| m["metric"] == name)
            .and_then(|m| m["value"].as_u64())
    };
    assert_eq!(value("ratings_out_of_range"), Some(0));
    assert_eq!(value("users_age_unknown"), Some(1));
    assert_eq!(value("movies_year_null"), Some(1));
}

#[tokio::test]
async fn test_missing_phase_is_input_error() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/api/datalake/pipeline")
        .add_query_param("phase", "raw_v9")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "ETL_001");

    let response = server
        .post("/api/datalake/ingest")
        .add_query_param("phase", "../etc")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "ETL_001");
}

#[tokio::test]
async fn test_header_mismatch_leaves_warehouse_intact() {
    let ctx = TestContext::new();
    ctx.write_phase("raw_v1", &Dataset::sample());
    let broken = Dataset {
        ratings: Dataset::sample()
            .ratings
            .replacen(RATINGS_HEADER, "user_id,movie_id,stars,created_at", 1),
        ..Dataset::sample()
    };
    ctx.write_phase("improved_v2", &broken);
    let server = ctx.server();

    run_pipeline(&server, "raw_v1").await;

    let response = server
        .post("/api/datalake/pipeline")
        .add_query_param("phase", "improved_v2")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "ETL_002");
    assert!(body["error"].as_str().unwrap_or("").contains("ratings.csv"));

    let by_country: Vec<Value> = server.get("/api/insights/by-country").await.json();
    assert_eq!(by_country.len(), 2);
}

#[tokio::test]
async fn test_empty_ratings_give_empty_marts() {
    let ctx = TestContext::new();
    ctx.write_phase("raw_v1", &Dataset::without_ratings());
    let server = ctx.server();

    let report = run_pipeline(&server, "raw_v1").await;
    assert_eq!(report["run"]["loaded"]["movies"], 4);
    assert_eq!(report["run"]["loaded"]["ratings"], 0);

    for path in [
        "/api/insights/top10-by-genre",
        "/api/insights/avg-by-age",
        "/api/insights/by-country",
    ] {
        server.get(path).await.assert_json(&json!([]));
    }

    let top = std::fs::read_to_string(
        ctx.normalized_dir()
            .join("marts")
            .join("top10_by_genre.csv"),
    )
    .expect("top10_by_genre.csv");
    assert_eq!(top, "genre,movie_id,title,avg_rating,n_ratings\n");
}
