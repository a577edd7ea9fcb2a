//! End-to-end tests against a real ClickHouse server.
//!
//! Requires Docker to be running for testcontainers, or
//! `MOVIEFLIX_TEST_CLICKHOUSE_URL` pointing at a running server.

use axum::http::StatusCode;
use etl_core::WarehouseStore;
use integration_tests::fixtures::{movie_body, rating_body, Dataset};
use integration_tests::setup::ClickHouseContext;
use serde_json::{json, Value};

#[tokio::test]
async fn test_pipeline_run_through_clickhouse() {
    let ch = ClickHouseContext::new().await;
    ch.ctx.write_phase("raw_v1", &Dataset::sample());
    let server = ch.ctx.server();

    let response = server
        .post("/api/datalake/pipeline")
        .add_query_param("phase", "raw_v1")
        .await;
    response.assert_status_ok();
    let report: Value = response.json();
    assert_eq!(report["run"]["loaded"]["ratings"], 4);
    assert_eq!(report["run"]["rejected"], 1);

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

    let snapshot = ch.store.read_warehouse().await.expect("read warehouse");
    assert_eq!(snapshot.movies.len(), 4);
    assert_eq!(snapshot.users.len(), 4);
    assert!(snapshot.ratings.iter().all(|r| r.rating <= 10.0));

    let metrics: Vec<Value> = server.get("/api/quality/metrics").await.json();
    let year_null = metrics
        .iter()
        .find(|m| m["metric"] == "movies_year_null")
        .and_then(|m| m["value"].as_u64());
    assert_eq!(year_null, Some(1));

    // A rerun over the same phase gives the same marts
    server
        .post("/api/datalake/pipeline")
        .add_query_param("phase", "raw_v1")
        .await
        .assert_status_ok();
    let by_country: Vec<Value> = server.get("/api/insights/by-country").await.json();
    assert_eq!(by_country.len(), 2);

    let export = std::fs::read_to_string(
        ch.ctx
            .normalized_dir()
            .join("marts")
            .join("ratings_by_country.csv"),
    )
    .expect("ratings_by_country.csv");
    assert_eq!(export, "country,n\nBR,3\nUS,1\n");
}

#[tokio::test]
async fn test_catalog_crud_through_clickhouse() {
    let ch = ClickHouseContext::new().await;
    let server = ch.ctx.server();

    let created: Value = server
        .post("/movies")
        .json(&movie_body("Clickhouse Heat", Some(1995), Some("Crime")))
        .await
        .json();
    let id = created["id"].as_u64().expect("id");

    let second: Value = server
        .post("/movies")
        .json(&movie_body("Clickhouse Alien", Some(1979), Some("Horror")))
        .await
        .json();
    assert!(second["id"].as_u64().expect("id") > id);

    let updated: Value = server
        .put(&format!("/movies/{}", id))
        .json(&movie_body("Clickhouse Heat", Some(1995), Some("Thriller")))
        .await
        .json();
    assert_eq!(updated["genre"], "Thriller");

    let fetched: Value = server.get(&format!("/movies/{}", id)).await.json();
    assert_eq!(fetched["genre"], "Thriller");

    let response = server
        .post("/ratings")
        .json(&rating_body(id, Some(1), 7.5))
        .await;
    response.assert_status(StatusCode::CREATED);

    let ratings: Vec<Value> = server
        .get("/ratings")
        .add_query_param("movieId", id)
        .await
        .json();
    assert_eq!(ratings.len(), 1);
    assert_eq!(ratings[0]["rating"], 7.5);

    server
        .delete(&format!("/movies/{}", id))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .get(&format!("/movies/{}", id))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let ratings: Vec<Value> = server
        .get("/ratings")
        .add_query_param("movieId", id)
        .await
        .json();
    assert!(ratings.is_empty());

    let listed: Vec<Value> = server.get("/movies").await.json();
    assert!(listed.iter().all(|m| m["id"] != id));
    assert!(listed.iter().any(|m| m["id"] == second["id"]));
}
