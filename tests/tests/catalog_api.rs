//! CRUD API tests over the in-memory store.

use axum::http::StatusCode;
use integration_tests::fixtures::{movie_body, rating_body};
use integration_tests::setup::TestContext;
use serde_json::{json, Value};

#[tokio::test]
async fn test_movie_lifecycle() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/movies")
        .json(&movie_body("  Heat ", Some(1995), Some("Crime")))
        .await;
    response.assert_status(StatusCode::CREATED);
    let created: Value = response.json();
    let id = created["id"].as_u64().expect("id");
    assert_eq!(created["title"], "Heat");
    assert_eq!(created["year"], 1995);

    let fetched: Value = server.get(&format!("/movies/{}", id)).await.json();
    assert_eq!(fetched, created);

    let response = server
        .put(&format!("/movies/{}", id))
        .json(&movie_body("Heat", Some(1995), Some("Thriller")))
        .await;
    response.assert_status_ok();
    let updated: Value = response.json();
    assert_eq!(updated["genre"], "Thriller");

    let listed: Vec<Value> = server.get("/movies").await.json();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["genre"], "Thriller");

    server
        .delete(&format!("/movies/{}", id))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .get(&format!("/movies/{}", id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_movie_without_title_is_rejected() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.post("/movies").json(&json!({ "year": 1999 })).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALID_002");

    let response = server
        .post("/movies")
        .json(&movie_body("   ", None, None))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let listed: Vec<Value> = server.get("/movies").await.json();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/movies")
        .text("{not json")
        .content_type("application/json")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALID_001");

    let response = server.get("/movies/abc").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_movie_is_not_found() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.get("/movies/42").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["code"], "NOT_FOUND_001");

    server
        .put("/movies/42")
        .json(&movie_body("Ghost", None, None))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .delete("/movies/42")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_validates_before_lookup() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .put("/movies/42")
        .json(&json!({ "title": "Ghost", "year": 1500 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ratings_create_and_filter() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let heat: Value = server
        .post("/movies")
        .json(&movie_body("Heat", Some(1995), Some("Crime")))
        .await
        .json();
    let alien: Value = server
        .post("/movies")
        .json(&movie_body("Alien", Some(1979), Some("Horror")))
        .await
        .json();
    let heat_id = heat["id"].as_u64().expect("id");
    let alien_id = alien["id"].as_u64().expect("id");

    let response = server
        .post("/ratings")
        .json(&rating_body(heat_id, Some(7), 8.26))
        .await;
    response.assert_status(StatusCode::CREATED);
    let rating: Value = response.json();
    assert_eq!(rating["movieId"], heat_id);
    assert_eq!(rating["rating"], 8.3);
    assert!(rating["createdAt"].is_string());

    server
        .post("/ratings")
        .json(&rating_body(alien_id, None, 9.0))
        .await
        .assert_status(StatusCode::CREATED);

    let all: Vec<Value> = server.get("/ratings").await.json();
    assert_eq!(all.len(), 2);

    let filtered: Vec<Value> = server
        .get("/ratings")
        .add_query_param("movieId", alien_id)
        .await
        .json();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0]["movieId"], alien_id);

    let id = rating["id"].as_u64().expect("id");
    let fetched: Value = server.get(&format!("/ratings/{}", id)).await.json();
    assert_eq!(fetched, rating);
}

#[tokio::test]
async fn test_rating_validation() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/ratings")
        .json(&rating_body(99, None, 5.0))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let movie: Value = server
        .post("/movies")
        .json(&movie_body("Heat", None, None))
        .await
        .json();
    let id = movie["id"].as_u64().expect("id");

    for rating in [-0.5, 10.5] {
        let response = server
            .post("/ratings")
            .json(&rating_body(id, None, rating))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["code"], "VALID_002");
    }

    let response = server.post("/ratings").json(&json!({ "rating": 5.0 })).await;
    response.assert_status(StatusCode::BAD_REQUEST);

    server
        .get("/ratings/1")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_movie_removes_its_ratings() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let movie: Value = server
        .post("/movies")
        .json(&movie_body("Heat", None, None))
        .await
        .json();
    let id = movie["id"].as_u64().expect("id");
    server
        .post("/ratings")
        .json(&rating_body(id, Some(1), 7.0))
        .await
        .assert_status(StatusCode::CREATED);

    server
        .delete(&format!("/movies/{}", id))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let ratings: Vec<Value> = server.get("/ratings").await.json();
    assert!(ratings.is_empty());
}

#[tokio::test]
async fn test_catalog_is_independent_of_pipeline_runs() {
    let ctx = TestContext::new();
    let server = ctx.server();

    server
        .post("/movies")
        .json(&movie_body("Heat", None, None))
        .await
        .assert_status(StatusCode::CREATED);

    ctx.write_phase("raw_v1", &integration_tests::fixtures::Dataset::sample());
    server
        .post("/api/datalake/pipeline")
        .await
        .assert_status_ok();

    let listed: Vec<Value> = server.get("/movies").await.json();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["title"], "Heat");
}
