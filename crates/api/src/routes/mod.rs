//! API routes.

pub mod datalake;
pub mod health;
pub mod insights;
pub mod metrics;
pub mod movies;
pub mod ratings;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Creates the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Insights
        .route("/api/insights/top10-by-genre", get(insights::top_by_genre_handler))
        .route("/api/insights/avg-by-age", get(insights::avg_by_age_handler))
        .route("/api/insights/by-country", get(insights::by_country_handler))
        // Data lake and pipeline
        .route("/api/datalake/ingest", post(datalake::ingest_handler))
        .route("/api/datalake/pipeline", post(datalake::pipeline_handler))
        .route("/api/export", get(datalake::export_handler))
        .route("/api/quality/metrics", get(datalake::quality_handler))
        // Catalogue
        .route(
            "/movies",
            get(movies::list_handler).post(movies::create_handler),
        )
        .route(
            "/movies/:id",
            get(movies::get_handler)
                .put(movies::update_handler)
                .delete(movies::delete_handler),
        )
        .route(
            "/ratings",
            get(ratings::list_handler).post(ratings::create_handler),
        )
        .route("/ratings/:id", get(ratings::get_handler))
        // Operations
        .route("/health", get(health::health_handler))
        .route("/api/health", get(health::health_handler))
        .route("/health/ready", get(health::ready_handler))
        .route("/health/live", get(health::live_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(state)
}
