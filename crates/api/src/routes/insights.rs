//! Insight endpoints: the mart views as JSON arrays.
//!
//! Rows are cached per runner generation, so a run completed in this
//! process is visible on the next request.

use axum::{extract::State, Json};
use etl_core::{AvgByAgeRow, RatingsByCountryRow, TopByGenreRow};
use std::sync::Arc;
use telemetry::metrics;
use tracing::debug;

use crate::response::ApiError;
use crate::state::AppState;

/// GET /api/insights/top10-by-genre
pub async fn top_by_genre_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<TopByGenreRow>>, ApiError> {
    metrics().insight_requests.inc();
    let generation = state.runner.generation();

    if let Some(rows) = state.insights.top_by_genre.get(&generation).await {
        metrics().insight_cache_hits.inc();
        return Ok(Json(rows.as_ref().clone()));
    }

    let rows = Arc::new(state.warehouse.top_by_genre().await?);
    debug!(rows = rows.len(), generation = generation, "Top by genre loaded");
    state
        .insights
        .top_by_genre
        .insert(generation, rows.clone())
        .await;
    Ok(Json(rows.as_ref().clone()))
}

/// GET /api/insights/avg-by-age
pub async fn avg_by_age_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<AvgByAgeRow>>, ApiError> {
    metrics().insight_requests.inc();
    let generation = state.runner.generation();

    if let Some(rows) = state.insights.avg_by_age.get(&generation).await {
        metrics().insight_cache_hits.inc();
        return Ok(Json(rows.as_ref().clone()));
    }

    let rows = Arc::new(state.warehouse.avg_by_age().await?);
    state
        .insights
        .avg_by_age
        .insert(generation, rows.clone())
        .await;
    Ok(Json(rows.as_ref().clone()))
}

/// GET /api/insights/by-country
pub async fn by_country_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<RatingsByCountryRow>>, ApiError> {
    metrics().insight_requests.inc();
    let generation = state.runner.generation();

    if let Some(rows) = state.insights.ratings_by_country.get(&generation).await {
        metrics().insight_cache_hits.inc();
        return Ok(Json(rows.as_ref().clone()));
    }

    let rows = Arc::new(state.warehouse.ratings_by_country().await?);
    state
        .insights
        .ratings_by_country
        .insert(generation, rows.clone())
        .await;
    Ok(Json(rows.as_ref().clone()))
}
