//! Rating endpoints: create and read.

use axum::{extract::State, http::StatusCode, Json};
use etl_core::{Rating, RatingInput};
use serde::Deserialize;
use telemetry::metrics;
use tracing::debug;

use crate::extractors::{JsonBody, PathParam, QueryParams};
use crate::response::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingsQuery {
    pub movie_id: Option<u64>,
}

/// GET /ratings[?movieId=N]
pub async fn list_handler(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<RatingsQuery>,
) -> Result<Json<Vec<Rating>>, ApiError> {
    Ok(Json(state.catalog.list_ratings(query.movie_id).await?))
}

/// GET /ratings/:id
pub async fn get_handler(
    State(state): State<AppState>,
    PathParam(id): PathParam<u64>,
) -> Result<Json<Rating>, ApiError> {
    state
        .catalog
        .get_rating(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("rating {} not found", id)))
}

/// POST /ratings - The referenced movie must exist.
pub async fn create_handler(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<RatingInput>,
) -> Result<(StatusCode, Json<Rating>), ApiError> {
    let rating = state.catalog.create_rating(input.into_new()?).await?;
    metrics().catalog_writes.inc();

    debug!(id = rating.id, movie_id = rating.movie_id, "Rating created");
    Ok((StatusCode::CREATED, Json(rating)))
}
