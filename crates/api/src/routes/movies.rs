//! Movie CRUD endpoints.

use axum::{extract::State, http::StatusCode, Json};
use etl_core::{Movie, MovieInput};
use telemetry::metrics;
use tracing::info;

use crate::extractors::{JsonBody, PathParam};
use crate::response::ApiError;
use crate::state::AppState;

/// GET /movies
pub async fn list_handler(State(state): State<AppState>) -> Result<Json<Vec<Movie>>, ApiError> {
    Ok(Json(state.catalog.list_movies().await?))
}

/// GET /movies/:id
pub async fn get_handler(
    State(state): State<AppState>,
    PathParam(id): PathParam<u64>,
) -> Result<Json<Movie>, ApiError> {
    state
        .catalog
        .get_movie(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("movie {} not found", id)))
}

/// POST /movies
pub async fn create_handler(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<MovieInput>,
) -> Result<(StatusCode, Json<Movie>), ApiError> {
    let movie = state.catalog.create_movie(input.into_new()?).await?;
    metrics().catalog_writes.inc();

    info!(id = movie.id, title = %movie.title, "Movie created");
    Ok((StatusCode::CREATED, Json(movie)))
}

/// PUT /movies/:id - Replaces every field.
pub async fn update_handler(
    State(state): State<AppState>,
    PathParam(id): PathParam<u64>,
    JsonBody(input): JsonBody<MovieInput>,
) -> Result<Json<Movie>, ApiError> {
    let new = input.into_new()?;
    let movie = state
        .catalog
        .update_movie(id, new)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("movie {} not found", id)))?;
    metrics().catalog_writes.inc();
    Ok(Json(movie))
}

/// DELETE /movies/:id - Also removes the movie's ratings.
pub async fn delete_handler(
    State(state): State<AppState>,
    PathParam(id): PathParam<u64>,
) -> Result<StatusCode, ApiError> {
    if !state.catalog.delete_movie(id).await? {
        return Err(ApiError::not_found(format!("movie {} not found", id)));
    }
    metrics().catalog_writes.inc();

    info!(id = id, "Movie deleted");
    Ok(StatusCode::NO_CONTENT)
}
