//! Pipeline endpoints: staging loads, full runs, exports and quality counters.

use axum::{extract::State, Json};
use etl_core::{Phase, QualityMetric};
use pipeline::{ExportSummary, IngestReport, PipelineReport};
use serde::Deserialize;
use tracing::info;

use crate::extractors::QueryParams;
use crate::response::ApiError;
use crate::state::AppState;

/// `?phase=` parameter; defaults to `raw_v1`.
#[derive(Debug, Default, Deserialize)]
pub struct PhaseParams {
    pub phase: Option<String>,
}

impl PhaseParams {
    pub fn phase(self) -> Result<Phase, ApiError> {
        match self.phase.as_deref().map(str::trim) {
            None | Some("") => Ok(Phase::default()),
            Some(label) => Ok(Phase::new(label)?),
        }
    }
}

/// POST /api/datalake/ingest - Load staging only.
pub async fn ingest_handler(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<PhaseParams>,
) -> Result<Json<IngestReport>, ApiError> {
    let phase = params.phase()?;
    info!(phase = %phase, "Ingest requested");

    let report = state.runner.ingest(&phase).await?;
    Ok(Json(report))
}

/// POST /api/datalake/pipeline - Full run, then export.
pub async fn pipeline_handler(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<PhaseParams>,
) -> Result<Json<PipelineReport>, ApiError> {
    let phase = params.phase()?;
    info!(phase = %phase, "Pipeline run requested");

    let report = state.runner.run_and_export(&phase).await?;
    state.insights.invalidate_all();
    Ok(Json(report))
}

/// GET /api/export - Export the current warehouse and marts.
pub async fn export_handler(
    State(state): State<AppState>,
) -> Result<Json<ExportSummary>, ApiError> {
    let summary = state.runner.export().await?;
    Ok(Json(summary))
}

/// GET /api/quality/metrics - Data-quality counters over the warehouse.
pub async fn quality_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<QualityMetric>>, ApiError> {
    let metrics = state.warehouse.quality_metrics().await?;
    Ok(Json(metrics))
}
