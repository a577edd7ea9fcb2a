//! ETL runner: extract → staging → warehouse → marts.

use chrono::{DateTime, Utc};
use etl_core::{
    build_warehouse, Error, Phase, Result, StagingBatch, StagingCounts, ViolationPolicy,
    WarehouseBuild, WarehouseCounts, WarehouseStore,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use telemetry::metrics;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::export::{ExportData, ExportSummary, Exporter};
use crate::extract::extract;
use crate::lock::{RunGuard, RunLock};
use crate::raw_zone::RawZone;

/// Rejections listed in a report; the counts cover all of them.
pub const MAX_REPORTED_REJECTIONS: usize = 100;

/// Directory under the data lake holding run lock files.
pub const LOCK_DIR: &str = ".locks";

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    LoadStaging,
    BuildWarehouse,
    DefineMarts,
    Export,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::LoadStaging => "load_staging",
            Stage::BuildWarehouse => "build_warehouse",
            Stage::DefineMarts => "define_marts",
            Stage::Export => "export",
        }
    }
}

/// Outcome of a staging-only load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub run_id: Uuid,
    pub phase: Phase,
    pub staged: StagingCounts,
    pub duration_ms: u64,
}

/// Outcome of a full run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub phase: Phase,
    pub policy: ViolationPolicy,
    pub staged: StagingCounts,
    pub loaded: WarehouseCounts,
    pub rejected: usize,
    pub clamped: usize,
    pub rejections: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// A full run followed by an export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run: RunReport,
    pub export: ExportSummary,
}

/// Runs the pipeline against a [`WarehouseStore`].
pub struct EtlRunner {
    store: Arc<dyn WarehouseStore>,
    raw_zone: RawZone,
    exporter: Exporter,
    config: PipelineConfig,
    lock: RunLock,
    /// Bumped after every successful load; readers caching mart output key on it.
    generation: AtomicU64,
}

impl EtlRunner {
    pub fn new(
        store: Arc<dyn WarehouseStore>,
        raw_zone: RawZone,
        exporter: Exporter,
        config: PipelineConfig,
    ) -> Self {
        let lock = RunLock::new(raw_zone.root().join(LOCK_DIR), config.lock_ttl());
        Self {
            store,
            raw_zone,
            exporter,
            config,
            lock,
            generation: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<dyn WarehouseStore> {
        &self.store
    }

    pub fn raw_zone(&self) -> &RawZone {
        &self.raw_zone
    }

    pub fn exporter(&self) -> &Exporter {
        &self.exporter
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// True while a run, ingest or export holds the lock in this process.
    pub fn is_running(&self) -> bool {
        self.lock.is_held(&self.config.name)
    }

    fn acquire(&self, operation: &str) -> Result<RunGuard> {
        self.lock.acquire(&self.config.name, operation).map_err(|e| {
            if e.error_code() == Some("ETL_005") {
                metrics().runs_rejected_in_progress.inc();
                warn!(pipeline = %self.config.name, "Run rejected, another run is in progress");
            }
            e
        })
    }

    async fn stage<T, F>(&self, stage: Stage, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let result = fut
            .instrument(info_span!("pipeline_stage", stage = stage.name()))
            .await;
        let elapsed = start.elapsed().as_millis() as u64;
        metrics().stage_latency_ms.observe(elapsed);

        match &result {
            Ok(_) => debug!(stage = stage.name(), duration_ms = elapsed, "Stage completed"),
            Err(e) => error!(stage = stage.name(), error = %e, "Stage failed"),
        }
        result
    }

    /// Locates and parses a phase off the async runtime.
    async fn extract(&self, phase: &Phase) -> Result<StagingBatch> {
        let files = self.raw_zone.locate(phase)?;
        tokio::task::spawn_blocking(move || extract(&files))
            .await
            .map_err(|e| Error::internal(format!("extract task failed: {}", e)))?
    }

    /// Loads staging only.
    pub async fn ingest(&self, phase: &Phase) -> Result<IngestReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_ingest", run_id = %run_id, phase = %phase);
        self.ingest_inner(run_id, phase).instrument(span).await
    }

    async fn ingest_inner(&self, run_id: Uuid, phase: &Phase) -> Result<IngestReport> {
        let start = Instant::now();
        let _guard = self.acquire("ingest")?;

        let batch = self.stage(Stage::Extract, self.extract(phase)).await?;
        let staged = self
            .stage(Stage::LoadStaging, self.store.replace_staging(&batch))
            .await?;
        metrics().rows_staged.inc_by(staged.total() as u64);

        let report = IngestReport {
            run_id,
            phase: phase.clone(),
            staged,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            movies = staged.movies,
            users = staged.users,
            ratings = staged.ratings,
            duration_ms = report.duration_ms,
            "Staging loaded"
        );
        Ok(report)
    }

    /// Executes a full run.
    ///
    /// Input errors fail before staging is touched. Under the abort policy
    /// a violation fails before the warehouse is replaced.
    pub async fn run(&self, phase: &Phase) -> Result<RunReport> {
        let guard = self.acquire("run")?;
        self.run_locked(&guard, phase).await
    }

    async fn run_locked(&self, guard: &RunGuard, phase: &Phase) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "pipeline_run",
            run_id = %run_id,
            phase = %phase,
            pipeline = %self.config.name
        );
        self.run_inner(guard, run_id, phase).instrument(span).await
    }

    async fn run_inner(
        &self,
        guard: &RunGuard,
        run_id: Uuid,
        phase: &Phase,
    ) -> Result<RunReport> {
        let m = metrics();
        m.runs_started.inc();
        m.run_active.inc();

        let started_at = Utc::now();
        let start = Instant::now();
        info!(policy = %self.config.violation_policy, "Pipeline run started");

        let result = self.execute(guard, run_id, phase, started_at, start).await;

        let elapsed = start.elapsed().as_millis() as u64;
        m.run_active.dec();
        m.run_latency_ms.observe(elapsed);
        match &result {
            Ok(report) => {
                m.runs_succeeded.inc();
                m.last_run_finished_at
                    .set(Utc::now().timestamp().max(0) as u64);
                info!(
                    loaded_ratings = report.loaded.ratings,
                    rejected = report.rejected,
                    clamped = report.clamped,
                    duration_ms = elapsed,
                    "Pipeline run completed"
                );
            }
            Err(e) => {
                m.runs_failed.inc();
                error!(error = %e, duration_ms = elapsed, "Pipeline run failed");
            }
        }
        result
    }

    async fn execute(
        &self,
        guard: &RunGuard,
        run_id: Uuid,
        phase: &Phase,
        started_at: DateTime<Utc>,
        start: Instant,
    ) -> Result<RunReport> {
        let m = metrics();
        let policy = self.config.violation_policy;

        let batch = self.stage(Stage::Extract, self.extract(phase)).await?;
        let staged = self
            .stage(Stage::LoadStaging, self.store.replace_staging(&batch))
            .await?;
        m.rows_staged.inc_by(staged.total() as u64);
        drop(batch);
        guard.refresh()?;

        let (loaded, build) = self
            .stage(Stage::BuildWarehouse, self.build(policy))
            .await?;
        m.rows_loaded.inc_by(loaded.total() as u64);
        m.rows_rejected.inc_by(build.rejected() as u64);
        m.rows_clamped.inc_by(build.clamped() as u64);
        guard.refresh()?;

        self.stage(Stage::DefineMarts, self.store.define_marts())
            .await?;
        self.generation.fetch_add(1, Ordering::AcqRel);

        Ok(RunReport {
            run_id,
            phase: phase.clone(),
            policy,
            staged,
            loaded,
            rejected: build.rejected(),
            clamped: build.clamped(),
            rejections: build
                .rejections
                .iter()
                .take(MAX_REPORTED_REJECTIONS)
                .map(ToString::to_string)
                .collect(),
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Builds from staging and swaps the result in.
    async fn build(&self, policy: ViolationPolicy) -> Result<(WarehouseCounts, WarehouseBuild)> {
        let staging = self.store.read_staging().await?;
        let build = build_warehouse(&staging, policy)?;
        let loaded = self.store.replace_warehouse(&build.snapshot).await?;
        Ok((loaded, build))
    }

    /// Exports the current warehouse and marts under the run lock, so a
    /// concurrent run cannot swap tables between the reads.
    pub async fn export(&self) -> Result<ExportSummary> {
        let _guard = self.acquire("export")?;
        self.export_locked().await
    }

    async fn export_locked(&self) -> Result<ExportSummary> {
        self.stage(Stage::Export, self.write_export()).await
    }

    async fn write_export(&self) -> Result<ExportSummary> {
        let data = ExportData {
            snapshot: self.store.read_warehouse().await?,
            top_by_genre: self.store.top_by_genre().await?,
            avg_by_age: self.store.avg_by_age().await?,
            ratings_by_country: self.store.ratings_by_country().await?,
        };
        let exporter = self.exporter.clone();
        tokio::task::spawn_blocking(move || exporter.write(&data))
            .await
            .map_err(|e| Error::internal(format!("export task failed: {}", e)))?
    }

    /// Full run, then export, holding the lock across both.
    pub async fn run_and_export(&self, phase: &Phase) -> Result<PipelineReport> {
        let guard = self.acquire("run")?;
        let run = self.run_locked(&guard, phase).await?;
        let export = self.export_locked().await?;
        Ok(PipelineReport { run, export })
    }
}
