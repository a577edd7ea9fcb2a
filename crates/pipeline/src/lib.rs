//! ETL pipeline for MovieFlix.
//!
//! Stages, strictly sequential within a run:
//! 1. Extract: locate and parse the three raw CSVs of a phase
//! 2. Stage: truncate and load staging
//! 3. Warehouse: build under the violation policy, swap in
//! 4. Marts: (re)define the views
//!
//! Exports and the interval scheduler sit on top of the runner.

pub mod config;
pub mod export;
pub mod extract;
pub mod lock;
pub mod raw_zone;
pub mod runner;
pub mod scheduler;

pub use config::PipelineConfig;
pub use export::{ExportData, ExportSummary, ExportedFile, Exporter};
pub use lock::{RunGuard, RunLock};
pub use raw_zone::{PhaseFiles, RawZone};
pub use runner::{EtlRunner, IngestReport, PipelineReport, RunReport, Stage};
pub use scheduler::Scheduler;
