//! Interval trigger for pipeline runs.

use etl_core::Phase;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::runner::EtlRunner;

/// Runs the pipeline (and export) on a fixed period.
pub struct Scheduler {
    runner: Arc<EtlRunner>,
    phase: Phase,
    period: Duration,
}

impl Scheduler {
    pub fn new(runner: Arc<EtlRunner>, phase: Phase, period: Duration) -> Self {
        Self {
            runner,
            phase,
            period,
        }
    }

    /// Builds a scheduler from the runner's config, if one is enabled.
    pub fn from_config(runner: Arc<EtlRunner>) -> Option<etl_core::Result<Self>> {
        let period = runner.config().schedule_interval()?;
        Some(
            Phase::new(runner.config().schedule_phase.clone())
                .map(|phase| Self::new(runner, phase, period)),
        )
    }

    /// Spawns the loop. The first run fires one period after start.
    pub fn start(self) -> JoinHandle<()> {
        info!(
            phase = %self.phase,
            period_secs = self.period.as_secs(),
            "Pipeline scheduler started"
        );
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if self.runner.is_running() {
                warn!(phase = %self.phase, "Skipping scheduled run, previous run still active");
                continue;
            }
            match self.runner.run_and_export(&self.phase).await {
                Ok(report) => info!(
                    run_id = %report.run.run_id,
                    loaded_ratings = report.run.loaded.ratings,
                    "Scheduled run completed"
                ),
                Err(e) => error!("Scheduled run failed: {}", e),
            }
        }
    }
}
