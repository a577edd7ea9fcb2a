//! Pipeline configuration (the `pipeline.*` settings).

use etl_core::phase::DEFAULT_PHASE;
use etl_core::ViolationPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name; one run at a time per name
    #[serde(default = "default_name")]
    pub name: String,
    /// What to do with rows violating a warehouse constraint
    #[serde(default)]
    pub violation_policy: ViolationPolicy,
    /// Age after which a lock file is considered abandoned
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,
    /// Interval between scheduled runs; 0 disables the scheduler
    #[serde(default)]
    pub schedule_interval_secs: u64,
    /// Phase processed by scheduled runs
    #[serde(default = "default_schedule_phase")]
    pub schedule_phase: String,
}

fn default_name() -> String {
    "movieflix".to_string()
}

fn default_lock_ttl_secs() -> u64 {
    3600
}

fn default_schedule_phase() -> String {
    DEFAULT_PHASE.to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            violation_policy: ViolationPolicy::default(),
            lock_ttl_secs: default_lock_ttl_secs(),
            schedule_interval_secs: 0,
            schedule_phase: default_schedule_phase(),
        }
    }
}

impl PipelineConfig {
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    /// Scheduler period, if scheduling is enabled.
    pub fn schedule_interval(&self) -> Option<Duration> {
        (self.schedule_interval_secs > 0).then(|| Duration::from_secs(self.schedule_interval_secs))
    }
}
