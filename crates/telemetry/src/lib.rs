//! Telemetry for the MovieFlix pipeline.
//!
//! Metrics are kept in-process and exposed through `GET /metrics`; health
//! is aggregated from the warehouse backend and the raw-zone directory.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
