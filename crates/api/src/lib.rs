//! HTTP API for MovieFlix.
//!
//! - Insight endpoints project the mart views as JSON
//! - Pipeline endpoints trigger staging loads, full runs and exports
//! - Catalogue endpoints expose CRUD over movies and ratings
//! - Health and metrics endpoints report process state

pub mod extractors;
pub mod response;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::{AppState, InsightCache};
