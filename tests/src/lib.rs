//! Shared helpers for the MovieFlix integration tests.
//!
//! The HTTP tests run against the in-memory store; `clickhouse_e2e`
//! needs Docker (or `MOVIEFLIX_TEST_CLICKHOUSE_URL`).

pub mod containers;
pub mod fixtures;
pub mod mocks;
pub mod setup;
