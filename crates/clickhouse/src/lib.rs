//! ClickHouse backend for the MovieFlix pipeline and catalogue.

pub mod client;
pub mod config;
pub mod insert;
pub mod query;
pub mod schema;
pub mod store;

pub use client::*;
pub use config::*;
pub use store::ClickHouseStore;
