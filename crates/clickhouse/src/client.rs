//! ClickHouse client wrapper.

use crate::config::ClickHouseConfig;
use clickhouse::{Client, Row};
use etl_core::{Error, Result};
use serde::Serialize;
use std::time::Instant;
use telemetry::metrics;
use tracing::{debug, info};

/// ClickHouse client wrapper that records store metrics.
#[derive(Clone)]
pub struct ClickHouseClient {
    inner: Client,
    config: ClickHouseConfig,
}

impl ClickHouseClient {
    /// Creates a new ClickHouse client.
    pub fn new(config: ClickHouseConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(Error::validation("clickhouse.url is empty"));
        }

        let mut client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database)
            .with_option("max_execution_time", config.timeout_secs.to_string());

        if let Some(ref user) = config.username {
            client = client.with_user(user);
        }

        if let Some(ref pass) = config.password {
            client = client.with_password(pass);
        }

        info!(
            url = %config.url,
            database = %config.database,
            "Created ClickHouse client"
        );

        Ok(Self {
            inner: client,
            config,
        })
    }

    /// Returns the inner clickhouse client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }

    /// Runs a statement without result rows.
    pub async fn execute(&self, sql: &str) -> Result<()> {
        let start = Instant::now();
        let res = self.inner.query(sql).execute().await;
        observe(start, res, "execute")
    }

    /// Writes rows into `table` in one INSERT.
    pub async fn insert_rows<T>(&self, table: &str, rows: &[T]) -> Result<usize>
    where
        T: Row + Serialize,
    {
        if rows.is_empty() {
            return Ok(0);
        }

        let start = Instant::now();
        let mut insert = self
            .inner
            .insert::<T>(table)
            .map_err(|e| store_error("insert", e))?;
        for row in rows {
            insert
                .write(row)
                .await
                .map_err(|e| store_error("write", e))?;
        }
        let res = insert.end().await;
        observe(start, res, "insert")?;

        debug!(table = table, count = rows.len(), "Inserted rows");
        Ok(rows.len())
    }
}

/// Maps a driver error to a storage error and counts it.
pub fn store_error(op: &str, err: clickhouse::error::Error) -> Error {
    metrics().store_errors.inc();
    Error::store(format!("ClickHouse {} failed: {}", op, err))
}

/// Records latency and maps the error of a finished driver call.
pub fn observe<T>(
    start: Instant,
    res: std::result::Result<T, clickhouse::error::Error>,
    op: &str,
) -> Result<T> {
    metrics().store_queries.inc();
    metrics()
        .store_latency_ms
        .observe(start.elapsed().as_millis() as u64);
    res.map_err(|e| store_error(op, e))
}
