//! MovieFlix ETL
//!
//! Staged analytics pipeline and APIs over a movie catalogue:
//! - CSV raw zone loaded into staging, normalized into the warehouse
//! - Mart views projected by the insight API
//! - CRUD API over the application schema
//! - Normalized CSV export and an optional interval scheduler

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tokio::signal;
use tracing::{error, info, warn};

use api::{router, AppState};
use clickhouse_client::{ClickHouseClient, ClickHouseConfig, ClickHouseStore};
use etl_core::{CatalogStore, MemoryStore, Phase, WarehouseStore};
use pipeline::{EtlRunner, Exporter, PipelineConfig, RawZone, Scheduler};
use telemetry::{health, init_tracing_from_env};

/// Command line interface.
#[derive(Debug, Parser)]
#[command(name = "movieflix-etl", version, about = "MovieFlix ETL and API server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the HTTP server (default)
    Serve,
    /// Run the full pipeline for a phase, then export
    RunEtl {
        /// Raw-zone subdirectory to load
        #[arg(long, default_value = etl_core::phase::DEFAULT_PHASE)]
        phase: String,
    },
    /// Load staging only
    Ingest {
        #[arg(long, default_value = etl_core::phase::DEFAULT_PHASE)]
        phase: String,
    },
    /// Export the warehouse and marts as CSV
    Export,
}

/// Storage backend for every layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StoreKind {
    #[default]
    Clickhouse,
    Memory,
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    /// Raw zone: one subdirectory per phase
    #[serde(default = "default_data_lake_dir")]
    data_lake_dir: PathBuf,
    /// Export target
    #[serde(default = "default_normalized_dir")]
    normalized_dir: PathBuf,

    #[serde(default)]
    store: StoreKind,

    #[serde(default)]
    clickhouse: ClickHouseConfig,

    #[serde(default)]
    pipeline: PipelineConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_lake_dir() -> PathBuf {
    PathBuf::from("data_lake/raw")
}

fn default_normalized_dir() -> PathBuf {
    PathBuf::from("data_lake/normalized")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_lake_dir: default_data_lake_dir(),
            normalized_dir: default_normalized_dir(),
            store: StoreKind::default(),
            clickhouse: ClickHouseConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing_from_env();

    let cli = Cli::parse();
    let config = load_config()?;

    let (warehouse, catalog) = build_stores(&config)?;
    warehouse
        .ensure_schema()
        .await
        .context("Failed to initialize warehouse schema")?;

    let runner = Arc::new(EtlRunner::new(
        warehouse.clone(),
        RawZone::new(&config.data_lake_dir),
        Exporter::new(&config.normalized_dir),
        config.pipeline.clone(),
    ));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config, warehouse, catalog, runner).await,
        Command::RunEtl { phase } => {
            let phase = Phase::new(phase)?;
            let report = runner.run_and_export(&phase).await?;
            print_json(&report)
        }
        Command::Ingest { phase } => {
            let phase = Phase::new(phase)?;
            let report = runner.ingest(&phase).await?;
            print_json(&report)
        }
        Command::Export => {
            let summary = runner.export().await?;
            print_json(&summary)
        }
    }
}

async fn serve(
    config: &Config,
    warehouse: Arc<dyn WarehouseStore>,
    catalog: Arc<dyn CatalogStore>,
    runner: Arc<EtlRunner>,
) -> Result<()> {
    info!("Starting MovieFlix ETL v{}", env!("CARGO_PKG_VERSION"));

    // Check health and update status
    check_health(config, warehouse.as_ref()).await;

    // Optional interval runs
    let _scheduler = match Scheduler::from_config(runner.clone()) {
        Some(scheduler) => Some(scheduler.context("Invalid scheduler configuration")?.start()),
        None => None,
    };

    // Create application state
    let state = AppState::new(warehouse, catalog, runner);

    // Create router
    let app = router(state);

    // Start HTTP server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

fn build_stores(config: &Config) -> Result<(Arc<dyn WarehouseStore>, Arc<dyn CatalogStore>)> {
    match config.store {
        StoreKind::Clickhouse => {
            info!(url = %config.clickhouse.url, "Using ClickHouse store");
            let client = ClickHouseClient::new(config.clickhouse.clone())
                .context("Failed to create ClickHouse client")?;
            let store = Arc::new(ClickHouseStore::new(client));
            let warehouse: Arc<dyn WarehouseStore> = store.clone();
            let catalog: Arc<dyn CatalogStore> = store;
            Ok((warehouse, catalog))
        }
        StoreKind::Memory => {
            warn!("Using in-memory store; data is lost on exit");
            let store = Arc::new(MemoryStore::new());
            let warehouse: Arc<dyn WarehouseStore> = store.clone();
            let catalog: Arc<dyn CatalogStore> = store;
            Ok((warehouse, catalog))
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
    println!("{}", out);
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .prefix("MOVIEFLIX")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Single-underscore aliases for the nested ClickHouse settings
    if let Ok(url) = std::env::var("MOVIEFLIX_CLICKHOUSE_URL") {
        config.clickhouse.url = url;
    }
    if let Ok(username) = std::env::var("MOVIEFLIX_CLICKHOUSE_USERNAME") {
        config.clickhouse.username = Some(username);
    }
    if let Ok(password) = std::env::var("MOVIEFLIX_CLICKHOUSE_PASSWORD") {
        config.clickhouse.password = Some(password);
    }

    Ok(config)
}

/// Check component health on startup.
async fn check_health(config: &Config, warehouse: &dyn WarehouseStore) {
    match warehouse.ping().await {
        Ok(()) => {
            health().warehouse.set_healthy();
            info!(backend = warehouse.backend(), "Warehouse connection: healthy");
        }
        Err(e) => {
            health().warehouse.set_unhealthy(e.to_string());
            error!(backend = warehouse.backend(), "Warehouse connection: unhealthy: {}", e);
        }
    }

    if config.data_lake_dir.is_dir() {
        health().data_lake.set_healthy();
        info!(dir = %config.data_lake_dir.display(), "Raw zone: available");
    } else {
        health()
            .data_lake
            .set_unhealthy(format!("{} not found", config.data_lake_dir.display()));
        warn!(dir = %config.data_lake_dir.display(), "Raw zone: missing");
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
