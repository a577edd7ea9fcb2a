//! Common test setup functions.

use api::{router, AppState};
use axum::Router;
use axum_test::TestServer;
use clickhouse_client::{ClickHouseClient, ClickHouseConfig, ClickHouseStore};
use etl_core::{CatalogStore, MemoryStore, ViolationPolicy, WarehouseStore};
use pipeline::{EtlRunner, Exporter, PipelineConfig, RawZone};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use crate::containers::TestContainers;
use crate::fixtures::Dataset;
use crate::mocks::FailingStore;

/// Test context over a given store.
///
/// Uses the real router, runner and exporter; the raw zone and export
/// directory live in a temporary directory removed on drop.
pub struct TestContext {
    pub dir: TempDir,
    pub warehouse: Arc<dyn WarehouseStore>,
    pub catalog: Arc<dyn CatalogStore>,
    pub runner: Arc<EtlRunner>,
    pub router: Router,
}

impl TestContext {
    /// In-memory store, skip policy.
    pub fn new() -> Self {
        Self::with_policy(ViolationPolicy::Skip)
    }

    pub fn with_policy(policy: ViolationPolicy) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::with_stores(store.clone(), store, policy)
    }

    /// Every store call fails.
    pub fn failing() -> Self {
        let store = Arc::new(FailingStore::new());
        Self::with_stores(store.clone(), store, ViolationPolicy::Skip)
    }

    pub fn with_stores(
        warehouse: Arc<dyn WarehouseStore>,
        catalog: Arc<dyn CatalogStore>,
        policy: ViolationPolicy,
    ) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let raw_dir = dir.path().join("raw");
        std::fs::create_dir_all(&raw_dir).expect("Failed to create raw zone");

        let config = PipelineConfig {
            violation_policy: policy,
            ..PipelineConfig::default()
        };
        let runner = Arc::new(EtlRunner::new(
            warehouse.clone(),
            RawZone::new(raw_dir),
            Exporter::new(dir.path().join("normalized")),
            config,
        ));

        let state = AppState::new(warehouse.clone(), catalog.clone(), runner.clone());
        let router = router(state);

        Self {
            dir,
            warehouse,
            catalog,
            runner,
            router,
        }
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.dir.path().join("raw")
    }

    pub fn normalized_dir(&self) -> PathBuf {
        self.dir.path().join("normalized")
    }

    /// Writes a dataset into the raw zone under `phase`.
    pub fn write_phase(&self, phase: &str, dataset: &Dataset) {
        dataset.write(&self.raw_dir(), phase);
    }

    pub fn server(&self) -> TestServer {
        TestServer::new(self.router.clone()).expect("Failed to create test server")
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Test context backed by a real ClickHouse.
pub struct ClickHouseContext {
    pub containers: TestContainers,
    pub store: Arc<ClickHouseStore>,
    pub ctx: TestContext,
}

impl ClickHouseContext {
    /// Starts (or connects to) ClickHouse and creates every schema.
    pub async fn new() -> Self {
        let containers = TestContainers::start().await;

        let config = ClickHouseConfig {
            url: containers.clickhouse_url.clone(),
            database: containers.clickhouse_database.clone(),
            username: containers.clickhouse_username.clone(),
            password: containers.clickhouse_password.clone(),
            timeout_secs: 30,
        };
        let client = ClickHouseClient::new(config).expect("Failed to create ClickHouse client");
        let store = Arc::new(ClickHouseStore::new(client));

        store
            .ensure_schema()
            .await
            .expect("Failed to initialize schema");

        let ctx = TestContext::with_stores(store.clone(), store.clone(), ViolationPolicy::Skip);
        Self {
            containers,
            store,
            ctx,
        }
    }
}
