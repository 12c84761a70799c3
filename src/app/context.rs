use std::path::PathBuf;
use std::sync::Arc;

use crate::app::{FreshetError, Result};
use crate::audit::IntegrityAuditor;
use crate::config::Config;
use crate::fetcher::{FeedFetcher, HttpFetcher};
use crate::pipeline::{BatchDriver, SyncPipeline};
use crate::policy::RefreshPolicy;
use crate::store::SqliteStore;

/// Shared application wiring: one store, one fetcher, one pipeline.
pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub pipeline: Arc<SyncPipeline>,
    pub driver: BatchDriver,
    pub auditor: IntegrityAuditor,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let db_path = match &config.db_path {
            Some(path) => path.clone(),
            None => default_db_path()?,
        };
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = Arc::new(SqliteStore::new(&db_path)?);
        Ok(Self::with_store(config, store))
    }

    /// In-memory variant for tests.
    pub fn in_memory(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        Ok(Self::with_store(config, store))
    }

    fn with_store(config: Config, store: Arc<SqliteStore>) -> Self {
        let fetcher: Arc<dyn FeedFetcher + Send + Sync> = Arc::new(HttpFetcher::new());
        let policy = RefreshPolicy::new(&config.refresh);
        let pipeline = Arc::new(SyncPipeline::new(fetcher, policy));
        let driver = BatchDriver::with_workers(pipeline.clone(), config.sync.workers);
        let auditor = IntegrityAuditor::new(&config.audit);
        Self {
            config,
            store,
            pipeline,
            driver,
            auditor,
        }
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|d| d.join("freshet").join("freshet.db"))
        .ok_or_else(|| FreshetError::Config("Could not determine data directory".to_string()))
}
