//! Wiring: config → store, fetcher, loader and worker pool.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use district_core::memory::MemoryLimits;
use district_core::units::format_bytes;
use district_core::{DistrictsConfig, RegionConfig};
use district_runtime::WorkerFactory;
use districtgrid_loader::TopologyLoader;
use districtgrid_scheduler::{WorkerPool, WorkerPoolConfig};
use districtgrid_topology::{RegionData, RegionFetcher, SourceStore};

/// Per-request timeout for remote object fetches.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct App {
    pub regions: Vec<RegionConfig>,
    pub loader: Arc<TopologyLoader>,
    pub pool: WorkerPool,
}

impl App {
    pub fn from_config_file(path: &Path) -> anyhow::Result<Self> {
        let config = DistrictsConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        Self::from_config(&config)
    }

    pub fn from_config(config: &DistrictsConfig) -> anyhow::Result<Self> {
        let pool_config = WorkerPoolConfig::from_config(config)?;
        let (initial_backoff, max_backoff) = config.backoff()?;
        let cache_dir = config.cache_dir();

        let limits = MemoryLimits::detect();
        info!(
            host = %limits.host_bytes.map(format_bytes).unwrap_or_else(|| "unknown".into()),
            cgroup = %limits.cgroup_bytes.map(format_bytes).unwrap_or_else(|| "none".into()),
            max_worker_cache = %format_bytes(pool_config.max_worker_cache_size),
            workers = pool_config.num_workers,
            cache_dir = %cache_dir.display(),
            "configuration loaded"
        );

        let store = Arc::new(SourceStore::new(REQUEST_TIMEOUT).context("failed to build object store")?);
        let fetcher = Arc::new(RegionFetcher::new(store, cache_dir));
        let loader = Arc::new(TopologyLoader::new(fetcher.clone(), initial_backoff, max_backoff));
        let factory = WorkerFactory::new(fetcher, pool_config.max_worker_cache_size)?;
        let pool = WorkerPool::new(pool_config, factory)?;

        Ok(Self {
            regions: config.region_configs(),
            loader,
            pool,
        })
    }

    pub fn region(&self, id: &str) -> anyhow::Result<&RegionConfig> {
        self.regions
            .iter()
            .find(|r| r.id == id)
            .with_context(|| format!("region {id} is not configured"))
    }

    /// Static data for one region, loading it if needed.
    pub async fn region_data(&self, id: &str) -> anyhow::Result<Arc<RegionData>> {
        let region = self.region(id)?;
        Ok(self.loader.get_or_load(region).await?)
    }

    pub async fn shutdown(&self) {
        self.loader.shutdown().await;
        self.pool.terminate_pool().await;
    }
}
