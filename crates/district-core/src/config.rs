//! districts.toml configuration parser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::memory::{MemoryLimits, max_worker_cache_size};
use crate::types::RegionConfig;
use crate::units::{parse_bytes, parse_duration};

/// Default wall-clock budget for one worker task.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistrictsConfig {
    #[serde(default)]
    pub pool: PoolConfig,
    pub loader: Option<LoaderConfig>,
    #[serde(default)]
    pub regions: Vec<RegionEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Worker count; defaults to the number of available CPUs.
    pub num_workers: Option<usize>,
    /// Total topology cache across all workers, e.g. "6GiB".
    /// Derived from host/cgroup memory when unset.
    pub cache_size: Option<String>,
    pub task_timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Local directory for downloaded `topo.json` files.
    pub cache_dir: Option<String>,
    pub initial_backoff: Option<String>,
    pub max_backoff: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionEntry {
    pub id: String,
    pub name: String,
    pub region_code: Option<String>,
    pub country_code: Option<String>,
    pub s3_uri: String,
    pub layer_size_in_bytes: Option<u64>,
    pub archived: Option<bool>,
    pub hidden: Option<bool>,
}

impl From<&RegionEntry> for RegionConfig {
    fn from(entry: &RegionEntry) -> Self {
        RegionConfig {
            id: entry.id.clone(),
            name: entry.name.clone(),
            region_code: entry.region_code.clone().unwrap_or_default(),
            country_code: entry.country_code.clone().unwrap_or_default(),
            s3_uri: entry.s3_uri.clone(),
            layer_size_in_bytes: entry.layer_size_in_bytes.unwrap_or(0),
            archived: entry.archived.unwrap_or(false),
            hidden: entry.hidden.unwrap_or(false),
        }
    }
}

impl DistrictsConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DistrictsConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold a minimal districts.toml serving a single region.
    pub fn scaffold(region_id: &str, name: &str, s3_uri: &str) -> Self {
        DistrictsConfig {
            pool: PoolConfig {
                num_workers: Some(2),
                cache_size: None,
                task_timeout: Some("90s".to_string()),
            },
            loader: Some(LoaderConfig {
                cache_dir: Some("/tmp".to_string()),
                initial_backoff: Some("1s".to_string()),
                max_backoff: Some("60s".to_string()),
            }),
            regions: vec![RegionEntry {
                id: region_id.to_string(),
                name: name.to_string(),
                region_code: None,
                country_code: None,
                s3_uri: s3_uri.to_string(),
                layer_size_in_bytes: None,
                archived: None,
                hidden: None,
            }],
        }
    }

    pub fn region_configs(&self) -> Vec<RegionConfig> {
        self.regions.iter().map(RegionConfig::from).collect()
    }

    pub fn num_workers(&self) -> usize {
        self.pool
            .num_workers
            .filter(|n| *n > 0)
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(1)
    }

    /// Total cache budget, from config or detected memory.
    pub fn cache_size(&self) -> anyhow::Result<u64> {
        match &self.pool.cache_size {
            Some(s) => {
                parse_bytes(s).ok_or_else(|| anyhow::anyhow!("invalid pool.cache_size: {s}"))
            }
            None => Ok(MemoryLimits::detect().cache_size()),
        }
    }

    pub fn max_worker_cache_size(&self) -> anyhow::Result<u64> {
        Ok(max_worker_cache_size(self.cache_size()?, self.num_workers()))
    }

    pub fn task_timeout(&self) -> anyhow::Result<Duration> {
        duration_or(self.pool.task_timeout.as_deref(), DEFAULT_TASK_TIMEOUT, "pool.task_timeout")
    }

    /// Topology disk cache, honoring `TOPOLOGY_CACHE_DIRECTORY`.
    pub fn cache_dir(&self) -> PathBuf {
        std::env::var_os("TOPOLOGY_CACHE_DIRECTORY")
            .map(PathBuf::from)
            .or_else(|| {
                self.loader
                    .as_ref()
                    .and_then(|l| l.cache_dir.as_ref())
                    .map(PathBuf::from)
            })
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn backoff(&self) -> anyhow::Result<(Duration, Duration)> {
        let loader = self.loader.clone().unwrap_or_default();
        let initial = duration_or(
            loader.initial_backoff.as_deref(),
            Duration::from_secs(1),
            "loader.initial_backoff",
        )?;
        let max = duration_or(
            loader.max_backoff.as_deref(),
            Duration::from_secs(60),
            "loader.max_backoff",
        )?;
        Ok((initial, max.max(initial)))
    }
}

fn duration_or(value: Option<&str>, default: Duration, key: &str) -> anyhow::Result<Duration> {
    match value {
        Some(s) => parse_duration(s).ok_or_else(|| anyhow::anyhow!("invalid {key}: {s}")),
        None => Ok(default),
    }
}
