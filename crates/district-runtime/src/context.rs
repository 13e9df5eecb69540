//! State owned by one worker thread.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context as _;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use district_core::{RegionConfig, StaticMetadata};
use districtgrid_topology::{RegionFetcher, RegionTopology};

use crate::budget::CacheBudget;

/// Everything a job can touch while it runs on a worker.
///
/// Created with the worker and dropped with it; nothing here is shared with
/// other workers.
pub struct WorkerContext {
    index: usize,
    regions: HashMap<String, Arc<RegionTopology>>,
    budget: CacheBudget,
    fetcher: Arc<RegionFetcher>,
    handle: Handle,
}

impl WorkerContext {
    pub(crate) fn new(
        index: usize,
        fetcher: Arc<RegionFetcher>,
        cache_limit: u64,
        handle: Handle,
    ) -> Self {
        Self {
            index,
            regions: HashMap::new(),
            budget: CacheBudget::new(cache_limit),
            fetcher,
            handle,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// The region's topology, loading and caching it on first use.
    ///
    /// Loading blocks this worker thread on the disk cache (and the remote
    /// store on a miss) and then parses `topo.json` in place.
    pub fn region(
        &mut self,
        region: &RegionConfig,
        metadata: &StaticMetadata,
    ) -> anyhow::Result<Arc<RegionTopology>> {
        if let Some(cached) = self.regions.get(&region.id) {
            debug!(worker = self.index, region = %region.id, "region cache hit");
            return Ok(cached.clone());
        }

        let bytes = self
            .handle
            .block_on(self.fetcher.topology_bytes(region))
            .with_context(|| format!("failed to fetch topology for region {}", region.id))?;
        let topology = RegionTopology::from_slice(&region.id, &bytes, metadata)
            .with_context(|| format!("failed to build topology for region {}", region.id))?;

        let size = if region.layer_size_in_bytes > 0 {
            region.layer_size_in_bytes
        } else {
            topology.estimated_size()
        };
        if !self.budget.charge(&region.id, size) && !self.regions.is_empty() {
            // Declared sizes drifted from what this worker holds. Start the
            // cache over with just this region.
            let dropped = self.cached_regions();
            self.regions.clear();
            self.budget = CacheBudget::new(self.budget.limit());
            self.budget.charge(&region.id, size);
            warn!(
                worker = self.index,
                region = %region.id,
                dropped = ?dropped,
                "worker cache over budget, dropped cached regions"
            );
        }
        info!(
            worker = self.index,
            region = %region.id,
            size,
            cached = self.regions.len() + 1,
            "region loaded into worker"
        );

        let topology = Arc::new(topology);
        self.regions.insert(region.id.clone(), topology.clone());
        Ok(topology)
    }

    pub fn is_cached(&self, region_id: &str) -> bool {
        self.regions.contains_key(region_id)
    }

    /// Ids of cached regions, sorted.
    pub fn cached_regions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.regions.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn budget(&self) -> &CacheBudget {
        &self.budget
    }
}
