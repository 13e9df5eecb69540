//! Topology loader — background loading of every known region.
//!
//! For each region the loader fetches static metadata and static arrays
//! into memory and warms the local `topo.json` disk cache that workers
//! read from. Archived regions load first and `start` waits for them;
//! active regions then load in the background. A failed load is retried
//! until it succeeds or the loader shuts down.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use district_core::RegionConfig;
use districtgrid_topology::{RegionData, RegionFetcher};

use crate::backoff::RetryTracker;
use crate::error::{LoaderError, LoaderResult};
use crate::readiness::{ReadinessReport, RegionStatus};

/// Per-region load state.
struct RegionSlot {
    status: RegionStatus,
    data: Option<Arc<RegionData>>,
}

/// State shared with the background load tasks.
struct LoaderShared {
    fetcher: Arc<RegionFetcher>,
    slots: RwLock<HashMap<String, RegionSlot>>,
    /// Woken whenever a region finishes loading.
    loaded: Notify,
    initial_backoff: Duration,
    max_backoff: Duration,
}

/// Loads region data and reports readiness.
pub struct TopologyLoader {
    shared: Arc<LoaderShared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl TopologyLoader {
    pub fn new(fetcher: Arc<RegionFetcher>, initial_backoff: Duration, max_backoff: Duration) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shared: Arc::new(LoaderShared {
                fetcher,
                slots: RwLock::new(HashMap::new()),
                loaded: Notify::new(),
                initial_backoff,
                max_backoff,
            }),
            tasks: Mutex::new(Vec::new()),
            shutdown_tx,
        }
    }

    /// Register every region, load the archived ones and wait for them,
    /// then start loading the active ones in the background.
    pub async fn start(&self, regions: &[RegionConfig]) {
        for region in regions {
            self.register(region).await;
        }
        let (archived, active): (Vec<&RegionConfig>, Vec<&RegionConfig>) =
            regions.iter().partition(|r| r.archived);
        info!(archived = archived.len(), active = active.len(), "loading regions");

        let handles: Vec<_> = archived
            .into_iter()
            .map(|region| self.spawn_load(region.clone()))
            .collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "archived region load task failed");
            }
        }
        debug!("archived regions done");

        let mut tasks = self.tasks.lock().await;
        for region in active {
            tasks.push(self.spawn_load(region.clone()));
        }
    }

    /// Data for a loaded region.
    pub async fn region_data(&self, region_id: &str) -> Option<Arc<RegionData>> {
        let slots = self.shared.slots.read().await;
        slots.get(region_id).and_then(|slot| slot.data.clone())
    }

    pub async fn status(&self, region_id: &str) -> Option<RegionStatus> {
        let slots = self.shared.slots.read().await;
        slots.get(region_id).map(|slot| slot.status)
    }

    pub async fn readiness(&self) -> ReadinessReport {
        let slots = self.shared.slots.read().await;
        ReadinessReport::new(
            slots
                .iter()
                .map(|(id, slot)| (id.clone(), slot.status))
                .collect(),
        )
    }

    /// Data for `region`, loading it first if the loader has never seen
    /// it. Waits for a load already in progress.
    pub async fn get_or_load(&self, region: &RegionConfig) -> LoaderResult<Arc<RegionData>> {
        if self.register(region).await {
            info!(region = %region.id, "loading region added after startup");
            let handle = self.spawn_load(region.clone());
            self.tasks.lock().await.push(handle);
        }
        self.wait_loaded(&region.id).await
    }

    /// Wait until `region_id` is loaded.
    pub async fn wait_loaded(&self, region_id: &str) -> LoaderResult<Arc<RegionData>> {
        let mut shutdown = self.shutdown_tx.subscribe();
        loop {
            let notified = self.shared.loaded.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.shared.slots.read().await.get(region_id) {
                None => return Err(LoaderError::UnknownRegion(region_id.to_string())),
                Some(RegionSlot {
                    data: Some(data), ..
                }) => return Ok(data.clone()),
                Some(_) => {}
            }
            if *shutdown.borrow() {
                return Err(LoaderError::ShuttingDown);
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = shutdown.changed() => return Err(LoaderError::ShuttingDown),
            }
        }
    }

    /// Stop all loads, including retries waiting out their backoff.
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        let mut tasks = self.tasks.lock().await;
        for handle in tasks.drain(..) {
            handle.abort();
        }
        info!("topology loader stopped");
    }

    // ── Internal helpers ──

    /// Returns false if the region was already known.
    async fn register(&self, region: &RegionConfig) -> bool {
        let mut slots = self.shared.slots.write().await;
        if slots.contains_key(&region.id) {
            return false;
        }
        slots.insert(
            region.id.clone(),
            RegionSlot {
                status: RegionStatus::Pending,
                data: None,
            },
        );
        true
    }

    fn spawn_load(&self, region: RegionConfig) -> JoinHandle<()> {
        let shared = self.shared.clone();
        let shutdown = self.shutdown_tx.subscribe();
        tokio::spawn(async move { shared.load(region, shutdown).await })
    }
}

impl LoaderShared {
    async fn load(&self, region: RegionConfig, mut shutdown: watch::Receiver<bool>) {
        if *shutdown.borrow() {
            return;
        }
        self.set_status(&region.id, RegionStatus::Loading).await;
        let mut retry = RetryTracker::new(self.initial_backoff, self.max_backoff);

        loop {
            match self.fetch(&region).await {
                Ok(data) => {
                    let failures = retry.failures();
                    retry.record_success();
                    if let Some(slot) = self.slots.write().await.get_mut(&region.id) {
                        slot.status = RegionStatus::Loaded;
                        slot.data = Some(Arc::new(data));
                    }
                    self.loaded.notify_waiters();
                    info!(region = %region.id, failures, archived = region.archived, "region loaded");
                    return;
                }
                Err(e) => {
                    let delay = retry.record_failure();
                    warn!(
                        region = %region.id,
                        failures = retry.failures(),
                        retry_in = ?delay,
                        error = %e,
                        "region load failed"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.changed() => {
                            debug!(region = %region.id, "region load cancelled");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn fetch(&self, region: &RegionConfig) -> LoaderResult<RegionData> {
        let store_error = |source| LoaderError::Store {
            region: region.id.clone(),
            source,
        };
        let data = self
            .fetcher
            .region_data(region)
            .await
            .map_err(store_error)?;
        self.fetcher
            .topology_path(region)
            .await
            .map_err(store_error)?;
        Ok(data)
    }

    async fn set_status(&self, region_id: &str, status: RegionStatus) {
        if let Some(slot) = self.slots.write().await.get_mut(region_id) {
            slot.status = status;
        }
    }
}
