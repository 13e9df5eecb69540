//! Worker pool — routes region tasks onto workers that cache topology.
//!
//! The pool owns a fixed number of worker slots. Every request passes
//! through one admission section that picks a slot (see `routing`),
//! reserves the region's bytes on it and bumps its recency. The task then
//! waits its turn on the slot's FIFO queue, commits the region to the
//! slot's cache (recreating the worker first when the region would push it
//! over budget) and runs on the worker thread, bounded by one deadline for
//! the whole operation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use district_core::{
    Chamber, Creator, DistrictsConfig, DistrictsDefinition, DistrictsGeoJson, RegionConfig,
    StaticMetadata,
};
use district_runtime::{Worker, WorkerContext, WorkerError, WorkerFactory, WorkerResult};
use districtgrid_merge::Import;
use districtgrid_topology::{Properties, RegionData};

use crate::error::{PoolError, PoolResult};
use crate::routing::{RoutingLimits, route};
use crate::state::{
    PoolSnapshot, PoolState, Termination, TerminationCause, WorkerPhase, WorkerSnapshot,
};

/// Sizing for a worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub num_workers: usize,
    /// Per-worker topology cache budget in bytes.
    pub max_worker_cache_size: u64,
    /// Default deadline for a task, from admission to result.
    pub task_timeout: Duration,
}

impl WorkerPoolConfig {
    pub fn from_config(config: &DistrictsConfig) -> anyhow::Result<Self> {
        Ok(Self {
            num_workers: config.num_workers(),
            max_worker_cache_size: config.max_worker_cache_size()?,
            task_timeout: config.task_timeout()?,
        })
    }
}

/// Arguments for a merge.
#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub data: Arc<RegionData>,
    pub definition: Option<DistrictsDefinition>,
    pub number_of_districts: u32,
    pub creator: Creator,
    pub chamber: Option<Chamber>,
}

/// Bookkeeping and worker handles, guarded by the admission lock.
struct Shared {
    schedule: PoolState,
    workers: Vec<Option<Worker>>,
    generations: Vec<u64>,
    terminations: Vec<Termination>,
    closed: bool,
}

struct PoolInner {
    config: WorkerPoolConfig,
    limits: RoutingLimits,
    factory: WorkerFactory,
    shared: Mutex<Shared>,
    /// One per slot; tokio's mutex is fair, so this is the slot's FIFO.
    queues: Vec<Mutex<()>>,
}

/// Outcome of admission for one task.
#[derive(Debug, Clone, Copy)]
struct Admission {
    worker: usize,
    /// Whether this task reserved the region's bytes on the worker.
    reserved: bool,
    size: u64,
    deadline: Instant,
    timeout: Duration,
}

/// A fixed set of workers with region affinity.
///
/// Cheap to clone; clones share the same workers.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    /// Create a pool. Workers are spawned lazily, on their first task.
    pub fn new(config: WorkerPoolConfig, factory: WorkerFactory) -> PoolResult<Self> {
        let n = config.num_workers;
        if n == 0 {
            return Err(PoolError::NoWorkers);
        }
        info!(
            workers = n,
            max_worker_cache_size = config.max_worker_cache_size,
            task_timeout = ?config.task_timeout,
            "worker pool created"
        );
        Ok(Self {
            inner: Arc::new(PoolInner {
                limits: RoutingLimits::new(n, config.max_worker_cache_size),
                config,
                factory,
                shared: Mutex::new(Shared {
                    schedule: PoolState::new(n),
                    workers: (0..n).map(|_| None).collect(),
                    generations: vec![0; n],
                    terminations: Vec::new(),
                    closed: false,
                }),
                queues: (0..n).map(|_| Mutex::new(())).collect(),
            }),
        })
    }

    pub fn config(&self) -> &WorkerPoolConfig {
        &self.inner.config
    }

    /// Merge a plan on a worker holding the region's topology.
    ///
    /// `Ok(None)` when the plan does not fit the region.
    pub async fn merge(&self, request: MergeRequest) -> PoolResult<Option<DistrictsGeoJson>> {
        let region = request.data.region.clone();
        self.queue_with_timeout(&region, self.inner.config.task_timeout, move |ctx| {
            let MergeRequest {
                data,
                definition,
                number_of_districts,
                creator,
                chamber,
            } = request;
            let topology = ctx.region(&data.region, &data.metadata)?;
            Ok(districtgrid_merge::merge(
                &topology,
                &data,
                definition.as_ref(),
                number_of_districts,
                creator,
                chamber,
            )?)
        })
        .await
    }

    pub async fn import_from_csv(
        &self,
        region: &RegionConfig,
        metadata: &StaticMetadata,
        block_to_district: HashMap<String, u32>,
    ) -> PoolResult<Import> {
        let (config, metadata) = (region.clone(), metadata.clone());
        self.queue_with_timeout(region, self.inner.config.task_timeout, move |ctx| {
            let topology = ctx.region(&config, &metadata)?;
            Ok(districtgrid_merge::import_from_csv(&topology, &block_to_district))
        })
        .await
    }

    /// `Ok(None)` when the plan does not fit the region.
    pub async fn export_to_csv(
        &self,
        region: &RegionConfig,
        metadata: &StaticMetadata,
        definition: DistrictsDefinition,
    ) -> PoolResult<Option<Vec<(String, u32)>>> {
        let (config, metadata) = (region.clone(), metadata.clone());
        self.queue_with_timeout(region, self.inner.config.task_timeout, move |ctx| {
            let topology = ctx.region(&config, &metadata)?;
            Ok(districtgrid_merge::export_to_csv(&topology, &definition))
        })
        .await
    }

    /// Feature properties of every topology object, by object name.
    pub async fn topology_properties(
        &self,
        region: &RegionConfig,
        metadata: &StaticMetadata,
        timeout: Option<Duration>,
    ) -> PoolResult<BTreeMap<String, Vec<Properties>>> {
        let (config, metadata) = (region.clone(), metadata.clone());
        let timeout = timeout.unwrap_or(self.inner.config.task_timeout);
        self.queue_with_timeout(region, timeout, move |ctx| {
            Ok(ctx.region(&config, &metadata)?.properties())
        })
        .await
    }

    /// Load a region into some worker's cache. Returns the worker index.
    pub async fn cache_region(
        &self,
        region: &RegionConfig,
        metadata: &StaticMetadata,
    ) -> PoolResult<usize> {
        let (config, metadata) = (region.clone(), metadata.clone());
        self.queue_with_timeout(region, self.inner.config.task_timeout, move |ctx| {
            ctx.region(&config, &metadata)?;
            Ok(ctx.index())
        })
        .await
    }

    /// Route `task` to a worker for `region` and run it there.
    ///
    /// `timeout` covers queueing and execution. A task that reached its
    /// worker and then timed out or failed takes the worker down with it;
    /// one that timed out while still queued only gives up its place.
    pub async fn queue_with_timeout<R, F>(
        &self,
        region: &RegionConfig,
        timeout: Duration,
        task: F,
    ) -> PoolResult<R>
    where
        F: FnOnce(&mut WorkerContext) -> anyhow::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let admission = self.inner.admit(region, timeout).await?;
        let inner = self.inner.clone();
        let region_id = region.id.clone();
        // Runs to completion even if the caller stops waiting, so the
        // bookkeeping is always settled.
        tokio::spawn(async move { inner.run(&region_id, admission, task).await }).await?
    }

    /// Tear down one worker; it is recreated on its next task.
    pub async fn recreate_worker(&self, worker: usize) -> PoolResult<()> {
        let mut shared = self.inner.shared.lock().await;
        if worker >= shared.workers.len() {
            return Err(PoolError::UnknownWorker(worker));
        }
        shared.terminate(worker, TerminationCause::Recreate, "");
        Ok(())
    }

    /// Stop every worker. Later requests fail with `PoolError::Terminated`.
    pub async fn terminate_pool(&self) {
        let mut shared = self.inner.shared.lock().await;
        shared.closed = true;
        let stopped = shared.workers.iter_mut().filter_map(Option::take).count();
        info!(stopped, "worker pool terminated");
    }

    /// Every worker teardown so far, oldest first.
    pub async fn terminations(&self) -> Vec<Termination> {
        self.inner.shared.lock().await.terminations.clone()
    }

    pub async fn snapshot(&self) -> PoolSnapshot {
        let shared = self.inner.shared.lock().await;
        let schedule = &shared.schedule;
        let workers = (0..schedule.num_workers())
            .map(|w| WorkerSnapshot {
                index: w,
                phase: if shared.workers[w].is_none() {
                    WorkerPhase::Empty
                } else if schedule.resident[w] > 0 {
                    WorkerPhase::Resident
                } else {
                    WorkerPhase::Warming
                },
                generation: shared.generations[w],
                resident: schedule.resident[w],
                pending: schedule.pending[w],
                in_flight: schedule.in_flight[w],
            })
            .collect();
        PoolSnapshot {
            workers,
            regions: schedule
                .committed
                .iter()
                .map(|(region, workers)| (region.clone(), workers.clone()))
                .collect(),
            recency: schedule.recency.order(),
        }
    }
}

impl PoolInner {
    /// Pick a worker and reserve room on it. Serialized by the admission
    /// lock so concurrent requests see each other's reservations.
    async fn admit(&self, region: &RegionConfig, timeout: Duration) -> PoolResult<Admission> {
        let deadline = deadline_after(timeout);
        let mut shared = self.shared.lock().await;
        if shared.closed {
            return Err(PoolError::Terminated);
        }

        let size = region.layer_size_in_bytes;
        let schedule = &mut shared.schedule;
        let picked = route(schedule, &region.id, size, &self.limits);
        let worker = picked.worker;
        let reserved = !schedule.holds(&region.id, worker);
        if reserved {
            schedule.reserve(&region.id, worker, size);
        }
        schedule.recency.touch(worker);
        schedule.in_flight[worker] += 1;

        debug!(
            region = %region.id,
            worker,
            reason = picked.reason.as_str(),
            reserved,
            queued = schedule.in_flight[worker],
            "task routed"
        );
        Ok(Admission {
            worker,
            reserved,
            size,
            deadline,
            timeout,
        })
    }

    async fn run<R, F>(&self, region: &str, admission: Admission, task: F) -> PoolResult<R>
    where
        F: FnOnce(&mut WorkerContext) -> anyhow::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let result = self.execute(region, admission, task).await;
        let mut shared = self.shared.lock().await;
        let in_flight = &mut shared.schedule.in_flight[admission.worker];
        *in_flight = in_flight.saturating_sub(1);
        result
    }

    async fn execute<R, F>(&self, region: &str, admission: Admission, task: F) -> PoolResult<R>
    where
        F: FnOnce(&mut WorkerContext) -> anyhow::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let worker = admission.worker;
        let timed_out = || PoolError::Timeout {
            region: region.to_string(),
            worker,
            timeout: admission.timeout,
        };

        let Ok(_turn) = time::timeout_at(admission.deadline, self.queues[worker].lock()).await
        else {
            let mut shared = self.shared.lock().await;
            if admission.reserved {
                shared.schedule.release(region, worker, admission.size);
            }
            warn!(region, worker, "task timed out before reaching its worker");
            return Err(timed_out());
        };

        let receiver = {
            let mut shared = self.shared.lock().await;
            if admission.reserved {
                shared.schedule.release(region, worker, admission.size);
            }
            if shared.closed {
                return Err(PoolError::Terminated);
            }
            if !shared.schedule.is_committed(region, worker) {
                let max = self.config.max_worker_cache_size;
                if shared.schedule.resident[worker] + admission.size > max {
                    shared.terminate(worker, TerminationCause::OutOfMemory, region);
                }
                shared.schedule.commit(region, worker, admission.size);
            }
            let submitted = shared
                .worker(worker, &self.factory)
                .and_then(|handle| handle.submit(task));
            match submitted {
                Ok(receiver) => receiver,
                Err(e) => {
                    shared.terminate(worker, TerminationCause::Error, region);
                    return Err(e.into());
                }
            }
        };

        match time::timeout_at(admission.deadline, receiver).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(source))) => {
                warn!(region, worker, error = %format!("{source:#}"), "task failed");
                self.terminate(worker, TerminationCause::Error, region).await;
                Err(PoolError::Task {
                    region: region.to_string(),
                    worker,
                    source,
                })
            }
            Ok(Err(_)) => {
                self.terminate(worker, TerminationCause::Error, region).await;
                Err(PoolError::WorkerLost {
                    region: region.to_string(),
                    worker,
                })
            }
            Err(_) => {
                warn!(region, worker, timeout = ?admission.timeout, "task timed out");
                self.terminate(worker, TerminationCause::Timeout, region).await;
                Err(timed_out())
            }
        }
    }

    async fn terminate(&self, worker: usize, cause: TerminationCause, region: &str) {
        self.shared.lock().await.terminate(worker, cause, region);
    }
}

impl Shared {
    /// The slot's worker, spawning it if the slot is empty.
    fn worker(
        &mut self,
        index: usize,
        factory: &WorkerFactory,
    ) -> WorkerResult<&Worker> {
        let generation = self.generations[index];
        let slot = &mut self.workers[index];
        if slot.is_none() {
            *slot = Some(factory.spawn(index, generation)?);
        }
        slot.as_ref().ok_or(WorkerError::Closed(index))
    }

    /// Drop the worker and forget its cache. The thread exits once its
    /// current job, if any, returns.
    fn terminate(&mut self, worker: usize, cause: TerminationCause, region: &str) {
        if self.workers[worker].take().is_some() {
            info!(
                worker,
                cause = %cause,
                region,
                resident = ?self.schedule.resident,
                "terminating worker"
            );
            self.generations[worker] += 1;
            self.terminations.push(Termination {
                worker,
                cause,
                region: region.to_string(),
                at: epoch_secs(),
            });
        }
        self.schedule.reset_worker(worker);
    }
}

// ── Internal helpers ──

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(365 * 24 * 60 * 60))
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
