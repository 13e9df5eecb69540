//! Scheduling bookkeeping shared by routing and execution.
//!
//! Everything here is read and written under the pool's admission lock.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::recency::RecencyQueue;

/// Per-worker sizes, region affinities and recency.
#[derive(Debug, Clone)]
pub struct PoolState {
    /// Bytes of region topology committed to each worker's cache.
    pub(crate) resident: Vec<u64>,
    /// Bytes reserved by tasks routed to a worker but not yet started.
    pub(crate) pending: Vec<u64>,
    /// Tasks queued or running on each worker.
    pub(crate) in_flight: Vec<usize>,
    /// Region id → workers whose cache holds it, most recent first.
    pub(crate) committed: HashMap<String, Vec<usize>>,
    /// Region id → workers with a reservation for it, most recent first.
    pub(crate) pending_by_region: HashMap<String, Vec<usize>>,
    pub(crate) recency: RecencyQueue,
}

impl PoolState {
    pub fn new(num_workers: usize) -> Self {
        Self {
            resident: vec![0; num_workers],
            pending: vec![0; num_workers],
            in_flight: vec![0; num_workers],
            committed: HashMap::new(),
            pending_by_region: HashMap::new(),
            recency: RecencyQueue::new(num_workers),
        }
    }

    pub fn num_workers(&self) -> usize {
        self.resident.len()
    }

    /// Workers holding or reserving `region`: committed ones first, then
    /// pending ones, each most recent first.
    pub fn assigned(&self, region: &str) -> Vec<usize> {
        let committed = self.committed.get(region).into_iter().flatten();
        let pending = self.pending_by_region.get(region).into_iter().flatten();
        committed.chain(pending).copied().collect()
    }

    pub fn holds(&self, region: &str, worker: usize) -> bool {
        self.is_committed(region, worker)
            || self
                .pending_by_region
                .get(region)
                .is_some_and(|workers| workers.contains(&worker))
    }

    pub fn is_committed(&self, region: &str, worker: usize) -> bool {
        self.committed
            .get(region)
            .is_some_and(|workers| workers.contains(&worker))
    }

    /// Nothing running or queued.
    pub fn is_idle(&self, worker: usize) -> bool {
        self.in_flight[worker] == 0
    }

    /// Size once every reservation has been committed.
    pub fn projected(&self, worker: usize) -> u64 {
        self.resident[worker] + self.pending[worker]
    }

    pub fn will_fit(&self, worker: usize, size: u64, max: u64) -> bool {
        self.projected(worker) + size < max
    }

    pub(crate) fn reserve(&mut self, region: &str, worker: usize, size: u64) {
        self.pending[worker] += size;
        promote(self.pending_by_region.entry(region.to_string()).or_default(), worker);
    }

    pub(crate) fn release(&mut self, region: &str, worker: usize, size: u64) {
        self.pending[worker] = self.pending[worker].saturating_sub(size);
        if let Some(workers) = self.pending_by_region.get_mut(region) {
            workers.retain(|&w| w != worker);
            if workers.is_empty() {
                self.pending_by_region.remove(region);
            }
        }
    }

    pub(crate) fn commit(&mut self, region: &str, worker: usize, size: u64) {
        self.resident[worker] += size;
        promote(self.committed.entry(region.to_string()).or_default(), worker);
    }

    /// Forget everything cached on `worker`. Reservations stay, since the
    /// tasks that made them are still queued.
    pub(crate) fn reset_worker(&mut self, worker: usize) {
        self.resident[worker] = 0;
        self.committed.retain(|_, workers| {
            workers.retain(|&w| w != worker);
            !workers.is_empty()
        });
    }
}

fn promote(workers: &mut Vec<usize>, worker: usize) {
    workers.retain(|&w| w != worker);
    workers.insert(0, worker);
}

/// Why a worker was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TerminationCause {
    #[serde(rename = "")]
    Recreate,
    #[serde(rename = "OoM")]
    OutOfMemory,
    #[serde(rename = "timeout")]
    Timeout,
    #[serde(rename = "error")]
    Error,
}

impl TerminationCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recreate => "",
            Self::OutOfMemory => "OoM",
            Self::Timeout => "timeout",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for TerminationCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Termination {
    pub worker: usize,
    pub cause: TerminationCause,
    /// Region of the task that triggered it; empty for explicit recreation.
    pub region: String,
    /// Seconds since the Unix epoch.
    pub at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerPhase {
    /// No thread.
    Empty,
    /// Thread running with a reservation but nothing committed.
    Warming,
    /// Holds committed region topology.
    Resident,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerSnapshot {
    pub index: usize,
    pub phase: WorkerPhase,
    pub generation: u64,
    pub resident: u64,
    pub pending: u64,
    pub in_flight: usize,
}

/// Point-in-time view of the pool for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct PoolSnapshot {
    pub workers: Vec<WorkerSnapshot>,
    /// Region id → committed workers, most recent first.
    pub regions: BTreeMap<String, Vec<usize>>,
    /// Workers from most to least recently routed to.
    pub recency: Vec<usize>,
}
