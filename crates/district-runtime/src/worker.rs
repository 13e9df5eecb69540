//! Worker threads and the factory that creates them.
//!
//! A worker is a dedicated OS thread draining a job channel. Jobs run one
//! at a time against the worker's own `WorkerContext`. Results come back
//! over a oneshot channel, so async callers can await them.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info};

use districtgrid_topology::RegionFetcher;

use crate::context::WorkerContext;
use crate::error::{WorkerError, WorkerResult};

type Job = Box<dyn FnOnce(&mut WorkerContext) + Send>;

/// Handle to a running worker thread.
///
/// Dropping the handle closes the job channel: the thread finishes the job
/// it is running (if any), drops its cache and exits. It is never joined,
/// so a stuck job cannot block whoever drops the handle.
pub struct Worker {
    index: usize,
    generation: u64,
    sender: mpsc::Sender<Job>,
}

impl Worker {
    pub fn index(&self) -> usize {
        self.index
    }

    /// How many workers occupied this slot before this one.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Queue `f` on the worker. The receiver yields its result, or a
    /// `RecvError` if the worker died before answering.
    pub fn submit<R, F>(&self, f: F) -> WorkerResult<oneshot::Receiver<anyhow::Result<R>>>
    where
        F: FnOnce(&mut WorkerContext) -> anyhow::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move |ctx| {
            // The caller may have given up already.
            let _ = tx.send(f(ctx));
        });
        self.sender
            .send(job)
            .map_err(|_| WorkerError::Closed(self.index))?;
        Ok(rx)
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("index", &self.index)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Creates workers that share a fetcher and a per-worker cache limit.
#[derive(Clone)]
pub struct WorkerFactory {
    fetcher: Arc<RegionFetcher>,
    cache_limit: u64,
    handle: Handle,
}

impl WorkerFactory {
    /// Must be called from inside a tokio runtime; workers use its handle
    /// to drive fetches.
    pub fn new(fetcher: Arc<RegionFetcher>, cache_limit: u64) -> WorkerResult<Self> {
        let handle = Handle::try_current().map_err(|_| WorkerError::NoRuntime)?;
        Ok(Self {
            fetcher,
            cache_limit,
            handle,
        })
    }

    pub fn cache_limit(&self) -> u64 {
        self.cache_limit
    }

    pub fn spawn(&self, index: usize, generation: u64) -> WorkerResult<Worker> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let mut ctx = WorkerContext::new(
            index,
            self.fetcher.clone(),
            self.cache_limit,
            self.handle.clone(),
        );

        thread::Builder::new()
            .name(format!("district-worker-{index}"))
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    job(&mut ctx);
                }
                debug!(
                    worker = index,
                    generation,
                    regions = ctx.cached_regions().len(),
                    "worker thread exiting"
                );
            })
            .map_err(|source| WorkerError::Spawn { index, source })?;

        info!(worker = index, generation, limit = self.cache_limit, "worker started");
        Ok(Worker {
            index,
            generation,
            sender,
        })
    }
}
