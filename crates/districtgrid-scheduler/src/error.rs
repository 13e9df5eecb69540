//! Scheduler error types.

use std::time::Duration;

use thiserror::Error;

use district_runtime::WorkerError;

/// Errors returned to callers of the worker pool.
///
/// Every `Timeout` that reached a worker, and every `Task` and
/// `WorkerLost`, is paired with the termination of that worker.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("task for region {region} on worker {worker} timed out after {timeout:?}")]
    Timeout {
        region: String,
        worker: usize,
        timeout: Duration,
    },

    #[error("task for region {region} on worker {worker} failed: {source:#}")]
    Task {
        region: String,
        worker: usize,
        source: anyhow::Error,
    },

    #[error("worker {worker} exited before finishing the task for region {region}")]
    WorkerLost { region: String, worker: usize },

    #[error("no such worker: {0}")]
    UnknownWorker(usize),

    #[error("worker pool has been terminated")]
    Terminated,

    #[error("worker pool needs at least one worker")]
    NoWorkers,

    #[error("worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("task runner failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type PoolResult<T> = Result<T, PoolError>;
