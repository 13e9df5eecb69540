use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to spawn worker {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("worker {0} has exited")]
    Closed(usize),

    #[error("workers must be created inside a tokio runtime")]
    NoRuntime,
}

pub type WorkerResult<T> = Result<T, WorkerError>;
