//! Loader error types.

use thiserror::Error;

use districtgrid_topology::StoreError;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("failed to load region {region}: {source}")]
    Store {
        region: String,
        #[source]
        source: StoreError,
    },

    #[error("unknown region: {0}")]
    UnknownRegion(String),

    #[error("loader is shutting down")]
    ShuttingDown,
}

pub type LoaderResult<T> = Result<T, LoaderError>;
