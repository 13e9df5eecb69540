//! Topology and storage error types.

use thiserror::Error;

use district_core::source::SourceError;
use district_core::typed_array::TypedArrayError;

/// Errors raised while parsing a topology or deriving its hierarchy.
///
/// Hierarchy errors mean the region's source data is malformed; the region
/// stays unusable until the data is corrected.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("invalid topojson: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("static metadata lists no geo-levels")]
    NoLevels,

    #[error("topology has no object named {0}")]
    MissingObject(String),

    #[error("topology object {0} is not a geometry collection")]
    NotACollection(String),

    #[error("{level} geometry at position {position} has no {key} property")]
    MissingKey {
        level: String,
        position: usize,
        key: String,
    },

    #[error("{level} geometry at position {position} refers to unknown {parent} {key}")]
    UnknownParent {
        level: String,
        position: usize,
        parent: String,
        key: String,
    },

    #[error("arc {0} is out of range")]
    ArcOutOfRange(i64),
}

pub type TopologyResult<T> = Result<T, TopologyError>;

/// Errors raised while fetching region files.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("request for {uri} failed: {message}")]
    Request { uri: String, message: String },

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid static metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("static file {file}: {source}")]
    StaticFile {
        file: String,
        #[source]
        source: TypedArrayError,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;
