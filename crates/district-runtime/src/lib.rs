//! district-runtime — isolated workers that cache region topology.
//!
//! Each worker is an OS thread with its own region cache. Jobs are closures
//! run strictly one at a time against the worker's `WorkerContext`, so a
//! cached topology is never touched by two jobs at once. Killing a worker
//! means dropping its handle; the cache goes with the thread.
//!
//! # Architecture
//!
//! ```text
//! WorkerFactory (fetcher + per-worker cache limit + runtime handle)
//!   └── Worker (job channel) ──▶ thread "district-worker-N"
//!         └── WorkerContext
//!               ├── region cache (region id → Arc<RegionTopology>)
//!               ├── CacheBudget
//!               └── RegionFetcher (disk-cached topo.json)
//! ```

pub mod budget;
pub mod context;
pub mod error;
pub mod worker;

pub use budget::CacheBudget;
pub use context::WorkerContext;
pub use error::{WorkerError, WorkerResult};
pub use worker::{Worker, WorkerFactory};
