//! districtgrid-scheduler — routes region tasks onto a bounded worker pool.
//!
//! Each worker caches the topology of the regions it has served, so the
//! scheduler sends a region back to the workers that already hold it,
//! packs new regions by best fit against a per-worker byte budget, and caps
//! how many workers may hold any one region at half the pool.
//!
//! # Architecture
//!
//! ```text
//! WorkerPool
//!   ├── admission lock (one at a time)
//!   │     ├── route()        affinity → best fit → LRU → most recent affine
//!   │     └── PoolState      resident / pending bytes, affinities, RecencyQueue
//!   ├── per-slot FIFO queue
//!   └── per-slot Worker     (district-runtime thread + region cache)
//!         └── recreated on OoM, timeout or task error
//! ```

pub mod error;
pub mod pool;
pub mod recency;
pub mod routing;
pub mod state;

pub use error::{PoolError, PoolResult};
pub use pool::{MergeRequest, WorkerPool, WorkerPoolConfig};
pub use recency::RecencyQueue;
pub use routing::{Route, RouteReason, RoutingLimits, route};
pub use state::{
    PoolSnapshot, PoolState, Termination, TerminationCause, WorkerPhase, WorkerSnapshot,
};
