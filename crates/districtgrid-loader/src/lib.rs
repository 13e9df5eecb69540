//! districtgrid-loader — loads every known region and reports readiness.
//!
//! Loading a region means fetching its static metadata and static arrays
//! into memory and downloading its `topo.json` into the local disk cache,
//! where workers pick it up. A region's status moves from `pending` to
//! `loading` to `loaded`; the process is ready once every region is loaded.
//!
//! # Architecture
//!
//! ```text
//! TopologyLoader
//!   ├── start(regions)
//!   │   ├── archived regions  (awaited)
//!   │   └── active regions    (background tasks)
//!   ├── Per-region load task
//!   │   ├── RegionFetcher::region_data + topology_path
//!   │   └── RetryTracker (exponential backoff, no attempt cap)
//!   └── readiness() → ReadinessReport
//! ```

pub mod backoff;
pub mod error;
pub mod loader;
pub mod readiness;

pub use backoff::RetryTracker;
pub use error::{LoaderError, LoaderResult};
pub use loader::TopologyLoader;
pub use readiness::{ReadinessReport, RegionStatus};
