//! districtgrid-topology — region topology loading and geometry plumbing.
//!
//! Turns a region's published files into the immutable structures the merge
//! engine works on:
//!
//! - **TopoJSON model**: shared arcs and per-level geometry collections
//! - **Geo-unit hierarchy**: the containment tree every district plan mirrors
//! - **Arc merging**: union of polygons by cancelling shared boundaries
//! - **Fetching**: static metadata and arrays, plus a disk cache for `topo.json`
//!
//! # Architecture
//!
//! ```text
//! RegionFetcher
//!   ├── ObjectStore (FileStore | HttpStore | MemoryStore)
//!   └── <cache_dir>/<region>/topo.json
//!         │
//!         ▼
//! RegionTopology (one per region, cached inside a worker)
//!   ├── Topology (absolute arcs + objects)
//!   └── Hierarchy (roots = coarsest level, leaves = base units)
//! ```

pub mod error;
pub mod fetch;
pub mod hierarchy;
pub mod merge_arcs;
pub mod region;
pub mod store;
pub mod topojson;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use error::{StoreError, StoreResult, TopologyError, TopologyResult};
pub use fetch::{RegionData, RegionFetcher, StaticData};
pub use hierarchy::{GeoUnitNode, Hierarchy, UnitRef};
pub use merge_arcs::merge_arcs;
pub use region::RegionTopology;
pub use store::{FileStore, HttpStore, MemoryStore, ObjectStore, SourceStore};
pub use topojson::{Geometry, PolygonArcs, Properties, Topology};
