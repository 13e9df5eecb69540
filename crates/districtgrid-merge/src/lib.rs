//! districtgrid-merge — the computation behind every plan update.
//!
//! Given a region's cached topology and static data, turns a district plan
//! into per-district outlines, demographic and voting totals, compactness
//! scores and contiguity classes. Also converts plans to and from
//! block-level assignments.
//!
//! # Architecture
//!
//! ```text
//! merge(plan)
//!   ├── assign       (plan × hierarchy → buckets[district][level])
//!   ├── merge_arcs   (bucket polygons → outline, per district)
//!   ├── index        (level units → base units → aggregate totals)
//!   └── compactness  (Polsby-Popper + contiguity)
//!
//! csv::import_from_csv / csv::export_to_csv   (block map ⇄ plan)
//! crosswalk::reassign                          (old blocks → new blocks)
//! ```

pub mod compactness;
pub mod crosswalk;
pub mod csv;
pub mod index;
pub mod merge;

pub use compactness::polsby_popper;
pub use crosswalk::{Crosswalk, CrosswalkError, parse_crosswalk, reassign};
pub use csv::{Import, ImportReport, export_to_csv, import_from_csv};
pub use merge::{assign, merge};
