pub mod config;
pub mod geojson;
pub mod memory;
pub mod source;
pub mod typed_array;
pub mod types;
pub mod units;

pub use config::DistrictsConfig;
pub use geojson::*;
pub use source::SourceUri;
pub use typed_array::TypedArray;
pub use types::*;
