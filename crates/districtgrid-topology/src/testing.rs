//! Fixture region shared by unit and integration tests across the workspace.
//!
//! Two counties over three tracts laid out left to right:
//!
//! ```text
//!   (0,1)    (1,1)    (2,1)    (3,1)
//!     +--------+--------+--------+
//!     |   t0   |   t1   |   t2   |
//!     +--------+--------+--------+
//!   (0,0)    (1,0)    (2,0)    (3,0)
//!     county A | county B (t1, t2)
//! ```
//!
//! Tract populations are 30, 30 and 40.

use std::sync::Arc;

use bytes::Bytes;

use district_core::{RegionConfig, StaticMetadata, TypedArray};

use crate::fetch::{RegionData, STATIC_METADATA_FILE, StaticData, TOPOLOGY_FILE};
use crate::region::RegionTopology;
use crate::store::MemoryStore;

pub const TEST_TOPOLOGY: &str = r#"{
    "type": "Topology",
    "arcs": [
        [[1, 0], [0, 0], [0, 1], [1, 1]],
        [[1, 1], [1, 0]],
        [[1, 1], [2, 1]],
        [[2, 1], [2, 0]],
        [[2, 0], [1, 0]],
        [[2, 1], [3, 1], [3, 0], [2, 0]]
    ],
    "objects": {
        "county": {"type": "GeometryCollection", "geometries": [
            {"type": "Polygon", "arcs": [[0, 1]], "id": 0, "properties": {"county": "A", "name": "Adams"}},
            {"type": "Polygon", "arcs": [[-2, 2, 5, 4]], "id": 1, "properties": {"county": "B", "name": "Bucks"}}
        ]},
        "tract": {"type": "GeometryCollection", "geometries": [
            {"type": "Polygon", "arcs": [[0, 1]], "id": 0, "properties": {"tract": "t0", "county": "A"}},
            {"type": "Polygon", "arcs": [[-2, 2, 3, 4]], "id": 1, "properties": {"tract": "t1", "county": "B"}},
            {"type": "Polygon", "arcs": [[-4, 5]], "id": 2, "properties": {"tract": "t2", "county": "B"}}
        ]}
    }
}"#;

pub const TEST_STATIC_METADATA: &str = r#"{
    "demographics": [
        {"id": "population", "fileName": "population.buf", "bytesPerElement": 2}
    ],
    "geoLevels": [
        {"id": "county", "fileName": "county.buf", "bytesPerElement": 1}
    ],
    "voting": [
        {"id": "dem16", "fileName": "dem16.buf", "bytesPerElement": 2}
    ],
    "bbox": [0, 0, 3, 1],
    "geoLevelHierarchy": [{"id": "tract"}, {"id": "county"}]
}"#;

const POPULATION: [u16; 3] = [30, 30, 40];
const DEM16: [u16; 3] = [10, 15, 20];
const TRACT_COUNTY: [u8; 3] = [0, 1, 1];

pub fn test_region_config() -> RegionConfig {
    RegionConfig {
        id: "test".into(),
        name: "Test Region".into(),
        region_code: "TR".into(),
        country_code: "US".into(),
        s3_uri: "s3://test-bucket/regions/test/".into(),
        layer_size_in_bytes: 1024,
        archived: false,
        hidden: false,
    }
}

pub fn test_metadata() -> StaticMetadata {
    serde_json::from_str(TEST_STATIC_METADATA).expect("fixture metadata parses")
}

pub fn test_region() -> RegionTopology {
    RegionTopology::from_slice("test", TEST_TOPOLOGY.as_bytes(), &test_metadata())
        .expect("fixture topology builds")
}

pub fn test_region_data() -> RegionData {
    RegionData {
        region: test_region_config(),
        metadata: test_metadata(),
        data: StaticData {
            demographics: vec![TypedArray::U16(POPULATION.to_vec())],
            geo_levels: vec![TypedArray::U8(TRACT_COUNTY.to_vec())],
            voting: vec![TypedArray::U16(DEM16.to_vec())],
        },
    }
}

fn u16_le(values: &[u16]) -> Bytes {
    values.iter().flat_map(|v| v.to_le_bytes()).collect::<Vec<u8>>().into()
}

/// Put every file of `region` into `store`, using the fixture contents.
pub fn publish(store: &MemoryStore, region: &RegionConfig) {
    store.insert(region.file_uri(TOPOLOGY_FILE), TEST_TOPOLOGY);
    store.insert(region.file_uri(STATIC_METADATA_FILE), TEST_STATIC_METADATA);
    store.insert(region.file_uri("population.buf"), u16_le(&POPULATION));
    store.insert(region.file_uri("dem16.buf"), u16_le(&DEM16));
    store.insert(region.file_uri("county.buf"), TRACT_COUNTY.to_vec());
}

/// A store holding the fixture region.
pub fn test_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    publish(&store, &test_region_config());
    store
}
