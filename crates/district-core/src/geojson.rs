//! GeoJSON-shaped merge results.
//!
//! Field names and value ranges here are consumed by the map UI and the
//! shapefile exporter, so they are kept exactly as serialized today.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Chamber, Creator, RegionConfig};

/// Per-category totals keyed by static file id.
pub type Counts = BTreeMap<String, i64>;

/// Ring coordinates as `[lon, lat]` pairs.
pub type Ring = Vec<[f64; 2]>;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Contiguity {
    /// Not computed: the district has no geometry.
    #[default]
    #[serde(rename = "")]
    Unknown,
    #[serde(rename = "contiguous")]
    Contiguous,
    #[serde(rename = "non-contiguous")]
    NonContiguous,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MultiPolygonGeometry {
    #[serde(rename = "type")]
    pub kind: GeometryKind,
    pub coordinates: Vec<Vec<Ring>>,
}

impl MultiPolygonGeometry {
    pub fn new(coordinates: Vec<Vec<Ring>>) -> Self {
        Self {
            kind: GeometryKind::MultiPolygon,
            coordinates,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum GeometryKind {
    #[default]
    MultiPolygon,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum FeatureKind {
    #[default]
    Feature,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum CollectionKind {
    #[default]
    FeatureCollection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DistrictProperties {
    pub demographics: Counts,
    pub voting: Counts,
    /// Polsby-Popper score in `[0, 1]`.
    pub compactness: f64,
    pub contiguity: Contiguity,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DistrictFeature {
    #[serde(rename = "type")]
    pub kind: FeatureKind,
    pub id: u32,
    pub geometry: MultiPolygonGeometry,
    pub properties: DistrictProperties,
}

/// Region fields copied into result metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegionSummary {
    pub id: String,
    pub name: String,
    pub region_code: String,
    pub country_code: String,
    #[serde(rename = "s3URI")]
    pub s3_uri: String,
}

impl From<&RegionConfig> for RegionSummary {
    fn from(region: &RegionConfig) -> Self {
        Self {
            id: region.id.clone(),
            name: region.name.clone(),
            region_code: region.region_code.clone(),
            country_code: region.country_code.clone(),
            s3_uri: region.s3_uri.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DistrictsMetadata {
    /// True when no base unit is left unassigned.
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chamber: Option<Chamber>,
    pub creator: Creator,
    pub region_config: RegionSummary,
}

/// One feature per district id `0..=N`, in ascending id order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DistrictsGeoJson {
    #[serde(rename = "type")]
    pub kind: CollectionKind,
    pub features: Vec<DistrictFeature>,
    pub metadata: DistrictsMetadata,
}
