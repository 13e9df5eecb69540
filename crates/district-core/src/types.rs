//! Region, static metadata, and district plan types shared by every crate.

use serde::{Deserialize, Serialize};

/// A published region whose topology can be loaded into a worker.
///
/// Field names follow the JSON shape stored alongside region data, so the
/// same struct is used for wire payloads and for the merge result metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegionConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub region_code: String,
    #[serde(default)]
    pub country_code: String,
    /// Remote prefix holding `topo.json`, `static-metadata.json` and the
    /// static `.buf` files. Always ends with `/` once normalized.
    #[serde(rename = "s3URI")]
    pub s3_uri: String,
    /// Precomputed in-memory footprint of the region's topology.
    #[serde(default)]
    pub layer_size_in_bytes: u64,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub hidden: bool,
}

impl RegionConfig {
    /// URI of a file stored under this region's prefix.
    pub fn file_uri(&self, file_name: &str) -> String {
        if self.s3_uri.ends_with('/') {
            format!("{}{file_name}", self.s3_uri)
        } else {
            format!("{}/{file_name}", self.s3_uri)
        }
    }
}

/// One static typed-array file (`<id>.buf`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StaticFile {
    pub id: String,
    pub file_name: String,
    pub bytes_per_element: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsigned: Option<bool>,
}

impl StaticFile {
    /// Files written without the `unsigned` flag predate signed support.
    pub fn is_unsigned(&self) -> bool {
        self.unsigned.unwrap_or(true)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeoLevelInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_zoom: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_zoom: Option<f64>,
}

/// Contents of `static-metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StaticMetadata {
    pub demographics: Vec<StaticFile>,
    /// Parent-index arrays, one per non-base level, ordered fine to coarse.
    pub geo_levels: Vec<StaticFile>,
    #[serde(default)]
    pub voting: Vec<StaticFile>,
    #[serde(default)]
    pub bbox: [f64; 4],
    /// Geo-levels ordered base (finest) first.
    pub geo_level_hierarchy: Vec<GeoLevelInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demographics_groups: Option<serde_json::Value>,
}

impl StaticMetadata {
    /// Id of the finest geo-level, whose units are the base units.
    pub fn base_level_id(&self) -> Option<&str> {
        self.geo_level_hierarchy.first().map(|level| level.id.as_str())
    }

    /// Geo-level ids ordered coarsest first, the order a plan is nested in.
    pub fn levels_coarse_to_fine(&self) -> Vec<String> {
        self.geo_level_hierarchy
            .iter()
            .rev()
            .map(|level| level.id.clone())
            .collect()
    }
}

/// The user that owns a plan, as embedded in merge results.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Creator {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chamber {
    pub id: String,
    pub name: String,
    pub number_of_districts: u32,
}

/// One position in a district plan.
///
/// A leaf assigns a district to the whole subtree at this position; a branch
/// has exactly one entry per child unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum DefinitionNode {
    Leaf(u32),
    Branch(Vec<DefinitionNode>),
}

impl DefinitionNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self, DefinitionNode::Leaf(_))
    }
}

/// A full district plan: one node per top-level (coarsest) geo-unit.
///
/// District `0` means unassigned.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct DistrictsDefinition(pub Vec<DefinitionNode>);

impl DistrictsDefinition {
    /// A plan that assigns every one of `len` top-level units to `district`.
    pub fn uniform(len: usize, district: u32) -> Self {
        Self(vec![DefinitionNode::Leaf(district); len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn nodes(&self) -> &[DefinitionNode] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_parses_numbers_and_arrays() {
        let def: DistrictsDefinition = serde_json::from_str("[0, [1, 2], [[3], 1]]").unwrap();
        assert_eq!(
            def.0,
            vec![
                DefinitionNode::Leaf(0),
                DefinitionNode::Branch(vec![DefinitionNode::Leaf(1), DefinitionNode::Leaf(2)]),
                DefinitionNode::Branch(vec![
                    DefinitionNode::Branch(vec![DefinitionNode::Leaf(3)]),
                    DefinitionNode::Leaf(1),
                ]),
            ]
        );
        assert_eq!(serde_json::to_string(&def).unwrap(), "[0,[1,2],[[3],1]]");
    }

    #[test]
    fn definition_rejects_negative_and_strings() {
        assert!(serde_json::from_str::<DistrictsDefinition>("[-1]").is_err());
        assert!(serde_json::from_str::<DistrictsDefinition>("[\"2\"]").is_err());
    }

    #[test]
    fn region_config_uses_wire_names() {
        let json = r#"{
            "id": "pa",
            "name": "Pennsylvania",
            "regionCode": "PA",
            "countryCode": "US",
            "s3URI": "s3://regions/US/PA/",
            "layerSizeInBytes": 1024
        }"#;
        let region: RegionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(region.layer_size_in_bytes, 1024);
        assert!(!region.archived);
        assert_eq!(region.file_uri("topo.json"), "s3://regions/US/PA/topo.json");
    }

    #[test]
    fn static_metadata_level_order() {
        let json = r#"{
            "demographics": [{"id": "population", "fileName": "population.buf", "bytesPerElement": 2}],
            "geoLevels": [
                {"id": "tract", "fileName": "tract.buf", "bytesPerElement": 1},
                {"id": "county", "fileName": "county.buf", "bytesPerElement": 1}
            ],
            "bbox": [-80.5, 39.7, -74.7, 42.3],
            "geoLevelHierarchy": [{"id": "block"}, {"id": "tract"}, {"id": "county"}]
        }"#;
        let meta: StaticMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.base_level_id(), Some("block"));
        assert_eq!(meta.levels_coarse_to_fine(), vec!["county", "tract", "block"]);
        assert!(meta.voting.is_empty());
        assert!(meta.demographics[0].is_unsigned());
    }
}
