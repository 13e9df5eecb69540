//! A region's parsed topology together with its derived hierarchy.

use std::collections::BTreeMap;
use std::mem::size_of;

use serde_json::Value;
use tracing::info;

use district_core::StaticMetadata;

use crate::error::{TopologyError, TopologyResult};
use crate::hierarchy::{Hierarchy, UnitRef};
use crate::topojson::{Geometry, PolygonArcs, Position, Properties, Topology};

/// Per-node hierarchy overhead: a geometry pointer, a child vector and the
/// parent's pointer to the node.
const HIERARCHY_BYTES_PER_FEATURE: u64 = 32;

/// Immutable, per-region data a worker caches between tasks.
#[derive(Debug)]
pub struct RegionTopology {
    pub region_id: String,
    pub topology: Topology,
    pub hierarchy: Hierarchy,
    /// Id of the finest geo-level.
    pub base_level: String,
}

impl RegionTopology {
    /// Parse `topo.json` bytes and derive the hierarchy.
    pub fn from_slice(
        region_id: &str,
        bytes: &[u8],
        metadata: &StaticMetadata,
    ) -> TopologyResult<Self> {
        let topology = Topology::from_slice(bytes)?;
        Self::build(region_id, topology, metadata)
    }

    pub fn build(
        region_id: &str,
        topology: Topology,
        metadata: &StaticMetadata,
    ) -> TopologyResult<Self> {
        let levels = metadata.levels_coarse_to_fine();
        let base_level = metadata
            .base_level_id()
            .ok_or(TopologyError::NoLevels)?
            .to_string();
        let hierarchy = Hierarchy::build(&topology, &levels)?;

        info!(
            region = %region_id,
            arcs = topology.arcs.len(),
            roots = hierarchy.roots.len(),
            "region topology ready"
        );
        Ok(Self {
            region_id: region_id.to_string(),
            topology,
            hierarchy,
            base_level,
        })
    }

    /// Properties of every geometry, keyed by object name.
    ///
    /// Objects that are not geometry collections map to an empty list.
    pub fn properties(&self) -> BTreeMap<String, Vec<Properties>> {
        self.topology
            .objects
            .iter()
            .map(|(name, object)| {
                let list = match object {
                    Geometry::GeometryCollection { geometries, .. } => geometries
                        .iter()
                        .map(|g| g.properties().cloned().unwrap_or_default())
                        .collect(),
                    _ => Vec::new(),
                };
                (name.clone(), list)
            })
            .collect()
    }

    fn geometry(&self, unit: &UnitRef) -> Option<&Geometry> {
        let level = self.hierarchy.levels.get(unit.level)?;
        self.topology.collection(level).ok()?.get(unit.position)
    }

    /// Polygons making up a unit's geometry.
    pub fn polygons_for(&self, unit: &UnitRef) -> Vec<&PolygonArcs> {
        self.geometry(unit).map(Geometry::polygons).unwrap_or_default()
    }

    /// External id of a base unit (its base-level property).
    pub fn base_unit_id(&self, unit: &UnitRef) -> Option<String> {
        self.geometry(unit)?.property_key(&self.base_level)
    }

    /// Approximate in-memory footprint of the topology and its hierarchy.
    pub fn estimated_size(&self) -> u64 {
        estimated_size(&self.topology)
    }
}

/// Footprint estimate used to precompute a region's `layerSizeInBytes`.
pub fn estimated_size(topology: &Topology) -> u64 {
    let arcs: u64 = topology
        .arcs
        .iter()
        .map(|arc| (size_of::<Vec<Position>>() + arc.len() * size_of::<Position>()) as u64)
        .sum();

    let mut features = 0u64;
    let mut objects = 0u64;
    for (name, object) in &topology.objects {
        objects += name.len() as u64 + geometry_size(object);
        if let Geometry::GeometryCollection { geometries, .. } = object {
            features += geometries.len() as u64;
        }
    }

    arcs + objects + features * HIERARCHY_BYTES_PER_FEATURE
}

fn geometry_size(geometry: &Geometry) -> u64 {
    let base = size_of::<Geometry>() as u64;
    match geometry {
        Geometry::Polygon { arcs, properties, .. } => {
            base + rings_size(arcs) + properties_size(properties)
        }
        Geometry::MultiPolygon { arcs, properties, .. } => {
            base + arcs.iter().map(rings_size).sum::<u64>() + properties_size(properties)
        }
        Geometry::GeometryCollection { geometries, properties } => {
            base + geometries.iter().map(geometry_size).sum::<u64>() + properties_size(properties)
        }
        Geometry::Other => base,
    }
}

fn rings_size(rings: &PolygonArcs) -> u64 {
    rings
        .iter()
        .map(|ring| (size_of::<Vec<i64>>() + ring.len() * size_of::<i64>()) as u64)
        .sum()
}

fn properties_size(properties: &Properties) -> u64 {
    properties
        .iter()
        .map(|(key, value)| key.len() as u64 + value_size(value))
        .sum()
}

fn value_size(value: &Value) -> u64 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 4,
        Value::Number(_) => 8,
        Value::String(s) => s.len() as u64,
        Value::Array(items) => items.iter().map(value_size).sum(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| k.len() as u64 + value_size(v))
            .sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use district_core::{GeoLevelInfo, StaticFile};

    fn test_metadata() -> StaticMetadata {
        let file = |id: &str| StaticFile {
            id: id.to_string(),
            file_name: format!("{id}.buf"),
            bytes_per_element: 2,
            unsigned: None,
        };
        let level = |id: &str| GeoLevelInfo {
            id: id.to_string(),
            min_zoom: None,
            max_zoom: None,
        };
        StaticMetadata {
            demographics: vec![file("population")],
            geo_levels: vec![file("county")],
            voting: Vec::new(),
            bbox: [0.0; 4],
            geo_level_hierarchy: vec![level("block"), level("county")],
            demographics_groups: None,
        }
    }

    fn test_topology_json() -> &'static str {
        r#"{
            "type": "Topology",
            "arcs": [[[0, 0], [1, 0], [1, 1], [0, 0]]],
            "objects": {
                "county": {"type": "GeometryCollection", "geometries": [
                    {"type": "Polygon", "arcs": [[0]], "properties": {"county": "A", "name": "Adams"}}
                ]},
                "block": {"type": "GeometryCollection", "geometries": [
                    {"type": "Polygon", "arcs": [[0]], "id": 0, "properties": {"block": "b0", "county": "A"}},
                    {"type": "Point", "coordinates": [0, 0]}
                ]},
                "outline": {"type": "Polygon", "arcs": [[0]]}
            }
        }"#
    }

    #[test]
    fn builds_hierarchy_from_metadata_levels() {
        let region =
            RegionTopology::from_slice("PA", test_topology_json().as_bytes(), &test_metadata())
                .unwrap();
        assert_eq!(region.base_level, "block");
        assert_eq!(region.hierarchy.levels, vec!["county", "block"]);
        let base = region.hierarchy.base_units();
        assert_eq!(base.len(), 1);
        assert_eq!(region.base_unit_id(&base[0]).as_deref(), Some("b0"));
        assert_eq!(region.polygons_for(&base[0]).len(), 1);
    }

    #[test]
    fn properties_per_object() {
        let region =
            RegionTopology::from_slice("PA", test_topology_json().as_bytes(), &test_metadata())
                .unwrap();
        let props = region.properties();
        assert_eq!(props["county"].len(), 1);
        assert_eq!(props["county"][0]["name"], "Adams");
        // Non-polygonal geometries still get an (empty) entry.
        assert_eq!(props["block"].len(), 2);
        assert!(props["block"][1].is_empty());
        assert!(props["outline"].is_empty());
    }

    #[test]
    fn size_estimate_counts_features() {
        let topology = Topology::from_slice(test_topology_json().as_bytes()).unwrap();
        let size = estimated_size(&topology);
        assert!(size >= 3 * HIERARCHY_BYTES_PER_FEATURE);

        let mut bigger = topology.clone();
        bigger.arcs.push(vec![Position(0.0, 0.0); 100]);
        assert!(estimated_size(&bigger) > size + 100 * 16);
    }
}
