//! End-to-end merges over small hand-built regions.

use std::collections::HashMap;

use district_core::{
    Contiguity, Creator, DefinitionNode, DistrictsDefinition, StaticMetadata, TypedArray,
};
use districtgrid_merge::index::base_indices_for;
use districtgrid_merge::{assign, merge};
use districtgrid_topology::testing::{test_region, test_region_config, test_region_data};
use districtgrid_topology::{RegionData, RegionTopology, StaticData};

/// Three unit-square counties in a row, no further subdivision.
const COUNTIES: &str = r#"{
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
            {"type": "Polygon", "arcs": [[0, 1]], "properties": {"county": "c0"}},
            {"type": "Polygon", "arcs": [[-2, 2, 3, 4]], "properties": {"county": "c1"}},
            {"type": "Polygon", "arcs": [[-4, 5]], "properties": {"county": "c2"}}
        ]}
    }
}"#;

fn counties() -> (RegionTopology, RegionData) {
    let metadata: StaticMetadata = serde_json::from_str(
        r#"{
            "demographics": [{"id": "population", "fileName": "population.buf", "bytesPerElement": 4}],
            "geoLevels": [],
            "geoLevelHierarchy": [{"id": "county"}]
        }"#,
    )
    .unwrap();
    let region = RegionTopology::from_slice("counties", COUNTIES.as_bytes(), &metadata).unwrap();
    let data = RegionData {
        region: test_region_config(),
        metadata,
        data: StaticData {
            demographics: vec![TypedArray::U32(vec![10, 20, 30])],
            ..StaticData::default()
        },
    };
    (region, data)
}

fn plan(districts: &[u32]) -> DistrictsDefinition {
    DistrictsDefinition(districts.iter().map(|&d| DefinitionNode::Leaf(d)).collect())
}

#[test]
fn every_county_assigned() {
    let (region, data) = counties();
    let geojson = merge(&region, &data, Some(&plan(&[1, 2, 3])), 3, Creator::default(), None)
        .unwrap()
        .unwrap();

    let ids: Vec<u32> = geojson.features.iter().map(|f| f.id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);
    assert!(geojson.metadata.completed);
    assert!(geojson.features[0].geometry.is_empty());
    for (feature, population) in geojson.features[1..].iter().zip([10, 20, 30]) {
        assert_eq!(feature.properties.demographics["population"], population);
        assert_eq!(feature.properties.contiguity, Contiguity::Contiguous);
        assert!(feature.properties.compactness > 0.0 && feature.properties.compactness <= 1.0);
        assert_eq!(feature.geometry.coordinates.len(), 1);
        assert!(feature.properties.voting.is_empty());
    }
}

#[test]
fn unassigned_county_leaves_plan_incomplete() {
    let (region, data) = counties();
    let geojson = merge(&region, &data, Some(&plan(&[0, 1, 2])), 3, Creator::default(), None)
        .unwrap()
        .unwrap();

    assert_eq!(geojson.features.len(), 4);
    assert!(!geojson.metadata.completed);
    assert_eq!(geojson.features[0].properties.demographics["population"], 10);

    // District 3 received nothing.
    let empty = &geojson.features[3];
    assert!(empty.geometry.is_empty());
    assert_eq!(empty.properties.compactness, 0.0);
    assert_eq!(empty.properties.contiguity, Contiguity::Unknown);
    assert_eq!(empty.properties.demographics["population"], 0);
}

#[test]
fn split_district_is_non_contiguous() {
    let (region, data) = counties();
    let geojson = merge(&region, &data, Some(&plan(&[1, 2, 1])), 2, Creator::default(), None)
        .unwrap()
        .unwrap();

    let split = &geojson.features[1];
    assert_eq!(split.geometry.coordinates.len(), 2);
    assert_eq!(split.properties.contiguity, Contiguity::NonContiguous);
    assert_eq!(split.properties.compactness, 0.0);
    assert_eq!(split.properties.demographics["population"], 40);
}

#[test]
fn adjacent_counties_merge_into_one_outline() {
    let (region, data) = counties();
    let geojson = merge(&region, &data, Some(&plan(&[1, 1, 1])), 1, Creator::default(), None)
        .unwrap()
        .unwrap();

    let district = &geojson.features[1];
    assert_eq!(district.geometry.coordinates.len(), 1);
    let exterior = &district.geometry.coordinates[0][0];
    assert!(!exterior.contains(&[1.5, 0.5]));
    assert!(exterior.contains(&[3.0, 1.0]));
    assert!(exterior.contains(&[0.0, 0.0]));
    assert_eq!(district.properties.contiguity, Contiguity::Contiguous);
    // A 3x1 rectangle scores well below a square.
    assert!(district.properties.compactness < 0.65);
}

#[test]
fn mismatched_shapes_are_rejected() {
    let (region, data) = counties();
    let creator = Creator::default();

    assert!(merge(&region, &data, Some(&plan(&[1, 2])), 3, creator.clone(), None)
        .unwrap()
        .is_none());

    let nested = DistrictsDefinition(vec![
        DefinitionNode::Leaf(1),
        DefinitionNode::Branch(vec![DefinitionNode::Leaf(2)]),
        DefinitionNode::Leaf(3),
    ]);
    assert!(merge(&region, &data, Some(&nested), 3, creator, None)
        .unwrap()
        .is_none());
}

#[test]
fn serialized_field_names() {
    let (region, data) = counties();
    let geojson = merge(&region, &data, Some(&plan(&[1, 2, 1])), 2, Creator::default(), None)
        .unwrap()
        .unwrap();
    let json = serde_json::to_value(&geojson).unwrap();

    assert_eq!(json["type"], "FeatureCollection");
    assert_eq!(json["features"][0]["type"], "Feature");
    assert_eq!(json["features"][0]["geometry"]["type"], "MultiPolygon");
    assert_eq!(json["features"][1]["properties"]["contiguity"], "non-contiguous");
    assert_eq!(json["features"][0]["properties"]["contiguity"], "");
    assert_eq!(json["metadata"]["regionConfig"]["s3URI"], "s3://test-bucket/regions/test/");
    assert!(json["metadata"].get("chamber").is_none());
}

#[test]
fn base_units_partition_across_districts() {
    let region = test_region();
    let data = test_region_data();
    let levels = data.data.levels_coarse_to_fine();
    let plans = [
        DistrictsDefinition(vec![DefinitionNode::Leaf(1), DefinitionNode::Leaf(2)]),
        DistrictsDefinition(vec![
            DefinitionNode::Leaf(2),
            DefinitionNode::Branch(vec![DefinitionNode::Leaf(1), DefinitionNode::Leaf(2)]),
        ]),
        DistrictsDefinition(vec![
            DefinitionNode::Branch(vec![DefinitionNode::Leaf(1)]),
            DefinitionNode::Branch(vec![DefinitionNode::Leaf(1), DefinitionNode::Leaf(1)]),
        ]),
    ];

    for definition in &plans {
        let buckets = assign(definition, &region.hierarchy, 2).unwrap();
        let mut seen: HashMap<u32, usize> = HashMap::new();
        for by_level in &buckets {
            for (level, units) in by_level.iter().enumerate() {
                let ids = units.iter().map(|u| u.index).collect();
                for base in base_indices_for(&levels, level, ids) {
                    *seen.entry(base).or_default() += 1;
                }
            }
        }
        let mut covered: Vec<u32> = seen.keys().copied().collect();
        covered.sort_unstable();
        assert_eq!(covered, vec![0, 1, 2], "plan {definition:?}");
        assert!(seen.values().all(|&n| n == 1), "plan {definition:?}");
    }
}

#[test]
fn mixed_levels_aggregate_correctly() {
    let region = test_region();
    let data = test_region_data();
    let definition = DistrictsDefinition(vec![
        DefinitionNode::Leaf(1),
        DefinitionNode::Branch(vec![DefinitionNode::Leaf(1), DefinitionNode::Leaf(2)]),
    ]);
    let geojson = merge(&region, &data, Some(&definition), 2, Creator::default(), None)
        .unwrap()
        .unwrap();

    let one = &geojson.features[1].properties;
    assert_eq!(one.demographics["population"], 60);
    assert_eq!(one.voting["dem16"], 25);
    assert_eq!(one.contiguity, Contiguity::Contiguous);
    assert_eq!(geojson.features[2].properties.voting["dem16"], 20);
}
