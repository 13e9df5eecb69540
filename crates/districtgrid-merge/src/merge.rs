//! District merging: plan + hierarchy → per-district outlines and totals.

use geo::MultiPolygon;
use tracing::debug;

use district_core::{
    Chamber, CollectionKind, Creator, DefinitionNode, DistrictFeature, DistrictProperties,
    DistrictsDefinition, DistrictsGeoJson, DistrictsMetadata, FeatureKind, MultiPolygonGeometry,
    Ring,
};
use districtgrid_topology::{
    GeoUnitNode, Hierarchy, RegionData, RegionTopology, TopologyResult, UnitRef, merge_arcs,
};

use crate::compactness::polsby_popper;
use crate::index::{base_indices_for, demographics, voting};

/// Units assigned to each district, bucketed by hierarchy level:
/// `buckets[district][level]`.
pub type Buckets = Vec<Vec<Vec<UnitRef>>>;

/// Merge a plan into one feature per district id `0..=number_of_districts`.
///
/// Returns `Ok(None)` when the plan does not fit the region's hierarchy;
/// nothing is computed in that case. A missing plan leaves every unit
/// unassigned.
pub fn merge(
    region: &RegionTopology,
    data: &RegionData,
    definition: Option<&DistrictsDefinition>,
    number_of_districts: u32,
    creator: Creator,
    chamber: Option<Chamber>,
) -> TopologyResult<Option<DistrictsGeoJson>> {
    let unassigned;
    let definition = match definition {
        Some(definition) => definition,
        None => {
            unassigned = DistrictsDefinition::uniform(region.hierarchy.roots.len(), 0);
            &unassigned
        }
    };

    let Some(buckets) = assign(definition, &region.hierarchy, number_of_districts) else {
        debug!(region = %region.region_id, "definition does not match hierarchy");
        return Ok(None);
    };

    let levels = data.data.levels_coarse_to_fine();
    let mut features = Vec::with_capacity(buckets.len());
    for (id, by_level) in buckets.iter().enumerate() {
        let polygons: Vec<_> = by_level
            .iter()
            .flatten()
            .flat_map(|unit| region.polygons_for(unit))
            .collect();
        let outline = merge_arcs(&region.topology, &polygons)?;

        let mut base_indices = Vec::new();
        for (level, units) in by_level.iter().enumerate() {
            let ids = units.iter().map(|unit| unit.index).collect();
            base_indices.extend(base_indices_for(&levels, level, ids));
        }

        let (compactness, contiguity) = polsby_popper(&outline);
        features.push(DistrictFeature {
            kind: FeatureKind::Feature,
            id: id as u32,
            geometry: to_geometry(&outline),
            properties: DistrictProperties {
                demographics: demographics(&base_indices, &data.metadata, &data.data),
                voting: voting(&base_indices, &data.metadata, &data.data),
                compactness,
                contiguity,
            },
        });
    }

    let completed = features
        .first()
        .is_none_or(|unassigned| unassigned.geometry.is_empty());
    debug!(
        region = %region.region_id,
        districts = number_of_districts,
        completed,
        "districts merged"
    );

    Ok(Some(DistrictsGeoJson {
        kind: CollectionKind::FeatureCollection,
        features,
        metadata: DistrictsMetadata {
            completed,
            chamber,
            creator,
            region_config: (&data.region).into(),
        },
    }))
}

/// Walk the plan and hierarchy in lock-step, bucketing subtrees by district.
///
/// `None` if any branch length differs from its node's child count, a
/// branch sits on a base unit, or a district id exceeds
/// `number_of_districts`.
pub fn assign(
    definition: &DistrictsDefinition,
    hierarchy: &Hierarchy,
    number_of_districts: u32,
) -> Option<Buckets> {
    if definition.len() != hierarchy.roots.len() {
        return None;
    }
    let mut buckets: Buckets =
        vec![vec![Vec::new(); hierarchy.depth()]; number_of_districts as usize + 1];
    for (node, root) in definition.nodes().iter().zip(&hierarchy.roots) {
        assign_node(node, root, &mut buckets)?;
    }
    Some(buckets)
}

fn assign_node(node: &DefinitionNode, unit: &GeoUnitNode, buckets: &mut Buckets) -> Option<()> {
    match node {
        DefinitionNode::Leaf(district) => {
            let bucket = buckets.get_mut(*district as usize)?;
            bucket[unit.unit.level].push(unit.unit);
        }
        DefinitionNode::Branch(children) => {
            if unit.is_base() || children.len() != unit.children.len() {
                return None;
            }
            for (child, child_unit) in children.iter().zip(&unit.children) {
                assign_node(child, child_unit, buckets)?;
            }
        }
    }
    Some(())
}

fn to_geometry(outline: &MultiPolygon<f64>) -> MultiPolygonGeometry {
    let ring = |line: &geo::LineString<f64>| -> Ring { line.0.iter().map(|c| [c.x, c.y]).collect() };
    MultiPolygonGeometry::new(
        outline
            .0
            .iter()
            .map(|polygon| {
                std::iter::once(ring(polygon.exterior()))
                    .chain(polygon.interiors().iter().map(ring))
                    .collect()
            })
            .collect(),
    )
}
