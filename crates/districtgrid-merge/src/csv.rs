//! Block-level plan import and export.
//!
//! Both directions walk the region hierarchy: import builds a plan from a
//! base-unit id → district map, export flattens a plan back into
//! `(base unit id, district)` rows.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use district_core::{DefinitionNode, DistrictsDefinition};
use districtgrid_topology::{GeoUnitNode, RegionTopology};

/// Problems found while importing a block assignment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    /// Ids in the input that name no base unit of the region.
    pub unknown_block_ids: Vec<String>,
    /// Base units the input did not mention; they are left unassigned.
    pub unassigned_units: usize,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.unknown_block_ids.is_empty() && self.unassigned_units == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Import {
    pub definition: DistrictsDefinition,
    pub report: ImportReport,
}

/// Build a plan from a base-unit id → district map.
///
/// Below the top level, a branch whose children all carry the same district
/// collapses to that district. Single-child branches are kept as they are.
pub fn import_from_csv(region: &RegionTopology, block_to_district: &HashMap<String, u32>) -> Import {
    let mut walk = ImportWalk {
        region,
        block_to_district,
        seen: HashSet::new(),
        unassigned: 0,
    };
    // The list of top-level entries itself is never collapsed.
    let definition = DistrictsDefinition(
        region
            .hierarchy
            .roots
            .iter()
            .map(|root| walk.node(root))
            .collect(),
    );

    let unknown_block_ids: BTreeSet<&String> = block_to_district
        .keys()
        .filter(|id| !walk.seen.contains(id.as_str()))
        .collect();
    if !unknown_block_ids.is_empty() {
        warn!(
            region = %region.region_id,
            unknown = unknown_block_ids.len(),
            "import references unknown block ids"
        );
    }

    Import {
        definition,
        report: ImportReport {
            unknown_block_ids: unknown_block_ids.into_iter().cloned().collect(),
            unassigned_units: walk.unassigned,
        },
    }
}

struct ImportWalk<'a> {
    region: &'a RegionTopology,
    block_to_district: &'a HashMap<String, u32>,
    seen: HashSet<String>,
    unassigned: usize,
}

impl ImportWalk<'_> {
    fn node(&mut self, unit: &GeoUnitNode) -> DefinitionNode {
        if unit.is_base() {
            let district = match self.region.base_unit_id(&unit.unit) {
                Some(id) => {
                    let district = self.block_to_district.get(&id).copied();
                    self.seen.insert(id);
                    district
                }
                None => None,
            };
            if district.is_none() {
                self.unassigned += 1;
            }
            return DefinitionNode::Leaf(district.unwrap_or(0));
        }

        let children: Vec<DefinitionNode> =
            unit.children.iter().map(|child| self.node(child)).collect();
        collapse(children)
    }
}

fn collapse(children: Vec<DefinitionNode>) -> DefinitionNode {
    if let [DefinitionNode::Leaf(first), rest @ ..] = children.as_slice() {
        if !rest.is_empty() && rest.iter().all(|c| *c == DefinitionNode::Leaf(*first)) {
            return DefinitionNode::Leaf(*first);
        }
    }
    DefinitionNode::Branch(children)
}

/// Flatten a plan into `(base unit id, district)` rows in hierarchy order.
///
/// `None` if the plan does not fit the hierarchy.
pub fn export_to_csv(
    region: &RegionTopology,
    definition: &DistrictsDefinition,
) -> Option<Vec<(String, u32)>> {
    if definition.len() != region.hierarchy.roots.len() {
        return None;
    }
    let capacity = region.hierarchy.roots.iter().map(GeoUnitNode::base_count).sum();
    let mut rows = Vec::with_capacity(capacity);
    for (node, root) in definition.nodes().iter().zip(&region.hierarchy.roots) {
        export_node(region, node, root, &mut rows)?;
    }
    debug!(region = %region.region_id, rows = rows.len(), "plan exported");
    Some(rows)
}

fn export_node(
    region: &RegionTopology,
    node: &DefinitionNode,
    unit: &GeoUnitNode,
    rows: &mut Vec<(String, u32)>,
) -> Option<()> {
    match node {
        DefinitionNode::Leaf(district) => {
            push_subtree(region, unit, *district, rows);
        }
        DefinitionNode::Branch(children) => {
            if unit.is_base() || children.len() != unit.children.len() {
                return None;
            }
            for (child, child_unit) in children.iter().zip(&unit.children) {
                export_node(region, child, child_unit, rows)?;
            }
        }
    }
    Some(())
}

fn push_subtree(
    region: &RegionTopology,
    unit: &GeoUnitNode,
    district: u32,
    rows: &mut Vec<(String, u32)>,
) {
    if unit.is_base() {
        if let Some(id) = region.base_unit_id(&unit.unit) {
            rows.push((id, district));
        }
        return;
    }
    for child in &unit.children {
        push_subtree(region, child, district, rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use districtgrid_topology::testing::test_region;

    fn map(pairs: &[(&str, u32)]) -> HashMap<String, u32> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn import_collapses_uniform_counties() {
        let region = test_region();
        let import = import_from_csv(&region, &map(&[("t0", 1), ("t1", 2), ("t2", 2)]));
        // County B's two tracts share a district and fold into one leaf;
        // county A has a single tract and stays a branch.
        assert_eq!(
            import.definition,
            DistrictsDefinition(vec![
                DefinitionNode::Branch(vec![DefinitionNode::Leaf(1)]),
                DefinitionNode::Leaf(2),
            ])
        );
        assert!(import.report.is_clean());
    }

    #[test]
    fn import_keeps_split_counties_and_single_children() {
        let region = test_region();
        let import = import_from_csv(&region, &map(&[("t0", 3), ("t1", 1), ("t2", 2)]));
        assert_eq!(
            import.definition,
            DistrictsDefinition(vec![
                DefinitionNode::Branch(vec![DefinitionNode::Leaf(3)]),
                DefinitionNode::Branch(vec![DefinitionNode::Leaf(1), DefinitionNode::Leaf(2)]),
            ])
        );
    }

    #[test]
    fn import_reports_unknown_and_missing_blocks() {
        let region = test_region();
        let import = import_from_csv(&region, &map(&[("t1", 1), ("t2", 1), ("zz", 4)]));
        assert_eq!(import.report.unknown_block_ids, vec!["zz".to_string()]);
        assert_eq!(import.report.unassigned_units, 1);
        assert_eq!(
            import.definition.nodes()[0],
            DefinitionNode::Branch(vec![DefinitionNode::Leaf(0)])
        );
        assert_eq!(import.definition.nodes()[1], DefinitionNode::Leaf(1));
    }

    #[test]
    fn export_expands_leaves_over_subtrees() {
        let region = test_region();
        let definition = DistrictsDefinition(vec![
            DefinitionNode::Leaf(2),
            DefinitionNode::Branch(vec![DefinitionNode::Leaf(1), DefinitionNode::Leaf(0)]),
        ]);
        let rows = export_to_csv(&region, &definition).unwrap();
        assert_eq!(
            rows,
            vec![
                ("t0".to_string(), 2),
                ("t1".to_string(), 1),
                ("t2".to_string(), 0),
            ]
        );
    }

    #[test]
    fn export_round_trips_through_import() {
        let region = test_region();
        let blocks = map(&[("t0", 1), ("t1", 1), ("t2", 2)]);
        let import = import_from_csv(&region, &blocks);
        let rows: HashMap<String, u32> = export_to_csv(&region, &import.definition)
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(rows, blocks);
    }

    #[test]
    fn export_rejects_mismatched_plans() {
        let region = test_region();
        assert!(export_to_csv(&region, &DistrictsDefinition::uniform(3, 1)).is_none());
        let bad = DistrictsDefinition(vec![
            DefinitionNode::Leaf(1),
            DefinitionNode::Branch(vec![DefinitionNode::Leaf(1)]),
        ]);
        assert!(export_to_csv(&region, &bad).is_none());
    }
}
