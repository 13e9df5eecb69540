//! Geo-unit hierarchy derived from a region's topology.
//!
//! The hierarchy mirrors the shape of every valid district plan for the
//! region: roots are the coarsest units, and each node's children are the
//! next finer level's units whose parent-key property names it.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{TopologyError, TopologyResult};
use crate::topojson::Topology;

/// Location of a unit's geometry inside the topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitRef {
    /// Depth in the hierarchy; 0 is the coarsest level.
    pub level: usize,
    /// Position within the level's geometry collection.
    pub position: usize,
    /// Index into this level's static arrays.
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoUnitNode {
    pub unit: UnitRef,
    /// Set on finest-level units only. A coarser unit with no children
    /// is not a base unit.
    pub base: bool,
    /// Empty at the base level.
    pub children: Vec<GeoUnitNode>,
}

impl GeoUnitNode {
    pub fn is_base(&self) -> bool {
        self.base
    }

    /// Number of base units under (and including) this node.
    pub fn base_count(&self) -> usize {
        if self.base {
            1
        } else {
            self.children.iter().map(GeoUnitNode::base_count).sum()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hierarchy {
    /// Level ids, coarsest first.
    pub levels: Vec<String>,
    pub roots: Vec<GeoUnitNode>,
}

impl Hierarchy {
    /// Build the hierarchy for `levels` (coarsest first).
    ///
    /// Groups every level's polygonal geometries by their parent key in one
    /// pass, then assembles nodes top-down. A geometry without the expected
    /// key, or naming a parent that does not exist, fails the whole build.
    pub fn build(topology: &Topology, levels: &[String]) -> TopologyResult<Self> {
        if levels.is_empty() {
            return Err(TopologyError::NoLevels);
        }

        let collections = levels
            .iter()
            .map(|level| topology.collection(level))
            .collect::<TopologyResult<Vec<_>>>()?;

        // children[i]: parent key at level i -> child positions at level i + 1
        let mut children: Vec<HashMap<String, Vec<usize>>> = Vec::with_capacity(levels.len());
        for (depth, parent_level) in levels.iter().enumerate().take(levels.len() - 1) {
            let mut groups = HashMap::with_capacity(collections[depth].len());
            for (position, geometry) in collections[depth].iter().enumerate() {
                let key = geometry.property_key(parent_level).ok_or_else(|| {
                    TopologyError::MissingKey {
                        level: parent_level.clone(),
                        position,
                        key: parent_level.clone(),
                    }
                })?;
                groups.entry(key).or_insert_with(Vec::new);
            }

            let child_level = &levels[depth + 1];
            for (position, geometry) in collections[depth + 1].iter().enumerate() {
                if !geometry.is_polygonal() {
                    continue;
                }
                let key = geometry.property_key(parent_level).ok_or_else(|| {
                    TopologyError::MissingKey {
                        level: child_level.clone(),
                        position,
                        key: parent_level.clone(),
                    }
                })?;
                let group = groups
                    .get_mut(&key)
                    .ok_or_else(|| TopologyError::UnknownParent {
                        level: child_level.clone(),
                        position,
                        parent: parent_level.clone(),
                        key: key.clone(),
                    })?;
                group.push(position);
            }
            children.push(groups);
        }

        let builder = NodeBuilder {
            topology_levels: &collections,
            levels,
            children: &children,
        };
        let roots = (0..collections[0].len())
            .map(|position| builder.node(0, position))
            .collect::<TopologyResult<Vec<_>>>()?;

        debug!(
            levels = ?levels,
            roots = roots.len(),
            "geo-unit hierarchy built"
        );
        Ok(Self {
            levels: levels.to_vec(),
            roots,
        })
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Base-unit geometry positions in hierarchy order.
    pub fn base_units(&self) -> Vec<UnitRef> {
        fn walk(node: &GeoUnitNode, out: &mut Vec<UnitRef>) {
            if node.is_base() {
                out.push(node.unit);
            } else {
                node.children.iter().for_each(|child| walk(child, out));
            }
        }
        let mut out = Vec::new();
        self.roots.iter().for_each(|root| walk(root, &mut out));
        out
    }
}

struct NodeBuilder<'a> {
    topology_levels: &'a [&'a [crate::topojson::Geometry]],
    levels: &'a [String],
    children: &'a [HashMap<String, Vec<usize>>],
}

impl NodeBuilder<'_> {
    fn node(&self, depth: usize, position: usize) -> TopologyResult<GeoUnitNode> {
        let geometry = &self.topology_levels[depth][position];
        let unit = UnitRef {
            level: depth,
            position,
            index: geometry.numeric_id().unwrap_or(position as u32),
        };

        if depth + 1 == self.levels.len() {
            return Ok(GeoUnitNode {
                unit,
                base: true,
                children: Vec::new(),
            });
        }

        let level = &self.levels[depth];
        let key = geometry
            .property_key(level)
            .ok_or_else(|| TopologyError::MissingKey {
                level: level.clone(),
                position,
                key: level.clone(),
            })?;
        let child_positions = self.children[depth]
            .get(&key)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let children = child_positions
            .iter()
            .map(|child| self.node(depth + 1, *child))
            .collect::<TopologyResult<Vec<_>>>()?;
        Ok(GeoUnitNode {
            unit,
            base: false,
            children,
        })
    }
}
