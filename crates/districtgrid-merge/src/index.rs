//! Translation between per-level unit indices and base-unit indices.
//!
//! Each non-base level has a parent-index array indexed by the next finer
//! level's units. Walking those arrays coarse to fine turns a set of units
//! at any level into the base units they contain.

use std::collections::HashSet;

use district_core::{Counts, StaticFile, StaticMetadata, TypedArray};
use districtgrid_topology::StaticData;

/// Every position in `level` whose stored parent index is in `values`.
pub fn indices_matching(level: &TypedArray, values: &HashSet<i64>) -> Vec<u32> {
    level
        .iter()
        .enumerate()
        .filter(|(_, parent)| values.contains(parent))
        .map(|(i, _)| i as u32)
        .collect()
}

/// Narrow unit indices at `start_level` down to base-unit indices.
///
/// `levels` holds the parent-index arrays coarsest first, so
/// `levels[l]` maps units at level `l + 1` to their parent at level `l`.
/// Indices at `levels.len()` are already base indices.
pub fn base_indices_for(levels: &[&TypedArray], start_level: usize, ids: Vec<u32>) -> Vec<u32> {
    let mut ids = ids;
    for level in levels.iter().skip(start_level) {
        if ids.is_empty() {
            break;
        }
        let values: HashSet<i64> = ids.iter().map(|&id| i64::from(id)).collect();
        ids = indices_matching(level, &values);
    }
    ids
}

/// Sum each category at `indices`, one key per category.
///
/// Indices past the end of an array contribute nothing.
pub fn aggregate(indices: &[u32], files: &[StaticFile], arrays: &[TypedArray]) -> Counts {
    files
        .iter()
        .zip(arrays)
        .map(|(file, array)| {
            let total = indices
                .iter()
                .filter_map(|&i| array.get(i as usize))
                .sum();
            (file.id.clone(), total)
        })
        .collect()
}

pub fn demographics(indices: &[u32], metadata: &StaticMetadata, data: &StaticData) -> Counts {
    aggregate(indices, &metadata.demographics, &data.demographics)
}

/// Empty for regions published without election data.
pub fn voting(indices: &[u32], metadata: &StaticMetadata, data: &StaticData) -> Counts {
    aggregate(indices, &metadata.voting, &data.voting)
}
