//! Shared-arc polygon merging.
//!
//! Polygons that share an arc are grouped; arcs used by exactly one polygon
//! in a group form its outer boundary, and are stitched back into rings.
//! Interior borders cancel out without any geometric clipping.

use std::collections::{HashMap, VecDeque};

use geo::{Coord, LineString, MultiPolygon, Polygon};

use crate::error::{TopologyError, TopologyResult};
use crate::topojson::{PolygonArcs, Position, Topology, arc_index};

/// Merge polygons into a multipolygon with one part per connected group.
///
/// The largest ring of each part (by planar area) becomes its exterior.
pub fn merge_arcs(
    topology: &Topology,
    polygons: &[&PolygonArcs],
) -> TopologyResult<MultiPolygon<f64>> {
    let mut polygons_by_arc: HashMap<usize, Vec<usize>> = HashMap::new();
    for (p, polygon) in polygons.iter().enumerate() {
        for ring in polygon.iter() {
            for arc in ring {
                polygons_by_arc.entry(arc_index(*arc)).or_default().push(p);
            }
        }
    }

    // Connected components over shared arcs.
    let mut visited = vec![false; polygons.len()];
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for start in 0..polygons.len() {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        let mut group = Vec::new();
        let mut neighbors = vec![start];
        while let Some(p) = neighbors.pop() {
            group.push(p);
            for ring in polygons[p].iter() {
                for arc in ring {
                    for &q in &polygons_by_arc[&arc_index(*arc)] {
                        if !visited[q] {
                            visited[q] = true;
                            neighbors.push(q);
                        }
                    }
                }
            }
        }
        groups.push(group);
    }

    let mut parts = Vec::with_capacity(groups.len());
    for group in groups {
        let mut exterior_arcs = Vec::new();
        for &p in &group {
            for ring in polygons[p].iter() {
                for arc in ring {
                    if polygons_by_arc[&arc_index(*arc)].len() < 2 {
                        exterior_arcs.push(*arc);
                    }
                }
            }
        }

        let mut rings = stitch(topology, exterior_arcs)?
            .into_iter()
            .map(|fragment| ring_positions(topology, &fragment))
            .collect::<TopologyResult<Vec<_>>>()?;
        if rings.is_empty() {
            continue;
        }

        let mut largest = planar_ring_area(&rings[0]);
        for i in 1..rings.len() {
            let area = planar_ring_area(&rings[i]);
            if area > largest {
                rings.swap(0, i);
                largest = area;
            }
        }

        let mut rings = rings.into_iter().map(to_line_string);
        if let Some(exterior) = rings.next() {
            parts.push(Polygon::new(exterior, rings.collect()));
        }
    }

    Ok(MultiPolygon::new(parts))
}

type EndpointKey = (u64, u64);

fn key(position: Position) -> EndpointKey {
    (position.0.to_bits(), position.1.to_bits())
}

struct Fragment {
    arcs: VecDeque<i64>,
    start: EndpointKey,
    end: EndpointKey,
}

/// Join arcs end-to-start into closed fragments.
pub fn stitch(topology: &Topology, mut arcs: Vec<i64>) -> TopologyResult<Vec<Vec<i64>>> {
    // Degenerate arcs go first so longer arcs can absorb them.
    let mut empty_index = 0;
    for j in 0..arcs.len() {
        let arc = topology
            .arcs
            .get(arc_index(arcs[j]))
            .ok_or(TopologyError::ArcOutOfRange(arcs[j]))?;
        if arc.len() < 3 && arc.len() > 1 && arc[0] == arc[1] {
            arcs.swap(empty_index, j);
            empty_index += 1;
        }
    }

    let mut fragments: Vec<Option<Fragment>> = Vec::new();
    let mut by_start: HashMap<EndpointKey, usize> = HashMap::new();
    let mut by_end: HashMap<EndpointKey, usize> = HashMap::new();

    for &i in &arcs {
        let (start, end) = ends(topology, i)?;

        if let Some(f) = by_end.get(&start).copied() {
            // The endpoint maps only ever point at live fragments.
            let Some(frag) = fragments[f].as_mut() else {
                continue;
            };
            let (f_start, f_end) = {
                by_end.remove(&frag.end);
                frag.arcs.push_back(i);
                frag.end = end;
                (frag.start, frag.end)
            };
            if let Some(g) = by_start.get(&end).copied() {
                by_start.remove(&end);
                if g == f {
                    by_start.insert(f_start, f);
                    by_end.insert(f_end, f);
                } else if let Some(tail) = fragments[g].take() {
                    if let Some(frag) = fragments[f].as_mut() {
                        frag.arcs.extend(tail.arcs);
                        frag.end = tail.end;
                        by_start.insert(frag.start, f);
                        by_end.insert(frag.end, f);
                    }
                }
            } else {
                by_start.insert(f_start, f);
                by_end.insert(f_end, f);
            }
        } else if let Some(f) = by_start.get(&end).copied() {
            let Some(frag) = fragments[f].as_mut() else {
                continue;
            };
            let (f_start, f_end) = {
                by_start.remove(&frag.start);
                frag.arcs.push_front(i);
                frag.start = start;
                (frag.start, frag.end)
            };
            if let Some(g) = by_end.get(&start).copied() {
                by_end.remove(&start);
                if g == f {
                    by_start.insert(f_start, f);
                    by_end.insert(f_end, f);
                } else if let Some(head) = fragments[f].take() {
                    if let Some(frag) = fragments[g].as_mut() {
                        frag.arcs.extend(head.arcs);
                        frag.end = head.end;
                        by_start.insert(frag.start, g);
                        by_end.insert(frag.end, g);
                    }
                }
            } else {
                by_start.insert(f_start, f);
                by_end.insert(f_end, f);
            }
        } else {
            let id = fragments.len();
            fragments.push(Some(Fragment {
                arcs: VecDeque::from([i]),
                start,
                end,
            }));
            by_start.insert(start, id);
            by_end.insert(end, id);
        }
    }

    Ok(fragments
        .into_iter()
        .flatten()
        .map(|fragment| fragment.arcs.into_iter().collect())
        .collect())
}

fn ends(topology: &Topology, arc: i64) -> TopologyResult<(EndpointKey, EndpointKey)> {
    let positions = topology
        .arcs
        .get(arc_index(arc))
        .ok_or(TopologyError::ArcOutOfRange(arc))?;
    let (Some(first), Some(last)) = (positions.first(), positions.last()) else {
        return Err(TopologyError::ArcOutOfRange(arc));
    };
    let (p0, p1) = (key(*first), key(*last));
    Ok(if arc < 0 { (p1, p0) } else { (p0, p1) })
}

/// Concatenate a ring's arcs, dropping the duplicated joint between arcs.
pub fn ring_positions(topology: &Topology, ring: &[i64]) -> TopologyResult<Vec<Position>> {
    let mut points: Vec<Position> = Vec::new();
    for &arc in ring {
        if !points.is_empty() {
            points.pop();
        }
        points.extend(topology.arc_positions(arc)?);
    }
    if let Some(first) = points.first().copied() {
        while points.len() < 4 {
            points.push(first);
        }
    }
    Ok(points)
}

/// Twice the unsigned shoelace area; only used to compare rings.
fn planar_ring_area(ring: &[Position]) -> f64 {
    let Some(mut b) = ring.last().copied() else {
        return 0.0;
    };
    let mut area = 0.0;
    for &a in ring {
        area += b.0 * a.1 - b.1 * a.0;
        b = a;
    }
    area.abs()
}

fn to_line_string(ring: Vec<Position>) -> LineString<f64> {
    LineString::new(ring.into_iter().map(|p| Coord { x: p.0, y: p.1 }).collect())
}
