//! Polsby-Popper compactness and contiguity classification.

use std::f64::consts::PI;

use geo::{ChamberlainDuquetteArea, Haversine, Length, MultiPolygon};

use district_core::Contiguity;

/// Compactness score and contiguity class for a merged district outline.
///
/// Empty outlines are not scored. Outlines with more than one part are
/// non-contiguous and score zero regardless of their shape.
pub fn polsby_popper(geometry: &MultiPolygon<f64>) -> (f64, Contiguity) {
    match geometry.0.len() {
        0 => (0.0, Contiguity::Unknown),
        1 => {
            let area = geometry.chamberlain_duquette_unsigned_area();
            let perimeter = perimeter_m(geometry);
            if perimeter <= 0.0 {
                return (0.0, Contiguity::Contiguous);
            }
            let score = 4.0 * PI * area / (perimeter * perimeter);
            (score.clamp(0.0, 1.0), Contiguity::Contiguous)
        }
        _ => (0.0, Contiguity::NonContiguous),
    }
}

/// Haversine length of every ring, holes included, in meters.
fn perimeter_m(geometry: &MultiPolygon<f64>) -> f64 {
    geometry
        .0
        .iter()
        .flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()))
        .map(|ring| Haversine.length(ring))
        .sum()
}
