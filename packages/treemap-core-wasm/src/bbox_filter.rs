use geo::BoundingRect;
use geo_types::{Coord, LineString, Rect};

use crate::models::LatLng;

// Compute the axis-aligned bounding box of a boundary ring
pub fn ring_bounds(ring: &[LatLng]) -> Option<Rect<f64>> {
    let line: LineString<f64> = ring.iter().map(|p| Coord::from(*p)).collect();
    line.bounding_rect()
}

// Function to check if a point is inside a bounding box (edges included)
pub fn point_in_bbox(point: &LatLng, bbox: &Rect<f64>) -> bool {
    let min = bbox.min();
    let max = bbox.max();

    point.lng >= min.x && point.lng <= max.x && point.lat >= min.y && point.lat <= max.y
}

/// Ray-casting containment test.
///
/// Each vertex is paired with its predecessor (the first with the last), so
/// the ring is implicitly closed. An edge is counted only when exactly one of
/// its endpoints lies strictly above the point's latitude; this half-open
/// rule keeps a shared vertex from being counted twice. For a counted edge
/// the longitude at the point's latitude is interpolated and the `inside`
/// flag toggles when that longitude is strictly east of the point.
///
/// Points exactly on an edge get whatever answer the comparisons produce;
/// the result is deterministic but not specified.
pub fn is_point_in_polygon(point: &LatLng, ring: &[LatLng]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }

    let x = point.lng;
    let y = point.lat;
    let mut inside = false;
    let mut j = n - 1;

    for i in 0..n {
        let xi = ring[i].lng;
        let yi = ring[i].lat;
        let xj = ring[j].lng;
        let yj = ring[j].lat;

        if (yi > y) != (yj > y) {
            // yj != yi here, the straddle check guarantees it
            let crossing_lng = (xj - xi) * (y - yi) / (yj - yi) + xi;
            if x < crossing_lng {
                inside = !inside;
            }
        }

        j = i;
    }

    inside
}
