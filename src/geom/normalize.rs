//! Geometry canonicalization for the offline build.
//!
//! Each raw feature passes a validity check, gets an exact envelope and
//! area-weighted centroid, and is simplified for storage. The tolerance
//! trades boundary fidelity for store footprint and is recorded in the
//! store header.

use geo::{BoundingRect, Centroid, Line, LineString, MultiPolygon, Polygon, Rect, Simplify};
use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use rstar::{
    primitives::{GeomWithData, Rectangle},
    RTree,
};

/// A geometry ready for the row writer.
#[derive(Debug, Clone)]
pub struct NormalizedGeometry {
    /// Simplified shape, still a valid Polygon or MultiPolygon.
    pub geometry: MultiPolygon<f64>,
    /// Exact envelope of the original shape.
    pub bbox: Rect<f64>,
    /// Area-weighted centroid, (lng, lat).
    pub centroid: (f64, f64),
}

/// Why a raw feature was excluded from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryRejection {
    /// A ring crosses itself.
    SelfIntersecting,
    /// No area, no envelope, or no centroid.
    Degenerate,
}

/// Validate, measure, and simplify one raw multipolygon.
pub fn normalize_geometry(
    mp: &MultiPolygon<f64>,
    tolerance: f64,
) -> Result<NormalizedGeometry, GeometryRejection> {
    if mp.0.is_empty() {
        return Err(GeometryRejection::Degenerate);
    }

    for poly in &mp.0 {
        if ring_self_intersects(poly.exterior()) {
            return Err(GeometryRejection::SelfIntersecting);
        }
        for hole in poly.interiors() {
            if ring_self_intersects(hole) {
                return Err(GeometryRejection::SelfIntersecting);
            }
        }
    }

    let bbox = mp.bounding_rect().ok_or(GeometryRejection::Degenerate)?;
    let centroid = mp.centroid().ok_or(GeometryRejection::Degenerate)?;

    let geometry = simplify_multipolygon(mp, tolerance);

    Ok(NormalizedGeometry {
        geometry,
        bbox,
        centroid: (centroid.x(), centroid.y()),
    })
}

/// Simplify each part of a MultiPolygon independently, dropping parts
/// that degenerate. If every part degenerates, the original shape is
/// kept unchanged.
fn simplify_multipolygon(mp: &MultiPolygon<f64>, tolerance: f64) -> MultiPolygon<f64> {
    /// Douglas-Peucker with a fallback: a ring that simplifies below a
    /// closed triangle keeps its original vertices.
    fn simplify_ring(ring: &LineString<f64>, tolerance: f64) -> Option<LineString<f64>> {
        if ring.0.len() < 4 {
            return None;
        }
        let simplified = ring.simplify(&tolerance);
        if simplified.0.len() < 4 {
            Some(ring.clone())
        } else {
            Some(simplified)
        }
    }

    if tolerance <= 0.0 {
        return mp.clone();
    }

    let parts: Vec<Polygon<f64>> = mp
        .0
        .iter()
        .filter_map(|poly| {
            let exterior = simplify_ring(poly.exterior(), tolerance)?;
            let interiors: Vec<LineString<f64>> = poly
                .interiors()
                .iter()
                .filter_map(|ring| simplify_ring(ring, tolerance))
                .collect();
            Some(Polygon::new(exterior, interiors))
        })
        .collect();

    if parts.is_empty() {
        mp.clone()
    } else {
        MultiPolygon(parts)
    }
}

/// Check whether a closed ring properly intersects itself.
///
/// Segment envelopes go into a bulk-loaded R-tree so only nearby pairs
/// are tested; a proper crossing or a collinear overlap between
/// non-adjacent segments makes the ring invalid.
fn ring_self_intersects(ring: &LineString<f64>) -> bool {
    let n = ring.0.len();
    if n < 4 {
        // not a closed ring with area; degeneracy is handled elsewhere
        return false;
    }

    let segments: Vec<Line<f64>> = ring.lines().collect();
    let seg_count = segments.len();

    let tree: RTree<GeomWithData<Rectangle<[f64; 2]>, usize>> = RTree::bulk_load(
        segments
            .iter()
            .enumerate()
            .map(|(i, seg)| {
                GeomWithData::new(
                    Rectangle::from_corners(
                        [seg.start.x.min(seg.end.x), seg.start.y.min(seg.end.y)],
                        [seg.start.x.max(seg.end.x), seg.start.y.max(seg.end.y)],
                    ),
                    i,
                )
            })
            .collect(),
    );

    for (i, seg) in segments.iter().enumerate() {
        let env = rstar::AABB::from_corners(
            [seg.start.x.min(seg.end.x), seg.start.y.min(seg.end.y)],
            [seg.start.x.max(seg.end.x), seg.start.y.max(seg.end.y)],
        );
        for hit in tree.locate_in_envelope_intersecting(&env) {
            let j = hit.data;
            if j <= i {
                continue;
            }
            // consecutive segments share one endpoint; first and last wrap
            let adjacent = j == i + 1 || (i == 0 && j == seg_count - 1);
            match line_intersection(*seg, segments[j]) {
                Some(LineIntersection::SinglePoint { is_proper, .. }) => {
                    if is_proper {
                        return true;
                    }
                }
                Some(LineIntersection::Collinear { .. }) => {
                    if !adjacent {
                        return true;
                    }
                }
                None => {}
            }
        }
    }

    false
}
