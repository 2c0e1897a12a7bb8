//! Distance helpers for the nearest-district fallback.

use geo::{Contains, MultiPolygon, Point};

/// Mean Earth radius, meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance between two points in meters.
///
/// Spherical approximation; accuracy is well inside the boundary error
/// already introduced by geometry simplification.
pub fn haversine_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let lat1_r = lat1.to_radians();
    let lat2_r = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlng = (lng2 - lng1).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1_r.cos() * lat2_r.cos() * (dlng / 2.0).sin().powi(2);

    EARTH_RADIUS_M * 2.0 * a.sqrt().asin()
}

/// True distance in meters from a point to a multipolygon boundary;
/// zero when the point is inside.
pub fn point_to_multipolygon_meters(lng: f64, lat: f64, mp: &MultiPolygon<f64>) -> f64 {
    if mp.contains(&Point::new(lng, lat)) {
        return 0.0;
    }

    /// Closest point on the segment (ax,ay)-(bx,by) to (px,py), in a
    /// locally-scaled planar frame so longitude degrees weigh correctly.
    fn closest_on_segment(
        px: f64,
        py: f64,
        ax: f64,
        ay: f64,
        bx: f64,
        by: f64,
        lng_scale: f64,
    ) -> (f64, f64) {
        let (pxs, axs, bxs) = (px * lng_scale, ax * lng_scale, bx * lng_scale);
        let dx = bxs - axs;
        let dy = by - ay;
        let len2 = dx * dx + dy * dy;
        if len2 == 0.0 {
            return (ax, ay);
        }
        let t = (((pxs - axs) * dx + (py - ay) * dy) / len2).clamp(0.0, 1.0);
        ((axs + t * dx) / lng_scale, ay + t * dy)
    }

    let lng_scale = lat.to_radians().cos().abs().max(1e-3);
    let mut best = f64::INFINITY;

    for poly in &mp.0 {
        for ring in std::iter::once(poly.exterior()).chain(poly.interiors().iter()) {
            for seg in ring.lines() {
                let (cx, cy) = closest_on_segment(
                    lng, lat, seg.start.x, seg.start.y, seg.end.x, seg.end.y, lng_scale,
                );
                let d = haversine_distance(lat, lng, cy, cx);
                if d < best {
                    best = d;
                }
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn haversine_known_distances() {
        // same point
        assert!(haversine_distance(42.0, -71.0, 42.0, -71.0).abs() < 1e-6);
        // one degree of longitude at the equator, ~111.2 km
        let d = haversine_distance(0.0, 0.0, 0.0, 1.0);
        assert!((d - 111_195.0).abs() < 500.0);
        // Boston to Manhattan, ~306 km
        let d = haversine_distance(42.3601, -71.0589, 40.7128, -74.0060);
        assert!((d - 306_000.0).abs() < 5_000.0);
    }

    #[test]
    fn inside_point_has_zero_distance() {
        let mp = MultiPolygon(vec![polygon![
            (x: -71.2, y: 42.2),
            (x: -70.8, y: 42.2),
            (x: -70.8, y: 42.5),
            (x: -71.2, y: 42.5),
            (x: -71.2, y: 42.2),
        ]]);
        assert_eq!(point_to_multipolygon_meters(-71.0, 42.3, &mp), 0.0);
    }

    #[test]
    fn outside_point_distance_is_to_nearest_edge() {
        let mp = MultiPolygon(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]]);
        // half a degree east of the right edge, at the equator
        let d = point_to_multipolygon_meters(1.5, 0.5, &mp);
        assert!((d - 55_597.0).abs() < 1_000.0, "got {d}");
    }
}
