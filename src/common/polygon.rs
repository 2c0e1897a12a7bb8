use shapefile as shp;

/// Convert a shapefile::Polygon into a geo::MultiPolygon<f64>.
///
/// Shapefile ring ordering: exteriors are clockwise, and the holes of a
/// polygon immediately follow its exterior. Rings are force-closed.
pub fn shape_to_multipolygon(p: &shp::Polygon) -> geo::MultiPolygon<f64> {
    /// Ensure first and last are the same for geo::LineString coords
    fn ensure_closed(coords: &mut Vec<geo::Coord<f64>>) {
        if !coords.is_empty() && coords[0] != coords[coords.len() - 1] {
            coords.push(coords[0])
        }
    }

    /// Get the signed area of a geo::Coord list (negative for exterior in shapefile order)
    fn signed_area(pts: &[geo::Coord<f64>]) -> f64 {
        let mut a = 0.0;
        for w in pts.windows(2) {
            a += w[0].x * w[1].y - w[1].x * w[0].y;
        }
        a / 2.0
    }

    let mut rings: Vec<(geo::LineString<f64>, bool /*is_exterior*/)> =
        Vec::with_capacity(p.rings().len());
    for ring in p.rings().iter() {
        let mut coords: Vec<geo::Coord<f64>> = ring
            .points()
            .iter()
            .map(|pt| geo::Coord { x: pt.x, y: pt.y })
            .collect();
        ensure_closed(&mut coords);
        let ls = geo::LineString(coords);
        // CW => exterior in the shapefile convention.
        let is_exterior = signed_area(&ls.0) < 0.0;
        rings.push((ls, is_exterior));
    }

    // Group each exterior with the holes that follow it.
    let mut polys: Vec<geo::Polygon<f64>> = Vec::new();
    let mut current_exterior: Option<geo::LineString<f64>> = None;
    let mut current_holes: Vec<geo::LineString<f64>> = Vec::new();

    for (ls, is_exterior) in rings {
        if is_exterior {
            if let Some(ext) = current_exterior.take() {
                polys.push(geo::Polygon::new(ext, current_holes));
                current_holes = Vec::new();
            }
            current_exterior = Some(ls);
        } else {
            current_holes.push(ls);
        }
    }
    if let Some(ext) = current_exterior {
        polys.push(geo::Polygon::new(ext, current_holes));
    }

    geo::MultiPolygon(polys)
}
