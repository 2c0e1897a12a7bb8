mod bbox;
mod distance;
mod normalize;

pub use bbox::BboxEntry;
pub use distance::{haversine_distance, point_to_multipolygon_meters};
pub use normalize::{normalize_geometry, GeometryRejection, NormalizedGeometry};
