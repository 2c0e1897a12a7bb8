use geo::Rect;
use rstar::{Envelope, PointDistance, RTreeObject, AABB};

/// A bounding box in the R-tree, associated with a district row by index.
#[derive(Debug, Clone)]
pub struct BboxEntry {
    row: u32,
    rect: Rect<f64>,
}

impl BboxEntry {
    pub fn new(row: u32, rect: Rect<f64>) -> Self {
        Self { row, rect }
    }

    /// Get the index of the corresponding district row.
    #[inline]
    pub fn row(&self) -> u32 {
        self.row
    }

    /// Get a reference to the bounding rectangle.
    #[inline]
    pub fn rect(&self) -> &Rect<f64> {
        &self.rect
    }
}

impl RTreeObject for BboxEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.rect.min().into(), self.rect.max().into())
    }
}

impl PointDistance for BboxEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        self.envelope().distance_2(point)
    }
}
