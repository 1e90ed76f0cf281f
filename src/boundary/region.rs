//! Containment region used to prune cells and filter notes.

use geo::{BoundingRect, Contains, Intersects, MultiPolygon, Point, Rect};

use crate::models::Cell;

/// Immutable country polygon, shared read-only by every cell task
#[derive(Debug, Clone)]
pub struct Region {
    geometry: MultiPolygon<f64>,
    bounds: Rect<f64>,
}

impl Region {
    /// Wrap a polygon; `None` if it has no coordinates
    pub fn new(geometry: MultiPolygon<f64>) -> Option<Self> {
        let bounds = geometry.bounding_rect()?;
        Some(Self { geometry, bounds })
    }

    pub fn bounds(&self) -> Rect<f64> {
        self.bounds
    }

    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    /// Whether the cell's square touches the region at all
    pub fn intersects(&self, cell: &Cell) -> bool {
        let rect = cell.rect();
        // Envelope check first, it rejects most of the bootstrap grid cheaply
        if !self.bounds.intersects(&rect) {
            return false;
        }
        self.geometry.intersects(&rect.to_polygon())
    }

    /// Whether the point lies strictly inside the region.
    ///
    /// Points on the border are not contained.
    pub fn contains(&self, point: &Point<f64>) -> bool {
        self.geometry.contains(point)
    }
}
