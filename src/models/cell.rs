//! Square query cells and the bootstrap grid.

use geo::{coord, Rect};

/// A square query region, identified by its south-west corner and edge length.
///
/// Cells form an implicit quadtree: an overflowing cell is replaced by its
/// four [`quadrants`](Cell::quadrants), one level deeper.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub min_lon: f64,
    pub min_lat: f64,
    pub size: f64,
    /// Subdivision depth, 0 for bootstrap cells
    pub depth: u32,
}

impl Cell {
    pub fn new(min_lon: f64, min_lat: f64, size: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            size,
            depth: 0,
        }
    }

    pub fn max_lon(&self) -> f64 {
        self.min_lon + self.size
    }

    pub fn max_lat(&self) -> f64 {
        self.min_lat + self.size
    }

    /// Cell extent as a geo rectangle
    pub fn rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.min_lon, y: self.min_lat },
            coord! { x: self.max_lon(), y: self.max_lat() },
        )
    }

    /// Bounding box in the API's `minLon,minLat,maxLon,maxLat` form
    pub fn bbox_param(&self) -> String {
        format!(
            "{},{},{},{}",
            self.min_lon,
            self.min_lat,
            self.max_lon(),
            self.max_lat()
        )
    }

    /// Split into four half-size children tiling this cell.
    ///
    /// Order: south-west, south-east, north-west, north-east.
    pub fn quadrants(&self) -> [Cell; 4] {
        let half = self.size / 2.0;
        let child = |dx: f64, dy: f64| Cell {
            min_lon: self.min_lon + dx,
            min_lat: self.min_lat + dy,
            size: half,
            depth: self.depth + 1,
        };

        [
            child(0.0, 0.0),
            child(half, 0.0),
            child(0.0, half),
            child(half, half),
        ]
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({:.6}-{:.6}, {:.6}-{:.6})",
            self.min_lon,
            self.max_lon(),
            self.min_lat,
            self.max_lat()
        )
    }
}

/// Tile a bounding box with square cells of `cell_size`.
///
/// Uses ceiling division so a partial last row/column still gets a cell.
/// Cells are emitted row by row from the south-west corner.
pub fn bootstrap_grid(bounds: Rect<f64>, cell_size: f64) -> Vec<Cell> {
    let lon_steps = steps(bounds.width(), cell_size);
    let lat_steps = steps(bounds.height(), cell_size);

    (0..lat_steps)
        .flat_map(|j| {
            (0..lon_steps).map(move |i| {
                Cell::new(
                    bounds.min().x + i as f64 * cell_size,
                    bounds.min().y + j as f64 * cell_size,
                    cell_size,
                )
            })
        })
        .collect()
}

fn steps(extent: f64, cell_size: f64) -> usize {
    let n = (extent / cell_size).ceil();
    if n.is_finite() && n > 0.0 {
        n as usize
    } else {
        0
    }
}
