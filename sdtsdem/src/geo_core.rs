use crate::commons::global_variables::Z_SCALE;
use crate::error::DemError;

/// Transform GDAL reports when a driver carries no georeferencing
pub const DEFAULT_GEO_TRANSFORM: [f64; 6] = [0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

/// Georeferencing of a raster
/// Wraps the six GDAL geo-transform coefficients:
///   [0] top left x, [1] w-e pixel resolution, [2] row rotation,
///   [3] top left y, [4] column rotation, [5] n-s pixel resolution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoCore {
    pub transform: [f64; 6],
}

impl GeoCore {
    pub fn new(transform: [f64; 6]) -> Self {
        GeoCore { transform }
    }

    /// Top left corner
    pub fn origin(&self) -> (f64, f64) {
        (self.transform[0], self.transform[3])
    }

    /// Pixel size as stored; y is negative for north-up rasters
    pub fn pixel_size(&self) -> (f64, f64) {
        (self.transform[1], self.transform[5])
    }

    /// True when both rotation terms are zero
    pub fn is_north_up(&self) -> bool {
        self.transform[2] == 0.0 && self.transform[4] == 0.0
    }

    /// Integer cell scale.
    /// The y scale is negated because the grid is written top row first.
    pub fn cell_scale(&self) -> CellScale {
        let x = self.transform[1].floor() as i64;
        let y = -(self.transform[5].floor() as i64);
        CellScale { x, y, z: Z_SCALE }
    }

    /// Footprint of a raster of the given size
    pub fn bounds(&self, width: usize, height: usize) -> BoundingBox {
        let (x0, y0) = self.origin();
        let x1 = x0 + width as f64 * self.transform[1] + height as f64 * self.transform[2];
        let y1 = y0 + width as f64 * self.transform[4] + height as f64 * self.transform[5];
        BoundingBox::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }
}

impl Default for GeoCore {
    fn default() -> Self {
        GeoCore::new(DEFAULT_GEO_TRANSFORM)
    }
}

/// Integer size of one cell, in meters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellScale {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl CellScale {
    /// Error unless the x and y scales match
    pub fn ensure_square(&self) -> Result<(), DemError> {
        if self.x != self.y {
            return Err(DemError::NonSquareCells {
                x: self.x,
                y: self.y,
            });
        }
        Ok(())
    }
}

/// Bounding box structure
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }
}
