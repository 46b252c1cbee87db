//! Affine geotransform between pixel and map coordinates.

/// Affine coefficients, GDAL-style:
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
/// North-up images have zero rotation and a negative `pixel_height`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub row_rotation: f64,
    pub col_rotation: f64,
}

impl GeoTransform {
    /// North-up transform with no rotation.
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Map coordinates of the top-left corner of pixel `(col, row)`.
    pub fn pixel_to_geo_corner(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.origin_x + col * self.pixel_width + row * self.row_rotation;
        let y = self.origin_y + col * self.col_rotation + row * self.pixel_height;
        (x, y)
    }

    /// Map coordinates of the centre of pixel `(col, row)`.
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        self.pixel_to_geo_corner(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Fractional pixel coordinates `(col, row)` of a map point.
    /// Returns NaNs for a degenerate transform.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;
        if det.abs() < 1e-12 {
            return (f64::NAN, f64::NAN);
        }
        let dx = x - self.origin_x;
        let dy = y - self.origin_y;
        let col = (self.pixel_height * dx - self.row_rotation * dy) / det;
        let row = (-self.col_rotation * dx + self.pixel_width * dy) / det;
        (col, row)
    }

    /// Integer pixel containing a map point, or `None` outside a `width`×`height` grid.
    pub fn pixel_containing(&self, x: f64, y: f64, width: usize, height: usize) -> Option<(usize, usize)> {
        let (col, row) = self.geo_to_pixel(x, y);
        if !col.is_finite() || !row.is_finite() {
            return None;
        }
        let (col, row) = (col.floor(), row.floor());
        if col < 0.0 || row < 0.0 || col >= width as f64 || row >= height as f64 {
            return None;
        }
        Some((col as usize, row as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn round_trip_pixel_geo() {
        let gt = GeoTransform::new(500_000.0, 8_600_000.0, 0.15, -0.15);
        let (x, y) = gt.pixel_to_geo_corner(10.0, 20.0);
        assert_relative_eq!(x, 500_001.5, epsilon = 1e-9);
        assert_relative_eq!(y, 8_599_997.0, epsilon = 1e-9);
        let (c, r) = gt.geo_to_pixel(x, y);
        assert_relative_eq!(c, 10.0, epsilon = 1e-6);
        assert_relative_eq!(r, 20.0, epsilon = 1e-6);
    }

    #[test]
    fn pixel_containing_bounds() {
        let gt = GeoTransform::new(0.0, 10.0, 1.0, -1.0);
        assert_eq!(gt.pixel_containing(0.5, 9.5, 10, 10), Some((0, 0)));
        assert_eq!(gt.pixel_containing(9.99, 0.01, 10, 10), Some((9, 9)));
        assert_eq!(gt.pixel_containing(-0.1, 5.0, 10, 10), None);
        assert_eq!(gt.pixel_containing(5.0, 10.5, 10, 10), None);
    }
}
