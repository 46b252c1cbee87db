//! Clipping rasters to polygon footprints.

use geo::{BoundingRect, Contains, MultiPolygon, Point};
use tracing::{debug, info, instrument};

use crate::error::{CanopyError, Result};
use crate::raster::{read_geotiff, write_geotiff, GeoTransform, Raster};
use crate::table::ClipJob;
use crate::vector::read_footprint;

/// Pixel window `[col0, col1) × [row0, row1)` of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub col0: usize,
    pub row0: usize,
    pub col1: usize,
    pub row1: usize,
}

impl Window {
    pub fn width(&self) -> usize {
        self.col1 - self.col0
    }

    pub fn height(&self) -> usize {
        self.row1 - self.row0
    }
}

/// Smallest pixel window covering the footprint's bounding box, cut to the
/// raster extent. `None` if they do not overlap.
pub fn footprint_window(
    footprint: &MultiPolygon<f64>,
    gt: &GeoTransform,
    width: usize,
    height: usize,
) -> Option<Window> {
    let rect = footprint.bounding_rect()?;
    let (min, max) = (rect.min(), rect.max());
    let corners = [(min.x, min.y), (min.x, max.y), (max.x, min.y), (max.x, max.y)]
        .map(|(x, y)| gt.geo_to_pixel(x, y));
    if corners.iter().any(|(c, r)| !c.is_finite() || !r.is_finite()) {
        return None;
    }
    let lo = |v: [f64; 4]| v.into_iter().fold(f64::INFINITY, f64::min);
    let hi = |v: [f64; 4]| v.into_iter().fold(f64::NEG_INFINITY, f64::max);
    let (cols, rows) = (corners.map(|p| p.0), corners.map(|p| p.1));
    let c_min = lo(cols).floor().max(0.0);
    let r_min = lo(rows).floor().max(0.0);
    let c_max = hi(cols).ceil().min(width as f64);
    let r_max = hi(rows).ceil().min(height as f64);
    if c_min >= c_max || r_min >= r_max {
        return None;
    }
    Some(Window {
        col0: c_min as usize,
        row0: r_min as usize,
        col1: c_max as usize,
        row1: r_max as usize,
    })
}

/// Crop `raster` to the footprint's window and blank every pixel whose
/// centre is outside the footprint with the raster's no-data value (0 when
/// it has none). `None` if the footprint misses the raster.
pub fn clip_raster(raster: &Raster, gt: &GeoTransform, footprint: &MultiPolygon<f64>) -> Option<Raster> {
    let window = footprint_window(footprint, gt, raster.width, raster.height)?;
    let fill = raster.nodata.unwrap_or(0.0) as f32;
    let mut out = Raster::new(window.width(), window.height(), raster.n_bands(), raster.format, fill)
        .with_georef(raster.georef.offset(window.col0, window.row0))
        .with_nodata(raster.nodata);

    let mut inside = 0usize;
    for row in 0..window.height() {
        for col in 0..window.width() {
            let (src_col, src_row) = (window.col0 + col, window.row0 + row);
            let (x, y) = gt.pixel_center(src_col, src_row);
            if !footprint.contains(&Point::new(x, y)) {
                continue;
            }
            inside += 1;
            for b in 0..raster.n_bands() {
                out.set(b, row, col, raster.get(b, src_row, src_col));
            }
        }
    }
    debug!(?window, inside, "raster clipped");
    Some(out)
}

/// Run one clip job and write the result next to the shapefile.
#[instrument(skip_all, fields(img = %job.img.display(), shp = %job.shp.display()))]
pub fn run_clip_job(job: &ClipJob) -> Result<Raster> {
    let raster = read_geotiff(&job.img)?;
    let gt = raster.transform().ok_or_else(|| CanopyError::MissingGeoReference {
        path: job.img.clone(),
    })?;
    let footprint = read_footprint(&job.shp)?;
    let clipped = clip_raster(&raster, &gt, &footprint).ok_or_else(|| CanopyError::NoOverlap {
        image: job.img.clone(),
        shape: job.shp.clone(),
    })?;
    let output = job.output_path();
    write_geotiff(&clipped, &output)?;
    info!(output = %output.display(), width = clipped.width, height = clipped.height, "clip written");
    Ok(clipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{GeoReference, SampleFormat};
    use geo::{polygon, Polygon};

    /// 10×10 RGB raster at 1 m resolution, origin (1000, 2000); band b holds
    /// `100 * b + row * 10 + col`.
    fn scene() -> (Raster, GeoTransform) {
        let gt = GeoTransform::new(1000.0, 2000.0, 1.0, -1.0);
        let mut r = Raster::new(10, 10, 3, SampleFormat::U16, 0.0)
            .with_georef(GeoReference::from_transform(&gt).with_geo_keys(vec![1, 1, 0, 1, 3072, 0, 1, 28352]));
        for b in 0..3 {
            for row in 0..10 {
                for col in 0..10 {
                    r.set(b, row, col, (100 * b + row * 10 + col) as f32);
                }
            }
        }
        (r, gt)
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1), (x: x0, y: y0)]
    }

    #[test]
    fn crops_to_bounding_window() {
        let (r, gt) = scene();
        // Covers columns 2..5 and rows 3..7.
        let fp = MultiPolygon::new(vec![rect(1002.0, 1993.0, 1005.0, 1997.0)]);
        let out = clip_raster(&r, &gt, &fp).unwrap();
        assert_eq!((out.width, out.height), (3, 4));
        assert_eq!(out.n_bands(), 3);
        assert_eq!(out.get(0, 0, 0), 32.0);
        assert_eq!(out.get(2, 3, 2), 200.0 + 64.0);
        let moved = out.transform().unwrap();
        assert_eq!((moved.origin_x, moved.origin_y), (1002.0, 1997.0));
        assert_eq!(out.georef.geo_keys, r.georef.geo_keys);
    }

    #[test]
    fn pixels_outside_polygon_are_blanked() {
        let (r, gt) = scene();
        // Right triangle over the 4×4 block at columns 0..4, rows 0..4.
        let tri = polygon![(x: 1000.0, y: 2000.0), (x: 1004.0, y: 2000.0), (x: 1000.0, y: 1996.0), (x: 1000.0, y: 2000.0)];
        let out = clip_raster(&r, &gt, &MultiPolygon::new(vec![tri])).unwrap();
        assert_eq!((out.width, out.height), (4, 4));
        assert_eq!(out.get(1, 0, 0), 100.0);
        assert_eq!(out.get(1, 0, 2), 102.0);
        assert_eq!(out.get(0, 3, 3), 0.0);
        assert_eq!(out.get(0, 2, 3), 0.0);
        assert_eq!(out.get(0, 1, 1), 11.0);
    }

    #[test]
    fn nodata_value_used_as_fill() {
        let (r, gt) = scene();
        let r = r.with_nodata(Some(65535.0));
        let tri = polygon![(x: 1000.0, y: 2000.0), (x: 1004.0, y: 2000.0), (x: 1000.0, y: 1996.0), (x: 1000.0, y: 2000.0)];
        let out = clip_raster(&r, &gt, &MultiPolygon::new(vec![tri])).unwrap();
        assert_eq!(out.get(0, 3, 3), 65535.0);
        assert_eq!(out.nodata, Some(65535.0));
    }

    #[test]
    fn disjoint_footprint_is_none() {
        let (r, gt) = scene();
        let fp = MultiPolygon::new(vec![rect(5000.0, 5000.0, 5010.0, 5010.0)]);
        assert!(clip_raster(&r, &gt, &fp).is_none());
        assert!(clip_raster(&r, &gt, &MultiPolygon::new(vec![])).is_none());
    }

    #[test]
    fn window_is_cut_to_extent() {
        let gt = GeoTransform::new(0.0, 10.0, 1.0, -1.0);
        let fp = MultiPolygon::new(vec![rect(-5.0, 8.0, 3.0, 20.0)]);
        let w = footprint_window(&fp, &gt, 10, 10).unwrap();
        assert_eq!(w, Window { col0: 0, row0: 0, col1: 3, row1: 2 });
    }
}
