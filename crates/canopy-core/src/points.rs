//! Per-point band values under a point layer.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::error::{CanopyError, Result};
use crate::raster::{read_geotiff, Raster};
use crate::vector::SitePoint;

/// Band values under one point; `None` where the pixel is no-data or the
/// point is off the raster.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSample {
    pub uid: String,
    pub class: String,
    pub values: Vec<Option<f32>>,
}

/// Value of every band at the pixel containing each point, in point order.
/// `nodata` overrides the raster's own no-data value when given.
pub fn sample_points(raster: &Raster, points: &[SitePoint], nodata: Option<f64>) -> Result<Vec<PointSample>> {
    let gt = raster.transform().ok_or_else(|| CanopyError::MissingGeoReference {
        path: Default::default(),
    })?;
    let nodata = nodata.or(raster.nodata).map(|v| v as f32);

    let mut off_raster = 0usize;
    let samples = points
        .iter()
        .map(|p| {
            let pixel = gt.pixel_containing(p.x, p.y, raster.width, raster.height);
            if pixel.is_none() {
                off_raster += 1;
            }
            let values = (0..raster.n_bands())
                .map(|b| {
                    let (col, row) = pixel?;
                    let v = raster.get(b, row, col);
                    (Some(v) != nodata && !v.is_nan()).then_some(v)
                })
                .collect();
            PointSample {
                uid: p.uid.clone(),
                class: p.class.clone(),
                values,
            }
        })
        .collect();
    debug!(n_points = points.len(), off_raster, "points sampled");
    Ok(samples)
}

/// Read the raster at `image` and sample it under `points`. The raster is
/// returned with the samples so callers know its band count.
#[instrument(skip_all, fields(image = %image.as_ref().display()))]
pub fn sample_image(
    image: impl AsRef<Path>,
    points: &[SitePoint],
    nodata: Option<f64>,
) -> Result<(Raster, Vec<PointSample>)> {
    let image = image.as_ref();
    let raster = read_geotiff(image)?;
    let samples = sample_points(&raster, points, nodata).map_err(|e| match e {
        CanopyError::MissingGeoReference { .. } => CanopyError::MissingGeoReference {
            path: image.to_path_buf(),
        },
        other => other,
    })?;
    Ok((raster, samples))
}

/// Write samples as CSV with header `site,class,b1..bN`; missing values are
/// empty cells.
pub fn write_point_samples(path: impl AsRef<Path>, n_bands: usize, samples: &[PointSample]) -> Result<()> {
    let path = path.as_ref();
    let csv_err = |source| CanopyError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut wtr = csv::Writer::from_path(path).map_err(csv_err)?;
    let mut header = vec!["site".to_string(), "class".to_string()];
    header.extend((1..=n_bands).map(|b| format!("b{b}")));
    wtr.write_record(&header).map_err(csv_err)?;
    for s in samples {
        let mut row = vec![s.uid.clone(), s.class.clone()];
        row.extend(s.values.iter().map(|v| v.map(|v| v.to_string()).unwrap_or_default()));
        wtr.write_record(&row).map_err(csv_err)?;
    }
    wtr.flush().map_err(|source| CanopyError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), n_points = samples.len(), "point statistics written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{GeoReference, GeoTransform, SampleFormat};

    fn raster() -> Raster {
        // 3×2, two bands; band 0 = 1..6, band 1 = 10 * band 0. Pixel (col 1, row 0) is no-data.
        let b0 = vec![1.0, 0.0, 3.0, 4.0, 5.0, 6.0];
        let b1 = b0.iter().map(|v| v * 10.0).collect();
        Raster::from_bands(3, 2, vec![b0, b1], SampleFormat::U8)
            .unwrap()
            .with_georef(GeoReference::from_transform(&GeoTransform::new(0.0, 2.0, 1.0, -1.0)))
    }

    fn pt(uid: &str, x: f64, y: f64) -> SitePoint {
        SitePoint {
            uid: uid.into(),
            class: "1".into(),
            x,
            y,
        }
    }

    #[test]
    fn nearest_pixel_values_per_band() {
        let out = sample_points(&raster(), &[pt("a", 2.5, 0.5), pt("b", 0.1, 1.9)], Some(0.0)).unwrap();
        assert_eq!(out[0].values, vec![Some(6.0), Some(60.0)]);
        assert_eq!(out[1].values, vec![Some(1.0), Some(10.0)]);
        assert_eq!(out[0].uid, "a");
    }

    #[test]
    fn nodata_and_off_raster_are_blank() {
        let out = sample_points(&raster(), &[pt("nd", 1.5, 1.5), pt("off", 9.0, 9.0)], Some(0.0)).unwrap();
        // Band 1 at the no-data pixel is also 0.
        assert_eq!(out[0].values, vec![None, None]);
        assert_eq!(out[1].values, vec![None, None]);

        let unmasked = sample_points(&raster(), &[pt("nd", 1.5, 1.5)], None).unwrap();
        assert_eq!(unmasked[0].values, vec![Some(0.0), Some(0.0)]);
    }

    #[test]
    fn csv_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pts.csv");
        let samples = vec![
            PointSample { uid: "S1".into(), class: "1".into(), values: vec![Some(12.0), Some(3.5)] },
            PointSample { uid: "S2".into(), class: "4".into(), values: vec![None, Some(7.0)] },
        ];
        write_point_samples(&path, 2, &samples).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "site,class,b1,b2\nS1,1,12,3.5\nS2,4,,7\n");
    }

    #[test]
    fn requires_georeferencing() {
        let r = Raster::new(2, 2, 1, SampleFormat::U8, 1.0);
        assert!(matches!(
            sample_points(&r, &[pt("a", 0.5, 0.5)], None),
            Err(CanopyError::MissingGeoReference { .. })
        ));
    }

    #[test]
    fn ungeoreferenced_file_error_names_the_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.tif");
        crate::raster::write_geotiff(&Raster::new(2, 2, 1, SampleFormat::U8, 1.0), &path).unwrap();
        let err = sample_image(&path, &[pt("a", 0.5, 0.5)], None).unwrap_err();
        assert!(matches!(err, CanopyError::MissingGeoReference { path: ref p } if p == &path));
        assert!(err.to_string().contains("plain.tif"));
    }

    #[test]
    fn samples_a_georeferenced_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chip.tif");
        let mut rgb = raster();
        rgb.bands.push(vec![7.0; 6]);
        crate::raster::write_geotiff(&rgb, &path).unwrap();
        let (r, out) = sample_image(&path, &[pt("a", 2.5, 0.5)], Some(0.0)).unwrap();
        assert_eq!(r.n_bands(), 3);
        assert_eq!(out[0].values, vec![Some(6.0), Some(60.0), Some(7.0)]);
    }
}
