//! End to end: train a forest, save and reload it, then run a batch of
//! image chips through classification and FPC extraction.

use std::path::Path;

use approx::assert_relative_eq;
use canopy_core::batch::{classified_path, run_batch, FailurePolicy};
use canopy_core::model::{read_training_csv, RandomForest, RandomForestConfig};
use canopy_core::raster::{read_geotiff, write_geotiff, GeoReference, GeoTransform, Raster, SampleFormat};
use canopy_core::table::{read_image_list, write_fpc_table};
use canopy_core::CanopyError;

const WOODY: [f32; 3] = [40.0, 95.0, 35.0];
const BARE: [f32; 3] = [190.0, 170.0, 150.0];
const NODATA: [f32; 3] = [0.0, 0.0, 0.0];

fn write_training_csv(path: &Path) {
    let mut text = String::from("class,b1,b2,b3\n");
    for i in 0..40 {
        let j = (i % 9) as f32;
        text += &format!("1,{},{},{}\n", WOODY[0] + j, WOODY[1] + j, WOODY[2] + j);
        text += &format!("3,{},{},{}\n", BARE[0] - j, BARE[1] - j, BARE[2] - j);
    }
    std::fs::write(path, text).unwrap();
}

/// 4×4 RGB chip built from a row-major list of pixel colours.
fn write_chip(path: &Path, pixels: &[[f32; 3]; 16]) {
    let bands = (0..3).map(|b| pixels.iter().map(|p| p[b]).collect()).collect();
    let gt = GeoTransform::new(700_000.0, 8_600_000.0, 0.15, -0.15);
    let chip = Raster::from_bands(4, 4, bands, SampleFormat::U8)
        .unwrap()
        .with_georef(GeoReference::from_transform(&gt).with_geo_keys(vec![1, 1, 0, 1, 3072, 0, 1, 28352]));
    write_geotiff(&chip, path).unwrap();
}

fn trained_model(dir: &Path) -> RandomForest {
    let csv = dir.join("training.csv");
    write_training_csv(&csv);
    let bands = ["b1", "b2", "b3"].map(String::from).to_vec();
    let samples = read_training_csv(&csv, "class", &bands).unwrap();
    let forest = RandomForestConfig::new(15)
        .unwrap()
        .with_seed(42)
        .fit(&samples.features, &samples.labels, &samples.feature_names)
        .unwrap();
    let model_path = dir.join("rfc_model.bin");
    forest.save(&model_path).unwrap();
    RandomForest::load(&model_path).unwrap()
}

#[test]
fn batch_produces_ordered_fpc_table() {
    let dir = tempfile::tempdir().unwrap();
    let model = trained_model(dir.path());

    // a: every pixel woody; b: 4 nodata, 2 woody, 10 bare; c: all nodata.
    write_chip(&dir.path().join("a.tif"), &[WOODY; 16]);
    let mut b = [BARE; 16];
    b[..4].copy_from_slice(&[NODATA; 4]);
    b[5] = WOODY;
    b[10] = WOODY;
    write_chip(&dir.path().join("b.tif"), &b);
    write_chip(&dir.path().join("c.tif"), &[NODATA; 16]);

    let list = dir.path().join("imgs.csv");
    std::fs::write(&list, "c.tif\na.tif\nb.tif\n").unwrap();
    let names = read_image_list(&list).unwrap();

    let records = run_batch(&names, dir.path(), &model, 0.0, FailurePolicy::Abort).unwrap();
    let sites: Vec<&str> = records.iter().map(|r| r.site.as_str()).collect();
    assert_eq!(sites, ["c.tif", "a.tif", "b.tif"]);
    assert_eq!(records[0].fpc, 0.0);
    assert_relative_eq!(records[1].fpc, 100.0);
    assert_eq!((records[2].fpc * 100.0).round() / 100.0, 16.67);

    let classified = read_geotiff(classified_path(dir.path(), "b.tif")).unwrap();
    assert_eq!((classified.width, classified.height, classified.n_bands()), (4, 4, 1));
    assert_eq!(&classified.band(0)[..6], &[0.0, 0.0, 0.0, 0.0, 3.0, 1.0]);
    assert_eq!(classified.georef.geo_keys.as_deref(), Some(&[1, 1, 0, 1, 3072, 0, 1, 28352][..]));

    let out = dir.path().join("fpc.csv");
    write_fpc_table(&out, &records).unwrap();
    let text = std::fs::read_to_string(&out).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("site,fpc"));
    assert_eq!(lines.next(), Some("c.tif,0.0"));
    assert_eq!(lines.next(), Some("a.tif,100.0"));
    assert!(lines.next().unwrap().starts_with("b.tif,16.66"));
}

#[test]
fn failing_site_aborts_or_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let model = trained_model(dir.path());
    write_chip(&dir.path().join("a.tif"), &[WOODY; 16]);
    let names = vec!["missing.tif".to_string(), "a.tif".to_string()];

    let err = run_batch(&names, dir.path(), &model, 0.0, FailurePolicy::Abort).unwrap_err();
    assert!(matches!(err, CanopyError::Open { .. }));

    let records = run_batch(&names, dir.path(), &model, 0.0, FailurePolicy::Skip).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].site, "a.tif");
}
