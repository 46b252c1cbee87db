//! Per-image cover classification.
//!
//! Pixels whose first band equals the no-data value are left as background
//! (0); every other pixel gets the label the classifier predicts from its
//! first three band values.

use std::path::Path;

use tracing::{debug, info, instrument, warn};

use crate::error::{CanopyError, Result};
use crate::model::{FeatureMatrix, PixelClassifier};
use crate::raster::{read_geotiff, write_geotiff, Raster, SampleFormat};

/// Colour bands fed to the classifier.
pub const N_COLOUR_BANDS: usize = 3;

/// Label written for pixels that were not classified.
pub const BACKGROUND: u8 = 0;

/// Classify every valid pixel of `image` into a single-band `u8` raster with
/// the same size and georeferencing.
pub fn classify_raster(image: &Raster, classifier: &dyn PixelClassifier, nodata: f32) -> Result<Raster> {
    if image.n_bands() < N_COLOUR_BANDS {
        return Err(CanopyError::InsufficientBands {
            path: Default::default(),
            expected: N_COLOUR_BANDS,
            got: image.n_bands(),
        });
    }
    if classifier.n_features() != N_COLOUR_BANDS {
        return Err(CanopyError::FeatureCountMismatch {
            expected: classifier.n_features(),
            got: N_COLOUR_BANDS,
        });
    }

    let valid: Vec<usize> = image
        .band(0)
        .iter()
        .enumerate()
        .filter(|&(_, &v)| v != nodata)
        .map(|(i, _)| i)
        .collect();

    let mut out = Raster::new(image.width, image.height, 1, SampleFormat::U8, BACKGROUND as f32)
        .with_georef(image.georef.clone())
        .with_nodata(Some(BACKGROUND as f64));
    if valid.is_empty() {
        debug!("no valid pixels, skipping prediction");
        return Ok(out);
    }

    let mut features = FeatureMatrix::with_capacity(N_COLOUR_BANDS, valid.len());
    let mut row = [0.0f32; N_COLOUR_BANDS];
    for &i in &valid {
        for (b, slot) in row.iter_mut().enumerate() {
            *slot = image.bands[b][i];
        }
        features.push_row(&row);
    }
    let replaced = features.replace_non_finite(0.0);
    if replaced > 0 {
        warn!(replaced, "non-finite band values replaced with 0");
    }

    let labels = classifier.predict(&features)?;
    for (&i, &label) in valid.iter().zip(&labels) {
        out.bands[0][i] = label as f32;
    }
    debug!(n_valid = valid.len(), "pixels classified");
    Ok(out)
}

/// Read `input`, classify it and write the labelled GeoTIFF to `output`.
#[instrument(skip_all, fields(input = %input.as_ref().display()))]
pub fn classify_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    classifier: &dyn PixelClassifier,
    nodata: f32,
) -> Result<Raster> {
    let (input, output) = (input.as_ref(), output.as_ref());
    let image = read_geotiff(input)?;
    let classified = classify_raster(&image, classifier, nodata).map_err(|e| match e {
        CanopyError::InsufficientBands { expected, got, .. } => CanopyError::InsufficientBands {
            path: input.to_path_buf(),
            expected,
            got,
        },
        other => other,
    })?;
    write_geotiff(&classified, output)?;
    info!(output = %output.display(), width = image.width, height = image.height, "classified raster written");
    Ok(classified)
}
