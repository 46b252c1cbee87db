//! Batch FPC extraction over a list of image chips.

use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use crate::classify::classify_file;
use crate::cover::{foliage_projective_cover, FpcRecord};
use crate::error::Result;
use crate::model::PixelClassifier;

/// Appended to an image's file stem to name its classified raster.
pub const CLASS_SUFFIX: &str = "_rgb_comb_class.tif";

/// What to do when one image in a batch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop and return the error.
    #[default]
    Abort,
    /// Log the error, leave the site out of the results and carry on.
    Skip,
}

/// `dir/<name without extension>_rgb_comb_class.tif` for image `name`.
/// Subdirectories in `name` are kept, so the output sits beside its source.
pub fn classified_path(dir: &Path, name: &str) -> PathBuf {
    let name = Path::new(name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    dir.join(name.with_file_name(format!("{stem}{CLASS_SUFFIX}")))
}

fn process_one(dir: &Path, name: &str, classifier: &dyn PixelClassifier, nodata: f32) -> Result<FpcRecord> {
    let output = classified_path(dir, name);
    let classified = classify_file(dir.join(name), &output, classifier, nodata)?;
    let fpc = foliage_projective_cover(&classified);
    info!(site = name, fpc, output = %output.display(), "site complete");
    Ok(FpcRecord {
        site: name.to_string(),
        fpc,
    })
}

/// Classify each image in `names` (relative to `dir`) and measure its FPC.
/// Records come back in input order.
#[instrument(skip_all, fields(dir = %dir.display(), n_images = names.len()))]
pub fn run_batch(
    names: &[String],
    dir: &Path,
    classifier: &dyn PixelClassifier,
    nodata: f32,
    policy: FailurePolicy,
) -> Result<Vec<FpcRecord>> {
    let mut records = Vec::with_capacity(names.len());
    for name in names {
        match process_one(dir, name, classifier, nodata) {
            Ok(record) => records.push(record),
            Err(e) if policy == FailurePolicy::Skip => {
                warn!(site = %name, error = %e, "site skipped");
            }
            Err(e) => return Err(e),
        }
    }
    info!(processed = records.len(), skipped = names.len() - records.len(), "batch complete");
    Ok(records)
}
