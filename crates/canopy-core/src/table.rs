//! CSV tables: image lists, clip jobs and the FPC results table.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::cover::FpcRecord;
use crate::error::{CanopyError, Result};

fn csv_error(path: &Path) -> impl Fn(csv::Error) -> CanopyError + '_ {
    move |source| CanopyError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

/// Image file names from the first column of a header-less CSV (or a plain
/// one-name-per-line list). Blank rows are skipped.
pub fn read_image_list(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_error(path))?;
    let mut names = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(csv_error(path))?;
        match record.get(0) {
            Some(name) if !name.is_empty() => names.push(name.to_string()),
            _ => {}
        }
    }
    debug!(path = %path.display(), n_images = names.len(), "image list read");
    Ok(names)
}

/// Write the results table with header `site,fpc`, rows in the given order.
pub fn write_fpc_table(path: impl AsRef<Path>, records: &[FpcRecord]) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = csv::Writer::from_path(path).map_err(csv_error(path))?;
    if records.is_empty() {
        wtr.write_record(["site", "fpc"]).map_err(csv_error(path))?;
    }
    for record in records {
        wtr.serialize(record).map_err(csv_error(path))?;
    }
    wtr.flush().map_err(|source| CanopyError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// One row of a clip job list: raster to clip and the polygon shapefile to clip it by.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClipJob {
    pub img: PathBuf,
    pub shp: PathBuf,
}

impl ClipJob {
    /// Output raster path: the shapefile path with a `.tif` extension.
    pub fn output_path(&self) -> PathBuf {
        self.shp.with_extension("tif")
    }
}

/// Clip jobs from a CSV with header `img,shp`.
pub fn read_clip_jobs(path: impl AsRef<Path>) -> Result<Vec<ClipJob>> {
    let path = path.as_ref();
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_error(path))?;
    let jobs = rdr
        .deserialize()
        .collect::<std::result::Result<Vec<ClipJob>, _>>()
        .map_err(csv_error(path))?;
    debug!(path = %path.display(), n_jobs = jobs.len(), "clip jobs read");
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_list_first_column_without_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imgs.csv");
        std::fs::write(&path, "site_b.tif,ignored\nsite_a.tif\n\n  site_c.tif \n").unwrap();
        let names = read_image_list(&path).unwrap();
        assert_eq!(names, vec!["site_b.tif", "site_a.tif", "site_c.tif"]);
    }

    #[test]
    fn fpc_table_has_header_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fpc.csv");
        let records = vec![
            FpcRecord { site: "b.tif".into(), fpc: 50.0 },
            FpcRecord { site: "a.tif".into(), fpc: 12.5 },
        ];
        write_fpc_table(&path, &records).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "site,fpc\nb.tif,50.0\na.tif,12.5\n");
    }

    #[test]
    fn empty_fpc_table_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fpc.csv");
        write_fpc_table(&path, &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "site,fpc\n");
    }

    #[test]
    fn clip_jobs_by_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.csv");
        std::fs::write(&path, "shp,img\n/data/plots/p1.shp,/data/img/t1.tif\n").unwrap();
        let jobs = read_clip_jobs(&path).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].img, PathBuf::from("/data/img/t1.tif"));
        assert_eq!(jobs[0].output_path(), PathBuf::from("/data/plots/p1.tif"));
    }

    #[test]
    fn missing_list_is_csv_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_image_list(dir.path().join("none.csv")).unwrap_err();
        assert!(matches!(err, CanopyError::Csv { .. }));
    }
}
