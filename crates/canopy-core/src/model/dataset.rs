//! Labelled training samples read from CSV.

use std::path::Path;

use tracing::{debug, info, instrument};

use super::FeatureMatrix;
use crate::cover::CoverClass;
use crate::error::{CanopyError, Result};

/// Band values and class labels for training, one row per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSamples {
    pub features: FeatureMatrix,
    pub labels: Vec<u8>,
    pub feature_names: Vec<String>,
}

impl TrainingSamples {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Subset of rows, in the given order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            features: self.features.select(indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
            feature_names: self.feature_names.clone(),
        }
    }
}

/// Read `class_column` and `band_columns` from a CSV with a header row.
/// Other columns are ignored. Labels must be cover classes `1..=5`
/// (`"3"` and `"3.0"` are both accepted); band values must be finite.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn read_training_csv(
    path: impl AsRef<Path>,
    class_column: &str,
    band_columns: &[String],
) -> Result<TrainingSamples> {
    let path = path.as_ref();
    let csv_err = |source| CanopyError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let header = rdr.headers().map_err(csv_err)?.clone();
    let column = |name: &str| {
        header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| CanopyError::MissingColumn {
                path: path.to_path_buf(),
                column: name.to_string(),
            })
    };
    let class_idx = column(class_column)?;
    let band_idx = band_columns.iter().map(|b| column(b)).collect::<Result<Vec<_>>>()?;
    debug!(class_idx, ?band_idx, "resolved training columns");

    let mut features = FeatureMatrix::new(band_columns.len());
    let mut labels = Vec::new();
    let mut row_buf = vec![0.0f32; band_columns.len()];
    for (row, record) in rdr.records().enumerate() {
        let record = record.map_err(csv_err)?;
        let cell = |idx: usize| record.get(idx).unwrap_or("");
        let invalid = |column: &str, raw: &str| CanopyError::InvalidValue {
            path: path.to_path_buf(),
            row,
            column: column.to_string(),
            raw: raw.to_string(),
        };

        let raw = cell(class_idx);
        let label = parse_label(raw)
            .and_then(CoverClass::from_label)
            .ok_or_else(|| invalid(class_column, raw))?
            .label();
        for ((slot, &idx), name) in row_buf.iter_mut().zip(&band_idx).zip(band_columns) {
            let raw = cell(idx);
            *slot = raw
                .parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| invalid(name, raw))?;
        }
        features.push_row(&row_buf);
        labels.push(label);
    }

    if labels.is_empty() {
        return Err(CanopyError::EmptyDataset);
    }
    info!(n_samples = labels.len(), n_bands = band_columns.len(), "training samples read");
    Ok(TrainingSamples {
        features,
        labels,
        feature_names: band_columns.to_vec(),
    })
}

fn parse_label(raw: &str) -> Option<u8> {
    if let Ok(v) = raw.parse::<u8>() {
        return Some(v);
    }
    let v: f64 = raw.parse().ok()?;
    (v.fract() == 0.0 && (0.0..=255.0).contains(&v)).then_some(v as u8)
}
