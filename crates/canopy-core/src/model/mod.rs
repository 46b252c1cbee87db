//! Pixel classifiers: the feature matrix they consume, the
//! [`PixelClassifier`] seam, and the random-forest implementation with its
//! training, evaluation and model-file support.

pub mod dataset;
pub mod evaluate;
pub mod forest;
pub mod serialize;
pub mod tree;

pub use dataset::{read_training_csv, TrainingSamples};
pub use evaluate::{train_test_split, ConfusionMatrix};
pub use forest::{MaxFeatures, RandomForest, RandomForestConfig};

use crate::error::Result;

/// Anything that maps per-pixel feature rows to integer class labels.
pub trait PixelClassifier {
    /// Number of values each feature row must have.
    fn n_features(&self) -> usize;

    /// One label per row of `features`, in row order.
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<u8>>;
}

/// Row-major feature rows of a fixed width.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatrix {
    values: Vec<f32>,
    n_features: usize,
}

impl FeatureMatrix {
    pub fn new(n_features: usize) -> Self {
        Self {
            values: Vec::new(),
            n_features,
        }
    }

    pub fn with_capacity(n_features: usize, n_rows: usize) -> Self {
        Self {
            values: Vec::with_capacity(n_features * n_rows),
            n_features,
        }
    }

    /// Append one row; `row.len()` must equal `n_features`.
    pub fn push_row(&mut self, row: &[f32]) {
        debug_assert_eq!(row.len(), self.n_features);
        self.values.extend_from_slice(row);
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_rows(&self) -> usize {
        if self.n_features == 0 {
            0
        } else {
            self.values.len() / self.n_features
        }
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[f32] {
        &self.values[i * self.n_features..(i + 1) * self.n_features]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.values.chunks_exact(self.n_features.max(1))
    }

    /// Replace NaN and infinite values with `value`; returns how many were replaced.
    pub fn replace_non_finite(&mut self, value: f32) -> usize {
        let mut replaced = 0;
        for v in self.values.iter_mut().filter(|v| !v.is_finite()) {
            *v = value;
            replaced += 1;
        }
        replaced
    }

    /// New matrix holding the given rows, in the given order.
    pub fn select(&self, indices: &[usize]) -> Self {
        let mut out = Self::with_capacity(self.n_features, indices.len());
        for &i in indices {
            out.push_row(self.row(i));
        }
        out
    }
}
