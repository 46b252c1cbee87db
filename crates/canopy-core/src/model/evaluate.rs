//! Hold-out evaluation: seeded train/test split and a confusion matrix.

use std::fmt;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{CanopyError, Result};

/// Shuffle `0..n` with `seed` and cut off `ceil(n * test_fraction)` indices
/// as the test set. Returns `(train, test)`; both are non-empty.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(CanopyError::InvalidConfig(format!(
            "test fraction {test_fraction} must be in (0, 1)"
        )));
    }
    let n_test = (n as f64 * test_fraction).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(CanopyError::InvalidConfig(format!(
            "cannot split {n} samples with test fraction {test_fraction}"
        )));
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
    let train = order.split_off(n_test);
    Ok((train, order))
}

/// Counts of `(observed, predicted)` label pairs.
///
/// `counts[i][j]` is the number of samples whose observed label is
/// `classes[i]` and whose predicted label is `classes[j]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix {
    classes: Vec<u8>,
    counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    /// Labels not in `classes` are an error.
    pub fn from_labels(classes: &[u8], observed: &[u8], predicted: &[u8]) -> Result<Self> {
        if observed.is_empty() {
            return Err(CanopyError::EmptyDataset);
        }
        if observed.len() != predicted.len() {
            return Err(CanopyError::InvalidConfig(format!(
                "{} observed labels but {} predictions",
                observed.len(),
                predicted.len()
            )));
        }
        let index = |label: u8| {
            classes
                .iter()
                .position(|&c| c == label)
                .ok_or_else(|| CanopyError::InvalidConfig(format!("label {label} is not a known class")))
        };
        let mut counts = vec![vec![0usize; classes.len()]; classes.len()];
        for (&o, &p) in observed.iter().zip(predicted) {
            counts[index(o)?][index(p)?] += 1;
        }
        Ok(Self {
            classes: classes.to_vec(),
            counts,
        })
    }

    pub fn classes(&self) -> &[u8] {
        &self.classes
    }

    pub fn counts(&self) -> &[Vec<usize>] {
        &self.counts
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    /// Fraction of samples on the diagonal.
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let correct: usize = (0..self.classes.len()).map(|i| self.counts[i][i]).sum();
        correct as f64 / total as f64
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8}", "obs\\pred")?;
        for c in &self.classes {
            write!(f, " {c:>6}")?;
        }
        for (c, row) in self.classes.iter().zip(&self.counts) {
            writeln!(f)?;
            write!(f, "{c:>8}")?;
            for v in row {
                write!(f, " {v:>6}")?;
            }
        }
        Ok(())
    }
}
