//! Random forest: bootstrap-aggregated CART trees with majority voting.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::tree::{argmax, DecisionTree, TreeParams};
use super::{FeatureMatrix, PixelClassifier};
use crate::error::{CanopyError, Result};

/// Number of features considered at each split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaxFeatures {
    /// `floor(sqrt(n_features))`, at least 1.
    Sqrt,
    All,
    Fixed(usize),
}

impl MaxFeatures {
    fn resolve(self, n_features: usize) -> Result<usize> {
        let k = match self {
            MaxFeatures::Sqrt => ((n_features as f64).sqrt().floor() as usize).max(1),
            MaxFeatures::All => n_features,
            MaxFeatures::Fixed(k) => k,
        };
        if k == 0 || k > n_features {
            return Err(CanopyError::InvalidConfig(format!(
                "max_features resolved to {k}, must be in [1, {n_features}]"
            )));
        }
        Ok(k)
    }
}

/// Training parameters. Construct with [`RandomForestConfig::new`], then
/// chain `with_*` setters.
///
/// | Parameter           | Default |
/// |---------------------|---------|
/// | `max_features`      | `Sqrt`  |
/// | `max_depth`         | `None`  |
/// | `min_samples_split` | 2       |
/// | `min_samples_leaf`  | 1       |
/// | `bootstrap`         | `true`  |
/// | `seed`              | 42      |
#[derive(Debug, Clone)]
pub struct RandomForestConfig {
    n_trees: usize,
    max_features: MaxFeatures,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    bootstrap: bool,
    seed: u64,
}

impl RandomForestConfig {
    pub fn new(n_trees: usize) -> Result<Self> {
        if n_trees == 0 {
            return Err(CanopyError::InvalidConfig("n_trees must be at least 1".to_string()));
        }
        Ok(Self {
            n_trees,
            max_features: MaxFeatures::Sqrt,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            bootstrap: true,
            seed: 42,
        })
    }

    #[must_use]
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Train each tree on a bootstrap sample (`true`) or on every row.
    #[must_use]
    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    /// Fit a forest on feature rows `x` labelled with `labels`.
    ///
    /// Trees draw their bootstrap samples and split features from per-tree
    /// seeds taken from one master RNG, so the result depends only on `seed`
    /// (with or without the `threading` feature).
    #[instrument(skip_all, fields(n_trees = self.n_trees, n_samples = x.n_rows()))]
    pub fn fit(&self, x: &FeatureMatrix, labels: &[u8], feature_names: &[String]) -> Result<RandomForest> {
        let n_samples = x.n_rows();
        if n_samples == 0 {
            return Err(CanopyError::EmptyDataset);
        }
        if labels.len() != n_samples {
            return Err(CanopyError::InvalidConfig(format!(
                "{} labels for {n_samples} samples",
                labels.len()
            )));
        }
        if feature_names.len() != x.n_features() {
            return Err(CanopyError::FeatureCountMismatch {
                expected: feature_names.len(),
                got: x.n_features(),
            });
        }
        if let Some(i) = x.rows().position(|row| row.iter().any(|v| !v.is_finite())) {
            return Err(CanopyError::InvalidConfig(format!("non-finite feature in sample {i}")));
        }
        if self.min_samples_split < 2 || self.min_samples_leaf < 1 {
            return Err(CanopyError::InvalidConfig(
                "min_samples_split must be >= 2 and min_samples_leaf >= 1".to_string(),
            ));
        }
        let params = TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features.resolve(x.n_features())?,
        };

        let mut classes: Vec<u8> = labels.to_vec();
        classes.sort_unstable();
        classes.dedup();
        let y: Vec<usize> = labels
            .iter()
            .map(|l| classes.binary_search(l).unwrap_or_default())
            .collect();

        info!(
            n_samples,
            n_features = x.n_features(),
            n_classes = classes.len(),
            max_features = params.max_features,
            "training random forest"
        );

        let mut master = ChaCha8Rng::seed_from_u64(self.seed);
        let seeds: Vec<u64> = (0..self.n_trees).map(|_| master.gen()).collect();
        let n_classes = classes.len();
        let bootstrap = self.bootstrap;
        let build = |seed: u64| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let sample: Vec<usize> = if bootstrap {
                (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
            } else {
                (0..n_samples).collect()
            };
            DecisionTree::fit(x, &y, n_classes, sample, params, &mut rng)
        };

        #[cfg(feature = "threading")]
        let trees: Vec<DecisionTree> = {
            use rayon::prelude::*;
            seeds.into_par_iter().map(build).collect()
        };
        #[cfg(not(feature = "threading"))]
        let trees: Vec<DecisionTree> = seeds.into_iter().map(build).collect();

        debug!(
            max_depth = trees.iter().map(DecisionTree::depth).max().unwrap_or(0),
            "trees grown"
        );

        Ok(RandomForest {
            trees,
            classes,
            n_features: x.n_features(),
            feature_names: feature_names.to_vec(),
        })
    }
}

/// A fitted random forest over `u8` class labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub(crate) trees: Vec<DecisionTree>,
    /// Sorted distinct labels seen in training; trees predict indices into this.
    pub(crate) classes: Vec<u8>,
    pub(crate) n_features: usize,
    pub(crate) feature_names: Vec<String>,
}

impl RandomForest {
    /// Majority vote across trees; ties go to the smaller label.
    pub fn predict_row(&self, row: &[f32]) -> u8 {
        let mut votes = vec![0usize; self.classes.len()];
        for tree in &self.trees {
            votes[tree.predict_row(row)] += 1;
        }
        self.classes[argmax(&votes)]
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn classes(&self) -> &[u8] {
        &self.classes
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Mean Gini importance per feature, sorted most important first.
    pub fn feature_importances(&self) -> Vec<(String, f64)> {
        let mut totals = vec![0.0f64; self.n_features];
        for tree in &self.trees {
            for (t, v) in totals.iter_mut().zip(tree.importances()) {
                *t += v;
            }
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|v| *v /= sum);
        }
        let mut ranked: Vec<(String, f64)> = self.feature_names.iter().cloned().zip(totals).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}

impl PixelClassifier for RandomForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<u8>> {
        if features.n_features() != self.n_features {
            return Err(CanopyError::FeatureCountMismatch {
                expected: self.n_features,
                got: features.n_features(),
            });
        }
        Ok(features.rows().map(|row| self.predict_row(row)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Three separable "colour" clusters labelled with cover classes 1, 3, 4.
    fn clusters() -> (FeatureMatrix, Vec<u8>, Vec<String>) {
        let mut x = FeatureMatrix::new(3);
        let mut y = Vec::new();
        for i in 0..30 {
            let jitter = (i % 7) as f32;
            x.push_row(&[40.0 + jitter, 90.0 + jitter, 30.0 + jitter]);
            y.push(1);
            x.push_row(&[180.0 + jitter, 160.0 + jitter, 140.0 + jitter]);
            y.push(3);
            x.push_row(&[10.0 + jitter, 12.0 + jitter, 15.0 + jitter]);
            y.push(4);
        }
        let names = ["b1", "b2", "b3"].map(String::from).to_vec();
        (x, y, names)
    }

    #[test]
    fn learns_separable_clusters() {
        let (x, y, names) = clusters();
        let forest = RandomForestConfig::new(25).unwrap().fit(&x, &y, &names).unwrap();
        assert_eq!(forest.classes(), &[1, 3, 4]);
        let predicted = forest.predict(&x).unwrap();
        assert_eq!(predicted, y);
        assert_eq!(forest.predict_row(&[45.0, 95.0, 35.0]), 1);
    }

    #[test]
    fn same_seed_same_forest() {
        let (x, y, names) = clusters();
        let a = RandomForestConfig::new(10).unwrap().with_seed(9).fit(&x, &y, &names).unwrap();
        let b = RandomForestConfig::new(10).unwrap().with_seed(9).fit(&x, &y, &names).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn importances_sum_to_one() {
        let (x, y, names) = clusters();
        let forest = RandomForestConfig::new(10).unwrap().fit(&x, &y, &names).unwrap();
        let ranked = forest.feature_importances();
        assert_eq!(ranked.len(), 3);
        let total: f64 = ranked.iter().map(|(_, v)| v).sum();
        assert!((total - 1.0).abs() < 1e-9, "total = {total}");
        assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn rejects_bad_inputs() {
        let (x, y, names) = clusters();
        assert!(RandomForestConfig::new(0).is_err());
        let cfg = RandomForestConfig::new(3).unwrap();
        assert!(matches!(
            cfg.fit(&FeatureMatrix::new(3), &[], &names),
            Err(CanopyError::EmptyDataset)
        ));
        assert!(cfg.fit(&x, &y[1..], &names).is_err());
        assert!(cfg
            .clone()
            .with_max_features(MaxFeatures::Fixed(4))
            .fit(&x, &y, &names)
            .is_err());

        let mut bad = FeatureMatrix::new(3);
        bad.push_row(&[f32::NAN, 1.0, 2.0]);
        assert!(cfg.fit(&bad, &[1], &names).is_err());
    }

    #[test]
    fn sqrt_features_round_down() {
        assert_eq!(MaxFeatures::Sqrt.resolve(1).unwrap(), 1);
        assert_eq!(MaxFeatures::Sqrt.resolve(3).unwrap(), 1);
        assert_eq!(MaxFeatures::Sqrt.resolve(4).unwrap(), 2);
        assert_eq!(MaxFeatures::Sqrt.resolve(8).unwrap(), 2);
        assert_eq!(MaxFeatures::All.resolve(3).unwrap(), 3);
    }

    #[test]
    fn predict_checks_width() {
        let (x, y, names) = clusters();
        let forest = RandomForestConfig::new(3).unwrap().fit(&x, &y, &names).unwrap();
        let mut narrow = FeatureMatrix::new(2);
        narrow.push_row(&[1.0, 2.0]);
        assert!(matches!(
            forest.predict(&narrow),
            Err(CanopyError::FeatureCountMismatch { expected: 3, got: 2 })
        ));
    }
}
