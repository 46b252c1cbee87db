//! CART decision trees with Gini splits, stored as a node arena.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::FeatureMatrix;

/// A node in a decision tree arena. Children are arena indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Samples with `row[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
    /// Terminal node predicting a class index.
    Leaf { class: usize },
}

/// Stopping and sampling parameters for a single tree.
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn (without replacement) at each split.
    pub max_features: usize,
}

/// A fitted classification tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    /// Gini importance per feature, normalized to sum to 1 (all zero for a stump).
    importances: Vec<f64>,
}

/// Gini impurity `1 - Σ p_i²` of a node with the given class counts.
pub fn gini(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>()
}

/// Index of the largest count; ties go to the lowest index.
pub(crate) fn argmax(counts: &[usize]) -> usize {
    let mut best = 0;
    for (i, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = i;
        }
    }
    best
}

struct Split {
    feature: usize,
    threshold: f32,
    decrease: f64,
}

struct Builder<'a, R: Rng> {
    x: &'a FeatureMatrix,
    y: &'a [usize],
    n_classes: usize,
    n_total: usize,
    params: TreeParams,
    rng: &'a mut R,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl<R: Rng> Builder<'_, R> {
    fn class_counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &i in indices {
            counts[self.y[i]] += 1;
        }
        counts
    }

    fn grow(&mut self, indices: &mut [usize], depth: usize) -> usize {
        let counts = self.class_counts(indices);
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { class: argmax(&counts) });

        let n = indices.len();
        let impurity = gini(&counts, n);
        let depth_reached = self.params.max_depth.is_some_and(|d| depth >= d);
        if impurity <= 0.0 || n < self.params.min_samples_split || depth_reached {
            return id;
        }
        let Some(split) = self.best_split(indices, &counts, impurity) else {
            return id;
        };

        let mut mid = 0;
        for i in 0..n {
            if self.x.row(indices[i])[split.feature] <= split.threshold {
                indices.swap(i, mid);
                mid += 1;
            }
        }
        self.importances[split.feature] += n as f64 / self.n_total as f64 * split.decrease;

        let (left_idx, right_idx) = indices.split_at_mut(mid);
        let left = self.grow(left_idx, depth + 1);
        let right = self.grow(right_idx, depth + 1);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    /// Best Gini split over a random subset of `max_features` features, or
    /// `None` if every candidate violates `min_samples_leaf` or all values tie.
    fn best_split(&mut self, indices: &[usize], parent: &[usize], parent_impurity: f64) -> Option<Split> {
        let n_features = self.x.n_features();
        let n = indices.len();
        let min_leaf = self.params.min_samples_leaf;

        // Partial Fisher-Yates over feature indices.
        let mut order: Vec<usize> = (0..n_features).collect();
        let take = self.params.max_features.clamp(1, n_features);
        for i in 0..take {
            let j = self.rng.gen_range(i..n_features);
            order.swap(i, j);
        }

        let mut best: Option<Split> = None;
        for &feature in &order[..take] {
            let mut sorted: Vec<(f32, usize)> = indices
                .iter()
                .map(|&i| (self.x.row(i)[feature], self.y[i]))
                .collect();
            sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

            let mut left = vec![0usize; self.n_classes];
            let mut right = parent.to_vec();
            for i in 0..n - 1 {
                let (value, class) = sorted[i];
                left[class] += 1;
                right[class] -= 1;
                let next = sorted[i + 1].0;
                let (n_left, n_right) = (i + 1, n - i - 1);
                if value == next || n_left < min_leaf || n_right < min_leaf {
                    continue;
                }
                let weighted = (n_left as f64 * gini(&left, n_left) + n_right as f64 * gini(&right, n_right))
                    / n as f64;
                let decrease = parent_impurity - weighted;
                if best.as_ref().map_or(true, |b| decrease > b.decrease) {
                    let mid = value + (next - value) / 2.0;
                    let threshold = if mid < next { mid } else { value };
                    best = Some(Split {
                        feature,
                        threshold,
                        decrease,
                    });
                }
            }
        }
        best
    }
}

impl DecisionTree {
    /// Fit on the rows named by `sample_indices` (duplicates allowed, as in a
    /// bootstrap sample). `y` holds class indices below `n_classes`.
    pub fn fit<R: Rng>(
        x: &FeatureMatrix,
        y: &[usize],
        n_classes: usize,
        mut sample_indices: Vec<usize>,
        params: TreeParams,
        rng: &mut R,
    ) -> Self {
        let mut builder = Builder {
            x,
            y,
            n_classes,
            n_total: sample_indices.len().max(1),
            params,
            rng,
            nodes: Vec::new(),
            importances: vec![0.0; x.n_features()],
        };
        builder.grow(&mut sample_indices, 0);

        let mut importances = builder.importances;
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }
        Self {
            nodes: builder.nodes,
            importances,
        }
    }

    /// Class index predicted for one feature row.
    pub fn predict_row(&self, row: &[f32]) -> usize {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { class } => return *class,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => id = if row[*feature] <= *threshold { *left } else { *right },
            }
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match &nodes[id] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn params(max_features: usize) -> TreeParams {
        TreeParams {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features,
        }
    }

    fn two_blobs() -> (FeatureMatrix, Vec<usize>) {
        let mut x = FeatureMatrix::new(2);
        let mut y = Vec::new();
        for i in 0..10 {
            x.push_row(&[i as f32, 50.0]);
            y.push(0);
            x.push_row(&[100.0 + i as f32, 50.0]);
            y.push(1);
        }
        (x, y)
    }

    #[test]
    fn gini_pure_and_even() {
        assert_eq!(gini(&[4, 0], 4), 0.0);
        assert!((gini(&[2, 2], 4) - 0.5).abs() < 1e-12);
        assert_eq!(gini(&[], 0), 0.0);
    }

    #[test]
    fn argmax_prefers_lowest_on_tie() {
        assert_eq!(argmax(&[3, 5, 5]), 1);
        assert_eq!(argmax(&[0, 0]), 0);
    }

    #[test]
    fn separable_data_one_split() {
        let (x, y) = two_blobs();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let tree = DecisionTree::fit(&x, &y, 2, (0..y.len()).collect(), params(2), &mut rng);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict_row(&[3.0, 50.0]), 0);
        assert_eq!(tree.predict_row(&[104.0, 50.0]), 1);
        // Only feature 0 separates the classes.
        assert_eq!(tree.importances(), &[1.0, 0.0]);
    }

    #[test]
    fn threshold_lies_between_neighbours() {
        let (x, y) = two_blobs();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let tree = DecisionTree::fit(&x, &y, 2, (0..y.len()).collect(), params(2), &mut rng);
        match &tree.nodes()[0] {
            Node::Split { feature, threshold, .. } => {
                assert_eq!(*feature, 0);
                assert!(*threshold > 9.0 && *threshold < 100.0, "threshold = {threshold}");
            }
            other => panic!("expected split at root, got {other:?}"),
        }
    }

    #[test]
    fn max_depth_zero_gives_majority_stump() {
        let mut x = FeatureMatrix::new(1);
        let y = vec![2, 2, 1];
        for v in [1.0, 2.0, 3.0] {
            x.push_row(&[v]);
        }
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let p = TreeParams {
            max_depth: Some(0),
            ..params(1)
        };
        let tree = DecisionTree::fit(&x, &y, 3, vec![0, 1, 2], p, &mut rng);
        assert_eq!(tree.nodes().len(), 1);
        assert_eq!(tree.predict_row(&[3.0]), 2);
        assert!(tree.importances().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn identical_features_cannot_split() {
        let mut x = FeatureMatrix::new(1);
        for _ in 0..4 {
            x.push_row(&[5.0]);
        }
        let y = vec![0, 1, 0, 1];
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let tree = DecisionTree::fit(&x, &y, 2, vec![0, 1, 2, 3], params(1), &mut rng);
        assert_eq!(tree.nodes().len(), 1);
    }
}
