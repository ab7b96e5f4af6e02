//! Regression tree (CART with variance reduction)
//!
//! The shared building block for the bagged, extremely-randomized, boosted,
//! and adaptive-boosted tree families.

use crate::error::{Result, WellcastError};
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Decision tree node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf with the mean target of its samples.
    Leaf { value: f64, n_samples: usize },
    /// Internal split on one feature at one threshold.
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

/// Regression tree minimizing within-node variance (MSE criterion).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Number of candidate features per split; `None` considers all.
    pub max_features: Option<usize>,
    seed: Option<u64>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for RegressionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl RegressionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: None,
            n_features: 0,
            feature_importances: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(WellcastError::Shape {
                expected: format!("y length = {n_samples}"),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(WellcastError::Validation(
                "cannot fit a tree on zero samples".to_string(),
            ));
        }

        self.n_features = n_features;
        let mut importances = vec![0.0; n_features];
        let mut rng = self.seed.map(ChaCha8Rng::seed_from_u64);

        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_tree(x, y, &indices, 0, &mut importances, &mut rng));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));
        Ok(())
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut Option<ChaCha8Rng>,
    ) -> TreeNode {
        let n_samples = indices.len();
        let mean = indices.iter().map(|&i| y[i]).sum::<f64>() / n_samples as f64;

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.is_some_and(|d| depth >= d)
            || indices.iter().all(|&i| (y[i] - y[indices[0]]).abs() < 1e-12);

        if should_stop {
            return TreeNode::Leaf {
                value: mean,
                n_samples,
            };
        }

        match self.find_best_split(x, y, indices, rng) {
            Some(split) => {
                let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| x[[i, split.feature_idx]] <= split.threshold);

                importances[split.feature_idx] += n_samples as f64 * split.gain;

                let left =
                    Box::new(self.build_tree(x, y, &left_indices, depth + 1, importances, rng));
                let right =
                    Box::new(self.build_tree(x, y, &right_indices, depth + 1, importances, rng));

                TreeNode::Split {
                    feature_idx: split.feature_idx,
                    threshold: split.threshold,
                    left,
                    right,
                    n_samples,
                }
            }
            None => TreeNode::Leaf {
                value: mean,
                n_samples,
            },
        }
    }

    fn candidate_features(&self, n_features: usize, rng: &mut Option<ChaCha8Rng>) -> Vec<usize> {
        match (self.max_features, rng.as_mut()) {
            (Some(k), Some(rng)) if k < n_features => {
                let mut sample = rand::seq::index::sample(rng, n_features, k).into_vec();
                sample.sort_unstable();
                sample
            }
            (Some(k), None) if k < n_features => (0..k).collect(),
            _ => (0..n_features).collect(),
        }
    }

    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        rng: &mut Option<ChaCha8Rng>,
    ) -> Option<BestSplit> {
        let n = indices.len() as f64;
        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let total_sq_sum: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
        let parent_impurity = total_sq_sum / n - (total_sum / n).powi(2);
        if parent_impurity <= 0.0 {
            return None;
        }

        let mut best: Option<BestSplit> = None;

        for feature_idx in self.candidate_features(x.ncols(), rng) {
            // Sorted scan with prefix sums: each candidate threshold is the
            // midpoint between adjacent distinct values.
            let mut pairs: Vec<(f64, f64)> = indices
                .iter()
                .map(|&i| (x[[i, feature_idx]], y[i]))
                .collect();
            pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let mut left_count = 0usize;
            let mut left_sum = 0.0;
            let mut left_sq_sum = 0.0;

            for i in 0..pairs.len() - 1 {
                left_count += 1;
                left_sum += pairs[i].1;
                left_sq_sum += pairs[i].1 * pairs[i].1;

                if pairs[i].0 == pairs[i + 1].0 {
                    continue;
                }
                let right_count = pairs.len() - left_count;
                if left_count < self.min_samples_leaf || right_count < self.min_samples_leaf {
                    continue;
                }

                let ln = left_count as f64;
                let rn = right_count as f64;
                let right_sum = total_sum - left_sum;
                let right_sq_sum = total_sq_sum - left_sq_sum;
                let left_impurity = left_sq_sum / ln - (left_sum / ln).powi(2);
                let right_impurity = right_sq_sum / rn - (right_sum / rn).powi(2);
                let gain = parent_impurity - (ln * left_impurity + rn * right_impurity) / n;

                if gain > best.as_ref().map_or(1e-12, |b| b.gain) {
                    best = Some(BestSplit {
                        feature_idx,
                        threshold: (pairs[i].0 + pairs[i + 1].0) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(WellcastError::NotFitted)?;

        let predictions: Vec<f64> = (0..x.nrows())
            .map(|i| {
                let row = x.row(i);
                Self::predict_sample(root, &row.to_vec())
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    fn predict_sample(node: &TreeNode, sample: &[f64]) -> f64 {
        match node {
            TreeNode::Leaf { value, .. } => *value,
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
                ..
            } => {
                if sample[*feature_idx] <= *threshold {
                    Self::predict_sample(left, sample)
                } else {
                    Self::predict_sample(right, sample)
                }
            }
        }
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn depth(&self) -> usize {
        fn node_depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
            }
        }
        self.root.as_ref().map_or(0, node_depth)
    }
}

struct BestSplit {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

impl super::Regressor for RegressionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        RegressionTree::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        RegressionTree::predict(self, x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        RegressionTree::feature_importances(self).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fits_simple_step_function() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = array![1.0, 1.0, 1.0, 5.0, 5.0, 5.0];

        let mut tree = RegressionTree::new();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        assert!((predictions[0] - 1.0).abs() < 1e-9);
        assert!((predictions[5] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_max_depth_bounds_tree() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];

        let mut tree = RegressionTree::new().with_max_depth(2);
        tree.fit(&x, &y).unwrap();
        assert!(tree.depth() <= 3); // root split + one level

        let mse: f64 = tree
            .predict(&x)
            .unwrap()
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;
        assert!(mse < 2.0);
    }

    #[test]
    fn test_min_samples_leaf_respected() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];

        let mut tree = RegressionTree::new().with_min_samples_leaf(2);
        tree.fit(&x, &y).unwrap();

        fn smallest_leaf(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { n_samples, .. } => *n_samples,
                TreeNode::Split { left, right, .. } => {
                    smallest_leaf(left).min(smallest_leaf(right))
                }
            }
        }
        assert!(smallest_leaf(tree.root.as_ref().unwrap()) >= 2);
    }

    #[test]
    fn test_importances_favor_informative_feature() {
        let x = array![
            [1.0, 0.0],
            [2.0, 0.0],
            [3.0, 0.0],
            [4.0, 0.0],
            [5.0, 0.0],
            [6.0, 0.0]
        ];
        let y = array![1.0, 1.0, 1.0, 9.0, 9.0, 9.0];

        let mut tree = RegressionTree::new();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let tree = RegressionTree::new();
        assert!(tree.predict(&array![[1.0]]).is_err());
    }
}
