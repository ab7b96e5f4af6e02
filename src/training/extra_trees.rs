//! Extremely randomized trees regressor
//!
//! Like the random forest but with uniformly drawn split thresholds instead
//! of an exhaustive threshold scan, and no bootstrap sampling.

use crate::error::{Result, WellcastError};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
enum ExtraTreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<ExtraTreeNode>,
        right: Box<ExtraTreeNode>,
    },
}

impl ExtraTreeNode {
    fn predict_sample(&self, sample: &[f64]) -> f64 {
        match self {
            ExtraTreeNode::Leaf { value } => *value,
            ExtraTreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
            } => {
                if sample[*feature_idx] <= *threshold {
                    left.predict_sample(sample)
                } else {
                    right.predict_sample(sample)
                }
            }
        }
    }
}

/// Extra-trees ensemble for regression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraTreesRegressor {
    trees: Vec<ExtraTreeNode>,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    seed: u64,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for ExtraTreesRegressor {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ExtraTreesRegressor {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
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

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(WellcastError::Shape {
                expected: format!("y length = {n_samples}"),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(WellcastError::Validation(
                "cannot fit extra trees on zero samples".to_string(),
            ));
        }

        self.n_features = x.ncols();
        let base_seed = self.seed;

        let results: Vec<(ExtraTreeNode, Vec<f64>)> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));
                let indices: Vec<usize> = (0..n_samples).collect();
                let mut importances = vec![0.0; x.ncols()];
                let tree = self.build_tree(x, y, &indices, 0, &mut importances, &mut rng);
                (tree, importances)
            })
            .collect();

        let mut total = vec![0.0; x.ncols()];
        let mut trees = Vec::with_capacity(results.len());
        for (tree, importances) in results {
            for (acc, v) in total.iter_mut().zip(importances) {
                *acc += v;
            }
            trees.push(tree);
        }
        let sum: f64 = total.iter().sum();
        if sum > 0.0 {
            for v in &mut total {
                *v /= sum;
            }
        }

        self.trees = trees;
        self.feature_importances = Some(Array1::from_vec(total));
        Ok(())
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> ExtraTreeNode {
        let n = indices.len();
        let mean = indices.iter().map(|&i| y[i]).sum::<f64>() / n as f64;

        let should_stop = n < self.min_samples_split
            || n < 2 * self.min_samples_leaf
            || self.max_depth.is_some_and(|d| depth >= d);
        if should_stop {
            return ExtraTreeNode::Leaf { value: mean };
        }

        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let total_sq_sum: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
        let parent_impurity = total_sq_sum / n as f64 - (total_sum / n as f64).powi(2);
        if parent_impurity <= 1e-12 {
            return ExtraTreeNode::Leaf { value: mean };
        }

        // One uniformly drawn threshold per candidate feature; keep the best
        // by variance reduction.
        let mut best: Option<(usize, f64, f64)> = None;
        for feature_idx in 0..x.ncols() {
            let (lo, hi) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |acc, &i| {
                let v = x[[i, feature_idx]];
                (acc.0.min(v), acc.1.max(v))
            });
            if lo == hi {
                continue;
            }
            let threshold = rng.gen_range(lo..hi);

            let mut left_count = 0usize;
            let mut left_sum = 0.0;
            let mut left_sq_sum = 0.0;
            for &i in indices {
                if x[[i, feature_idx]] <= threshold {
                    left_count += 1;
                    left_sum += y[i];
                    left_sq_sum += y[i] * y[i];
                }
            }
            let right_count = n - left_count;
            if left_count < self.min_samples_leaf || right_count < self.min_samples_leaf {
                continue;
            }

            let ln = left_count as f64;
            let rn = right_count as f64;
            let left_impurity = left_sq_sum / ln - (left_sum / ln).powi(2);
            let right_sum = total_sum - left_sum;
            let right_sq_sum = total_sq_sum - left_sq_sum;
            let right_impurity = right_sq_sum / rn - (right_sum / rn).powi(2);
            let gain = parent_impurity - (ln * left_impurity + rn * right_impurity) / n as f64;

            if gain > best.map_or(1e-12, |b| b.2) {
                best = Some((feature_idx, threshold, gain));
            }
        }

        match best {
            Some((feature_idx, threshold, gain)) => {
                let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| x[[i, feature_idx]] <= threshold);

                importances[feature_idx] += n as f64 * gain;

                ExtraTreeNode::Split {
                    feature_idx,
                    threshold,
                    left: Box::new(self.build_tree(
                        x,
                        y,
                        &left_indices,
                        depth + 1,
                        importances,
                        rng,
                    )),
                    right: Box::new(self.build_tree(
                        x,
                        y,
                        &right_indices,
                        depth + 1,
                        importances,
                        rng,
                    )),
                }
            }
            None => ExtraTreeNode::Leaf { value: mean },
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(WellcastError::NotFitted);
        }

        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let sample = x.row(i).to_vec();
                self.trees
                    .iter()
                    .map(|t| t.predict_sample(&sample))
                    .sum::<f64>()
                    / self.trees.len() as f64
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }
}

impl super::Regressor for ExtraTreesRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        ExtraTreesRegressor::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        ExtraTreesRegressor::predict(self, x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        ExtraTreesRegressor::feature_importances(self).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_learns_step_function() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = array![1.0, 1.0, 1.0, 9.0, 9.0, 9.0];

        let mut et = ExtraTreesRegressor::new(30).with_seed(42);
        et.fit(&x, &y).unwrap();

        let predictions = et.predict(&x).unwrap();
        assert!(predictions[0] < 4.0);
        assert!(predictions[5] > 6.0);
    }

    #[test]
    fn test_deterministic_with_seed() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

        let mut a = ExtraTreesRegressor::new(10).with_seed(3);
        let mut b = ExtraTreesRegressor::new(10).with_seed(3);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }
}
