//! AdaBoost.R2 regressor
//!
//! Adaptive boosting for regression: each round fits a shallow tree on a
//! weight-proportional bootstrap sample, scores it by linear loss relative to
//! the worst residual, and reweights hard rows upward. Prediction is the
//! weighted median of member predictions.

use crate::error::{Result, WellcastError};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::decision_tree::RegressionTree;

/// Depth of the weak learners.
const BASE_TREE_DEPTH: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostRegressor {
    pub n_estimators: usize,
    pub learning_rate: f64,
    trees: Vec<RegressionTree>,
    /// log(1 / beta) weight per member.
    alphas: Vec<f64>,
    seed: u64,
    n_features: usize,
}

impl Default for AdaBoostRegressor {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostRegressor {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            trees: Vec::new(),
            alphas: Vec::new(),
            seed: 42,
            n_features: 0,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Weight-proportional bootstrap: inverse-CDF sampling over the current
    /// sample weights.
    fn weighted_sample(
        weights: &Array1<f64>,
        n: usize,
        rng: &mut ChaCha8Rng,
    ) -> Vec<usize> {
        let mut cumulative = Vec::with_capacity(n);
        let mut acc = 0.0;
        for &w in weights.iter() {
            acc += w;
            cumulative.push(acc);
        }
        let total = acc;

        (0..n)
            .map(|_| {
                let draw = rng.gen::<f64>() * total;
                cumulative.partition_point(|&c| c < draw).min(n - 1)
            })
            .collect()
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
                "cannot fit AdaBoost on zero samples".to_string(),
            ));
        }

        self.n_features = x.ncols();
        self.trees.clear();
        self.alphas.clear();

        let mut weights = Array1::from_elem(n_samples, 1.0 / n_samples as f64);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        for _round in 0..self.n_estimators {
            let sample_indices = Self::weighted_sample(&weights, n_samples, &mut rng);
            let x_boot = x.select(ndarray::Axis(0), &sample_indices);
            let y_boot: Array1<f64> =
                Array1::from_vec(sample_indices.iter().map(|&i| y[i]).collect());

            let mut tree = RegressionTree::new().with_max_depth(BASE_TREE_DEPTH);
            tree.fit(&x_boot, &y_boot)?;

            let predictions = tree.predict(x)?;
            let abs_errors: Vec<f64> = y
                .iter()
                .zip(predictions.iter())
                .map(|(t, p)| (t - p).abs())
                .collect();
            let max_error = abs_errors.iter().copied().fold(0.0f64, f64::max);

            // Perfect member: keep it with a dominant weight and stop.
            if max_error <= 1e-12 {
                self.trees.push(tree);
                self.alphas.push(1.0);
                break;
            }

            let normalized: Vec<f64> = abs_errors.iter().map(|e| e / max_error).collect();
            let avg_loss: f64 = weights
                .iter()
                .zip(normalized.iter())
                .map(|(w, l)| w * l)
                .sum();

            // Members worse than random stop the boosting run.
            if avg_loss >= 0.5 {
                break;
            }

            let beta = avg_loss / (1.0 - avg_loss);
            let alpha = self.learning_rate * (1.0 / beta.max(1e-15)).ln();

            for (w, l) in weights.iter_mut().zip(normalized.iter()) {
                *w *= beta.powf(self.learning_rate * (1.0 - l));
            }
            let w_sum = weights.sum();
            if w_sum > 0.0 {
                weights /= w_sum;
            }

            self.trees.push(tree);
            self.alphas.push(alpha);
        }

        if self.trees.is_empty() {
            return Err(WellcastError::Training {
                model: "AdaBoost".to_string(),
                reason: "no boosting round produced a usable member".to_string(),
            });
        }
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(WellcastError::NotFitted);
        }

        let member_preds: Vec<Array1<f64>> = self
            .trees
            .iter()
            .map(|t| t.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let n_samples = x.nrows();
        let predictions: Vec<f64> = (0..n_samples)
            .map(|i| {
                let mut pairs: Vec<(f64, f64)> = member_preds
                    .iter()
                    .zip(self.alphas.iter())
                    .map(|(p, &a)| (p[i], a))
                    .collect();
                pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

                // Weighted median over member predictions.
                let total: f64 = pairs.iter().map(|(_, a)| a).sum();
                let mut cumulative = 0.0;
                let mut result = pairs[pairs.len() - 1].0;
                for (value, alpha) in &pairs {
                    cumulative += alpha;
                    if cumulative >= total / 2.0 {
                        result = *value;
                        break;
                    }
                }
                result
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    /// Alpha-weighted average of member tree importances.
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.trees.is_empty() {
            return None;
        }

        let mut total = vec![0.0; self.n_features];
        for (tree, &alpha) in self.trees.iter().zip(self.alphas.iter()) {
            if let Some(imp) = tree.feature_importances() {
                for (acc, &v) in total.iter_mut().zip(imp.iter()) {
                    *acc += alpha.abs() * v;
                }
            }
        }

        let sum: f64 = total.iter().sum();
        if sum > 0.0 {
            for v in &mut total {
                *v /= sum;
            }
        }
        Some(Array1::from_vec(total))
    }

    pub fn n_members(&self) -> usize {
        self.trees.len()
    }
}

impl super::Regressor for AdaBoostRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        AdaBoostRegressor::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        AdaBoostRegressor::predict(self, x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        AdaBoostRegressor::feature_importances(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fits_step_function() {
        let x = array![
            [1.0],
            [2.0],
            [3.0],
            [4.0],
            [10.0],
            [11.0],
            [12.0],
            [13.0]
        ];
        let y = array![1.0, 1.0, 1.0, 1.0, 8.0, 8.0, 8.0, 8.0];

        let mut model = AdaBoostRegressor::new(20, 1.0).with_seed(42);
        model.fit(&x, &y).unwrap();
        assert!(model.n_members() >= 1);

        let predictions = model.predict(&x).unwrap();
        assert!(predictions[0] < 4.0);
        assert!(predictions[7] > 5.0);
    }

    #[test]
    fn test_deterministic_with_seed() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![1.5, 2.5, 3.5, 4.5, 5.5, 6.5];

        let mut a = AdaBoostRegressor::new(10, 1.0).with_seed(9);
        let mut b = AdaBoostRegressor::new(10, 1.0).with_seed(9);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }
}
