//! K-fold cross-validation
//!
//! [`KFold`] produces the fold index sets used by the tuner and the stacking
//! builder; [`CrossValidator`] is the reporting stage that re-fits the
//! selected model's configuration across folds for robustness statistics.
//! It never influences the selector's decision, which has already been made.

use crate::error::{Result, WellcastError};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::models::{ModelSpec, RegressionMetrics};

/// One train/validation split of row indices.
#[derive(Debug, Clone)]
pub struct CvFold {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Seeded, shuffled k-fold splitter.
#[derive(Debug, Clone)]
pub struct KFold {
    pub n_splits: usize,
    pub seed: u64,
}

impl KFold {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        Self { n_splits, seed }
    }

    pub fn split(&self, n_samples: usize) -> Result<Vec<CvFold>> {
        if self.n_splits < 2 {
            return Err(WellcastError::Validation(
                "n_splits must be at least 2".to_string(),
            ));
        }
        if n_samples < self.n_splits {
            return Err(WellcastError::Validation(format!(
                "n_samples ({n_samples}) must be >= n_splits ({})",
                self.n_splits
            )));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        indices.shuffle(&mut rng);

        let fold_sizes: Vec<usize> = (0..self.n_splits)
            .map(|i| {
                let base = n_samples / self.n_splits;
                let remainder = n_samples % self.n_splits;
                if i < remainder {
                    base + 1
                } else {
                    base
                }
            })
            .collect();

        let mut folds = Vec::with_capacity(self.n_splits);
        let mut current = 0;
        for (fold_idx, &fold_size) in fold_sizes.iter().enumerate() {
            let test_indices: Vec<usize> = indices[current..current + fold_size].to_vec();
            let train_indices: Vec<usize> = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();

            folds.push(CvFold {
                train_indices,
                test_indices,
                fold_idx,
            });
            current += fold_size;
        }

        Ok(folds)
    }
}

/// Mean and standard deviation of one metric across folds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CvSummary {
    pub mean: f64,
    pub std: f64,
}

impl CvSummary {
    pub fn from_scores(scores: &[f64]) -> Self {
        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean,
            std: variance.sqrt(),
        }
    }
}

/// Robustness statistics for the selected model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvReport {
    pub r2: CvSummary,
    pub mae: CvSummary,
    pub rmse: CvSummary,
    pub n_folds: usize,
}

/// Reporting-only k-fold scorer for the selected model family.
#[derive(Debug, Clone)]
pub struct CrossValidator {
    pub n_folds: usize,
    pub seed: u64,
}

impl CrossValidator {
    pub fn new(n_folds: usize, seed: u64) -> Self {
        Self { n_folds, seed }
    }

    /// Re-fit `spec` across folds of the full dataset and summarize the
    /// held-out metrics. Fold fits run on the given worker pool.
    pub fn kfold_score(
        &self,
        spec: &ModelSpec,
        x: &Array2<f64>,
        y: &Array1<f64>,
        pool: &rayon::ThreadPool,
    ) -> Result<CvReport> {
        let folds = KFold::new(self.n_folds, self.seed).split(x.nrows())?;
        let seed = self.seed;

        let metrics: Vec<RegressionMetrics> = pool.install(|| {
            folds
                .par_iter()
                .map(|fold| {
                    let x_train = x.select(Axis(0), &fold.train_indices);
                    let y_train: Array1<f64> =
                        Array1::from_vec(fold.train_indices.iter().map(|&i| y[i]).collect());
                    let x_val = x.select(Axis(0), &fold.test_indices);
                    let y_val: Array1<f64> =
                        Array1::from_vec(fold.test_indices.iter().map(|&i| y[i]).collect());

                    let model =
                        spec.fit(&x_train, &y_train, seed.wrapping_add(fold.fold_idx as u64))?;
                    let predictions = model.predict(&x_val)?;
                    Ok(RegressionMetrics::compute(&y_val, &predictions))
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let r2: Vec<f64> = metrics.iter().map(|m| m.r2).collect();
        let mae: Vec<f64> = metrics.iter().map(|m| m.mae).collect();
        let rmse: Vec<f64> = metrics.iter().map(|m| m.rmse).collect();

        Ok(CvReport {
            r2: CvSummary::from_scores(&r2),
            mae: CvSummary::from_scores(&mae),
            rmse: CvSummary::from_scores(&rmse),
            n_folds: folds.len(),
        })
    }
}
