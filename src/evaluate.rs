//! Diagnostic evaluation of the selected model

use crate::error::Result;
use crate::training::{RegressionMetrics, TrainedRegressor};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Train/test R² gap above which the model is flagged as overfit.
pub const OVERFIT_THRESHOLD: f64 = 0.05;

/// Number of equal-width target bands for the error-distribution analysis.
const N_ERROR_BANDS: usize = 5;

/// Distribution statistics over test-split residuals (actual − predicted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResidualStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub q25: f64,
    pub q75: f64,
}

impl ResidualStats {
    fn from_residuals(residuals: &[f64]) -> Self {
        let n = residuals.len() as f64;
        let mean = residuals.iter().sum::<f64>() / n;
        let std = (residuals.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt();

        let mut sorted = residuals.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let quantile = |q: f64| -> f64 {
            let pos = q * (sorted.len() - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            if lo == hi {
                sorted[lo]
            } else {
                sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
            }
        };

        Self {
            mean,
            std,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            median: quantile(0.5),
            q25: quantile(0.25),
            q75: quantile(0.75),
        }
    }
}

/// Absolute-error summary for one target-value band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBand {
    pub label: String,
    pub lo: f64,
    pub hi: f64,
    pub count: usize,
    pub mean_abs_error: f64,
    pub max_abs_error: f64,
}

/// Ranked feature importance entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Full diagnostic report for one model on one train/test split pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub model_name: String,
    pub train: RegressionMetrics,
    pub test: RegressionMetrics,
    /// `train R² − test R²`.
    pub r2_gap: f64,
    pub overfit: bool,
    pub residuals: ResidualStats,
    pub error_bands: Vec<ErrorBand>,
    /// Importance ranking, descending; empty for models without importances.
    pub importance_ranking: Vec<FeatureImportance>,
}

impl EvaluationReport {
    /// Coarse quality grade from the test R², as printed in reports.
    pub fn grade(&self) -> &'static str {
        match self.test.r2 {
            r2 if r2 > 0.90 => "EXCELLENT (A+)",
            r2 if r2 > 0.85 => "VERY GOOD (A)",
            r2 if r2 > 0.80 => "GOOD (B+)",
            r2 if r2 > 0.75 => "SATISFACTORY (B)",
            _ => "NEEDS IMPROVEMENT (C)",
        }
    }

    pub fn generalization_verdict(&self) -> &'static str {
        if self.r2_gap.abs() < OVERFIT_THRESHOLD {
            "Excellent - no overfitting detected"
        } else if self.r2_gap.abs() < 0.10 {
            "Good - minimal overfitting"
        } else {
            "Fair - some overfitting detected"
        }
    }
}

/// Computes accuracy and diagnostic metrics for a fitted model.
#[derive(Debug, Clone)]
pub struct Evaluator {
    overfit_threshold: f64,
    /// Declared target range, used for the error-band edges.
    target_range: (f64, f64),
}

impl Evaluator {
    pub fn new(target_range: (f64, f64)) -> Self {
        Self {
            overfit_threshold: OVERFIT_THRESHOLD,
            target_range,
        }
    }

    pub fn with_overfit_threshold(mut self, threshold: f64) -> Self {
        self.overfit_threshold = threshold;
        self
    }

    pub fn evaluate(
        &self,
        model_name: &str,
        model: &TrainedRegressor,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
        feature_names: &[String],
    ) -> Result<EvaluationReport> {
        let train_pred = model.predict(x_train)?;
        let test_pred = model.predict(x_test)?;

        let train = RegressionMetrics::compute(y_train, &train_pred);
        let test = RegressionMetrics::compute(y_test, &test_pred);

        let residuals: Vec<f64> = y_test
            .iter()
            .zip(test_pred.iter())
            .map(|(t, p)| t - p)
            .collect();

        let r2_gap = train.r2 - test.r2;

        let importance_ranking = match model.feature_importances() {
            Some(importances) => {
                let mut ranked: Vec<FeatureImportance> = importances
                    .iter()
                    .zip(feature_names.iter())
                    .map(|(&importance, feature)| FeatureImportance {
                        feature: feature.clone(),
                        importance,
                    })
                    .collect();
                ranked.sort_by(|a, b| {
                    b.importance
                        .partial_cmp(&a.importance)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                ranked
            }
            None => Vec::new(),
        };

        Ok(EvaluationReport {
            model_name: model_name.to_string(),
            train,
            test,
            r2_gap,
            overfit: r2_gap > self.overfit_threshold,
            residuals: ResidualStats::from_residuals(&residuals),
            error_bands: self.error_bands(y_test, &residuals),
            importance_ranking,
        })
    }

    /// Bucket absolute test errors by target-value band.
    fn error_bands(&self, y_test: &Array1<f64>, residuals: &[f64]) -> Vec<ErrorBand> {
        let (lo, hi) = self.target_range;
        let width = (hi - lo) / N_ERROR_BANDS as f64;

        (0..N_ERROR_BANDS)
            .map(|band| {
                let band_lo = lo + band as f64 * width;
                let band_hi = band_lo + width;
                let last = band == N_ERROR_BANDS - 1;

                let errors: Vec<f64> = y_test
                    .iter()
                    .zip(residuals.iter())
                    .filter(|(&y, _)| y >= band_lo && (y < band_hi || (last && y <= band_hi)))
                    .map(|(_, r)| r.abs())
                    .collect();

                let count = errors.len();
                ErrorBand {
                    label: format!("{band_lo:.0}-{band_hi:.0}"),
                    lo: band_lo,
                    hi: band_hi,
                    count,
                    mean_abs_error: if count > 0 {
                        errors.iter().sum::<f64>() / count as f64
                    } else {
                        0.0
                    },
                    max_abs_error: errors.iter().copied().fold(0.0, f64::max),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::KnnRegressor;
    use ndarray::{array, Array2};

    /// Model predicting exactly the values it was fitted on (1-NN lookup).
    fn exact_model(points: &Array2<f64>, values: &Array1<f64>) -> TrainedRegressor {
        let mut knn = KnnRegressor::with_k(1);
        knn.fit(points, values).unwrap();
        TrainedRegressor::Knn(knn)
    }

    #[test]
    fn test_overfit_flagged_above_threshold() {
        // Train predictions exact (R² = 1.0); test predictions badly off.
        let x_train = array![[0.0], [1.0], [2.0], [3.0]];
        let y_train = array![10.0, 20.0, 30.0, 40.0];
        let x_test = array![[10.0], [11.0], [12.0], [13.0]];
        let y_test = array![10.0, 20.0, 30.0, 40.0];

        let model = exact_model(&x_train, &y_train);
        let report = Evaluator::new((0.0, 100.0))
            .evaluate(
                "synthetic",
                &model,
                &x_train,
                &y_train,
                &x_test,
                &y_test,
                &["f0".to_string()],
            )
            .unwrap();

        assert!((report.train.r2 - 1.0).abs() < 1e-9);
        assert!(report.r2_gap > OVERFIT_THRESHOLD);
        assert!(report.overfit);
    }

    #[test]
    fn test_good_generalization_not_flagged() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![10.0, 20.0, 30.0, 40.0];

        let model = exact_model(&x, &y);
        let report = Evaluator::new((0.0, 100.0))
            .evaluate("synthetic", &model, &x, &y, &x, &y, &["f0".to_string()])
            .unwrap();

        assert!(!report.overfit);
        assert_eq!(report.grade(), "EXCELLENT (A+)");
    }

    #[test]
    fn test_error_bands_cover_target_range() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0]];
        let y = array![5.0, 25.0, 45.0, 65.0, 95.0];

        let model = exact_model(&x, &y);
        let report = Evaluator::new((0.0, 100.0))
            .evaluate("synthetic", &model, &x, &y, &x, &y, &["f0".to_string()])
            .unwrap();

        assert_eq!(report.error_bands.len(), 5);
        let total: usize = report.error_bands.iter().map(|b| b.count).sum();
        assert_eq!(total, y.len());
    }

    #[test]
    fn test_residual_stats() {
        let stats = ResidualStats::from_residuals(&[-2.0, -1.0, 0.0, 1.0, 2.0]);
        assert_eq!(stats.mean, 0.0);
        assert_eq!(stats.median, 0.0);
        assert_eq!(stats.min, -2.0);
        assert_eq!(stats.max, 2.0);
    }
}
