//! Final model selection
//!
//! The single authoritative decision point of the pipeline: every candidate
//! (baselines, tuned models, both ensembles) is scored on the test split and
//! ranked by a deterministic rule. Nothing downstream may override the
//! winner.

use crate::error::{Result, WellcastError};
use crate::training::{ModelSpec, RegressionMetrics, TrainedRegressor};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::info;

/// R² difference below which two candidates count as tied.
const R2_EPSILON: f64 = 1e-6;

/// One candidate for selection.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub name: String,
    pub spec: ModelSpec,
    pub model: TrainedRegressor,
}

/// One row of the final ranking, for reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub name: String,
    pub test_r2: f64,
    pub test_mae: f64,
}

/// The selector's verdict.
#[derive(Debug)]
pub struct SelectionResult {
    pub name: String,
    pub spec: ModelSpec,
    pub model: TrainedRegressor,
    pub test_metrics: RegressionMetrics,
    /// All candidates ordered best-first by the selection rule.
    pub ranking: Vec<RankedCandidate>,
}

/// Ranks candidates by test R², breaking ties by test MAE, then by the fixed
/// family priority order.
#[derive(Debug, Clone)]
pub struct ModelSelector {
    epsilon: f64,
}

impl Default for ModelSelector {
    fn default() -> Self {
        Self {
            epsilon: R2_EPSILON,
        }
    }
}

impl ModelSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(
        &self,
        candidates: Vec<Candidate>,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
    ) -> Result<SelectionResult> {
        if candidates.is_empty() {
            return Err(WellcastError::Validation(
                "no candidates available for selection".to_string(),
            ));
        }

        let mut scored: Vec<(Candidate, RegressionMetrics)> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let predictions = candidate.model.predict(x_test)?;
            let metrics = RegressionMetrics::compute(y_test, &predictions);
            scored.push((candidate, metrics));
        }

        // Single pass keeps the epsilon comparison well-defined (a sort with
        // an epsilon comparator would not be transitive).
        let mut best = 0;
        for i in 1..scored.len() {
            if self.beats(&scored[i], &scored[best]) {
                best = i;
            }
        }

        let mut ranking_order: Vec<usize> = (0..scored.len()).collect();
        ranking_order.sort_by(|&a, &b| {
            scored[b]
                .1
                .r2
                .partial_cmp(&scored[a].1.r2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    scored[a]
                        .1
                        .mae
                        .partial_cmp(&scored[b].1.mae)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
        });
        let ranking: Vec<RankedCandidate> = ranking_order
            .iter()
            .map(|&i| RankedCandidate {
                name: scored[i].0.name.clone(),
                test_r2: scored[i].1.r2,
                test_mae: scored[i].1.mae,
            })
            .collect();

        let (winner, test_metrics) = scored.swap_remove(best);
        info!(
            model = winner.name,
            test_r2 = test_metrics.r2,
            test_mae = test_metrics.mae,
            "model selected"
        );

        Ok(SelectionResult {
            name: winner.name,
            spec: winner.spec,
            model: winner.model,
            test_metrics,
            ranking,
        })
    }

    /// The deterministic ranking rule: higher test R² wins; within epsilon,
    /// lower test MAE wins; still tied, the fixed family priority decides.
    fn beats(
        &self,
        a: &(Candidate, RegressionMetrics),
        b: &(Candidate, RegressionMetrics),
    ) -> bool {
        let (ca, ma) = a;
        let (cb, mb) = b;

        let ra = if ma.r2.is_nan() { f64::NEG_INFINITY } else { ma.r2 };
        let rb = if mb.r2.is_nan() { f64::NEG_INFINITY } else { mb.r2 };

        if (ra - rb).abs() > self.epsilon {
            return ra > rb;
        }
        if (ma.mae - mb.mae).abs() > self.epsilon {
            return ma.mae < mb.mae;
        }
        ca.spec.family.selection_priority() < cb.spec.family.selection_priority()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{KnnRegressor, ModelFamily};
    use ndarray::array;

    /// A candidate that predicts exactly `predictions` at the four test
    /// points `x = 0, 1, 2, 3` (1-NN lookup on those points), giving exact
    /// control over its test metrics.
    fn exact_candidate(name: &str, family: ModelFamily, predictions: [f64; 4]) -> Candidate {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = Array1::from_vec(predictions.to_vec());
        let mut model = KnnRegressor::with_k(1);
        model.fit(&x, &y).unwrap();
        Candidate {
            name: name.to_string(),
            spec: ModelSpec::baseline(family),
            model: TrainedRegressor::Knn(model),
        }
    }

    #[test]
    fn test_highest_r2_wins() {
        let x_test = array![[0.0], [1.0], [2.0], [3.0]];
        let y_test = array![0.0, 1.0, 2.0, 3.0];

        let good = exact_candidate("good", ModelFamily::Ridge, [0.0, 1.0, 2.0, 3.0]);
        let biased = exact_candidate("biased", ModelFamily::Lasso, [3.0, 4.0, 5.0, 6.0]);

        let result = ModelSelector::new()
            .select(vec![biased, good], &x_test, &y_test)
            .unwrap();
        assert_eq!(result.name, "good");
        assert_eq!(result.ranking[0].name, "good");
    }

    #[test]
    fn test_tie_broken_by_lower_mae() {
        let x_test = array![[0.0], [1.0], [2.0], [3.0]];
        let y_test = array![0.0, 1.0, 2.0, 3.0];

        // Residuals [4,4,4,4] vs [8,0,0,0]: identical squared error (so R²
        // ties exactly), MAE 4.0 vs 2.0.
        let flat_error = exact_candidate("mae 4.0", ModelFamily::Knn, [4.0, 5.0, 6.0, 7.0]);
        let spiky_error = exact_candidate("mae 2.0", ModelFamily::Knn, [8.0, 1.0, 2.0, 3.0]);

        let result = ModelSelector::new()
            .select(vec![flat_error, spiky_error], &x_test, &y_test)
            .unwrap();
        assert_eq!(result.name, "mae 2.0");
    }

    #[test]
    fn test_full_tie_broken_by_family_priority() {
        let x_test = array![[0.0], [1.0], [2.0], [3.0]];
        let y_test = array![0.0, 1.0, 2.0, 3.0];

        // Identical predictions under different family labels.
        let preds = [0.5, 1.5, 2.5, 3.5];
        let knn_labeled = exact_candidate("knn", ModelFamily::Knn, preds);
        let gb_labeled = exact_candidate("gb", ModelFamily::GradientBoosting, preds);

        let result = ModelSelector::new()
            .select(vec![knn_labeled, gb_labeled], &x_test, &y_test)
            .unwrap();
        assert_eq!(result.name, "gb");
    }

    #[test]
    fn test_empty_candidates_rejected() {
        let x_test = array![[0.0]];
        let y_test = array![0.0];
        assert!(ModelSelector::new()
            .select(vec![], &x_test, &y_test)
            .is_err());
    }
}
