//! Model trait, metric set, and the trained-model variants

use crate::ensemble::{StackingRegressor, VotingRegressor};
use crate::error::{Result, WellcastError};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::adaboost::AdaBoostRegressor;
use super::extra_trees::ExtraTreesRegressor;
use super::gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
use super::knn::{KnnConfig, KnnRegressor, WeightScheme};
use super::linear_models::{ElasticNetRegression, LassoRegression, RidgeRegression};
use super::random_forest::{MaxFeatures, RandomForestRegressor};

/// Accuracy metrics for one (model, split) pair. Immutable once computed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Coefficient of determination.
    pub r2: f64,
    /// Mean absolute error.
    pub mae: f64,
    /// Root mean squared error.
    pub rmse: f64,
    /// Mean absolute percentage error, in percent.
    pub mape: f64,
}

impl RegressionMetrics {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let n = y_true.len() as f64;
        let errors: Vec<f64> = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| t - p)
            .collect();

        let mse: f64 = errors.iter().map(|e| e * e).sum::<f64>() / n;
        let mae: f64 = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        let y_mean: f64 = y_true.iter().sum::<f64>() / n;
        let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
        let ss_res: f64 = errors.iter().map(|e| e.powi(2)).sum();
        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else {
            0.0
        };

        let mape = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| (t - p).abs() / t.abs().max(1e-10))
            .sum::<f64>()
            / n
            * 100.0;

        Self {
            r2,
            mae,
            rmse: mse.sqrt(),
            mape,
        }
    }
}

/// Capabilities every algorithm family implements.
pub trait Regressor: Send + Sync {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Internal importance scores, for families that expose them.
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }
}

/// Algorithm families known to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFamily {
    RandomForest,
    GradientBoosting,
    ExtraTrees,
    Ridge,
    Lasso,
    ElasticNet,
    AdaBoost,
    Knn,
    Voting,
    Stacking,
}

impl ModelFamily {
    /// The fixed baseline roster, trained with default hyperparameters.
    pub const BASELINE_ROSTER: [ModelFamily; 8] = [
        ModelFamily::RandomForest,
        ModelFamily::GradientBoosting,
        ModelFamily::ExtraTrees,
        ModelFamily::Ridge,
        ModelFamily::Lasso,
        ModelFamily::ElasticNet,
        ModelFamily::AdaBoost,
        ModelFamily::Knn,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelFamily::RandomForest => "Random Forest",
            ModelFamily::GradientBoosting => "Gradient Boosting",
            ModelFamily::ExtraTrees => "Extra Trees",
            ModelFamily::Ridge => "Ridge Regression",
            ModelFamily::Lasso => "Lasso Regression",
            ModelFamily::ElasticNet => "ElasticNet",
            ModelFamily::AdaBoost => "AdaBoost",
            ModelFamily::Knn => "K-Nearest Neighbors",
            ModelFamily::Voting => "Voting Ensemble",
            ModelFamily::Stacking => "Stacking Ensemble",
        }
    }

    /// Fixed priority for the selector's final tie-break (lower wins):
    /// ensembles, then boosted and bagged trees, then linear models, then
    /// the non-parametric baseline.
    pub fn selection_priority(&self) -> usize {
        match self {
            ModelFamily::Stacking => 0,
            ModelFamily::Voting => 1,
            ModelFamily::GradientBoosting => 2,
            ModelFamily::RandomForest => 3,
            ModelFamily::ExtraTrees => 4,
            ModelFamily::AdaBoost => 5,
            ModelFamily::Ridge => 6,
            ModelFamily::ElasticNet => 7,
            ModelFamily::Lasso => 8,
            ModelFamily::Knn => 9,
        }
    }

    pub fn is_tree_based(&self) -> bool {
        matches!(
            self,
            ModelFamily::RandomForest
                | ModelFamily::GradientBoosting
                | ModelFamily::ExtraTrees
                | ModelFamily::AdaBoost
        )
    }

    /// Stable per-family offset mixed into the run seed so each family draws
    /// from its own reproducible stream.
    pub(crate) fn seed_offset(&self) -> u64 {
        self.selection_priority() as u64 + 1
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) => Some(*v as i64),
            ParamValue::Str(_) => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            ParamValue::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Str(s) => f.write_str(s),
        }
    }
}

/// A hyperparameter assignment, keyed by parameter name.
pub type ParamMap = BTreeMap<String, ParamValue>;

pub(crate) fn param_usize(params: &ParamMap, key: &str, default: usize) -> usize {
    params
        .get(key)
        .and_then(|v| v.as_int())
        .map(|v| v.max(0) as usize)
        .unwrap_or(default)
}

pub(crate) fn param_float(params: &ParamMap, key: &str, default: f64) -> f64 {
    params.get(key).and_then(|v| v.as_float()).unwrap_or(default)
}

pub(crate) fn param_str(params: &ParamMap, key: &str, default: &str) -> String {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or(default)
        .to_string()
}

/// A refittable model description: family, hyperparameters, and (for
/// ensembles) member descriptions. The cross-validator re-fits this
/// configuration per fold — never the already-fitted parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    pub family: ModelFamily,
    pub params: ParamMap,
    pub members: Vec<ModelSpec>,
}

impl ModelSpec {
    /// Default hyperparameters for one family.
    pub fn baseline(family: ModelFamily) -> Self {
        Self {
            family,
            params: ParamMap::new(),
            members: Vec::new(),
        }
    }

    pub fn with_params(family: ModelFamily, params: ParamMap) -> Self {
        Self {
            family,
            params,
            members: Vec::new(),
        }
    }

    pub fn voting(members: Vec<ModelSpec>) -> Self {
        Self {
            family: ModelFamily::Voting,
            params: ParamMap::new(),
            members,
        }
    }

    pub fn stacking(members: Vec<ModelSpec>) -> Self {
        Self {
            family: ModelFamily::Stacking,
            params: ParamMap::new(),
            members,
        }
    }

    /// Fit this description on the given data.
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>, seed: u64) -> Result<TrainedRegressor> {
        let p = &self.params;
        let model = match self.family {
            ModelFamily::RandomForest => {
                let mut model = RandomForestRegressor::new(param_usize(p, "n_estimators", 100))
                    .with_min_samples_split(param_usize(p, "min_samples_split", 2))
                    .with_min_samples_leaf(param_usize(p, "min_samples_leaf", 1))
                    .with_max_features(MaxFeatures::parse(&param_str(p, "max_features", "sqrt")))
                    .with_seed(seed);
                let depth = param_usize(p, "max_depth", 0);
                if depth > 0 {
                    model = model.with_max_depth(depth);
                }
                model.fit(x, y)?;
                TrainedRegressor::RandomForest(model)
            }
            ModelFamily::GradientBoosting => {
                let config = GradientBoostingConfig {
                    n_estimators: param_usize(p, "n_estimators", 100),
                    learning_rate: param_float(p, "learning_rate", 0.1),
                    max_depth: param_usize(p, "max_depth", 3),
                    min_samples_split: param_usize(p, "min_samples_split", 2),
                    subsample: param_float(p, "subsample", 1.0),
                    seed,
                };
                let mut model = GradientBoostingRegressor::new(config);
                model.fit(x, y)?;
                TrainedRegressor::GradientBoosting(model)
            }
            ModelFamily::ExtraTrees => {
                let mut model = ExtraTreesRegressor::new(param_usize(p, "n_estimators", 100))
                    .with_min_samples_split(param_usize(p, "min_samples_split", 2))
                    .with_min_samples_leaf(param_usize(p, "min_samples_leaf", 1))
                    .with_seed(seed);
                let depth = param_usize(p, "max_depth", 0);
                if depth > 0 {
                    model = model.with_max_depth(depth);
                }
                model.fit(x, y)?;
                TrainedRegressor::ExtraTrees(model)
            }
            ModelFamily::Ridge => {
                let mut model = RidgeRegression::new(param_float(p, "alpha", 1.0));
                model.fit(x, y)?;
                TrainedRegressor::Ridge(model)
            }
            ModelFamily::Lasso => {
                let mut model = LassoRegression::new(param_float(p, "alpha", 1.0));
                model.fit(x, y)?;
                TrainedRegressor::Lasso(model)
            }
            ModelFamily::ElasticNet => {
                let mut model = ElasticNetRegression::new(
                    param_float(p, "alpha", 1.0),
                    param_float(p, "l1_ratio", 0.5),
                );
                model.fit(x, y)?;
                TrainedRegressor::ElasticNet(model)
            }
            ModelFamily::AdaBoost => {
                let mut model = AdaBoostRegressor::new(
                    param_usize(p, "n_estimators", 50),
                    param_float(p, "learning_rate", 1.0),
                )
                .with_seed(seed);
                model.fit(x, y)?;
                TrainedRegressor::AdaBoost(model)
            }
            ModelFamily::Knn => {
                let config = KnnConfig {
                    n_neighbors: param_usize(p, "n_neighbors", 5),
                    weights: WeightScheme::parse(&param_str(p, "weights", "uniform")),
                };
                let mut model = KnnRegressor::new(config);
                model.fit(x, y)?;
                TrainedRegressor::Knn(model)
            }
            ModelFamily::Voting => {
                if self.members.len() < 2 {
                    return Err(WellcastError::Ensemble(format!(
                        "voting ensemble needs at least 2 members, got {}",
                        self.members.len()
                    )));
                }
                let fitted = self
                    .members
                    .iter()
                    .enumerate()
                    .map(|(i, spec)| {
                        Ok((
                            spec.family.name().to_string(),
                            spec.fit(x, y, seed.wrapping_add(i as u64))?,
                        ))
                    })
                    .collect::<Result<Vec<_>>>()?;
                TrainedRegressor::Voting(Box::new(VotingRegressor::from_fitted(fitted)?))
            }
            ModelFamily::Stacking => {
                let model = StackingRegressor::fit(
                    self.members.clone(),
                    x,
                    y,
                    param_usize(p, "n_folds", 5),
                    seed,
                )?;
                TrainedRegressor::Stacking(Box::new(model))
            }
        };
        Ok(model)
    }
}

/// A fitted model: algorithm identifier plus fitted internal parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedRegressor {
    RandomForest(RandomForestRegressor),
    GradientBoosting(GradientBoostingRegressor),
    ExtraTrees(ExtraTreesRegressor),
    Ridge(RidgeRegression),
    Lasso(LassoRegression),
    ElasticNet(ElasticNetRegression),
    AdaBoost(AdaBoostRegressor),
    Knn(KnnRegressor),
    Voting(Box<VotingRegressor>),
    Stacking(Box<StackingRegressor>),
}

impl TrainedRegressor {
    pub fn family(&self) -> ModelFamily {
        match self {
            TrainedRegressor::RandomForest(_) => ModelFamily::RandomForest,
            TrainedRegressor::GradientBoosting(_) => ModelFamily::GradientBoosting,
            TrainedRegressor::ExtraTrees(_) => ModelFamily::ExtraTrees,
            TrainedRegressor::Ridge(_) => ModelFamily::Ridge,
            TrainedRegressor::Lasso(_) => ModelFamily::Lasso,
            TrainedRegressor::ElasticNet(_) => ModelFamily::ElasticNet,
            TrainedRegressor::AdaBoost(_) => ModelFamily::AdaBoost,
            TrainedRegressor::Knn(_) => ModelFamily::Knn,
            TrainedRegressor::Voting(_) => ModelFamily::Voting,
            TrainedRegressor::Stacking(_) => ModelFamily::Stacking,
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            TrainedRegressor::RandomForest(m) => m.predict(x),
            TrainedRegressor::GradientBoosting(m) => m.predict(x),
            TrainedRegressor::ExtraTrees(m) => m.predict(x),
            TrainedRegressor::Ridge(m) => m.predict(x),
            TrainedRegressor::Lasso(m) => m.predict(x),
            TrainedRegressor::ElasticNet(m) => m.predict(x),
            TrainedRegressor::AdaBoost(m) => m.predict(x),
            TrainedRegressor::Knn(m) => m.predict(x),
            TrainedRegressor::Voting(m) => m.predict(x),
            TrainedRegressor::Stacking(m) => m.predict(x),
        }
    }

    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        match self {
            TrainedRegressor::RandomForest(m) => m.feature_importances().cloned(),
            TrainedRegressor::GradientBoosting(m) => m.feature_importances().cloned(),
            TrainedRegressor::ExtraTrees(m) => m.feature_importances().cloned(),
            TrainedRegressor::AdaBoost(m) => m.feature_importances(),
            TrainedRegressor::Voting(m) => m.feature_importances(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regression_metrics() {
        let y_true = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y_pred = array![1.1, 2.0, 2.9, 4.1, 5.0];

        let metrics = RegressionMetrics::compute(&y_true, &y_pred);

        assert!(metrics.r2 > 0.9);
        assert!((metrics.mae - 0.06).abs() < 1e-9);
        assert!(metrics.rmse >= metrics.mae);
        assert!(metrics.mape > 0.0);
    }

    #[test]
    fn test_constant_target_r2_is_zero() {
        let y_true = array![3.0, 3.0, 3.0];
        let y_pred = array![3.0, 3.1, 2.9];
        let metrics = RegressionMetrics::compute(&y_true, &y_pred);
        assert_eq!(metrics.r2, 0.0);
    }

    #[test]
    fn test_baseline_roster_has_eight_families() {
        assert_eq!(ModelFamily::BASELINE_ROSTER.len(), 8);
    }

    #[test]
    fn test_selection_priority_prefers_ensembles() {
        assert!(
            ModelFamily::Stacking.selection_priority()
                < ModelFamily::GradientBoosting.selection_priority()
        );
        assert!(ModelFamily::Voting.selection_priority() < ModelFamily::Ridge.selection_priority());
    }

    #[test]
    fn test_spec_fit_linear_families() {
        let x = array![[1.0, 0.0], [2.0, 1.0], [3.0, 0.0], [4.0, 1.0], [5.0, 0.0]];
        let y = array![2.0, 4.0, 6.0, 8.0, 10.0];

        for family in [ModelFamily::Ridge, ModelFamily::Lasso, ModelFamily::ElasticNet] {
            let model = ModelSpec::baseline(family).fit(&x, &y, 42).unwrap();
            assert_eq!(model.family(), family);
            let pred = model.predict(&x).unwrap();
            assert_eq!(pred.len(), 5);
        }
    }

    #[test]
    fn test_voting_spec_requires_two_members() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![1.0, 2.0, 3.0];
        let spec = ModelSpec::voting(vec![ModelSpec::baseline(ModelFamily::Ridge)]);
        assert!(matches!(
            spec.fit(&x, &y, 0),
            Err(WellcastError::Ensemble(_))
        ));
    }
}
