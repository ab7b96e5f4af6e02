//! Model training
//!
//! The eight baseline algorithm families, the shared regression-tree
//! building block, the [`Regressor`] trait with its tagged [`TrainedRegressor`]
//! variants, and k-fold cross-validation.

mod baseline;
mod models;
pub mod adaboost;
pub mod cross_validation;
pub mod decision_tree;
pub mod extra_trees;
pub mod gradient_boosting;
pub mod knn;
pub mod linear_models;
pub mod random_forest;

pub use baseline::{BaselineModel, BaselineOutcome, BaselineTrainer, TrainingFailure};
pub use cross_validation::{CrossValidator, CvFold, CvReport, CvSummary, KFold};
pub use models::{
    ModelFamily, ModelSpec, ParamMap, ParamValue, RegressionMetrics, Regressor, TrainedRegressor,
};

pub use adaboost::AdaBoostRegressor;
pub use decision_tree::RegressionTree;
pub use extra_trees::ExtraTreesRegressor;
pub use gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
pub use knn::{DistanceMetric, KnnConfig, KnnRegressor, WeightScheme};
pub use linear_models::{ElasticNetRegression, LassoRegression, RidgeRegression};
pub use random_forest::{MaxFeatures, RandomForestRegressor};
