//! Wellcast - wellness-score regression pipeline
//!
//! Trains, tunes, ensembles, and evaluates regression models that map a
//! fixed set of lifestyle attributes to a continuous wellness score. One
//! generic pipeline, parameterized by a [`schema::SchemaSpec`].
//!
//! # Modules
//!
//! ## Pipeline stages
//! - [`schema`] - problem-instance schemas and raw records
//! - [`data`] - CSV ingest, validation, data-quality checks
//! - [`preprocessing`] - feature engineering and the fitted transform
//! - [`split`] - deterministic stratified train/test splitting
//! - [`training`] - baseline algorithm roster and cross-validation
//! - [`tuning`] - randomized hyperparameter search
//! - [`ensemble`] - voting and stacking combiners
//! - [`selection`] - deterministic final model selection
//! - [`evaluate`] - diagnostics, overfitting detection, importances
//! - [`artifact`] - versioned, atomically written model bundles
//! - [`pipeline`] - end-to-end orchestration
//!
//! ## Services
//! - [`cli`] - command-line interface

pub mod error;

pub mod artifact;
pub mod cli;
pub mod data;
pub mod ensemble;
pub mod evaluate;
pub mod pipeline;
pub mod preprocessing;
pub mod report;
pub mod schema;
pub mod selection;
pub mod split;
pub mod training;
pub mod tuning;

pub use error::{Result, WellcastError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::artifact::{ArtifactBundle, ArtifactWriter, ModelMetadata};
    pub use crate::data::{load_csv, Dataset};
    pub use crate::ensemble::{EnsembleBuilder, StackingRegressor, VotingRegressor};
    pub use crate::error::{Result, WellcastError};
    pub use crate::evaluate::{EvaluationReport, Evaluator};
    pub use crate::pipeline::{PipelineConfig, PipelineOutcome, TrainPipeline};
    pub use crate::preprocessing::{FeatureEngineer, FittedTransform};
    pub use crate::schema::{RawRecord, RawValue, SchemaSpec};
    pub use crate::selection::ModelSelector;
    pub use crate::split::{Split, Splitter};
    pub use crate::training::{
        ModelFamily, ModelSpec, RegressionMetrics, Regressor, TrainedRegressor,
    };
    pub use crate::tuning::{RandomizedSearchTuner, SearchSpace, TunerConfig};
}
