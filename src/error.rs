//! Error types for the wellcast pipeline

use thiserror::Error;

/// All failure modes surfaced by the pipeline.
///
/// Only `Training` is recovered locally (a baseline algorithm that fails to
/// fit is recorded and excluded); everything else aborts the run with enough
/// context to diagnose without a debugger.
#[derive(Error, Debug)]
pub enum WellcastError {
    /// Required column missing, ill-typed value, or artifact schema mismatch.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A column is too sparse for median imputation to be trustworthy.
    #[error("Data quality error: column '{column}' is {missing_pct:.1}% missing (limit {limit:.0}%)")]
    DataQuality {
        column: String,
        missing_pct: f64,
        limit: f64,
    },

    /// A single algorithm failed to converge or fit.
    #[error("Training failed for {model}: {reason}")]
    Training { model: String, reason: String },

    /// Fewer than two usable base models for ensembling.
    #[error("Ensemble error: {0}")]
    Ensemble(String),

    /// I/O failure while staging or committing an artifact bundle.
    #[error("Artifact error at {path}: {source}")]
    Artifact {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    #[error("Model is not fitted")]
    NotFitted,

    #[error("Data error: {0}")]
    Data(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl WellcastError {
    /// Attach a path to an I/O error from the artifact layer.
    pub fn artifact(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        WellcastError::Artifact {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

impl From<polars::prelude::PolarsError> for WellcastError {
    fn from(e: polars::prelude::PolarsError) -> Self {
        WellcastError::Data(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WellcastError>;
