//! Baseline training across the fixed algorithm roster

use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

use super::models::{ModelFamily, ModelSpec, TrainedRegressor};

/// One successfully fitted baseline.
#[derive(Debug, Clone)]
pub struct BaselineModel {
    pub family: ModelFamily,
    pub spec: ModelSpec,
    pub model: TrainedRegressor,
    pub training_time_secs: f64,
}

/// A baseline algorithm that failed to fit. Recorded, not fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingFailure {
    pub model_name: String,
    pub reason: String,
}

/// Result of the baseline stage.
#[derive(Debug, Clone)]
pub struct BaselineOutcome {
    pub models: Vec<BaselineModel>,
    pub failures: Vec<TrainingFailure>,
}

/// Fits every family in [`ModelFamily::BASELINE_ROSTER`] with default
/// hyperparameters. A family that fails to converge is recorded and excluded
/// from later stages; the run continues.
#[derive(Debug, Clone)]
pub struct BaselineTrainer {
    seed: u64,
}

impl BaselineTrainer {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn train_all(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<BaselineOutcome> {
        let mut models = Vec::with_capacity(ModelFamily::BASELINE_ROSTER.len());
        let mut failures = Vec::new();

        for family in ModelFamily::BASELINE_ROSTER {
            let spec = ModelSpec::baseline(family);
            let start = Instant::now();
            match spec.fit(x, y, self.seed.wrapping_mul(family.seed_offset())) {
                Ok(model) => {
                    let training_time_secs = start.elapsed().as_secs_f64();
                    info!(
                        model = family.name(),
                        seconds = training_time_secs,
                        "baseline trained"
                    );
                    models.push(BaselineModel {
                        family,
                        spec,
                        model,
                        training_time_secs,
                    });
                }
                Err(e) => {
                    warn!(model = family.name(), error = %e, "baseline excluded");
                    failures.push(TrainingFailure {
                        model_name: family.name().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(BaselineOutcome { models, failures })
    }
}
