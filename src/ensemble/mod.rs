//! Voting and stacking ensembles

mod stacking;
mod voting;

pub use stacking::StackingRegressor;
pub use voting::VotingRegressor;

use crate::error::{Result, WellcastError};
use crate::training::{ModelSpec, TrainedRegressor};
use ndarray::{Array1, Array2};

/// Builds both combiners from the tuned base models.
#[derive(Debug, Clone)]
pub struct EnsembleBuilder {
    pub n_folds: usize,
    pub seed: u64,
}

impl EnsembleBuilder {
    pub fn new(n_folds: usize, seed: u64) -> Self {
        Self { n_folds, seed }
    }

    /// Mean combiner over already-fitted base models.
    pub fn build_voting(
        &self,
        members: Vec<(String, TrainedRegressor)>,
    ) -> Result<VotingRegressor> {
        VotingRegressor::from_fitted(members)
    }

    /// Out-of-fold stacking with a ridge meta-learner, refit from the tuned
    /// member configurations.
    pub fn build_stacking(
        &self,
        member_specs: Vec<ModelSpec>,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
    ) -> Result<StackingRegressor> {
        StackingRegressor::fit(member_specs, x_train, y_train, self.n_folds, self.seed)
    }

    /// Guard used by the pipeline before attempting either combiner.
    pub fn check_member_count(&self, n_usable: usize) -> Result<()> {
        if n_usable < 2 {
            return Err(WellcastError::Ensemble(format!(
                "ensembling requires at least 2 usable base models, got {n_usable}"
            )));
        }
        Ok(())
    }
}
