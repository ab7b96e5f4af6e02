//! Stacking ensemble (ridge meta-learner over out-of-fold predictions)

use crate::error::{Result, WellcastError};
use crate::training::{KFold, ModelSpec, RidgeRegression, TrainedRegressor};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Regularization of the meta-learner.
const META_ALPHA: f64 = 1.0;

/// Two-level combiner: base members plus a ridge regressor trained on their
/// out-of-fold predictions.
///
/// Fitting generates out-of-fold predictions for each member via k-fold
/// refits (so the meta-learner never sees a member's in-sample optimism),
/// trains the ridge meta-learner on that matrix, then refits every member on
/// the full training split for inference. The ensemble owns its members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackingRegressor {
    member_specs: Vec<ModelSpec>,
    members: Vec<TrainedRegressor>,
    meta: RidgeRegression,
    n_folds: usize,
}

impl StackingRegressor {
    pub fn fit(
        member_specs: Vec<ModelSpec>,
        x: &Array2<f64>,
        y: &Array1<f64>,
        n_folds: usize,
        seed: u64,
    ) -> Result<Self> {
        if member_specs.len() < 2 {
            return Err(WellcastError::Ensemble(format!(
                "stacking ensemble needs at least 2 base models, got {}",
                member_specs.len()
            )));
        }

        let n_samples = x.nrows();
        let folds = KFold::new(n_folds, seed).split(n_samples)?;

        // Out-of-fold member predictions become the meta-features.
        let mut meta_features = Array2::zeros((n_samples, member_specs.len()));
        for (member_idx, spec) in member_specs.iter().enumerate() {
            let member_seed = seed.wrapping_add(member_idx as u64);
            for fold in &folds {
                let x_train = x.select(Axis(0), &fold.train_indices);
                let y_train: Array1<f64> =
                    Array1::from_vec(fold.train_indices.iter().map(|&i| y[i]).collect());
                let x_val = x.select(Axis(0), &fold.test_indices);

                let model = spec.fit(&x_train, &y_train, member_seed)?;
                let predictions = model.predict(&x_val)?;

                for (local_idx, &global_idx) in fold.test_indices.iter().enumerate() {
                    meta_features[[global_idx, member_idx]] = predictions[local_idx];
                }
            }
        }

        let mut meta = RidgeRegression::new(META_ALPHA);
        meta.fit(&meta_features, y)?;

        // Full-split member refits are what inference runs against.
        let members = member_specs
            .iter()
            .enumerate()
            .map(|(member_idx, spec)| spec.fit(x, y, seed.wrapping_add(member_idx as u64)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            member_specs,
            members,
            meta,
            n_folds,
        })
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let n_samples = x.nrows();
        let mut meta_features = Array2::zeros((n_samples, self.members.len()));

        for (member_idx, member) in self.members.iter().enumerate() {
            let predictions = member.predict(x)?;
            for i in 0..n_samples {
                meta_features[[i, member_idx]] = predictions[i];
            }
        }

        self.meta.predict(&meta_features)
    }

    pub fn member_specs(&self) -> &[ModelSpec] {
        &self.member_specs
    }

    pub fn n_members(&self) -> usize {
        self.members.len()
    }

    pub fn n_folds(&self) -> usize {
        self.n_folds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::ModelFamily;
    use ndarray::Array2;

    fn toy_data() -> (Array2<f64>, Array1<f64>) {
        let n = 30;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| ((i * 5 + j * 2) % 11) as f64);
        let y = Array1::from_iter((0..n).map(|i| {
            let row = x.row(i);
            3.0 * row[0] + row[1] + 1.0
        }));
        (x, y)
    }

    #[test]
    fn test_fit_and_predict() {
        let (x, y) = toy_data();
        let specs = vec![
            ModelSpec::baseline(ModelFamily::Ridge),
            ModelSpec::baseline(ModelFamily::Knn),
        ];

        let stacking = StackingRegressor::fit(specs, &x, &y, 5, 42).unwrap();
        assert_eq!(stacking.n_members(), 2);

        let predictions = stacking.predict(&x).unwrap();
        assert_eq!(predictions.len(), x.nrows());

        // Should comfortably track a noiseless linear target.
        let ss_res: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum();
        let mean = y.mean().unwrap();
        let ss_tot: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
        assert!(1.0 - ss_res / ss_tot > 0.8);
    }

    #[test]
    fn test_rejects_single_member() {
        let (x, y) = toy_data();
        let specs = vec![ModelSpec::baseline(ModelFamily::Ridge)];
        assert!(matches!(
            StackingRegressor::fit(specs, &x, &y, 5, 0),
            Err(WellcastError::Ensemble(_))
        ));
    }
}
