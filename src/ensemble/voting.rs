//! Voting ensemble (unweighted mean combiner)

use crate::error::{Result, WellcastError};
use crate::training::TrainedRegressor;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Mean-of-members regression ensemble.
///
/// Prediction is the plain arithmetic mean of member predictions; there are
/// no learned weights. The ensemble owns its members outright so the whole
/// combiner serializes as one unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingRegressor {
    member_names: Vec<String>,
    members: Vec<TrainedRegressor>,
}

impl VotingRegressor {
    /// Build from already-fitted members. Fewer than two members is a fatal
    /// ensemble error.
    pub fn from_fitted(members: Vec<(String, TrainedRegressor)>) -> Result<Self> {
        if members.len() < 2 {
            return Err(WellcastError::Ensemble(format!(
                "voting ensemble needs at least 2 members, got {}",
                members.len()
            )));
        }
        let (member_names, members) = members.into_iter().unzip();
        Ok(Self {
            member_names,
            members,
        })
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let per_member: Vec<Array1<f64>> = self
            .members
            .iter()
            .map(|m| m.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let n_samples = x.nrows();
        let n_members = per_member.len() as f64;
        let predictions: Vec<f64> = (0..n_samples)
            .map(|i| per_member.iter().map(|p| p[i]).sum::<f64>() / n_members)
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    /// Mean of member importances, when every member exposes them.
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        let per_member: Vec<Array1<f64>> = self
            .members
            .iter()
            .map(|m| m.feature_importances())
            .collect::<Option<Vec<_>>>()?;

        let n_features = per_member.first()?.len();
        let mut total = Array1::zeros(n_features);
        for imp in &per_member {
            total = total + imp;
        }
        Some(total / per_member.len() as f64)
    }

    pub fn member_names(&self) -> &[String] {
        &self.member_names
    }

    pub fn n_members(&self) -> usize {
        self.members.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{ModelFamily, ModelSpec};
    use ndarray::array;

    fn fitted_member(family: ModelFamily, seed: u64) -> (String, TrainedRegressor) {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![2.0, 4.0, 6.0, 8.0, 10.0, 12.0];
        (
            family.name().to_string(),
            ModelSpec::baseline(family).fit(&x, &y, seed).unwrap(),
        )
    }

    #[test]
    fn test_prediction_is_mean_of_members() {
        let members = vec![
            fitted_member(ModelFamily::Ridge, 1),
            fitted_member(ModelFamily::Knn, 2),
            fitted_member(ModelFamily::RandomForest, 3),
        ];
        let voting = VotingRegressor::from_fitted(members.clone()).unwrap();

        let x = array![[2.5], [4.5]];
        let combined = voting.predict(&x).unwrap();

        for i in 0..x.nrows() {
            let mean: f64 = members
                .iter()
                .map(|(_, m)| m.predict(&x).unwrap()[i])
                .sum::<f64>()
                / members.len() as f64;
            assert!((combined[i] - mean).abs() < 1e-9);
        }
    }

    #[test]
    fn test_rejects_single_member() {
        let members = vec![fitted_member(ModelFamily::Ridge, 1)];
        assert!(matches!(
            VotingRegressor::from_fitted(members),
            Err(WellcastError::Ensemble(_))
        ));
    }
}
