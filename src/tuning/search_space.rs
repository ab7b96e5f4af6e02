//! Bounded hyperparameter search spaces

use crate::training::{ModelFamily, ParamMap, ParamValue};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Distribution for one hyperparameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ParamDistribution {
    IntChoice(Vec<i64>),
    FloatChoice(Vec<f64>),
    StrChoice(Vec<String>),
}

impl ParamDistribution {
    fn sample(&self, rng: &mut ChaCha8Rng) -> ParamValue {
        match self {
            ParamDistribution::IntChoice(values) => {
                ParamValue::Int(values[rng.gen_range(0..values.len())])
            }
            ParamDistribution::FloatChoice(values) => {
                ParamValue::Float(values[rng.gen_range(0..values.len())])
            }
            ParamDistribution::StrChoice(values) => {
                ParamValue::Str(values[rng.gen_range(0..values.len())].clone())
            }
        }
    }
}

/// Bounded parameter space for randomized search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSpace {
    params: BTreeMap<String, ParamDistribution>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn int_choice(mut self, name: &str, values: &[i64]) -> Self {
        self.params
            .insert(name.to_string(), ParamDistribution::IntChoice(values.to_vec()));
        self
    }

    pub fn float_choice(mut self, name: &str, values: &[f64]) -> Self {
        self.params.insert(
            name.to_string(),
            ParamDistribution::FloatChoice(values.to_vec()),
        );
        self
    }

    pub fn str_choice(mut self, name: &str, values: &[&str]) -> Self {
        self.params.insert(
            name.to_string(),
            ParamDistribution::StrChoice(values.iter().map(|s| s.to_string()).collect()),
        );
        self
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Total number of distinct combinations in the space.
    pub fn cardinality(&self) -> usize {
        self.params
            .values()
            .map(|d| match d {
                ParamDistribution::IntChoice(v) => v.len(),
                ParamDistribution::FloatChoice(v) => v.len(),
                ParamDistribution::StrChoice(v) => v.len(),
            })
            .product()
    }

    /// Draw one parameter assignment.
    pub fn sample(&self, rng: &mut ChaCha8Rng) -> ParamMap {
        self.params
            .iter()
            .map(|(name, dist)| (name.clone(), dist.sample(rng)))
            .collect()
    }

    /// Per-family search grid. A `max_depth` of 0 means unbounded.
    pub fn for_family(family: ModelFamily) -> SearchSpace {
        match family {
            ModelFamily::RandomForest => SearchSpace::new()
                .int_choice("n_estimators", &[100, 200, 300])
                .int_choice("max_depth", &[10, 20, 30, 0])
                .int_choice("min_samples_split", &[2, 5, 10])
                .int_choice("min_samples_leaf", &[1, 2, 4])
                .str_choice("max_features", &["sqrt", "log2"]),
            ModelFamily::GradientBoosting => SearchSpace::new()
                .int_choice("n_estimators", &[100, 200, 300])
                .float_choice("learning_rate", &[0.01, 0.05, 0.1])
                .int_choice("max_depth", &[3, 5, 7])
                .int_choice("min_samples_split", &[2, 5, 10])
                .float_choice("subsample", &[0.8, 0.9, 1.0]),
            ModelFamily::ExtraTrees => SearchSpace::new()
                .int_choice("n_estimators", &[100, 200, 300])
                .int_choice("max_depth", &[10, 20, 30, 0])
                .int_choice("min_samples_split", &[2, 5, 10])
                .int_choice("min_samples_leaf", &[1, 2, 4]),
            ModelFamily::Ridge | ModelFamily::Lasso => {
                SearchSpace::new().float_choice("alpha", &[0.01, 0.1, 1.0, 10.0])
            }
            ModelFamily::ElasticNet => SearchSpace::new()
                .float_choice("alpha", &[0.01, 0.1, 1.0, 10.0])
                .float_choice("l1_ratio", &[0.2, 0.5, 0.8]),
            ModelFamily::AdaBoost => SearchSpace::new()
                .int_choice("n_estimators", &[50, 100, 200])
                .float_choice("learning_rate", &[0.01, 0.1, 1.0]),
            ModelFamily::Knn => SearchSpace::new()
                .int_choice("n_neighbors", &[3, 5, 7, 9, 11])
                .str_choice("weights", &["uniform", "distance"]),
            // Ensembles are composed, not searched.
            ModelFamily::Voting | ModelFamily::Stacking => SearchSpace::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_sample_stays_in_space() {
        let space = SearchSpace::for_family(ModelFamily::RandomForest);
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        for _ in 0..50 {
            let params = space.sample(&mut rng);
            let n = params.get("n_estimators").and_then(|v| v.as_int()).unwrap();
            assert!([100, 200, 300].contains(&n));
            let mf = params.get("max_features").and_then(|v| v.as_str()).unwrap();
            assert!(["sqrt", "log2"].contains(&mf));
        }
    }

    #[test]
    fn test_sampling_is_deterministic() {
        let space = SearchSpace::for_family(ModelFamily::GradientBoosting);
        let mut a = ChaCha8Rng::seed_from_u64(5);
        let mut b = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..10 {
            assert_eq!(space.sample(&mut a), space.sample(&mut b));
        }
    }

    #[test]
    fn test_every_baseline_family_has_a_space() {
        for family in ModelFamily::BASELINE_ROSTER {
            assert!(!SearchSpace::for_family(family).is_empty());
        }
    }

    #[test]
    fn test_cardinality() {
        let space = SearchSpace::new()
            .int_choice("a", &[1, 2, 3])
            .str_choice("b", &["x", "y"]);
        assert_eq!(space.cardinality(), 6);
    }
}
