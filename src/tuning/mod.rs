//! Randomized hyperparameter search
//!
//! For each family to tune, draws a bounded number of parameter combinations
//! from its [`SearchSpace`], scores every combination by mean k-fold
//! cross-validated R² on the training split, and refits the winner on the
//! full training split. All (combination, fold) fits are independent tasks
//! executed on the bounded worker pool.

mod search_space;

pub use search_space::{ParamDistribution, SearchSpace};

use crate::error::{Result, WellcastError};
use crate::training::{KFold, ModelFamily, ModelSpec, ParamMap, RegressionMetrics, TrainedRegressor};
use ndarray::{Array1, Array2, Axis};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunerConfig {
    /// Parameter combinations to draw per family.
    pub iterations: usize,
    /// Cross-validation folds per combination.
    pub folds: usize,
    pub seed: u64,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            iterations: 20,
            folds: 5,
            seed: 42,
        }
    }
}

/// Winner of one family's search, refit on the full training split.
#[derive(Debug, Clone)]
pub struct TunedModel {
    pub family: ModelFamily,
    pub spec: ModelSpec,
    pub model: TrainedRegressor,
    /// Mean cross-validation R² of the winning combination.
    pub cv_r2: f64,
}

pub struct RandomizedSearchTuner {
    config: TunerConfig,
}

impl RandomizedSearchTuner {
    pub fn new(config: TunerConfig) -> Self {
        Self { config }
    }

    pub fn tune(
        &self,
        family: ModelFamily,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
        pool: &rayon::ThreadPool,
    ) -> Result<TunedModel> {
        let space = SearchSpace::for_family(family);
        if space.is_empty() {
            return Err(WellcastError::Validation(format!(
                "{family} has no search space"
            )));
        }

        let seed = self.config.seed.wrapping_mul(family.seed_offset());
        let draws = self.draw_candidates(&space, seed);
        let folds = KFold::new(self.config.folds, seed).split(x_train.nrows())?;

        info!(
            model = family.name(),
            candidates = draws.len(),
            folds = folds.len(),
            "randomized search"
        );

        // Every (candidate, fold) evaluation is independent: read-only access
        // to the training arrays, one isolated fitted model and score each.
        let tasks: Vec<(usize, usize)> = (0..draws.len())
            .flat_map(|d| (0..folds.len()).map(move |f| (d, f)))
            .collect();

        let fold_scores: Vec<(usize, f64)> = pool.install(|| {
            tasks
                .par_iter()
                .map(|&(draw_idx, fold_idx)| {
                    let fold = &folds[fold_idx];
                    let spec = ModelSpec::with_params(family, draws[draw_idx].clone());

                    let x_fit = x_train.select(Axis(0), &fold.train_indices);
                    let y_fit: Array1<f64> =
                        Array1::from_vec(fold.train_indices.iter().map(|&i| y_train[i]).collect());
                    let x_val = x_train.select(Axis(0), &fold.test_indices);
                    let y_val: Array1<f64> =
                        Array1::from_vec(fold.test_indices.iter().map(|&i| y_train[i]).collect());

                    let score = match spec
                        .fit(&x_fit, &y_fit, seed.wrapping_add(fold_idx as u64))
                        .and_then(|model| model.predict(&x_val))
                    {
                        Ok(predictions) => RegressionMetrics::compute(&y_val, &predictions).r2,
                        Err(e) => {
                            // A failing combination is dropped, not fatal.
                            warn!(model = family.name(), error = %e, "candidate failed");
                            f64::NEG_INFINITY
                        }
                    };
                    (draw_idx, score)
                })
                .collect()
        });

        // Mean score per draw; a draw with any failed fold is disqualified.
        let mut sums = vec![0.0f64; draws.len()];
        let mut counts = vec![0usize; draws.len()];
        for (draw_idx, score) in fold_scores {
            if score == f64::NEG_INFINITY {
                sums[draw_idx] = f64::NEG_INFINITY;
            } else if sums[draw_idx] != f64::NEG_INFINITY {
                sums[draw_idx] += score;
                counts[draw_idx] += 1;
            }
        }

        let mut best_idx = None;
        let mut best_score = f64::NEG_INFINITY;
        for (draw_idx, &sum) in sums.iter().enumerate() {
            if sum == f64::NEG_INFINITY || counts[draw_idx] == 0 {
                continue;
            }
            let mean = sum / counts[draw_idx] as f64;
            debug!(model = family.name(), draw = draw_idx, score = mean, "candidate scored");
            // Ties keep the earlier draw.
            if mean > best_score {
                best_score = mean;
                best_idx = Some(draw_idx);
            }
        }

        let best_idx = best_idx.ok_or_else(|| WellcastError::Training {
            model: family.name().to_string(),
            reason: "every search candidate failed cross-validation".to_string(),
        })?;

        let spec = ModelSpec::with_params(family, draws[best_idx].clone());
        let model = spec.fit(x_train, y_train, seed)?;

        info!(
            model = family.name(),
            cv_r2 = best_score,
            params = %format_params(&draws[best_idx]),
            "search winner"
        );

        Ok(TunedModel {
            family,
            spec,
            model,
            cv_r2: best_score,
        })
    }

    /// Draw distinct parameter combinations, capped by the space cardinality.
    fn draw_candidates(&self, space: &SearchSpace, seed: u64) -> Vec<ParamMap> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let target = self.config.iterations.min(space.cardinality()).max(1);

        let mut seen = std::collections::HashSet::new();
        let mut draws = Vec::with_capacity(target);
        let mut attempts = 0;
        while draws.len() < target && attempts < target * 20 {
            attempts += 1;
            let params = space.sample(&mut rng);
            if seen.insert(format_params(&params)) {
                draws.push(params);
            }
        }
        draws
    }
}

fn format_params(params: &ParamMap) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn toy_data() -> (Array2<f64>, Array1<f64>) {
        let n = 40;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| ((i * 3 + j * 5) % 17) as f64);
        let y = Array1::from_iter((0..n).map(|i| {
            let row = x.row(i);
            2.0 * row[0] - 0.5 * row[1]
        }));
        (x, y)
    }

    fn pool() -> rayon::ThreadPool {
        rayon::ThreadPoolBuilder::new()
            .num_threads(2)
            .build()
            .unwrap()
    }

    #[test]
    fn test_tunes_ridge() {
        let (x, y) = toy_data();
        let tuner = RandomizedSearchTuner::new(TunerConfig {
            iterations: 4,
            folds: 3,
            seed: 42,
        });

        let tuned = tuner.tune(ModelFamily::Ridge, &x, &y, &pool()).unwrap();
        assert_eq!(tuned.family, ModelFamily::Ridge);
        assert!(tuned.cv_r2 > 0.9, "cv_r2 = {}", tuned.cv_r2);
        assert!(tuned.spec.params.contains_key("alpha"));
    }

    #[test]
    fn test_search_is_deterministic() {
        let (x, y) = toy_data();
        let config = TunerConfig {
            iterations: 4,
            folds: 3,
            seed: 7,
        };

        let a = RandomizedSearchTuner::new(config.clone())
            .tune(ModelFamily::Knn, &x, &y, &pool())
            .unwrap();
        let b = RandomizedSearchTuner::new(config)
            .tune(ModelFamily::Knn, &x, &y, &pool())
            .unwrap();

        assert_eq!(a.spec.params, b.spec.params);
        assert_eq!(a.cv_r2, b.cv_r2);
    }

    #[test]
    fn test_candidate_draws_are_unique() {
        let tuner = RandomizedSearchTuner::new(TunerConfig {
            iterations: 50,
            folds: 3,
            seed: 1,
        });
        // Ridge has only 4 combinations; draws must not exceed that.
        let space = SearchSpace::for_family(ModelFamily::Ridge);
        let draws = tuner.draw_candidates(&space, 1);
        assert_eq!(draws.len(), 4);
    }
}
