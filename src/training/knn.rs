//! K-nearest-neighbors regressor

use crate::error::{Result, WellcastError};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Distance metric between feature vectors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Euclidean distance (L2).
    Euclidean,
    /// Manhattan distance (L1).
    Manhattan,
}

impl Default for DistanceMetric {
    fn default() -> Self {
        Self::Euclidean
    }
}

/// Neighbor weighting scheme.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WeightScheme {
    /// All neighbors weigh equally.
    Uniform,
    /// Closer neighbors weigh more (inverse distance).
    Distance,
}

impl WeightScheme {
    pub fn parse(s: &str) -> Self {
        match s {
            "distance" => WeightScheme::Distance,
            _ => WeightScheme::Uniform,
        }
    }
}

impl Default for WeightScheme {
    fn default() -> Self {
        Self::Uniform
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnConfig {
    pub n_neighbors: usize,
    pub weights: WeightScheme,
}

impl Default for KnnConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            weights: WeightScheme::Uniform,
        }
    }
}

/// Non-parametric baseline: stores the training set, predicts the (weighted)
/// mean target of the k nearest rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnRegressor {
    config: KnnConfig,
    metric: DistanceMetric,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
}

impl KnnRegressor {
    pub fn new(config: KnnConfig) -> Self {
        Self {
            config,
            metric: DistanceMetric::Euclidean,
            x_train: None,
            y_train: None,
        }
    }

    pub fn with_k(k: usize) -> Self {
        Self::new(KnnConfig {
            n_neighbors: k,
            ..Default::default()
        })
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(WellcastError::Shape {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if x.nrows() == 0 {
            return Err(WellcastError::Validation(
                "cannot fit KNN on zero samples".to_string(),
            ));
        }
        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let x_train = self.x_train.as_ref().ok_or(WellcastError::NotFitted)?;
        let y_train = self.y_train.as_ref().ok_or(WellcastError::NotFitted)?;
        let k = self.config.n_neighbors.max(1);
        let metric = self.metric;
        let weights = self.config.weights;

        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let row = x.row(i).to_vec();
                let neighbors = find_k_nearest(&row, x_train, y_train, k, metric);
                weighted_mean(&neighbors, weights)
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }
}

impl super::Regressor for KnnRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        KnnRegressor::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        KnnRegressor::predict(self, x)
    }
}

/// Max-heap entry keeping the k smallest distances.
#[derive(PartialEq)]
struct DistTarget(f64, f64);

impl Eq for DistTarget {}
impl PartialOrd for DistTarget {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.0.partial_cmp(&other.0)
    }
}
impl Ord for DistTarget {
    fn cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other).unwrap_or(Ordering::Equal)
    }
}

/// Partial sort with a max-heap: O(n log k) rather than O(n log n).
fn find_k_nearest(
    point: &[f64],
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    k: usize,
    metric: DistanceMetric,
) -> Vec<(f64, f64)> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (i, row) in x_train.rows().into_iter().enumerate() {
        let dist = compute_distance(point, &row.to_vec(), metric);
        if heap.len() < k {
            heap.push(DistTarget(dist, y_train[i]));
        } else if let Some(top) = heap.peek() {
            if dist < top.0 {
                heap.pop();
                heap.push(DistTarget(dist, y_train[i]));
            }
        }
    }

    heap.into_iter().map(|dt| (dt.0, dt.1)).collect()
}

fn compute_distance(a: &[f64], b: &[f64], metric: DistanceMetric) -> f64 {
    match metric {
        DistanceMetric::Euclidean => a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f64>()
            .sqrt(),
        DistanceMetric::Manhattan => a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum(),
    }
}

fn weighted_mean(neighbors: &[(f64, f64)], weights: WeightScheme) -> f64 {
    if neighbors.is_empty() {
        return 0.0;
    }
    match weights {
        WeightScheme::Uniform => {
            neighbors.iter().map(|(_, t)| t).sum::<f64>() / neighbors.len() as f64
        }
        WeightScheme::Distance => {
            // An exact match dominates; fall back to its target directly.
            if let Some((_, t)) = neighbors.iter().find(|(d, _)| *d < 1e-12) {
                return *t;
            }
            let mut weighted = 0.0;
            let mut total = 0.0;
            for (d, t) in neighbors {
                let w = 1.0 / d;
                weighted += w * t;
                total += w;
            }
            weighted / total
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_uniform_mean_of_neighbors() {
        let x = array![[0.0], [1.0], [2.0], [10.0]];
        let y = array![1.0, 2.0, 3.0, 100.0];

        let mut knn = KnnRegressor::with_k(3);
        knn.fit(&x, &y).unwrap();

        let pred = knn.predict(&array![[1.0]]).unwrap();
        assert!((pred[0] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_distance_weighting_prefers_exact_match() {
        let x = array![[0.0], [1.0], [5.0]];
        let y = array![10.0, 20.0, 30.0];

        let mut knn = KnnRegressor::new(KnnConfig {
            n_neighbors: 3,
            weights: WeightScheme::Distance,
        });
        knn.fit(&x, &y).unwrap();

        let pred = knn.predict(&array![[1.0]]).unwrap();
        assert!((pred[0] - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let knn = KnnRegressor::with_k(3);
        assert!(knn.predict(&array![[1.0]]).is_err());
    }
}
