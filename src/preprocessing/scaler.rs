//! Robust feature scaling

use crate::error::{Result, WellcastError};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::{median_sorted, quantile_sorted};

/// Center/scale pair for one feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScalerParams {
    center: f64,
    scale: f64,
}

/// Robust scaler: `(x - median) / IQR` per feature, learned on fit rows.
///
/// A zero IQR yields a scaled value of 0.0 for that feature (constant
/// features carry no information either way).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobustScaler {
    params: Vec<ScalerParams>,
}

impl RobustScaler {
    pub fn fit(matrix: &Array2<f64>) -> Self {
        let params = matrix
            .columns()
            .into_iter()
            .map(|col| {
                let mut sorted: Vec<f64> = col.to_vec();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                let center = median_sorted(&sorted);
                let scale = quantile_sorted(&sorted, 0.75) - quantile_sorted(&sorted, 0.25);
                ScalerParams { center, scale }
            })
            .collect();
        Self { params }
    }

    pub fn transform(&self, matrix: &Array2<f64>) -> Result<Array2<f64>> {
        if matrix.ncols() != self.params.len() {
            return Err(WellcastError::Shape {
                expected: format!("{} feature columns", self.params.len()),
                actual: format!("{} feature columns", matrix.ncols()),
            });
        }

        let mut scaled = matrix.clone();
        for (j, params) in self.params.iter().enumerate() {
            for v in scaled.column_mut(j).iter_mut() {
                *v = if params.scale == 0.0 {
                    0.0
                } else {
                    (*v - params.center) / params.scale
                };
            }
        }
        Ok(scaled)
    }

    pub fn n_features(&self) -> usize {
        self.params.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_median_maps_to_zero() {
        let m = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let scaler = RobustScaler::fit(&m);
        let scaled = scaler.transform(&m).unwrap();
        // median 3, IQR 2
        assert!((scaled[[2, 0]] - 0.0).abs() < 1e-12);
        assert!((scaled[[4, 0]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_iqr_scales_to_zero() {
        let m = array![[7.0], [7.0], [7.0], [7.0]];
        let scaler = RobustScaler::fit(&m);
        let scaled = scaler.transform(&array![[7.0], [9.0]]).unwrap();
        assert_eq!(scaled[[0, 0]], 0.0);
        assert_eq!(scaled[[1, 0]], 0.0);
    }

    #[test]
    fn test_column_count_mismatch_is_error() {
        let m = array![[1.0, 2.0], [3.0, 4.0]];
        let scaler = RobustScaler::fit(&m);
        assert!(scaler.transform(&array![[1.0], [2.0]]).is_err());
    }
}
