//! IQR-based outlier clipping

use crate::error::{Result, WellcastError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::quantile_sorted;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClipBounds {
    lower: f64,
    upper: f64,
}

/// Per-column clip bounds `[Q1 - w*IQR, Q3 + w*IQR]` learned on fit rows.
///
/// Out-of-bound values are clipped to the nearest bound; rows are never
/// dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IqrClipper {
    whisker: f64,
    bounds: BTreeMap<String, ClipBounds>,
}

impl IqrClipper {
    pub fn fit(columns: &BTreeMap<String, Vec<f64>>, whisker: f64) -> Self {
        let bounds = columns
            .iter()
            .map(|(name, values)| {
                let mut sorted = values.clone();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                let q1 = quantile_sorted(&sorted, 0.25);
                let q3 = quantile_sorted(&sorted, 0.75);
                let iqr = q3 - q1;
                (
                    name.clone(),
                    ClipBounds {
                        lower: q1 - whisker * iqr,
                        upper: q3 + whisker * iqr,
                    },
                )
            })
            .collect();
        Self { whisker, bounds }
    }

    /// Clip one column in place to its learned bounds.
    pub fn apply(&self, column: &str, values: &mut [f64]) -> Result<()> {
        let bounds = self
            .bounds
            .get(column)
            .ok_or_else(|| WellcastError::FeatureNotFound(column.to_string()))?;
        for v in values.iter_mut() {
            *v = v.clamp(bounds.lower, bounds.upper);
        }
        Ok(())
    }

    pub fn bounds_for(&self, column: &str) -> Option<(f64, f64)> {
        self.bounds.get(column).map(|b| (b.lower, b.upper))
    }

    pub fn whisker(&self) -> f64 {
        self.whisker
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clips_to_bounds() {
        let mut cols = BTreeMap::new();
        // Q1 = 2, Q3 = 4, IQR = 2 -> bounds [-1, 7] at whisker 1.5
        cols.insert("a".to_string(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);

        let clipper = IqrClipper::fit(&cols, 1.5);
        let (lower, upper) = clipper.bounds_for("a").unwrap();
        assert!((lower - -1.0).abs() < 1e-9);
        assert!((upper - 7.0).abs() < 1e-9);

        let mut values = vec![-10.0, 3.0, 100.0];
        clipper.apply("a", &mut values).unwrap();
        assert_eq!(values, vec![-1.0, 3.0, 7.0]);
    }

    #[test]
    fn test_constant_column_clips_to_itself() {
        let mut cols = BTreeMap::new();
        cols.insert("a".to_string(), vec![5.0; 8]);

        let clipper = IqrClipper::fit(&cols, 1.5);
        let mut values = vec![4.0, 5.0, 6.0];
        clipper.apply("a", &mut values).unwrap();
        assert_eq!(values, vec![5.0, 5.0, 5.0]);
    }
}
