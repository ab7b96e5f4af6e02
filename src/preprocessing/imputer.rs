//! Median imputation for numeric columns

use crate::error::{Result, WellcastError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{median_sorted, sorted_present};

/// Per-column medians learned on fit rows.
///
/// Missing cells are always replaced with the fit-time column median, never
/// with anything computed from the row itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedianImputer {
    medians: BTreeMap<String, f64>,
}

impl MedianImputer {
    pub fn fit(columns: &BTreeMap<String, Vec<Option<f64>>>) -> Self {
        let medians = columns
            .iter()
            .map(|(name, values)| {
                let sorted = sorted_present(values);
                let median = if sorted.is_empty() {
                    0.0
                } else {
                    median_sorted(&sorted)
                };
                (name.clone(), median)
            })
            .collect();
        Self { medians }
    }

    /// Fill missing cells of one column with its learned median.
    pub fn apply(&self, column: &str, values: &[Option<f64>]) -> Result<Vec<f64>> {
        let median = *self
            .medians
            .get(column)
            .ok_or_else(|| WellcastError::FeatureNotFound(column.to_string()))?;
        Ok(values.iter().map(|v| v.unwrap_or(median)).collect())
    }

    pub fn median_for(&self, column: &str) -> Option<f64> {
        self.medians.get(column).copied()
    }
}
