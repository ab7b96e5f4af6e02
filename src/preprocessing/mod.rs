//! Feature engineering
//!
//! [`FeatureEngineer`] turns raw records into the model-ready feature matrix
//! through a fixed step order: median imputation, IQR outlier clipping,
//! derived-feature construction, categorical encoding, robust scaling. The
//! statistics learned at fit time are captured in a [`FittedTransform`],
//! which is the single source of truth for the transformation — the same
//! code path serves the training table and a single prediction-time record.

mod derive;
mod encoder;
mod imputer;
mod outliers;
mod scaler;

pub use encoder::CategoryEncoder;
pub use imputer::MedianImputer;
pub use outliers::IqrClipper;
pub use scaler::RobustScaler;

use crate::error::{Result, WellcastError};
use crate::schema::{ColumnType, DerivedFeature, RawRecord, SchemaSpec};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// IQR whisker multiplier for outlier bounds.
const IQR_WHISKER: f64 = 1.5;

pub(crate) fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted
}

pub(crate) fn sorted_present(values: &[Option<f64>]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().flatten().copied().collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted
}

/// Linear-interpolation quantile over an already-sorted slice.
pub(crate) fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = pos - lo as f64;
        sorted[lo] + (sorted[hi] - sorted[lo]) * frac
    }
}

pub(crate) fn median_sorted(sorted: &[f64]) -> f64 {
    quantile_sorted(sorted, 0.5)
}

/// Learns a [`FittedTransform`] from fit rows.
pub struct FeatureEngineer {
    schema: SchemaSpec,
}

impl FeatureEngineer {
    pub fn new(schema: SchemaSpec) -> Self {
        Self { schema }
    }

    /// Learn imputation, clipping, encoding, derived-feature constants, and
    /// scaling from `records`, returning the transform and the transformed
    /// matrix for those same rows.
    pub fn fit(&self, records: &[RawRecord]) -> Result<(FittedTransform, Array2<f64>)> {
        if records.is_empty() {
            return Err(WellcastError::Validation(
                "cannot fit a feature transform on zero rows".to_string(),
            ));
        }

        let numeric_raw = extract_numeric(&self.schema, records)?;
        let text_raw = extract_text(&self.schema, records)?;

        let imputer = MedianImputer::fit(&numeric_raw);
        let mut numeric: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for (name, values) in &numeric_raw {
            numeric.insert(name.clone(), imputer.apply(name, values)?);
        }

        let clipper = IqrClipper::fit(&numeric, IQR_WHISKER);
        for (name, values) in numeric.iter_mut() {
            clipper.apply(name, values)?;
        }

        let derived = derive::resolve_formulas(&self.schema.derived, &numeric)?;

        let encoders: BTreeMap<String, CategoryEncoder> = text_raw
            .iter()
            .map(|(name, values)| (name.clone(), CategoryEncoder::fit(values)))
            .collect();

        let transform = FittedTransform {
            schema: self.schema.clone(),
            imputer,
            clipper,
            encoders,
            derived,
            scaler: None,
            feature_names: Vec::new(),
        };

        let (feature_names, unscaled) =
            transform.assemble(records.len(), &numeric, &text_raw)?;
        let scaler = RobustScaler::fit(&unscaled);
        let matrix = scaler.transform(&unscaled)?;

        let transform = FittedTransform {
            scaler: Some(scaler),
            feature_names,
            ..transform
        };

        Ok((transform, matrix))
    }
}

/// All statistics needed to replay the feature transformation.
///
/// The feature-name order produced at fit time is immutable; the artifact
/// layer checksums it so a mismatched transform fails fast instead of
/// silently mispredicting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedTransform {
    schema: SchemaSpec,
    imputer: MedianImputer,
    clipper: IqrClipper,
    encoders: BTreeMap<String, CategoryEncoder>,
    /// Derived features with all fit-time constants resolved.
    derived: Vec<DerivedFeature>,
    scaler: Option<RobustScaler>,
    feature_names: Vec<String>,
}

impl FittedTransform {
    /// Apply the learned transformation to new records.
    pub fn transform(&self, records: &[RawRecord]) -> Result<Array2<f64>> {
        let scaler = self.scaler.as_ref().ok_or(WellcastError::NotFitted)?;
        if records.is_empty() {
            return Ok(Array2::zeros((0, self.feature_names.len())));
        }

        let numeric_raw = extract_numeric(&self.schema, records)?;
        let text_raw = extract_text(&self.schema, records)?;

        let mut numeric: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for (name, values) in &numeric_raw {
            numeric.insert(name.clone(), self.imputer.apply(name, values)?);
        }
        for (name, values) in numeric.iter_mut() {
            self.clipper.apply(name, values)?;
        }

        let (_, unscaled) = self.assemble(records.len(), &numeric, &text_raw)?;
        scaler.transform(&unscaled)
    }

    /// Transform a single record into one feature vector.
    pub fn transform_one(&self, record: &RawRecord) -> Result<Array1<f64>> {
        let matrix = self.transform(std::slice::from_ref(record))?;
        Ok(matrix.row(0).to_owned())
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn schema(&self) -> &SchemaSpec {
        &self.schema
    }

    /// Assemble the unscaled feature matrix: raw predictors in schema order
    /// (categoricals encoded in place), then derived features in declaration
    /// order. The order is fixed here and nowhere else.
    fn assemble(
        &self,
        n_rows: usize,
        numeric: &BTreeMap<String, Vec<f64>>,
        text: &BTreeMap<String, Vec<Option<String>>>,
    ) -> Result<(Vec<String>, Array2<f64>)> {
        let mut names: Vec<String> = Vec::with_capacity(self.schema.feature_count());
        let mut columns: Vec<Vec<f64>> = Vec::with_capacity(self.schema.feature_count());

        for col in &self.schema.columns {
            match col.dtype {
                ColumnType::Categorical => {
                    let encoder = self
                        .encoders
                        .get(&col.name)
                        .ok_or_else(|| WellcastError::FeatureNotFound(col.name.clone()))?;
                    let values = text
                        .get(&col.name)
                        .ok_or_else(|| WellcastError::FeatureNotFound(col.name.clone()))?;
                    columns.push(encoder.encode(values));
                }
                _ => {
                    let values = numeric
                        .get(&col.name)
                        .ok_or_else(|| WellcastError::FeatureNotFound(col.name.clone()))?;
                    columns.push(values.clone());
                }
            }
            names.push(col.name.clone());
        }

        for feature in &self.derived {
            columns.push(derive::compute_feature(&feature.formula, numeric, n_rows)?);
            names.push(feature.name.clone());
        }

        let n_cols = columns.len();
        let matrix = Array2::from_shape_fn((n_rows, n_cols), |(r, c)| columns[c][r]);
        Ok((names, matrix))
    }
}

fn extract_numeric(
    schema: &SchemaSpec,
    records: &[RawRecord],
) -> Result<BTreeMap<String, Vec<Option<f64>>>> {
    let mut out: BTreeMap<String, Vec<Option<f64>>> = BTreeMap::new();
    for name in schema.numeric_column_names() {
        let mut values = Vec::with_capacity(records.len());
        for record in records {
            values.push(record.numeric(name)?);
        }
        out.insert(name.to_string(), values);
    }
    Ok(out)
}

fn extract_text(
    schema: &SchemaSpec,
    records: &[RawRecord],
) -> Result<BTreeMap<String, Vec<Option<String>>>> {
    let mut out: BTreeMap<String, Vec<Option<String>>> = BTreeMap::new();
    for name in schema.categorical_column_names() {
        let mut values = Vec::with_capacity(records.len());
        for record in records {
            values.push(record.text(name)?.map(|s| s.to_string()));
        }
        out.insert(name.to_string(), values);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RawValue;

    fn wellness_record(screen: f64, work: f64) -> RawRecord {
        let mut r = RawRecord::new();
        r.set_number("age", 30.0);
        r.set_text("gender", "female");
        r.set_text("occupation", "engineer");
        r.set_text("work_mode", "remote");
        r.set_number("screen_time_hours", screen);
        r.set_number("work_screen_hours", work);
        r.set_number("leisure_screen_hours", (screen - work).max(0.0));
        r.set_number("sleep_hours", 7.0);
        r.set_number("sleep_quality_1_5", 4.0);
        r.set_number("stress_level_0_10", 5.0);
        r.set_number("productivity_0_100", 70.0);
        r.set_number("exercise_minutes_per_week", 120.0);
        r.set_number("social_hours_per_week", 8.0);
        r
    }

    fn fit_rows() -> Vec<RawRecord> {
        (0..24)
            .map(|i| {
                let screen = 4.0 + (i % 8) as f64;
                let work = 2.0 + (i % 5) as f64;
                let mut r = wellness_record(screen, work);
                r.set_number("age", 20.0 + i as f64);
                r.set_number("stress_level_0_10", (i % 10) as f64);
                r.set_text("gender", if i % 2 == 0 { "female" } else { "male" });
                r
            })
            .collect()
    }

    #[test]
    fn test_wellness_produces_26_features() {
        let engineer = FeatureEngineer::new(SchemaSpec::wellness());
        let rows = fit_rows();
        let (transform, matrix) = engineer.fit(&rows).unwrap();

        assert_eq!(transform.feature_names().len(), 26);
        assert_eq!(matrix.ncols(), 26);
        assert_eq!(matrix.nrows(), rows.len());

        // Raw columns first, in schema order; derived afterwards.
        assert_eq!(transform.feature_names()[0], "age");
        assert_eq!(transform.feature_names()[13], "work_screen_ratio");
        assert_eq!(transform.feature_names()[25], "sleep_squared");
    }

    #[test]
    fn test_transform_is_deterministic() {
        let engineer = FeatureEngineer::new(SchemaSpec::wellness());
        let rows = fit_rows();
        let (transform, _) = engineer.fit(&rows).unwrap();

        let record = wellness_record(9.5, 7.0);
        let a = transform.transform_one(&record).unwrap();
        let b = transform.transform_one(&record).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unseen_category_does_not_fail() {
        let engineer = FeatureEngineer::new(SchemaSpec::wellness());
        let (transform, _) = engineer.fit(&fit_rows()).unwrap();

        let mut record = wellness_record(6.0, 3.0);
        record.set_text("gender", "nonbinary");
        assert!(transform.transform_one(&record).is_ok());
    }

    #[test]
    fn test_missing_numeric_cell_imputed() {
        let engineer = FeatureEngineer::new(SchemaSpec::wellness());
        let (transform, _) = engineer.fit(&fit_rows()).unwrap();

        let mut record = wellness_record(6.0, 3.0);
        record.insert("sleep_hours", RawValue::Missing);
        let vector = transform.transform_one(&record).unwrap();
        assert!(vector.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_fit_then_transform_matches_fit_output() {
        let engineer = FeatureEngineer::new(SchemaSpec::wellness());
        let rows = fit_rows();
        let (transform, fitted_matrix) = engineer.fit(&rows).unwrap();
        let replayed = transform.transform(&rows).unwrap();

        for (a, b) in fitted_matrix.iter().zip(replayed.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }
}
