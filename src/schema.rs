//! Problem-instance schemas
//!
//! A [`SchemaSpec`] is the static description of one prediction problem: the
//! raw input columns with their types and valid ranges, the target column,
//! and the named derived-feature formulas. The pipeline itself is generic —
//! a new problem instance is a new `SchemaSpec`, not new code.

use crate::error::{Result, WellcastError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declared type of a raw input column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnType {
    /// Continuous or integer-valued, with a declared valid range.
    Numeric { min: f64, max: f64 },
    /// Free-form category labels, label-encoded at fit time.
    Categorical,
    /// True/false, mapped to 1.0/0.0.
    Boolean,
}

/// One raw input column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub dtype: ColumnType,
}

impl ColumnSpec {
    pub fn numeric(name: &str, min: f64, max: f64) -> Self {
        Self {
            name: name.to_string(),
            dtype: ColumnType::Numeric { min, max },
        }
    }

    pub fn categorical(name: &str) -> Self {
        Self {
            name: name.to_string(),
            dtype: ColumnType::Categorical,
        }
    }

    pub fn boolean(name: &str) -> Self {
        Self {
            name: name.to_string(),
            dtype: ColumnType::Boolean,
        }
    }
}

/// A threshold that is either fixed at design time or learned from fit rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cutoff {
    Fixed(f64),
    /// Resolved to the column median over fit rows.
    FitMedian,
}

/// Normalizer for one term of a [`Formula::Blend`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Norm {
    Fixed(f64),
    /// Resolved to the column maximum over fit rows.
    FitMax,
}

/// One weighted term of a blend: `weight * col / norm`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlendTerm {
    pub col: String,
    pub weight: f64,
    pub norm: Norm,
}

/// Fixed, named arithmetic formula for a derived feature.
///
/// Formulas reference numeric raw columns by name and are evaluated after
/// imputation and outlier clipping, before encoding and scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Formula {
    /// `num / den`; a zero denominator yields the 0.0 sentinel, never an error.
    Ratio { num: String, den: String },
    /// `col * col`
    Square { col: String },
    /// 1.0 when `col > cutoff`, else 0.0.
    FlagAbove { col: String, cutoff: Cutoff },
    /// Ordinal bucket code: values `<= edges[0]` map to 0, `<= edges[1]` to 1,
    /// and so on; values above the last edge map to `edges.len()`.
    Bucket { col: String, edges: Vec<f64> },
    /// Weighted sum of normalized terms.
    Blend { terms: Vec<BlendTerm> },
    /// `col * (range - other) / range` — interaction of a load column with the
    /// shortfall of a capacity column from its full range.
    ComplementProduct {
        col: String,
        complement_of: String,
        range: f64,
    },
}

/// A named derived feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedFeature {
    pub name: String,
    pub formula: Formula,
}

impl DerivedFeature {
    pub fn new(name: &str, formula: Formula) -> Self {
        Self {
            name: name.to_string(),
            formula,
        }
    }
}

/// Static description of one problem instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSpec {
    /// Short instance name, used for artifact naming and reports.
    pub name: String,
    /// Predictor columns, in the order they appear in the feature vector.
    pub columns: Vec<ColumnSpec>,
    /// The regression target.
    pub target: ColumnSpec,
    /// Columns present in the raw table but excluded from modeling.
    pub drop_columns: Vec<String>,
    /// Derived features, in feature-vector order after the raw columns.
    pub derived: Vec<DerivedFeature>,
}

impl SchemaSpec {
    /// Names of all predictor columns, in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Names of numeric and boolean predictor columns (the ones formulas,
    /// imputation, and clipping operate on).
    pub fn numeric_column_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| !matches!(c.dtype, ColumnType::Categorical))
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Names of categorical predictor columns.
    pub fn categorical_column_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| matches!(c.dtype, ColumnType::Categorical))
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Total feature count after derivation: raw predictors plus derived.
    pub fn feature_count(&self) -> usize {
        self.columns.len() + self.derived.len()
    }

    /// Declared range of the target column.
    pub fn target_range(&self) -> (f64, f64) {
        match self.target.dtype {
            ColumnType::Numeric { min, max } => (min, max),
            _ => (0.0, 1.0),
        }
    }

    /// The built-in wellness instance: 13 lifestyle predictors, 13 derived
    /// features, and a 0-100 wellness index target.
    pub fn wellness() -> Self {
        use Formula::*;
        Self {
            name: "wellness".to_string(),
            columns: vec![
                ColumnSpec::numeric("age", 10.0, 100.0),
                ColumnSpec::categorical("gender"),
                ColumnSpec::categorical("occupation"),
                ColumnSpec::categorical("work_mode"),
                ColumnSpec::numeric("screen_time_hours", 0.0, 24.0),
                ColumnSpec::numeric("work_screen_hours", 0.0, 24.0),
                ColumnSpec::numeric("leisure_screen_hours", 0.0, 24.0),
                ColumnSpec::numeric("sleep_hours", 0.0, 24.0),
                ColumnSpec::numeric("sleep_quality_1_5", 1.0, 5.0),
                ColumnSpec::numeric("stress_level_0_10", 0.0, 10.0),
                ColumnSpec::numeric("productivity_0_100", 0.0, 100.0),
                ColumnSpec::numeric("exercise_minutes_per_week", 0.0, 2_000.0),
                ColumnSpec::numeric("social_hours_per_week", 0.0, 120.0),
            ],
            target: ColumnSpec::numeric("mental_wellness_index_0_100", 0.0, 100.0),
            drop_columns: vec!["user_id".to_string()],
            derived: vec![
                DerivedFeature::new(
                    "work_screen_ratio",
                    Ratio {
                        num: "work_screen_hours".into(),
                        den: "screen_time_hours".into(),
                    },
                ),
                DerivedFeature::new(
                    "leisure_screen_ratio",
                    Ratio {
                        num: "leisure_screen_hours".into(),
                        den: "screen_time_hours".into(),
                    },
                ),
                DerivedFeature::new(
                    "sleep_efficiency",
                    Ratio {
                        num: "sleep_quality_1_5".into(),
                        den: "sleep_hours".into(),
                    },
                ),
                DerivedFeature::new(
                    "work_life_balance",
                    Ratio {
                        num: "social_hours_per_week".into(),
                        den: "work_screen_hours".into(),
                    },
                ),
                DerivedFeature::new(
                    "screen_sleep_ratio",
                    Ratio {
                        num: "screen_time_hours".into(),
                        den: "sleep_hours".into(),
                    },
                ),
                DerivedFeature::new(
                    "health_score",
                    Blend {
                        terms: vec![
                            BlendTerm {
                                col: "sleep_quality_1_5".into(),
                                weight: 0.3,
                                norm: Norm::Fixed(5.0),
                            },
                            BlendTerm {
                                col: "exercise_minutes_per_week".into(),
                                weight: 0.4,
                                norm: Norm::FitMax,
                            },
                            BlendTerm {
                                col: "social_hours_per_week".into(),
                                weight: 0.3,
                                norm: Norm::FitMax,
                            },
                        ],
                    },
                ),
                DerivedFeature::new(
                    "stress_productivity_interaction",
                    ComplementProduct {
                        col: "stress_level_0_10".into(),
                        complement_of: "productivity_0_100".into(),
                        range: 100.0,
                    },
                ),
                DerivedFeature::new(
                    "age_group",
                    Bucket {
                        col: "age".into(),
                        edges: vec![25.0, 35.0, 45.0],
                    },
                ),
                DerivedFeature::new(
                    "high_screen_time",
                    FlagAbove {
                        col: "screen_time_hours".into(),
                        cutoff: Cutoff::FitMedian,
                    },
                ),
                DerivedFeature::new(
                    "excessive_work_screen",
                    FlagAbove {
                        col: "work_screen_hours".into(),
                        cutoff: Cutoff::Fixed(8.0),
                    },
                ),
                DerivedFeature::new(
                    "screen_time_squared",
                    Square {
                        col: "screen_time_hours".into(),
                    },
                ),
                DerivedFeature::new(
                    "stress_squared",
                    Square {
                        col: "stress_level_0_10".into(),
                    },
                ),
                DerivedFeature::new(
                    "sleep_squared",
                    Square {
                        col: "sleep_hours".into(),
                    },
                ),
            ],
        }
    }
}

/// One raw cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawValue {
    Number(f64),
    Text(String),
    Bool(bool),
    Missing,
}

/// One raw input row: column name to value.
///
/// All schema columns must be present; missing *cells* are represented as
/// [`RawValue::Missing`] and handled by imputation, while a missing *column*
/// is a schema error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRecord {
    values: BTreeMap<String, RawValue>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: RawValue) {
        self.values.insert(column.into(), value);
    }

    pub fn set_number(&mut self, column: &str, value: f64) {
        self.insert(column, RawValue::Number(value));
    }

    pub fn set_text(&mut self, column: &str, value: &str) {
        self.insert(column, RawValue::Text(value.to_string()));
    }

    pub fn get(&self, column: &str) -> Option<&RawValue> {
        self.values.get(column)
    }

    /// Numeric view of a cell. Booleans coerce to 1.0/0.0; text does not.
    pub fn numeric(&self, column: &str) -> Result<Option<f64>> {
        match self.values.get(column) {
            None => Err(WellcastError::Schema(format!(
                "required column '{column}' missing from record"
            ))),
            Some(RawValue::Missing) => Ok(None),
            Some(RawValue::Number(v)) => Ok(Some(*v)),
            Some(RawValue::Bool(b)) => Ok(Some(if *b { 1.0 } else { 0.0 })),
            Some(RawValue::Text(t)) => Err(WellcastError::Schema(format!(
                "column '{column}' expected a number, got text '{t}'"
            ))),
        }
    }

    /// Textual view of a cell for categorical columns.
    pub fn text(&self, column: &str) -> Result<Option<&str>> {
        match self.values.get(column) {
            None => Err(WellcastError::Schema(format!(
                "required column '{column}' missing from record"
            ))),
            Some(RawValue::Missing) => Ok(None),
            Some(RawValue::Text(t)) => Ok(Some(t.as_str())),
            Some(other) => Err(WellcastError::Schema(format!(
                "column '{column}' expected text, got {other:?}"
            ))),
        }
    }

    /// Build a record from a JSON object, typed against the schema.
    pub fn from_json(schema: &SchemaSpec, value: &serde_json::Value) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| {
            WellcastError::Schema("prediction input must be a JSON object".to_string())
        })?;

        let mut record = RawRecord::new();
        for col in &schema.columns {
            let cell = obj.get(&col.name).ok_or_else(|| {
                WellcastError::Schema(format!("required column '{}' missing from input", col.name))
            })?;
            let parsed = match (&col.dtype, cell) {
                (_, serde_json::Value::Null) => RawValue::Missing,
                (ColumnType::Numeric { .. }, v) => RawValue::Number(v.as_f64().ok_or_else(
                    || {
                        WellcastError::Schema(format!(
                            "column '{}' expected a number, got {v}",
                            col.name
                        ))
                    },
                )?),
                (ColumnType::Categorical, serde_json::Value::String(s)) => {
                    RawValue::Text(s.clone())
                }
                (ColumnType::Categorical, v) => {
                    return Err(WellcastError::Schema(format!(
                        "column '{}' expected a string, got {v}",
                        col.name
                    )))
                }
                (ColumnType::Boolean, serde_json::Value::Bool(b)) => RawValue::Bool(*b),
                (ColumnType::Boolean, v) => {
                    return Err(WellcastError::Schema(format!(
                        "column '{}' expected a boolean, got {v}",
                        col.name
                    )))
                }
            };
            record.insert(col.name.clone(), parsed);
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wellness_feature_count() {
        let schema = SchemaSpec::wellness();
        assert_eq!(schema.columns.len(), 13);
        assert_eq!(schema.derived.len(), 13);
        assert_eq!(schema.feature_count(), 26);
    }

    #[test]
    fn test_record_numeric_coercion() {
        let mut r = RawRecord::new();
        r.set_number("a", 2.5);
        r.insert("b", RawValue::Bool(true));
        r.insert("c", RawValue::Missing);

        assert_eq!(r.numeric("a").unwrap(), Some(2.5));
        assert_eq!(r.numeric("b").unwrap(), Some(1.0));
        assert_eq!(r.numeric("c").unwrap(), None);
        assert!(r.numeric("absent").is_err());
    }

    #[test]
    fn test_record_from_json_rejects_wrong_type() {
        let schema = SchemaSpec::wellness();
        let json = serde_json::json!({ "age": "forty" });
        assert!(RawRecord::from_json(&schema, &json).is_err());
    }
}
