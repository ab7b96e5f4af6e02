//! Training-table ingest
//!
//! Loads the delimited training table with polars, validates it against a
//! [`SchemaSpec`], and converts it into typed [`RawRecord`] rows plus the
//! target vector. Duplicate rows are dropped and per-column missing rates are
//! checked before any training begins.

use crate::error::{Result, WellcastError};
use crate::schema::{ColumnType, RawRecord, RawValue, SchemaSpec};
use ndarray::Array1;
use polars::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::path::Path;

/// Missing-rate ceiling above which imputation is considered unreliable.
const MAX_MISSING_RATE: f64 = 0.5;

/// Load a CSV/TSV file into a DataFrame.
pub fn load_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| WellcastError::Data(format!(
        "cannot open {}: {e}",
        path.display()
    )))?;

    let delimiter = match path.extension().and_then(|e| e.to_str()) {
        Some("tsv") => b'\t',
        _ => b',',
    };

    let parse_opts = CsvParseOptions::default().with_separator(delimiter);
    let reader = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .with_parse_options(parse_opts)
        .into_reader_with_file_handle(file);

    reader
        .finish()
        .map_err(|e| WellcastError::Data(e.to_string()))
}

/// Per-column ingest statistics, reported before training.
#[derive(Debug, Clone, Default)]
pub struct DataQualityReport {
    pub n_rows: usize,
    pub n_duplicates_removed: usize,
    /// Missing cell count per predictor column.
    pub missing_counts: BTreeMap<String, usize>,
    /// Values outside the declared numeric range (clipped later, not dropped).
    pub out_of_range_counts: BTreeMap<String, usize>,
}

/// A validated, typed dataset: one [`RawRecord`] per row plus the target.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub records: Vec<RawRecord>,
    pub targets: Array1<f64>,
    pub quality: DataQualityReport,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Validate a raw frame against the schema and extract typed rows.
    ///
    /// Fails with a schema error when a required column is absent or a cell
    /// cannot be coerced to its declared type, and with a data-quality error
    /// when a predictor column's missing rate exceeds the safety ceiling.
    pub fn from_frame(df: &DataFrame, schema: &SchemaSpec) -> Result<Self> {
        let present: HashSet<String> = df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();

        let mut missing_cols: Vec<&str> = schema
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .chain(std::iter::once(schema.target.name.as_str()))
            .filter(|name| !present.contains(*name))
            .collect();
        if !missing_cols.is_empty() {
            missing_cols.sort_unstable();
            return Err(WellcastError::Schema(format!(
                "training table is missing required column(s): {}",
                missing_cols.join(", ")
            )));
        }

        let n_rows = df.height();
        if n_rows == 0 {
            return Err(WellcastError::Data("training table has no rows".to_string()));
        }

        // Extract each predictor column as typed cells.
        let mut columns: BTreeMap<String, Vec<RawValue>> = BTreeMap::new();
        let mut quality = DataQualityReport::default();

        for col in &schema.columns {
            let series = df
                .column(&col.name)
                .map_err(|_| WellcastError::FeatureNotFound(col.name.clone()))?
                .as_materialized_series()
                .clone();

            let cells = match &col.dtype {
                ColumnType::Numeric { min, max } => {
                    // Polars casts unparseable strings to null rather than
                    // failing, so a text dtype must be rejected up front.
                    if matches!(series.dtype(), DataType::String) {
                        return Err(WellcastError::Schema(format!(
                            "column '{}' expected numeric values, found text",
                            col.name
                        )));
                    }
                    let casted = series.cast(&DataType::Float64).map_err(|_| {
                        WellcastError::Schema(format!(
                            "column '{}' cannot be read as numeric (dtype {})",
                            col.name,
                            series.dtype()
                        ))
                    })?;
                    let ca = casted
                        .f64()
                        .map_err(|e| WellcastError::Data(e.to_string()))?;
                    let mut out_of_range = 0usize;
                    let cells: Vec<RawValue> = ca
                        .into_iter()
                        .map(|v| match v {
                            Some(x) => {
                                if x < *min || x > *max {
                                    out_of_range += 1;
                                }
                                RawValue::Number(x)
                            }
                            None => RawValue::Missing,
                        })
                        .collect();
                    if out_of_range > 0 {
                        quality
                            .out_of_range_counts
                            .insert(col.name.clone(), out_of_range);
                    }
                    cells
                }
                ColumnType::Categorical => {
                    let casted = series.cast(&DataType::String).map_err(|_| {
                        WellcastError::Schema(format!(
                            "column '{}' cannot be read as text (dtype {})",
                            col.name,
                            series.dtype()
                        ))
                    })?;
                    let ca = casted
                        .str()
                        .map_err(|e| WellcastError::Data(e.to_string()))?;
                    ca.into_iter()
                        .map(|v| match v {
                            Some(s) if !s.trim().is_empty() => {
                                RawValue::Text(s.trim().to_string())
                            }
                            _ => RawValue::Missing,
                        })
                        .collect()
                }
                ColumnType::Boolean => {
                    let casted = series.cast(&DataType::Boolean).map_err(|_| {
                        WellcastError::Schema(format!(
                            "column '{}' cannot be read as boolean (dtype {})",
                            col.name,
                            series.dtype()
                        ))
                    })?;
                    let ca = casted
                        .bool()
                        .map_err(|e| WellcastError::Data(e.to_string()))?;
                    ca.into_iter()
                        .map(|v| match v {
                            Some(b) => RawValue::Bool(b),
                            None => RawValue::Missing,
                        })
                        .collect()
                }
            };

            let n_missing = cells
                .iter()
                .filter(|c| matches!(c, RawValue::Missing))
                .count();
            if n_missing > 0 {
                quality.missing_counts.insert(col.name.clone(), n_missing);
            }
            let missing_rate = n_missing as f64 / n_rows as f64;
            if missing_rate > MAX_MISSING_RATE {
                return Err(WellcastError::DataQuality {
                    column: col.name.clone(),
                    missing_pct: missing_rate * 100.0,
                    limit: MAX_MISSING_RATE * 100.0,
                });
            }

            columns.insert(col.name.clone(), cells);
        }

        // Target column: numeric and fully populated.
        let target_series = df
            .column(&schema.target.name)
            .map_err(|_| WellcastError::FeatureNotFound(schema.target.name.clone()))?
            .as_materialized_series()
            .cast(&DataType::Float64)
            .map_err(|_| {
                WellcastError::Schema(format!(
                    "target column '{}' cannot be read as numeric",
                    schema.target.name
                ))
            })?;
        let target_ca = target_series
            .f64()
            .map_err(|e| WellcastError::Data(e.to_string()))?;
        let mut targets: Vec<f64> = Vec::with_capacity(n_rows);
        for (row, v) in target_ca.into_iter().enumerate() {
            match v {
                Some(x) => targets.push(x),
                None => {
                    return Err(WellcastError::Schema(format!(
                        "target column '{}' has a missing value at row {row}",
                        schema.target.name
                    )))
                }
            }
        }

        // Assemble rows, dropping exact duplicates (first occurrence kept).
        let mut seen: HashSet<String> = HashSet::with_capacity(n_rows);
        let mut records: Vec<RawRecord> = Vec::with_capacity(n_rows);
        let mut kept_targets: Vec<f64> = Vec::with_capacity(n_rows);
        let mut n_duplicates = 0usize;

        for row in 0..n_rows {
            let mut key = String::new();
            let mut record = RawRecord::new();
            for col in &schema.columns {
                let cell = &columns[&col.name][row];
                match cell {
                    RawValue::Number(x) => key.push_str(&format!("{x:.12e}|")),
                    RawValue::Text(s) => {
                        key.push_str(s);
                        key.push('|');
                    }
                    RawValue::Bool(b) => key.push_str(if *b { "t|" } else { "f|" }),
                    RawValue::Missing => key.push_str("~|"),
                }
                record.insert(col.name.clone(), cell.clone());
            }
            key.push_str(&format!("{:.12e}", targets[row]));

            if seen.insert(key) {
                records.push(record);
                kept_targets.push(targets[row]);
            } else {
                n_duplicates += 1;
            }
        }

        quality.n_rows = records.len();
        quality.n_duplicates_removed = n_duplicates;

        Ok(Dataset {
            records,
            targets: Array1::from_vec(kept_targets),
            quality,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .unwrap();
        write!(file, "{content}").unwrap();
        file
    }

    fn tiny_schema() -> SchemaSpec {
        SchemaSpec {
            name: "tiny".into(),
            columns: vec![
                crate::schema::ColumnSpec::numeric("a", 0.0, 10.0),
                crate::schema::ColumnSpec::categorical("kind"),
            ],
            target: crate::schema::ColumnSpec::numeric("y", 0.0, 100.0),
            drop_columns: vec![],
            derived: vec![],
        }
    }

    #[test]
    fn test_from_frame_basic() {
        let file = write_csv("a,kind,y\n1.0,x,10\n2.0,y,20\n3.0,x,30\n");
        let df = load_csv(file.path()).unwrap();
        let ds = Dataset::from_frame(&df, &tiny_schema()).unwrap();

        assert_eq!(ds.len(), 3);
        assert_eq!(ds.targets[1], 20.0);
        assert_eq!(ds.records[0].numeric("a").unwrap(), Some(1.0));
        assert_eq!(ds.records[1].text("kind").unwrap(), Some("y"));
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let file = write_csv("a,y\n1.0,10\n");
        let df = load_csv(file.path()).unwrap();
        let err = Dataset::from_frame(&df, &tiny_schema()).unwrap_err();
        assert!(matches!(err, WellcastError::Schema(_)), "got {err:?}");
    }

    #[test]
    fn test_duplicate_rows_removed() {
        let file = write_csv("a,kind,y\n1.0,x,10\n1.0,x,10\n2.0,y,20\n");
        let df = load_csv(file.path()).unwrap();
        let ds = Dataset::from_frame(&df, &tiny_schema()).unwrap();

        assert_eq!(ds.len(), 2);
        assert_eq!(ds.quality.n_duplicates_removed, 1);
    }

    #[test]
    fn test_excess_missing_fails() {
        let file = write_csv("a,kind,y\n,x,10\n,y,20\n3.0,x,30\n");
        let df = load_csv(file.path()).unwrap();
        let err = Dataset::from_frame(&df, &tiny_schema()).unwrap_err();
        assert!(matches!(err, WellcastError::DataQuality { .. }), "got {err:?}");
    }

    #[test]
    fn test_missing_target_fails() {
        let file = write_csv("a,kind,y\n1.0,x,\n2.0,y,20\n");
        let df = load_csv(file.path()).unwrap();
        let err = Dataset::from_frame(&df, &tiny_schema()).unwrap_err();
        assert!(matches!(err, WellcastError::Schema(_)), "got {err:?}");
    }
}
