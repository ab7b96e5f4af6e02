//! Artifact persistence
//!
//! The selected model, its fitted transform, the feature-name order, and the
//! run metadata serialize into one bundle directory. Writes are staged in a
//! sibling directory and committed with a single rename, so a failed run
//! never leaves a partial bundle visible and the previous bundle stays
//! authoritative. The bundle header carries a format version and a checksum
//! of the feature-name list; loading a mismatched artifact fails fast as a
//! schema error instead of silently mispredicting.

use crate::error::{Result, WellcastError};
use crate::preprocessing::FittedTransform;
use crate::schema::RawRecord;
use crate::training::{CvReport, RegressionMetrics, TrainedRegressor};
use chrono::Local;
use ndarray::Axis;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Bumped whenever the serialized layout changes incompatibly.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

const MODEL_FILE: &str = "model.json";
const TRAINING_REPORT_FILE: &str = "training_report.txt";
const EVALUATION_REPORT_FILE: &str = "evaluation_report.txt";

/// Checksum of the ordered feature-name list.
pub fn feature_checksum(feature_names: &[String]) -> String {
    let mut hasher = Sha256::new();
    for name in feature_names {
        hasher.update(name.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

/// Versioned header written at the top of every bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub format_version: u32,
    pub algorithm: String,
    pub feature_checksum: String,
    pub created_at: String,
}

/// Metadata describing one trained artifact. Written once per successful
/// run, never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_name: String,
    pub training_date: String,
    pub train_metrics: RegressionMetrics,
    pub test_metrics: RegressionMetrics,
    pub cv: CvReport,
    pub feature_count: usize,
    pub feature_names: Vec<String>,
    pub dataset_size: usize,
    pub train_size: usize,
    pub test_size: usize,
}

/// The durable output of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactBundle {
    pub header: ArtifactHeader,
    pub model: TrainedRegressor,
    pub transform: FittedTransform,
    pub feature_names: Vec<String>,
    pub metadata: ModelMetadata,
}

impl ArtifactBundle {
    pub fn new(
        model: TrainedRegressor,
        transform: FittedTransform,
        metadata: ModelMetadata,
    ) -> Self {
        let feature_names = transform.feature_names().to_vec();
        Self {
            header: ArtifactHeader {
                format_version: ARTIFACT_FORMAT_VERSION,
                algorithm: metadata.model_name.clone(),
                feature_checksum: feature_checksum(&feature_names),
                created_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            },
            model,
            transform,
            feature_names,
            metadata,
        }
    }

    /// The prediction boundary: transform one raw record and run the model.
    pub fn predict(&self, record: &RawRecord) -> Result<f64> {
        let features = self.transform.transform_one(record)?;
        let matrix = features.insert_axis(Axis(0));
        let predictions = self.model.predict(&matrix)?;
        Ok(predictions[0])
    }

    /// Load and verify a bundle from its directory.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join(MODEL_FILE);
        let json = fs::read_to_string(&path).map_err(|e| WellcastError::artifact(&path, e))?;
        let bundle: ArtifactBundle = serde_json::from_str(&json)?;
        bundle.verify()?;
        Ok(bundle)
    }

    /// Fail fast on version or feature-schema mismatches.
    fn verify(&self) -> Result<()> {
        if self.header.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(WellcastError::Schema(format!(
                "artifact format version {} is not supported (expected {})",
                self.header.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }

        let checksum = feature_checksum(&self.feature_names);
        if checksum != self.header.feature_checksum {
            return Err(WellcastError::Schema(format!(
                "artifact feature checksum mismatch: header {}, computed {checksum}",
                self.header.feature_checksum
            )));
        }

        if self.transform.feature_names() != self.feature_names.as_slice() {
            return Err(WellcastError::Schema(
                "artifact feature-name order disagrees with its fitted transform".to_string(),
            ));
        }
        Ok(())
    }
}

/// Atomic bundle writer.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Stage the bundle and reports next to the final directory, then commit
    /// with a rename. On any failure the previous bundle (if one exists) is
    /// left in place.
    pub fn write(
        &self,
        bundle: &ArtifactBundle,
        training_report: &str,
        evaluation_report: &str,
    ) -> Result<PathBuf> {
        let staging = self.sibling("staging");
        let backup = self.sibling("previous");

        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| WellcastError::artifact(&staging, e))?;
        }
        fs::create_dir_all(&staging).map_err(|e| WellcastError::artifact(&staging, e))?;

        let model_path = staging.join(MODEL_FILE);
        let json = serde_json::to_string_pretty(bundle)?;
        fs::write(&model_path, json).map_err(|e| WellcastError::artifact(&model_path, e))?;

        let report_path = staging.join(TRAINING_REPORT_FILE);
        fs::write(&report_path, training_report)
            .map_err(|e| WellcastError::artifact(&report_path, e))?;

        let report_path = staging.join(EVALUATION_REPORT_FILE);
        fs::write(&report_path, evaluation_report)
            .map_err(|e| WellcastError::artifact(&report_path, e))?;

        // Commit: move the old bundle aside, rename the staging directory
        // into place, then drop the old bundle.
        if backup.exists() {
            fs::remove_dir_all(&backup).map_err(|e| WellcastError::artifact(&backup, e))?;
        }
        let had_previous = self.dir.exists();
        if had_previous {
            fs::rename(&self.dir, &backup).map_err(|e| WellcastError::artifact(&self.dir, e))?;
        }

        if let Err(e) = fs::rename(&staging, &self.dir) {
            // Restore the previous bundle before surfacing the failure.
            if had_previous {
                if let Err(restore) = fs::rename(&backup, &self.dir) {
                    warn!(error = %restore, "could not restore previous artifact");
                }
            }
            return Err(WellcastError::artifact(&self.dir, e));
        }

        if had_previous {
            if let Err(e) = fs::remove_dir_all(&backup) {
                warn!(path = %backup.display(), error = %e, "stale backup left behind");
            }
        }

        info!(path = %self.dir.display(), "artifact committed");
        Ok(self.dir.clone())
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let name = self
            .dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "artifact".to_string());
        self.dir.with_file_name(format!("{name}.{suffix}"))
    }
}
