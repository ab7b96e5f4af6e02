//! End-to-end training pipeline
//!
//! Orchestrates the nine stages in order: schema validation and ingest,
//! feature engineering, splitting, baseline training, hyperparameter search,
//! ensemble construction, model selection, cross-validated robustness
//! reporting, evaluation, and the atomic artifact write. Each stage consumes
//! only the previous stage's output.

use crate::artifact::{ArtifactBundle, ArtifactWriter, ModelMetadata};
use crate::data::Dataset;
use crate::ensemble::EnsembleBuilder;
use crate::error::Result;
use crate::evaluate::{EvaluationReport, Evaluator};
use crate::preprocessing::FeatureEngineer;
use crate::report::{self, ModelReportRow};
use crate::schema::SchemaSpec;
use crate::selection::{Candidate, ModelSelector};
use crate::split::Splitter;
use crate::training::{
    BaselineTrainer, CrossValidator, CvReport, ModelSpec, RegressionMetrics,
};
use crate::tuning::{RandomizedSearchTuner, TunerConfig};
use chrono::Local;
use ndarray::{Array1, Array2, Axis};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Tunable knobs of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Master seed threaded through every stochastic stage.
    pub seed: u64,
    /// Train fraction of the split.
    pub train_ratio: f64,
    /// Families (by baseline test R²) promoted to hyperparameter search.
    pub tune_top_n: usize,
    /// Randomized-search draws per tuned family.
    pub tune_iterations: usize,
    /// Cross-validation folds inside the search.
    pub tune_folds: usize,
    /// Folds of the final robustness cross-validation.
    pub cv_folds: usize,
    /// Worker-pool size; `None` uses all available cores.
    pub n_workers: Option<usize>,
    /// Destination directory of the artifact bundle.
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            train_ratio: 0.8,
            tune_top_n: 3,
            tune_iterations: 20,
            tune_folds: 5,
            cv_folds: 10,
            n_workers: None,
            output_dir: PathBuf::from("models/wellness"),
        }
    }
}

/// What a finished run hands back to the caller.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub artifact_dir: PathBuf,
    pub model_name: String,
    pub metadata: ModelMetadata,
    pub evaluation: EvaluationReport,
    pub cv: CvReport,
}

/// One schema-parameterized training pipeline.
pub struct TrainPipeline {
    schema: SchemaSpec,
    config: PipelineConfig,
}

impl TrainPipeline {
    pub fn new(schema: SchemaSpec, config: PipelineConfig) -> Self {
        Self { schema, config }
    }

    /// Run the full pipeline over a loaded training table.
    pub fn run(&self, df: &DataFrame) -> Result<PipelineOutcome> {
        let config = &self.config;
        let pool = self.build_pool()?;

        // Stage 1: ingest + validation.
        let dataset = Dataset::from_frame(df, &self.schema)?;
        info!(
            rows = dataset.len(),
            duplicates_removed = dataset.quality.n_duplicates_removed,
            "dataset validated"
        );

        // Stage 2: feature engineering.
        let engineer = FeatureEngineer::new(self.schema.clone());
        let (transform, matrix) = engineer.fit(&dataset.records)?;
        info!(features = transform.feature_names().len(), "features engineered");

        // Stage 3: deterministic stratified split.
        let split = Splitter::new(config.train_ratio, config.seed).split(&dataset.targets)?;
        let x_train = matrix.select(Axis(0), &split.train);
        let y_train: Array1<f64> =
            Array1::from_vec(split.train.iter().map(|&i| dataset.targets[i]).collect());
        let x_test = matrix.select(Axis(0), &split.test);
        let y_test: Array1<f64> =
            Array1::from_vec(split.test.iter().map(|&i| dataset.targets[i]).collect());
        info!(train = split.train.len(), test = split.test.len(), "split created");

        // Stage 4: baselines.
        let baseline = BaselineTrainer::new(config.seed).train_all(&x_train, &y_train)?;
        let mut comparison = Vec::with_capacity(baseline.models.len());
        let mut baseline_scored: Vec<(usize, f64)> = Vec::with_capacity(baseline.models.len());
        for (idx, trained) in baseline.models.iter().enumerate() {
            let train_metrics =
                RegressionMetrics::compute(&y_train, &trained.model.predict(&x_train)?);
            let test_metrics =
                RegressionMetrics::compute(&y_test, &trained.model.predict(&x_test)?);
            info!(
                model = trained.family.name(),
                test_r2 = test_metrics.r2,
                test_mae = test_metrics.mae,
                "baseline evaluated"
            );
            comparison.push(ModelReportRow {
                name: trained.family.name().to_string(),
                train: train_metrics,
                test: test_metrics,
                training_time_secs: trained.training_time_secs,
            });
            baseline_scored.push((idx, test_metrics.r2));
        }

        // Stage 5: hyperparameter search for the top families.
        let ensemble_builder = EnsembleBuilder::new(config.tune_folds, config.seed);
        ensemble_builder.check_member_count(baseline.models.len())?;

        baseline_scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        let top_n = config.tune_top_n.min(baseline_scored.len());

        let tuner = RandomizedSearchTuner::new(TunerConfig {
            iterations: config.tune_iterations,
            folds: config.tune_folds,
            seed: config.seed,
        });
        let mut tuned = Vec::with_capacity(top_n);
        for &(idx, _) in baseline_scored.iter().take(top_n) {
            let family = baseline.models[idx].family;
            tuned.push(tuner.tune(family, &x_train, &y_train, &pool)?);
        }

        // Stage 6: ensembles over the tuned base models.
        ensemble_builder.check_member_count(tuned.len())?;
        let voting = ensemble_builder.build_voting(
            tuned
                .iter()
                .map(|t| (t.family.name().to_string(), t.model.clone()))
                .collect(),
        )?;
        let stacking = ensemble_builder.build_stacking(
            tuned.iter().map(|t| t.spec.clone()).collect(),
            &x_train,
            &y_train,
        )?;
        info!(members = tuned.len(), "ensembles built");

        // Stage 7: selection across baselines, tuned models, and ensembles.
        let mut candidates: Vec<Candidate> = Vec::new();
        for trained in &baseline.models {
            candidates.push(Candidate {
                name: trained.family.name().to_string(),
                spec: trained.spec.clone(),
                model: trained.model.clone(),
            });
        }
        for t in &tuned {
            candidates.push(Candidate {
                name: format!("Tuned {}", t.family.name()),
                spec: t.spec.clone(),
                model: t.model.clone(),
            });
        }
        let voting_spec = ModelSpec::voting(tuned.iter().map(|t| t.spec.clone()).collect());
        let stacking_spec = ModelSpec::stacking(tuned.iter().map(|t| t.spec.clone()).collect());
        candidates.push(Candidate {
            name: "Voting Ensemble".to_string(),
            spec: voting_spec,
            model: crate::training::TrainedRegressor::Voting(Box::new(voting)),
        });
        candidates.push(Candidate {
            name: "Stacking Ensemble".to_string(),
            spec: stacking_spec,
            model: crate::training::TrainedRegressor::Stacking(Box::new(stacking)),
        });

        let selection = ModelSelector::new().select(candidates, &x_test, &y_test)?;

        // Stage 8: k-fold robustness statistics over the full dataset,
        // re-fitting the selected configuration. Reporting only.
        let cv = CrossValidator::new(config.cv_folds, config.seed).kfold_score(
            &selection.spec,
            &matrix,
            &dataset.targets,
            &pool,
        )?;
        info!(
            cv_r2_mean = cv.r2.mean,
            cv_r2_std = cv.r2.std,
            "cross-validation complete"
        );

        // Stage 9: diagnostics.
        let evaluator = Evaluator::new(self.schema.target_range());
        let evaluation = evaluator.evaluate(
            &selection.name,
            &selection.model,
            &x_train,
            &y_train,
            &x_test,
            &y_test,
            transform.feature_names(),
        )?;

        // Stage 10: metadata, reports, atomic artifact write.
        let metadata = ModelMetadata {
            model_name: selection.name.clone(),
            training_date: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            train_metrics: evaluation.train,
            test_metrics: evaluation.test,
            cv: cv.clone(),
            feature_count: transform.feature_names().len(),
            feature_names: transform.feature_names().to_vec(),
            dataset_size: dataset.len(),
            train_size: split.train.len(),
            test_size: split.test.len(),
        };

        let training_report = report::render_training_report(
            &self.schema.name,
            &dataset.quality,
            &comparison,
            &baseline.failures,
            &selection.ranking,
            &selection.name,
            &evaluation,
            &cv,
            transform.feature_names(),
            split.train.len(),
            split.test.len(),
        );
        let evaluation_report = report::render_evaluation_report(&evaluation);

        let bundle = ArtifactBundle::new(selection.model, transform, metadata.clone());
        let artifact_dir = ArtifactWriter::new(&config.output_dir).write(
            &bundle,
            &training_report,
            &evaluation_report,
        )?;

        Ok(PipelineOutcome {
            artifact_dir,
            model_name: selection.name,
            metadata,
            evaluation,
            cv,
        })
    }

    fn build_pool(&self) -> Result<rayon::ThreadPool> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(n) = self.config.n_workers {
            builder = builder.num_threads(n.max(1));
        }
        builder
            .build()
            .map_err(|e| crate::error::WellcastError::Validation(format!(
                "cannot build worker pool: {e}"
            )))
    }
}

/// Re-evaluate a persisted bundle against a dataset (no split; the full
/// table is scored).
pub fn evaluate_bundle(
    bundle: &ArtifactBundle,
    df: &DataFrame,
) -> Result<(RegressionMetrics, usize)> {
    let schema = bundle.transform.schema().clone();
    let dataset = Dataset::from_frame(df, &schema)?;
    let matrix: Array2<f64> = bundle.transform.transform(&dataset.records)?;
    let predictions = bundle.model.predict(&matrix)?;
    Ok((
        RegressionMetrics::compute(&dataset.targets, &predictions),
        dataset.len(),
    ))
}
