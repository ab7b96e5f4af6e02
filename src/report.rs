//! Plain-text training and evaluation reports

use crate::data::DataQualityReport;
use crate::evaluate::EvaluationReport;
use crate::selection::RankedCandidate;
use crate::training::{CvReport, RegressionMetrics, TrainingFailure};
use chrono::Local;

const BAR: &str =
    "================================================================================";

/// One comparison row of the baseline stage.
#[derive(Debug, Clone)]
pub struct ModelReportRow {
    pub name: String,
    pub train: RegressionMetrics,
    pub test: RegressionMetrics,
    pub training_time_secs: f64,
}

fn metrics_row(name: &str, train: &RegressionMetrics, test: &RegressionMetrics) -> String {
    format!(
        "{name:<24} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>9.4}",
        train.r2, test.r2, train.mae, test.mae, train.rmse, test.rmse
    )
}

/// Render the training report: data quality, the model comparison table,
/// the final ranking, the winner, and its cross-validation summary.
#[allow(clippy::too_many_arguments)]
pub fn render_training_report(
    instance: &str,
    quality: &DataQualityReport,
    comparison: &[ModelReportRow],
    failures: &[TrainingFailure],
    ranking: &[RankedCandidate],
    best_name: &str,
    best: &EvaluationReport,
    cv: &CvReport,
    feature_names: &[String],
    train_size: usize,
    test_size: usize,
) -> String {
    let mut out = String::new();
    let push_line = |out: &mut String, line: &str| {
        out.push_str(line);
        out.push('\n');
    };

    push_line(&mut out, BAR);
    push_line(
        &mut out,
        &format!("{} PREDICTION MODEL - TRAINING REPORT", instance.to_uppercase()),
    );
    push_line(&mut out, BAR);
    push_line(
        &mut out,
        &format!("Generated: {}", Local::now().format("%Y-%m-%d %H:%M:%S")),
    );
    out.push('\n');

    push_line(&mut out, BAR);
    push_line(&mut out, "DATASET");
    push_line(&mut out, BAR);
    push_line(&mut out, &format!("Rows: {}", quality.n_rows));
    push_line(
        &mut out,
        &format!("Duplicates removed: {}", quality.n_duplicates_removed),
    );
    push_line(
        &mut out,
        &format!("Train samples: {train_size} | Test samples: {test_size}"),
    );
    for (column, count) in &quality.missing_counts {
        push_line(&mut out, &format!("Missing values in {column}: {count}"));
    }
    out.push('\n');

    push_line(&mut out, BAR);
    push_line(&mut out, "ALL MODELS COMPARISON");
    push_line(&mut out, BAR);
    push_line(
        &mut out,
        &format!(
            "{:<24} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9}",
            "model", "train_r2", "test_r2", "train_mae", "test_mae", "train_rmse", "test_rmse"
        ),
    );
    for row in comparison {
        push_line(&mut out, &metrics_row(&row.name, &row.train, &row.test));
    }
    for failure in failures {
        push_line(
            &mut out,
            &format!("{:<24} FAILED: {}", failure.model_name, failure.reason),
        );
    }
    out.push('\n');

    push_line(&mut out, BAR);
    push_line(&mut out, "FINAL RANKING (test R2, ties by test MAE)");
    push_line(&mut out, BAR);
    for (i, entry) in ranking.iter().enumerate() {
        push_line(
            &mut out,
            &format!(
                "{:>2}. {:<24} R2 {:>8.4}  MAE {:>8.4}",
                i + 1,
                entry.name,
                entry.test_r2,
                entry.test_mae
            ),
        );
    }
    out.push('\n');

    push_line(&mut out, BAR);
    push_line(&mut out, "BEST MODEL PERFORMANCE");
    push_line(&mut out, BAR);
    push_line(&mut out, &format!("Model: {best_name}"));
    push_line(&mut out, &format!("Test R2:   {:.6}", best.test.r2));
    push_line(&mut out, &format!("Test MAE:  {:.6}", best.test.mae));
    push_line(&mut out, &format!("Test RMSE: {:.6}", best.test.rmse));
    push_line(&mut out, &format!("Test MAPE: {:.6}%", best.test.mape));
    out.push('\n');

    push_line(&mut out, BAR);
    push_line(
        &mut out,
        &format!("CROSS-VALIDATION RESULTS ({}-fold)", cv.n_folds),
    );
    push_line(&mut out, BAR);
    push_line(
        &mut out,
        &format!("R2:   {:.4} (+/- {:.4})", cv.r2.mean, cv.r2.std),
    );
    push_line(
        &mut out,
        &format!("MAE:  {:.4} (+/- {:.4})", cv.mae.mean, cv.mae.std),
    );
    push_line(
        &mut out,
        &format!("RMSE: {:.4} (+/- {:.4})", cv.rmse.mean, cv.rmse.std),
    );
    out.push('\n');

    push_line(&mut out, BAR);
    push_line(&mut out, &format!("TOTAL FEATURES: {}", feature_names.len()));
    push_line(&mut out, BAR);
    push_line(&mut out, &feature_names.join(", "));

    out
}

/// Render the evaluation report: split metrics, residual statistics, error
/// bands, importances, and the quality assessment.
pub fn render_evaluation_report(report: &EvaluationReport) -> String {
    let mut out = String::new();
    let push_line = |out: &mut String, line: &str| {
        out.push_str(line);
        out.push('\n');
    };

    push_line(&mut out, BAR);
    push_line(&mut out, "MODEL EVALUATION REPORT");
    push_line(&mut out, BAR);
    push_line(
        &mut out,
        &format!("Generated: {}", Local::now().format("%Y-%m-%d %H:%M:%S")),
    );
    push_line(&mut out, &format!("Model: {}", report.model_name));
    out.push('\n');

    push_line(&mut out, BAR);
    push_line(&mut out, "PERFORMANCE METRICS");
    push_line(&mut out, BAR);
    push_line(&mut out, "Training Set:");
    push_line(&mut out, &format!("  R2 Score: {:.6}", report.train.r2));
    push_line(&mut out, &format!("  MAE:  {:.6}", report.train.mae));
    push_line(&mut out, &format!("  RMSE: {:.6}", report.train.rmse));
    push_line(&mut out, &format!("  MAPE: {:.6}%", report.train.mape));
    out.push('\n');
    push_line(&mut out, "Test Set:");
    push_line(&mut out, &format!("  R2 Score: {:.6}", report.test.r2));
    push_line(&mut out, &format!("  MAE:  {:.6}", report.test.mae));
    push_line(&mut out, &format!("  RMSE: {:.6}", report.test.rmse));
    push_line(&mut out, &format!("  MAPE: {:.6}%", report.test.mape));
    out.push('\n');

    push_line(&mut out, BAR);
    push_line(&mut out, "OVERFITTING ANALYSIS");
    push_line(&mut out, BAR);
    push_line(
        &mut out,
        &format!("R2 gap (train - test): {:.4}", report.r2_gap),
    );
    push_line(
        &mut out,
        &format!("Generalization: {}", report.generalization_verdict()),
    );
    out.push('\n');

    push_line(&mut out, BAR);
    push_line(&mut out, "RESIDUAL STATISTICS");
    push_line(&mut out, BAR);
    let r = &report.residuals;
    push_line(&mut out, &format!("  Mean:   {:.6}", r.mean));
    push_line(&mut out, &format!("  Std:    {:.6}", r.std));
    push_line(&mut out, &format!("  Min:    {:.6}", r.min));
    push_line(&mut out, &format!("  Max:    {:.6}", r.max));
    push_line(&mut out, &format!("  Median: {:.6}", r.median));
    push_line(&mut out, &format!("  Q25:    {:.6}", r.q25));
    push_line(&mut out, &format!("  Q75:    {:.6}", r.q75));
    out.push('\n');

    push_line(&mut out, BAR);
    push_line(&mut out, "ERROR DISTRIBUTION BY TARGET RANGE");
    push_line(&mut out, BAR);
    for band in &report.error_bands {
        push_line(
            &mut out,
            &format!(
                "  {:>9}: n={:<4} mean |err| {:>8.4}  max |err| {:>8.4}",
                band.label, band.count, band.mean_abs_error, band.max_abs_error
            ),
        );
    }
    out.push('\n');

    if !report.importance_ranking.is_empty() {
        push_line(&mut out, BAR);
        push_line(&mut out, "TOP FEATURE IMPORTANCES");
        push_line(&mut out, BAR);
        for (i, entry) in report.importance_ranking.iter().take(15).enumerate() {
            push_line(
                &mut out,
                &format!("  {:>2}. {:<32} {:.4}", i + 1, entry.feature, entry.importance),
            );
        }
        out.push('\n');
    }

    push_line(&mut out, BAR);
    push_line(&mut out, "MODEL QUALITY ASSESSMENT");
    push_line(&mut out, BAR);
    push_line(&mut out, &format!("  Overall Grade: {}", report.grade()));
    push_line(
        &mut out,
        &format!(
            "  The model explains {:.2}% of variance in the test data.",
            report.test.r2 * 100.0
        ),
    );
    push_line(&mut out, BAR);

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::{ErrorBand, ResidualStats};

    fn metrics(r2: f64, mae: f64) -> RegressionMetrics {
        RegressionMetrics {
            r2,
            mae,
            rmse: mae * 1.2,
            mape: 5.0,
        }
    }

    fn sample_report() -> EvaluationReport {
        EvaluationReport {
            model_name: "Stacking Ensemble".to_string(),
            train: metrics(0.95, 2.0),
            test: metrics(0.91, 2.5),
            r2_gap: 0.04,
            overfit: false,
            residuals: ResidualStats {
                mean: 0.1,
                std: 2.0,
                min: -5.0,
                max: 6.0,
                median: 0.0,
                q25: -1.0,
                q75: 1.2,
            },
            error_bands: vec![ErrorBand {
                label: "0-20".to_string(),
                lo: 0.0,
                hi: 20.0,
                count: 4,
                mean_abs_error: 2.0,
                max_abs_error: 4.0,
            }],
            importance_ranking: vec![],
        }
    }

    #[test]
    fn test_evaluation_report_renders_key_sections() {
        let text = render_evaluation_report(&sample_report());
        assert!(text.contains("MODEL EVALUATION REPORT"));
        assert!(text.contains("Stacking Ensemble"));
        assert!(text.contains("OVERFITTING ANALYSIS"));
        assert!(text.contains("EXCELLENT (A+)"));
        assert!(text.contains("0-20"));
    }
}
