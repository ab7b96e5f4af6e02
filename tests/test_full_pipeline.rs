//! End-to-end pipeline tests over a synthetic wellness table

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::io::Write;
use wellcast::prelude::*;

const GENDERS: [&str; 3] = ["female", "male", "other"];
const OCCUPATIONS: [&str; 4] = ["engineer", "teacher", "designer", "analyst"];
const WORK_MODES: [&str; 3] = ["remote", "hybrid", "onsite"];

/// Write a synthetic wellness CSV with a learnable target.
fn write_wellness_csv(n_rows: usize, seed: u64) -> tempfile::NamedTempFile {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();

    writeln!(
        file,
        "user_id,age,gender,occupation,work_mode,screen_time_hours,work_screen_hours,\
         leisure_screen_hours,sleep_hours,sleep_quality_1_5,stress_level_0_10,\
         productivity_0_100,exercise_minutes_per_week,social_hours_per_week,\
         mental_wellness_index_0_100"
    )
    .unwrap();

    for i in 0..n_rows {
        let age = rng.gen_range(18..65);
        let screen: f64 = rng.gen_range(2.0..14.0);
        let work_screen = screen * rng.gen_range(0.3..0.8);
        let leisure = screen - work_screen;
        let sleep: f64 = rng.gen_range(4.0..10.0);
        let quality = rng.gen_range(1..=5);
        let stress = rng.gen_range(0..=10);
        let productivity = rng.gen_range(20..100);
        let exercise = rng.gen_range(0..400);
        let social: f64 = rng.gen_range(0.0..20.0);

        let noise: f64 = rng.gen_range(-2.0..2.0);
        let wellness = (30.0 + 2.5 * sleep + 4.0 * quality as f64 - 2.2 * stress as f64
            - 1.5 * screen
            + 0.05 * exercise as f64
            + 0.4 * social
            + noise)
            .clamp(0.0, 100.0);

        // A few missing cells exercise imputation on the way through.
        let sleep_cell = if i % 37 == 5 {
            String::new()
        } else {
            format!("{sleep:.2}")
        };

        writeln!(
            file,
            "u{i},{age},{},{},{},{screen:.2},{work_screen:.2},{leisure:.2},{sleep_cell},\
             {quality},{stress},{productivity},{exercise},{social:.2},{wellness:.2}",
            GENDERS[i % GENDERS.len()],
            OCCUPATIONS[i % OCCUPATIONS.len()],
            WORK_MODES[i % WORK_MODES.len()],
        )
        .unwrap();
    }

    file
}

fn fast_config(output_dir: std::path::PathBuf, seed: u64) -> PipelineConfig {
    PipelineConfig {
        seed,
        tune_iterations: 2,
        tune_folds: 3,
        cv_folds: 3,
        n_workers: Some(2),
        output_dir,
        ..Default::default()
    }
}

#[test]
fn test_pipeline_trains_and_persists_artifact() {
    let csv = write_wellness_csv(100, 7);
    let df = load_csv(csv.path()).unwrap();
    let out = tempfile::tempdir().unwrap();
    let artifact_dir = out.path().join("wellness");

    let pipeline = TrainPipeline::new(SchemaSpec::wellness(), fast_config(artifact_dir.clone(), 42));
    let outcome = pipeline.run(&df).unwrap();

    // 13 raw predictors plus 13 derived features.
    assert_eq!(outcome.metadata.feature_count, 26);
    assert_eq!(outcome.metadata.feature_names.len(), 26);

    // Exact 80/20 partition of the deduplicated rows.
    assert_eq!(outcome.metadata.dataset_size, 100);
    assert_eq!(outcome.metadata.train_size, 80);
    assert_eq!(outcome.metadata.test_size, 20);

    // Bundle files committed, no staging leftovers.
    assert!(artifact_dir.join("model.json").exists());
    assert!(artifact_dir.join("training_report.txt").exists());
    assert!(artifact_dir.join("evaluation_report.txt").exists());
    assert!(!out.path().join("wellness.staging").exists());

    let training_report = std::fs::read_to_string(artifact_dir.join("training_report.txt")).unwrap();
    assert!(training_report.contains("ALL MODELS COMPARISON"));
    assert!(training_report.contains(&outcome.model_name));

    // The reloaded bundle serves predictions for raw records.
    let bundle = ArtifactBundle::load(&artifact_dir).unwrap();
    let record = RawRecord::from_json(
        bundle.transform.schema(),
        &serde_json::json!({
            "age": 30,
            "gender": "female",
            "occupation": "engineer",
            "work_mode": "remote",
            "screen_time_hours": 9.5,
            "work_screen_hours": 7.0,
            "leisure_screen_hours": 2.5,
            "sleep_hours": 7.0,
            "sleep_quality_1_5": 4,
            "stress_level_0_10": 5,
            "productivity_0_100": 70,
            "exercise_minutes_per_week": 150,
            "social_hours_per_week": 8.0
        }),
    )
    .unwrap();

    let score = bundle.predict(&record).unwrap();
    assert!(score.is_finite());
    assert!((-50.0..150.0).contains(&score), "score {score}");

    // Repeated predictions on the same record are identical.
    assert_eq!(score, bundle.predict(&record).unwrap());
}

#[test]
fn test_same_seed_selects_same_winner() {
    let csv = write_wellness_csv(90, 11);
    let df = load_csv(csv.path()).unwrap();

    let out_a = tempfile::tempdir().unwrap();
    let out_b = tempfile::tempdir().unwrap();

    let a = TrainPipeline::new(
        SchemaSpec::wellness(),
        fast_config(out_a.path().join("wellness"), 42),
    )
    .run(&df)
    .unwrap();
    let b = TrainPipeline::new(
        SchemaSpec::wellness(),
        fast_config(out_b.path().join("wellness"), 42),
    )
    .run(&df)
    .unwrap();

    assert_eq!(a.model_name, b.model_name);
    assert_eq!(a.metadata.test_metrics.r2, b.metadata.test_metrics.r2);
    assert_eq!(a.metadata.test_metrics.mae, b.metadata.test_metrics.mae);
}

#[test]
fn test_missing_required_column_fails_before_training() {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(file, "age,gender,mental_wellness_index_0_100").unwrap();
    writeln!(file, "30,female,70").unwrap();

    let df = load_csv(file.path()).unwrap();
    let out = tempfile::tempdir().unwrap();
    let err = TrainPipeline::new(
        SchemaSpec::wellness(),
        fast_config(out.path().join("wellness"), 42),
    )
    .run(&df)
    .unwrap_err();

    assert!(matches!(err, WellcastError::Schema(_)), "got {err:?}");
    assert!(!out.path().join("wellness").exists());
}
