//! End-to-end selection runs against the local experiment tracker

use std::fs;
use std::io::Write;
use std::path::Path;

use model_select::experiment::{run, run_with_sink, RunConfig};
use model_select::error::SelectError;
use model_select::tracking::{
    ExperimentTracker, RunStatus, TrackingSink, INPUT_EXAMPLE_FILE, MLMODEL_FILE, MODEL_DATA_FILE,
};
use model_select::training::{LinearRegression, Model, ModelType};
use serde_json::Value;

/// A housing-like table where medv is roughly linear in rm
fn write_housing_csv(dir: &Path) -> String {
    let path = dir.join("housing.csv");
    let mut file = fs::File::create(&path).unwrap();
    writeln!(file, "crim,rm,medv").unwrap();
    for i in 0..60 {
        let rm = 4.5 + i as f64 * 0.07;
        let noise = ((i * 7) % 5) as f64 - 2.0;
        let medv = 9.1 * rm - 34.7 + noise;
        writeln!(file, "{:.4},{:.3},{:.2}", 0.01 * i as f64, rm, medv).unwrap();
    }
    path.to_string_lossy().into_owned()
}

fn config(data: String) -> RunConfig {
    RunConfig {
        data_source: data,
        n_estimators: 20,
        ..Default::default()
    }
}

#[test]
fn test_default_candidates_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = ExperimentTracker::with_dir(dir.path().join("mlruns"));
    let config = config(write_housing_csv(dir.path()));

    let outcome = run_with_sink(&config, &tracker).unwrap();

    // Reports follow candidate order
    let names: Vec<&str> = outcome.reports.iter().map(|r| r.model_name.as_str()).collect();
    assert_eq!(names, vec!["Linear Regression", "Random Forest"]);
    for report in &outcome.reports {
        assert!(report.mse >= 0.0);
        assert!(report.r2_score <= 1.0);
    }

    // Best is the argmin with first-occurrence tie-break
    let min_idx = if outcome.reports[1].mse < outcome.reports[0].mse { 1 } else { 0 };
    let best = outcome.best.as_ref().unwrap();
    assert_eq!(best.name, outcome.reports[min_idx].model_name);
    assert_eq!(best.mse, outcome.reports[min_idx].mse);

    // One run per candidate plus the best-model run, all finished
    let experiment = tracker.get_experiment_by_name("LR_RF1").unwrap();
    assert_eq!(experiment.runs.len(), 3);
    assert!(experiment.runs.iter().all(|r| r.status == RunStatus::Finished));

    let lr_run = experiment.run_by_name("Linear Regression").unwrap();
    assert_eq!(lr_run.params.get("model").map(String::as_str), Some("Linear Regression"));
    assert_eq!(lr_run.metrics.get("mse"), Some(&outcome.reports[0].mse));
    assert_eq!(lr_run.metrics.get("r2_score"), Some(&outcome.reports[0].r2_score));
    assert!(lr_run.artifacts.is_empty());

    let best_run = experiment.run_by_name("best_model").unwrap();
    assert_eq!(best_run.tags.get("best_model"), Some(&best.name));
    assert_eq!(best_run.artifacts, vec!["best_model".to_string()]);

    let candidate_best = experiment.best_run("mse", false).unwrap();
    assert_eq!(candidate_best.run_name, best.name);

    // Artifact directory holds the fitted model and a one-row example
    let artifact_dir = dir
        .path()
        .join("mlruns")
        .join(&experiment.experiment_id)
        .join(&best_run.run_id)
        .join("artifacts")
        .join("best_model");
    assert!(artifact_dir.join(MLMODEL_FILE).exists());
    assert!(artifact_dir.join(MODEL_DATA_FILE).exists());

    let example: Value =
        serde_json::from_slice(&fs::read(artifact_dir.join(INPUT_EXAMPLE_FILE)).unwrap()).unwrap();
    assert_eq!(example["columns"], serde_json::json!(["rm"]));
    assert_eq!(example["data"].as_array().unwrap().len(), 1);

    let mlmodel: Value =
        serde_json::from_slice(&fs::read(artifact_dir.join(MLMODEL_FILE)).unwrap()).unwrap();
    assert_eq!(mlmodel["run_id"], best_run.run_id.as_str());
    assert_eq!(mlmodel["artifact_path"], "best_model");
}

#[test]
fn test_logged_model_reloads_and_predicts() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = ExperimentTracker::with_dir(dir.path().join("mlruns"));
    let config = RunConfig {
        models: vec![ModelType::LinearRegression],
        ..config(write_housing_csv(dir.path()))
    };

    let outcome = run_with_sink(&config, &tracker).unwrap();
    let best = outcome.best.unwrap();

    let experiment = tracker.get_experiment_by_name("LR_RF1").unwrap();
    let best_run = experiment.run_by_name("best_model").unwrap();
    let bytes = fs::read(
        dir.path()
            .join("mlruns")
            .join(&experiment.experiment_id)
            .join(&best_run.run_id)
            .join("artifacts/best_model")
            .join(MODEL_DATA_FILE),
    )
    .unwrap();

    let restored = LinearRegression::from_bytes(&bytes).unwrap();
    let x = best.input_example.values();
    let expected = best.estimator.predict(x).unwrap();
    assert_eq!(Model::predict(&restored, x).unwrap(), expected);
}

#[test]
fn test_candidate_models_logged_when_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = ExperimentTracker::with_dir(dir.path().join("mlruns"));
    let config = RunConfig {
        log_candidate_models: true,
        models: vec![ModelType::Mean, ModelType::LinearRegression],
        ..config(write_housing_csv(dir.path()))
    };

    run_with_sink(&config, &tracker).unwrap();

    let experiment = tracker.get_experiment_by_name("LR_RF1").unwrap();
    let mean_run = experiment.run_by_name("Mean Baseline").unwrap();
    assert_eq!(mean_run.artifacts, vec!["Mean Baseline_model".to_string()]);

    let mlmodel_path = dir
        .path()
        .join("mlruns")
        .join(&experiment.experiment_id)
        .join(&mean_run.run_id)
        .join("artifacts")
        .join("Mean Baseline_model")
        .join(MLMODEL_FILE);
    let mlmodel: Value = serde_json::from_slice(&fs::read(mlmodel_path).unwrap()).unwrap();
    assert!(mlmodel["signature"]["inputs"].as_str().unwrap().contains("\"rm\""));
    assert!(mlmodel["signature"]["outputs"].as_str().unwrap().contains("\"medv\""));
}

#[test]
fn test_missing_column_fails_before_any_run() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = ExperimentTracker::with_dir(dir.path().join("mlruns"));
    let config = RunConfig {
        target_column: "price".to_string(),
        ..config(write_housing_csv(dir.path()))
    };

    let err = run_with_sink(&config, &tracker).unwrap_err();
    assert!(matches!(err, SelectError::FeatureNotFound(_)));
    assert!(tracker.list_experiments().is_empty());
}

#[test]
fn test_run_with_file_tracking_uri() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store");
    let config = RunConfig {
        tracking_uri: format!("file://{}", store.display()),
        models: vec![ModelType::Mean, ModelType::DecisionTree],
        experiment_name: "local".to_string(),
        ..config(write_housing_csv(dir.path()))
    };

    let outcome = run(&config).unwrap();
    assert_eq!(outcome.reports.len(), 2);
    assert!(outcome.best.is_some());

    // A second tracker sees the persisted runs
    let reopened = ExperimentTracker::with_dir(&store);
    reopened.load().unwrap();
    let experiment = reopened.get_experiment_by_name("local").unwrap();
    assert_eq!(experiment.runs.len(), 3);

    // Reusing the experiment name appends to it
    assert_eq!(reopened.set_experiment("local").unwrap(), experiment.experiment_id);
}

#[test]
fn test_invalid_config_rejected() {
    let config = RunConfig {
        models: Vec::new(),
        ..Default::default()
    };
    assert!(run(&config).is_err());
}
