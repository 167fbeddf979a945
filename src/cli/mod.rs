//! Model Select CLI Module
//!
//! Command-line surface: resolve a [`RunConfig`], run the selection and print
//! a summary of the candidates.

use clap::Parser;
use colored::*;
use std::path::PathBuf;
use std::time::Instant;

use crate::experiment::{run, RunConfig};
use crate::selection::SelectionOutcome;
use crate::training::ModelType;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(&format!("{:<14}", key)), val.white())
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug, Default)]
#[command(name = "model-select")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train candidate regressors, pick the lowest test MSE and log it to an experiment tracker")]
#[command(long_about = None)]
pub struct Cli {
    /// JSON config file; flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Dataset CSV path or http(s) URL
    #[arg(short, long)]
    pub data: Option<String>,

    /// Target column name
    #[arg(short, long)]
    pub target: Option<String>,

    /// Feature columns, comma separated
    #[arg(short, long, value_delimiter = ',')]
    pub features: Option<Vec<String>>,

    /// Fraction of rows held out for scoring
    #[arg(long)]
    pub test_size: Option<f64>,

    /// Seed for the split and the random forest
    #[arg(long)]
    pub seed: Option<u64>,

    /// Experiment name
    #[arg(short, long)]
    pub experiment: Option<String>,

    /// Tracking server URL, or a directory for local tracking
    #[arg(long)]
    pub tracking_uri: Option<String>,

    /// Candidate models in evaluation order (linear, random_forest, decision_tree, mean)
    #[arg(short, long, value_delimiter = ',')]
    pub models: Option<Vec<ModelType>>,

    /// Trees in the random forest
    #[arg(long)]
    pub n_estimators: Option<usize>,

    /// Also log every candidate's fitted model
    #[arg(long)]
    pub log_candidate_models: bool,
}

impl Cli {
    /// Defaults, then environment, then the config file, then flags
    pub fn resolve_config(&self) -> crate::error::Result<RunConfig> {
        let mut config = RunConfig::from_env();
        if let Some(path) = &self.config {
            config = config.overlay_file(path)?;
        }

        if let Some(data) = &self.data {
            config.data_source = data.clone();
        }
        if let Some(target) = &self.target {
            config.target_column = target.clone();
        }
        if let Some(features) = &self.features {
            config.feature_columns = features.clone();
        }
        if let Some(test_size) = self.test_size {
            config.test_size = test_size;
        }
        if let Some(seed) = self.seed {
            config.random_state = seed;
        }
        if let Some(experiment) = &self.experiment {
            config.experiment_name = experiment.clone();
        }
        if let Some(uri) = &self.tracking_uri {
            config.tracking_uri = uri.clone();
        }
        if let Some(models) = &self.models {
            config.models = models.clone();
        }
        if let Some(n) = self.n_estimators {
            config.n_estimators = n;
        }
        if self.log_candidate_models {
            config.log_candidate_models = true;
        }

        config.validate()?;
        Ok(config)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_run(cli: &Cli) -> anyhow::Result<()> {
    let config = cli.resolve_config()?;

    section("Model Selection");
    println!("  {}", kv("Data", &config.data_source));
    println!("  {}", kv("Target", &config.target_column));
    println!("  {}", kv("Features", &config.feature_columns.join(", ")));
    println!("  {}", kv("Experiment", &config.experiment_name));
    println!("  {}", kv("Tracking", &config.tracking_uri));

    let start = Instant::now();
    let outcome = run(&config)?;

    print_summary(&outcome);
    println!();
    println!("  {}", dim(&format!("finished in {:.2?}", start.elapsed())));

    Ok(())
}

/// Report table followed by the best-model line
pub fn print_summary(outcome: &SelectionOutcome) {
    section("Results");
    println!("  {:<24} {:>12} {:>10}", muted("Model"), muted("MSE"), muted("R²"));
    println!("  {}", dim(&"─".repeat(48)));

    let best = outcome.best_model_name();
    for report in &outcome.reports {
        let marker = if Some(report.model_name.as_str()) == best {
            accent("★")
        } else {
            " ".normal()
        };
        println!(
            "  {:<24} {:>12.4} {:>10.4} {}",
            report.model_name, report.mse, report.r2_score, marker
        );
    }
    println!("  {}", dim(&"─".repeat(48)));

    println!();
    match &outcome.best {
        Some(best) => {
            println!("  {} {}", ok("✓"), format!("Best model: {}", best.name).white().bold());
            println!("  {} Best model is logged.", ok("✓"));
        }
        None => println!("  {} {}", "!".yellow(), "No best model selected, nothing logged".yellow()),
    }
}
