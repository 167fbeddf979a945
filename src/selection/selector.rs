//! Single-pass selector over a fixed candidate list

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::data::{Dataset, FeatureTable};
use crate::error::Result;
use crate::tracking::{ActiveRun, ModelArtifact, ModelSignature, TrackingSink};
use crate::training::{mean_squared_error, r2_score, Model};

/// Artifact path (and run name) of the winning model
pub const BEST_MODEL_ARTIFACT: &str = "best_model";
/// Tag naming the winning candidate on the best-model run
pub const BEST_MODEL_TAG: &str = "best_model";

/// Rows of training data attached to per-candidate model artifacts
const CANDIDATE_EXAMPLE_ROWS: usize = 5;

/// A model to compare, with the data it is trained and scored on
pub struct Candidate {
    pub name: String,
    pub estimator: Box<dyn Model>,
    pub train: Dataset,
    pub test: Dataset,
}

impl Candidate {
    pub fn new(name: impl Into<String>, estimator: Box<dyn Model>, train: Dataset, test: Dataset) -> Self {
        Self {
            name: name.into(),
            estimator,
            train,
            test,
        }
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("name", &self.name)
            .field("model_type", &self.estimator.model_type())
            .field("n_train", &self.train.len())
            .field("n_test", &self.test.len())
            .finish()
    }
}

/// Test-set scores of one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub model_name: String,
    pub mse: f64,
    pub r2_score: f64,
}

/// Running minimum over the reports seen so far
#[derive(Debug, Clone)]
pub struct SelectionState {
    best_model_name: Option<String>,
    best_mse: f64,
    best_index: Option<usize>,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self {
            best_model_name: None,
            best_mse: f64::INFINITY,
            best_index: None,
        }
    }
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consider the report at `index`; returns true if it became the best.
    ///
    /// Only a strictly smaller mse replaces the current best, so ties keep
    /// the earlier candidate and NaN never wins.
    pub fn observe(&mut self, index: usize, report: &EvaluationReport) -> bool {
        if report.mse < self.best_mse {
            self.best_mse = report.mse;
            self.best_model_name = Some(report.model_name.clone());
            self.best_index = Some(index);
            true
        } else {
            false
        }
    }

    pub fn best_model_name(&self) -> Option<&str> {
        self.best_model_name.as_deref()
    }

    pub fn best_mse(&self) -> f64 {
        self.best_mse
    }

    pub fn best_index(&self) -> Option<usize> {
        self.best_index
    }
}

/// The winning candidate with its fitted estimator
pub struct SelectedModel {
    pub name: String,
    pub mse: f64,
    pub r2_score: f64,
    pub estimator: Box<dyn Model>,
    /// First training row, with column names
    pub input_example: FeatureTable,
}

impl fmt::Debug for SelectedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedModel")
            .field("name", &self.name)
            .field("mse", &self.mse)
            .field("r2_score", &self.r2_score)
            .field("model_type", &self.estimator.model_type())
            .finish()
    }
}

/// Result of a selection pass
#[derive(Debug)]
pub struct SelectionOutcome {
    /// One report per candidate, in candidate order
    pub reports: Vec<EvaluationReport>,
    /// None when there were no candidates or no finite mse
    pub best: Option<SelectedModel>,
}

impl SelectionOutcome {
    pub fn best_model_name(&self) -> Option<&str> {
        self.best.as_ref().map(|b| b.name.as_str())
    }
}

/// Trains, scores and ranks candidates, logging each to a tracking sink
#[derive(Debug, Clone, Default)]
pub struct ModelSelector {
    log_candidate_models: bool,
}

impl ModelSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also log every candidate's fitted model as `<name>_model`
    pub fn with_candidate_models(mut self, enabled: bool) -> Self {
        self.log_candidate_models = enabled;
        self
    }

    /// Run one pass over `candidates`.
    ///
    /// Any fit, predict or tracking error aborts the pass; candidates after
    /// the failing one are not touched and no best model is logged.
    pub fn select(&self, candidates: Vec<Candidate>, sink: &dyn TrackingSink) -> Result<SelectionOutcome> {
        let mut state = SelectionState::new();
        let mut reports = Vec::with_capacity(candidates.len());
        let mut evaluated = Vec::with_capacity(candidates.len());

        for (index, mut candidate) in candidates.into_iter().enumerate() {
            let report = self.evaluate(&mut candidate, sink).inspect_err(|e| {
                error!(model = %candidate.name, error = %e, "Candidate failed");
            })?;

            if state.observe(index, &report) {
                debug!(model = %report.model_name, mse = report.mse, "New best candidate");
            }
            reports.push(report);
            evaluated.push(candidate);
        }

        let Some(best_index) = state.best_index() else {
            if !reports.is_empty() {
                warn!("No candidate produced a finite mse, nothing to log as best model");
            }
            return Ok(SelectionOutcome { reports, best: None });
        };

        let winner = evaluated.swap_remove(best_index);
        let r2 = reports[best_index].r2_score;
        info!(
            model = %winner.name,
            mse = state.best_mse(),
            r2_score = r2,
            "Selected best model"
        );

        let best = self.log_best(winner, state.best_mse(), r2, sink)?;
        Ok(SelectionOutcome {
            reports,
            best: Some(best),
        })
    }

    fn evaluate(&self, candidate: &mut Candidate, sink: &dyn TrackingSink) -> Result<EvaluationReport> {
        let run = ActiveRun::start(sink, &candidate.name)?;
        run.log_param("model", &candidate.name)?;

        let start = Instant::now();
        candidate
            .estimator
            .fit(candidate.train.features.values(), &candidate.train.target)?;
        let fit_ms = start.elapsed().as_millis() as u64;

        let y_pred = candidate.estimator.predict(candidate.test.features.values())?;
        let mse = mean_squared_error(&candidate.test.target, &y_pred)?;
        let r2 = r2_score(&candidate.test.target, &y_pred)?;
        info!(model = %candidate.name, mse, r2_score = r2, fit_ms, "Evaluated candidate");

        run.log_metric("mse", mse)?;
        run.log_metric("r2_score", r2)?;

        if self.log_candidate_models {
            let signature = ModelSignature::infer(&candidate.train);
            let artifact = ModelArtifact::from_model(
                candidate.estimator.as_ref(),
                format!("{}_model", candidate.name),
            )?
            .with_signature(signature)
            .with_input_example(candidate.train.features.head(CANDIDATE_EXAMPLE_ROWS));
            run.log_model(&artifact)?;
        }

        run.finish()?;

        Ok(EvaluationReport {
            model_name: candidate.name.clone(),
            mse,
            r2_score: r2,
        })
    }

    fn log_best(&self, winner: Candidate, mse: f64, r2: f64, sink: &dyn TrackingSink) -> Result<SelectedModel> {
        let input_example = winner.train.features.first_row()?;
        let artifact = ModelArtifact::from_model(winner.estimator.as_ref(), BEST_MODEL_ARTIFACT)?
            .with_input_example(input_example.clone());

        let run = ActiveRun::start(sink, BEST_MODEL_ARTIFACT)?;
        run.set_tag(BEST_MODEL_TAG, &winner.name)?;
        run.log_param("model", &winner.name)?;
        run.log_model(&artifact)?;
        run.finish()?;

        Ok(SelectedModel {
            name: winner.name,
            mse,
            r2_score: r2,
            estimator: winner.estimator,
            input_example,
        })
    }
}
