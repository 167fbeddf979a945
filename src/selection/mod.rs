//! Model comparison and selection
//!
//! A [`ModelSelector`] fits each [`Candidate`] in order, scores it on its
//! held-out data, records one tracking run per candidate and keeps the
//! lowest-MSE candidate as the best model.

mod selector;

pub use selector::{
    Candidate, EvaluationReport, ModelSelector, SelectedModel, SelectionOutcome, SelectionState,
    BEST_MODEL_ARTIFACT, BEST_MODEL_TAG,
};
