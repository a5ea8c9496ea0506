//! Evaluation results and the book that collects them.

use super::citation::Citation;
use super::rubric::RubricCriterion;
use super::target::Target;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of the generated text of a failed evaluation.
pub const EVALUATION_FAILURE_PREFIX: &str = "Error: evaluation failed:";

/// Outcome of evaluating one criterion against one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Key of the evaluated criterion.
    pub criterion_key: String,
    /// Title of the evaluated criterion.
    pub criterion_title: String,
    /// What was evaluated.
    pub target: Target,
    /// Generated assessment, or an error marker.
    pub generated_text: String,
    /// Citations in retrieval rank order; empty on failure.
    pub citations: Vec<Citation>,
    /// Whether retrieval or generation failed.
    pub failed: bool,
    /// Model that produced the assessment.
    pub model: Option<String>,
    /// When the evaluation finished.
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationResult {
    /// Creates a successful result.
    #[must_use]
    pub fn completed(
        criterion: &RubricCriterion,
        target: Target,
        generated_text: impl Into<String>,
        citations: Vec<Citation>,
        model: Option<String>,
    ) -> Self {
        Self {
            criterion_key: criterion.key.clone(),
            criterion_title: criterion.title.clone(),
            target,
            generated_text: generated_text.into(),
            citations,
            failed: false,
            model,
            evaluated_at: Utc::now(),
        }
    }

    /// Creates an error-marked result with no citations.
    #[must_use]
    pub fn failure(
        criterion: &RubricCriterion,
        target: Target,
        detail: &str,
        model: Option<String>,
    ) -> Self {
        Self {
            criterion_key: criterion.key.clone(),
            criterion_title: criterion.title.clone(),
            target,
            generated_text: format!("{EVALUATION_FAILURE_PREFIX} {detail}"),
            citations: Vec::new(),
            failed: true,
            model,
            evaluated_at: Utc::now(),
        }
    }

    /// Returns true if this result is for the given key and target.
    #[must_use]
    pub fn is_for(&self, criterion_key: &str, target: &Target) -> bool {
        self.criterion_key == criterion_key && self.target == *target
    }
}

/// Ordered collection of evaluation results keyed by (criterion, target).
///
/// Recording a result for an existing key replaces it in place; results for
/// new keys are appended, so iteration order is creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationBook {
    results: Vec<EvaluationResult>,
}

impl EvaluationBook {
    /// Creates an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a book from results already in creation order.
    #[must_use]
    pub fn from_results(results: Vec<EvaluationResult>) -> Self {
        let mut book = Self::new();
        for result in results {
            book.record(result);
        }
        book
    }

    /// Records a result. Returns true if it replaced an earlier one.
    pub fn record(&mut self, result: EvaluationResult) -> bool {
        if let Some(existing) = self
            .results
            .iter_mut()
            .find(|r| r.is_for(&result.criterion_key, &result.target))
        {
            *existing = result;
            true
        } else {
            self.results.push(result);
            false
        }
    }

    /// Looks up the result for a key and target.
    #[must_use]
    pub fn get(&self, criterion_key: &str, target: &Target) -> Option<&EvaluationResult> {
        self.results.iter().find(|r| r.is_for(criterion_key, target))
    }

    /// Results for one target, in creation order.
    #[must_use]
    pub fn for_target(&self, target: &Target) -> Vec<&EvaluationResult> {
        self.results
            .iter()
            .filter(|r| r.target == *target)
            .collect()
    }

    /// All results in creation order.
    #[must_use]
    pub fn results(&self) -> &[EvaluationResult] {
        &self.results
    }

    /// Number of results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns true if the book is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
