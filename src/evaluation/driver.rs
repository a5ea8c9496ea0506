//! Rubric evaluation driver.
//!
//! Runs one retrieval → composition → completion cycle per criterion, with
//! an empty history so no criterion sees another's answer. A failing
//! criterion yields an error-marked result and the run continues. Results
//! always come back in rubric order, whatever the concurrency.

use crate::core::{
    EvaluationBook, EvaluationResult, KnownEntity, Rubric, RubricCriterion, Target,
    default_entities,
};
use crate::error::ConfigError;
use crate::rag::{CycleRequest, RagPipeline};
use crate::retrieval::{CollectionConfig, Filter, RetrievalQuery};
use futures_util::stream::{self, StreamExt};
use tracing::{info, warn};

/// Default passages retrieved per criterion.
pub const DEFAULT_MAX_RESULTS: usize = 12;

/// Evaluates rubric criteria against a target.
pub struct EvaluationDriver<'a> {
    pipeline: &'a RagPipeline,
    rubric: &'a Rubric,
    collection: &'a CollectionConfig,
    entities: Vec<KnownEntity>,
    max_results: usize,
    concurrency: usize,
    model: Option<String>,
}

impl<'a> EvaluationDriver<'a> {
    /// Creates a strictly sequential driver over the default entities.
    #[must_use]
    pub fn new(
        pipeline: &'a RagPipeline,
        rubric: &'a Rubric,
        collection: &'a CollectionConfig,
    ) -> Self {
        Self {
            pipeline,
            rubric,
            collection,
            entities: default_entities(),
            max_results: DEFAULT_MAX_RESULTS,
            concurrency: 1,
            model: None,
        }
    }

    /// Sets the known entities used by entity labels and cross-entity mode.
    #[must_use]
    pub fn with_entities(mut self, entities: Vec<KnownEntity>) -> Self {
        self.entities = entities;
        self
    }

    /// Sets the passages retrieved per criterion.
    #[must_use]
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    /// Sets how many criteria may be in flight at once.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Sets the completion model.
    #[must_use]
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// The question sent for a criterion and target.
    #[must_use]
    pub fn question_for(&self, criterion: &RubricCriterion, target: &Target) -> String {
        self.pipeline
            .prompts()
            .criterion_question_for(criterion, target, &self.entities)
    }

    /// The search issued for a criterion and target.
    ///
    /// Documents are restricted by title. Entities are restricted by the
    /// collection's entity column when it has one; otherwise the entity
    /// label leads the search text.
    #[must_use]
    pub fn search_for(&self, criterion: &RubricCriterion, target: &Target) -> RetrievalQuery {
        let topic = format!("{} {}", criterion.title, criterion.description);
        let (text, filter) = match target {
            Target::Document(name) => (
                topic,
                Some(Filter::eq(&self.collection.title_column, name)),
            ),
            Target::Entity(code) => match &self.collection.entity_column {
                Some(column) => (topic, Some(Filter::eq(column, code))),
                None => (format!("{} {topic}", target.label(&self.entities)), None),
            },
            Target::All => {
                let codes = self
                    .entities
                    .iter()
                    .map(|e| e.code.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                (format!("{codes} {topic}"), None)
            }
        };

        let query = RetrievalQuery::new(text, &self.collection.name, self.max_results);
        match filter {
            Some(filter) => query.with_filter(filter),
            None => query,
        }
    }

    /// Evaluates one criterion. Never fails.
    pub async fn evaluate_criterion(
        &self,
        criterion: &RubricCriterion,
        target: &Target,
    ) -> EvaluationResult {
        let model = self
            .model
            .clone()
            .unwrap_or_else(|| self.pipeline.settings().model.clone());
        let question = self.question_for(criterion, target);
        let search = self.search_for(criterion, target);

        info!(criterion = %criterion.key, target = %target, "Evaluating criterion");
        let outcome = self
            .pipeline
            .run_cycle(CycleRequest {
                instruction: &self.pipeline.prompts().evaluation_instruction,
                history: &[],
                search: &search,
                question: &question,
                model: &model,
            })
            .await;

        match outcome {
            Ok(outcome) => EvaluationResult::completed(
                criterion,
                target.clone(),
                outcome.text,
                outcome.citations,
                Some(model),
            ),
            Err(e) => {
                warn!(
                    criterion = %criterion.key,
                    target = %target,
                    error = %e,
                    "Criterion evaluation failed"
                );
                EvaluationResult::failure(criterion, target.clone(), &e.to_string(), Some(model))
            }
        }
    }

    /// Evaluates the selected criteria (all when `keys` is empty) in rubric order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownCriterion`] if a key is not in the
    /// rubric. Retrieval and generation failures never surface here.
    pub async fn evaluate(
        &self,
        target: &Target,
        keys: &[String],
    ) -> Result<Vec<EvaluationResult>, ConfigError> {
        let criteria = self.rubric.select(keys)?;
        Ok(stream::iter(criteria)
            .map(|criterion| self.evaluate_criterion(criterion, target))
            .buffered(self.concurrency)
            .collect()
            .await)
    }

    /// Evaluates every criterion in rubric order.
    pub async fn evaluate_all(&self, target: &Target) -> Vec<EvaluationResult> {
        stream::iter(self.rubric.iter())
            .map(|criterion| self.evaluate_criterion(criterion, target))
            .buffered(self.concurrency)
            .collect()
            .await
    }

    /// Evaluates the selected criteria and records each result in `book`.
    ///
    /// # Errors
    ///
    /// See [`EvaluationDriver::evaluate`].
    pub async fn evaluate_into(
        &self,
        book: &mut EvaluationBook,
        target: &Target,
        keys: &[String],
    ) -> Result<Vec<EvaluationResult>, ConfigError> {
        let results = self.evaluate(target, keys).await?;
        for result in &results {
            book.record(result.clone());
        }
        Ok(results)
    }
}
