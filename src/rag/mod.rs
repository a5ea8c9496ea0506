//! Retrieval-augmented generation cycle.
//!
//! One cycle is retrieval → composition → completion, with a bounded wait on
//! each external call. [`RagPipeline::ask`] wraps a cycle in a chat turn and
//! never fails: any error becomes an apology turn with no citations, so the
//! conversation keeps questions and answers paired.

use crate::completion::Completer;
use crate::conversation::Conversation;
use crate::core::{Citation, ConversationTurn, Passage, cite};
use crate::error::{Error, GenerationError, RetrievalError};
use crate::prompt::{Prompt, PromptSet};
use crate::retrieval::{Filter, RetrievalQuery, Retriever};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default completion model.
pub const DEFAULT_MODEL: &str = "claude-4-sonnet";

/// Default wait for one search call.
pub const DEFAULT_RETRIEVAL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default wait for one completion call.
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(120);

/// Pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RagSettings {
    /// Model used when a request names none.
    pub model: String,
    /// Bound on each search call.
    pub retrieval_timeout: Duration,
    /// Bound on each completion call.
    pub completion_timeout: Duration,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            retrieval_timeout: DEFAULT_RETRIEVAL_TIMEOUT,
            completion_timeout: DEFAULT_COMPLETION_TIMEOUT,
        }
    }
}

/// Inputs of one retrieval → composition → completion cycle.
#[derive(Debug, Clone, Copy)]
pub struct CycleRequest<'a> {
    /// System instruction.
    pub instruction: &'a str,
    /// History window, oldest first. Empty for evaluations.
    pub history: &'a [ConversationTurn],
    /// Search to run.
    pub search: &'a RetrievalQuery,
    /// Question placed in the prompt.
    pub question: &'a str,
    /// Completion model.
    pub model: &'a str,
}

/// Output of a successful cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Generated text.
    pub text: String,
    /// Citations in passage rank order.
    pub citations: Vec<Citation>,
}

/// A chat question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    /// The user's question.
    pub question: String,
    /// Collection to search.
    pub collection: String,
    /// Maximum passages to retrieve.
    pub limit: usize,
    /// Number of earlier turns included in the prompt.
    pub history_window: usize,
    /// Model override.
    pub model: Option<String>,
    /// Optional search filter.
    pub filter: Option<Filter>,
}

impl ChatRequest {
    /// Creates a request with no model override and no filter.
    #[must_use]
    pub fn new(
        question: impl Into<String>,
        collection: impl Into<String>,
        limit: usize,
        history_window: usize,
    ) -> Self {
        Self {
            question: question.into(),
            collection: collection.into(),
            limit,
            history_window,
            model: None,
            filter: None,
        }
    }
}

/// Shared retrieval and completion clients plus the prompt set.
#[derive(Clone)]
pub struct RagPipeline {
    retriever: Arc<dyn Retriever>,
    completer: Arc<dyn Completer>,
    prompts: PromptSet,
    settings: RagSettings,
}

impl RagPipeline {
    /// Creates a pipeline.
    #[must_use]
    pub fn new(
        retriever: Arc<dyn Retriever>,
        completer: Arc<dyn Completer>,
        prompts: PromptSet,
        settings: RagSettings,
    ) -> Self {
        Self {
            retriever,
            completer,
            prompts,
            settings,
        }
    }

    /// Prompt templates.
    #[must_use]
    pub const fn prompts(&self) -> &PromptSet {
        &self.prompts
    }

    /// Pipeline settings.
    #[must_use]
    pub const fn settings(&self) -> &RagSettings {
        &self.settings
    }

    /// Runs one bounded search.
    ///
    /// # Errors
    ///
    /// Returns the retriever's error, or [`RetrievalError::Timeout`].
    pub async fn retrieve(&self, query: &RetrievalQuery) -> Result<Vec<Passage>, RetrievalError> {
        debug!(collection = %query.collection, limit = query.limit, "Retrieving passages");
        let timeout = self.settings.retrieval_timeout;
        let passages = tokio::time::timeout(timeout, self.retriever.search(query))
            .await
            .map_err(|_| RetrievalError::Timeout {
                seconds: timeout.as_secs(),
            })??;
        debug!(count = passages.len(), "Passages received");
        Ok(passages)
    }

    /// Runs one bounded completion.
    ///
    /// # Errors
    ///
    /// Returns the completer's error, or [`GenerationError::Timeout`].
    pub async fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
        let timeout = self.settings.completion_timeout;
        tokio::time::timeout(timeout, self.completer.complete(model, prompt))
            .await
            .map_err(|_| GenerationError::Timeout {
                seconds: timeout.as_secs(),
            })?
    }

    /// Runs retrieval, composition and completion once.
    ///
    /// # Errors
    ///
    /// Returns the first retrieval, composition or generation error.
    pub async fn run_cycle(&self, request: CycleRequest<'_>) -> Result<CycleOutcome, Error> {
        let passages = self.retrieve(request.search).await?;
        let prompt = Prompt {
            instruction: request.instruction,
            history: request.history,
            passages: &passages,
            query: request.question,
        }
        .compose()?;
        let text = self.generate(request.model, &prompt).await?;
        Ok(CycleOutcome {
            text,
            citations: cite(&passages),
        })
    }

    /// Answers a chat question and appends the turn to `conversation`.
    ///
    /// Never fails: a retrieval, composition or generation error produces an
    /// error turn instead. Returns the appended turn.
    pub async fn ask(
        &self,
        conversation: &mut Conversation,
        request: &ChatRequest,
    ) -> ConversationTurn {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.settings.model.clone());
        let instruction = self.prompts.chat_instruction_for(&request.collection);

        let mut search = RetrievalQuery::new(&request.question, &request.collection, request.limit);
        if let Some(filter) = &request.filter {
            search = search.with_filter(filter.clone());
        }

        info!(session = %conversation.session(), model = %model, "Answering question");
        let outcome = self
            .run_cycle(CycleRequest {
                instruction: &instruction,
                history: conversation.window(request.history_window),
                search: &search,
                question: &request.question,
                model: &model,
            })
            .await;

        let turn = match outcome {
            Ok(outcome) => ConversationTurn::answered(
                request.question.clone(),
                outcome.text,
                outcome.citations,
                Some(model),
            ),
            Err(e) => {
                warn!(error = %e, "Chat turn failed");
                ConversationTurn::failure(request.question.clone(), &e.to_string(), Some(model))
            }
        };
        conversation.append(turn.clone());
        turn
    }
}
