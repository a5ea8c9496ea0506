//! Integration tests for steward-rs.
//!
//! The search and completion services are replaced by in-process stubs so
//! the whole retrieval → composition → completion cycle runs offline.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use async_trait::async_trait;
use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use steward_rs::completion::Completer;
use steward_rs::conversation::Conversation;
use steward_rs::core::{
    AnalysisKind, Passage, Rubric, RubricCriterion, SourceMetadata, Target, cite,
};
use steward_rs::error::{GenerationError, RetrievalError};
use steward_rs::prompt::{NO_CONTEXT_MARKER, PromptSet};
use steward_rs::rag::{ChatRequest, RagPipeline, RagSettings};
use steward_rs::retrieval::{Filter, RetrievalQuery, Retriever, default_collections, rank_passages};
use steward_rs::storage::{SqliteStorage, Storage};
use steward_rs::{Analyzer, EvaluationBook, EvaluationDriver};
use tempfile::TempDir;

/// Returns a fixed passage list and records every query.
#[derive(Default)]
struct StubRetriever {
    passages: Vec<Passage>,
    fail_on: Option<String>,
    queries: Mutex<Vec<RetrievalQuery>>,
}

impl StubRetriever {
    fn with_passages(passages: Vec<Passage>) -> Self {
        Self {
            passages,
            ..Self::default()
        }
    }
}

#[async_trait]
impl Retriever for StubRetriever {
    async fn search(&self, query: &RetrievalQuery) -> Result<Vec<Passage>, RetrievalError> {
        query.validate()?;
        self.queries
            .lock()
            .expect("query log poisoned")
            .push(query.clone());
        if self
            .fail_on
            .as_deref()
            .is_some_and(|needle| query.query.contains(needle))
        {
            return Err(RetrievalError::Unreachable("connection refused".to_string()));
        }
        Ok(self.passages.iter().take(query.limit).cloned().collect())
    }
}

/// Returns a fixed answer and records every prompt.
struct StubCompleter {
    answer: String,
    prompts: Mutex<Vec<String>>,
}

impl StubCompleter {
    fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt log poisoned").clone()
    }
}

#[async_trait]
impl Completer for StubCompleter {
    async fn complete(&self, _model: &str, prompt: &str) -> Result<String, GenerationError> {
        self.prompts
            .lock()
            .expect("prompt log poisoned")
            .push(prompt.to_string());
        Ok(self.answer.clone())
    }
}

fn pipeline(retriever: Arc<StubRetriever>, completer: Arc<StubCompleter>) -> RagPipeline {
    RagPipeline::new(
        retriever,
        completer,
        PromptSet::defaults(),
        RagSettings::default(),
    )
}

fn report_a_passages() -> Vec<Passage> {
    vec![
        Passage::new(
            "The board includes independent directors who oversee stewardship.",
            SourceMetadata::titled("ReportA").with_page("3"),
            1,
        ),
        Passage::new(
            "Voting decisions are disclosed for every proposal.",
            SourceMetadata::titled("ReportA").with_page("7"),
            2,
        ),
    ]
}

#[tokio::test]
async fn test_example_end_to_end_evaluation() {
    let retriever = Arc::new(StubRetriever::with_passages(report_a_passages()));
    let completer = Arc::new(StubCompleter::answering("Answer referencing [1] and [2]"));
    let rag = pipeline(retriever, completer.clone());
    let rubric = Rubric::new(vec![RubricCriterion::new("P1", "Governance", "")]).unwrap();
    let collections = default_collections();
    let driver = EvaluationDriver::new(&rag, &rubric, &collections[0]);

    let results = driver
        .evaluate(&Target::Entity("FundA".to_string()), &[])
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.criterion_key, "P1");
    assert_eq!(result.target.identifier(), "FundA");
    assert_eq!(result.generated_text, "Answer referencing [1] and [2]");
    assert!(!result.failed);
    assert_eq!(result.citations.len(), 2);
    assert_eq!(result.citations[0].rank, 1);
    assert_eq!(result.citations[0].locator.as_deref(), Some("3"));
    assert_eq!(result.citations[1].rank, 2);
    assert_eq!(result.citations[1].locator.as_deref(), Some("7"));

    let prompt = &completer.prompts()[0];
    assert!(prompt.contains("--- Document 1 [File: ReportA, Page: 3] ---"));
    assert!(prompt.contains("--- Document 2 [File: ReportA, Page: 7] ---"));
}

#[tokio::test]
async fn test_failure_isolation_across_five_criteria() {
    let rubric = Rubric::stewardship_principles();
    let third = rubric.get("P3").unwrap().title.clone();
    let retriever = Arc::new(StubRetriever {
        passages: report_a_passages(),
        fail_on: Some(third),
        ..StubRetriever::default()
    });
    let completer = Arc::new(StubCompleter::answering("Assessment [1]"));
    let rag = pipeline(retriever.clone(), completer.clone());
    let collections = default_collections();
    let driver = EvaluationDriver::new(&rag, &rubric, &collections[0]).with_concurrency(2);

    let results = driver.evaluate_all(&Target::All).await;

    assert_eq!(results.len(), 5);
    let keys: Vec<&str> = results.iter().map(|r| r.criterion_key.as_str()).collect();
    assert_eq!(keys, ["P1", "P2", "P3", "P4", "P5"]);
    for result in &results {
        if result.criterion_key == "P3" {
            assert!(result.failed);
            assert!(result.citations.is_empty());
            assert!(result.generated_text.contains("connection refused"));
        } else {
            assert!(!result.failed);
            assert_eq!(result.generated_text, "Assessment [1]");
            assert_eq!(result.citations.len(), 2);
        }
    }
    assert_eq!(retriever.queries.lock().unwrap().len(), 5);
    assert_eq!(completer.prompts().len(), 4);
}

#[tokio::test]
async fn test_evaluations_never_see_each_other() {
    let retriever = Arc::new(StubRetriever::with_passages(report_a_passages()));
    let completer = Arc::new(StubCompleter::answering("UNIQUE-EARLIER-ANSWER"));
    let rag = pipeline(retriever, completer.clone());
    let rubric = Rubric::stewardship_principles();
    let collections = default_collections();
    let driver = EvaluationDriver::new(&rag, &rubric, &collections[0]);

    driver
        .evaluate_all(&Target::Document("AMOne_2024.pdf".to_string()))
        .await;

    for prompt in completer.prompts() {
        assert!(!prompt.contains("UNIQUE-EARLIER-ANSWER"));
    }
}

#[tokio::test]
async fn test_cross_entity_prompt_lists_every_entity() {
    let retriever = Arc::new(StubRetriever::with_passages(report_a_passages()));
    let completer = Arc::new(StubCompleter::answering("comparison"));
    let rag = pipeline(retriever, completer.clone());
    let rubric = Rubric::stewardship_principles();
    let collections = default_collections();
    let driver = EvaluationDriver::new(&rag, &rubric, &collections[0]);

    driver
        .evaluate(&Target::All, &["P1".to_string()])
        .await
        .unwrap();

    let prompt = &completer.prompts()[0];
    for code in ["AMOne", "SMTAM", "Resona", "MUTB"] {
        assert!(prompt.contains(code), "missing {code}");
    }
}

#[tokio::test]
async fn test_chat_without_context_uses_marker() {
    let retriever = Arc::new(StubRetriever::default());
    let completer = Arc::new(StubCompleter::answering("The documents do not say."));
    let rag = pipeline(retriever, completer.clone());
    let mut conversation = Conversation::new("default");

    let turn = rag
        .ask(
            &mut conversation,
            &ChatRequest::new("What is the net-zero target?", "stewardship", 5, 3),
        )
        .await;

    assert!(!turn.failed);
    assert!(turn.citations.is_empty());
    let prompt = &completer.prompts()[0];
    assert!(prompt.contains(NO_CONTEXT_MARKER));
    assert!(!prompt.contains("--- Document 1"));
}

#[tokio::test]
async fn test_chat_title_filter_reaches_retriever() {
    let retriever = Arc::new(StubRetriever::with_passages(report_a_passages()));
    let completer = Arc::new(StubCompleter::answering("ok"));
    let rag = pipeline(retriever.clone(), completer);
    let mut conversation = Conversation::new("default");
    let mut request = ChatRequest::new("Who votes?", "stewardship", 1, 3);
    request.filter = Some(Filter::eq("file_name", "ReportA"));

    let turn = rag.ask(&mut conversation, &request).await;

    assert_eq!(turn.citations.len(), 1);
    let queries = retriever.queries.lock().unwrap();
    assert_eq!(queries[0].filter, Some(Filter::eq("file_name", "ReportA")));
    assert_eq!(queries[0].limit, 1);
}

#[tokio::test]
async fn test_turns_and_results_survive_storage() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp.path().join("steward.db");
    let retriever = Arc::new(StubRetriever::with_passages(report_a_passages()));
    let completer = Arc::new(StubCompleter::answering("Answer [1]"));
    let rag = pipeline(retriever, completer);

    {
        let mut storage = SqliteStorage::open(&db_path).expect("Failed to create storage");
        storage.init().expect("Failed to init storage");
        let mut conversation = storage.load_conversation("s1").unwrap();
        for question in ["first?", "second?"] {
            let turn = rag
                .ask(
                    &mut conversation,
                    &ChatRequest::new(question, "stewardship", 5, 3),
                )
                .await;
            storage.append_turn("s1", &turn).unwrap();
        }
    }

    let storage = SqliteStorage::open(&db_path).expect("Failed to reopen storage");
    let conversation = storage.load_conversation("s1").unwrap();
    assert_eq!(conversation.len(), 2);
    assert_eq!(conversation.window(1)[0].question, "second?");
    assert_eq!(conversation.turns()[0].citations, cite(&report_a_passages()));
}

#[tokio::test]
async fn test_idempotent_overwrite_in_book_and_storage() {
    let retriever = Arc::new(StubRetriever::with_passages(report_a_passages()));
    let rubric = Rubric::stewardship_principles();
    let collections = default_collections();
    let fund = Target::Entity("AMOne".to_string());
    let keys = ["P1".to_string(), "P2".to_string()];
    let mut storage = SqliteStorage::in_memory().unwrap();
    storage.init().unwrap();
    let mut book = EvaluationBook::new();

    for answer in ["first run", "second run"] {
        let rag = pipeline(retriever.clone(), Arc::new(StubCompleter::answering(answer)));
        let driver = EvaluationDriver::new(&rag, &rubric, &collections[0]);
        for result in driver.evaluate_into(&mut book, &fund, &keys).await.unwrap() {
            storage.save_evaluation(&result).unwrap();
        }
    }
    let rag = pipeline(retriever, Arc::new(StubCompleter::answering("other target")));
    let driver = EvaluationDriver::new(&rag, &rubric, &collections[0]);
    for result in driver.evaluate_into(&mut book, &Target::All, &keys[..1]).await.unwrap() {
        storage.save_evaluation(&result).unwrap();
    }

    assert_eq!(book.len(), 3);
    assert_eq!(book.get("P1", &fund).unwrap().generated_text, "second run");

    let stored = storage.load_evaluations(Some(&fund)).unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].criterion_key, "P1");
    assert!(stored.iter().all(|r| r.generated_text == "second run"));
    assert_eq!(storage.load_evaluations(None).unwrap().len(), 3);
}

#[tokio::test]
async fn test_summaries_feed_trend_and_gap() {
    let retriever = Arc::new(StubRetriever::with_passages(report_a_passages()));
    let completer = Arc::new(StubCompleter::answering("analysis text"));
    let rag = pipeline(retriever.clone(), completer.clone());
    let collections = default_collections();
    let analyzer = Analyzer::new(&rag, &collections[1]);
    let mut storage = SqliteStorage::in_memory().unwrap();
    storage.init().unwrap();

    let reports = vec!["calpers.pdf".to_string(), "gpif.pdf".to_string()];
    for summary in analyzer.summarize_all(&reports).await {
        storage.save_analysis(&summary).unwrap();
    }
    {
        let queries = retriever.queries.lock().unwrap();
        assert_eq!(queries[0].filter, Some(Filter::eq("file_name", "calpers.pdf")));
    }

    let summaries = storage.load_analyses(Some(AnalysisKind::Summary)).unwrap();
    assert_eq!(summaries.len(), 2);

    let trend = analyzer.trend(&summaries).await.unwrap();
    let gap = analyzer.gap("gpif.pdf", &summaries).await.unwrap();
    storage.save_analysis(&trend).unwrap();
    storage.save_analysis(&gap).unwrap();

    assert_eq!(storage.load_analyses(None).unwrap().len(), 4);
    let prompts = completer.prompts();
    assert!(prompts[2].contains("[calpers.pdf]\nanalysis text"));
    assert!(prompts[2].contains("[gpif.pdf]\nanalysis text"));
}

proptest! {
    #[test]
    fn prop_citations_follow_passage_ranks(count in 0usize..25, limit in 1usize..25) {
        let records = (0..count).map(|i| {
            (format!("passage {i}"), SourceMetadata::titled(format!("doc{i}.pdf")))
        });
        let passages = rank_passages(records, limit);
        let citations = cite(&passages);

        prop_assert_eq!(citations.len(), count.min(limit));
        for (i, (citation, passage)) in citations.iter().zip(&passages).enumerate() {
            prop_assert_eq!(citation.rank, i + 1);
            prop_assert_eq!(&citation.title, &passage.source.title);
        }
    }
}
