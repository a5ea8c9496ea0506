//! Report summaries, trend analysis and gap analysis.
//!
//! A summary is generated from the passages of a single report, concatenated
//! in rank order and capped in length. Trend and gap analyses work on stored
//! summaries only and issue no search.

use crate::core::{AnalysisKind, AnalysisReport, Passage};
use crate::core::analysis::TREND_SUBJECT;
use crate::error::{CommandError, Error, RetrievalError};
use crate::io::ellipsize;
use crate::rag::RagPipeline;
use crate::retrieval::{CollectionConfig, Filter, RetrievalQuery};
use tracing::{info, warn};

/// Default cap on report text sent for summarization, in characters.
pub const DEFAULT_MAX_REPORT_CHARS: usize = 10_000;

/// Default passages fetched per report.
pub const DEFAULT_REPORT_PASSAGES: usize = 100;

/// Generates analyses of whole reports.
pub struct Analyzer<'a> {
    pipeline: &'a RagPipeline,
    collection: &'a CollectionConfig,
    max_report_chars: usize,
    report_passages: usize,
    model: Option<String>,
}

impl<'a> Analyzer<'a> {
    /// Creates an analyzer over `collection` with default limits.
    #[must_use]
    pub const fn new(pipeline: &'a RagPipeline, collection: &'a CollectionConfig) -> Self {
        Self {
            pipeline,
            collection,
            max_report_chars: DEFAULT_MAX_REPORT_CHARS,
            report_passages: DEFAULT_REPORT_PASSAGES,
            model: None,
        }
    }

    /// Sets the report text cap.
    #[must_use]
    pub const fn with_max_report_chars(mut self, max: usize) -> Self {
        self.max_report_chars = max;
        self
    }

    /// Sets the passages fetched per report.
    #[must_use]
    pub const fn with_report_passages(mut self, count: usize) -> Self {
        self.report_passages = count;
        self
    }

    /// Sets the completion model.
    #[must_use]
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    fn model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.pipeline.settings().model.clone())
    }

    /// Fetches a report's passages and joins them into capped text.
    ///
    /// Returns an empty string when the report has no passages.
    ///
    /// # Errors
    ///
    /// Returns the retrieval error.
    pub async fn report_text(&self, report: &str) -> Result<String, RetrievalError> {
        let query = RetrievalQuery::new(report, &self.collection.name, self.report_passages)
            .with_filter(Filter::eq(&self.collection.title_column, report));
        let passages = self.pipeline.retrieve(&query).await?;
        Ok(join_passages(&passages, self.max_report_chars))
    }

    /// Summarizes one report.
    ///
    /// Returns `None` when the report has no passages. Retrieval and
    /// generation failures produce an error-marked summary.
    pub async fn summarize(&self, report: &str) -> Option<AnalysisReport> {
        info!(report, "Summarizing report");
        let text = match self.report_text(report).await {
            Ok(text) => text,
            Err(e) => {
                warn!(report, error = %e, "Report retrieval failed");
                return Some(AnalysisReport::failure(
                    AnalysisKind::Summary,
                    report,
                    &e.to_string(),
                ));
            }
        };
        if text.is_empty() {
            warn!(report, "Report has no passages, skipping");
            return None;
        }

        let prompt = self.pipeline.prompts().summary_for(report, &text);
        Some(self.complete(AnalysisKind::Summary, report, &prompt).await)
    }

    /// Summarizes reports one after another, skipping empty ones.
    pub async fn summarize_all(&self, reports: &[String]) -> Vec<AnalysisReport> {
        let mut summaries = Vec::with_capacity(reports.len());
        for report in reports {
            if let Some(summary) = self.summarize(report).await {
                summaries.push(summary);
            }
        }
        summaries
    }

    /// Extracts common trends from summaries.
    ///
    /// Failed summaries are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if no usable summary is given.
    pub async fn trend(&self, summaries: &[AnalysisReport]) -> Result<AnalysisReport, Error> {
        let inputs = usable(summaries);
        if inputs.is_empty() {
            return Err(CommandError::ExecutionFailed(
                "trend analysis needs at least one summary; run summarize first".to_string(),
            )
            .into());
        }

        info!(reports = inputs.len(), "Analyzing trends");
        let prompt = self.pipeline.prompts().trend_for(&inputs);
        Ok(self.complete(AnalysisKind::Trend, TREND_SUBJECT, &prompt).await)
    }

    /// Compares the summary of `base` with every other usable summary.
    ///
    /// # Errors
    ///
    /// Returns an error if `base` has no usable summary or there is nothing
    /// to compare it with.
    pub async fn gap(
        &self,
        base: &str,
        summaries: &[AnalysisReport],
    ) -> Result<AnalysisReport, Error> {
        let inputs = usable(summaries);
        let base_summary = inputs
            .iter()
            .find(|(name, _)| *name == base)
            .map(|(_, body)| *body)
            .ok_or_else(|| {
                CommandError::ExecutionFailed(format!("no summary for base report {base}"))
            })?;
        let others: Vec<(&str, &str)> = inputs
            .iter()
            .filter(|(name, _)| *name != base)
            .copied()
            .collect();
        if others.is_empty() {
            return Err(CommandError::ExecutionFailed(
                "gap analysis needs at least one other summary".to_string(),
            )
            .into());
        }

        info!(base, others = others.len(), "Analyzing gaps");
        let prompt = self.pipeline.prompts().gap_for(base, base_summary, &others);
        Ok(self.complete(AnalysisKind::Gap, base, &prompt).await)
    }

    async fn complete(&self, kind: AnalysisKind, subject: &str, prompt: &str) -> AnalysisReport {
        match self.pipeline.generate(&self.model(), prompt).await {
            Ok(body) => AnalysisReport::new(kind, subject, body),
            Err(e) => {
                warn!(%kind, subject, error = %e, "Analysis failed");
                AnalysisReport::failure(kind, subject, &e.to_string())
            }
        }
    }
}

/// `(subject, body)` of successful summaries.
fn usable(summaries: &[AnalysisReport]) -> Vec<(&str, &str)> {
    summaries
        .iter()
        .filter(|s| s.kind == AnalysisKind::Summary && !s.failed)
        .map(|s| (s.subject.as_str(), s.body.as_str()))
        .collect()
}

/// Joins passage texts in rank order and caps the result at `max_chars`.
fn join_passages(passages: &[Passage], max_chars: usize) -> String {
    let text = passages
        .iter()
        .map(|p| p.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    ellipsize(&text, max_chars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::Completer;
    use crate::core::SourceMetadata;
    use crate::error::GenerationError;
    use crate::prompt::PromptSet;
    use crate::rag::RagSettings;
    use crate::retrieval::{Retriever, default_collections};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct ReportRetriever;

    #[async_trait]
    impl Retriever for ReportRetriever {
        async fn search(&self, query: &RetrievalQuery) -> Result<Vec<Passage>, RetrievalError> {
            if query.query == "empty.pdf" {
                return Ok(Vec::new());
            }
            Ok((1..=3)
                .map(|rank| {
                    Passage::new(
                        format!("page text {rank}"),
                        SourceMetadata::titled(query.query.clone()),
                        rank,
                    )
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct PromptLog {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Completer for PromptLog {
        async fn complete(&self, _model: &str, prompt: &str) -> Result<String, GenerationError> {
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(prompt.to_string());
            }
            if prompt.contains("broken.pdf") {
                return Err(GenerationError::NonText);
            }
            Ok("generated".to_string())
        }
    }

    fn pipeline(log: Arc<PromptLog>) -> RagPipeline {
        RagPipeline::new(
            Arc::new(ReportRetriever),
            log,
            PromptSet::defaults(),
            RagSettings::default(),
        )
    }

    #[test]
    fn test_join_passages_caps_length() {
        let passages = vec![
            Passage::new("年金基金".repeat(10), SourceMetadata::titled("a"), 1),
            Passage::new("  ", SourceMetadata::titled("a"), 2),
        ];
        let text = join_passages(&passages, 8);
        assert_eq!(text, "年金基金年金基金...");
    }

    #[tokio::test]
    async fn test_summarize_all_skips_empty_and_marks_failures() {
        let log = Arc::new(PromptLog::default());
        let rag = pipeline(log.clone());
        let collections = default_collections();
        let analyzer = Analyzer::new(&rag, &collections[1]);

        let reports = vec![
            "calpers.pdf".to_string(),
            "empty.pdf".to_string(),
            "broken.pdf".to_string(),
        ];
        let summaries = analyzer.summarize_all(&reports).await;

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].subject, "calpers.pdf");
        assert!(!summaries[0].failed);
        assert!(summaries[1].failed);

        let prompts = log.prompts.lock().unwrap();
        assert!(prompts[0].contains("page text 1\n\npage text 2\n\npage text 3"));
    }

    #[tokio::test]
    async fn test_trend_requires_summary() {
        let rag = pipeline(Arc::new(PromptLog::default()));
        let collections = default_collections();
        let analyzer = Analyzer::new(&rag, &collections[1]);

        assert!(analyzer.trend(&[]).await.is_err());

        let failed = AnalysisReport::failure(AnalysisKind::Summary, "a.pdf", "x");
        assert!(analyzer.trend(&[failed]).await.is_err());
    }

    #[tokio::test]
    async fn test_gap_compares_base_with_others() {
        let log = Arc::new(PromptLog::default());
        let rag = pipeline(log.clone());
        let collections = default_collections();
        let analyzer = Analyzer::new(&rag, &collections[1]);
        let summaries = vec![
            AnalysisReport::new(AnalysisKind::Summary, "gpif.pdf", "gpif summary"),
            AnalysisReport::new(AnalysisKind::Summary, "calpers.pdf", "calpers summary"),
        ];

        let gap = analyzer.gap("gpif.pdf", &summaries).await.unwrap();
        assert_eq!(gap.kind, AnalysisKind::Gap);
        assert_eq!(gap.subject, "gpif.pdf");
        assert_eq!(gap.body, "generated");

        let prompts = log.prompts.lock().unwrap();
        assert!(prompts[0].contains("[calpers.pdf]\ncalpers summary"));

        assert!(analyzer.gap("missing.pdf", &summaries).await.is_err());
        assert!(analyzer.gap("gpif.pdf", &summaries[..1]).await.is_err());
    }
}
