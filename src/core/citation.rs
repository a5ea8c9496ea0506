//! Retrieved passages and the citations projected from them.
//!
//! A [`Passage`] lives only for the duration of one retrieval cycle. Once the
//! prompt has been composed, only its [`Citation`] projection survives in a
//! conversation turn or an evaluation result.

use crate::io::truncate_graphemes;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Maximum grapheme clusters kept in a citation snippet.
pub const SNIPPET_MAX_GRAPHEMES: usize = 300;

/// Matches `[n]` citation markers in generated text.
static CITATION_MARKER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\[(\d{1,3})\]").ok());

/// Provenance metadata attached to a retrieved passage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Source document title (usually the file name).
    pub title: String,
    /// Path of the source document inside the document store.
    pub path: Option<String>,
    /// Resolvable URL of the source document.
    pub url: Option<String>,
    /// Page (or other locator) the passage was taken from.
    pub page: Option<String>,
}

impl SourceMetadata {
    /// Creates metadata with only a title.
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Sets the page locator.
    #[must_use]
    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
        self
    }

    /// Sets the document path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the document URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Stable identifier of the source document: URL, then path, then title.
    #[must_use]
    pub fn source_id(&self) -> &str {
        self.url
            .as_deref()
            .or(self.path.as_deref())
            .unwrap_or(&self.title)
    }
}

/// A ranked passage returned by the retrieval client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    /// Passage text.
    pub text: String,
    /// Where the passage came from.
    pub source: SourceMetadata,
    /// 1-based relevance rank within its retrieval result.
    pub rank: usize,
}

impl Passage {
    /// Creates a new passage.
    #[must_use]
    pub fn new(text: impl Into<String>, source: SourceMetadata, rank: usize) -> Self {
        Self {
            text: text.into(),
            source,
            rank,
        }
    }

    /// Projects the passage onto a citation, keeping its rank.
    #[must_use]
    pub fn citation(&self) -> Citation {
        Citation {
            source_id: self.source.source_id().to_string(),
            title: self.source.title.clone(),
            snippet: truncate_graphemes(self.text.trim(), SNIPPET_MAX_GRAPHEMES).to_string(),
            locator: self.source.page.clone(),
            rank: self.rank,
        }
    }
}

/// A reference from generated text back to a retrieved passage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Identifier of the cited source document.
    pub source_id: String,
    /// Source document title.
    pub title: String,
    /// Leading part of the passage text.
    pub snippet: String,
    /// Page or other locator inside the source.
    pub locator: Option<String>,
    /// Rank of the passage; equals the `[n]` number used in the prompt.
    pub rank: usize,
}

impl Citation {
    /// Title without any leading directory components.
    #[must_use]
    pub fn display_title(&self) -> &str {
        self.title.rsplit('/').next().unwrap_or(&self.title)
    }
}

/// Projects a retrieval result onto citations, preserving order and rank.
#[must_use]
pub fn cite(passages: &[Passage]) -> Vec<Citation> {
    passages.iter().map(Passage::citation).collect()
}

/// Returns the citation numbers referenced as `[n]` in `text`.
///
/// Numbers are deduplicated and kept in order of first appearance.
#[must_use]
pub fn referenced_ranks(text: &str) -> Vec<usize> {
    let Some(re) = CITATION_MARKER.as_ref() else {
        return Vec::new();
    };

    let mut ranks = Vec::new();
    for caps in re.captures_iter(text) {
        if let Some(rank) = caps.get(1).and_then(|m| m.as_str().parse::<usize>().ok())
            && rank > 0
            && !ranks.contains(&rank)
        {
            ranks.push(rank);
        }
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(rank: usize, page: &str) -> Passage {
        Passage::new(
            "independent directors oversee the board",
            SourceMetadata::titled("reports/ReportA.pdf").with_page(page),
            rank,
        )
    }

    #[test]
    fn test_source_id_precedence() {
        let meta = SourceMetadata::titled("ReportA");
        assert_eq!(meta.source_id(), "ReportA");

        let meta = meta.with_path("am/ReportA.pdf");
        assert_eq!(meta.source_id(), "am/ReportA.pdf");

        let meta = meta.with_url("https://example.test/ReportA.pdf");
        assert_eq!(meta.source_id(), "https://example.test/ReportA.pdf");
    }

    #[test]
    fn test_citation_projection_keeps_rank_and_page() {
        let citation = passage(2, "7").citation();
        assert_eq!(citation.rank, 2);
        assert_eq!(citation.locator.as_deref(), Some("7"));
        assert_eq!(citation.title, "reports/ReportA.pdf");
        assert_eq!(citation.display_title(), "ReportA.pdf");
    }

    #[test]
    fn test_snippet_is_truncated() {
        let long = "年".repeat(SNIPPET_MAX_GRAPHEMES + 50);
        let p = Passage::new(long, SourceMetadata::titled("x"), 1);
        assert_eq!(
            p.citation().snippet.chars().count(),
            SNIPPET_MAX_GRAPHEMES
        );
    }

    #[test]
    fn test_cite_preserves_order() {
        let passages = vec![passage(1, "3"), passage(2, "7"), passage(3, "9")];
        let ranks: Vec<usize> = cite(&passages).iter().map(|c| c.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn test_referenced_ranks() {
        assert_eq!(
            referenced_ranks("See [2], then [1] and again [2]."),
            vec![2, 1]
        );
        assert!(referenced_ranks("no markers here").is_empty());
        assert!(referenced_ranks("[0] is not a citation").is_empty());
    }
}
