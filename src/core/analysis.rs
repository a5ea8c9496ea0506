//! Report analyses: summaries, trend and gap reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Subject used for trend reports.
pub const TREND_SUBJECT: &str = "selected reports";

/// Kind of analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    /// Structured summary of one report.
    Summary,
    /// Common trends across several summaries.
    Trend,
    /// Comparison of a base report against the others.
    Gap,
}

impl AnalysisKind {
    /// Storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Trend => "trend",
            Self::Gap => "gap",
        }
    }

    /// Parses a storage name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "summary" => Some(Self::Summary),
            "trend" => Some(Self::Trend),
            "gap" => Some(Self::Gap),
            _ => None,
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generated analysis, keyed by (kind, subject).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Kind of analysis.
    pub kind: AnalysisKind,
    /// Report name (summaries, gap base) or a fixed subject (trend).
    pub subject: String,
    /// Generated text or an error marker.
    pub body: String,
    /// Whether generation failed.
    pub failed: bool,
    /// When the analysis was produced.
    pub created_at: DateTime<Utc>,
}

impl AnalysisReport {
    /// Creates a successful report.
    #[must_use]
    pub fn new(kind: AnalysisKind, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            body: body.into(),
            failed: false,
            created_at: Utc::now(),
        }
    }

    /// Creates an error-marked report.
    #[must_use]
    pub fn failure(kind: AnalysisKind, subject: impl Into<String>, detail: &str) -> Self {
        Self {
            kind,
            subject: subject.into(),
            body: format!("Error: {kind} failed: {detail}"),
            failed: true,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for kind in [AnalysisKind::Summary, AnalysisKind::Trend, AnalysisKind::Gap] {
            assert_eq!(AnalysisKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(AnalysisKind::parse("other"), None);
    }

    #[test]
    fn test_failure_body() {
        let report = AnalysisReport::failure(AnalysisKind::Gap, "gpif.pdf", "timeout");
        assert!(report.failed);
        assert_eq!(report.body, "Error: gap failed: timeout");
    }
}
