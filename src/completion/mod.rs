//! Completion client.
//!
//! A [`Completer`] sends one composed prompt to a text-generation service and
//! returns the generated text. Calls are stateless and never retried here;
//! callers decide what to do with a [`GenerationError`].
//!
//! Service payloads are decoded exactly once into a [`Reply`] at the client
//! boundary, so orchestration code only ever sees text or a typed error.

pub mod http;
#[cfg(feature = "openai")]
pub mod openai;

pub use http::HttpCompleter;
#[cfg(feature = "openai")]
pub use openai::OpenAiCompleter;

use crate::error::GenerationError;
use async_trait::async_trait;

/// Text generation for a composed prompt.
#[async_trait]
pub trait Completer: Send + Sync {
    /// Generates text for `prompt` with the given model.
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, GenerationError>;
}

/// A decoded service reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Generated text.
    Success {
        /// The text, already normalized.
        text: String,
    },
    /// The service reported a failure.
    Failure {
        /// Failure category.
        kind: String,
        /// Failure detail.
        detail: String,
    },
}

impl Reply {
    /// Builds a success reply, normalizing the raw text.
    #[must_use]
    pub fn success(raw: &str) -> Self {
        Self::Success {
            text: normalize_text(raw),
        }
    }

    /// Converts the reply into generated text.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Service`] for failures and
    /// [`GenerationError::NonText`] for blank text.
    pub fn into_text(self) -> Result<String, GenerationError> {
        match self {
            Self::Success { text } if text.trim().is_empty() => Err(GenerationError::NonText),
            Self::Success { text } => Ok(text),
            Self::Failure { kind, detail } => Err(GenerationError::Service { kind, detail }),
        }
    }
}

/// Undoes JSON string quoting some services leave on generated text.
///
/// Surrounding double quotes are removed and `\n`, `\t`, `\"`, `\\` escapes
/// are resolved. Text without surrounding quotes only has its escapes
/// resolved.
///
/// # Examples
///
/// ```
/// use steward_rs::completion::normalize_text;
///
/// assert_eq!(normalize_text("\"line one\\nline two\""), "line one\nline two");
/// assert_eq!(normalize_text("plain"), "plain");
/// ```
#[must_use]
pub fn normalize_text(raw: &str) -> String {
    let inner = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
