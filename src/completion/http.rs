//! REST completion client.
//!
//! Request: `{"model": ..., "prompt": ...}`.
//! Response: `{"text": ...}` on success, `{"error": {"kind": ..., "detail": ...}}`
//! when the service reports a failure inside a 2xx payload.

use super::{Completer, Reply};
use crate::error::GenerationError;
use crate::io::clip_bytes;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tracing::debug;

/// Maximum bytes of an error body kept in [`GenerationError::Status`].
const ERROR_BODY_MAX_BYTES: usize = 512;

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct WireFailure {
    #[serde(default = "unknown_kind")]
    kind: String,
    #[serde(default, alias = "message")]
    detail: String,
}

fn unknown_kind() -> String {
    "unknown".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireReply {
    Failure { error: WireFailure },
    Success { text: Option<Value> },
}

impl WireReply {
    fn into_reply(self) -> Result<Reply, GenerationError> {
        match self {
            Self::Failure { error } => Ok(Reply::Failure {
                kind: error.kind,
                detail: error.detail,
            }),
            Self::Success {
                text: Some(Value::String(text)),
            } => Ok(Reply::success(&text)),
            Self::Success { .. } => Err(GenerationError::NonText),
        }
    }
}

/// Decodes a 2xx response body into a [`Reply`].
fn decode_reply(body: &str) -> Result<Reply, GenerationError> {
    let wire: WireReply = serde_json::from_str(body)
        .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;
    wire.into_reply()
}

/// Completion client for a REST text-generation service.
pub struct HttpCompleter {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpCompleter {
    /// Creates a client for `endpoint`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            token: None,
        }
    }

    /// Sets the bearer token sent with every request.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

#[async_trait]
impl Completer for HttpCompleter {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
        if prompt.trim().is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }

        debug!(
            endpoint = %self.endpoint,
            model,
            prompt_len = prompt.len(),
            "Sending completion request"
        );
        let started = Instant::now();

        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&CompletionRequest { model, prompt });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: clip_bytes(&body, ERROR_BODY_MAX_BYTES).to_string(),
            });
        }

        let text = decode_reply(&body)?.into_text()?;
        debug!(
            elapsed = ?started.elapsed(),
            chars = text.chars().count(),
            "Completion received"
        );
        Ok(text)
    }
}
