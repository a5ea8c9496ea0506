//! OpenAI-compatible chat completion backend.

use super::{Completer, Reply};
use crate::error::GenerationError;
use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs};
use async_trait::async_trait;
use std::time::Instant;
use tracing::debug;

/// Sends each prompt as a single user message to a chat completions API.
pub struct OpenAiCompleter {
    client: Client<OpenAIConfig>,
}

impl OpenAiCompleter {
    /// Creates a backend. `api_base` overrides the default API URL.
    #[must_use]
    pub fn new(api_key: &str, api_base: Option<&str>) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base) = api_base {
            config = config.with_api_base(base);
        }
        Self {
            client: Client::with_config(config),
        }
    }
}

fn map_openai_error(err: OpenAIError) -> GenerationError {
    match err {
        OpenAIError::ApiError(api) => GenerationError::Service {
            kind: api.r#type.unwrap_or_else(|| "api_error".to_string()),
            detail: api.message,
        },
        OpenAIError::Reqwest(e) => GenerationError::Unreachable(e.to_string()),
        OpenAIError::JSONDeserialize(e) => GenerationError::MalformedResponse(e.to_string()),
        other => GenerationError::Service {
            kind: "client".to_string(),
            detail: other.to_string(),
        },
    }
}

#[async_trait]
impl Completer for OpenAiCompleter {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
        if prompt.trim().is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }

        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(map_openai_error)?;
        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages([message.into()])
            .build()
            .map_err(map_openai_error)?;

        debug!(model, prompt_len = prompt.len(), "Sending chat completion request");
        let started = Instant::now();

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(GenerationError::NonText)?;

        debug!(elapsed = ?started.elapsed(), "Chat completion received");
        Reply::success(&content).into_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_maps_to_service_error() {
        let err = map_openai_error(OpenAIError::InvalidArgument("model".to_string()));
        assert!(matches!(err, GenerationError::Service { kind, .. } if kind == "client"));
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected_before_sending() {
        let completer = OpenAiCompleter::new("test-key", Some("http://127.0.0.1:9/v1"));
        assert_eq!(
            completer.complete("gpt-4o-mini", "").await,
            Err(GenerationError::EmptyPrompt)
        );
    }
}
