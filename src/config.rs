//! Layered configuration.
//!
//! Resolution order (first hit wins):
//! 1. `--config <path>`
//! 2. `STEWARD_CONFIG` environment variable
//! 3. `<config dir>/steward-rs/config.toml`
//! 4. compiled-in defaults
//!
//! Every section and field is optional in the file; missing values take
//! their defaults.

use crate::core::{KnownEntity, Rubric, default_entities};
use crate::error::ConfigError;
use crate::prompt::PromptSet;
use crate::rag::{DEFAULT_MODEL, RagSettings};
use crate::retrieval::{
    CollectionConfig, GLOBAL_PENSION_COLLECTION, STEWARDSHIP_COLLECTION, default_collections,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "STEWARD_CONFIG";

/// Largest accepted chat history window.
pub const MAX_HISTORY_WINDOW: usize = 10;

/// Largest accepted chat result count.
pub const MAX_CHAT_RESULTS: usize = 15;

/// Models offered for completion.
pub const DEFAULT_MODELS: [&str; 5] = [
    "claude-4-sonnet",
    "claude-3-7-sonnet",
    "claude-3-5-sonnet",
    "llama4-maverick",
    "llama4-scout",
];

/// Which completion backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// REST `{model, prompt}` → `{text}` service.
    #[default]
    Http,
    /// OpenAI-compatible chat completions API.
    Openai,
}

/// `[search]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Search endpoint URL.
    pub endpoint: String,
    /// Environment variable holding the bearer token.
    pub api_key_env: Option<String>,
    /// Bound on each search call, in seconds.
    pub timeout_secs: u64,
    /// Collection used when none is given.
    pub default_collection: String,
    /// Known collections.
    pub collections: Vec<CollectionConfig>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/api/search".to_string(),
            api_key_env: Some("STEWARD_SEARCH_TOKEN".to_string()),
            timeout_secs: 30,
            default_collection: STEWARDSHIP_COLLECTION.to_string(),
            collections: default_collections(),
        }
    }
}

/// `[completion]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Backend.
    pub provider: Provider,
    /// Endpoint URL (API base for the `openai` provider).
    pub endpoint: String,
    /// Environment variable holding the API key.
    pub api_key_env: Option<String>,
    /// Default model.
    pub model: String,
    /// Allowed models. Empty allows any model.
    pub models: Vec<String>,
    /// Bound on each completion call, in seconds.
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Http,
            endpoint: "http://localhost:8080/api/complete".to_string(),
            api_key_env: Some("STEWARD_COMPLETION_TOKEN".to_string()),
            model: DEFAULT_MODEL.to_string(),
            models: DEFAULT_MODELS.iter().map(ToString::to_string).collect(),
            timeout_secs: 120,
        }
    }
}

/// `[chat]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Earlier turns included in each prompt.
    pub history_window: usize,
    /// Passages retrieved per question.
    pub num_results: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_window: 3,
            num_results: 5,
        }
    }
}

/// `[evaluation]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Passages retrieved per criterion.
    pub max_results: usize,
    /// Criteria evaluated at once; 1 is strictly sequential.
    pub concurrency: usize,
    /// Collection searched; defaults to the search default.
    pub collection: Option<String>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            max_results: 12,
            concurrency: 1,
            collection: None,
        }
    }
}

/// `[analysis]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Cap on report text sent for summarization, in characters.
    pub max_report_chars: usize,
    /// Passages fetched per report.
    pub report_passages: usize,
    /// Model override for analyses.
    pub model: Option<String>,
    /// Collection holding the analyzed reports.
    pub collection: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_report_chars: 10_000,
            report_passages: 100,
            model: None,
            collection: GLOBAL_PENSION_COLLECTION.to_string(),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Search service settings.
    pub search: SearchConfig,
    /// Completion service settings.
    pub completion: CompletionConfig,
    /// Chat settings.
    pub chat: ChatConfig,
    /// Evaluation settings.
    pub evaluation: EvaluationConfig,
    /// Analysis settings.
    pub analysis: AnalysisConfig,
    /// Known entities, in display order.
    pub entities: Vec<KnownEntity>,
    /// Rubric file; the stewardship principles when unset.
    pub rubric_path: Option<PathBuf>,
    /// Prompt override directory.
    pub prompt_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            completion: CompletionConfig::default(),
            chat: ChatConfig::default(),
            evaluation: EvaluationConfig::default(),
            analysis: AnalysisConfig::default(),
            entities: default_entities(),
            rubric_path: None,
            prompt_dir: None,
        }
    }
}

impl AppConfig {
    /// Loads and validates the configuration.
    ///
    /// An explicit or environment-provided path must exist; the default
    /// path is optional.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read, parsed or validated.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let required = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let path = match required {
            Some(path) => Some(path),
            None => Self::default_path().filter(|p| p.is_file()),
        };

        let Some(path) = path else {
            return Ok(Self::default());
        };

        let source = std::fs::read_to_string(&path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&source, &path.display().to_string())
    }

    /// Parses and validates configuration text. `origin` names it in errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the text cannot be parsed or validated.
    pub fn from_toml_str(source: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Default configuration file location.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("steward-rs").join("config.toml"))
    }

    /// Checks value ranges and cross references.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chat.history_window > MAX_HISTORY_WINDOW {
            return Err(ConfigError::Invalid(format!(
                "chat.history_window must be at most {MAX_HISTORY_WINDOW}"
            )));
        }
        if !(1..=MAX_CHAT_RESULTS).contains(&self.chat.num_results) {
            return Err(ConfigError::Invalid(format!(
                "chat.num_results must be between 1 and {MAX_CHAT_RESULTS}"
            )));
        }
        if self.evaluation.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "evaluation.concurrency must be at least 1".to_string(),
            ));
        }
        if self.evaluation.max_results == 0 || self.analysis.report_passages == 0 {
            return Err(ConfigError::Invalid(
                "result limits must be at least 1".to_string(),
            ));
        }
        if self.search.timeout_secs == 0 || self.completion.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "service timeouts must be at least 1 second".to_string(),
            ));
        }
        if self.analysis.max_report_chars == 0 {
            return Err(ConfigError::Invalid(
                "analysis.max_report_chars must be at least 1".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for collection in &self.search.collections {
            if !names.insert(collection.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate collection name: {}",
                    collection.name
                )));
            }
            if !collection.has_valid_service() {
                return Err(ConfigError::Invalid(format!(
                    "collection {} has an invalid service reference: {}",
                    collection.name, collection.service
                )));
            }
        }

        self.collection(&self.search.default_collection)?;
        self.collection(self.evaluation_collection())?;
        self.collection(&self.analysis.collection)?;
        self.check_model(&self.completion.model)?;

        let mut codes = HashSet::new();
        for entity in &self.entities {
            if entity.code.trim().is_empty() || !codes.insert(entity.code.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "entity codes must be unique and non-empty: {:?}",
                    entity.code
                )));
            }
        }

        Ok(())
    }

    /// Looks up a collection by name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownCollection`] if it is not configured.
    pub fn collection(&self, name: &str) -> Result<&CollectionConfig, ConfigError> {
        self.search
            .collections
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ConfigError::UnknownCollection {
                name: name.to_string(),
            })
    }

    /// Name of the collection searched by evaluations.
    #[must_use]
    pub fn evaluation_collection(&self) -> &str {
        self.evaluation
            .collection
            .as_deref()
            .unwrap_or(&self.search.default_collection)
    }

    /// Checks a model against the allowed list.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a model outside a non-empty list.
    pub fn check_model(&self, model: &str) -> Result<(), ConfigError> {
        if self.completion.models.is_empty() || self.completion.models.iter().any(|m| m == model) {
            Ok(())
        } else {
            Err(ConfigError::Invalid(format!(
                "model {model} is not one of: {}",
                self.completion.models.join(", ")
            )))
        }
    }

    /// Loads the rubric file, or the stewardship principles when unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid rubric.
    pub fn rubric(&self) -> Result<Rubric, ConfigError> {
        let Some(path) = &self.rubric_path else {
            return Ok(Rubric::stewardship_principles());
        };
        let source = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Rubric::from_toml_str(&source).map_err(|e| match e {
            ConfigError::Parse { reason, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    /// Prompt templates, with `override_dir` taking precedence over `prompt_dir`.
    #[must_use]
    pub fn prompts(&self, override_dir: Option<&Path>) -> PromptSet {
        PromptSet::load(override_dir.or(self.prompt_dir.as_deref()))
    }

    /// Pipeline settings.
    #[must_use]
    pub fn rag_settings(&self) -> RagSettings {
        RagSettings {
            model: self.completion.model.clone(),
            retrieval_timeout: Duration::from_secs(self.search.timeout_secs),
            completion_timeout: Duration::from_secs(self.completion.timeout_secs),
        }
    }
}

/// Reads the credential named by `variable`, if any.
///
/// # Errors
///
/// Returns [`ConfigError::MissingCredential`] when `required` and the
/// variable is unset or empty.
pub fn credential(variable: Option<&str>, required: bool) -> Result<Option<String>, ConfigError> {
    let value = variable
        .and_then(|v| std::env::var(v).ok())
        .filter(|v| !v.trim().is_empty());
    match (value, variable) {
        (Some(value), _) => Ok(Some(value)),
        (None, Some(variable)) if required => Err(ConfigError::MissingCredential {
            variable: variable.to_string(),
        }),
        (None, None) if required => Err(ConfigError::Invalid(
            "api_key_env must name the variable holding the API key".to_string(),
        )),
        (None, _) => Ok(None),
    }
}
