//! Evaluation targets.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier used for the cross-entity target.
pub const ALL_TARGETS_ID: &str = "all";

/// An entity (institution) known to the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownEntity {
    /// Short code that appears in document names, e.g. `AMOne`.
    pub code: String,
    /// Display name.
    pub name: String,
}

impl KnownEntity {
    /// Creates an entity.
    #[must_use]
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

/// Default entities: the domestic asset managers covered by the report set.
#[must_use]
pub fn default_entities() -> Vec<KnownEntity> {
    vec![
        KnownEntity::new("AMOne", "Asset Management One"),
        KnownEntity::new("SMTAM", "Sumitomo Mitsui Trust Asset Management"),
        KnownEntity::new("Resona", "Resona Asset Management"),
        KnownEntity::new("MUTB", "Mitsubishi UFJ Trust and Banking"),
    ]
}

/// What an evaluation is run against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Target {
    /// A single report, by document name.
    Document(String),
    /// A single entity, by code.
    Entity(String),
    /// Every known entity at once.
    All,
}

impl Target {
    /// Identifier used to key results.
    #[must_use]
    pub fn identifier(&self) -> &str {
        match self {
            Self::Document(name) | Self::Entity(name) => name,
            Self::All => ALL_TARGETS_ID,
        }
    }

    /// Storage discriminator.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Document(_) => "document",
            Self::Entity(_) => "entity",
            Self::All => "all",
        }
    }

    /// Rebuilds a target from its storage discriminator and identifier.
    #[must_use]
    pub fn from_parts(kind: &str, identifier: &str) -> Option<Self> {
        match kind {
            "document" => Some(Self::Document(identifier.to_string())),
            "entity" => Some(Self::Entity(identifier.to_string())),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    /// Returns true for the cross-entity target.
    #[must_use]
    pub const fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Human-readable label, resolving entity codes to names.
    #[must_use]
    pub fn label(&self, entities: &[KnownEntity]) -> String {
        match self {
            Self::Document(name) => name.clone(),
            Self::Entity(code) => entities
                .iter()
                .find(|e| e.code.eq_ignore_ascii_case(code))
                .map_or_else(|| code.clone(), |e| format!("{} ({})", e.name, e.code)),
            Self::All => "all known entities".to_string(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}
