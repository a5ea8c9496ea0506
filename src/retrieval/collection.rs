//! Search collection descriptions.

use serde::{Deserialize, Serialize};

/// Collection used for stewardship evaluation and chat.
pub const STEWARDSHIP_COLLECTION: &str = "stewardship";

/// Collection holding global pension fund reports.
pub const GLOBAL_PENSION_COLLECTION: &str = "global-pension";

/// A named search collection and the columns its records carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Name used on the command line and in configuration.
    pub name: String,
    /// Fully qualified service reference, e.g. `DB.SCHEMA.SERVICE`.
    pub service: String,
    /// Column holding passage text.
    pub search_column: String,
    /// Column holding the source document title.
    pub title_column: String,
    /// Column holding the document path.
    pub path_column: Option<String>,
    /// Column holding a resolvable document URL.
    pub url_column: Option<String>,
    /// Column holding the page locator.
    pub page_column: Option<String>,
    /// Column holding the entity code, when the collection tags records by entity.
    pub entity_column: Option<String>,
    /// Additional columns requested with every search.
    pub extra_columns: Vec<String>,
}

impl CollectionConfig {
    /// Creates a collection with the standard report column layout.
    #[must_use]
    pub fn new(name: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service: service.into(),
            ..Self::default()
        }
    }

    /// Columns requested from the service, without duplicates.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        let candidates = [
            Some(&self.search_column),
            Some(&self.title_column),
            self.path_column.as_ref(),
            self.url_column.as_ref(),
            self.page_column.as_ref(),
            self.entity_column.as_ref(),
        ];
        for column in candidates
            .into_iter()
            .flatten()
            .chain(self.extra_columns.iter())
        {
            if !columns.iter().any(|c| c.eq_ignore_ascii_case(column)) {
                columns.push(column.clone());
            }
        }
        columns
    }

    /// Returns true if the service reference is well formed.
    ///
    /// A reference is one to three dot-separated, non-empty identifiers
    /// without whitespace.
    #[must_use]
    pub fn has_valid_service(&self) -> bool {
        let segments: Vec<&str> = self.service.split('.').collect();
        (1..=3).contains(&segments.len())
            && segments
                .iter()
                .all(|s| !s.is_empty() && !s.chars().any(char::is_whitespace))
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            service: String::new(),
            search_column: "chunk_text".to_string(),
            title_column: "file_name".to_string(),
            path_column: Some("relative_path".to_string()),
            url_column: Some("scoped_file_url".to_string()),
            page_column: Some("page_index".to_string()),
            entity_column: None,
            extra_columns: Vec::new(),
        }
    }
}

/// The two sustainability report collections.
#[must_use]
pub fn default_collections() -> Vec<CollectionConfig> {
    vec![
        CollectionConfig::new(
            STEWARDSHIP_COLLECTION,
            "DEMO_DB.DEMO_SUSTAINABILITY.SUSTAINABILITY_REPORT",
        ),
        CollectionConfig {
            extra_columns: vec!["source_report".to_string()],
            ..CollectionConfig::new(
                GLOBAL_PENSION_COLLECTION,
                "DEMO_DB.DEMO_SUSTAINABILITY.GLOBAL_PF_SUSTAINABILITY_REPORT",
            )
        },
    ]
}
