//! Evaluation rubric: an ordered set of uniquely keyed criteria.
//!
//! The rubric is static configuration. It is loaded once at startup and is
//! read-only afterwards, so it can be shared freely between evaluations.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A single rubric criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RubricCriterion {
    /// Unique key, e.g. `P1`.
    pub key: String,
    /// Short title.
    pub title: String,
    /// Free text; may enumerate sub-requirements one per line.
    pub description: String,
}

impl RubricCriterion {
    /// Creates a criterion.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            description: description.into(),
        }
    }

    /// Sub-requirements enumerated in the description.
    ///
    /// A line counts as a requirement when it starts with `○`, `-`, `*` or `•`.
    /// The bullet itself is stripped.
    #[must_use]
    pub fn requirements(&self) -> Vec<&str> {
        self.description
            .lines()
            .map(str::trim)
            .filter_map(|line| {
                line.strip_prefix('○')
                    .or_else(|| line.strip_prefix('-'))
                    .or_else(|| line.strip_prefix('*'))
                    .or_else(|| line.strip_prefix('•'))
            })
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect()
    }
}

/// Ordered rubric with unique criterion keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rubric {
    criteria: Vec<RubricCriterion>,
}

#[derive(Deserialize)]
struct RubricFile {
    criteria: Vec<RubricCriterion>,
}

impl Rubric {
    /// Builds a rubric, rejecting duplicate or empty keys.
    pub fn new(criteria: Vec<RubricCriterion>) -> Result<Self, ConfigError> {
        if criteria.is_empty() {
            return Err(ConfigError::Invalid(
                "rubric must contain at least one criterion".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for criterion in &criteria {
            if criterion.key.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "rubric criterion key must not be empty".to_string(),
                ));
            }
            if !seen.insert(criterion.key.as_str()) {
                return Err(ConfigError::DuplicateCriterion {
                    key: criterion.key.clone(),
                });
            }
        }

        Ok(Self { criteria })
    }

    /// Parses a rubric from TOML (`[[criteria]]` tables with `key`, `title`, `description`).
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: RubricFile = toml::from_str(source).map_err(|e| ConfigError::Parse {
            path: "rubric".to_string(),
            reason: e.to_string(),
        })?;
        Self::new(file.criteria)
    }

    /// The five stewardship principles applied to asset managers.
    #[must_use]
    pub fn stewardship_principles() -> Self {
        Self {
            criteria: vec![
                RubricCriterion::new(
                    "P1",
                    "Corporate governance of the asset manager",
                    "○ The asset manager accepts the Japanese Stewardship Code.\n\
                     ○ The asset manager establishes its own corporate governance structure; in particular, to strengthen its independence and transparency as an asset manager, it puts oversight in place such as appointing highly independent outside directors.\n\
                     ○ The asset manager builds the organisation and develops the people needed to fulfil its stewardship responsibilities effectively.\n\
                     ○ The asset manager explains how the remuneration of its officers and employees is aligned with the interests of beneficiaries.",
                ),
                RubricCriterion::new(
                    "P2",
                    "Conflict of interest management at the asset manager",
                    "○ To put beneficiaries' interests first, the asset manager manages conflicts of interest appropriately (including intra-group conflicts where it belongs to a corporate group); it classifies conflicts by type, such as capital or business relationships, and formulates and publishes a management policy.\n\
                     ○ The asset manager establishes and publishes structures that prevent conflicts of interest, such as a highly independent third-party committee whose composition takes independence and experience into account.\n\
                     ○ When voting at itself, its parent or group companies or other related parties, the asset manager establishes and publishes mechanisms that remove arbitrariness and pursue governance best practice, such as decisions or reviews by a third-party committee or applying a proxy advisor's recommendations.",
                ),
                RubricCriterion::new(
                    "P3",
                    "Stewardship policy including engagement",
                    "○ The asset manager formulates and publishes a stewardship policy covering engagement.\n\
                     ○ The asset manager avoids short-termism and focuses on the content and quality of stewardship activities that improve long-term risk-adjusted returns, considering action plans for effective activities.\n\
                     ○ The asset manager links stewardship activities, including engagement, with its investment management.\n\
                     ○ Recognising that index construction drives investment performance, the asset manager engages actively with index providers, for example through their consultations, for the benefit of beneficiaries.\n\
                     ○ From the perspective of sustainable growth of the market as a whole, the asset manager engages broadly with stakeholders beyond investee companies and index providers.\n\
                     ○ The asset manager makes full use of non-financial information in corporate governance reports and integrated reports when engaging with companies.\n\
                     ○ Where companies explain why they do not comply with a principle of a corporate governance code, the asset manager listens carefully to their reasoning.\n\
                     ○ In particular, asset managers running passive equity mandates design an engagement strategy and carry out effective engagement aimed at sustainable growth of the whole market.\n\
                     ○ When using engagement service providers, the asset manager performs due diligence on their organisation and staffing before appointment, and continuously monitors and evaluates their services afterwards, engaging with them where necessary.",
                ),
                RubricCriterion::new(
                    "P4",
                    "Consideration of ESG and other sustainability factors in investment",
                    "○ Because appropriate consideration of ESG and other sustainability factors contributes to long-term returns, corporate value and the sustainable growth of investees and the market, the asset manager addresses sustainability issues in light of sector materiality and the circumstances of each investee.\n\
                     ○ The asset manager sets out the goals it has as an investor on material sustainability issues and engages actively on them.\n\
                     ○ The asset manager signs the Principles for Responsible Investment (PRI) and participates actively in sustainability initiatives.",
                ),
                RubricCriterion::new(
                    "P5",
                    "Exercise of voting rights",
                    "○ Recognising that voting rights are entrusted by the pension fund, the asset manager votes solely in the interests of beneficiaries in line with its fiduciary duty.\n\
                     ○ As part of engagement that promotes corporate value, the asset manager votes in accordance with the separately defined voting principles.\n\
                     ○ When using proxy advisors, the asset manager performs due diligence on their organisation and staffing before appointment, and continuously monitors and evaluates their advice afterwards, engaging with them where necessary (except where used for conflict of interest management).",
                ),
            ],
        }
    }

    /// Criteria in rubric order.
    #[must_use]
    pub fn criteria(&self) -> &[RubricCriterion] {
        &self.criteria
    }

    /// Iterates over criteria in rubric order.
    pub fn iter(&self) -> std::slice::Iter<'_, RubricCriterion> {
        self.criteria.iter()
    }

    /// Number of criteria.
    #[must_use]
    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    /// Returns true if the rubric has no criteria.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Looks up a criterion by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&RubricCriterion> {
        self.criteria.iter().find(|c| c.key == key)
    }

    /// Resolves keys to criteria, returned in rubric order.
    ///
    /// An empty key list selects the whole rubric.
    pub fn select(&self, keys: &[String]) -> Result<Vec<&RubricCriterion>, ConfigError> {
        if keys.is_empty() {
            return Ok(self.criteria.iter().collect());
        }

        if let Some(unknown) = keys.iter().find(|k| self.get(k).is_none()) {
            return Err(ConfigError::UnknownCriterion {
                key: unknown.clone(),
            });
        }

        Ok(self
            .criteria
            .iter()
            .filter(|c| keys.contains(&c.key))
            .collect())
    }
}

impl<'a> IntoIterator for &'a Rubric {
    type Item = &'a RubricCriterion;
    type IntoIter = std::slice::Iter<'a, RubricCriterion>;

    fn into_iter(self) -> Self::IntoIter {
        self.criteria.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rubric() {
        let rubric = Rubric::stewardship_principles();
        assert_eq!(rubric.len(), 5);
        let keys: Vec<&str> = rubric.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["P1", "P2", "P3", "P4", "P5"]);
        assert_eq!(rubric.get("P5").map(|c| c.title.as_str()), Some("Exercise of voting rights"));
    }

    #[test]
    fn test_requirements_parsing() {
        let rubric = Rubric::stewardship_principles();
        let p3 = rubric.get("P3").expect("P3 exists");
        assert_eq!(p3.requirements().len(), 9);

        let c = RubricCriterion::new("K", "T", "intro\n- first\n* second\n\n○ third");
        assert_eq!(c.requirements(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let result = Rubric::new(vec![
            RubricCriterion::new("P1", "a", ""),
            RubricCriterion::new("P1", "b", ""),
        ]);
        assert!(matches!(
            result,
            Err(ConfigError::DuplicateCriterion { key }) if key == "P1"
        ));
    }

    #[test]
    fn test_empty_rubric_rejected() {
        assert!(Rubric::new(Vec::new()).is_err());
    }

    #[test]
    fn test_select_keeps_rubric_order() {
        let rubric = Rubric::stewardship_principles();
        let selected = rubric
            .select(&["P4".to_string(), "P2".to_string()])
            .expect("known keys");
        let keys: Vec<&str> = selected.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["P2", "P4"]);

        assert_eq!(rubric.select(&[]).expect("all").len(), 5);

        let err = rubric.select(&["P9".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCriterion { .. }));
    }

    #[test]
    fn test_from_toml() {
        let source = r#"
            [[criteria]]
            key = "G1"
            title = "Governance"
            description = "- board independence"

            [[criteria]]
            key = "G2"
            title = "Voting"
            description = "- voting policy"
        "#;
        let rubric = Rubric::from_toml_str(source).expect("valid rubric");
        assert_eq!(rubric.len(), 2);
        assert_eq!(rubric.criteria()[1].key, "G2");
    }
}
