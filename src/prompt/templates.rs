//! Prompt templates.
//!
//! Fixed texts are compiled in and can be overridden file by file from a
//! prompt directory. Templates use `{name}` placeholders that are filled in
//! by [`render`]; unknown placeholders render as empty strings.

use crate::core::{KnownEntity, RubricCriterion, Target};
use regex::{Captures, Regex};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// System instruction for chat.
pub const CHAT_INSTRUCTION: &str = "You are an expert assistant for {collection}.
Answer accurately and concisely, using only the retrieved context and the conversation history below.

Answer rules:
1. Always state the source (file name and page number) of what you use, citing documents as [n].
2. If the context does not contain the information, answer \"This could not be confirmed from the documents.\"
3. Avoid guesses and speculation; answer from facts.
4. When there are several pieces of information, organize them as bullet points.";

/// System instruction for rubric evaluation.
pub const EVALUATION_INSTRUCTION: &str = "Follow these rules strictly when answering.
1. Base the answer only on the retrieved context below.
2. When quoting, always state the file name and page number, citing documents as [n].
3. Use only information about the evaluation target.
4. When evaluating, judge a requirement as addressed if the report shows initiatives, policies or an attitude in line with the intent of the principle, even without concrete figures or detailed descriptions.";

/// Question asked for one criterion against one document or entity.
pub const CRITERION_QUESTION: &str = "{key}: {title}

[Principle details]
{description}

Analyze how \"{target}\" addresses the stewardship principle above.

**Answer in the following format:**

## Evaluation result

### Status for each requirement of the principle

For each requirement in the principle details (items starting with ○), evaluate in this format:

---

**○ [the requirement, quoted as written]**

**Status:**
- [short summary of initiatives, policies and attitude (2-3 sentences)]
- [related information found in the search results]

**Rating:** ✅ Addressed / ⚠️ Partially addressed / ❌ No information

---

(repeat for the next requirement)

### Overall assessment

[overall comment on the principle as a whole (3-4 sentences)]

---

**Rating criteria:**
- ✅ Addressed: initiatives, policies or an attitude in line with the intent of the principle can be confirmed (no concrete figures or details needed)
- ⚠️ Partially addressed: only some elements are addressed, or the mention is indirect
- ❌ No information: no related description can be found in the report

**Notes:**
- Answer based on the search results.
- Content in line with the intent of the principle may be rated \"✅ Addressed\" even without detailed descriptions.";

/// Question asked for one criterion across every known entity.
pub const CROSS_ENTITY_QUESTION: &str = "{key}: {title}

[Principle details]
{description}

Analyze how each asset manager ({entities}) addresses the stewardship principle above.

**Answer in the following format:**

## Evaluation result

### Status of each company for each requirement of the principle

For each requirement in the principle details (items starting with ○), evaluate in this format:

---

**○ [the requirement, quoted as written]**

{entity_sections}
---

(repeat for the next requirement)

### Overall assessment

[overall comment comparing how the companies address the principle]

---

**Rating criteria:**
- ✅ Addressed: initiatives, policies or an attitude in line with the intent of the principle can be confirmed (no concrete figures or details needed)
- ⚠️ Partially addressed: only some elements are addressed, or the mention is indirect
- ❌ No information: no related description can be found in the report

**Notes:**
- Answer based on the search results.
- Content in line with the intent of the principle may be rated \"✅ Addressed\" even without detailed descriptions.";

/// Per-entity block repeated inside [`CROSS_ENTITY_QUESTION`].
const ENTITY_SECTION: &str = "**{code}:**
- [short summary of initiatives and policies]
- Rating: ✅ Addressed / ⚠️ Partially addressed / ❌ No information
";

/// Structured summary of one report.
pub const SUMMARY_PROMPT: &str = "You are an expert in analyzing pension fund sustainability reports.
Summarize the following report.

[Report name]
{report}

[Report content]
{content}

[Summary requirements]
Structure the summary from these viewpoints:

## 1. Executive summary (about 200 words)
A short overview of the whole report

## 2. Key initiatives
- Main initiatives
- Distinctive measures

## 3. ESG investment strategy
- Environmental (E) initiatives
- Social (S) initiatives
- Governance (G) initiatives

## 4. Targets and results
Concrete numerical targets and achievements, if any

## 5. Notable points
Points that are distinctive or advanced compared with other pension funds";

/// Common trends across report summaries.
pub const TREND_PROMPT: &str = "Analyze pension fund sustainability trends and extract the common trends from the report summaries below.

Input data
{summaries}

Output specification (strict)
Markdown with the structure below. No preamble or closing. About 300 words per item.

## 1. Common priority themes
Themes and priorities shared by several reports (3-5 items, with concrete examples)

## 2. ESG investment trends
### Climate change
Concrete strategies, investment cases, targets

### Diversity and inclusion
Each fund's initiatives and characteristics

### Stewardship activities
Engagement methods, voting policies

## 3. Target-setting trends
### Net-zero targets
Target years, interim targets, progress

### Other numerical targets
ESG investment amounts, CO2 reduction targets and other figures

## 4. Disclosure and reporting
Adoption of reporting frameworks (TCFD, ISSB, etc.) and level of disclosure detail

## 5. Leading initiatives
Innovative or notable initiatives (including investee names and amounts, 2-3 items)

## 6. Implications for Japan
Concrete lessons for Japanese pension funds (3-4 items)

Complete all six items.";

/// Gap analysis of a base report against the others.
pub const GAP_PROMPT: &str = "Compare the sustainability report of {base} with the other pension funds' reports below and perform a gap analysis.

Input data
[{base}]
{base_summary}

[Other pension funds]
{others}

Output specification (strict)
Markdown with the structure below. No preamble or closing. At most 200 words per item.

## 1. Strengths of {base}
Where it does better than the others (3 bullet points)

## 2. Opportunities for improvement
Initiatives to learn from the others (3 bullet points, naming them)

## 3. Disclosure and communication gaps
### Report structure
Level of disclosure detail and communication differences (2 items)

### Reporting frameworks
Adoption of TCFD, ISSB, etc. (1-2 items)

## 4. ESG investment strategy gaps
### Climate change
Net-zero strategy, transition finance (2 items)

### Engagement
Active ownership, voting (2 items)

### Impact measurement
Measurement methods, KPI setting (1-2 items)

## 5. Governance gaps
Organization, specialist staffing, relationship with external managers (2-3 items)

## 6. Concrete recommendations
Priorities {base} should address (3 bullet points, including feasibility)

Complete all six items.";

/// Delimiter placed between report blocks in trend and gap prompts.
pub const REPORT_DELIMITER: &str = "\n\n---\n\n";

/// Environment variable naming the prompt override directory.
pub const PROMPT_DIR_ENV: &str = "STEWARD_PROMPT_DIR";

const CHAT_FILENAME: &str = "chat.md";
const EVALUATION_FILENAME: &str = "evaluation.md";
const CRITERION_FILENAME: &str = "criterion.md";
const CROSS_ENTITY_FILENAME: &str = "criterion_all.md";
const SUMMARY_FILENAME: &str = "summary.md";
const TREND_FILENAME: &str = "trend.md";
const GAP_FILENAME: &str = "gap.md";

static PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{([a-z][a-z_]*)\}").ok());

/// Fills `{name}` placeholders from `values`.
///
/// Placeholders without a value render as empty strings.
///
/// # Examples
///
/// ```
/// use steward_rs::prompt::render;
///
/// let rendered = render("{key}: {title}{missing}", &[("key", "P1"), ("title", "Policy")]);
/// assert_eq!(rendered, "P1: Policy");
/// ```
#[must_use]
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let Some(regex) = PLACEHOLDER.as_ref() else {
        return template.to_string();
    };
    regex
        .replace_all(template, |caps: &Captures<'_>| {
            let name = caps.get(1).map_or("", |m| m.as_str());
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map_or("", |(_, value)| *value)
                .to_string()
        })
        .into_owned()
}

/// Every fixed text used to build prompts.
///
/// Loaded from template files when available, falling back to compiled-in
/// defaults. Use [`PromptSet::load`] to resolve the prompt directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    /// Chat system instruction.
    pub chat_instruction: String,
    /// Evaluation system instruction.
    pub evaluation_instruction: String,
    /// Single-target criterion question.
    pub criterion_question: String,
    /// Cross-entity criterion question.
    pub cross_entity_question: String,
    /// Report summary prompt.
    pub summary: String,
    /// Trend analysis prompt.
    pub trend: String,
    /// Gap analysis prompt.
    pub gap: String,
}

impl PromptSet {
    /// Loads prompts from the given directory, falling back to compiled-in defaults.
    ///
    /// Resolution order for `prompt_dir`:
    /// 1. Explicit `prompt_dir` argument
    /// 2. `STEWARD_PROMPT_DIR` environment variable
    /// 3. `<config dir>/steward-rs/prompts/`
    ///
    /// Each file is loaded independently; a missing file uses its default.
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>) -> Self {
        let resolved_dir = prompt_dir
            .map(PathBuf::from)
            .or_else(|| std::env::var(PROMPT_DIR_ENV).ok().map(PathBuf::from))
            .or_else(Self::default_dir);

        let load_file = |filename: &str, default: &str| -> String {
            resolved_dir
                .as_ref()
                .map(|dir| dir.join(filename))
                .and_then(|path| std::fs::read_to_string(&path).ok())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            chat_instruction: load_file(CHAT_FILENAME, CHAT_INSTRUCTION),
            evaluation_instruction: load_file(EVALUATION_FILENAME, EVALUATION_INSTRUCTION),
            criterion_question: load_file(CRITERION_FILENAME, CRITERION_QUESTION),
            cross_entity_question: load_file(CROSS_ENTITY_FILENAME, CROSS_ENTITY_QUESTION),
            summary: load_file(SUMMARY_FILENAME, SUMMARY_PROMPT),
            trend: load_file(TREND_FILENAME, TREND_PROMPT),
            gap: load_file(GAP_FILENAME, GAP_PROMPT),
        }
    }

    /// Returns compiled-in defaults without checking the filesystem.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            chat_instruction: CHAT_INSTRUCTION.to_string(),
            evaluation_instruction: EVALUATION_INSTRUCTION.to_string(),
            criterion_question: CRITERION_QUESTION.to_string(),
            cross_entity_question: CROSS_ENTITY_QUESTION.to_string(),
            summary: SUMMARY_PROMPT.to_string(),
            trend: TREND_PROMPT.to_string(),
            gap: GAP_PROMPT.to_string(),
        }
    }

    /// Writes the compiled-in defaults to the given directory.
    ///
    /// Creates the directory if it does not exist. Existing files are
    /// **not** overwritten.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if directory creation or file writing fails.
    pub fn write_defaults(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let templates = [
            (CHAT_FILENAME, CHAT_INSTRUCTION),
            (EVALUATION_FILENAME, EVALUATION_INSTRUCTION),
            (CRITERION_FILENAME, CRITERION_QUESTION),
            (CROSS_ENTITY_FILENAME, CROSS_ENTITY_QUESTION),
            (SUMMARY_FILENAME, SUMMARY_PROMPT),
            (TREND_FILENAME, TREND_PROMPT),
            (GAP_FILENAME, GAP_PROMPT),
        ];

        let mut written = Vec::new();
        for (filename, content) in &templates {
            let path = dir.join(filename);
            if !path.exists() {
                std::fs::write(&path, content)?;
                written.push(path);
            }
        }

        Ok(written)
    }

    /// Returns the default prompt directory under the user's config dir.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("steward-rs").join("prompts"))
    }

    /// Chat instruction for a collection.
    #[must_use]
    pub fn chat_instruction_for(&self, collection: &str) -> String {
        render(&self.chat_instruction, &[("collection", collection)])
    }

    /// Criterion question for a target.
    ///
    /// The cross-entity target lists every known entity and asks for one
    /// sub-section per entity under each requirement.
    #[must_use]
    pub fn criterion_question_for(
        &self,
        criterion: &RubricCriterion,
        target: &Target,
        entities: &[KnownEntity],
    ) -> String {
        if target.is_all() {
            let codes = entities
                .iter()
                .map(|e| e.code.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let mut sections = String::new();
            for entity in entities {
                let section = render(ENTITY_SECTION, &[("code", entity.code.as_str())]);
                let _ = writeln!(sections, "{section}");
            }
            render(
                &self.cross_entity_question,
                &[
                    ("key", criterion.key.as_str()),
                    ("title", criterion.title.as_str()),
                    ("description", criterion.description.as_str()),
                    ("entities", codes.as_str()),
                    ("entity_sections", sections.as_str()),
                ],
            )
        } else {
            let label = target.label(entities);
            render(
                &self.criterion_question,
                &[
                    ("key", criterion.key.as_str()),
                    ("title", criterion.title.as_str()),
                    ("description", criterion.description.as_str()),
                    ("target", label.as_str()),
                ],
            )
        }
    }

    /// Summary prompt for one report.
    #[must_use]
    pub fn summary_for(&self, report: &str, content: &str) -> String {
        render(&self.summary, &[("report", report), ("content", content)])
    }

    /// Trend prompt over `(name, summary)` pairs.
    #[must_use]
    pub fn trend_for(&self, summaries: &[(&str, &str)]) -> String {
        render(&self.trend, &[("summaries", join_reports(summaries).as_str())])
    }

    /// Gap prompt comparing `base` with `others`.
    #[must_use]
    pub fn gap_for(&self, base: &str, base_summary: &str, others: &[(&str, &str)]) -> String {
        render(
            &self.gap,
            &[
                ("base", base),
                ("base_summary", base_summary),
                ("others", join_reports(others).as_str()),
            ],
        )
    }
}

impl Default for PromptSet {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Renders `[name]\nsummary` blocks joined by [`REPORT_DELIMITER`].
fn join_reports(reports: &[(&str, &str)]) -> String {
    reports
        .iter()
        .map(|(name, summary)| format!("[{name}]\n{summary}"))
        .collect::<Vec<_>>()
        .join(REPORT_DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Rubric, default_entities};
    use tempfile::TempDir;

    #[test]
    fn test_render_missing_placeholder_is_empty() {
        assert_eq!(render("a{x}b", &[]), "ab");
        assert_eq!(render("no placeholders", &[("x", "1")]), "no placeholders");
    }

    #[test]
    fn test_render_leaves_non_placeholders() {
        assert_eq!(render("{\"json\": 1} {Key}", &[("json", "x")]), "{\"json\": 1} {Key}");
    }

    #[test]
    fn test_criterion_question_single_target() {
        let rubric = Rubric::stewardship_principles();
        let criterion = rubric.get("P1").unwrap();
        let prompts = PromptSet::defaults();
        let question = prompts.criterion_question_for(
            criterion,
            &Target::Entity("AMOne".to_string()),
            &default_entities(),
        );

        assert!(question.starts_with(&format!("P1: {}", criterion.title)));
        assert!(question.contains("Asset Management One (AMOne)"));
        assert!(question.contains(&criterion.description));
        assert!(!question.contains('{'));
    }

    #[test]
    fn test_criterion_question_cross_entity() {
        let rubric = Rubric::stewardship_principles();
        let criterion = rubric.get("P2").unwrap();
        let entities = default_entities();
        let question =
            PromptSet::defaults().criterion_question_for(criterion, &Target::All, &entities);

        assert!(question.contains("(AMOne, SMTAM, Resona, MUTB)"));
        for entity in &entities {
            assert!(question.contains(&format!("**{}:**", entity.code)));
        }
    }

    #[test]
    fn test_trend_joins_reports() {
        let prompt = PromptSet::defaults().trend_for(&[("a.pdf", "sum a"), ("b.pdf", "sum b")]);
        assert!(prompt.contains("[a.pdf]\nsum a\n\n---\n\n[b.pdf]\nsum b"));
    }

    #[test]
    fn test_gap_mentions_base() {
        let prompt = PromptSet::defaults().gap_for("gpif.pdf", "base", &[("cal.pdf", "other")]);
        assert!(prompt.contains("[gpif.pdf]\nbase"));
        assert!(prompt.contains("[cal.pdf]\nother"));
        assert!(prompt.contains("Strengths of gpif.pdf"));
    }

    #[test]
    fn test_load_overrides_single_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(CHAT_FILENAME), "custom {collection}").unwrap();

        let prompts = PromptSet::load(Some(temp.path()));
        assert_eq!(prompts.chat_instruction_for("stewardship"), "custom stewardship");
        assert_eq!(prompts.evaluation_instruction, EVALUATION_INSTRUCTION);
    }

    #[test]
    fn test_write_defaults_does_not_overwrite() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(GAP_FILENAME), "mine").unwrap();

        let written = PromptSet::write_defaults(temp.path()).unwrap();
        assert_eq!(written.len(), 6);
        assert_eq!(
            std::fs::read_to_string(temp.path().join(GAP_FILENAME)).unwrap(),
            "mine"
        );
    }
}
