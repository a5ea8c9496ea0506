//! Evaluation of reports against the stewardship rubric.

pub mod driver;
pub mod report;

pub use driver::{DEFAULT_MAX_RESULTS, EvaluationDriver};
pub use report::{SECTION_DELIMITER, analysis_report, evaluation_report};
