//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use crate::conversation::DEFAULT_SESSION;
use crate::core::Target;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// steward-rs: retrieval-augmented analysis of pension-fund sustainability reports.
///
/// Chat with cited sources, evaluate reports against the stewardship
/// principles, and summarize or compare reports.
#[derive(Parser, Debug)]
#[command(name = "steward-rs")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the steward-rs database file.
    ///
    /// Defaults to `.steward/steward.db` in the current directory.
    #[arg(short, long, env = "STEWARD_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose (debug) logging on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Exactly one evaluation target.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct TargetArgs {
    /// A single report, by document name.
    #[arg(long)]
    pub document: Option<String>,

    /// A single entity, by code.
    #[arg(long)]
    pub entity: Option<String>,

    /// Every known entity in one request.
    #[arg(long)]
    pub all: bool,
}

impl TargetArgs {
    /// The selected target.
    #[must_use]
    pub fn target(&self) -> Target {
        match (&self.document, &self.entity) {
            (Some(document), _) => Target::Document(document.clone()),
            (None, Some(entity)) => Target::Entity(entity.clone()),
            (None, None) => Target::All,
        }
    }
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the steward-rs database.
    ///
    /// Creates the database file and schema if they don't exist.
    Init {
        /// Force re-initialization (destroys existing data).
        #[arg(short, long)]
        force: bool,
    },

    /// Show stored state.
    Status,

    /// Delete all stored turns, evaluations and analyses.
    Reset {
        /// Skip confirmation prompt.
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Ask a question about the reports.
    Ask {
        /// The question.
        question: String,

        /// Conversation session.
        #[arg(short, long, default_value = DEFAULT_SESSION)]
        session: String,

        /// Collection to search (defaults to the configured one).
        #[arg(long)]
        collection: Option<String>,

        /// Passages to retrieve (1-15).
        #[arg(short, long)]
        limit: Option<usize>,

        /// Earlier turns included in the prompt (0-10).
        #[arg(long)]
        history: Option<usize>,

        /// Completion model.
        #[arg(short, long)]
        model: Option<String>,

        /// Restrict the search to one report title.
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Show a session's turns.
    History {
        /// Conversation session.
        #[arg(short, long, default_value = DEFAULT_SESSION)]
        session: String,
    },

    /// Delete a session's turns.
    ClearHistory {
        /// Conversation session.
        #[arg(short, long, default_value = DEFAULT_SESSION)]
        session: String,
    },

    /// List conversation sessions.
    Sessions,

    /// Show the evaluation rubric.
    Rubric,

    /// Evaluate a target against the rubric.
    Evaluate {
        /// Target to evaluate.
        #[command(flatten)]
        target: TargetArgs,

        /// Criterion keys to evaluate (all when omitted).
        #[arg(long = "criterion")]
        criteria: Vec<String>,

        /// Completion model.
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Export stored evaluation results for a target as text.
    Report {
        /// Target to export.
        #[command(flatten)]
        target: TargetArgs,

        /// Output file path (stdout if not specified).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete stored evaluation results for a target.
    ClearEvaluations {
        /// Target whose results are deleted.
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Summarize one or more reports.
    Summarize {
        /// Report (document) names.
        #[arg(required = true)]
        reports: Vec<String>,
    },

    /// Extract common trends from stored summaries.
    Trend {
        /// Reports to include (every stored summary when omitted).
        reports: Vec<String>,
    },

    /// Compare one report's summary with the others.
    Gap {
        /// Base report name.
        #[arg(long)]
        base: String,

        /// Reports to compare against (every other stored summary when omitted).
        reports: Vec<String>,
    },

    /// Show or export stored analyses.
    Analyses {
        /// Only this kind (summary, trend, gap).
        #[arg(short, long)]
        kind: Option<String>,

        /// Output file path (stdout if not specified).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List configured collections.
    Collections,

    /// Manage prompt templates.
    #[command(subcommand)]
    Prompts(PromptCommands),
}

/// Prompt template subcommands.
#[derive(Subcommand, Debug)]
pub enum PromptCommands {
    /// Write the default templates without overwriting existing files.
    Init {
        /// Target directory (defaults to the configured prompt directory).
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

impl Cli {
    /// Returns the database path, using the default if not specified.
    #[must_use]
    pub fn get_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(crate::storage::DEFAULT_DB_PATH))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_db_path() {
        let cli = Cli::parse_from(["steward-rs", "status"]);
        if std::env::var_os("STEWARD_DB_PATH").is_none() {
            assert_eq!(
                cli.get_db_path(),
                PathBuf::from(crate::storage::DEFAULT_DB_PATH)
            );
        }
    }

    #[test]
    fn test_custom_db_path() {
        let cli = Cli::parse_from(["steward-rs", "--db-path", "/custom/path.db", "status"]);
        assert_eq!(cli.get_db_path(), PathBuf::from("/custom/path.db"));
    }

    #[test]
    fn test_evaluate_target_and_criteria() {
        let cli = Cli::parse_from([
            "steward-rs",
            "evaluate",
            "--entity",
            "AMOne",
            "--criterion",
            "P1",
            "--criterion",
            "P3",
        ]);
        assert!(matches!(
            &cli.command,
            Commands::Evaluate { target, criteria, .. }
                if target.target() == Target::Entity("AMOne".to_string())
                    && criteria == &["P1", "P3"]
        ));
    }

    #[test]
    fn test_target_is_required_and_exclusive() {
        assert!(Cli::try_parse_from(["steward-rs", "evaluate"]).is_err());
        assert!(
            Cli::try_parse_from(["steward-rs", "report", "--all", "--document", "a.pdf"]).is_err()
        );
        let cli = Cli::try_parse_from(["steward-rs", "report", "--all"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Report { ref target, .. } if target.target().is_all()
        ));
    }

    #[test]
    fn test_analysis_report_selection() {
        let cli = Cli::parse_from(["steward-rs", "trend"]);
        assert!(matches!(&cli.command, Commands::Trend { reports } if reports.is_empty()));

        let cli = Cli::parse_from(["steward-rs", "gap", "--base", "gpif.pdf", "calpers.pdf"]);
        assert!(matches!(
            &cli.command,
            Commands::Gap { base, reports } if base == "gpif.pdf" && reports == &["calpers.pdf"]
        ));
    }

    #[test]
    fn test_clear_evaluations_needs_target() {
        assert!(Cli::try_parse_from(["steward-rs", "clear-evaluations"]).is_err());
        let cli = Cli::parse_from(["steward-rs", "clear-evaluations", "--document", "a.pdf"]);
        assert!(matches!(
            &cli.command,
            Commands::ClearEvaluations { target }
                if target.target() == Target::Document("a.pdf".to_string())
        ));
    }
}
