//! CLI layer for steward-rs.
//!
//! Provides the command-line interface using clap, with commands for
//! chatting over the report collections, running rubric evaluations and
//! report analyses, and managing stored state.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
