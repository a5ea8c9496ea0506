//! CLI command implementations.
//!
//! Contains the business logic for each CLI command. Commands that talk to
//! the search or completion services run on a current-thread tokio runtime
//! built per invocation.

use crate::analysis::Analyzer;
use crate::cli::output::{
    OutputFormat, format_analyses, format_collections, format_evaluations, format_history,
    format_message, format_rubric, format_sessions, format_status, format_turn,
};
use crate::cli::parser::{Cli, Commands, PromptCommands};
use crate::completion::{Completer, HttpCompleter};
use crate::config::{AppConfig, MAX_CHAT_RESULTS, MAX_HISTORY_WINDOW, Provider, credential};
use crate::core::{AnalysisKind, AnalysisReport, Target};
use crate::error::{CommandError, Result, StorageError};
use crate::evaluation::{EvaluationDriver, analysis_report, evaluation_report};
use crate::io::write_file;
use crate::prompt::PromptSet;
use crate::rag::{ChatRequest, RagPipeline};
use crate::retrieval::{Filter, HttpRetriever};
use crate::storage::{SqliteStorage, Storage};
use chrono::Utc;
use std::fmt::Write;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Executes the CLI command.
///
/// # Arguments
///
/// * `cli` - Parsed CLI arguments.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let db_path = cli.get_db_path();
    let config = || AppConfig::load(cli.config.as_deref());

    match &cli.command {
        Commands::Init { force } => cmd_init(&db_path, *force, format),
        Commands::Status => cmd_status(&db_path, format),
        Commands::Reset { yes } => cmd_reset(&db_path, *yes, format),
        Commands::Ask {
            question,
            session,
            collection,
            limit,
            history,
            model,
            title,
        } => cmd_ask(
            &db_path,
            &config()?,
            &AskArgs {
                question,
                session,
                collection: collection.as_deref(),
                limit: *limit,
                history: *history,
                model: model.as_deref(),
                title: title.as_deref(),
            },
            format,
        ),
        Commands::History { session } => cmd_history(&db_path, session, format),
        Commands::ClearHistory { session } => cmd_clear_history(&db_path, session, format),
        Commands::Sessions => cmd_sessions(&db_path, format),
        Commands::Rubric => cmd_rubric(&config()?, format),
        Commands::Evaluate {
            target,
            criteria,
            model,
        } => cmd_evaluate(
            &db_path,
            &config()?,
            &target.target(),
            criteria,
            model.as_deref(),
            format,
        ),
        Commands::Report { target, output } => cmd_report(
            &db_path,
            &config()?,
            &target.target(),
            output.as_deref(),
            format,
        ),
        Commands::ClearEvaluations { target } => {
            cmd_clear_evaluations(&db_path, &config()?, &target.target(), format)
        }
        Commands::Summarize { reports } => cmd_summarize(&db_path, &config()?, reports, format),
        Commands::Trend { reports } => cmd_trend(&db_path, &config()?, reports, format),
        Commands::Gap { base, reports } => cmd_gap(&db_path, &config()?, base, reports, format),
        Commands::Analyses { kind, output } => {
            cmd_analyses(&db_path, kind.as_deref(), output.as_deref(), format)
        }
        Commands::Collections => cmd_collections(&config()?, format),
        Commands::Prompts(PromptCommands::Init { dir }) => {
            cmd_prompts_init(&config()?, dir.as_deref(), format)
        }
    }
}

/// Opens storage and ensures it's initialized.
fn open_storage(db_path: &Path) -> Result<SqliteStorage> {
    let mut storage = SqliteStorage::open(db_path)?;

    if !storage.is_initialized()? {
        return Err(StorageError::NotInitialized.into());
    }
    // Applies pending migrations.
    storage.init()?;

    Ok(storage)
}

/// Runs a future to completion on a current-thread runtime.
fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}

/// Builds the pipeline from configured service clients.
fn build_pipeline(config: &AppConfig) -> Result<RagPipeline> {
    let mut retriever =
        HttpRetriever::new(&config.search.endpoint, config.search.collections.clone());
    if let Some(token) = credential(config.search.api_key_env.as_deref(), false)? {
        retriever = retriever.with_token(token);
    }

    let completer: Arc<dyn Completer> = match config.completion.provider {
        Provider::Http => {
            let mut completer = HttpCompleter::new(&config.completion.endpoint);
            if let Some(token) = credential(config.completion.api_key_env.as_deref(), false)? {
                completer = completer.with_token(token);
            }
            Arc::new(completer)
        }
        Provider::Openai => openai_completer(config)?,
    };

    debug!(
        search = %config.search.endpoint,
        completion = %config.completion.endpoint,
        provider = ?config.completion.provider,
        "Built pipeline"
    );
    Ok(RagPipeline::new(
        Arc::new(retriever),
        completer,
        config.prompts(None),
        config.rag_settings(),
    ))
}

#[cfg(feature = "openai")]
fn openai_completer(config: &AppConfig) -> Result<Arc<dyn Completer>> {
    let key = credential(config.completion.api_key_env.as_deref(), true)?.unwrap_or_default();
    let base = Some(config.completion.endpoint.as_str()).filter(|e| !e.trim().is_empty());
    Ok(Arc::new(crate::completion::OpenAiCompleter::new(&key, base)))
}

#[cfg(not(feature = "openai"))]
fn openai_completer(_config: &AppConfig) -> Result<Arc<dyn Completer>> {
    Err(crate::error::ConfigError::Invalid(
        "the openai provider requires the `openai` feature".to_string(),
    )
    .into())
}

fn analyzer<'a>(pipeline: &'a RagPipeline, config: &'a AppConfig) -> Result<Analyzer<'a>> {
    let collection = config.collection(&config.analysis.collection)?;
    Ok(Analyzer::new(pipeline, collection)
        .with_max_report_chars(config.analysis.max_report_chars)
        .with_report_passages(config.analysis.report_passages)
        .with_model(config.analysis.model.clone()))
}

// ==================== Command Implementations ====================

fn cmd_init(db_path: &Path, force: bool, format: OutputFormat) -> Result<String> {
    if db_path.exists() && !force {
        return Err(CommandError::ExecutionFailed(
            "Database already exists. Use --force to reinitialize.".to_string(),
        )
        .into());
    }

    if force && db_path.exists() {
        std::fs::remove_file(db_path).map_err(|e| {
            CommandError::ExecutionFailed(format!("Failed to remove existing database: {e}"))
        })?;
    }

    let mut storage = SqliteStorage::open(db_path)?;
    storage.init()?;

    Ok(format_message(
        &format!("Initialized steward-rs database at: {}", db_path.display()),
        format,
    ))
}

fn cmd_status(db_path: &Path, format: OutputFormat) -> Result<String> {
    let storage = open_storage(db_path)?;
    let stats = storage.stats()?;
    Ok(format_status(&stats, format))
}

fn cmd_reset(db_path: &Path, yes: bool, format: OutputFormat) -> Result<String> {
    if !yes {
        return Err(CommandError::ExecutionFailed(
            "Use --yes to confirm reset. This will delete all data.".to_string(),
        )
        .into());
    }

    let mut storage = open_storage(db_path)?;
    storage.reset()?;

    Ok(format_message("steward-rs state reset successfully.", format))
}

/// Arguments of `ask` after parsing.
struct AskArgs<'a> {
    question: &'a str,
    session: &'a str,
    collection: Option<&'a str>,
    limit: Option<usize>,
    history: Option<usize>,
    model: Option<&'a str>,
    title: Option<&'a str>,
}

fn cmd_ask(
    db_path: &Path,
    config: &AppConfig,
    args: &AskArgs<'_>,
    format: OutputFormat,
) -> Result<String> {
    let limit = args.limit.unwrap_or(config.chat.num_results);
    if !(1..=MAX_CHAT_RESULTS).contains(&limit) {
        return Err(CommandError::InvalidArgument(format!(
            "--limit must be between 1 and {MAX_CHAT_RESULTS}"
        ))
        .into());
    }
    let window = args.history.unwrap_or(config.chat.history_window);
    if window > MAX_HISTORY_WINDOW {
        return Err(CommandError::InvalidArgument(format!(
            "--history must be at most {MAX_HISTORY_WINDOW}"
        ))
        .into());
    }
    if let Some(model) = args.model {
        config.check_model(model)?;
    }

    let collection =
        config.collection(args.collection.unwrap_or(&config.search.default_collection))?;
    let mut request = ChatRequest::new(args.question, &collection.name, limit, window);
    request.model = args.model.map(ToString::to_string);
    request.filter = args.title.map(|t| Filter::eq(&collection.title_column, t));

    let mut storage = open_storage(db_path)?;
    let pipeline = build_pipeline(config)?;
    let mut conversation = storage.load_conversation(args.session)?;

    let turn = block_on(pipeline.ask(&mut conversation, &request))?;
    storage.append_turn(args.session, &turn)?;

    Ok(format_turn(&turn, format))
}

fn cmd_history(db_path: &Path, session: &str, format: OutputFormat) -> Result<String> {
    let storage = open_storage(db_path)?;
    let conversation = storage.load_conversation(session)?;
    Ok(format_history(&conversation, format))
}

fn cmd_clear_history(db_path: &Path, session: &str, format: OutputFormat) -> Result<String> {
    let mut storage = open_storage(db_path)?;
    let removed = storage.clear_conversation(session)?;
    Ok(format_message(
        &format!("Cleared {removed} turns from session {session}."),
        format,
    ))
}

fn cmd_sessions(db_path: &Path, format: OutputFormat) -> Result<String> {
    let storage = open_storage(db_path)?;
    Ok(format_sessions(&storage.list_sessions()?, format))
}

fn cmd_rubric(config: &AppConfig, format: OutputFormat) -> Result<String> {
    Ok(format_rubric(&config.rubric()?, format))
}

fn cmd_evaluate(
    db_path: &Path,
    config: &AppConfig,
    target: &Target,
    criteria: &[String],
    model: Option<&str>,
    format: OutputFormat,
) -> Result<String> {
    if let Some(model) = model {
        config.check_model(model)?;
    }
    let rubric = config.rubric()?;
    // Rejects unknown keys before any service call.
    rubric.select(criteria)?;
    let collection = config.collection(config.evaluation_collection())?;

    let mut storage = open_storage(db_path)?;
    let mut book = storage.load_book()?;
    let pipeline = build_pipeline(config)?;
    let driver = EvaluationDriver::new(&pipeline, &rubric, collection)
        .with_entities(config.entities.clone())
        .with_max_results(config.evaluation.max_results)
        .with_concurrency(config.evaluation.concurrency)
        .with_model(model.map(ToString::to_string));

    let before = book.len();
    let results = block_on(driver.evaluate_into(&mut book, target, criteria))??;
    for result in &results {
        storage.save_evaluation(result)?;
    }
    let replaced = results.len() - (book.len() - before);

    let mut output = format_evaluations(&target.label(&config.entities), &results, format);
    if format == OutputFormat::Text && replaced > 0 {
        let _ = writeln!(output, "Replaced {replaced} earlier results.");
    }
    Ok(output)
}

fn cmd_clear_evaluations(
    db_path: &Path,
    config: &AppConfig,
    target: &Target,
    format: OutputFormat,
) -> Result<String> {
    let mut storage = open_storage(db_path)?;
    let removed = storage.delete_evaluations(target)?;
    Ok(format_message(
        &format!(
            "Deleted {removed} evaluation results for {}.",
            target.label(&config.entities)
        ),
        format,
    ))
}

fn cmd_report(
    db_path: &Path,
    config: &AppConfig,
    target: &Target,
    output: Option<&Path>,
    format: OutputFormat,
) -> Result<String> {
    let storage = open_storage(db_path)?;
    let results = storage.load_evaluations(Some(target))?;
    let label = target.label(&config.entities);
    if results.is_empty() {
        return Err(CommandError::ExecutionFailed(format!(
            "no stored evaluations for {label}; run evaluate first"
        ))
        .into());
    }

    let text = evaluation_report(&label, &results, Utc::now());
    match output {
        Some(path) => {
            write_file(path, &text)?;
            Ok(format_message(
                &format!("Wrote {} results to {}", results.len(), path.display()),
                format,
            ))
        }
        None => match format {
            OutputFormat::Text => Ok(text),
            OutputFormat::Json => Ok(format_evaluations(&label, &results, format)),
        },
    }
}

fn cmd_summarize(
    db_path: &Path,
    config: &AppConfig,
    reports: &[String],
    format: OutputFormat,
) -> Result<String> {
    let mut storage = open_storage(db_path)?;
    let pipeline = build_pipeline(config)?;
    let analyzer = analyzer(&pipeline, config)?;

    let summaries = block_on(analyzer.summarize_all(reports))?;
    for summary in &summaries {
        storage.save_analysis(summary)?;
    }

    if summaries.is_empty() {
        return Ok(format_message(
            "No passages found for the given reports.",
            format,
        ));
    }
    Ok(format_analyses(&summaries, format))
}

/// Stored summaries restricted to `reports`, or all of them when empty.
fn selected_summaries(storage: &SqliteStorage, reports: &[String]) -> Result<Vec<AnalysisReport>> {
    let summaries = storage.load_analyses(Some(AnalysisKind::Summary))?;
    if reports.is_empty() {
        return Ok(summaries);
    }
    if let Some(missing) = reports
        .iter()
        .find(|r| !summaries.iter().any(|s| &s.subject == *r))
    {
        return Err(CommandError::InvalidArgument(format!(
            "no stored summary for {missing}; run summarize first"
        ))
        .into());
    }
    Ok(summaries
        .into_iter()
        .filter(|s| reports.contains(&s.subject))
        .collect())
}

fn cmd_trend(
    db_path: &Path,
    config: &AppConfig,
    reports: &[String],
    format: OutputFormat,
) -> Result<String> {
    let mut storage = open_storage(db_path)?;
    let summaries = selected_summaries(&storage, reports)?;
    let pipeline = build_pipeline(config)?;
    let analyzer = analyzer(&pipeline, config)?;

    let trend = block_on(analyzer.trend(&summaries))??;
    storage.save_analysis(&trend)?;
    Ok(format_analyses(std::slice::from_ref(&trend), format))
}

fn cmd_gap(
    db_path: &Path,
    config: &AppConfig,
    base: &str,
    reports: &[String],
    format: OutputFormat,
) -> Result<String> {
    let mut storage = open_storage(db_path)?;
    let mut selection = reports.to_vec();
    if !selection.is_empty() && !selection.iter().any(|r| r == base) {
        selection.push(base.to_string());
    }
    let summaries = selected_summaries(&storage, &selection)?;
    let pipeline = build_pipeline(config)?;
    let analyzer = analyzer(&pipeline, config)?;

    let gap = block_on(analyzer.gap(base, &summaries))??;
    storage.save_analysis(&gap)?;
    Ok(format_analyses(std::slice::from_ref(&gap), format))
}

fn cmd_analyses(
    db_path: &Path,
    kind: Option<&str>,
    output: Option<&Path>,
    format: OutputFormat,
) -> Result<String> {
    let kind = kind
        .map(|k| {
            AnalysisKind::parse(k).ok_or_else(|| {
                CommandError::InvalidArgument(format!(
                    "unknown analysis kind: {k} (expected summary, trend or gap)"
                ))
            })
        })
        .transpose()?;

    let storage = open_storage(db_path)?;
    let reports = storage.load_analyses(kind)?;

    match output {
        Some(path) => {
            write_file(path, &analysis_report(&reports, Utc::now()))?;
            Ok(format_message(
                &format!("Wrote {} analyses to {}", reports.len(), path.display()),
                format,
            ))
        }
        None => Ok(format_analyses(&reports, format)),
    }
}

fn cmd_collections(config: &AppConfig, format: OutputFormat) -> Result<String> {
    Ok(format_collections(
        &config.search.collections,
        &config.search.default_collection,
        &config.entities,
        format,
    ))
}

fn cmd_prompts_init(
    config: &AppConfig,
    dir: Option<&Path>,
    format: OutputFormat,
) -> Result<String> {
    let dir: PathBuf = dir
        .map(Path::to_path_buf)
        .or_else(|| config.prompt_dir.clone())
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| CommandError::MissingArgument("--dir".to_string()))?;

    let written = PromptSet::write_defaults(&dir)?;
    Ok(format_message(
        &format!(
            "Wrote {} prompt templates to {}",
            written.len(),
            dir.display()
        ),
        format,
    ))
}
