//! HackJudge - weighted multi-agent judge for hackathon submissions
//!
//! A CLI tool that combines code, design and pitch agent reports into a
//! single score, verdict and bucketed feedback, optionally enriched by a
//! local Ollama model.
//!
//! Exit codes:
//!   0 - Success (score at or above --fail-below, or no --fail-below set)
//!   1 - Runtime error (unreadable input, bad config, etc.)
//!   2 - Final score below the --fail-below threshold

mod analysis;
mod cli;
mod config;
mod judge;
mod models;
mod report;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use judge::{FeedbackGenerator, Judge, OllamaFeedbackGenerator};
use models::{JudgeReport, ReportMetadata};
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("HackJudge v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let outcome = match args.profile.clone() {
        Some(path) => run_profile(&args, &path),
        None => run_judge(args).await,
    };

    match outcome {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Judging failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .hackjudge.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize weights, thresholds and the feedback model.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so a report printed to stdout stays clean.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the judging workflow. Returns exit code (0 or 2).
async fn run_judge(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let source = args
        .reports
        .clone()
        .unwrap_or_else(|| PathBuf::from("-"));

    // Step 1: Read the agent reports
    status(&args, format!("📥 Reading agent reports: {}", describe_input(&source)));
    let document = read_json_input(&source)?;
    let raw = match document {
        Value::Object(map) => map,
        other => bail!(
            "Agent reports must be a JSON object keyed by role, got {}",
            json_kind(&other)
        ),
    };

    // Step 2: Build the judge
    let generator = build_generator(&config);
    if let Some(ref g) = generator {
        status(&args, format!("🤖 Feedback model: {}", g.name()));
        status(&args, format!("   Ollama: {}", config.model.ollama_url));
        status(&args, format!("   Timeout: {}s", config.model.timeout_seconds));
    }
    let judge = Judge::new(config.judge_config(), generator);

    // Step 3: Score and collect feedback
    status(&args, "⚖️  Judging...".to_string());
    let outcome = judge.judge_detailed(&raw, None).await;

    // Step 4: Build the report
    let duration = start_time.elapsed().as_secs_f64();
    let report = JudgeReport {
        metadata: ReportMetadata {
            source: describe_input(&source),
            judged_at: Utc::now(),
            model_used: judge.generator_name(),
            generative_feedback: outcome.generative_applied,
            weights: judge.config().default_weights.to_string(),
            duration_seconds: duration,
        },
        result: outcome.result,
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report.result)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report, &config.report),
    };
    write_output(args.output.as_deref(), &output)?;

    // Print summary
    let result = &report.result;
    status(&args, "\n📊 Judging Summary:".to_string());
    status(
        &args,
        format!(
            "   {} {} ({:.2} / 100)",
            result.verdict.emoji(),
            result.verdict,
            result.final_score
        ),
    );
    for part in &result.parts {
        status(
            &args,
            format!("   - {}: {:.2} (weight {:.2}%)", part.agent, part.score, part.weight),
        );
    }
    status(
        &args,
        format!("   Feedback items: {}", result.feedback.total()),
    );
    status(&args, format!("   Duration: {:.1}s", duration));
    if let Some(ref path) = args.output {
        status(
            &args,
            format!("\n✅ Judging complete! Report saved to: {}", path.display()),
        );
    }

    // Check --fail-below threshold
    if let Some(threshold) = args.fail_below {
        if result.final_score < threshold {
            eprintln!(
                "\n⛔ Final score {:.2} is below {:.2}. Failing (exit code 2).",
                result.final_score, threshold
            );
            return Ok(2);
        }
    }

    Ok(0)
}

/// Handle --profile: summarize per-repository scores.
fn run_profile(args: &Args, path: &Path) -> Result<i32> {
    status(args, format!("📥 Reading profile: {}", describe_input(path)));

    let document = read_json_input(path)?;
    let entries = analysis::parse_profile(&document);
    if entries.is_empty() {
        warn!("No profile records found in {}", describe_input(path));
    }

    let summary = analysis::summarize_profile(&entries);
    info!(
        "Profile: {} repositories, avg {:.2}, median {:.2}",
        summary.count, summary.avg, summary.median
    );

    let output = match args.format {
        OutputFormat::Json => report::generate_profile_json(&summary)?,
        OutputFormat::Markdown => report::generate_profile_markdown(&summary),
    };
    write_output(args.output.as_deref(), &output)?;

    if let Some(ref path) = args.output {
        status(
            args,
            format!("\n✅ Profile summary saved to: {}", path.display()),
        );
    }

    Ok(0)
}

/// Build the generative backend when enabled. Construction failures
/// degrade to heuristic feedback.
fn build_generator(config: &Config) -> Option<Arc<dyn FeedbackGenerator>> {
    if !config.model.enabled {
        debug!("Generative feedback disabled");
        return None;
    }

    match OllamaFeedbackGenerator::new(config.ollama_config()) {
        Ok(generator) => Some(Arc::new(generator)),
        Err(e) => {
            warn!("Feedback model unavailable, using heuristics only: {}", e);
            None
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

/// Read a JSON document from a file, or from stdin when the path is `-`.
fn read_json_input(path: &Path) -> Result<Value> {
    let content = if is_stdin(path) {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read JSON from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };

    serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in {}", describe_input(path)))
}

/// Write the rendered report to a file, or to stdout.
fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, content)
            .with_context(|| format!("Failed to write report to {}", path.display())),
        None => {
            print!("{}", content);
            Ok(())
        }
    }
}

/// Progress line on stderr, suppressed by --quiet.
fn status(args: &Args, line: String) {
    if !args.quiet {
        eprintln!("{}", line);
    }
}

fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn describe_input(path: &Path) -> String {
    if is_stdin(path) {
        "<stdin>".to_string()
    } else {
        path.display().to_string()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
