//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// HackJudge - weighted multi-agent judge for hackathon submissions
///
/// Combines code, design and pitch agent reports into one deterministic
/// score and verdict, with bucketed feedback. Generative feedback from a
/// local Ollama model is optional and never affects the score.
///
/// Examples:
///   hackjudge --reports agents.json
///   hackjudge --reports agents.json --weights code:0.5,design:0.3,pitch:0.2
///   scorer | hackjudge --reports - --format json
///   hackjudge --reports agents.json --llm --model llama3.2:latest
///   hackjudge --profile repos.json
///   hackjudge --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// JSON file with agent reports keyed by role (`-` for stdin)
    ///
    /// Expected keys: code, design, pitch. Each report carries a numeric
    /// score and optional subscores, rationale and evidence.
    #[arg(
        short,
        long,
        value_name = "FILE",
        required_unless_present_any = ["init_config", "profile"],
        conflicts_with = "profile"
    )]
    pub reports: Option<PathBuf>,

    /// JSON file with per-repository scores to summarize (`-` for stdin)
    #[arg(long, value_name = "FILE")]
    pub profile: Option<PathBuf>,

    /// Weight override, e.g. code:0.6,design:0.2,pitch:0.2
    ///
    /// Malformed tokens are ignored. Can also be set via JUDGE_WEIGHTS
    /// or the [judge] section of .hackjudge.toml.
    #[arg(short, long, value_name = "WEIGHTS", env = "JUDGE_WEIGHTS")]
    pub weights: Option<String>,

    /// Ask the model for generative feedback
    #[arg(long, conflicts_with = "no_llm")]
    pub llm: bool,

    /// Heuristic feedback only, even if the config enables the model
    #[arg(long, conflicts_with = "llm")]
    pub no_llm: bool,

    /// Ollama model used for generative feedback
    #[arg(short, long, env = "HACKJUDGE_MODEL")]
    pub model: Option<String>,

    /// Ollama API endpoint URL
    #[arg(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Timeout for the feedback request in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Temperature for LLM responses (0.0 - 1.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Output file path for the report (stdout if omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .hackjudge.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Exit with code 2 when the final score is below this value
    ///
    /// Useful for CI pipelines.
    #[arg(long, value_name = "SCORE")]
    pub fail_below: Option<f64>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .hackjudge.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.reports.is_none() && self.profile.is_none() {
            return Err("One of --reports or --profile is required".to_string());
        }

        if let Some(ref url) = self.ollama_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 1.0".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(threshold) = self.fail_below {
            if !(0.0..=100.0).contains(&threshold) {
                return Err("--fail-below must be between 0 and 100".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        for path in [&self.reports, &self.profile].into_iter().flatten() {
            if path.as_os_str() != "-" && !path.is_file() {
                return Err(format!("Input file does not exist: {}", path.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
