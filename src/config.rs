//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.hackjudge.toml` files.

use crate::judge::{FeedbackThresholds, JudgeConfig, OllamaConfig, WeightConfig, DEFAULT_WEIGHTS};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".hackjudge.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Scoring settings.
    #[serde(default)]
    pub judge: JudgeSettings,

    /// Generative feedback model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Heuristic feedback thresholds.
    #[serde(default)]
    pub feedback: FeedbackThresholds,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// Scoring settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeSettings {
    /// Default weight string, `role:weight,...`.
    #[serde(default = "default_weights")]
    pub weights: String,
}

impl Default for JudgeSettings {
    fn default() -> Self {
        Self {
            weights: default_weights(),
        }
    }
}

fn default_weights() -> String {
    DEFAULT_WEIGHTS.to_string()
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Ask the model for feedback. Off by default; heuristics always run.
    #[serde(default)]
    pub enabled: bool,

    /// Model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Temperature for generation.
    #[serde(default)]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: default_model(),
            ollama_url: default_ollama_url(),
            temperature: 0.0,
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_timeout() -> u64 {
    15
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Include the consolidated checklist in Markdown reports.
    #[serde(default = "default_true")]
    pub include_checklist: bool,

    /// Include the metadata section in Markdown reports.
    #[serde(default = "default_true")]
    pub include_metadata: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_checklist: true,
            include_metadata: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load configuration from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref weights) = args.weights {
            self.judge.weights = weights.clone();
        }

        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref url) = args.ollama_url {
            self.model.ollama_url = url.clone();
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }

        // Generative feedback toggles
        if args.llm {
            self.model.enabled = true;
        } else if args.no_llm {
            self.model.enabled = false;
        }
    }

    /// Settings injected into the judge.
    pub fn judge_config(&self) -> JudgeConfig {
        JudgeConfig {
            default_weights: WeightConfig::parse(&self.judge.weights),
            thresholds: self.feedback.clone(),
            generation_timeout: Duration::from_secs(self.model.timeout_seconds),
        }
    }

    /// Settings for the Ollama feedback generator.
    pub fn ollama_config(&self) -> OllamaConfig {
        OllamaConfig {
            ollama_url: self.model.ollama_url.clone(),
            model_name: self.model.name.clone(),
            temperature: self.model.temperature,
            timeout_seconds: self.model.timeout_seconds,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.judge.weights, "code:0.6,design:0.2,pitch:0.2");
        assert!(!config.model.enabled);
        assert_eq!(config.model.timeout_seconds, 15);
        assert_eq!(config.feedback.low_ratio, 0.4);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[judge]
weights = "code:0.5,design:0.25,pitch:0.25"

[model]
enabled = true
name = "qwen2.5:7b"
timeout_seconds = 10

[feedback]
low_ratio = 0.5

[feedback.max]
testing = 20
ci_cd = 15
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.judge.weights, "code:0.5,design:0.25,pitch:0.25");
        assert!(config.model.enabled);
        assert_eq!(config.model.name, "qwen2.5:7b");
        assert_eq!(config.model.ollama_url, "http://localhost:11434");
        assert_eq!(config.feedback.low_ratio, 0.5);
        assert_eq!(config.feedback.max.get("testing"), Some(&20.0));

        let judge = config.judge_config();
        assert_eq!(judge.default_weights.get("code"), Some(0.5));
        assert_eq!(judge.generation_timeout, Duration::from_secs(10));
        assert!(judge.thresholds.is_low("testing", 10.0));
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[judge]"));
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[feedback]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.judge.weights, DEFAULT_WEIGHTS);
    }

    #[test]
    fn test_load_from_dir() {
        let temp_dir = TempDir::new().unwrap();
        assert!(Config::load_from_dir(temp_dir.path()).unwrap().is_none());

        std::fs::write(
            temp_dir.path().join(CONFIG_FILE_NAME),
            "[judge]\nweights = \"code:1\"\n",
        )
        .unwrap();
        let config = Config::load_from_dir(temp_dir.path()).unwrap().unwrap();
        assert_eq!(config.judge.weights, "code:1");
    }

    #[test]
    fn test_load_rejects_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[judge\nweights = 3").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
