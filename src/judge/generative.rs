//! Generative feedback from a text-generation backend.
//!
//! The backend is treated as unreliable: whatever it returns is unwrapped
//! from Markdown fences, parsed and validated before any of it reaches a
//! result. Nothing here affects the score.

use crate::judge::weights::NormalizedWeights;
use crate::models::{AgentRole, FeedbackBucket, FeedbackBuckets, ReportSet};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Errors from a generative backend.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Cannot connect to Ollama at {0}")]
    Connect(String),

    #[error("Ollama API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to send request: {0}")]
    Transport(String),

    #[error("Failed to parse Ollama response: {0}")]
    Decode(String),
}

/// Everything a generator gets to see.
#[derive(Debug, Clone)]
pub struct FeedbackRequest {
    /// Surviving reports keyed by role.
    pub reports: Value,
    /// Normalized weights keyed by role.
    pub weights: Value,
}

impl FeedbackRequest {
    pub fn new(reports: &ReportSet, weights: &NormalizedWeights<AgentRole>) -> Self {
        Self {
            reports: reports.to_json(),
            weights: weights.to_json(),
        }
    }

    /// The user message sent alongside the system prompt.
    pub fn prompt(&self) -> String {
        let mut prompt = String::new();
        prompt.push_str("You are given agent reports for code/design/pitch and their weights.\n");
        prompt.push_str("Return STRICT JSON with this schema ONLY (no prose):\n");
        prompt.push_str(
            r#"{"feedback": {"code_improvements": [string], "readme_improvements": [string], "mistakes": [string], "quick_wins": [string]}}"#,
        );
        prompt.push_str("\n\nReports JSON:\n");
        prompt.push_str(&self.reports.to_string());
        prompt.push_str("\n\nWeights JSON:\n");
        prompt.push_str(&self.weights.to_string());
        prompt.push('\n');
        prompt
    }
}

/// A text-generation collaborator producing raw feedback text.
#[async_trait]
pub trait FeedbackGenerator: Send + Sync {
    /// Short name for logs and report metadata.
    fn name(&self) -> String;

    /// Produce raw text for the request. One attempt, no retries.
    async fn generate(&self, request: &FeedbackRequest) -> Result<String, GenerationError>;
}

/// Configuration for the Ollama-backed generator.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub ollama_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            model_name: "llama3.2:latest".to_string(),
            temperature: 0.0,
            timeout_seconds: 15,
        }
    }
}

/// Message in the chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    format: String,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

/// Generator backed by a local Ollama server.
pub struct OllamaFeedbackGenerator {
    config: OllamaConfig,
    http_client: reqwest::Client,
}

impl OllamaFeedbackGenerator {
    pub fn new(config: OllamaConfig) -> Result<Self, GenerationError> {
        info!(
            "Initializing feedback generator with model {} at {}",
            config.model_name, config.ollama_url
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn build_request(&self, request: &FeedbackRequest) -> OllamaChatRequest {
        OllamaChatRequest {
            model: self.config.model_name.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: JUDGE_SYSTEM_PROMPT.trim().to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.prompt(),
                },
            ],
            stream: false,
            format: "json".to_string(),
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        }
    }
}

#[async_trait]
impl FeedbackGenerator for OllamaFeedbackGenerator {
    fn name(&self) -> String {
        self.config.model_name.clone()
    }

    async fn generate(&self, request: &FeedbackRequest) -> Result<String, GenerationError> {
        let url = format!("{}/api/chat", self.config.ollama_url.trim_end_matches('/'));
        let body = self.build_request(request);

        debug!("Sending feedback request to {}", url);

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout(self.config.timeout_seconds)
                } else if e.is_connect() {
                    GenerationError::Connect(self.config.ollama_url.clone())
                } else {
                    GenerationError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api { status, body });
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Decode(e.to_string()))?;

        Ok(chat_response.message.content)
    }
}

/// Strip Markdown code fences around a payload.
///
/// Takes the text between the first and last fence. An optional language
/// tag on the opening fence (```json) is dropped. Unfenced text is returned
/// trimmed.
pub fn unwrap_fenced(text: &str) -> &str {
    let text = text.trim();

    let (Some(start), Some(end)) = (text.find("```"), text.rfind("```")) else {
        return text;
    };
    if end <= start {
        return text;
    }

    let inner = &text[start + 3..end];
    let tag_len = inner
        .find(|c: char| !c.is_ascii_alphanumeric() && c != '_' && c != '-')
        .unwrap_or(inner.len());

    inner[tag_len..].trim()
}

/// Validate generator output into feedback buckets.
///
/// Plain JSON is tried first, so backticks inside item text survive; fenced
/// output is unwrapped otherwise. Accepts `{"feedback": {...}}` or the
/// bucket object itself. Non-string items are dropped. Returns `None` for
/// unparsable text, a wrong shape, or a payload whose buckets are all empty.
pub fn parse_generated_feedback(text: &str) -> Option<FeedbackBuckets> {
    let parsed: Value = match serde_json::from_str(text.trim()) {
        Ok(v) => v,
        Err(_) => match serde_json::from_str(unwrap_fenced(text)) {
            Ok(v) => v,
            Err(e) => {
                debug!("Generated feedback is not valid JSON: {}", e);
                return None;
            }
        },
    };

    let root = parsed.as_object()?;
    let buckets = match root.get("feedback") {
        Some(Value::Object(fb)) => fb,
        Some(_) => return None,
        None => root,
    };

    let mut feedback = FeedbackBuckets::default();
    for bucket in FeedbackBucket::ALL {
        if let Some(Value::Array(items)) = buckets.get(bucket.key()) {
            feedback.extend_unique(bucket, items.iter().filter_map(Value::as_str));
        }
    }

    if feedback.is_empty() {
        debug!("Generated feedback has no usable items");
        return None;
    }

    Some(feedback)
}

/// System prompt for the feedback request
const JUDGE_SYSTEM_PROMPT: &str = r#"
You are the Head Judge of a software hackathon. You receive up to three agent
reports: CODE, DESIGN and PITCH. Each report may include a score (0-100),
subscores (named criteria), a short rationale and evidence (file paths or URLs).

Your job is to produce actionable, repo-specific feedback.

Rules:
- Output ONLY strict JSON. No Markdown, no prose before or after.
- Use short, imperative bullets. Do not repeat a point across sections.
- Return an empty array for a section with nothing meaningful.
- Do not invent files or features the reports do not imply.
- The caller computes the score and verdict; focus on feedback.

Sections:
- code_improvements: tests, CI, typing, refactors, security.
- readme_improvements: quickstart, env vars, architecture diagram, screenshots, badges.
- mistakes: unambiguous missing or broken items (no LICENSE, no CI workflows).
- quick_wins: small, high-impact changes of one or two hours.

Keep each list to at most 10 items.
"#;
