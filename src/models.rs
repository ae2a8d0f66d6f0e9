//! Data models for the hackathon judge.
//!
//! This module contains the core data structures shared by the judge,
//! the report generator and the CLI: agent reports, verdict tiers,
//! feedback buckets and the final judging result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::{debug, warn};

/// Maximum number of items kept in a single feedback bucket.
pub const MAX_BUCKET_ITEMS: usize = 10;

/// One of the fixed scoring perspectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    /// Repository hygiene: docs, tests, CI, license, structure
    Code,
    /// UI/UX signals: visuals, accessibility, design docs
    Design,
    /// Pitch text quality
    Pitch,
}

impl AgentRole {
    /// Canonical iteration order. `parts` and feedback follow it.
    pub const ALL: [AgentRole; 3] = [AgentRole::Code, AgentRole::Design, AgentRole::Pitch];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Code => "code",
            AgentRole::Design => "design",
            AgentRole::Pitch => "pitch",
        }
    }
}

impl AsRef<str> for AgentRole {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A validated report from one scorer agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReport {
    /// Overall score in `[0, 100]`.
    pub score: f64,
    /// Named sub-criteria. Only used for heuristic feedback.
    #[serde(default)]
    pub subscores: BTreeMap<String, f64>,
    /// Free-text explanation of the score.
    #[serde(default)]
    pub rationale: String,
    /// File paths or URLs backing the rationale.
    #[serde(default)]
    pub evidence: Vec<String>,
}

impl AgentReport {
    /// Create a report with only a score.
    #[allow(dead_code)] // Convenience constructor, used by tests
    pub fn with_score(score: f64) -> Self {
        Self {
            score,
            subscores: BTreeMap::new(),
            rationale: String::new(),
            evidence: Vec::new(),
        }
    }

    /// Validate a dynamically shaped report.
    ///
    /// Returns `None` unless `value` is an object with a numeric `score`.
    /// Optional fields fall back to empty values when absent or mistyped.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let raw_score = obj.get("score")?.as_f64()?;

        let score = raw_score.clamp(0.0, 100.0);
        if score != raw_score {
            warn!("Agent score {} outside [0, 100], clamped to {}", raw_score, score);
        }

        let subscores = obj
            .get("subscores")
            .and_then(Value::as_object)
            .map(|subs| {
                subs.iter()
                    .filter_map(|(name, v)| v.as_f64().map(|n| (name.clone(), n)))
                    .collect()
            })
            .unwrap_or_default();

        let rationale = obj
            .get("rationale")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let evidence = obj
            .get("evidence")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            score,
            subscores,
            rationale,
            evidence,
        })
    }

    /// Subscore value, 0 when the criterion was not reported.
    pub fn subscore(&self, name: &str) -> f64 {
        self.subscores.get(name).copied().unwrap_or(0.0)
    }
}

/// The reports that survived validation, in canonical role order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportSet {
    entries: Vec<(AgentRole, AgentReport)>,
}

impl ReportSet {
    /// Validate every known role in a raw reports document.
    ///
    /// Unknown keys are ignored. Invalid reports are dropped as if the
    /// agent never reported.
    pub fn from_raw(raw: &Map<String, Value>) -> Self {
        let mut entries = Vec::new();

        for role in AgentRole::ALL {
            match raw.get(role.as_str()) {
                Some(value) => match AgentReport::from_value(value) {
                    Some(report) => entries.push((role, report)),
                    None => debug!("Dropping invalid {} report", role),
                },
                None => debug!("No {} report supplied", role),
            }
        }

        Self { entries }
    }

    /// Build a set from already validated reports. Order is normalized.
    #[allow(dead_code)] // Used by tests and embedders
    pub fn from_reports(reports: impl IntoIterator<Item = (AgentRole, AgentReport)>) -> Self {
        let mut entries: Vec<(AgentRole, AgentReport)> = Vec::new();
        for (role, report) in reports {
            entries.retain(|(r, _)| *r != role);
            entries.push((role, report));
        }
        entries.sort_by_key(|(role, _)| *role);
        Self { entries }
    }

    pub fn get(&self, role: AgentRole) -> Option<&AgentReport> {
        self.entries
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, report)| report)
    }

    pub fn roles(&self) -> Vec<AgentRole> {
        self.entries.iter().map(|(role, _)| *role).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(AgentRole, AgentReport)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// JSON object keyed by role, for prompting.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (role, report) in &self.entries {
            map.insert(
                role.as_str().to_string(),
                serde_json::to_value(report).unwrap_or(Value::Null),
            );
        }
        Value::Object(map)
    }
}

/// Qualitative tier derived from the final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "Needs Work")]
    NeedsWork,
    Average,
    Good,
    Excellent,
}

impl Verdict {
    /// Map a final score onto a tier. Lower bounds are inclusive.
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            Verdict::Excellent
        } else if score >= 70.0 {
            Verdict::Good
        } else if score >= 55.0 {
            Verdict::Average
        } else {
            Verdict::NeedsWork
        }
    }

    /// Returns an emoji representation of the verdict.
    pub fn emoji(&self) -> &'static str {
        match self {
            Verdict::Excellent => "🏆",
            Verdict::Good => "🟢",
            Verdict::Average => "🟡",
            Verdict::NeedsWork => "🔴",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Excellent => write!(f, "Excellent"),
            Verdict::Good => write!(f, "Good"),
            Verdict::Average => write!(f, "Average"),
            Verdict::NeedsWork => write!(f, "Needs Work"),
        }
    }
}

/// One agent's contribution to the final score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorePart {
    /// Role of the reporting agent.
    pub agent: AgentRole,
    /// Raw score reported by the agent.
    pub score: f64,
    /// Normalized weight as a percentage, rounded to 2 decimals.
    pub weight: f64,
}

/// Feedback categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedbackBucket {
    CodeImprovements,
    ReadmeImprovements,
    Mistakes,
    QuickWins,
}

impl FeedbackBucket {
    pub const ALL: [FeedbackBucket; 4] = [
        FeedbackBucket::CodeImprovements,
        FeedbackBucket::ReadmeImprovements,
        FeedbackBucket::Mistakes,
        FeedbackBucket::QuickWins,
    ];

    /// Wire name of the bucket.
    pub fn key(&self) -> &'static str {
        match self {
            FeedbackBucket::CodeImprovements => "code_improvements",
            FeedbackBucket::ReadmeImprovements => "readme_improvements",
            FeedbackBucket::Mistakes => "mistakes",
            FeedbackBucket::QuickWins => "quick_wins",
        }
    }

    /// Human-readable heading.
    pub fn title(&self) -> &'static str {
        match self {
            FeedbackBucket::CodeImprovements => "Code Improvements",
            FeedbackBucket::ReadmeImprovements => "README Improvements",
            FeedbackBucket::Mistakes => "Mistakes",
            FeedbackBucket::QuickWins => "Quick Wins",
        }
    }
}

/// Bucketed feedback.
///
/// Items are trimmed, non-empty, unique within their bucket and capped at
/// [`MAX_BUCKET_ITEMS`]. Insertion order is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackBuckets {
    #[serde(default)]
    pub code_improvements: Vec<String>,
    #[serde(default)]
    pub readme_improvements: Vec<String>,
    #[serde(default)]
    pub mistakes: Vec<String>,
    #[serde(default)]
    pub quick_wins: Vec<String>,
}

impl FeedbackBuckets {
    pub fn bucket(&self, bucket: FeedbackBucket) -> &[String] {
        match bucket {
            FeedbackBucket::CodeImprovements => &self.code_improvements,
            FeedbackBucket::ReadmeImprovements => &self.readme_improvements,
            FeedbackBucket::Mistakes => &self.mistakes,
            FeedbackBucket::QuickWins => &self.quick_wins,
        }
    }

    fn bucket_mut(&mut self, bucket: FeedbackBucket) -> &mut Vec<String> {
        match bucket {
            FeedbackBucket::CodeImprovements => &mut self.code_improvements,
            FeedbackBucket::ReadmeImprovements => &mut self.readme_improvements,
            FeedbackBucket::Mistakes => &mut self.mistakes,
            FeedbackBucket::QuickWins => &mut self.quick_wins,
        }
    }

    /// Append items not already present, stopping at the bucket cap.
    pub fn extend_unique<I, S>(&mut self, bucket: FeedbackBucket, items: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let dst = self.bucket_mut(bucket);
        let mut seen: HashSet<String> = dst.iter().map(|s| s.trim().to_string()).collect();

        for item in items {
            if dst.len() >= MAX_BUCKET_ITEMS {
                break;
            }
            let text = item.as_ref().trim();
            if !text.is_empty() && seen.insert(text.to_string()) {
                dst.push(text.to_string());
            }
        }
    }

    /// True when every bucket is empty.
    pub fn is_empty(&self) -> bool {
        FeedbackBucket::ALL
            .iter()
            .all(|b| self.bucket(*b).is_empty())
    }

    /// Total number of items across buckets.
    pub fn total(&self) -> usize {
        FeedbackBucket::ALL
            .iter()
            .map(|b| self.bucket(*b).len())
            .sum()
    }

    /// Single-list view: buckets concatenated in canonical order with
    /// cross-bucket duplicates removed.
    pub fn flatten(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        FeedbackBucket::ALL
            .iter()
            .flat_map(|b| self.bucket(*b).iter())
            .filter(|item| seen.insert(item.as_str()))
            .cloned()
            .collect()
    }
}

/// The judge's verdict for one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeResult {
    /// Weighted score rounded to 2 decimals, in `[0, 100]`.
    pub final_score: f64,
    /// Tier derived from `final_score`.
    pub verdict: Verdict,
    /// Per-agent breakdown, one entry per valid report.
    pub parts: Vec<ScorePart>,
    /// Merged feedback.
    pub feedback: FeedbackBuckets,
}

/// Metadata about a judging run, used by the Markdown report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Where the agent reports came from (file path or "stdin").
    pub source: String,
    /// Date and time of the judging run.
    pub judged_at: DateTime<Utc>,
    /// Model used for generative feedback, if one was configured.
    pub model_used: Option<String>,
    /// Whether generative feedback made it into the result.
    pub generative_feedback: bool,
    /// The weight string in effect.
    pub weights: String,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
}

/// A judging result together with its run metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeReport {
    pub metadata: ReportMetadata,
    pub result: JudgeResult,
}
