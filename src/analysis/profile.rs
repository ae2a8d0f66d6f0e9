//! Profile aggregation and statistics.
//!
//! Summarizes code scores across several repositories of one user or
//! organization: average, median and a ranked list.

use crate::judge::round2;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// One scored repository from a profile run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileEntry {
    /// Repository name.
    #[serde(default)]
    pub name: String,
    /// Repository URL.
    #[serde(default)]
    pub url: String,
    /// Score, absent when the scorer produced nothing numeric.
    #[serde(default)]
    pub score: Option<f64>,
    /// Scorer rationale or error message.
    #[serde(default)]
    pub rationale: String,
}

impl ProfileEntry {
    /// Lenient conversion from a raw record. Non-objects yield `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let text = |key: &str| {
            obj.get(key)
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string()
        };

        Some(Self {
            name: text("name"),
            url: text("url"),
            score: obj.get("score").and_then(Value::as_f64),
            rationale: text("rationale"),
        })
    }
}

/// Entry in the ranked list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedRepo {
    pub name: String,
    pub url: String,
    pub score: f64,
}

/// Summary statistics over a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    /// Number of records, scored or not.
    pub count: usize,
    /// Mean score, rounded to 2 decimals.
    pub avg: f64,
    /// Median score, rounded to 2 decimals.
    pub median: f64,
    /// Scored repositories, best first.
    pub top: Vec<RankedRepo>,
}

/// Parse profile records from a JSON array, or from the `results` array of
/// a full profile document.
pub fn parse_profile(value: &Value) -> Vec<ProfileEntry> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(obj) => match obj.get("results") {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    items
        .iter()
        .filter_map(|item| {
            let entry = ProfileEntry::from_value(item);
            if entry.is_none() {
                debug!("Skipping non-object profile record");
            }
            entry
        })
        .collect()
}

/// Median of a list, 0 when empty. Even counts average the middle pair.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

/// Compute the profile summary.
pub fn summarize_profile(entries: &[ProfileEntry]) -> ProfileSummary {
    let scores: Vec<f64> = entries.iter().filter_map(|e| e.score).collect();

    let avg = if scores.is_empty() {
        0.0
    } else {
        round2(scores.iter().sum::<f64>() / scores.len() as f64)
    };

    let mut top: Vec<RankedRepo> = entries
        .iter()
        .filter_map(|e| {
            e.score.map(|score| RankedRepo {
                name: e.name.clone(),
                url: e.url.clone(),
                score,
            })
        })
        .collect();

    // Stable sort keeps input order among ties
    top.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    ProfileSummary {
        count: entries.len(),
        avg,
        median: round2(median(&scores)),
        top,
    }
}
