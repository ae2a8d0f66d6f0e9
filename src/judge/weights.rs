//! Weight configuration parsing and normalization.
//!
//! Weight overrides are never an error: malformed tokens are skipped,
//! negative weights clamp to zero and a degenerate configuration falls
//! back to a uniform distribution.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Weight string used when nothing else is configured.
pub const DEFAULT_WEIGHTS: &str = "code:0.6,design:0.2,pitch:0.2";

/// Sparse mapping from role name to weight. Missing roles weigh 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightConfig {
    weights: BTreeMap<String, f64>,
}

impl WeightConfig {
    /// Parse `role:weight,role:weight,...`.
    ///
    /// Tokens without a colon, with an empty role, or with a weight that is
    /// not a finite number are skipped.
    pub fn parse(input: &str) -> Self {
        let mut weights = BTreeMap::new();

        for token in input.split(',') {
            let Some((role, value)) = token.split_once(':') else {
                if !token.trim().is_empty() {
                    debug!("Skipping weight token without ':': {:?}", token);
                }
                continue;
            };

            let role = role.trim();
            if role.is_empty() {
                debug!("Skipping weight token with empty role: {:?}", token);
                continue;
            }

            match value.trim().parse::<f64>() {
                Ok(weight) if weight.is_finite() => {
                    weights.insert(role.to_string(), weight);
                }
                _ => debug!("Skipping unparsable weight token: {:?}", token),
            }
        }

        Self { weights }
    }

    /// Configured weight for a role, if any.
    pub fn get(&self, role: &str) -> Option<f64> {
        self.weights.get(role).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self::parse(DEFAULT_WEIGHTS)
    }
}

impl FromStr for WeightConfig {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for WeightConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<String> = self
            .weights
            .iter()
            .map(|(role, weight)| format!("{}:{}", role, weight))
            .collect();
        write!(f, "{}", tokens.join(","))
    }
}

/// A probability distribution over the roles that reported.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedWeights<R> {
    entries: Vec<(R, f64)>,
}

impl<R: AsRef<str>> NormalizedWeights<R> {
    /// Weight for a role, 0 when the role is not part of the distribution.
    pub fn get(&self, role: &str) -> f64 {
        self.entries
            .iter()
            .find(|(r, _)| r.as_ref() == role)
            .map(|(_, w)| *w)
            .unwrap_or(0.0)
    }

    #[allow(dead_code)] // Used by tests
    pub fn iter(&self) -> impl Iterator<Item = &(R, f64)> {
        self.entries.iter()
    }

    #[allow(dead_code)] // Used by tests
    pub fn sum(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    #[allow(dead_code)] // Used by tests
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)] // Used by tests
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// JSON object keyed by role name, for prompting.
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .entries
            .iter()
            .map(|(role, w)| (role.as_ref().to_string(), serde_json::json!(w)))
            .collect();
        serde_json::Value::Object(map)
    }
}

/// Normalize `config` over exactly the `available` roles.
///
/// Each role's weight is `max(0, configured)`; the result is those weights
/// divided by their sum, or `1/N` for every role when all of them are 0.
/// Order follows `available`.
pub fn normalize_weights<R>(available: &[R], config: &WeightConfig) -> NormalizedWeights<R>
where
    R: AsRef<str> + Clone,
{
    let clamped: Vec<(R, f64)> = available
        .iter()
        .map(|role| {
            let weight = config
                .get(role.as_ref())
                .filter(|w| w.is_finite())
                .unwrap_or(0.0)
                .max(0.0);
            (role.clone(), weight)
        })
        .collect();

    // Scale by the largest weight first so the sum cannot overflow
    let largest = clamped.iter().map(|(_, w)| *w).fold(0.0, f64::max);

    let entries = if largest > 0.0 {
        let total: f64 = clamped.iter().map(|(_, w)| w / largest).sum();
        clamped
            .into_iter()
            .map(|(role, w)| (role, (w / largest) / total))
            .collect()
    } else {
        if !clamped.is_empty() {
            debug!(
                "Weights sum to 0 over {} roles, using uniform distribution",
                clamped.len()
            );
        }
        let uniform = 1.0 / clamped.len().max(1) as f64;
        clamped
            .into_iter()
            .map(|(role, _)| (role, uniform))
            .collect()
    };

    NormalizedWeights { entries }
}
