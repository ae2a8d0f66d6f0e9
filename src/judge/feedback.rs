//! Deterministic feedback derived from agent subscores.
//!
//! Heuristic feedback is always computed. It is the whole answer when no
//! generative feedback is available and the gap-filler when it is.

use crate::models::{AgentRole, FeedbackBucket, FeedbackBuckets, ReportSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Thresholds deciding when a subscore counts as low.
///
/// A criterion is low when `value <= low_ratio * max`. Criteria without a
/// configured maximum are assumed to be on a 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackThresholds {
    /// Fraction of the maximum at or below which a criterion is low.
    #[serde(default = "default_low_ratio")]
    pub low_ratio: f64,

    /// Maximum attainable value per criterion name.
    #[serde(default)]
    pub max: BTreeMap<String, f64>,
}

impl Default for FeedbackThresholds {
    fn default() -> Self {
        Self {
            low_ratio: default_low_ratio(),
            max: BTreeMap::new(),
        }
    }
}

fn default_low_ratio() -> f64 {
    0.4
}

const DEFAULT_MAX: f64 = 100.0;

impl FeedbackThresholds {
    fn max_for(&self, criterion: &str) -> f64 {
        self.max.get(criterion).copied().unwrap_or(DEFAULT_MAX)
    }

    /// Whether `value` is low for `criterion`.
    pub fn is_low(&self, criterion: &str, value: f64) -> bool {
        value <= self.low_ratio * self.max_for(criterion)
    }
}

/// Build feedback from subscore thresholds across the surviving reports.
///
/// Missing reports and missing subscores count as 0, so an empty set yields
/// generic guidance in every bucket.
pub fn heuristic_feedback(reports: &ReportSet, thresholds: &FeedbackThresholds) -> FeedbackBuckets {
    let code = |name: &str| {
        reports
            .get(AgentRole::Code)
            .map(|r| r.subscore(name))
            .unwrap_or(0.0)
    };
    let design = |name: &str| {
        reports
            .get(AgentRole::Design)
            .map(|r| r.subscore(name))
            .unwrap_or(0.0)
    };
    let pitch_score = reports
        .get(AgentRole::Pitch)
        .map(|r| r.score)
        .unwrap_or(0.0);

    let mut fb = FeedbackBuckets::default();

    // Code and repository hygiene
    if thresholds.is_low("testing", code("testing")) {
        fb.extend_unique(
            FeedbackBucket::CodeImprovements,
            [
                "Add a minimal automated test suite covering the critical paths; aim for 60% coverage as a first milestone.",
                "Introduce fixtures or factories for the data and API layers so tests stay small and stable.",
            ],
        );
        fb.extend_unique(
            FeedbackBucket::QuickWins,
            ["Add a smoke test that exercises the main entry point and run it in CI."],
        );
    }

    if thresholds.is_low("ci_cd", code("ci_cd")) {
        fb.extend_unique(
            FeedbackBucket::CodeImprovements,
            ["Set up CI (for example GitHub Actions) that runs lint, type checks and tests on every pull request."],
        );
        fb.extend_unique(
            FeedbackBucket::QuickWins,
            ["Commit a `.github/workflows/ci.yml` that builds the project and runs the tests."],
        );
        fb.extend_unique(FeedbackBucket::Mistakes, ["CI workflow not detected or failing."]);
    }

    if code("license") <= 0.0 {
        fb.extend_unique(
            FeedbackBucket::Mistakes,
            ["License file missing; add a standard LICENSE (MIT or Apache-2.0)."],
        );
        fb.extend_unique(
            FeedbackBucket::QuickWins,
            ["Add a LICENSE file at the repository root."],
        );
    }

    if thresholds.is_low("structure", code("structure")) {
        fb.extend_unique(
            FeedbackBucket::CodeImprovements,
            [
                "Split large modules into cohesive packages and keep I/O separate from business logic.",
                "Add type annotations to public functions and enforce them with a type checker in CI.",
            ],
        );
    }

    // Documentation, README and pitch overlap
    if thresholds.is_low("documentation", code("documentation"))
        || thresholds.is_low("docs", design("docs"))
        || thresholds.is_low("pitch", pitch_score)
    {
        fb.extend_unique(
            FeedbackBucket::ReadmeImprovements,
            [
                "Write a Quickstart with the exact commands to clone, install dependencies and run the project.",
                "Add an architecture diagram of the request flow and components, plus a feature checklist.",
                "Include screenshots, GIFs or example requests that demo the key features.",
                "Document configuration with a `.env.example` and explain every required API key or token.",
            ],
        );
        fb.extend_unique(
            FeedbackBucket::QuickWins,
            [
                "Add status badges (build, coverage, license) to the README header.",
                "Link a live demo or a recorded walkthrough from the README.",
            ],
        );
    }

    // Design and accessibility
    if thresholds.is_low("visuals", design("visuals")) {
        fb.extend_unique(
            FeedbackBucket::ReadmeImprovements,
            ["Add UI screenshots (light and dark themes if supported) and annotate the key flows."],
        );
    }

    if thresholds.is_low("accessibility", design("accessibility")) {
        fb.extend_unique(
            FeedbackBucket::CodeImprovements,
            ["Adopt basic accessibility: semantic HTML, aria-labels, visible focus states and keyboard navigation."],
        );
    }

    fb
}

/// Merge generative and heuristic feedback.
///
/// Generative items come first in each bucket; heuristic items fill the
/// remaining slots when not already present.
pub fn merge_feedback(generative: &FeedbackBuckets, heuristic: &FeedbackBuckets) -> FeedbackBuckets {
    let mut merged = FeedbackBuckets::default();

    for bucket in FeedbackBucket::ALL {
        merged.extend_unique(bucket, generative.bucket(bucket));
        merged.extend_unique(bucket, heuristic.bucket(bucket));
    }

    merged
}
