//! Aggregation of agent reports into a single verdict.
//!
//! The score path is deterministic. Generative feedback is a separate,
//! best-effort stage whose failures fall back to heuristic feedback.

pub mod feedback;
pub mod generative;
pub mod weights;

pub use feedback::{heuristic_feedback, merge_feedback, FeedbackThresholds};
pub use generative::{
    parse_generated_feedback, FeedbackGenerator, FeedbackRequest, GenerationError, OllamaConfig,
    OllamaFeedbackGenerator,
};
pub use weights::{normalize_weights, NormalizedWeights, WeightConfig, DEFAULT_WEIGHTS};

use crate::models::{AgentRole, FeedbackBuckets, JudgeResult, ReportSet, ScorePart, Verdict};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Read-only settings injected into a [`Judge`].
#[derive(Debug, Clone)]
pub struct JudgeConfig {
    /// Weights used when a request carries no override.
    pub default_weights: WeightConfig,
    /// Subscore thresholds for heuristic feedback.
    pub thresholds: FeedbackThresholds,
    /// Upper bound on the generative feedback call.
    pub generation_timeout: Duration,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            default_weights: WeightConfig::default(),
            thresholds: FeedbackThresholds::default(),
            generation_timeout: Duration::from_secs(15),
        }
    }
}

/// Result plus how the feedback was produced.
#[derive(Debug, Clone)]
pub struct JudgeOutcome {
    pub result: JudgeResult,
    /// True when generative feedback was obtained and merged.
    pub generative_applied: bool,
}

/// The aggregator. Holds no per-request state.
pub struct Judge {
    config: JudgeConfig,
    generator: Option<Arc<dyn FeedbackGenerator>>,
}

impl Judge {
    pub fn new(config: JudgeConfig, generator: Option<Arc<dyn FeedbackGenerator>>) -> Self {
        Self { config, generator }
    }

    /// Judge without a generative backend.
    #[allow(dead_code)] // Convenience constructor, used by tests
    pub fn heuristic_only(config: JudgeConfig) -> Self {
        Self::new(config, None)
    }

    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    /// Name of the configured generator, if any.
    pub fn generator_name(&self) -> Option<String> {
        self.generator.as_ref().map(|g| g.name())
    }

    /// Judge a raw reports document (keys `code`, `design`, `pitch`).
    ///
    /// Never fails: invalid reports are dropped and generative failures
    /// fall back to heuristic feedback.
    #[allow(dead_code)] // Embedder entry point, the CLI uses judge_detailed
    pub async fn judge(&self, raw: &Map<String, Value>, weights: Option<&WeightConfig>) -> JudgeResult {
        self.judge_detailed(raw, weights).await.result
    }

    /// Like [`Judge::judge`], also reporting whether generative feedback was used.
    pub async fn judge_detailed(
        &self,
        raw: &Map<String, Value>,
        weights: Option<&WeightConfig>,
    ) -> JudgeOutcome {
        let reports = ReportSet::from_raw(raw);
        self.judge_reports(&reports, weights).await
    }

    /// Judge already validated reports.
    pub async fn judge_reports(
        &self,
        reports: &ReportSet,
        weights: Option<&WeightConfig>,
    ) -> JudgeOutcome {
        if reports.is_empty() {
            info!("No valid agent reports, returning minimal result");
            return JudgeOutcome {
                result: JudgeResult {
                    final_score: 0.0,
                    verdict: Verdict::NeedsWork,
                    parts: Vec::new(),
                    feedback: heuristic_feedback(reports, &self.config.thresholds),
                },
                generative_applied: false,
            };
        }

        let effective = match weights {
            Some(w) if !w.is_empty() => w,
            _ => &self.config.default_weights,
        };

        let normalized = normalize_weights(&reports.roles(), effective);
        let (final_score, parts) = score(reports, &normalized);
        let verdict = Verdict::from_score(final_score);

        info!(
            "Final score {:.2} ({}) from {} agent report(s)",
            final_score,
            verdict,
            reports.len()
        );

        let heuristic = heuristic_feedback(reports, &self.config.thresholds);
        let generated = self.generate_feedback(reports, &normalized).await;

        let generative_applied = generated.is_some();
        let feedback = match generated {
            Some(generated) => merge_feedback(&generated, &heuristic),
            None => heuristic,
        };

        JudgeOutcome {
            result: JudgeResult {
                final_score,
                verdict,
                parts,
                feedback,
            },
            generative_applied,
        }
    }

    /// Single attempt at generative feedback under the configured timeout.
    async fn generate_feedback(
        &self,
        reports: &ReportSet,
        weights: &NormalizedWeights<AgentRole>,
    ) -> Option<FeedbackBuckets> {
        let generator = self.generator.as_ref()?;
        let request = FeedbackRequest::new(reports, weights);
        let limit = self.config.generation_timeout;

        debug!("Requesting generative feedback from {}", generator.name());

        let text = match tokio::time::timeout(limit, generator.generate(&request)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!("Generative feedback failed: {}", e);
                return None;
            }
            Err(_) => {
                warn!(
                    "Generative feedback failed: {}",
                    GenerationError::Timeout(limit.as_secs())
                );
                return None;
            }
        };

        let parsed = parse_generated_feedback(&text);
        if parsed.is_none() {
            warn!("Generative feedback was malformed or empty, using heuristics only");
        }
        parsed
    }
}

/// Weighted score rounded to 2 decimals, plus the per-agent breakdown.
fn score(reports: &ReportSet, weights: &NormalizedWeights<AgentRole>) -> (f64, Vec<ScorePart>) {
    let mut total = 0.0;
    let mut parts = Vec::with_capacity(reports.len());

    for (role, report) in reports.iter() {
        let weight = weights.get(role.as_str());
        total += report.score * weight;
        parts.push(ScorePart {
            agent: *role,
            score: report.score,
            weight: round2(weight * 100.0),
        });
    }

    (round2(total).clamp(0.0, 100.0), parts)
}

/// Round to 2 decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentReport, FeedbackBucket, MAX_BUCKET_ITEMS};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted generator for exercising the merge and fallback paths.
    enum Script {
        Reply(String),
        Fail,
        Hang,
    }

    struct ScriptedGenerator {
        script: Script,
        calls: AtomicUsize,
    }

    impl ScriptedGenerator {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl FeedbackGenerator for ScriptedGenerator {
        fn name(&self) -> String {
            "scripted".to_string()
        }

        async fn generate(&self, _request: &FeedbackRequest) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.script {
                Script::Reply(text) => Ok(text.clone()),
                Script::Fail => Err(GenerationError::Connect("http://localhost:11434".to_string())),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(String::new())
                }
            }
        }
    }

    fn raw(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn three_reports() -> Map<String, Value> {
        raw(json!({
            "code": {"score": 90, "subscores": {"testing": 10, "ci_cd": 0, "license": 10, "structure": 60, "documentation": 80}},
            "design": {"score": 80, "subscores": {"visuals": 60, "accessibility": 50, "docs": 70}},
            "pitch": {"score": 70, "rationale": "Clear problem statement."}
        }))
    }

    fn judge_with(script: Script) -> (Judge, Arc<ScriptedGenerator>) {
        let generator = ScriptedGenerator::new(script);
        let judge = Judge::new(
            JudgeConfig {
                generation_timeout: Duration::from_millis(50),
                ..JudgeConfig::default()
            },
            Some(generator.clone() as Arc<dyn FeedbackGenerator>),
        );
        (judge, generator)
    }

    fn assert_feedback_invariants(fb: &FeedbackBuckets) {
        for bucket in FeedbackBucket::ALL {
            let items = fb.bucket(bucket);
            assert!(items.len() <= MAX_BUCKET_ITEMS);
            let unique: HashSet<&str> = items.iter().map(|s| s.trim()).collect();
            assert_eq!(unique.len(), items.len());
        }
    }

    #[tokio::test]
    async fn test_weighted_score_example() {
        let judge = Judge::heuristic_only(JudgeConfig::default());
        let weights = WeightConfig::parse("code:0.6,design:0.2,pitch:0.2");
        let result = judge.judge(&three_reports(), Some(&weights)).await;

        assert_eq!(result.final_score, 84.0);
        assert_eq!(result.verdict, Verdict::Good);
        assert_eq!(result.parts.len(), 3);
        assert_eq!(result.parts[0].agent, AgentRole::Code);
        assert_eq!(result.parts[0].weight, 60.0);
        assert_eq!(result.parts[1].agent, AgentRole::Design);
        assert_eq!(result.parts[1].weight, 20.0);
        assert_eq!(result.parts[2].agent, AgentRole::Pitch);
        assert_eq!(result.parts[2].score, 70.0);
    }

    #[tokio::test]
    async fn test_single_report_collapses_weights() {
        let judge = Judge::heuristic_only(JudgeConfig::default());
        let result = judge.judge(&raw(json!({"code": {"score": 60}})), None).await;

        assert_eq!(result.final_score, 60.0);
        assert_eq!(result.verdict, Verdict::Average);
        assert_eq!(result.parts.len(), 1);
        assert_eq!(result.parts[0].weight, 100.0);
    }

    #[tokio::test]
    async fn test_no_valid_reports() {
        let judge = Judge::heuristic_only(JudgeConfig::default());
        let result = judge
            .judge(
                &raw(json!({"code": {"score": "high"}, "design": null, "pitch": [1, 2]})),
                None,
            )
            .await;

        assert_eq!(result.final_score, 0.0);
        assert_eq!(result.verdict, Verdict::NeedsWork);
        assert!(result.parts.is_empty());
        for bucket in FeedbackBucket::ALL {
            assert!(!result.feedback.bucket(bucket).is_empty());
        }
    }

    #[tokio::test]
    async fn test_empty_reports_skip_generator() {
        let (judge, generator) = judge_with(Script::Reply("{\"mistakes\": [\"x\"]}".to_string()));
        let outcome = judge.judge_detailed(&Map::new(), None).await;

        assert!(!outcome.generative_applied);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_uniform_fallback_for_nonpositive_override() {
        let judge = Judge::heuristic_only(JudgeConfig::default());
        let weights = WeightConfig::parse("code:-1,design:0");
        let result = judge
            .judge(
                &raw(json!({"code": {"score": 80}, "design": {"score": 60}})),
                Some(&weights),
            )
            .await;

        assert_eq!(result.final_score, 70.0);
        assert_eq!(result.parts[0].weight, 50.0);
        assert_eq!(result.parts[1].weight, 50.0);
    }

    #[tokio::test]
    async fn test_huge_override_weights_stay_proportional() {
        let judge = Judge::heuristic_only(JudgeConfig::default());
        let weights = WeightConfig::parse("code:1e308,design:1e308");
        let result = judge
            .judge(
                &raw(json!({"code": {"score": 90}, "design": {"score": 80}})),
                Some(&weights),
            )
            .await;

        assert_eq!(result.final_score, 85.0);
        assert_eq!(result.verdict, Verdict::Excellent);
        assert_eq!(result.parts[0].weight, 50.0);
        assert_eq!(result.parts[1].weight, 50.0);
    }

    #[tokio::test]
    async fn test_empty_override_uses_default_weights() {
        let judge = Judge::heuristic_only(JudgeConfig {
            default_weights: WeightConfig::parse("code:1,pitch:3"),
            ..JudgeConfig::default()
        });
        let reports = raw(json!({"code": {"score": 100}, "pitch": {"score": 0}}));

        let result = judge.judge(&reports, Some(&WeightConfig::parse("garbage"))).await;
        assert_eq!(result.final_score, 25.0);
    }

    #[tokio::test]
    async fn test_final_score_within_bounds() {
        let judge = Judge::heuristic_only(JudgeConfig::default());
        let configs = ["code:1", "design:5,pitch:0.1", "code:0.33,design:0.33,pitch:0.34", ""];
        let scores = [0.0, 0.01, 49.5, 99.99, 100.0];

        for raw_weights in configs {
            let weights = WeightConfig::parse(raw_weights);
            for a in scores {
                for b in scores {
                    let reports = raw(json!({
                        "code": {"score": a},
                        "design": {"score": b},
                        "pitch": {"score": 100.0 - a}
                    }));
                    let result = judge.judge(&reports, Some(&weights)).await;
                    assert!((0.0..=100.0).contains(&result.final_score));
                    assert_eq!(result.verdict, Verdict::from_score(result.final_score));
                }
            }
        }
    }

    #[test]
    fn test_idempotent_without_generator() {
        let judge = Judge::heuristic_only(JudgeConfig::default());
        let reports = three_reports();

        let first = tokio_test::block_on(judge.judge(&reports, None));
        let second = tokio_test::block_on(judge.judge(&reports, None));

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_generative_feedback_is_merged_first() {
        let reply = "```json\n{\"feedback\": {\"mistakes\": [\"No tests under src/api\", \"CI workflow not detected or failing.\"], \"quick_wins\": [\"Pin the Node version in .nvmrc\"]}}\n```";
        let (judge, generator) = judge_with(Script::Reply(reply.to_string()));
        let baseline = Judge::heuristic_only(JudgeConfig::default())
            .judge(&three_reports(), None)
            .await;

        let outcome = judge.judge_detailed(&three_reports(), None).await;
        let fb = &outcome.result.feedback;

        assert!(outcome.generative_applied);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fb.mistakes[0], "No tests under src/api");
        assert_eq!(fb.mistakes[1], "CI workflow not detected or failing.");
        assert_eq!(fb.quick_wins[0], "Pin the Node version in .nvmrc");
        assert_eq!(&fb.quick_wins[1..], &baseline.feedback.quick_wins[..]);
        assert_eq!(fb.code_improvements, baseline.feedback.code_improvements);
        assert_feedback_invariants(fb);

        // The score never depends on the generator
        assert_eq!(outcome.result.final_score, baseline.final_score);
        assert_eq!(outcome.result.parts, baseline.parts);
    }

    #[tokio::test]
    async fn test_malformed_generation_matches_heuristic_result() {
        let baseline = Judge::heuristic_only(JudgeConfig::default())
            .judge(&three_reports(), None)
            .await;

        for reply in [
            "Sure! Here is my feedback: add tests.",
            "```json\n{\"feedback\": {\"mistakes\": [\"unterminated\"\n```",
            "{\"feedback\": {\"code_improvements\": [], \"mistakes\": [], \"quick_wins\": []}}",
            "{\"feedback\": {\"mistakes\": [1, 2, 3]}}",
        ] {
            let (judge, _) = judge_with(Script::Reply(reply.to_string()));
            let outcome = judge.judge_detailed(&three_reports(), None).await;

            assert!(!outcome.generative_applied, "accepted {:?}", reply);
            assert_eq!(outcome.result, baseline);
        }
    }

    #[tokio::test]
    async fn test_generator_error_falls_back() {
        let (judge, generator) = judge_with(Script::Fail);
        let outcome = judge.judge_detailed(&three_reports(), None).await;

        assert!(!outcome.generative_applied);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.result.final_score, 84.0);
        assert!(!outcome.result.feedback.is_empty());
    }

    #[tokio::test]
    async fn test_generator_timeout_falls_back() {
        let (judge, generator) = judge_with(Script::Hang);
        let outcome = judge.judge_detailed(&three_reports(), None).await;

        assert!(!outcome.generative_applied);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert!(!outcome.result.feedback.is_empty());
    }

    #[tokio::test]
    async fn test_judge_reports_accepts_typed_input() {
        let judge = Judge::heuristic_only(JudgeConfig::default());
        let reports = ReportSet::from_reports([
            (AgentRole::Pitch, AgentReport::with_score(50.0)),
            (AgentRole::Design, AgentReport::with_score(100.0)),
        ]);

        let outcome = judge
            .judge_reports(&reports, Some(&WeightConfig::parse("design:1,pitch:1")))
            .await;

        assert_eq!(outcome.result.final_score, 75.0);
        assert_eq!(outcome.result.parts[0].agent, AgentRole::Design);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(84.0000001), 84.0);
        assert_eq!(round2(66.666), 66.67);
        assert_eq!(round2(0.0), 0.0);
    }
}
