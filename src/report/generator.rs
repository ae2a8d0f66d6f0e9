//! Markdown and JSON report generation.
//!
//! This module renders judging results and profile summaries.

use crate::analysis::ProfileSummary;
use crate::config::ReportConfig;
use crate::models::{FeedbackBucket, FeedbackBuckets, JudgeReport, JudgeResult, ReportMetadata, ScorePart};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &JudgeReport, options: &ReportConfig) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# HackJudge Report\n\n");

    // Metadata section
    if options.include_metadata {
        output.push_str(&generate_metadata_section(&report.metadata));
    }

    // Verdict and score
    output.push_str(&generate_verdict_section(&report.result));

    // Per-agent breakdown
    output.push_str(&generate_breakdown_section(&report.result.parts));

    // Bucketed feedback
    output.push_str(&generate_feedback_section(&report.result.feedback));

    // Single-list view
    if options.include_checklist {
        output.push_str(&generate_checklist_section(&report.result.feedback));
    }

    // Footer
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Reports:** {}\n", metadata.source));
    section.push_str(&format!(
        "- **Judged At:** {}\n",
        metadata.judged_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Weights:** `{}`\n", metadata.weights));
    match metadata.model_used {
        Some(ref model) => {
            let status = if metadata.generative_feedback {
                "merged"
            } else {
                "unavailable, heuristics only"
            };
            section.push_str(&format!("- **Feedback Model:** `{}` ({})\n", model, status));
        }
        None => section.push_str("- **Feedback Model:** none (heuristics only)\n"),
    }
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the verdict section.
fn generate_verdict_section(result: &JudgeResult) -> String {
    let mut section = String::new();

    section.push_str("## Verdict\n\n");
    section.push_str(&format!(
        "{} **{}** with a final score of **{:.2} / 100**\n\n",
        result.verdict.emoji(),
        result.verdict,
        result.final_score
    ));

    section
}

/// Generate the score breakdown table.
fn generate_breakdown_section(parts: &[ScorePart]) -> String {
    let mut section = String::new();

    section.push_str("## Score Breakdown\n\n");

    if parts.is_empty() {
        section.push_str("No valid agent reports were received.\n\n");
        return section;
    }

    section.push_str("| Agent | Score | Weight | Contribution |\n");
    section.push_str("|:---|:---:|:---:|:---:|\n");

    for part in parts {
        section.push_str(&format!(
            "| {} | {:.2} | {:.2}% | {:.2} |\n",
            part.agent,
            part.score,
            part.weight,
            part.score * part.weight / 100.0
        ));
    }
    section.push('\n');

    section
}

/// Generate the feedback section with one subsection per bucket.
fn generate_feedback_section(feedback: &FeedbackBuckets) -> String {
    let mut section = String::new();

    section.push_str("## Feedback\n\n");

    if feedback.is_empty() {
        section.push_str("No feedback. Great job! 🎉\n\n");
        return section;
    }

    for bucket in FeedbackBucket::ALL {
        let items = feedback.bucket(bucket);
        if items.is_empty() {
            continue;
        }

        section.push_str(&format!("### {}\n\n", bucket.title()));
        for item in items {
            section.push_str(&format!("- {}\n", item));
        }
        section.push('\n');
    }

    section
}

/// Generate the consolidated checklist.
fn generate_checklist_section(feedback: &FeedbackBuckets) -> String {
    let items = feedback.flatten();
    if items.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Checklist\n\n");
    for item in items {
        section.push_str(&format!("- [ ] {}\n", item));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by HackJudge*\n");

    footer
}

/// Generate a JSON report containing exactly the judging result.
pub fn generate_json_report(result: &JudgeResult) -> Result<String> {
    serde_json::to_string_pretty(result).map_err(Into::into)
}

/// Generate a Markdown profile summary.
pub fn generate_profile_markdown(summary: &ProfileSummary) -> String {
    let mut output = String::new();

    output.push_str("# HackJudge Profile Summary\n\n");
    output.push_str(&format!("- **Repositories:** {}\n", summary.count));
    output.push_str(&format!("- **Average Score:** {:.2}\n", summary.avg));
    output.push_str(&format!("- **Median Score:** {:.2}\n\n", summary.median));

    if summary.top.is_empty() {
        output.push_str("No repository produced a numeric score.\n\n");
    } else {
        output.push_str("## Ranking\n\n");
        output.push_str("| # | Repository | Score |\n");
        output.push_str("|:---:|:---|:---:|\n");

        for (i, repo) in summary.top.iter().enumerate() {
            let name = if repo.url.is_empty() {
                format!("`{}`", repo.name)
            } else {
                format!("[{}]({})", repo.name, repo.url)
            };
            output.push_str(&format!("| {} | {} | {:.2} |\n", i + 1, name, repo.score));
        }
        output.push('\n');
    }

    output.push_str(&generate_footer());

    output
}

/// Generate a JSON profile summary.
pub fn generate_profile_json(summary: &ProfileSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::RankedRepo;
    use crate::models::{AgentRole, Verdict};
    use chrono::Utc;

    fn create_test_report() -> JudgeReport {
        let mut feedback = FeedbackBuckets::default();
        feedback.extend_unique(FeedbackBucket::Mistakes, ["CI workflow not detected or failing."]);
        feedback.extend_unique(
            FeedbackBucket::QuickWins,
            ["Add a LICENSE file at the repository root."],
        );

        JudgeReport {
            metadata: ReportMetadata {
                source: "agents.json".to_string(),
                judged_at: Utc::now(),
                model_used: Some("test-model".to_string()),
                generative_feedback: false,
                weights: "code:0.6,design:0.2,pitch:0.2".to_string(),
                duration_seconds: 1.5,
            },
            result: JudgeResult {
                final_score: 84.0,
                verdict: Verdict::Good,
                parts: vec![
                    ScorePart {
                        agent: AgentRole::Code,
                        score: 90.0,
                        weight: 60.0,
                    },
                    ScorePart {
                        agent: AgentRole::Design,
                        score: 80.0,
                        weight: 20.0,
                    },
                ],
                feedback,
            },
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report();
        let markdown = generate_markdown_report(&report, &ReportConfig::default());

        assert!(markdown.contains("# HackJudge Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("**Good**"));
        assert!(markdown.contains("84.00 / 100"));
        assert!(markdown.contains("| code | 90.00 | 60.00% | 54.00 |"));
        assert!(markdown.contains("### Mistakes"));
        assert!(!markdown.contains("### Code Improvements"));
        assert!(markdown.contains("- [ ] Add a LICENSE file at the repository root."));
        assert!(markdown.contains("unavailable, heuristics only"));
    }

    #[test]
    fn test_markdown_respects_options() {
        let report = create_test_report();
        let options = ReportConfig {
            include_checklist: false,
            include_metadata: false,
        };
        let markdown = generate_markdown_report(&report, &options);

        assert!(!markdown.contains("## Metadata"));
        assert!(!markdown.contains("## Checklist"));
        assert!(markdown.contains("## Feedback"));
    }

    #[test]
    fn test_breakdown_without_parts() {
        let section = generate_breakdown_section(&[]);
        assert!(section.contains("No valid agent reports"));
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report();
        let json = generate_json_report(&report.result).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 4);
        assert_eq!(value["verdict"], "Good");
        assert_eq!(value["parts"][1]["agent"], "design");
        assert!(value["feedback"]["mistakes"].is_array());
    }

    #[test]
    fn test_generate_profile_markdown() {
        let summary = ProfileSummary {
            count: 3,
            avg: 57.5,
            median: 57.5,
            top: vec![
                RankedRepo {
                    name: "alpha".to_string(),
                    url: "https://github.com/octo/alpha".to_string(),
                    score: 80.0,
                },
                RankedRepo {
                    name: "beta".to_string(),
                    url: String::new(),
                    score: 35.0,
                },
            ],
        };

        let markdown = generate_profile_markdown(&summary);
        assert!(markdown.contains("**Repositories:** 3"));
        assert!(markdown.contains("| 1 | [alpha](https://github.com/octo/alpha) | 80.00 |"));
        assert!(markdown.contains("| 2 | `beta` | 35.00 |"));

        let json = generate_profile_json(&summary).unwrap();
        assert!(json.contains("\"median\""));
    }
}
