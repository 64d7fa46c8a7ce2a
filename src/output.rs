use std::fmt::Write;

use crate::analysis::AnalysisReport;
use crate::sentiment::SentimentReport;
use crate::summarize::AiReport;

const PREVIEW_CHARS: usize = 60;

/// Render an analysis report as plain text for the terminal
pub fn render_text(report: &AnalysisReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Video: {}", report.video_id);
    let _ = writeln!(out, "Comments analyzed: {}\n", report.total_comments);

    out.push_str("Sentiment:\n");
    for (method, sentiment) in &report.sentiment {
        render_sentiment(&mut out, method, sentiment);
    }

    let _ = writeln!(
        out,
        "\nToxic comments ({}, threshold {:.2}):",
        report.toxicity.backend, report.toxicity.threshold
    );
    if let Some(err) = &report.toxicity.error {
        let _ = writeln!(out, "  unavailable: {err}");
    } else if report.toxicity.comments.is_empty() {
        out.push_str("  none detected\n");
    } else {
        for (i, c) in report.toxicity.comments.iter().enumerate() {
            let _ = writeln!(out, "  {}. [{:.2}] {}", i + 1, c.score, preview(&c.text));
        }
    }

    out.push_str("\nMost used emojis:\n");
    if report.emojis.is_empty() {
        out.push_str("  none\n");
    }
    for e in &report.emojis {
        let _ = writeln!(out, "  {} x{}", e.emoji, e.count);
    }

    out.push_str("\nTop liked comments:\n");
    for c in &report.top_liked {
        let _ = writeln!(out, "  [{} likes] {}", c.like_count, preview(&c.text));
    }

    if let Some(ai) = &report.gemini_analysis {
        out.push('\n');
        out.push_str(&render_ai_text(ai));
    }

    out.push_str("\nTimings:\n");
    for (stage, secs) in report.time_complexity.iter() {
        let _ = writeln!(out, "  {stage}: {secs:.4}s");
    }

    out
}

/// Render the generated reports, one titled block each
pub fn render_ai_text(ai: &AiReport) -> String {
    let mut out = String::new();
    for (title, body) in [
        ("Summary", &ai.summary),
        ("Public demands", &ai.public_demands),
        ("Suggestions", &ai.suggestions),
    ] {
        if let Some(body) = body {
            let _ = writeln!(out, "--- {title} ---\n{body}\n");
        }
    }
    for err in &ai.errors {
        let _ = writeln!(out, "report failed: {err}");
    }
    out
}

fn render_sentiment(out: &mut String, method: &str, s: &SentimentReport) {
    let b = &s.breakdown;
    let _ = writeln!(out, "  {method} (overall {:+.2})", s.overall);
    let _ = writeln!(
        out,
        "    positive {:.1}% / {:.1}% / {:.1}%  neutral {:.1}%  negative {:.1}% / {:.1}% / {:.1}%",
        b.spositive, b.positive, b.wpositive, b.neutral, b.wnegative, b.negative, b.snegative
    );
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        text.to_string()
    } else {
        let cut: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Comment;
    use crate::analysis::{AnalysisReport, ToxicitySection, Timings};
    use crate::emoji::EmojiCount;
    use crate::toxicity::ToxicityScore;
    use std::collections::BTreeMap;

    fn sample_report() -> AnalysisReport {
        let mut sentiment = BTreeMap::new();
        sentiment.insert("vader".to_string(), SentimentReport::from_scores([0.9, -0.9]));
        AnalysisReport {
            video_id: "abc123".to_string(),
            total_comments: 2,
            sentiment,
            toxicity: ToxicitySection {
                backend: "classifier".to_string(),
                threshold: 0.5,
                comments: vec![ToxicityScore {
                    text: "you fool".to_string(),
                    score: 0.87,
                }],
                error: None,
            },
            emojis: vec![EmojiCount { emoji: '🔥', count: 3 }],
            top_liked: vec![Comment::new("great", 12)],
            gemini_analysis: None,
            time_complexity: Timings::default(),
        }
    }

    #[test]
    fn test_render_text() {
        let out = render_text(&sample_report());
        assert!(out.starts_with("Video: abc123\nComments analyzed: 2\n"));
        assert!(out.contains("  vader (overall +0.00)\n"));
        assert!(out.contains("positive 50.0% / 0.0% / 0.0%"));
        assert!(out.contains("  1. [0.87] you fool\n"));
        assert!(out.contains("  🔥 x3\n"));
        assert!(out.contains("  [12 likes] great\n"));
        assert!(!out.contains("Summary"));
    }

    #[test]
    fn test_render_toxicity_error() {
        let mut report = sample_report();
        report.toxicity.comments.clear();
        report.toxicity.error = Some("timed out".to_string());
        assert!(render_text(&report).contains("  unavailable: timed out\n"));
    }

    #[test]
    fn test_render_ai_text() {
        let ai = AiReport {
            summary: Some("- people liked it".to_string()),
            public_demands: None,
            suggestions: Some("1. shorter intros".to_string()),
            errors: vec!["public_demands: quota".to_string()],
        };
        let out = render_ai_text(&ai);
        assert!(out.contains("--- Summary ---\n- people liked it\n"));
        assert!(!out.contains("Public demands"));
        assert!(out.contains("report failed: public_demands: quota"));
    }

    #[test]
    fn test_preview_truncates_on_chars() {
        let long = "é".repeat(100);
        let p = preview(&long);
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
        assert_eq!(preview("short"), "short");
    }
}
