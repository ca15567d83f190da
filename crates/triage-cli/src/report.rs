//! Run report rendering.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use triage_core::{CommentReport, CommentState, RunReport, SkipReason};

fn state_label(state: CommentState) -> String {
    match state {
        CommentState::Fetched => "fetched".to_string(),
        CommentState::DedupChecked => "dedup checked".to_string(),
        CommentState::LanguageGated => "language gated".to_string(),
        CommentState::SentimentGated => "sentiment gated".to_string(),
        CommentState::Summarized => "summarized".to_string(),
        CommentState::ComplaintsExtracted => "complaints extracted".to_string(),
        CommentState::Filed => "filed".to_string(),
        CommentState::SkippedDuplicate => "skipped: duplicate".to_string(),
        CommentState::SkippedUnsupportedLanguage => "skipped: language".to_string(),
        CommentState::SkippedNeutralSentiment => "skipped: not a complaint".to_string(),
        CommentState::Failed(stage) => format!("failed: {stage}"),
    }
}

fn comment_detail(comment: &CommentReport) -> String {
    if !comment.tickets.is_empty() {
        return comment
            .tickets
            .iter()
            .map(|t| format!("{} ({}, {})", t.key, t.target, t.priority))
            .collect::<Vec<_>>()
            .join(", ");
    }
    match &comment.skip {
        Some(SkipReason::Duplicate { existing }) => format!("existing {}", existing.join(", ")),
        Some(SkipReason::UnsupportedLanguage {
            language_code,
            confidence,
        }) => format!("{language_code} at {confidence:.2}"),
        Some(SkipReason::NotActionable { sentiment }) => sentiment.to_string(),
        None => String::new(),
    }
}

/// Human-readable summary, one line per comment.
pub fn render_text(report: &RunReport) -> String {
    let mut out = String::new();
    let elapsed = report.finished_at - report.started_at;
    let _ = writeln!(
        out,
        "Run {} on submission {}: {} comments, {} tickets, {} errors ({:.1}s)",
        report.run_id,
        report.submission_id,
        report.comments.len(),
        report.tickets().count(),
        report.errors.len(),
        elapsed.num_milliseconds() as f64 / 1000.0
    );
    for comment in &report.comments {
        let detail = comment_detail(comment);
        let _ = writeln!(
            out,
            "  {:<10} {:<26} {}",
            comment.comment_id,
            state_label(comment.state()),
            detail
        );
    }
    if !report.errors.is_empty() {
        let _ = writeln!(out, "Errors:");
        for record in &report.errors {
            let _ = writeln!(out, "  [{}] {}", record.cause, record.message);
        }
        let _ = writeln!(
            out,
            "Digest: {}",
            if report.digest_sent { "sent" } else { "not delivered" }
        );
    }
    out
}

pub fn render_json(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize run report")
}
