//! Advisory summarization.

use std::time::Duration;

use tracing::{debug, instrument, warn};

use super::with_deadline;
use crate::collaborators::LanguageAnalyzer;
use crate::domain::{Comment, LanguageDetection, SummaryDocument};

/// Join every summary sentence of the non-error documents as `"<text>. "`.
pub fn join_summaries(documents: &[SummaryDocument]) -> String {
    documents
        .iter()
        .filter(|d| !d.is_error)
        .flat_map(|d| d.summaries.iter())
        .fold(String::new(), |mut acc, text| {
            acc.push_str(text);
            acc.push_str(". ");
            acc
        })
}

/// Summarize the comment body, or return an empty string if the service is
/// unavailable. The summary only decorates ticket descriptions.
#[instrument(skip_all, fields(comment_id = %comment.id))]
pub async fn summarize_comment(
    analyzer: &dyn LanguageAnalyzer,
    comment: &Comment,
    language: &LanguageDetection,
    deadline: Duration,
) -> String {
    match with_deadline(
        deadline,
        analyzer.summarize(&comment.body, &language.language_code),
    )
    .await
    {
        Ok(documents) => {
            let summary = join_summaries(&documents);
            debug!(chars = summary.len(), "summary ready");
            summary
        }
        Err(e) => {
            warn!(error = %e, "summarization unavailable, continuing without summary");
            String::new()
        }
    }
}
