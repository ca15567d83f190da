//! Sentiment gate.

use std::time::Duration;

use tracing::{debug, instrument};

use super::{with_deadline, SkipReason, Stage, StageFailure, StageOutcome};
use crate::collaborators::LanguageAnalyzer;
use crate::domain::{Comment, LanguageDetection, Priority, SentimentResult};

/// A comment that passed the gate, with the priority its tickets get.
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentVerdict {
    pub result: SentimentResult,
    pub priority: Priority,
}

/// Run sentiment analysis with opinion mining and keep only complaints.
#[instrument(skip_all, fields(comment_id = %comment.id, language = %language.language_code))]
pub async fn analyze_sentiment(
    analyzer: &dyn LanguageAnalyzer,
    comment: &Comment,
    language: &LanguageDetection,
    deadline: Duration,
) -> StageOutcome<SentimentVerdict> {
    let result = match with_deadline(
        deadline,
        analyzer.analyze_sentiment(&comment.body, &language.language_code),
    )
    .await
    {
        Ok(result) => result,
        Err(e) => {
            return StageOutcome::Fail(StageFailure::new(
                Stage::Sentiment,
                format!("sentiment analysis failed for comment {}: {e}", comment.id),
            ))
        }
    };

    if result.is_error {
        let detail = result
            .error_message
            .as_deref()
            .unwrap_or("service returned an error document");
        return StageOutcome::Fail(StageFailure::new(
            Stage::Sentiment,
            format!("sentiment analysis rejected comment {}: {detail}", comment.id),
        ));
    }

    debug!(sentiment = %result.overall_sentiment, "sentiment analysed");

    match Priority::from_sentiment(result.overall_sentiment) {
        Some(priority) => StageOutcome::Proceed(SentimentVerdict { result, priority }),
        None => StageOutcome::Skip(SkipReason::NotActionable {
            sentiment: result.overall_sentiment,
        }),
    }
}
