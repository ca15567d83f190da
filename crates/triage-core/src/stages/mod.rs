//! Pipeline stages.
//!
//! Every stage that can stop a comment returns a [`StageOutcome`] instead of
//! raising: `Proceed` carries the stage output forward, `Skip` ends the comment
//! normally and `Fail` ends it with exactly one digest record.
//!
//! - [`dedup`]: has this comment already been filed?
//! - [`language`]: is the comment in a supported language?
//! - [`sentiment`]: is the comment a complaint?
//! - [`summarize`]: advisory digest of the comment body
//! - [`extract`]: group negative opinions by target
//! - [`filer`]: one ticket per complaint group

pub mod dedup;
pub mod extract;
pub mod filer;
pub mod language;
pub mod sentiment;
pub mod summarize;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{ErrorRecord, Sentiment};
use crate::error::{CollaboratorError, CollaboratorResult};

pub use dedup::check_duplicate;
pub use extract::extract_complaints;
pub use filer::{build_ticket_request, file_tickets, FilingReport};
pub use language::{detect_language, pick_primary_language, SUPPORTED_LANGUAGES};
pub use sentiment::{analyze_sentiment, SentimentVerdict};
pub use summarize::summarize_comment;

/// Named pipeline stage, used in failure causes and run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Dedup,
    Language,
    Sentiment,
    Summarize,
    Extract,
    File,
    /// The comment task itself died (panic or cancellation).
    Unexpected,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Dedup => "dedup",
            Stage::Language => "language",
            Stage::Sentiment => "sentiment",
            Stage::Summarize => "summarize",
            Stage::Extract => "extract",
            Stage::File => "file",
            Stage::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a comment left the pipeline without being filed or failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The tracker already holds tickets referencing the comment.
    Duplicate { existing: Vec<String> },

    /// Detected language is outside the supported set.
    UnsupportedLanguage {
        language_code: String,
        confidence: f64,
    },

    /// Positive or neutral feedback.
    NotActionable { sentiment: Sentiment },
}

/// A stage that could not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: Stage,

    /// Digest cause; the stage name, optionally qualified.
    pub cause: String,

    pub detail: String,
}

impl StageFailure {
    pub fn new(stage: Stage, detail: impl Into<String>) -> Self {
        Self {
            stage,
            cause: stage.name().to_string(),
            detail: detail.into(),
        }
    }

    /// Failure whose cause names more than the stage, e.g. a complaint target.
    pub fn qualified(stage: Stage, qualifier: &str, detail: impl Into<String>) -> Self {
        Self {
            stage,
            cause: format!("{} ({qualifier})", stage.name()),
            detail: detail.into(),
        }
    }

    pub fn to_record(&self) -> ErrorRecord {
        ErrorRecord::new(self.cause.clone(), self.detail.clone())
    }
}

/// Result of one gating stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Proceed(T),
    Skip(SkipReason),
    Fail(StageFailure),
}

/// Run a collaborator call under a deadline; expiry becomes
/// [`CollaboratorError::Timeout`].
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> CollaboratorResult<T>
where
    F: Future<Output = CollaboratorResult<T>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(CollaboratorError::Timeout(deadline)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::Dedup.name(), "dedup");
        assert_eq!(Stage::Sentiment.to_string(), "sentiment");
        assert_eq!(Stage::File.name(), "file");
    }

    #[test]
    fn test_qualified_failure_cause() {
        let failure = StageFailure::qualified(Stage::File, "target 'game'", "500");
        assert_eq!(failure.cause, "file (target 'game')");
        assert_eq!(failure.to_record().message, "500");
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_deadline_times_out() {
        let result: CollaboratorResult<()> = with_deadline(Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert_eq!(result, Err(CollaboratorError::Timeout(Duration::from_secs(1))));
    }
}
