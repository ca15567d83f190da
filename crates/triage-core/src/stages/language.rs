//! Language gate.

use std::time::Duration;

use tracing::{debug, instrument};

use super::{with_deadline, SkipReason, Stage, StageFailure, StageOutcome};
use crate::collaborators::LanguageAnalyzer;
use crate::domain::{Comment, DetectedLanguage, LanguageDetection};

/// Languages the summarization service accepts (ISO 639-1).
pub const SUPPORTED_LANGUAGES: [&str; 11] =
    ["en", "es", "de", "ko", "ja", "it", "fr", "pt", "zh", "he", "pl"];

pub fn is_supported(language_code: &str) -> bool {
    SUPPORTED_LANGUAGES.contains(&language_code)
}

/// Highest-confidence entry among the non-error ones.
///
/// Errored entries are ignored whatever their confidence. A later entry
/// replaces the current best only with strictly greater confidence, so ties
/// keep the first one seen. With no usable entry the result is `en` at 0.
pub fn pick_primary_language(entries: &[DetectedLanguage]) -> LanguageDetection {
    let mut best = LanguageDetection::fallback();
    for entry in entries.iter().filter(|e| !e.is_error) {
        if entry.confidence > best.confidence {
            best = LanguageDetection {
                language_code: entry.language_code.clone(),
                confidence: entry.confidence,
            };
        }
    }
    best
}

/// Detect the comment's language and gate on the supported set.
#[instrument(skip_all, fields(comment_id = %comment.id))]
pub async fn detect_language(
    analyzer: &dyn LanguageAnalyzer,
    comment: &Comment,
    deadline: Duration,
) -> StageOutcome<LanguageDetection> {
    let entries = match with_deadline(deadline, analyzer.detect(&comment.body)).await {
        Ok(entries) => entries,
        Err(e) => {
            return StageOutcome::Fail(StageFailure::new(
                Stage::Language,
                format!("language detection failed for comment {}: {e}", comment.id),
            ))
        }
    };

    let detection = pick_primary_language(&entries);
    debug!(
        language = %detection.language_code,
        confidence = detection.confidence,
        "primary language picked"
    );

    if is_supported(&detection.language_code) {
        StageOutcome::Proceed(detection)
    } else {
        StageOutcome::Skip(SkipReason::UnsupportedLanguage {
            language_code: detection.language_code,
            confidence: detection.confidence,
        })
    }
}
