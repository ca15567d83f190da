//! Results returned by the language analysis service.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One entry of a language detection response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedLanguage {
    /// The service could not analyse this document.
    pub is_error: bool,

    /// ISO 639-1 code, e.g. `en`.
    pub language_code: String,

    /// Confidence in `0.0..=1.0`.
    pub confidence: f64,
}

impl DetectedLanguage {
    pub fn new(language_code: impl Into<String>, confidence: f64) -> Self {
        Self {
            is_error: false,
            language_code: language_code.into(),
            confidence,
        }
    }

    pub fn error() -> Self {
        Self {
            is_error: true,
            language_code: String::new(),
            confidence: 0.0,
        }
    }
}

/// The dominant language picked for a comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageDetection {
    pub language_code: String,
    pub confidence: f64,
}

impl LanguageDetection {
    /// Used when the service produced no usable entry.
    pub fn fallback() -> Self {
        Self {
            language_code: "en".to_string(),
            confidence: 0.0,
        }
    }
}

/// Document-level sentiment label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    Mixed,
}

impl Sentiment {
    /// Negative and mixed comments are the only ones worth filing.
    pub fn is_actionable(&self) -> bool {
        matches!(self, Sentiment::Negative | Sentiment::Mixed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
            Sentiment::Mixed => "mixed",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sentiment the service attached to a mined opinion's target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetSentiment {
    Positive,
    Negative,
    Neutral,
}

/// Free-text span justifying a sentiment judgement about a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    pub text: String,
}

impl Assessment {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A mined opinion: a target plus the assessments describing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceOpinion {
    /// Subject of the opinion, exactly as produced by the service.
    pub target: String,
    pub target_sentiment: TargetSentiment,
    pub assessments: Vec<Assessment>,
}

impl SentenceOpinion {
    pub fn new(
        target: impl Into<String>,
        target_sentiment: TargetSentiment,
        assessments: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            target: target.into(),
            target_sentiment,
            assessments: assessments.into_iter().map(Assessment::new).collect(),
        }
    }
}

/// One analysed sentence and the opinions mined from it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Sentence {
    pub text: String,
    pub opinions: Vec<SentenceOpinion>,
}

/// Sentiment and opinion-mining output for one comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub overall_sentiment: Sentiment,

    /// The service reported a per-document error instead of a result.
    pub is_error: bool,

    /// Service-provided error detail when `is_error` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    pub sentences: Vec<Sentence>,
}

impl SentimentResult {
    pub fn new(overall_sentiment: Sentiment, sentences: Vec<Sentence>) -> Self {
        Self {
            overall_sentiment,
            is_error: false,
            error_message: None,
            sentences,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            overall_sentiment: Sentiment::Neutral,
            is_error: true,
            error_message: Some(message.into()),
            sentences: Vec::new(),
        }
    }

    /// Iterate every mined opinion in sentence order.
    pub fn opinions(&self) -> impl Iterator<Item = &SentenceOpinion> {
        self.sentences.iter().flat_map(|s| s.opinions.iter())
    }
}

/// One document's result from an abstractive summarization job.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SummaryDocument {
    pub is_error: bool,
    pub summaries: Vec<String>,
}
