//! Azure AI Language adapter
//!
//! - language detection: `POST /text/analytics/v3.1/languages`
//! - sentiment with opinion mining: `POST /text/analytics/v3.1/sentiment?opinionMining=true`
//! - abstractive summarization: `POST /language/analyze-text/jobs`, then poll
//!   the `operation-location` URL until the job settles
//!
//! One document is submitted per call.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument, warn};
use triage_core::{
    CollaboratorResult, DetectedLanguage, LanguageAnalyzer, Sentence, SentenceOpinion, Sentiment,
    SentimentResult, SummaryDocument, TargetSentiment,
};

use crate::error::{ClientError, ClientResult};
use crate::transport::{read_json, send_with_retry, Replay, RetryPolicy};

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const ANALYZE_TEXT_API_VERSION: &str = "2023-04-01";
const DOCUMENT_ID: &str = "1";

/// Azure AI Language resource settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureLanguageConfig {
    /// Resource endpoint, e.g. `https://<name>.cognitiveservices.azure.com`
    pub endpoint: String,
    pub key: String,
    /// Delay between summarization job polls
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl AzureLanguageConfig {
    pub fn new(endpoint: &str, key: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            key: key.to_string(),
            poll_interval: Duration::from_secs(2),
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DocumentError {
    #[serde(default)]
    id: String,
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl DocumentError {
    fn describe(&self) -> String {
        format!("{}: {}", self.error.code, self.error.message)
    }
}

#[derive(Debug, Deserialize)]
struct LanguagesResponse {
    #[serde(default)]
    documents: Vec<LanguageDocument>,
    #[serde(default)]
    errors: Vec<DocumentError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LanguageDocument {
    detected_language: WireDetectedLanguage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDetectedLanguage {
    iso6391_name: String,
    confidence_score: f64,
}

#[derive(Debug, Deserialize)]
struct SentimentResponse {
    #[serde(default)]
    documents: Vec<SentimentDocument>,
    #[serde(default)]
    errors: Vec<DocumentError>,
}

#[derive(Debug, Deserialize)]
struct SentimentDocument {
    sentiment: String,
    #[serde(default)]
    sentences: Vec<WireSentence>,
}

#[derive(Debug, Deserialize)]
struct WireSentence {
    #[serde(default)]
    text: String,
    #[serde(default)]
    targets: Vec<WireTarget>,
    #[serde(default)]
    assessments: Vec<WireAssessment>,
}

#[derive(Debug, Deserialize)]
struct WireTarget {
    text: String,
    sentiment: String,
    #[serde(default)]
    relations: Vec<WireRelation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRelation {
    relation_type: String,
    #[serde(rename = "ref")]
    reference: String,
}

#[derive(Debug, Deserialize)]
struct WireAssessment {
    text: String,
}

#[derive(Debug, Deserialize)]
struct JobState {
    status: String,
    #[serde(default)]
    tasks: JobTasks,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
struct JobTasks {
    #[serde(default)]
    items: Vec<JobTaskItem>,
}

#[derive(Debug, Deserialize)]
struct JobTaskItem {
    #[serde(default)]
    results: Option<SummaryResults>,
}

#[derive(Debug, Deserialize)]
struct SummaryResults {
    #[serde(default)]
    documents: Vec<WireSummaryDocument>,
    #[serde(default)]
    errors: Vec<DocumentError>,
}

#[derive(Debug, Deserialize)]
struct WireSummaryDocument {
    #[serde(default)]
    summaries: Vec<WireSummary>,
}

#[derive(Debug, Deserialize)]
struct WireSummary {
    text: String,
}

// ---------------------------------------------------------------------------
// Response mapping
// ---------------------------------------------------------------------------

fn parse_sentiment(value: &str) -> ClientResult<Sentiment> {
    match value {
        "positive" => Ok(Sentiment::Positive),
        "negative" => Ok(Sentiment::Negative),
        "neutral" => Ok(Sentiment::Neutral),
        "mixed" => Ok(Sentiment::Mixed),
        other => Err(ClientError::Response {
            operation: "sentiment".to_string(),
            detail: format!("unknown sentiment label '{other}'"),
        }),
    }
}

/// Opinion targets are never reported `mixed` in practice; treat it as neutral.
fn parse_target_sentiment(value: &str) -> TargetSentiment {
    match value {
        "positive" => TargetSentiment::Positive,
        "negative" => TargetSentiment::Negative,
        _ => TargetSentiment::Neutral,
    }
}

/// `#/documents/0/sentences/S/assessments/A` → `(S, A)`.
fn parse_assessment_ref(reference: &str) -> Option<(usize, usize)> {
    let mut parts = reference.trim_start_matches('#').split('/').skip(1);
    let mut next_index = |name: &str| -> Option<usize> {
        if parts.next()? != name {
            return None;
        }
        parts.next()?.parse().ok()
    };
    next_index("documents")?;
    let sentence = next_index("sentences")?;
    let assessment = next_index("assessments")?;
    Some((sentence, assessment))
}

fn map_languages(response: LanguagesResponse) -> Vec<DetectedLanguage> {
    let mut detected: Vec<DetectedLanguage> = response
        .documents
        .into_iter()
        .map(|doc| {
            DetectedLanguage::new(
                doc.detected_language.iso6391_name,
                doc.detected_language.confidence_score,
            )
        })
        .collect();
    for error in &response.errors {
        debug!(document = %error.id, error = %error.describe(), "language detection document error");
        detected.push(DetectedLanguage::error());
    }
    detected
}

fn map_sentiment(response: SentimentResponse) -> ClientResult<SentimentResult> {
    if let Some(error) = response.errors.first() {
        return Ok(SentimentResult::error(error.describe()));
    }
    let document = response
        .documents
        .into_iter()
        .next()
        .ok_or_else(|| ClientError::Response {
            operation: "sentiment".to_string(),
            detail: "no documents in response".to_string(),
        })?;

    let overall = parse_sentiment(&document.sentiment)?;
    let sentences = document
        .sentences
        .iter()
        .map(|sentence| Sentence {
            text: sentence.text.clone(),
            opinions: sentence
                .targets
                .iter()
                .map(|target| {
                    let assessments = target
                        .relations
                        .iter()
                        .filter(|r| r.relation_type == "assessment")
                        .filter_map(|r| parse_assessment_ref(&r.reference))
                        .filter_map(|(s, a)| document.sentences.get(s)?.assessments.get(a))
                        .map(|a| a.text.clone());
                    SentenceOpinion::new(
                        target.text.clone(),
                        parse_target_sentiment(&target.sentiment),
                        assessments,
                    )
                })
                .collect(),
        })
        .collect();
    Ok(SentimentResult::new(overall, sentences))
}

fn map_summaries(job: JobState) -> Vec<SummaryDocument> {
    let mut documents = Vec::new();
    for results in job.tasks.items.into_iter().filter_map(|item| item.results) {
        for doc in results.documents {
            documents.push(SummaryDocument {
                is_error: false,
                summaries: doc.summaries.into_iter().map(|s| s.text).collect(),
            });
        }
        for error in &results.errors {
            debug!(document = %error.id, error = %error.describe(), "summarization document error");
            documents.push(SummaryDocument {
                is_error: true,
                summaries: Vec::new(),
            });
        }
    }
    documents
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Azure AI Language client implementing [`LanguageAnalyzer`]
pub struct TextAnalyticsClient {
    config: AzureLanguageConfig,
    http: reqwest::Client,
}

impl TextAnalyticsClient {
    pub fn new(config: AzureLanguageConfig) -> ClientResult<Self> {
        if config.endpoint.is_empty() {
            return Err(ClientError::Config(
                "azure language endpoint must not be empty".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("feedback-triage/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { config, http })
    }

    async fn post(
        &self,
        replay: Replay,
        operation: &str,
        url: &str,
        body: &serde_json::Value,
    ) -> ClientResult<reqwest::Response> {
        send_with_retry(&self.config.retry, replay, operation, || {
            self.http
                .post(url)
                .header(SUBSCRIPTION_KEY_HEADER, &self.config.key)
                .json(body)
        })
        .await
    }

    #[instrument(skip_all)]
    pub async fn detect_languages(&self, text: &str) -> ClientResult<Vec<DetectedLanguage>> {
        let url = format!("{}/text/analytics/v3.1/languages", self.config.endpoint);
        let body = json!({"documents": [{"id": DOCUMENT_ID, "text": text}]});
        let response = self.post(Replay::Any, "language detection", &url, &body).await?;
        let parsed: LanguagesResponse = read_json(response, "language detection").await?;
        Ok(map_languages(parsed))
    }

    #[instrument(skip(self, text))]
    pub async fn sentiment(&self, text: &str, language_code: &str) -> ClientResult<SentimentResult> {
        let url = format!(
            "{}/text/analytics/v3.1/sentiment?opinionMining=true",
            self.config.endpoint
        );
        let body = json!({"documents": [{"id": DOCUMENT_ID, "language": language_code, "text": text}]});
        let response = self.post(Replay::Any, "sentiment", &url, &body).await?;
        let parsed: SentimentResponse = read_json(response, "sentiment").await?;
        map_sentiment(parsed)
    }

    /// Submit an abstractive summarization job and poll it to completion.
    #[instrument(skip(self, text))]
    pub async fn abstractive_summary(
        &self,
        text: &str,
        language_code: &str,
    ) -> ClientResult<Vec<SummaryDocument>> {
        let url = format!(
            "{}/language/analyze-text/jobs?api-version={ANALYZE_TEXT_API_VERSION}",
            self.config.endpoint
        );
        let body = json!({
            "displayName": "feedback-triage summary",
            "analysisInput": {
                "documents": [{"id": DOCUMENT_ID, "language": language_code, "text": text}]
            },
            "tasks": [{"kind": "AbstractiveSummarization", "taskName": "summary"}]
        });
        let response = self.post(Replay::Unsent, "summarization submit", &url, &body).await?;
        let job_url = response
            .headers()
            .get("operation-location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ClientError::Response {
                operation: "summarization submit".to_string(),
                detail: "missing operation-location header".to_string(),
            })?;

        loop {
            tokio::time::sleep(self.config.poll_interval).await;
            let retry = &self.config.retry;
            let response = send_with_retry(retry, Replay::Any, "summarization poll", || {
                self.http
                    .get(&job_url)
                    .header(SUBSCRIPTION_KEY_HEADER, &self.config.key)
            })
            .await?;
            let job: JobState = read_json(response, "summarization poll").await?;
            let status = job.status.clone();
            debug!(status = %status, "summarization job polled");

            match status.as_str() {
                "succeeded" => return Ok(map_summaries(job)),
                "partiallyCompleted" | "partiallySucceeded" => {
                    warn!("summarization job partially completed");
                    return Ok(map_summaries(job));
                }
                "failed" | "cancelled" | "cancelling" => {
                    let detail = job
                        .errors
                        .iter()
                        .map(|e| format!("{}: {}", e.code, e.message))
                        .collect::<Vec<_>>()
                        .join("; ");
                    return Err(ClientError::Operation(format!(
                        "summarization job {status}: {detail}"
                    )));
                }
                _ => continue,
            }
        }
    }
}

#[async_trait]
impl LanguageAnalyzer for TextAnalyticsClient {
    async fn detect(&self, text: &str) -> CollaboratorResult<Vec<DetectedLanguage>> {
        Ok(self.detect_languages(text).await?)
    }

    async fn analyze_sentiment(
        &self,
        text: &str,
        language_code: &str,
    ) -> CollaboratorResult<SentimentResult> {
        Ok(self.sentiment(text, language_code).await?)
    }

    async fn summarize(
        &self,
        text: &str,
        language_code: &str,
    ) -> CollaboratorResult<Vec<SummaryDocument>> {
        Ok(self.abstractive_summary(text, language_code).await?)
    }
}
