//! In-memory fakes for the collaborator traits
//!
//! Provides `MemoryThreadSource`, `MemoryTicketTracker`,
//! `ScriptedLanguageAnalyzer` and `MemoryNotifier`, which satisfy the trait
//! contracts without any network and record every call they receive.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::collaborators::{LanguageAnalyzer, Notifier, ThreadSource, TicketTracker};
use crate::digest::Digest;
use crate::domain::{
    Comment, CreatedTicket, DetectedLanguage, Sentence, SentenceOpinion, Sentiment,
    SentimentResult, SummaryDocument, TicketRequest, TicketSummary,
};
use crate::error::{CollaboratorError, CollaboratorResult};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn server_error(body: &str) -> CollaboratorError {
    CollaboratorError::Status {
        status: 500,
        body: body.to_string(),
    }
}

// ---------------------------------------------------------------------------
// MemoryThreadSource
// ---------------------------------------------------------------------------

/// Threads keyed by submission id.
#[derive(Debug, Default)]
pub struct MemoryThreadSource {
    threads: Mutex<HashMap<String, Vec<Comment>>>,
    failure: Mutex<Option<CollaboratorError>>,
    delay: Option<Duration>,
    fetches: Mutex<Vec<String>>,
}

impl MemoryThreadSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thread(self, submission_id: &str, comments: Vec<Comment>) -> Self {
        lock(&self.threads).insert(submission_id.to_string(), comments);
        self
    }

    /// Make every fetch fail with `error`.
    pub fn failing_with(self, error: CollaboratorError) -> Self {
        *lock(&self.failure) = Some(error);
        self
    }

    /// Every fetch takes `delay` before answering.
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fetches(&self) -> Vec<String> {
        lock(&self.fetches).clone()
    }
}

#[async_trait]
impl ThreadSource for MemoryThreadSource {
    async fn fetch_comments(&self, submission_id: &str) -> CollaboratorResult<Vec<Comment>> {
        lock(&self.fetches).push(submission_id.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = lock(&self.failure).clone() {
            return Err(error);
        }
        lock(&self.threads)
            .get(submission_id)
            .cloned()
            .ok_or_else(|| CollaboratorError::Status {
                status: 404,
                body: format!("submission {submission_id} not found"),
            })
    }
}

// ---------------------------------------------------------------------------
// MemoryTicketTracker
// ---------------------------------------------------------------------------

/// A ticket held by [`MemoryTicketTracker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTicket {
    pub key: String,
    pub request: TicketRequest,
}

#[derive(Debug, Default)]
struct TrackerState {
    tickets: Vec<StoredTicket>,
    searches: Vec<String>,
    create_attempts: Vec<TicketRequest>,
    failing_searches: HashSet<String>,
    failing_summary_prefixes: Vec<String>,
}

/// Tracker whose search matches comment ids against stored descriptions, the
/// way a full-text `description ~ id` query would.
#[derive(Debug)]
pub struct MemoryTicketTracker {
    project_key: String,
    state: Mutex<TrackerState>,
}

impl Default for MemoryTicketTracker {
    fn default() -> Self {
        Self::new("TRIAGE")
    }
}

impl MemoryTicketTracker {
    pub fn new(project_key: &str) -> Self {
        Self {
            project_key: project_key.to_string(),
            state: Mutex::new(TrackerState::default()),
        }
    }

    /// Pre-existing ticket, as if filed by an earlier run.
    pub fn with_ticket(self, request: TicketRequest) -> Self {
        {
            let mut state = lock(&self.state);
            let key = format!("{}-{}", self.project_key, state.tickets.len() + 1);
            state.tickets.push(StoredTicket { key, request });
        }
        self
    }

    /// Searches for `comment_id` fail with a 500.
    pub fn fail_search_for(self, comment_id: &str) -> Self {
        lock(&self.state)
            .failing_searches
            .insert(comment_id.to_string());
        self
    }

    /// Creations whose summary starts with `prefix` fail with a 500.
    pub fn fail_create_when_summary_starts_with(self, prefix: &str) -> Self {
        lock(&self.state)
            .failing_summary_prefixes
            .push(prefix.to_string());
        self
    }

    pub fn tickets(&self) -> Vec<StoredTicket> {
        lock(&self.state).tickets.clone()
    }

    pub fn search_calls(&self) -> Vec<String> {
        lock(&self.state).searches.clone()
    }

    /// Every creation attempt, successful or not.
    pub fn create_calls(&self) -> Vec<TicketRequest> {
        lock(&self.state).create_attempts.clone()
    }
}

#[async_trait]
impl TicketTracker for MemoryTicketTracker {
    async fn search_by_comment_id(
        &self,
        comment_id: &str,
    ) -> CollaboratorResult<Vec<TicketSummary>> {
        let mut state = lock(&self.state);
        state.searches.push(comment_id.to_string());
        if state.failing_searches.contains(comment_id) {
            return Err(server_error("search unavailable"));
        }
        Ok(state
            .tickets
            .iter()
            .filter(|t| t.request.description.contains(comment_id))
            .map(|t| TicketSummary {
                key: t.key.clone(),
                summary: t.request.summary.clone(),
            })
            .collect())
    }

    async fn create_ticket(&self, request: &TicketRequest) -> CollaboratorResult<CreatedTicket> {
        let mut state = lock(&self.state);
        state.create_attempts.push(request.clone());
        if state
            .failing_summary_prefixes
            .iter()
            .any(|p| request.summary.starts_with(p.as_str()))
        {
            return Err(server_error("create rejected"));
        }
        let key = format!("{}-{}", self.project_key, state.tickets.len() + 1);
        state.tickets.push(StoredTicket {
            key: key.clone(),
            request: request.clone(),
        });
        Ok(CreatedTicket { key })
    }
}

// ---------------------------------------------------------------------------
// ScriptedLanguageAnalyzer
// ---------------------------------------------------------------------------

/// Canned responses for one comment body.
#[derive(Debug, Clone)]
pub struct AnalyzerScript {
    pub detections: CollaboratorResult<Vec<DetectedLanguage>>,
    pub sentiment: CollaboratorResult<SentimentResult>,
    pub summary: CollaboratorResult<Vec<SummaryDocument>>,

    /// Delay applied before answering the sentiment call.
    pub sentiment_delay: Option<Duration>,
    pub summary_delay: Option<Duration>,
}

impl AnalyzerScript {
    /// A comment in `language_code` with the given sentiment analysis.
    pub fn new(language_code: &str, confidence: f64, sentiment: SentimentResult) -> Self {
        Self {
            detections: Ok(vec![DetectedLanguage::new(language_code, confidence)]),
            sentiment: Ok(sentiment),
            summary: Ok(Vec::new()),
            sentiment_delay: None,
            summary_delay: None,
        }
    }

    /// An English comment whose opinions all sit in one sentence.
    pub fn english(overall: Sentiment, opinions: Vec<SentenceOpinion>) -> Self {
        Self::new(
            "en",
            0.98,
            SentimentResult::new(
                overall,
                vec![Sentence {
                    text: String::new(),
                    opinions,
                }],
            ),
        )
    }

    pub fn with_summary(mut self, summaries: &[&str]) -> Self {
        self.summary = Ok(vec![SummaryDocument {
            is_error: false,
            summaries: summaries.iter().map(|s| s.to_string()).collect(),
        }]);
        self
    }

    pub fn with_detections(mut self, detections: CollaboratorResult<Vec<DetectedLanguage>>) -> Self {
        self.detections = detections;
        self
    }

    pub fn with_sentiment(mut self, sentiment: CollaboratorResult<SentimentResult>) -> Self {
        self.sentiment = sentiment;
        self
    }

    pub fn with_summary_result(mut self, summary: CollaboratorResult<Vec<SummaryDocument>>) -> Self {
        self.summary = summary;
        self
    }

    pub fn with_sentiment_delay(mut self, delay: Duration) -> Self {
        self.sentiment_delay = Some(delay);
        self
    }

    pub fn with_summary_delay(mut self, delay: Duration) -> Self {
        self.summary_delay = Some(delay);
        self
    }
}

#[derive(Debug, Default)]
struct AnalyzerCalls {
    detect: Vec<String>,
    sentiment: Vec<(String, String)>,
    summarize: Vec<(String, String)>,
}

/// Analyzer answering from scripts keyed by the exact comment body.
///
/// Bodies without a script are reported as English and neutral.
#[derive(Debug, Default)]
pub struct ScriptedLanguageAnalyzer {
    scripts: Mutex<HashMap<String, AnalyzerScript>>,
    calls: Mutex<AnalyzerCalls>,
}

impl ScriptedLanguageAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(self, body: &str, script: AnalyzerScript) -> Self {
        lock(&self.scripts).insert(body.to_string(), script);
        self
    }

    fn script(&self, body: &str) -> AnalyzerScript {
        lock(&self.scripts).get(body).cloned().unwrap_or_else(|| {
            AnalyzerScript::new("en", 0.9, SentimentResult::new(Sentiment::Neutral, Vec::new()))
        })
    }

    pub fn detect_calls(&self) -> Vec<String> {
        lock(&self.calls).detect.clone()
    }

    /// `(body, language_code)` of every sentiment call.
    pub fn sentiment_calls(&self) -> Vec<(String, String)> {
        lock(&self.calls).sentiment.clone()
    }

    /// `(body, language_code)` of every summarization call.
    pub fn summarize_calls(&self) -> Vec<(String, String)> {
        lock(&self.calls).summarize.clone()
    }
}

#[async_trait]
impl LanguageAnalyzer for ScriptedLanguageAnalyzer {
    async fn detect(&self, text: &str) -> CollaboratorResult<Vec<DetectedLanguage>> {
        lock(&self.calls).detect.push(text.to_string());
        self.script(text).detections
    }

    async fn analyze_sentiment(
        &self,
        text: &str,
        language_code: &str,
    ) -> CollaboratorResult<SentimentResult> {
        lock(&self.calls)
            .sentiment
            .push((text.to_string(), language_code.to_string()));
        let script = self.script(text);
        if let Some(delay) = script.sentiment_delay {
            tokio::time::sleep(delay).await;
        }
        script.sentiment
    }

    async fn summarize(
        &self,
        text: &str,
        language_code: &str,
    ) -> CollaboratorResult<Vec<SummaryDocument>> {
        lock(&self.calls)
            .summarize
            .push((text.to_string(), language_code.to_string()));
        let script = self.script(text);
        if let Some(delay) = script.summary_delay {
            tokio::time::sleep(delay).await;
        }
        script.summary
    }
}

// ---------------------------------------------------------------------------
// MemoryNotifier
// ---------------------------------------------------------------------------

/// Notifier that keeps every digest it was handed.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Digest>>,
    fail: bool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send attempt is recorded but reported as failed.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<Digest> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn send_digest(&self, digest: &Digest) -> CollaboratorResult<()> {
        lock(&self.sent).push(digest.clone());
        if self.fail {
            return Err(CollaboratorError::Transport("mail relay unreachable".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Priority;

    #[tokio::test]
    async fn test_tracker_search_matches_description() {
        let tracker = MemoryTicketTracker::new("GAME").with_ticket(TicketRequest {
            summary: "Game: crashes".to_string(),
            description: "Comment: abc123.".to_string(),
            priority: Priority::High,
        });

        let hits = tracker.search_by_comment_id("abc123").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, "GAME-1");
        assert!(tracker.search_by_comment_id("zzz").await.unwrap().is_empty());
        assert_eq!(tracker.search_calls(), vec!["abc123", "zzz"]);
    }

    #[tokio::test]
    async fn test_tracker_create_failure_is_recorded() {
        let tracker = MemoryTicketTracker::default().fail_create_when_summary_starts_with("Lobby");
        let request = TicketRequest {
            summary: "Lobby: slow".to_string(),
            description: String::new(),
            priority: Priority::Medium,
        };
        assert!(tracker.create_ticket(&request).await.is_err());
        assert_eq!(tracker.create_calls().len(), 1);
        assert!(tracker.tickets().is_empty());
    }

    #[tokio::test]
    async fn test_unscripted_body_is_neutral_english() {
        let analyzer = ScriptedLanguageAnalyzer::new();
        let detections = analyzer.detect("hello").await.unwrap();
        assert_eq!(detections[0].language_code, "en");
        let sentiment = analyzer.analyze_sentiment("hello", "en").await.unwrap();
        assert_eq!(sentiment.overall_sentiment, Sentiment::Neutral);
    }

    #[tokio::test]
    async fn test_thread_source_unknown_submission() {
        let threads = MemoryThreadSource::new();
        let err = threads.fetch_comments("nope").await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Status { status: 404, .. }));
    }
}
