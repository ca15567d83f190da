//! Collaborator trait definitions
//!
//! The pipeline never talks to a network service directly. It is handed:
//! - `ThreadSource`: fetches the comments of a discussion thread
//! - `TicketTracker`: searches and creates tickets
//! - `LanguageAnalyzer`: language detection, sentiment/opinion mining and
//!   abstractive summarization
//! - `Notifier`: delivers the end-of-run error digest
//!
//! All traits are async and backend-agnostic. In-memory fakes live in the
//! `fakes` module; HTTP adapters live in the `triage-clients` crate.

use std::sync::Arc;

use async_trait::async_trait;

use crate::digest::Digest;
use crate::domain::{
    Comment, CreatedTicket, DetectedLanguage, SentimentResult, SummaryDocument, TicketRequest,
    TicketSummary,
};
use crate::error::CollaboratorResult;

/// Source of discussion-thread comments.
#[async_trait]
pub trait ThreadSource: Send + Sync {
    /// Every comment of the thread, in thread order.
    async fn fetch_comments(&self, submission_id: &str) -> CollaboratorResult<Vec<Comment>>;
}

/// Issue tracker used both for dedup lookups and ticket creation.
#[async_trait]
pub trait TicketTracker: Send + Sync {
    /// Tickets whose description references `comment_id`. Empty means not filed yet.
    async fn search_by_comment_id(&self, comment_id: &str)
        -> CollaboratorResult<Vec<TicketSummary>>;

    /// Create one ticket.
    async fn create_ticket(&self, request: &TicketRequest) -> CollaboratorResult<CreatedTicket>;
}

/// Natural-language analysis primitives.
#[async_trait]
pub trait LanguageAnalyzer: Send + Sync {
    /// One entry per submitted document; the pipeline submits one at a time.
    async fn detect(&self, text: &str) -> CollaboratorResult<Vec<DetectedLanguage>>;

    /// Sentiment with opinion mining enabled.
    async fn analyze_sentiment(
        &self,
        text: &str,
        language_code: &str,
    ) -> CollaboratorResult<SentimentResult>;

    /// Submit an abstractive summarization job and resolve once it completes.
    async fn summarize(
        &self,
        text: &str,
        language_code: &str,
    ) -> CollaboratorResult<Vec<SummaryDocument>>;
}

/// Delivery of the end-of-run digest. Best-effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_digest(&self, digest: &Digest) -> CollaboratorResult<()>;
}

/// The shared, read-only client set a run is wired with.
#[derive(Clone)]
pub struct Collaborators {
    pub threads: Arc<dyn ThreadSource>,
    pub tracker: Arc<dyn TicketTracker>,
    pub language: Arc<dyn LanguageAnalyzer>,
    pub notifier: Arc<dyn Notifier>,
}

impl Collaborators {
    pub fn new(
        threads: Arc<dyn ThreadSource>,
        tracker: Arc<dyn TicketTracker>,
        language: Arc<dyn LanguageAnalyzer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            threads,
            tracker,
            language,
            notifier,
        }
    }
}

/// Notifier that writes the digest to the log instead of delivering it.
///
/// Used when no delivery channel is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_digest(&self, digest: &Digest) -> CollaboratorResult<()> {
        tracing::warn!(
            run_id = %digest.run_id,
            records = digest.records.len(),
            subject = digest.subject(),
            "no notification channel configured, logging digest:\n{}",
            digest.plain_text()
        );
        Ok(())
    }
}
