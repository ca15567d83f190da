//! Run orchestration.
//!
//! [`Orchestrator::run`] fetches a thread, fans its comments into a bounded
//! pool of tokio tasks and merges their outcomes. Each comment walks
//!
//! `Fetched → DedupChecked → LanguageGated → SentimentGated → Summarized →
//! ComplaintsExtracted → Filed`
//!
//! or stops early in one of the skip states or `Failed(stage)`. A failing
//! comment never aborts its siblings; only a failed thread fetch aborts the
//! run. When the run produced any [`ErrorRecord`], the notifier receives one
//! digest holding all of them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

use crate::collaborators::{Collaborators, Notifier};
use crate::config::PipelineConfig;
use crate::digest::{Digest, ErrorCollector};
use crate::domain::{Comment, ErrorRecord, FiledTicket, LanguageDetection, Sentiment};
use crate::error::{TriageError, TriageResult};
use crate::stages::{
    analyze_sentiment, check_duplicate, detect_language, extract_complaints, file_tickets,
    summarize_comment, with_deadline, SkipReason, Stage, StageFailure, StageOutcome,
};

/// Position of a comment in the pipeline state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentState {
    Fetched,
    DedupChecked,
    LanguageGated,
    SentimentGated,
    Summarized,
    ComplaintsExtracted,
    Filed,
    SkippedDuplicate,
    SkippedUnsupportedLanguage,
    SkippedNeutralSentiment,
    Failed(Stage),
}

impl CommentState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CommentState::Filed
                | CommentState::SkippedDuplicate
                | CommentState::SkippedUnsupportedLanguage
                | CommentState::SkippedNeutralSentiment
                | CommentState::Failed(_)
        )
    }
}

/// Everything one comment went through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentReport {
    pub comment_id: String,

    /// Every state visited, starting at `Fetched`.
    pub path: Vec<CommentState>,

    pub language: Option<LanguageDetection>,
    pub sentiment: Option<Sentiment>,
    pub skip: Option<SkipReason>,
    pub tickets: Vec<FiledTicket>,
}

impl CommentReport {
    fn new(comment_id: &str) -> Self {
        Self {
            comment_id: comment_id.to_string(),
            path: vec![CommentState::Fetched],
            language: None,
            sentiment: None,
            skip: None,
            tickets: Vec::new(),
        }
    }

    fn failed_task(comment_id: &str) -> Self {
        let mut report = Self::new(comment_id);
        report.advance(CommentState::Failed(Stage::Unexpected));
        report
    }

    fn advance(&mut self, state: CommentState) {
        self.path.push(state);
    }

    fn skip(mut self, state: CommentState, reason: SkipReason) -> Self {
        info!(comment_id = %self.comment_id, reason = ?reason, "comment skipped");
        self.skip = Some(reason);
        self.advance(state);
        self
    }

    async fn fail(mut self, failure: StageFailure, errors: &ErrorCollector) -> Self {
        error!(
            comment_id = %self.comment_id,
            stage = %failure.stage,
            detail = %failure.detail,
            "comment processing failed"
        );
        errors.record(failure.to_record()).await;
        self.advance(CommentState::Failed(failure.stage));
        self
    }

    /// Terminal (or latest) state.
    pub fn state(&self) -> CommentState {
        self.path.last().copied().unwrap_or(CommentState::Fetched)
    }
}

/// Outcome of one [`Orchestrator::run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub submission_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// One entry per fetched comment, in thread order.
    pub comments: Vec<CommentReport>,

    /// Every record of the digest, drained from the run's collector.
    pub errors: Vec<ErrorRecord>,

    /// The notifier accepted the digest.
    pub digest_sent: bool,
}

impl RunReport {
    pub fn tickets(&self) -> impl Iterator<Item = &FiledTicket> {
        self.comments.iter().flat_map(|c| c.tickets.iter())
    }

    /// Number of comments that ended in `state`.
    pub fn count_in(&self, state: CommentState) -> usize {
        self.comments.iter().filter(|c| c.state() == state).count()
    }

    pub fn comment(&self, comment_id: &str) -> Option<&CommentReport> {
        self.comments.iter().find(|c| c.comment_id == comment_id)
    }
}

struct PipelineContext {
    clients: Collaborators,
    config: PipelineConfig,
}

/// Drives a whole thread through the pipeline.
#[derive(Clone)]
pub struct Orchestrator {
    ctx: Arc<PipelineContext>,
}

impl Orchestrator {
    pub fn new(clients: Collaborators, config: PipelineConfig) -> TriageResult<Self> {
        config.validate()?;
        Ok(Self {
            ctx: Arc::new(PipelineContext { clients, config }),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.ctx.config
    }

    /// Process every comment of `submission_id` and deliver the digest.
    ///
    /// Returns `Err(TriageError::ThreadFetch)` only when the thread itself
    /// cannot be fetched; per-comment failures end up in
    /// [`RunReport::errors`].
    #[instrument(skip(self))]
    pub async fn run(&self, submission_id: &str) -> TriageResult<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let config = &self.ctx.config;

        let comments = with_deadline(
            config.fetch_timeout,
            self.ctx.clients.threads.fetch_comments(submission_id),
        )
        .await
        .map_err(|source| TriageError::ThreadFetch {
            submission_id: submission_id.to_string(),
            source,
        })?;

        info!(
            run_id = %run_id,
            comments = comments.len(),
            max_concurrent = config.max_concurrent_comments,
            "starting triage run"
        );

        let errors = ErrorCollector::new();
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_comments));
        let mut tasks = Vec::with_capacity(comments.len());

        for comment in comments {
            let ctx = Arc::clone(&self.ctx);
            let errors = errors.clone();
            let semaphore = Arc::clone(&semaphore);
            let comment_id = comment.id.clone();
            let span = info_span!("comment", comment_id = %comment.id);

            let handle = tokio::spawn(
                async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    process_comment(&ctx, &comment, &errors).await
                }
                .instrument(span),
            );
            tasks.push((comment_id, handle));
        }

        let mut reports = Vec::with_capacity(tasks.len());
        let joined = futures::future::join_all(
            tasks
                .into_iter()
                .map(|(comment_id, handle)| async move { (comment_id, handle.await) }),
        )
        .await;

        for (comment_id, joined) in joined {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!(comment_id = %comment_id, error = %e, "comment task aborted");
                    errors
                        .record(ErrorRecord::new(
                            Stage::Unexpected.name(),
                            format!("processing comment {comment_id} aborted: {e}"),
                        ))
                        .await;
                    reports.push(CommentReport::failed_task(&comment_id));
                }
            }
        }

        let records = errors.drain().await;
        let digest_sent = if records.is_empty() {
            debug!("no errors recorded, skipping digest");
            false
        } else {
            let digest = Digest::new(run_id, submission_id, records.clone());
            deliver_digest(
                self.ctx.clients.notifier.as_ref(),
                &digest,
                config.call_timeout,
            )
            .await
        };

        let report = RunReport {
            run_id,
            submission_id: submission_id.to_string(),
            started_at,
            finished_at: Utc::now(),
            comments: reports,
            errors: records,
            digest_sent,
        };

        info!(
            run_id = %run_id,
            filed = report.count_in(CommentState::Filed),
            tickets = report.tickets().count(),
            errors = report.errors.len(),
            "triage run finished"
        );

        Ok(report)
    }

    /// Run a single comment through the pipeline, recording failures in `errors`.
    pub async fn process_comment(&self, comment: &Comment, errors: &ErrorCollector) -> CommentReport {
        process_comment(&self.ctx, comment, errors).await
    }
}

/// Best-effort: failures are logged and never retried.
async fn deliver_digest(
    notifier: &dyn Notifier,
    digest: &Digest,
    deadline: std::time::Duration,
) -> bool {
    match with_deadline(deadline, notifier.send_digest(digest)).await {
        Ok(()) => {
            info!(records = digest.records.len(), "error digest sent");
            true
        }
        Err(e) => {
            error!(error = %e, records = digest.records.len(), "failed to send error digest");
            false
        }
    }
}

async fn process_comment(
    ctx: &PipelineContext,
    comment: &Comment,
    errors: &ErrorCollector,
) -> CommentReport {
    let clients = &ctx.clients;
    let config = &ctx.config;
    let mut report = CommentReport::new(&comment.id);

    match check_duplicate(clients.tracker.as_ref(), comment, config.call_timeout).await {
        StageOutcome::Proceed(()) => report.advance(CommentState::DedupChecked),
        StageOutcome::Skip(reason) => return report.skip(CommentState::SkippedDuplicate, reason),
        StageOutcome::Fail(failure) => return report.fail(failure, errors).await,
    }

    let language =
        match detect_language(clients.language.as_ref(), comment, config.call_timeout).await {
            StageOutcome::Proceed(language) => language,
            StageOutcome::Skip(reason) => {
                if let SkipReason::UnsupportedLanguage {
                    language_code,
                    confidence,
                } = &reason
                {
                    warn!(
                        language = %language_code,
                        confidence,
                        "comment language not supported for summarization"
                    );
                    if config.report_unsupported_language {
                        errors
                            .record(ErrorRecord::new(
                                "unsupported language",
                                format!(
                                    "Comment language {language_code} with confidence score \
                                     {confidence} is not supported for comment {}",
                                    comment.id
                                ),
                            ))
                            .await;
                    }
                }
                return report.skip(CommentState::SkippedUnsupportedLanguage, reason);
            }
            StageOutcome::Fail(failure) => return report.fail(failure, errors).await,
        };
    report.language = Some(language.clone());
    report.advance(CommentState::LanguageGated);

    let verdict = match analyze_sentiment(
        clients.language.as_ref(),
        comment,
        &language,
        config.call_timeout,
    )
    .await
    {
        StageOutcome::Proceed(verdict) => verdict,
        StageOutcome::Skip(reason) => {
            return report.skip(CommentState::SkippedNeutralSentiment, reason)
        }
        StageOutcome::Fail(failure) => return report.fail(failure, errors).await,
    };
    report.sentiment = Some(verdict.result.overall_sentiment);
    report.advance(CommentState::SentimentGated);

    let summary = summarize_comment(
        clients.language.as_ref(),
        comment,
        &language,
        config.summarize_timeout,
    )
    .await;
    report.advance(CommentState::Summarized);

    let groups = extract_complaints(&verdict.result);
    report.advance(CommentState::ComplaintsExtracted);
    if groups.is_empty() {
        debug!("no negative opinions mined, nothing to file");
    }

    let filing = file_tickets(
        clients.tracker.as_ref(),
        comment,
        &groups,
        verdict.priority,
        &summary,
        config.call_timeout,
    )
    .await;
    for failure in &filing.failures {
        errors.record(failure.to_record()).await;
    }
    report.tickets = filing.created;
    report.advance(CommentState::Filed);
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(CommentState::Filed.is_terminal());
        assert!(CommentState::Failed(Stage::Dedup).is_terminal());
        assert!(CommentState::SkippedNeutralSentiment.is_terminal());
        assert!(!CommentState::Summarized.is_terminal());
        assert!(!CommentState::Fetched.is_terminal());
    }

    #[test]
    fn test_failed_task_report() {
        let report = CommentReport::failed_task("c9");
        assert_eq!(report.state(), CommentState::Failed(Stage::Unexpected));
        assert_eq!(report.path.len(), 2);
    }
}
