//! Pipeline tuning knobs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{TriageError, TriageResult};

/// Configuration for one orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum number of comments processed concurrently.
    pub max_concurrent_comments: usize,

    /// Deadline for every per-comment collaborator call except summarization.
    pub call_timeout: Duration,

    /// Deadline for a whole submit-and-poll summarization job.
    pub summarize_timeout: Duration,

    /// Deadline for fetching the full thread, however many pages it takes.
    pub fetch_timeout: Duration,

    /// Record an `ErrorRecord` when a comment is skipped for its language.
    pub report_unsupported_language: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_comments: 4,
            call_timeout: Duration::from_secs(30),
            summarize_timeout: Duration::from_secs(180),
            fetch_timeout: Duration::from_secs(300),
            report_unsupported_language: false,
        }
    }
}

impl PipelineConfig {
    pub fn with_max_concurrent(mut self, max_concurrent_comments: usize) -> Self {
        self.max_concurrent_comments = max_concurrent_comments;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_summarize_timeout(mut self, timeout: Duration) -> Self {
        self.summarize_timeout = timeout;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_report_unsupported_language(mut self, report: bool) -> Self {
        self.report_unsupported_language = report;
        self
    }

    /// Reject values that would stall or disable the worker pool.
    pub fn validate(&self) -> TriageResult<()> {
        if self.max_concurrent_comments == 0 {
            return Err(TriageError::Config(
                "max_concurrent_comments must be at least 1".to_string(),
            ));
        }
        if self.call_timeout.is_zero() {
            return Err(TriageError::Config(
                "call_timeout must be greater than zero".to_string(),
            ));
        }
        if self.summarize_timeout.is_zero() {
            return Err(TriageError::Config(
                "summarize_timeout must be greater than zero".to_string(),
            ));
        }
        if self.fetch_timeout.is_zero() {
            return Err(TriageError::Config(
                "fetch_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
