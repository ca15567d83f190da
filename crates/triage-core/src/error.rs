//! Error types for the triage pipeline

use std::time::Duration;

use thiserror::Error;

/// Failure reported by an external collaborator (thread source, tracker,
/// language service or notifier).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// Network-level failure (connect, reset, TLS)
    #[error("transport failure: {0}")]
    Transport(String),

    /// Credentials rejected or missing
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Service answered with a non-success status
    #[error("service returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response could not be decoded
    #[error("malformed response: {0}")]
    Decode(String),

    /// A long-running operation finished in a failed state
    #[error("operation failed: {0}")]
    Operation(String),

    /// The call did not complete within its deadline
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Result type for collaborator calls
pub type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;

/// Errors that escalate past the comment boundary and abort a run.
#[derive(Error, Debug)]
pub enum TriageError {
    /// The thread itself could not be fetched; no comment was processed
    #[error("failed to fetch comments for submission {submission_id}: {source}")]
    ThreadFetch {
        submission_id: String,
        source: CollaboratorError,
    },

    /// Pipeline configuration is unusable
    #[error("invalid pipeline configuration: {0}")]
    Config(String),
}

/// Result type for run-level operations
pub type TriageResult<T> = std::result::Result<T, TriageError>;
