//! Error types for triage-clients

use thiserror::Error;
use triage_core::CollaboratorError;

/// Errors raised by the HTTP adapters
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Service answered with a non-success status
    #[error("{operation} failed with status {status}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Credentials rejected by an auth endpoint that answers 200
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Adapter configuration is unusable
    #[error("invalid client configuration: {0}")]
    Config(String),

    /// Response decoded but did not have the expected shape
    #[error("unexpected response from {operation}: {detail}")]
    Response { operation: String, detail: String },

    /// Long-running job ended in a failed state
    #[error("{0}")]
    Operation(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Http(err.to_string())
    }
}

impl From<ClientError> for CollaboratorError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Http(msg) => CollaboratorError::Transport(msg),
            ClientError::Status {
                operation,
                status: status @ (401 | 403),
                body,
            } => CollaboratorError::Auth(format!("{operation} rejected with {status}: {body}")),
            ClientError::Status { status, body, .. } => CollaboratorError::Status { status, body },
            ClientError::Json(e) => CollaboratorError::Decode(e.to_string()),
            ClientError::Response { operation, detail } => {
                CollaboratorError::Decode(format!("{operation}: {detail}"))
            }
            ClientError::Auth(msg) => CollaboratorError::Auth(msg),
            ClientError::Config(msg) => CollaboratorError::Operation(format!("misconfigured: {msg}")),
            ClientError::Operation(msg) => CollaboratorError::Operation(msg),
        }
    }
}

/// Result type for adapter calls
pub type ClientResult<T> = std::result::Result<T, ClientError>;
