//! Comments and digest records.

use serde::{Deserialize, Serialize};

/// A single feedback comment attached to a discussion thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Opaque identity assigned by the thread source.
    pub id: String,

    /// Raw comment text.
    pub body: String,
}

impl Comment {
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
        }
    }
}

/// One problem encountered while processing a run.
///
/// Serialized with `Cause` / `Message` keys, the shape the digest body uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorRecord {
    /// Stage name or description of the failed operation.
    pub cause: String,

    /// Human-readable detail.
    pub message: String,
}

impl ErrorRecord {
    pub fn new(cause: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
            message: message.into(),
        }
    }
}
