//! Ticket requests and tracker responses.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::analysis::Sentiment;

/// Ticket priority, named the way the tracker expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
}

impl Priority {
    /// Negative comments are urgent, mixed ones less so.
    ///
    /// Returns `None` for sentiments that never reach the filer.
    pub fn from_sentiment(sentiment: Sentiment) -> Option<Self> {
        match sentiment {
            Sentiment::Negative => Some(Priority::High),
            Sentiment::Mixed => Some(Priority::Medium),
            Sentiment::Positive | Sentiment::Neutral => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ticket to be created for one (comment, complaint target) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRequest {
    pub summary: String,

    /// Always embeds the originating comment id so later runs can find it.
    pub description: String,

    pub priority: Priority,
}

/// Confirmation returned by the tracker after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedTicket {
    /// Tracker key, e.g. `GAME-42`.
    pub key: String,
}

/// A ticket the pipeline filed, linked back to its complaint target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiledTicket {
    pub key: String,
    pub target: String,
    pub priority: Priority,
}

/// A search hit from the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSummary {
    pub key: String,
    pub summary: String,
}
