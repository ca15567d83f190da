//! Error collection and digest rendering.
//!
//! An [`ErrorCollector`] is created at the start of a run and handed to every
//! comment task. Records are appended whole under a lock and drained exactly
//! once at run end into a [`Digest`] for the notifier.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::ErrorRecord;

/// Append-only, run-scoped list of [`ErrorRecord`]s shared across comment tasks.
#[derive(Debug, Clone, Default)]
pub struct ErrorCollector {
    records: Arc<Mutex<Vec<ErrorRecord>>>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, record: ErrorRecord) {
        self.records.lock().await.push(record);
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Take every record collected so far, leaving the collector empty.
    pub async fn drain(&self) -> Vec<ErrorRecord> {
        std::mem::take(&mut *self.records.lock().await)
    }
}

/// The end-of-run notification payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Digest {
    pub run_id: Uuid,
    pub submission_id: String,
    pub generated_at: DateTime<Utc>,
    pub records: Vec<ErrorRecord>,
}

impl Digest {
    pub const SUBJECT: &'static str = "Errors found after last pipeline run";

    pub fn new(run_id: Uuid, submission_id: impl Into<String>, records: Vec<ErrorRecord>) -> Self {
        Self {
            run_id,
            submission_id: submission_id.into(),
            generated_at: Utc::now(),
            records,
        }
    }

    pub fn subject(&self) -> &'static str {
        Self::SUBJECT
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Plain-text body: a short header followed by the records as pretty JSON.
    pub fn plain_text(&self) -> String {
        let records = serde_json::to_string_pretty(&self.records).unwrap_or_else(|_| {
            self.records
                .iter()
                .map(|r| format!("{}: {}", r.cause, r.message))
                .collect::<Vec<_>>()
                .join("\n")
        });
        format!(
            "The following issues were raised during the last pipeline execution \
             (run {}, submission {}):\n\n{}",
            self.run_id, self.submission_id, records
        )
    }
}
