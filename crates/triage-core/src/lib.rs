//! Feedback Triage Core
//!
//! Turns the comments of a discussion thread into deduplicated defect tickets.
//! Each comment walks a forward-only state machine:
//!
//! dedup check → language gate → sentiment gate → summarization →
//! complaint extraction → grouped ticket filing
//!
//! Failures are isolated to the comment that produced them and collected into
//! a single digest that is handed to the [`Notifier`] once per run.
//!
//! ## Key Components
//!
//! - [`collaborators`]: async traits for the thread source, ticket tracker,
//!   language analysis service and notifier
//! - [`stages`]: one module per pipeline stage, each returning a [`StageOutcome`]
//! - [`digest`]: the per-run [`ErrorCollector`] and the rendered [`Digest`]
//! - [`orchestrator`]: the bounded worker pool driving a whole thread
//! - [`fakes`]: in-memory collaborators for tests and local dry runs

pub mod collaborators;
pub mod config;
pub mod digest;
pub mod domain;
mod error;
pub mod fakes;
pub mod orchestrator;
pub mod stages;
pub mod telemetry;

pub use collaborators::{
    Collaborators, LanguageAnalyzer, LogNotifier, Notifier, ThreadSource, TicketTracker,
};
pub use config::PipelineConfig;
pub use digest::{Digest, ErrorCollector};
pub use domain::{
    Assessment, Comment, ComplaintGroup, ComplaintGroups, CreatedTicket, DetectedLanguage,
    ErrorRecord, FiledTicket, LanguageDetection, Priority, Sentence, SentenceOpinion, Sentiment,
    SentimentResult, SummaryDocument, TargetSentiment, TicketRequest, TicketSummary,
};
pub use error::{CollaboratorError, CollaboratorResult, TriageError, TriageResult};
pub use orchestrator::{CommentReport, CommentState, Orchestrator, RunReport};
pub use stages::{SkipReason, Stage, StageFailure, StageOutcome};
pub use telemetry::{init_tracing, LogFormat};
