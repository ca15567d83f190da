//! Domain models for the triage pipeline.
//!
//! - `Comment`: one piece of user feedback fetched from a thread
//! - `analysis`: language detection, sentiment and opinion-mining results
//! - `complaint`: negative opinions grouped by their target
//! - `ticket`: ticket requests, confirmations and search hits
//! - `ErrorRecord`: one entry of the end-of-run digest

pub mod analysis;
pub mod comment;
pub mod complaint;
pub mod ticket;

pub use analysis::{
    Assessment, DetectedLanguage, LanguageDetection, Sentence, SentenceOpinion, Sentiment,
    SentimentResult, SummaryDocument, TargetSentiment,
};
pub use comment::{Comment, ErrorRecord};
pub use complaint::{ComplaintGroup, ComplaintGroups};
pub use ticket::{CreatedTicket, FiledTicket, Priority, TicketRequest, TicketSummary};
