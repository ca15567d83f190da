//! HTTP adapters for the triage collaborator traits
//!
//! - [`reddit::RedditClient`]: [`triage_core::ThreadSource`] over the Reddit API
//! - [`text_analytics::TextAnalyticsClient`]: [`triage_core::LanguageAnalyzer`]
//!   over Azure AI Language
//! - [`jira::JiraClient`]: [`triage_core::TicketTracker`] over Jira Cloud REST
//! - [`email::EmailNotifier`]: [`triage_core::Notifier`] over Azure
//!   Communication Services e-mail
//!
//! All adapters share the retrying request loop in [`transport`].

pub mod email;
pub mod error;
pub mod jira;
pub mod reddit;
pub mod text_analytics;
pub mod transport;

pub use email::{EmailConfig, EmailNotifier};
pub use error::{ClientError, ClientResult};
pub use jira::{JiraClient, JiraConfig};
pub use reddit::{RedditClient, RedditConfig};
pub use text_analytics::{AzureLanguageConfig, TextAnalyticsClient};
pub use transport::RetryPolicy;
