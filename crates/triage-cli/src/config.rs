//! Command-line and environment configuration.
//!
//! Every credential can be given as a flag or through the environment
//! variable named next to it. Values are only required once the adapter that
//! needs them is built.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use triage_clients::{AzureLanguageConfig, EmailConfig, JiraConfig, RedditConfig, RetryPolicy};
use triage_core::PipelineConfig;

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Reddit submission (thread) id, without the `t3_` prefix
    #[arg(long, env = "REDDIT_SUBMISSION_ID")]
    pub submission_id: String,

    #[command(flatten)]
    pub reddit: RedditArgs,

    #[command(flatten)]
    pub azure: AzureArgs,

    #[command(flatten)]
    pub jira: JiraArgs,

    #[command(flatten)]
    pub email: EmailArgs,

    #[command(flatten)]
    pub tuning: TuningArgs,

    /// Search the tracker but never create tickets
    #[arg(long, env = "TRIAGE_DRY_RUN")]
    pub dry_run: bool,

    /// Print the run report as JSON
    #[arg(long, env = "TRIAGE_JSON")]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RedditArgs {
    #[arg(long, env = "REDDIT_CLIENT_ID")]
    pub reddit_client_id: Option<String>,

    #[arg(long, env = "REDDIT_CLIENT_SECRET", hide_env_values = true)]
    pub reddit_client_secret: Option<String>,

    #[arg(long, env = "REDDIT_USERNAME")]
    pub reddit_username: Option<String>,

    #[arg(long, env = "REDDIT_PASSWORD", hide_env_values = true)]
    pub reddit_password: Option<String>,

    #[arg(long, env = "REDDIT_USER_AGENT")]
    pub reddit_user_agent: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct AzureArgs {
    /// Azure AI Language resource endpoint
    #[arg(long, env = "AZURE_AI_ENDPOINT")]
    pub azure_endpoint: Option<String>,

    #[arg(long, env = "AZURE_AI_KEY", hide_env_values = true)]
    pub azure_key: Option<String>,

    /// Seconds between summarization job polls
    #[arg(long, env = "TRIAGE_POLL_INTERVAL_SECS", default_value_t = 2)]
    pub poll_interval_secs: u64,
}

#[derive(Args, Debug, Clone)]
pub struct JiraArgs {
    #[arg(long, env = "JIRA_EMAIL")]
    pub jira_email: Option<String>,

    #[arg(long, env = "JIRA_TOKEN", hide_env_values = true)]
    pub jira_token: Option<String>,

    /// Jira site URL, e.g. https://example.atlassian.net
    #[arg(long, env = "JIRA_BASE_URL")]
    pub jira_base_url: Option<String>,

    #[arg(long, env = "JIRA_PROJECT_ID")]
    pub jira_project_id: Option<String>,

    #[arg(long, env = "JIRA_REPORTER_ID")]
    pub jira_reporter_id: Option<String>,

    /// Issue type id used for created tickets
    #[arg(long, env = "JIRA_ISSUE_TYPE")]
    pub jira_issue_type: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EmailArgs {
    /// ACS connection string; without it the digest is only logged
    #[arg(long, env = "EMAIL_CONNECTION_STRING", hide_env_values = true)]
    pub email_connection_string: Option<String>,

    #[arg(long, env = "EMAIL_SENDER")]
    pub email_sender: Option<String>,

    /// Comma separated recipient addresses
    #[arg(long, env = "EMAIL_RECIPIENTS")]
    pub email_recipients: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct TuningArgs {
    /// Comments processed concurrently
    #[arg(long, env = "TRIAGE_MAX_CONCURRENT", default_value_t = 4)]
    pub max_concurrent: usize,

    /// Deadline for each collaborator call
    #[arg(long, env = "TRIAGE_CALL_TIMEOUT_SECS", default_value_t = 30)]
    pub call_timeout_secs: u64,

    /// Deadline for a whole summarization job
    #[arg(long, env = "TRIAGE_SUMMARIZE_TIMEOUT_SECS", default_value_t = 180)]
    pub summarize_timeout_secs: u64,

    /// Deadline for fetching the whole thread, placeholder expansion included
    #[arg(long, env = "TRIAGE_FETCH_TIMEOUT_SECS", default_value_t = 300)]
    pub fetch_timeout_secs: u64,

    /// Add a digest entry for every comment skipped for its language
    #[arg(long, env = "TRIAGE_REPORT_UNSUPPORTED_LANGUAGE")]
    pub report_unsupported_language: bool,

    /// Attempts per HTTP request, including the first
    #[arg(long, env = "TRIAGE_RETRY_MAX_ATTEMPTS", default_value_t = 3)]
    pub retry_max_attempts: usize,

    #[arg(long, env = "TRIAGE_RETRY_BASE_DELAY_MS", default_value_t = 250)]
    pub retry_base_delay_ms: u64,
}

fn required<'a>(value: &'a Option<String>, flag: &str, env: &str) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => bail!("missing --{flag} (or {env})"),
    }
}

impl TuningArgs {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::default()
            .with_max_concurrent(self.max_concurrent)
            .with_call_timeout(Duration::from_secs(self.call_timeout_secs))
            .with_summarize_timeout(Duration::from_secs(self.summarize_timeout_secs))
            .with_fetch_timeout(Duration::from_secs(self.fetch_timeout_secs))
            .with_report_unsupported_language(self.report_unsupported_language)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_max_attempts, self.retry_base_delay_ms)
    }
}

impl RunArgs {
    pub fn reddit_config(&self) -> Result<RedditConfig> {
        let r = &self.reddit;
        Ok(RedditConfig::new(
            required(&r.reddit_client_id, "reddit-client-id", "REDDIT_CLIENT_ID")?,
            required(&r.reddit_client_secret, "reddit-client-secret", "REDDIT_CLIENT_SECRET")?,
            required(&r.reddit_username, "reddit-username", "REDDIT_USERNAME")?,
            required(&r.reddit_password, "reddit-password", "REDDIT_PASSWORD")?,
            required(&r.reddit_user_agent, "reddit-user-agent", "REDDIT_USER_AGENT")?,
        )
        .with_retry(self.tuning.retry_policy()))
    }

    pub fn azure_config(&self) -> Result<AzureLanguageConfig> {
        let a = &self.azure;
        Ok(AzureLanguageConfig::new(
            required(&a.azure_endpoint, "azure-endpoint", "AZURE_AI_ENDPOINT")?,
            required(&a.azure_key, "azure-key", "AZURE_AI_KEY")?,
        )
        .with_poll_interval(Duration::from_secs(a.poll_interval_secs.max(1)))
        .with_retry(self.tuning.retry_policy()))
    }

    pub fn jira_config(&self) -> Result<JiraConfig> {
        let j = &self.jira;
        Ok(JiraConfig::new(
            required(&j.jira_base_url, "jira-base-url", "JIRA_BASE_URL")?,
            required(&j.jira_email, "jira-email", "JIRA_EMAIL")?,
            required(&j.jira_token, "jira-token", "JIRA_TOKEN")?,
            required(&j.jira_project_id, "jira-project-id", "JIRA_PROJECT_ID")?,
            required(&j.jira_reporter_id, "jira-reporter-id", "JIRA_REPORTER_ID")?,
            required(&j.jira_issue_type, "jira-issue-type", "JIRA_ISSUE_TYPE")?,
        )
        .with_retry(self.tuning.retry_policy()))
    }

    /// `None` when no connection string is configured.
    pub fn email_config(&self) -> Result<Option<EmailConfig>> {
        let e = &self.email;
        let Some(connection_string) = e
            .email_connection_string
            .as_deref()
            .filter(|s| !s.trim().is_empty())
        else {
            return Ok(None);
        };
        let config = EmailConfig::from_connection_string(
            connection_string,
            required(&e.email_sender, "email-sender", "EMAIL_SENDER")?,
            required(&e.email_recipients, "email-recipients", "EMAIL_RECIPIENTS")?,
        )
        .context("Invalid e-mail notification settings")?;
        Ok(Some(config))
    }

    pub fn redacted(&self) -> RedactedConfig {
        fn state(value: &Option<String>) -> &'static str {
            match value.as_deref() {
                Some(v) if !v.trim().is_empty() => "set",
                _ => "unset",
            }
        }
        RedactedConfig {
            submission_id: self.submission_id.clone(),
            reddit_client_id: state(&self.reddit.reddit_client_id),
            reddit_client_secret: state(&self.reddit.reddit_client_secret),
            reddit_username: self.reddit.reddit_username.clone(),
            reddit_password: state(&self.reddit.reddit_password),
            reddit_user_agent: self.reddit.reddit_user_agent.clone(),
            azure_endpoint: self.azure.azure_endpoint.clone(),
            azure_key: state(&self.azure.azure_key),
            jira_base_url: self.jira.jira_base_url.clone(),
            jira_email: self.jira.jira_email.clone(),
            jira_token: state(&self.jira.jira_token),
            jira_project_id: self.jira.jira_project_id.clone(),
            email_connection_string: state(&self.email.email_connection_string),
            email_recipients: self.email.email_recipients.clone(),
            pipeline: self.tuning.pipeline_config(),
            retry: self.tuning.retry_policy(),
            dry_run: self.dry_run,
        }
    }
}

/// Effective configuration with secrets reduced to set/unset.
#[derive(Debug, Serialize)]
pub struct RedactedConfig {
    pub submission_id: String,
    pub reddit_client_id: &'static str,
    pub reddit_client_secret: &'static str,
    pub reddit_username: Option<String>,
    pub reddit_password: &'static str,
    pub reddit_user_agent: Option<String>,
    pub azure_endpoint: Option<String>,
    pub azure_key: &'static str,
    pub jira_base_url: Option<String>,
    pub jira_email: Option<String>,
    pub jira_token: &'static str,
    pub jira_project_id: Option<String>,
    pub email_connection_string: &'static str,
    pub email_recipients: Option<String>,
    pub pipeline: PipelineConfig,
    pub retry: RetryPolicy,
    pub dry_run: bool,
}
