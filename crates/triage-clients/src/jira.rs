//! Jira ticket tracker
//!
//! Dedup lookups go through the v3 JQL search; tickets are created through
//! the v2 issue endpoint so that descriptions stay plain text.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, instrument};
use triage_core::{CollaboratorResult, CreatedTicket, TicketRequest, TicketSummary, TicketTracker};

use crate::error::{ClientError, ClientResult};
use crate::transport::{read_json, send_with_retry, Replay, RetryPolicy};

/// Label attached to every ticket the pipeline files.
pub const TICKET_LABEL: &str = "bugfix";

/// Jira Cloud site and project settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraConfig {
    /// Site URL, e.g. `https://example.atlassian.net`
    pub base_url: String,
    pub email: String,
    pub api_token: String,
    pub project_id: String,
    pub reporter_id: String,
    pub issue_type_id: String,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl JiraConfig {
    pub fn new(
        base_url: &str,
        email: &str,
        api_token: &str,
        project_id: &str,
        reporter_id: &str,
        issue_type_id: &str,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            email: email.to_string(),
            api_token: api_token.to_string(),
            project_id: project_id.to_string(),
            reporter_id: reporter_id.to_string(),
            issue_type_id: issue_type_id.to_string(),
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<SearchIssue>,
}

#[derive(Debug, Deserialize)]
struct SearchIssue {
    key: String,
    #[serde(default)]
    fields: SearchFields,
}

#[derive(Debug, Default, Deserialize)]
struct SearchFields {
    #[serde(default)]
    summary: String,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    key: String,
}

/// Full-text match of the comment id against ticket descriptions.
pub fn search_jql(comment_id: &str) -> String {
    let escaped = comment_id.replace('\\', "\\\\").replace('"', "\\\"");
    format!("description ~ \"{escaped}\"")
}

/// Body of `POST /rest/api/2/issue`.
pub fn issue_payload(config: &JiraConfig, request: &TicketRequest) -> Value {
    json!({
        "fields": {
            "description": request.description,
            "issuetype": {"id": config.issue_type_id},
            "labels": [TICKET_LABEL],
            "project": {"id": config.project_id},
            "reporter": {"id": config.reporter_id},
            "summary": request.summary,
            "priority": {"name": request.priority.as_str()}
        }
    })
}

/// Jira REST client implementing [`TicketTracker`]
pub struct JiraClient {
    config: JiraConfig,
    http: reqwest::Client,
}

impl JiraClient {
    pub fn new(config: JiraConfig) -> ClientResult<Self> {
        if config.base_url.is_empty() {
            return Err(ClientError::Config("jira base url must not be empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("feedback-triage/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { config, http })
    }

    #[instrument(skip(self))]
    pub async fn search_issues(&self, comment_id: &str) -> ClientResult<Vec<TicketSummary>> {
        let url = format!("{}/rest/api/3/search", self.config.base_url);
        let query = [
            ("jql", search_jql(comment_id)),
            ("maxResults", "1".to_string()),
            ("fields", "summary".to_string()),
        ];
        let response = send_with_retry(&self.config.retry, Replay::Any, "jira search", || {
            self.http
                .get(&url)
                .basic_auth(&self.config.email, Some(&self.config.api_token))
                .header(reqwest::header::ACCEPT, "application/json")
                .query(&query)
        })
        .await?;
        let parsed: SearchResponse = read_json(response, "jira search").await?;
        debug!(hits = parsed.issues.len(), "jira search finished");
        Ok(parsed
            .issues
            .into_iter()
            .map(|issue| TicketSummary {
                key: issue.key,
                summary: issue.fields.summary,
            })
            .collect())
    }

    #[instrument(skip_all, fields(priority = %request.priority))]
    pub async fn create_issue(&self, request: &TicketRequest) -> ClientResult<CreatedTicket> {
        let url = format!("{}/rest/api/2/issue", self.config.base_url);
        let payload = issue_payload(&self.config, request);
        let retry = &self.config.retry;
        let response = send_with_retry(retry, Replay::Unsent, "jira create issue", || {
            self.http
                .post(&url)
                .basic_auth(&self.config.email, Some(&self.config.api_token))
                .header(reqwest::header::ACCEPT, "application/json")
                .json(&payload)
        })
        .await?;
        let created: CreateResponse = read_json(response, "jira create issue").await?;
        info!(key = %created.key, "jira issue created");
        Ok(CreatedTicket { key: created.key })
    }
}

#[async_trait]
impl TicketTracker for JiraClient {
    async fn search_by_comment_id(
        &self,
        comment_id: &str,
    ) -> CollaboratorResult<Vec<TicketSummary>> {
        Ok(self.search_issues(comment_id).await?)
    }

    async fn create_ticket(&self, request: &TicketRequest) -> CollaboratorResult<CreatedTicket> {
        Ok(self.create_issue(request).await?)
    }
}
