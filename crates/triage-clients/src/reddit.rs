//! Reddit thread source
//!
//! Authenticates with the OAuth2 password grant of a Reddit "script" app and
//! reads the full comment tree of a submission. Every "load more" placeholder
//! is expanded through `/api/morechildren` and every "continue this thread"
//! placeholder through the comment's own permalink, until none remain.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use triage_core::{CollaboratorResult, Comment, ThreadSource};

use crate::error::{ClientError, ClientResult};
use crate::transport::{read_json, send_with_retry, Replay, RetryPolicy};

const DEFAULT_AUTH_URL: &str = "https://www.reddit.com";
const DEFAULT_API_URL: &str = "https://oauth.reddit.com";

/// `/api/morechildren` accepts at most this many ids per call.
const MORE_CHILDREN_BATCH: usize = 100;

/// Tokens are refreshed this long before they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Reddit script-app credentials and endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditConfig {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
    /// Host serving `/api/v1/access_token`
    pub auth_url: String,
    /// Host serving authenticated API calls
    pub api_url: String,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl RedditConfig {
    pub fn new(
        client_id: &str,
        client_secret: &str,
        username: &str,
        password: &str,
        user_agent: &str,
    ) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            user_agent: user_agent.to_string(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_auth_url(mut self, url: &str) -> Self {
        self.auth_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_url(mut self, url: &str) -> Self {
        self.api_url = url.trim_end_matches('/').to_string();
        self
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
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Reddit API client implementing [`ThreadSource`]
pub struct RedditClient {
    config: RedditConfig,
    http: reqwest::Client,
    token: Mutex<Option<AccessToken>>,
}

impl RedditClient {
    pub fn new(config: RedditConfig) -> ClientResult<Self> {
        if config.user_agent.trim().is_empty() {
            return Err(ClientError::Config(
                "reddit user agent must not be empty".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            config,
            http,
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> ClientResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_REFRESH_MARGIN < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let url = format!("{}/api/v1/access_token", self.config.auth_url);
        let form = [
            ("grant_type", "password"),
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];
        let response = send_with_retry(&self.config.retry, Replay::Any, "reddit token", || {
            self.http
                .post(&url)
                .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
                .form(&form)
        })
        .await?;
        let body: TokenResponse = read_json(response, "reddit token").await?;

        // Reddit reports bad credentials as 200 with an `error` field.
        if let Some(error) = body.error {
            return Err(ClientError::Auth(format!("reddit token request: {error}")));
        }
        let value = body.access_token.ok_or_else(|| ClientError::Response {
            operation: "reddit token".to_string(),
            detail: "missing access_token".to_string(),
        })?;
        let lifetime = Duration::from_secs(body.expires_in.unwrap_or(3600));
        debug!(expires_in_secs = lifetime.as_secs(), "obtained reddit access token");

        *cached = Some(AccessToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(value)
    }

    async fn get_json(&self, operation: &str, url: &str, query: &[(&str, String)]) -> ClientResult<Value> {
        let token = self.access_token().await?;
        let response = send_with_retry(&self.config.retry, Replay::Any, operation, || {
            self.http.get(url).bearer_auth(&token).query(query)
        })
        .await?;
        read_json(response, operation).await
    }

    /// Fetch every comment of `submission_id`, expanding all placeholders.
    #[instrument(skip(self))]
    pub async fn fetch_thread(&self, submission_id: &str) -> ClientResult<Vec<Comment>> {
        let url = format!("{}/comments/{}", self.config.api_url, submission_id);
        let listing = self
            .get_json(
                "reddit comments",
                &url,
                &[
                    ("limit", "500".to_string()),
                    ("raw_json", "1".to_string()),
                ],
            )
            .await?;

        let mut tree = ThreadTree::default();
        let comments_listing = listing.get(1).ok_or_else(|| ClientError::Response {
            operation: "reddit comments".to_string(),
            detail: "expected a two-element listing array".to_string(),
        })?;
        tree.flatten_listing(comments_listing);

        let mut requested = HashSet::new();
        let mut continued = HashSet::new();
        while tree.has_pending() {
            if !tree.pending_more.is_empty() {
                let batch: Vec<String> = tree
                    .pending_more
                    .drain(..tree.pending_more.len().min(MORE_CHILDREN_BATCH))
                    .filter(|id| requested.insert(id.clone()))
                    .collect();
                if batch.is_empty() {
                    continue;
                }
                debug!(count = batch.len(), "expanding more-children placeholders");
                let things = self.more_children(submission_id, &batch).await?;
                tree.absorb_things(&things);
                continue;
            }

            if let Some(parent) = tree.pending_continuations.pop() {
                if !continued.insert(parent.clone()) {
                    continue;
                }
                debug!(parent = %parent, "continuing deep thread");
                let subtree = self.continue_thread(submission_id, &parent).await?;
                tree.absorb_continuation(&subtree, &parent);
            }
        }

        info!(comments = tree.comments.len(), "fetched reddit thread");
        Ok(tree.comments)
    }

    /// Comments listing of the permalink `/comments/{submission}/_/{parent}`.
    async fn continue_thread(&self, submission_id: &str, parent: &str) -> ClientResult<Value> {
        let url = format!("{}/comments/{}/_/{}", self.config.api_url, submission_id, parent);
        let listing = self
            .get_json(
                "reddit continue thread",
                &url,
                &[
                    ("limit", "500".to_string()),
                    ("raw_json", "1".to_string()),
                ],
            )
            .await?;
        listing
            .get(1)
            .cloned()
            .ok_or_else(|| ClientError::Response {
                operation: "reddit continue thread".to_string(),
                detail: "expected a two-element listing array".to_string(),
            })
    }

    async fn more_children(&self, submission_id: &str, ids: &[String]) -> ClientResult<Vec<Value>> {
        let url = format!("{}/api/morechildren", self.config.api_url);
        let body = self
            .get_json(
                "reddit morechildren",
                &url,
                &[
                    ("api_type", "json".to_string()),
                    ("link_id", format!("t3_{submission_id}")),
                    ("children", ids.join(",")),
                    ("raw_json", "1".to_string()),
                ],
            )
            .await?;
        parse_more_children(&body)
    }
}

#[async_trait]
impl ThreadSource for RedditClient {
    async fn fetch_comments(&self, submission_id: &str) -> CollaboratorResult<Vec<Comment>> {
        Ok(self.fetch_thread(submission_id).await?)
    }
}

/// Flattened comments plus the placeholders still to expand.
#[derive(Debug, Default)]
struct ThreadTree {
    comments: Vec<Comment>,
    pending_more: Vec<String>,
    /// Parents of "continue this thread" links, without the `t1_` prefix.
    pending_continuations: Vec<String>,
}

impl ThreadTree {
    fn has_pending(&self) -> bool {
        !self.pending_more.is_empty() || !self.pending_continuations.is_empty()
    }

    /// Depth-first, parents before replies.
    fn flatten_listing(&mut self, listing: &Value) {
        let children = listing
            .pointer("/data/children")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for child in children {
            self.visit(child, true);
        }
    }

    fn visit(&mut self, thing: &Value, descend: bool) {
        let data = &thing["data"];
        match thing["kind"].as_str() {
            Some("t1") => {
                if let (Some(id), Some(body)) = (data["id"].as_str(), data["body"].as_str()) {
                    self.comments.push(Comment::new(id, body));
                }
                // `replies` is "" when empty, otherwise a nested listing.
                if descend && data["replies"].is_object() {
                    self.flatten_listing(&data["replies"]);
                }
            }
            Some("more") => {
                let ids = data["children"].as_array().map(Vec::as_slice).unwrap_or_default();
                if ids.is_empty() {
                    // Depth cutoff: the replies live under the parent's permalink.
                    let parent = data["parent_id"].as_str().and_then(|p| p.strip_prefix("t1_"));
                    if let Some(parent) = parent {
                        self.pending_continuations.push(parent.to_string());
                    }
                    return;
                }
                self.pending_more
                    .extend(ids.iter().filter_map(Value::as_str).map(str::to_string));
            }
            _ => {}
        }
    }

    /// The permalink listing repeats `parent` itself; only its replies are new.
    fn absorb_continuation(&mut self, listing: &Value, parent: &str) {
        let children = listing
            .pointer("/data/children")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for child in children {
            let is_parent = child["kind"].as_str() == Some("t1")
                && child["data"]["id"].as_str() == Some(parent);
            if !is_parent {
                self.visit(child, true);
            } else if child["data"]["replies"].is_object() {
                self.flatten_listing(&child["data"]["replies"]);
            }
        }
    }

    /// `/api/morechildren` returns a flat list already in thread order.
    fn absorb_things(&mut self, things: &[Value]) {
        for thing in things {
            self.visit(thing, false);
        }
    }
}

fn parse_more_children(body: &Value) -> ClientResult<Vec<Value>> {
    if let Some(errors) = body.pointer("/json/errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            return Err(ClientError::Response {
                operation: "reddit morechildren".to_string(),
                detail: Value::Array(errors.clone()).to_string(),
            });
        }
    }
    Ok(body
        .pointer("/json/data/things")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn t1(id: &str, body: &str, replies: Value) -> Value {
        json!({"kind": "t1", "data": {"id": id, "body": body, "replies": replies}})
    }

    fn listing(children: Vec<Value>) -> Value {
        json!({"kind": "Listing", "data": {"children": children}})
    }

    #[test]
    fn test_flatten_is_depth_first_preorder() {
        let tree_json = listing(vec![
            t1(
                "a",
                "top one",
                listing(vec![t1("a1", "reply", listing(vec![t1("a1x", "deep", json!(""))]))]),
            ),
            t1("b", "top two", json!("")),
        ]);

        let mut tree = ThreadTree::default();
        tree.flatten_listing(&tree_json);
        let ids: Vec<&str> = tree.comments.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "a1", "a1x", "b"]);
        assert!(tree.pending_more.is_empty());
    }

    #[test]
    fn test_more_placeholders_are_queued() {
        let tree_json = listing(vec![
            t1("a", "top", json!("")),
            json!({"kind": "more", "data": {"children": ["m1", "m2"], "count": 2}}),
        ]);

        let mut tree = ThreadTree::default();
        tree.flatten_listing(&tree_json);
        assert_eq!(tree.pending_more, vec!["m1", "m2"]);
        assert_eq!(tree.comments.len(), 1);
    }

    #[test]
    fn test_deleted_bodies_are_kept() {
        let mut tree = ThreadTree::default();
        tree.flatten_listing(&listing(vec![t1("d", "[deleted]", json!(""))]));
        assert_eq!(tree.comments[0].body, "[deleted]");
    }

    #[test]
    fn test_parse_more_children_things() {
        let body = json!({"json": {"errors": [], "data": {"things": [
            t1("m1", "expanded", json!("")),
            json!({"kind": "more", "data": {"children": ["m9"]}}),
        ]}}});

        let things = parse_more_children(&body).unwrap();
        let mut tree = ThreadTree::default();
        tree.absorb_things(&things);
        assert_eq!(tree.comments[0].id, "m1");
        assert_eq!(tree.pending_more, vec!["m9"]);
    }

    #[test]
    fn test_parse_more_children_errors() {
        let body = json!({"json": {"errors": [["RATELIMIT", "slow down", "ratelimit"]]}});
        assert!(matches!(
            parse_more_children(&body),
            Err(ClientError::Response { .. })
        ));
    }

    #[test]
    fn test_empty_user_agent_rejected() {
        let config = RedditConfig::new("id", "secret", "user", "pw", "  ");
        assert!(matches!(RedditClient::new(config), Err(ClientError::Config(_))));
    }

    #[test]
    fn test_config_builders_trim_urls() {
        let config = RedditConfig::new("id", "secret", "user", "pw", "triage/0.2")
            .with_api_url("http://localhost:9000/")
            .with_auth_url("http://localhost:9001/");
        assert_eq!(config.api_url, "http://localhost:9000");
        assert_eq!(config.auth_url, "http://localhost:9001");
    }

    fn continue_placeholder(parent: &str) -> Value {
        json!({"kind": "more", "data": {
            "count": 0, "id": "_", "name": "t1__", "parent_id": parent, "children": []
        }})
    }

    #[test]
    fn test_continue_placeholder_is_queued_by_parent() {
        let tree_json = listing(vec![t1(
            "a",
            "top",
            listing(vec![continue_placeholder("t1_a")]),
        )]);

        let mut tree = ThreadTree::default();
        tree.flatten_listing(&tree_json);
        assert!(tree.pending_more.is_empty());
        assert_eq!(tree.pending_continuations, vec!["a"]);
    }

    #[test]
    fn test_empty_more_under_submission_is_ignored() {
        let mut tree = ThreadTree::default();
        tree.flatten_listing(&listing(vec![continue_placeholder("t3_abc")]));
        assert!(!tree.has_pending());
    }

    #[test]
    fn test_continuation_skips_repeated_parent() {
        let subtree = listing(vec![t1(
            "a",
            "top",
            listing(vec![t1("a9", "deep reply", listing(vec![t1("a9x", "deeper", json!(""))]))]),
        )]);

        let mut tree = ThreadTree::default();
        tree.absorb_continuation(&subtree, "a");
        let ids: Vec<&str> = tree.comments.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a9", "a9x"]);
    }

    #[tokio::test]
    async fn test_fetch_thread_follows_deep_replies() {
        let server = MockServer::start();
        let token = server.mock(|when, then| {
            when.method(POST).path("/api/v1/access_token");
            then.status(200)
                .json_body(json!({"access_token": "tok", "token_type": "bearer", "expires_in": 3600}));
        });
        let thread = server.mock(|when, then| {
            when.method(GET)
                .path("/comments/abc")
                .header("authorization", "Bearer tok");
            then.status(200).json_body(json!([
                listing(vec![]),
                listing(vec![t1(
                    "a",
                    "top",
                    listing(vec![continue_placeholder("t1_a")]),
                )]),
            ]));
        });
        let deep = server.mock(|when, then| {
            when.method(GET).path("/comments/abc/_/a");
            then.status(200).json_body(json!([
                listing(vec![]),
                listing(vec![t1("a", "top", listing(vec![t1("a9", "deep reply", json!(""))]))]),
            ]));
        });

        let config = RedditConfig::new("id", "secret", "user", "pw", "triage/0.2")
            .with_auth_url(&server.base_url())
            .with_api_url(&server.base_url())
            .with_retry(RetryPolicy::new(1, 1));
        let comments = RedditClient::new(config)
            .unwrap()
            .fetch_thread("abc")
            .await
            .unwrap();

        let ids: Vec<&str> = comments.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "a9"]);
        token.assert_calls(1);
        thread.assert_calls(1);
        deep.assert_calls(1);
    }
}
