//! Azure Communication Services e-mail notifier
//!
//! Sends the run digest through `POST /emails:send`. Requests are signed
//! with the resource access key (HMAC-SHA256 over method, path, date, host
//! and content hash).

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest as _, Sha256};
use tracing::{info, instrument};
use triage_core::{CollaboratorResult, Digest, Notifier};

use crate::error::{ClientError, ClientResult};
use crate::transport::{send_with_retry, Replay, RetryPolicy};

const EMAIL_API_VERSION: &str = "2023-03-31";

pub type HmacSha256 = Hmac<Sha256>;

/// ACS resource, sender and recipients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Resource endpoint, e.g. `https://<name>.communication.azure.com`
    pub endpoint: String,
    /// Base64 access key from the connection string
    pub access_key: String,
    pub sender: String,
    pub recipients: Vec<String>,
    pub request_timeout: Duration,
}

impl EmailConfig {
    /// Parse an `endpoint=...;accesskey=...` connection string.
    ///
    /// `recipients` is comma separated; blank entries are dropped.
    pub fn from_connection_string(
        connection_string: &str,
        sender: &str,
        recipients: &str,
    ) -> ClientResult<Self> {
        let mut endpoint = None;
        let mut access_key = None;
        for segment in connection_string.split(';').filter(|s| !s.trim().is_empty()) {
            let (name, value) = segment.split_once('=').ok_or_else(|| {
                ClientError::Config(format!("malformed connection string segment '{segment}'"))
            })?;
            match name.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(value.trim().trim_end_matches('/').to_string()),
                "accesskey" => access_key = Some(value.trim().to_string()),
                _ => {}
            }
        }

        let recipients: Vec<String> = recipients
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect();
        if recipients.is_empty() {
            return Err(ClientError::Config("no e-mail recipients configured".to_string()));
        }

        Ok(Self {
            endpoint: endpoint
                .ok_or_else(|| ClientError::Config("connection string lacks endpoint".to_string()))?,
            access_key: access_key
                .ok_or_else(|| ClientError::Config("connection string lacks accesskey".to_string()))?,
            sender: sender.to_string(),
            recipients,
            request_timeout: Duration::from_secs(30),
        })
    }
}

/// `x-ms-date` format (RFC 1123, always GMT).
pub fn format_ms_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Base64 SHA-256 of the request body.
pub fn content_hash(body: &[u8]) -> String {
    BASE64.encode(Sha256::digest(body))
}

/// MAC keyed with the decoded access key.
pub fn keyed_mac(key: &[u8]) -> ClientResult<HmacSha256> {
    HmacSha256::new_from_slice(key).map_err(|e| ClientError::Config(format!("invalid access key: {e}")))
}

/// Value of the `Authorization` header for one request.
pub fn authorization_header(
    mac: &HmacSha256,
    method: &str,
    path_and_query: &str,
    date: &str,
    host: &str,
    content_hash: &str,
) -> String {
    let string_to_sign = format!("{method}\n{path_and_query}\n{date};{host};{content_hash}");
    let mut mac = mac.clone();
    mac.update(string_to_sign.as_bytes());
    let signature = BASE64.encode(mac.finalize().into_bytes());
    format!("HMAC-SHA256 SignedHeaders=x-ms-date;host;x-ms-content-sha256&Signature={signature}")
}

/// Message body for `/emails:send`.
pub fn message_payload(config: &EmailConfig, digest: &Digest) -> Value {
    let to: Vec<Value> = config
        .recipients
        .iter()
        .map(|address| json!({"address": address}))
        .collect();
    json!({
        "senderAddress": config.sender,
        "recipients": {"to": to},
        "content": {
            "subject": digest.subject(),
            "plainText": digest.plain_text()
        }
    })
}

/// ACS e-mail client implementing [`Notifier`]
pub struct EmailNotifier {
    config: EmailConfig,
    mac: HmacSha256,
    url: reqwest::Url,
    http: reqwest::Client,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> ClientResult<Self> {
        let key = BASE64
            .decode(config.access_key.as_bytes())
            .map_err(|e| ClientError::Config(format!("access key is not base64: {e}")))?;
        let mac = keyed_mac(&key)?;
        let url = reqwest::Url::parse(&format!(
            "{}/emails:send?api-version={EMAIL_API_VERSION}",
            config.endpoint
        ))
        .map_err(|e| ClientError::Config(format!("invalid e-mail endpoint: {e}")))?;
        if url.host_str().is_none() {
            return Err(ClientError::Config("e-mail endpoint has no host".to_string()));
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("feedback-triage/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            config,
            mac,
            url,
            http,
        })
    }

    fn host(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    fn path_and_query(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{query}", self.url.path()),
            None => self.url.path().to_string(),
        }
    }

    #[instrument(skip_all, fields(records = digest.records.len()))]
    pub async fn send(&self, digest: &Digest) -> ClientResult<()> {
        let body = serde_json::to_vec(&message_payload(&self.config, digest))?;
        let hash = content_hash(&body);
        let host = self.host();
        let path_and_query = self.path_and_query();

        // Single attempt: a lost response may still mean the mail went out.
        let once = RetryPolicy::none();
        let response = send_with_retry(&once, Replay::Unsent, "send e-mail", || {
            let date = format_ms_date(Utc::now());
            let auth = authorization_header(&self.mac, "POST", &path_and_query, &date, &host, &hash);
            self.http
                .post(self.url.clone())
                .header("x-ms-date", &date)
                .header("x-ms-content-sha256", &hash)
                .header(reqwest::header::AUTHORIZATION, auth)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone())
        })
        .await?;

        let operation = response
            .headers()
            .get("operation-location")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        info!(
            recipients = self.config.recipients.len(),
            operation = %operation,
            "error digest e-mail accepted"
        );
        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send_digest(&self, digest: &Digest) -> CollaboratorResult<()> {
        Ok(self.send(digest).await?)
    }
}
