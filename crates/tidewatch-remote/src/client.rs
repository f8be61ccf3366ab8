use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE, DATE, RETRY_AFTER};

use crate::backoff::parse_retry_after;
use crate::error::{RemoteError, Result};

/// Result of a single chunk POST, already classified per the upload policy
/// table: 2xx is `Accepted`, 4xx-other-than-429 is fatal, everything else
/// (429, 5xx, transport failure) is retryable.
pub enum PostOutcome {
    Accepted { accepted: Option<u64> },
    Rejected { status: u16, body: String },
    Retryable { status: Option<u16>, retry_after: Option<Duration> },
}

#[derive(Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    import_url: String,
    skew_url: String,
    auth_token: Option<String>,
}

impl RemoteClient {
    pub fn new(import_url: String, skew_url: String, auth_token: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, import_url, skew_url, auth_token })
    }

    /// Sends an already-gzipped, already-serialised chunk. Compression
    /// happens upstream — this layer never re-encodes the body.
    pub async fn post_chunk(&self, compressed: Vec<u8>) -> PostOutcome {
        let mut request = self
            .http
            .post(&self.import_url)
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_ENCODING, "gzip")
            .body(compressed);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(err) => {
                tracing::warn!(error = %err, "upload request failed before a response was received");
                return PostOutcome::Retryable { status: None, retry_after: None };
            }
        };

        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);

        if status.is_success() {
            let accepted = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|body| body.get("accepted").and_then(|v| v.as_u64()));
            PostOutcome::Accepted { accepted }
        } else if status.as_u16() == 429 || status.is_server_error() {
            PostOutcome::Retryable { status: Some(status.as_u16()), retry_after }
        } else {
            let body = response.text().await.unwrap_or_default();
            PostOutcome::Rejected { status: status.as_u16(), body }
        }
    }

    /// Issues a lightweight GET against the skew endpoint and returns
    /// `server_time - local_time` in milliseconds, using the midpoint of
    /// the request's round trip as the local reference instant.
    pub async fn probe_skew(&self) -> Result<i64> {
        let mut request = self.http.get(&self.skew_url);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let local_sent = Utc::now();
        let response = request.send().await?;
        let local_received = Utc::now();

        let server_time = response
            .headers()
            .get(DATE)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| DateTime::parse_from_rfc2822(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        match server_time {
            Some(server) => {
                let local_midpoint = local_sent + (local_received - local_sent) / 2;
                Ok((server - local_midpoint).num_milliseconds())
            }
            None => Err(RemoteError::Rejected {
                status: response.status().as_u16(),
                body: "response had no parseable Date header".to_string(),
            }),
        }
    }
}
