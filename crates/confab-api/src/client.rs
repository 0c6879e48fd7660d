//! Client for the question-answering service HTTP API.

use std::time::Duration;

use confab_types::service::AskFuture;
use confab_types::{Answer, ApiError, HistoryEntry, QaService};
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::retry::{RetryConfig, calculate_delay, is_retryable};

/// Request body for `POST /ask`.
#[derive(Debug, Serialize)]
struct AskRequest<'a> {
    question: &'a str,
    history: &'a [HistoryEntry],
}

/// Response body for `POST /ask`. A source may be null when the retrieved
/// chunk carries no file metadata.
#[derive(Debug, Deserialize)]
struct AskResponse {
    answer: String,
    #[serde(default)]
    sources: Vec<Option<String>>,
}

/// Summary returned once a remote ingestion run completes.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestReport {
    pub files: u64,
    pub chunks: u64,
    pub elapsed_seconds: f64,
}

/// Service liveness report.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    /// True when the service reports itself operational.
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// What the service currently has indexed.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexStats {
    pub documents: u64,
    pub chunks: u64,
    #[serde(default)]
    pub files: Vec<String>,
}

/// Client for the question-answering service API.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    retry_config: RetryConfig,
}

impl ApiClient {
    /// Create a new client for the service at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: normalize_base_url(base_url.into()),
            retry_config: RetryConfig::default(),
        })
    }

    /// Set the retry configuration for transient errors (429, 5xx, network).
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Ask a question, sending a bounded window of prior turns as context.
    ///
    /// Returns the answer and its cited sources, with null and empty
    /// source entries dropped. Any transport failure or non-success
    /// status is an error; the caller decides what the conversation
    /// shows in that case.
    pub async fn ask(&self, question: &str, history: &[HistoryEntry]) -> Result<Answer, ApiError> {
        let body = serde_json::to_string(&AskRequest { question, history }).map_err(|e| {
            ApiError::BadRequest {
                message: format!("Failed to serialize request: {e}"),
            }
        })?;

        let response: AskResponse = self
            .request_with_retry(Method::POST, "/ask", Some(body))
            .await?;

        Ok(Answer {
            answer: response.answer,
            sources: response
                .sources
                .into_iter()
                .flatten()
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }

    /// Trigger a re-ingestion of the service's document folder.
    ///
    /// Deliberately not retried: the job is slow and re-triggering it on a
    /// transient failure could double the work on the server.
    pub async fn trigger_ingest(&self) -> Result<IngestReport, ApiError> {
        let url = format!("{}/ingest", self.base_url);
        tracing::debug!("POST {url}");

        let response = self.http.post(&url).send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body_text = response.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &body_text, retry_after));
        }
        decode_body(response).await
    }

    /// Check service liveness.
    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.request_with_retry(Method::GET, "/health", None).await
    }

    /// Fetch index statistics.
    pub async fn stats(&self) -> Result<IndexStats, ApiError> {
        self.request_with_retry(Method::GET, "/stats", None).await
    }

    /// Send a request, retrying transient failures per the retry config,
    /// and decode the success body as JSON.
    async fn request_with_retry<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);

        for attempt in 0..=self.retry_config.max_retries {
            tracing::debug!(
                "{method} {url} (attempt {}/{})",
                attempt + 1,
                self.retry_config.max_retries + 1
            );

            let mut request = self.http.request(method.clone(), &url);
            if let Some(body) = &body {
                request = request
                    .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                    .body(body.clone());
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return decode_body(response).await;
                    }

                    let retry_after = parse_retry_after(response.headers());
                    let body_text = response.text().await.unwrap_or_default();
                    let err = classify_error(status.as_u16(), &body_text, retry_after);

                    if !is_retryable(&err) || attempt == self.retry_config.max_retries {
                        return Err(err);
                    }

                    let delay = calculate_delay(&self.retry_config, attempt, retry_after);
                    tracing::warn!(
                        "Retryable API error (attempt {}/{}): {err}. Retrying in {delay}ms...",
                        attempt + 1,
                        self.retry_config.max_retries,
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(e) => {
                    let err = transport_error(e);

                    if attempt == self.retry_config.max_retries {
                        return Err(err);
                    }

                    let delay = calculate_delay(&self.retry_config, attempt, None);
                    tracing::warn!(
                        "Retryable network error (attempt {}/{}): {err}. Retrying in {delay}ms...",
                        attempt + 1,
                        self.retry_config.max_retries,
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
            }
        }

        // Unreachable: the loop always returns on the last attempt
        unreachable!("retry loop should have returned")
    }
}

impl QaService for ApiClient {
    fn ask<'a>(&'a self, question: &'a str, history: &'a [HistoryEntry]) -> AskFuture<'a> {
        Box::pin(ApiClient::ask(self, question, history))
    }
}

/// Strip trailing slashes so path concatenation stays predictable.
fn normalize_base_url(base_url: String) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Map a reqwest transport failure onto the API error hierarchy.
fn transport_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Network(e.to_string())
    }
}

/// Decode a success body as JSON, keeping a short excerpt on failure.
async fn decode_body<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ApiError> {
    let text = response
        .text()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| ApiError::Decode(format!("{e}: {}", excerpt(&text))))
}

/// Shorten a body for inclusion in an error message.
fn excerpt(body: &str) -> String {
    const MAX_LEN: usize = 200;
    if body.len() <= MAX_LEN {
        return body.to_string();
    }
    let mut end = MAX_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

/// Parse the `retry-after` header value as seconds and convert to milliseconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<f64>().ok())
        .map(|secs| (secs * 1000.0) as u64)
}

/// Classify an HTTP error response into a typed ApiError.
fn classify_error(status: u16, body: &str, retry_after: Option<u64>) -> ApiError {
    // FastAPI-style error body: {"detail": "..."}. Fall back to raw text.
    #[derive(Deserialize)]
    struct ErrorBody {
        detail: Option<String>,
    }

    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.detail)
        .unwrap_or_else(|| body.to_string());

    match status {
        429 => ApiError::RateLimited {
            retry_after_ms: retry_after,
        },
        400..=499 => ApiError::BadRequest { message },
        _ => ApiError::Server { status, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_trailing_slashes() {
        assert_eq!(
            normalize_base_url("http://localhost:8000/".into()),
            "http://localhost:8000"
        );
        assert_eq!(
            normalize_base_url("http://localhost:8000".into()),
            "http://localhost:8000"
        );
    }

    #[test]
    fn parse_retry_after_integer() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("5"));
        assert_eq!(parse_retry_after(&headers), Some(5000));
    }

    #[test]
    fn parse_retry_after_float() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("1.5"));
        assert_eq!(parse_retry_after(&headers), Some(1500));
    }

    #[test]
    fn parse_retry_after_missing() {
        let headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn parse_retry_after_invalid() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("not-a-number"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn classify_error_429_with_retry_after() {
        let err = classify_error(429, "{}", Some(3000));
        match err {
            ApiError::RateLimited { retry_after_ms } => {
                assert_eq!(retry_after_ms, Some(3000));
            }
            _ => panic!("Expected RateLimited, got {err:?}"),
        }
    }

    #[test]
    fn classify_error_404_with_detail() {
        let err = classify_error(404, r#"{"detail":"Not Found"}"#, None);
        match err {
            ApiError::BadRequest { message } => assert_eq!(message, "Not Found"),
            _ => panic!("Expected BadRequest, got {err:?}"),
        }
    }

    #[test]
    fn classify_error_500_with_detail() {
        let err = classify_error(500, r#"{"detail":"index not loaded"}"#, None);
        match err {
            ApiError::Server { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "index not loaded");
            }
            _ => panic!("Expected Server, got {err:?}"),
        }
    }

    #[test]
    fn classify_error_falls_back_to_raw_body() {
        let err = classify_error(502, "Bad Gateway", None);
        match err {
            ApiError::Server { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "Bad Gateway");
            }
            _ => panic!("Expected Server, got {err:?}"),
        }
    }

    #[test]
    fn excerpt_truncates_long_bodies() {
        let long = "x".repeat(500);
        let short = excerpt(&long);
        assert!(short.ends_with("..."));
        assert!(short.len() < long.len());

        assert_eq!(excerpt("small"), "small");
    }

    #[test]
    fn health_status_is_ok() {
        let healthy: HealthStatus = serde_json::from_str(r#"{"status":"ok"}"#).unwrap();
        assert!(healthy.is_ok());

        let degraded: HealthStatus = serde_json::from_str(r#"{"status":"starting"}"#).unwrap();
        assert!(!degraded.is_ok());
    }
}
