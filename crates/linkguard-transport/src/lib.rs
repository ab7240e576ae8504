//! Shared HTTP transport for provider lookups and page fetches.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use reqwest::{Method, StatusCode};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info_span, Instrument};

pub const CRATE_NAME: &str = "linkguard-transport";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retryable,
    NonRetryable,
}

pub fn classify_status(status: StatusCode) -> RetryDisposition {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

pub fn classify_reqwest_error(err: &reqwest::Error) -> RetryDisposition {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl BackoffPolicy {
    pub fn with_max_retries(max_retries: usize) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn delay_for_attempt(&self, attempt_index: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt_index as u32).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor);
        delay.min(self.max_delay)
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub global_concurrency: usize,
    pub per_provider_concurrency: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: None,
            global_concurrency: 32,
            per_provider_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(JsonValue),
    Form(Vec<(String, String)>),
}

/// Provider-shaped request: method, url, query, auth headers and body.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: JsonValue) -> Self {
        Self {
            method: Method::POST,
            body: Some(RequestBody::Json(body)),
            ..Self::get(url)
        }
    }

    pub fn post_form(url: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        Self {
            method: Method::POST,
            body: Some(RequestBody::Form(fields)),
            ..Self::get(url)
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct JsonResponse {
    pub body: JsonValue,
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: StatusCode,
    pub final_url: String,
    pub content_type: Option<String>,
    pub body: String,
    pub truncated: bool,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String, body: String },
    #[error("undecodable response from {url}: {message}")]
    Decode { url: String, message: String },
    #[error("http client is shutting down")]
    Closed,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Request(err.without_url())
    }
}

impl FetchError {
    pub fn disposition(&self) -> RetryDisposition {
        match self {
            FetchError::Request(err) => classify_reqwest_error(err),
            FetchError::HttpStatus { status, .. } => StatusCode::from_u16(*status)
                .map(classify_status)
                .unwrap_or(RetryDisposition::NonRetryable),
            FetchError::Decode { .. } | FetchError::Closed => RetryDisposition::NonRetryable,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Request(err) if err.is_timeout())
    }
}

/// Scheme, host and port only. Provider paths and queries can carry API keys.
pub fn redact_url(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.origin().ascii_serialization(),
        Err(_) => "<invalid url>".to_string(),
    }
}

/// reqwest client shared by all adapters, bounded globally and per provider.
#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    global_limit: Arc<Semaphore>,
    per_provider_limit: usize,
    per_provider: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;

        Ok(Self {
            client,
            global_limit: Arc::new(Semaphore::new(config.global_concurrency.max(1))),
            per_provider_limit: config.per_provider_concurrency.max(1),
            per_provider: Mutex::new(HashMap::new()),
        })
    }

    async fn per_provider_semaphore(&self, provider: &str) -> Arc<Semaphore> {
        let mut map = self.per_provider.lock().await;
        map.entry(provider.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_provider_limit)))
            .clone()
    }

    /// Send a provider API request and decode a 2xx JSON body.
    pub async fn send_json(
        &self,
        provider: &str,
        request: ApiRequest,
    ) -> Result<JsonResponse, FetchError> {
        let _global = self
            .global_limit
            .acquire()
            .await
            .map_err(|_| FetchError::Closed)?;
        let limit = self.per_provider_semaphore(provider).await;
        let _provider = limit.acquire().await.map_err(|_| FetchError::Closed)?;

        let span = info_span!(
            "provider_http",
            provider,
            method = %request.method,
            endpoint = %redact_url(&request.url)
        );
        self.send_json_inner(request).instrument(span).await
    }

    async fn send_json_inner(&self, request: ApiRequest) -> Result<JsonResponse, FetchError> {
        let mut builder = self.client.request(request.method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            Some(RequestBody::Json(body)) => builder.json(&body),
            Some(RequestBody::Form(fields)) => builder.form(&fields),
            None => builder,
        };

        let resp = builder.send().await?;
        let status = resp.status();
        let endpoint = redact_url(resp.url().as_str());
        let text = resp.text().await?;
        debug!(status = status.as_u16(), bytes = text.len(), "provider responded");

        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: endpoint,
                body: truncate_chars(&text, 512),
            });
        }

        let body = serde_json::from_str(&text).map_err(|e| FetchError::Decode {
            url: endpoint,
            message: e.to_string(),
        })?;
        Ok(JsonResponse { body })
    }

    /// Fetch a page body as text, keeping at most `max_bytes`.
    pub async fn fetch_page(&self, url: &str, max_bytes: usize) -> Result<FetchedPage, FetchError> {
        let _global = self
            .global_limit
            .acquire()
            .await
            .map_err(|_| FetchError::Closed)?;

        let span = info_span!("page_fetch", url);
        async {
            let resp = self.client.get(url).send().await?;
            let status = resp.status();
            let final_url = resp.url().to_string();
            if !status.is_success() {
                return Err(FetchError::HttpStatus {
                    status: status.as_u16(),
                    url: final_url,
                    body: String::new(),
                });
            }
            let content_type = resp
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string);
            let bytes = resp.bytes().await?;
            let truncated = bytes.len() > max_bytes;
            let kept = &bytes[..bytes.len().min(max_bytes)];
            Ok(FetchedPage {
                status,
                final_url,
                content_type,
                body: String::from_utf8_lossy(kept).into_owned(),
                truncated,
            })
        }
        .instrument(span)
        .await
    }

    /// Best-effort probe used for screenshot capture URLs.
    pub async fn probe(&self, url: &str) -> Result<StatusCode, FetchError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if status.is_success() {
            Ok(status)
        } else {
            Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
                body: String::new(),
            })
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
