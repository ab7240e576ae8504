//! Provider adapter contract + one adapter per threat-intelligence service.
//!
//! Every adapter answers with a [`ProviderResult`]; failures are captured in the
//! result instead of being returned as errors.

use std::sync::Arc;

use async_trait::async_trait;
use linkguard_core::{Assessment, FailureKind, ProviderFailure, ProviderId, ProviderResult, ThreatTag};
use linkguard_transport::{ApiRequest, FetchError, HttpFetcher, RetryDisposition};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub mod domain_trust;
pub mod ipqualityscore;
pub mod national_cert;
pub mod phishtank;
pub mod retry;
pub mod safe_browsing;
pub mod simulate;
pub mod virustotal;

pub use retry::RetryingAdapter;
pub use simulate::{simulate, simulated_result, Simulation};

pub const CRATE_NAME: &str = "linkguard-providers";

/// How an adapter will answer for the current configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterMode {
    Live,
    Simulated,
    Disabled,
}

/// What an adapter does when it has no credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fallback {
    #[default]
    Simulate,
    Disable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub fallback: Fallback,
}

impl ProviderSettings {
    pub fn new(provider: ProviderId) -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(provider).to_string(),
            fallback: Fallback::Simulate,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = fallback;
        self
    }

    /// Key trimmed of whitespace; blank keys count as unconfigured.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn mode(&self) -> AdapterMode {
        match (self.credential(), self.fallback) {
            (Some(_), _) => AdapterMode::Live,
            (None, Fallback::Simulate) => AdapterMode::Simulated,
            (None, Fallback::Disable) => AdapterMode::Disabled,
        }
    }
}

pub fn default_base_url(provider: ProviderId) -> &'static str {
    match provider {
        ProviderId::SafeBrowsing => safe_browsing::DEFAULT_BASE_URL,
        ProviderId::PhishTank => phishtank::DEFAULT_BASE_URL,
        ProviderId::DomainTrust => domain_trust::DEFAULT_BASE_URL,
        ProviderId::IpQualityScore => ipqualityscore::DEFAULT_BASE_URL,
        ProviderId::NationalCert => national_cert::DEFAULT_BASE_URL,
        ProviderId::VirusTotal => virustotal::DEFAULT_BASE_URL,
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("unexpected response shape: {0}")]
    Schema(String),
}

impl ProviderError {
    pub fn schema(message: impl Into<String>) -> Self {
        ProviderError::Schema(message.into())
    }

    pub fn into_failure(self) -> ProviderFailure {
        let retryable = match &self {
            ProviderError::Fetch(err) => err.disposition() == RetryDisposition::Retryable,
            ProviderError::Schema(_) => false,
        };
        let failure = match self {
            ProviderError::Fetch(err) if err.is_timeout() => {
                ProviderFailure::new(FailureKind::Timeout, err.to_string())
            }
            ProviderError::Fetch(FetchError::HttpStatus { status, url, body }) => {
                let message = if body.is_empty() {
                    format!("http status {status} for {url}")
                } else {
                    format!("http status {status} for {url}: {body}")
                };
                ProviderFailure::http_status(status, message)
            }
            ProviderError::Fetch(err @ FetchError::Decode { .. }) => {
                ProviderFailure::new(FailureKind::Schema, err.to_string())
            }
            ProviderError::Fetch(err) => ProviderFailure::new(FailureKind::Transport, err.to_string()),
            ProviderError::Schema(message) => ProviderFailure::new(FailureKind::Schema, message),
        };
        failure.with_retryable(retryable)
    }
}

/// The contract the aggregation engine dispatches against.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> ProviderId;

    fn mode(&self) -> AdapterMode {
        AdapterMode::Live
    }

    /// Never fails: transport, status and schema problems come back as `error`.
    async fn check(&self, url: &Url) -> ProviderResult;
}

/// Provider-specific half of an adapter: request shape and reply normalization.
pub trait ThreatFeed: Send + Sync {
    fn provider(&self) -> ProviderId;

    fn settings(&self) -> &ProviderSettings;

    /// Tag a simulated malicious verdict carries for this provider.
    fn primary_tag(&self) -> ThreatTag;

    fn build_request(&self, api_key: &str, url: &Url) -> ApiRequest;

    fn normalize(&self, url: &Url, body: &JsonValue) -> Result<Assessment, ProviderError>;

    /// Non-2xx statuses that still carry an answer (e.g. "never scanned").
    fn answer_for_status(&self, _status: u16) -> Option<Assessment> {
        None
    }

    /// Portion of the reply kept for display.
    fn audit_raw(&self, body: &JsonValue) -> JsonValue {
        body.clone()
    }
}

/// Runs a [`ThreatFeed`] live, or falls back to simulation/disable without credentials.
pub struct FeedAdapter<F> {
    feed: F,
    http: Arc<HttpFetcher>,
}

impl<F: ThreatFeed> FeedAdapter<F> {
    pub fn new(feed: F, http: Arc<HttpFetcher>) -> Self {
        Self { feed, http }
    }

    async fn live_check(&self, api_key: &str, url: &Url) -> Result<ProviderResult, ProviderError> {
        let provider = self.feed.provider();
        let request = self.feed.build_request(api_key, url);
        match self.http.send_json(provider.as_str(), request).await {
            Ok(resp) => {
                let assessment = self.feed.normalize(url, &resp.body)?;
                Ok(ProviderResult::answered(
                    provider,
                    assessment,
                    self.feed.audit_raw(&resp.body),
                ))
            }
            Err(FetchError::HttpStatus { status, url: at, body }) => {
                match self.feed.answer_for_status(status) {
                    Some(assessment) => Ok(ProviderResult::answered(
                        provider,
                        assessment,
                        serde_json::json!({ "status": status }),
                    )),
                    None => Err(FetchError::HttpStatus { status, url: at, body }.into()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl<F: ThreatFeed> ProviderAdapter for FeedAdapter<F> {
    fn provider(&self) -> ProviderId {
        self.feed.provider()
    }

    fn mode(&self) -> AdapterMode {
        self.feed.settings().mode()
    }

    async fn check(&self, url: &Url) -> ProviderResult {
        let provider = self.feed.provider();
        let settings = self.feed.settings();
        let Some(api_key) = settings.credential() else {
            return match settings.fallback {
                Fallback::Simulate => {
                    debug!(%provider, %url, "no credentials; answering with simulated result");
                    simulated_result(provider, self.feed.primary_tag(), url)
                }
                Fallback::Disable => ProviderResult::disabled(provider),
            };
        };

        match self.live_check(api_key, url).await {
            Ok(result) => result,
            Err(err) => {
                let mut failure = err.into_failure();
                failure.message = failure.message.replace(api_key, "[redacted]");
                warn!(%provider, %url, error = %failure, "provider lookup failed");
                ProviderResult::failed(provider, failure)
            }
        }
    }
}

/// Build the adapter for one roster entry.
pub fn adapter_for_provider(
    provider: ProviderId,
    settings: ProviderSettings,
    http: Arc<HttpFetcher>,
) -> Arc<dyn ProviderAdapter> {
    match provider {
        ProviderId::SafeBrowsing => Arc::new(FeedAdapter::new(
            safe_browsing::SafeBrowsingFeed::new(settings),
            http,
        )),
        ProviderId::PhishTank => Arc::new(FeedAdapter::new(phishtank::PhishTankFeed::new(settings), http)),
        ProviderId::DomainTrust => Arc::new(FeedAdapter::new(
            domain_trust::DomainTrustFeed::new(settings),
            http,
        )),
        ProviderId::IpQualityScore => Arc::new(FeedAdapter::new(
            ipqualityscore::IpQualityScoreFeed::new(settings),
            http,
        )),
        ProviderId::NationalCert => Arc::new(FeedAdapter::new(
            national_cert::NationalCertFeed::new(settings),
            http,
        )),
        ProviderId::VirusTotal => Arc::new(FeedAdapter::new(virustotal::VirusTotalFeed::new(settings), http)),
    }
}

fn json_at<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    let mut cur = value;
    for segment in path {
        cur = cur.get(*segment)?;
    }
    Some(cur)
}

pub(crate) fn json_str<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a str> {
    json_at(value, path)?.as_str()
}

pub(crate) fn json_bool(value: &JsonValue, path: &[&str]) -> Option<bool> {
    json_at(value, path)?.as_bool()
}

pub(crate) fn json_f64(value: &JsonValue, path: &[&str]) -> Option<f64> {
    json_at(value, path)?.as_f64()
}

pub(crate) fn json_u64(value: &JsonValue, path: &[&str]) -> Option<u64> {
    let v = json_at(value, path)?;
    v.as_u64().or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
}

pub(crate) fn clamp_score(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}


#[cfg(test)]
mod tests {
    use super::*;
    use linkguard_transport::HttpClientConfig;

    fn http() -> Arc<HttpFetcher> {
        Arc::new(HttpFetcher::new(HttpClientConfig::default()).unwrap())
    }

    #[test]
    fn blank_api_key_counts_as_unconfigured() {
        let settings = ProviderSettings::new(ProviderId::VirusTotal).with_api_key("   ");
        assert_eq!(settings.credential(), None);
        assert_eq!(settings.mode(), AdapterMode::Simulated);
        let disabled = settings.with_fallback(Fallback::Disable);
        assert_eq!(disabled.mode(), AdapterMode::Disabled);
    }

    #[tokio::test]
    async fn unconfigured_adapter_simulates_without_network() {
        let adapter = adapter_for_provider(
            ProviderId::SafeBrowsing,
            ProviderSettings::new(ProviderId::SafeBrowsing).with_base_url("http://127.0.0.1:9"),
            http(),
        );
        let url = test_support::url("https://www.rust-lang.org/");
        let first = adapter.check(&url).await;
        let second = adapter.check(&url).await;
        assert!(first.simulated);
        assert!(first.enabled);
        assert!(first.error.is_none());
        assert_eq!(first.score, second.score);
        assert_eq!(first.safe, second.safe);
        assert_eq!(first.threat_tags, second.threat_tags);
    }

    #[tokio::test]
    async fn unconfigured_adapter_with_disable_fallback_is_absent() {
        let adapter = adapter_for_provider(
            ProviderId::PhishTank,
            ProviderSettings::new(ProviderId::PhishTank).with_fallback(Fallback::Disable),
            http(),
        );
        assert_eq!(adapter.mode(), AdapterMode::Disabled);
        let result = adapter.check(&test_support::url("https://example.com/")).await;
        assert!(!result.enabled);
        assert!(!result.simulated);
        assert_eq!(result.score, None);
    }

    #[test]
    fn fetch_errors_map_to_failure_kinds() {
        let status = ProviderError::from(FetchError::HttpStatus {
            status: 403,
            url: "https://api.example/".into(),
            body: "denied".into(),
        })
        .into_failure();
        assert_eq!(status.kind, FailureKind::HttpStatus);
        assert_eq!(status.status, Some(403));
        assert!(status.message.contains("denied"));

        let decode = ProviderError::from(FetchError::Decode {
            url: "https://api.example/".into(),
            message: "expected value".into(),
        })
        .into_failure();
        assert_eq!(decode.kind, FailureKind::Schema);

        let schema = ProviderError::schema("missing results").into_failure();
        assert_eq!(schema.kind, FailureKind::Schema);
        assert_eq!(schema.message, "missing results");
    }

    #[test]
    fn retry_decision_follows_the_transport_classification() {
        let failure = |status: u16| {
            ProviderError::from(FetchError::HttpStatus {
                status,
                url: "https://api.example".into(),
                body: String::new(),
            })
            .into_failure()
        };
        assert!(failure(503).is_retryable());
        assert!(failure(429).is_retryable());
        assert!(!failure(401).is_retryable());
        assert!(!ProviderError::from(FetchError::Closed).into_failure().is_retryable());
        assert!(!ProviderError::from(FetchError::Decode {
            url: "https://api.example".into(),
            message: "eof".into(),
        })
        .into_failure()
        .is_retryable());
    }
}
