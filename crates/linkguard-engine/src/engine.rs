//! Concurrent fan-out of one URL to every registered provider.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use linkguard_core::{
    FailureKind, ProviderFailure, ProviderId, ProviderResult, SecurityVerdict, VerdictSummary,
};
use linkguard_providers::{adapter_for_provider, ProviderAdapter, RetryingAdapter};
use linkguard_transport::HttpFetcher;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use url::Url;

use crate::config::EngineConfig;
use crate::roster::ProviderRoster;
use crate::scoring::ScoringModel;

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_GLOBAL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid url `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },
}

impl EngineError {
    fn invalid(input: &str, reason: impl Into<String>) -> Self {
        EngineError::InvalidUrl {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Trim and parse an inbound URL; only absolute http(s) URLs with a host pass.
pub fn normalize_url(input: &str) -> Result<Url, EngineError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(EngineError::invalid(input, "url is empty"));
    }
    let url = Url::parse(trimmed).map_err(|e| EngineError::invalid(input, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(EngineError::invalid(
            input,
            format!("unsupported scheme `{}`", url.scheme()),
        ));
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(EngineError::invalid(input, "url has no host")),
    }
}

/// One roster slot. Disabled slots are reported without dispatch.
#[derive(Clone)]
pub struct RegisteredProvider {
    provider: ProviderId,
    weight: f64,
    adapter: Option<Arc<dyn ProviderAdapter>>,
}

impl RegisteredProvider {
    pub fn new(adapter: Arc<dyn ProviderAdapter>, weight: f64) -> Self {
        Self {
            provider: adapter.provider(),
            weight,
            adapter: Some(adapter),
        }
    }

    pub fn disabled(provider: ProviderId, weight: f64) -> Self {
        Self {
            provider,
            weight,
            adapter: None,
        }
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn adapter(&self) -> Option<&Arc<dyn ProviderAdapter>> {
        self.adapter.as_ref()
    }
}

pub struct AggregationEngine {
    providers: Vec<RegisteredProvider>,
    scoring: ScoringModel,
    provider_timeout: Duration,
    global_timeout: Duration,
}

impl AggregationEngine {
    pub fn new(providers: Vec<RegisteredProvider>) -> Self {
        let scoring = ScoringModel::new(
            providers
                .iter()
                .filter(|p| p.adapter.is_some())
                .map(|p| (p.provider, p.weight)),
        );
        Self {
            providers,
            scoring,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            global_timeout: DEFAULT_GLOBAL_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, provider_timeout: Duration, global_timeout: Duration) -> Self {
        self.provider_timeout = provider_timeout;
        self.global_timeout = global_timeout;
        self
    }

    /// Build adapters for every roster entry from env-derived settings.
    pub fn from_config(config: &EngineConfig, roster: &ProviderRoster, http: Arc<HttpFetcher>) -> Self {
        let backoff = config.backoff_policy();
        let providers = roster
            .entries()
            .iter()
            .map(|entry| {
                if !entry.enabled {
                    return RegisteredProvider::disabled(entry.provider, entry.weight);
                }
                let mut adapter =
                    adapter_for_provider(entry.provider, config.settings_for(entry), http.clone());
                if let Some(policy) = backoff {
                    adapter = RetryingAdapter::wrap(adapter, policy);
                }
                RegisteredProvider::new(adapter, entry.weight)
            })
            .collect();
        Self::new(providers).with_timeouts(config.provider_timeout(), config.global_timeout())
    }

    pub fn providers(&self) -> &[RegisteredProvider] {
        &self.providers
    }

    pub fn scoring(&self) -> &ScoringModel {
        &self.scoring
    }

    pub async fn analyze(&self, input: &str) -> Result<SecurityVerdict, EngineError> {
        let url = normalize_url(input)?;
        Ok(self.analyze_url(&url).await)
    }

    /// Fan out an already-validated URL. Never fails; missing answers become errors.
    pub async fn analyze_url(&self, url: &Url) -> SecurityVerdict {
        let span = info_span!("analyze", url = %url, providers = self.providers.len());
        async {
            let started = Instant::now();
            let deadline = started + self.global_timeout;
            let shared = Arc::new(url.clone());

            let handles: Vec<Option<JoinHandle<ProviderResult>>> = self
                .providers
                .iter()
                .map(|slot| {
                    slot.adapter
                        .clone()
                        .map(|adapter| self.spawn_check(adapter, shared.clone()))
                })
                .collect();

            let mut results = Vec::with_capacity(self.providers.len());
            for (slot, handle) in self.providers.iter().zip(handles) {
                let result = match handle {
                    None => ProviderResult::disabled(slot.provider),
                    Some(handle) => self.settle(slot.provider, handle, deadline).await,
                };
                results.push(result);
            }

            let score = self.scoring.score(&results);
            let summary = VerdictSummary::tally(&results);
            let duration_ms = started.elapsed().as_millis() as u64;
            info!(
                overall_safety = %score.overall_safety,
                overall_score = ?score.overall_score,
                confidence = score.confidence,
                errored = summary.errored,
                duration_ms,
                "url analyzed"
            );

            SecurityVerdict {
                url: url.to_string(),
                overall_score: score.overall_score,
                overall_safety: score.overall_safety,
                confidence: score.confidence,
                provider_results: results,
                summary,
                duration_ms,
                checked_at: Utc::now(),
            }
        }
        .instrument(span)
        .await
    }

    fn spawn_check(&self, adapter: Arc<dyn ProviderAdapter>, url: Arc<Url>) -> JoinHandle<ProviderResult> {
        let per_call = self.provider_timeout;
        tokio::spawn(async move {
            let provider = adapter.provider();
            match tokio::time::timeout(per_call, adapter.check(&url)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(%provider, timeout_ms = per_call.as_millis() as u64, "provider timed out");
                    ProviderResult::failed(provider, ProviderFailure::timeout(per_call))
                }
            }
        })
    }

    async fn settle(
        &self,
        provider: ProviderId,
        mut handle: JoinHandle<ProviderResult>,
        deadline: Instant,
    ) -> ProviderResult {
        match tokio::time::timeout_at(deadline, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => {
                let message = if join_err.is_panic() {
                    "adapter panicked".to_string()
                } else {
                    format!("adapter task ended: {join_err}")
                };
                warn!(%provider, error = %message, "provider task failed");
                ProviderResult::failed(provider, ProviderFailure::new(FailureKind::Panicked, message))
            }
            Err(_) => {
                handle.abort();
                warn!(%provider, "provider missed the global deadline");
                ProviderResult::failed(provider, ProviderFailure::timeout(self.global_timeout))
            }
        }
    }
}
