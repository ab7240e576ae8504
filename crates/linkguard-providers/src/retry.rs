//! Optional retry decorator for any [`ProviderAdapter`].

use std::sync::Arc;

use async_trait::async_trait;
use linkguard_core::{ProviderId, ProviderResult};
use linkguard_transport::BackoffPolicy;
use tracing::warn;
use url::Url;

use crate::{AdapterMode, ProviderAdapter};

/// Re-runs `check` while the result carries a retryable failure.
///
/// Checks are read-only, so repeating one is always safe. The caller's per-call
/// timeout still bounds the whole sequence of attempts.
pub struct RetryingAdapter {
    inner: Arc<dyn ProviderAdapter>,
    policy: BackoffPolicy,
}

impl RetryingAdapter {
    pub fn new(inner: Arc<dyn ProviderAdapter>, policy: BackoffPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn wrap(inner: Arc<dyn ProviderAdapter>, policy: BackoffPolicy) -> Arc<dyn ProviderAdapter> {
        Arc::new(Self::new(inner, policy))
    }
}

#[async_trait]
impl ProviderAdapter for RetryingAdapter {
    fn provider(&self) -> ProviderId {
        self.inner.provider()
    }

    fn mode(&self) -> AdapterMode {
        self.inner.mode()
    }

    async fn check(&self, url: &Url) -> ProviderResult {
        let mut attempt = 0;
        loop {
            let result = self.inner.check(url).await;
            let retryable = result
                .error
                .as_ref()
                .map(|failure| failure.is_retryable())
                .unwrap_or(false);
            if !retryable || attempt >= self.policy.max_retries {
                return result;
            }

            let delay = self.policy.delay_for_attempt(attempt);
            warn!(
                provider = %self.inner.provider(),
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "retrying provider after transient failure"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
