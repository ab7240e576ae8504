//! Engine settings read from `LINKGUARD_*` environment variables.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use linkguard_core::ProviderId;
use linkguard_providers::{Fallback, ProviderSettings};
use linkguard_transport::{BackoffPolicy, HttpClientConfig};

use crate::roster::{ProviderRoster, RosterEntry};

/// Env var holding the API key for `provider`.
pub fn api_key_env(provider: ProviderId) -> &'static str {
    match provider {
        ProviderId::SafeBrowsing => "LINKGUARD_SAFE_BROWSING_KEY",
        ProviderId::PhishTank => "LINKGUARD_PHISHTANK_KEY",
        ProviderId::DomainTrust => "LINKGUARD_DOMAIN_TRUST_KEY",
        ProviderId::IpQualityScore => "LINKGUARD_IPQS_KEY",
        ProviderId::NationalCert => "LINKGUARD_NATIONAL_CERT_KEY",
        ProviderId::VirusTotal => "LINKGUARD_VIRUSTOTAL_KEY",
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub provider_timeout_secs: u64,
    pub global_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub roster_path: Option<PathBuf>,
    pub simulate_unconfigured: bool,
    pub retry_max: usize,
    pub screenshot_base: Option<String>,
    pub content_fetch: bool,
    pub api_keys: BTreeMap<ProviderId, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provider_timeout_secs: 10,
            global_timeout_secs: 30,
            http_timeout_secs: 10,
            user_agent: "linkguard/0.1".to_string(),
            roster_path: None,
            simulate_unconfigured: true,
            retry_max: 0,
            screenshot_base: None,
            content_fetch: true,
            api_keys: BTreeMap::new(),
        }
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "True" | "yes"))
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let api_keys = ProviderId::ALL
            .into_iter()
            .filter_map(|provider| env_non_empty(api_key_env(provider)).map(|key| (provider, key)))
            .collect();

        Self {
            provider_timeout_secs: env_parse(
                "LINKGUARD_PROVIDER_TIMEOUT_SECS",
                defaults.provider_timeout_secs,
            ),
            global_timeout_secs: env_parse("LINKGUARD_GLOBAL_TIMEOUT_SECS", defaults.global_timeout_secs),
            http_timeout_secs: env_parse("LINKGUARD_HTTP_TIMEOUT_SECS", defaults.http_timeout_secs),
            user_agent: std::env::var("LINKGUARD_USER_AGENT").unwrap_or(defaults.user_agent),
            roster_path: env_non_empty("LINKGUARD_ROSTER").map(PathBuf::from),
            simulate_unconfigured: env_flag("LINKGUARD_SIMULATE_UNCONFIGURED", true),
            retry_max: env_parse("LINKGUARD_RETRY_MAX", defaults.retry_max),
            screenshot_base: env_non_empty("LINKGUARD_SCREENSHOT_BASE"),
            content_fetch: env_flag("LINKGUARD_CONTENT_FETCH", true),
            api_keys,
        }
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn global_timeout(&self) -> Duration {
        Duration::from_secs(self.global_timeout_secs)
    }

    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout: Duration::from_secs(self.http_timeout_secs),
            user_agent: Some(self.user_agent.clone()),
            ..Default::default()
        }
    }

    /// `None` when retries are off.
    pub fn backoff_policy(&self) -> Option<BackoffPolicy> {
        (self.retry_max > 0).then(|| BackoffPolicy::with_max_retries(self.retry_max))
    }

    pub fn fallback(&self) -> Fallback {
        if self.simulate_unconfigured {
            Fallback::Simulate
        } else {
            Fallback::Disable
        }
    }

    /// Adapter settings for one roster entry: key from env, base URL from the roster.
    pub fn settings_for(&self, entry: &RosterEntry) -> ProviderSettings {
        let mut settings = ProviderSettings::new(entry.provider).with_fallback(self.fallback());
        if let Some(key) = self.api_keys.get(&entry.provider) {
            settings = settings.with_api_key(key.clone());
        }
        if let Some(base_url) = &entry.base_url {
            settings = settings.with_base_url(base_url.clone());
        }
        settings
    }

    pub fn load_roster(&self) -> Result<ProviderRoster> {
        match &self.roster_path {
            Some(path) => ProviderRoster::load(path),
            None => Ok(ProviderRoster::default()),
        }
    }
}
