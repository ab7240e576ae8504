//! Domain trust lookup: crowd-sourced reputation per host.

use std::collections::BTreeSet;

use linkguard_core::{Assessment, ProviderId, ThreatTag};
use linkguard_transport::ApiRequest;
use serde_json::Value as JsonValue;
use url::Url;

use crate::{clamp_score, json_f64, json_u64, ProviderError, ProviderSettings, ThreatFeed};

pub const DEFAULT_BASE_URL: &str = "https://scorecard.api.mywot.com/v3/targets";

pub const TRUSTED_FROM: u8 = 60;
pub const UNTRUSTED_BELOW: u8 = 40;

#[derive(Debug, Clone)]
pub struct DomainTrustFeed {
    settings: ProviderSettings,
}

impl DomainTrustFeed {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }
}

fn tag_for_category(id: u64) -> Option<ThreatTag> {
    match id {
        101 => Some(ThreatTag::Malware),
        103 => Some(ThreatTag::Phishing),
        104 => Some(ThreatTag::Scam),
        105 | 203 => Some(ThreatTag::Suspicious),
        205 => Some(ThreatTag::Spam),
        206 => Some(ThreatTag::UnwantedSoftware),
        _ => None,
    }
}

fn host_of(url: &Url) -> String {
    url.host_str().unwrap_or_default().to_ascii_lowercase()
}

impl ThreatFeed for DomainTrustFeed {
    fn provider(&self) -> ProviderId {
        ProviderId::DomainTrust
    }

    fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    fn primary_tag(&self) -> ThreatTag {
        ThreatTag::Scam
    }

    fn build_request(&self, api_key: &str, url: &Url) -> ApiRequest {
        ApiRequest::get(&self.settings.base_url)
            .query("t", host_of(url))
            .header("x-api-key", api_key)
    }

    fn normalize(&self, url: &Url, body: &JsonValue) -> Result<Assessment, ProviderError> {
        let targets = body
            .as_array()
            .ok_or_else(|| ProviderError::schema("expected an array of targets"))?;
        let host = host_of(url);
        let Some(entry) = targets.iter().find(|t| {
            t.get("target")
                .and_then(JsonValue::as_str)
                .map(|target| target.eq_ignore_ascii_case(&host))
                .unwrap_or(false)
        }) else {
            return Ok(Assessment::inconclusive(None, []));
        };

        let tags = entry
            .get("categories")
            .and_then(JsonValue::as_array)
            .map(|cats| {
                cats.iter()
                    .filter_map(|c| json_u64(c, &["id"]))
                    .filter_map(tag_for_category)
                    .collect::<BTreeSet<_>>()
            })
            .unwrap_or_default();

        let Some(reputation) = json_f64(entry, &["safety", "reputations"]) else {
            return Ok(Assessment::inconclusive(None, tags));
        };
        let score = clamp_score(reputation);
        Ok(if score >= TRUSTED_FROM {
            Assessment {
                safe: Some(true),
                score: Some(score),
                threat_tags: tags,
            }
        } else if score < UNTRUSTED_BELOW {
            Assessment::flagged(score, tags)
        } else {
            Assessment::inconclusive(Some(score), tags)
        })
    }
}
