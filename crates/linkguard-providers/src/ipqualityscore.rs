//! IP/URL reputation lookup (IPQualityScore malicious URL scanner).

use std::collections::BTreeSet;

use linkguard_core::{Assessment, ProviderId, ThreatTag};
use linkguard_transport::ApiRequest;
use serde_json::{json, Value as JsonValue};
use url::{form_urlencoded, Url};

use crate::{clamp_score, json_bool, json_f64, json_str, ProviderError, ProviderSettings, ThreatFeed};

pub const DEFAULT_BASE_URL: &str = "https://ipqualityscore.com/api/json/url";

/// Risk at or above this is unsafe even when `unsafe` is false.
pub const UNSAFE_RISK_FROM: f64 = 75.0;

#[derive(Debug, Clone)]
pub struct IpQualityScoreFeed {
    settings: ProviderSettings,
}

impl IpQualityScoreFeed {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }
}

impl ThreatFeed for IpQualityScoreFeed {
    fn provider(&self) -> ProviderId {
        ProviderId::IpQualityScore
    }

    fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    fn primary_tag(&self) -> ThreatTag {
        ThreatTag::Malware
    }

    fn build_request(&self, api_key: &str, url: &Url) -> ApiRequest {
        let encoded = form_urlencoded::byte_serialize(url.as_str().as_bytes()).collect::<String>();
        ApiRequest::get(format!(
            "{}/{}/{}",
            self.settings.base_url.trim_end_matches('/'),
            api_key,
            encoded
        ))
    }

    fn normalize(&self, _url: &Url, body: &JsonValue) -> Result<Assessment, ProviderError> {
        if json_bool(body, &["success"]) != Some(true) {
            let message = json_str(body, &["message"]).unwrap_or("request was not successful");
            return Err(ProviderError::schema(format!("provider refused lookup: {message}")));
        }
        let risk = json_f64(body, &["risk_score"])
            .ok_or_else(|| ProviderError::schema("missing `risk_score`"))?;

        let mut tags = BTreeSet::new();
        for (flag, tag) in [
            ("phishing", ThreatTag::Phishing),
            ("malware", ThreatTag::Malware),
            ("suspicious", ThreatTag::Suspicious),
            ("spamming", ThreatTag::Spam),
        ] {
            if json_bool(body, &[flag]).unwrap_or(false) {
                tags.insert(tag);
            }
        }

        let flagged_unsafe = json_bool(body, &["unsafe"]).unwrap_or(false);
        let score = clamp_score(100.0 - risk);
        Ok(if flagged_unsafe || risk >= UNSAFE_RISK_FROM {
            Assessment::flagged(score, tags)
        } else {
            Assessment {
                safe: Some(true),
                score: Some(score),
                threat_tags: tags,
            }
        })
    }

    fn audit_raw(&self, body: &JsonValue) -> JsonValue {
        let pick = |key: &str| body.get(key).cloned().unwrap_or(JsonValue::Null);
        json!({
            "unsafe": pick("unsafe"),
            "risk_score": pick("risk_score"),
            "category": pick("category"),
            "domain": pick("domain"),
            "phishing": pick("phishing"),
            "malware": pick("malware"),
            "suspicious": pick("suspicious"),
        })
    }
}
