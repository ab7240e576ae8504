//! Malware/social-engineering list lookup (Safe Browsing v4 `threatMatches:find`).

use std::collections::BTreeSet;

use linkguard_core::{Assessment, ProviderId, ThreatTag};
use linkguard_transport::ApiRequest;
use serde_json::{json, Value as JsonValue};
use url::Url;

use crate::{ProviderError, ProviderSettings, ThreatFeed};

pub const DEFAULT_BASE_URL: &str = "https://safebrowsing.googleapis.com/v4/threatMatches:find";

const THREAT_TYPES: [&str; 4] = [
    "MALWARE",
    "SOCIAL_ENGINEERING",
    "UNWANTED_SOFTWARE",
    "POTENTIALLY_HARMFUL_APPLICATION",
];

#[derive(Debug, Clone)]
pub struct SafeBrowsingFeed {
    settings: ProviderSettings,
}

impl SafeBrowsingFeed {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }
}

fn tag_for_threat_type(threat_type: &str) -> ThreatTag {
    match threat_type {
        "MALWARE" | "POTENTIALLY_HARMFUL_APPLICATION" => ThreatTag::Malware,
        "SOCIAL_ENGINEERING" => ThreatTag::Phishing,
        "UNWANTED_SOFTWARE" => ThreatTag::UnwantedSoftware,
        _ => ThreatTag::Suspicious,
    }
}

impl ThreatFeed for SafeBrowsingFeed {
    fn provider(&self) -> ProviderId {
        ProviderId::SafeBrowsing
    }

    fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    fn primary_tag(&self) -> ThreatTag {
        ThreatTag::Malware
    }

    fn build_request(&self, api_key: &str, url: &Url) -> ApiRequest {
        let body = json!({
            "client": {
                "clientId": "linkguard",
                "clientVersion": env!("CARGO_PKG_VERSION"),
            },
            "threatInfo": {
                "threatTypes": THREAT_TYPES,
                "platformTypes": ["ANY_PLATFORM"],
                "threatEntryTypes": ["URL"],
                "threatEntries": [{ "url": url.as_str() }],
            }
        });
        ApiRequest::post_json(&self.settings.base_url, body).query("key", api_key)
    }

    fn normalize(&self, _url: &Url, body: &JsonValue) -> Result<Assessment, ProviderError> {
        if !body.is_object() {
            return Err(ProviderError::schema("expected a JSON object"));
        }
        let matches = match body.get("matches") {
            None | Some(JsonValue::Null) => return Ok(Assessment::clean(100)),
            Some(JsonValue::Array(matches)) => matches,
            Some(_) => return Err(ProviderError::schema("`matches` is not an array")),
        };
        if matches.is_empty() {
            return Ok(Assessment::clean(100));
        }

        let tags = matches
            .iter()
            .map(|m| tag_for_threat_type(m.get("threatType").and_then(JsonValue::as_str).unwrap_or("")))
            .collect::<BTreeSet<_>>();
        Ok(Assessment::flagged(0, tags))
    }

    fn audit_raw(&self, body: &JsonValue) -> JsonValue {
        let threat_types = body
            .get("matches")
            .and_then(JsonValue::as_array)
            .map(|matches| {
                matches
                    .iter()
                    .filter_map(|m| m.get("threatType").and_then(JsonValue::as_str))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        json!({ "threatTypes": threat_types })
    }
}
