//! Antivirus-engine lookup (VirusTotal v3 URL report).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use linkguard_core::{Assessment, ProviderId, ThreatTag};
use linkguard_transport::ApiRequest;
use serde_json::{json, Value as JsonValue};
use url::Url;

use crate::{clamp_score, json_u64, ProviderError, ProviderSettings, ThreatFeed};

pub const DEFAULT_BASE_URL: &str = "https://www.virustotal.com/api/v3/urls";

/// Engines that must agree before the URL is called malicious.
pub const MALICIOUS_ENGINES: u64 = 2;

#[derive(Debug, Clone)]
pub struct VirusTotalFeed {
    settings: ProviderSettings,
}

impl VirusTotalFeed {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }
}

/// URL identifier: unpadded URL-safe base64 of the URL itself.
pub fn url_id(url: &Url) -> String {
    URL_SAFE_NO_PAD.encode(url.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AnalysisStats {
    malicious: u64,
    suspicious: u64,
    harmless: u64,
    undetected: u64,
}

impl AnalysisStats {
    fn from_json(stats: &JsonValue) -> Self {
        let count = |key: &str| json_u64(stats, &[key]).unwrap_or(0);
        Self {
            malicious: count("malicious"),
            suspicious: count("suspicious"),
            harmless: count("harmless"),
            undetected: count("undetected"),
        }
    }

    fn total(&self) -> u64 {
        self.malicious
            .saturating_add(self.suspicious)
            .saturating_add(self.harmless)
            .saturating_add(self.undetected)
    }
}

fn stats_of(body: &JsonValue) -> Option<&JsonValue> {
    body.get("data")?
        .get("attributes")?
        .get("last_analysis_stats")
        .filter(|s| s.is_object())
}

impl ThreatFeed for VirusTotalFeed {
    fn provider(&self) -> ProviderId {
        ProviderId::VirusTotal
    }

    fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    fn primary_tag(&self) -> ThreatTag {
        ThreatTag::Malware
    }

    fn build_request(&self, api_key: &str, url: &Url) -> ApiRequest {
        ApiRequest::get(format!(
            "{}/{}",
            self.settings.base_url.trim_end_matches('/'),
            url_id(url)
        ))
        .header("x-apikey", api_key)
    }

    fn normalize(&self, _url: &Url, body: &JsonValue) -> Result<Assessment, ProviderError> {
        let stats = stats_of(body)
            .map(AnalysisStats::from_json)
            .ok_or_else(|| ProviderError::schema("missing `data.attributes.last_analysis_stats`"))?;

        let total = stats.total();
        if total == 0 {
            return Ok(Assessment::inconclusive(None, []));
        }
        let clean = stats.harmless.saturating_add(stats.undetected);
        let score = clamp_score(100.0 * clean as f64 / total as f64);

        Ok(if stats.malicious >= MALICIOUS_ENGINES {
            Assessment::flagged(score, [ThreatTag::Malware])
        } else if stats.malicious > 0 || stats.suspicious > 0 {
            Assessment::inconclusive(Some(score), [ThreatTag::Suspicious])
        } else {
            Assessment::clean(score)
        })
    }

    /// 404 means the URL was never scanned: an answer without a verdict.
    fn answer_for_status(&self, status: u16) -> Option<Assessment> {
        (status == 404).then(|| Assessment::inconclusive(None, []))
    }

    fn audit_raw(&self, body: &JsonValue) -> JsonValue {
        json!({
            "last_analysis_stats": stats_of(body).cloned().unwrap_or(JsonValue::Null),
            "reputation": body
                .pointer("/data/attributes/reputation")
                .cloned()
                .unwrap_or(JsonValue::Null),
        })
    }
}
