//! National CERT threat-feed lookup (malicious URL / smishing blocklist).

use linkguard_core::{Assessment, ProviderId, ThreatTag};
use linkguard_transport::ApiRequest;
use serde_json::Value as JsonValue;
use url::Url;

use crate::{json_bool, json_str, ProviderError, ProviderSettings, ThreatFeed};

/// Feed endpoints are issued per organisation; override with the roster or env.
pub const DEFAULT_BASE_URL: &str = "https://threatfeed.cert.invalid/api/v1/url-lookup";

#[derive(Debug, Clone)]
pub struct NationalCertFeed {
    settings: ProviderSettings,
}

impl NationalCertFeed {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }
}

fn tag_for_category(category: &str) -> ThreatTag {
    match category.to_ascii_lowercase().as_str() {
        "phishing" | "smishing" | "pharming" => ThreatTag::Phishing,
        "malware" | "malware_distribution" | "ransomware" => ThreatTag::Malware,
        "scam" | "fraud" | "investment_fraud" => ThreatTag::Scam,
        "spam" => ThreatTag::Spam,
        _ => ThreatTag::Suspicious,
    }
}

impl ThreatFeed for NationalCertFeed {
    fn provider(&self) -> ProviderId {
        ProviderId::NationalCert
    }

    fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    fn primary_tag(&self) -> ThreatTag {
        ThreatTag::Phishing
    }

    fn build_request(&self, api_key: &str, url: &Url) -> ApiRequest {
        ApiRequest::get(&self.settings.base_url)
            .query("url", url.as_str())
            .header("Authorization", format!("Bearer {api_key}"))
    }

    fn normalize(&self, _url: &Url, body: &JsonValue) -> Result<Assessment, ProviderError> {
        match json_str(body, &["status"]) {
            Some("ok") => {}
            Some(other) => {
                let message = json_str(body, &["message"]).unwrap_or_default();
                return Err(ProviderError::schema(format!("feed status `{other}` {message}")));
            }
            None => return Err(ProviderError::schema("missing `status`")),
        }
        let listed = json_bool(body, &["data", "listed"])
            .ok_or_else(|| ProviderError::schema("missing `data.listed`"))?;
        if !listed {
            return Ok(Assessment::clean(100));
        }
        let tag = json_str(body, &["data", "category"])
            .map(tag_for_category)
            .unwrap_or(ThreatTag::Suspicious);
        Ok(Assessment::flagged(0, [tag]))
    }

    fn audit_raw(&self, body: &JsonValue) -> JsonValue {
        body.get("data").cloned().unwrap_or(JsonValue::Null)
    }
}
