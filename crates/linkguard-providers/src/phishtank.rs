//! Phishing list lookup (PhishTank `checkurl`).

use linkguard_core::{Assessment, ProviderId, ThreatTag};
use linkguard_transport::ApiRequest;
use serde_json::Value as JsonValue;
use url::Url;

use crate::{json_bool, ProviderError, ProviderSettings, ThreatFeed};

pub const DEFAULT_BASE_URL: &str = "https://checkurl.phishtank.com/checkurl/";

/// Listed, but the entry is no longer a valid phish.
const UNCONFIRMED_SCORE: u8 = 50;

#[derive(Debug, Clone)]
pub struct PhishTankFeed {
    settings: ProviderSettings,
}

impl PhishTankFeed {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }
}

impl ThreatFeed for PhishTankFeed {
    fn provider(&self) -> ProviderId {
        ProviderId::PhishTank
    }

    fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    fn primary_tag(&self) -> ThreatTag {
        ThreatTag::Phishing
    }

    fn build_request(&self, api_key: &str, url: &Url) -> ApiRequest {
        ApiRequest::post_form(
            &self.settings.base_url,
            vec![
                ("url".to_string(), url.to_string()),
                ("format".to_string(), "json".to_string()),
                ("app_key".to_string(), api_key.to_string()),
            ],
        )
    }

    fn normalize(&self, _url: &Url, body: &JsonValue) -> Result<Assessment, ProviderError> {
        let results = body
            .get("results")
            .filter(|r| r.is_object())
            .ok_or_else(|| ProviderError::schema("missing `results` object"))?;

        let in_database = json_bool(results, &["in_database"]).unwrap_or(false);
        if !in_database {
            return Ok(Assessment::clean(100));
        }

        // `verified` only records community review and stays in the raw payload.
        if json_bool(results, &["valid"]).unwrap_or(false) {
            Ok(Assessment::flagged(0, [ThreatTag::Phishing]))
        } else {
            Ok(Assessment::inconclusive(
                Some(UNCONFIRMED_SCORE),
                [ThreatTag::Suspicious],
            ))
        }
    }

    fn audit_raw(&self, body: &JsonValue) -> JsonValue {
        body.get("results").cloned().unwrap_or(JsonValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture, url};
    use serde_json::json;

    fn feed() -> PhishTankFeed {
        PhishTankFeed::new(ProviderSettings::new(ProviderId::PhishTank))
    }

    #[test]
    fn verified_live_phish_is_unsafe() {
        let assessment = feed()
            .normalize(&url("http://login-verify.example.net/"), &fixture("phishtank", "listed"))
            .unwrap();
        assert_eq!(assessment, Assessment::flagged(0, [ThreatTag::Phishing]));
    }

    #[test]
    fn valid_listing_awaiting_review_is_still_unsafe() {
        let body = json!({
            "results": {
                "url": "http://parcel-redelivery.example.com/",
                "in_database": true,
                "verified": false,
                "valid": true
            }
        });
        let assessment = feed()
            .normalize(&url("http://parcel-redelivery.example.com/"), &body)
            .unwrap();
        assert_eq!(assessment, Assessment::flagged(0, [ThreatTag::Phishing]));
    }

    #[test]
    fn listing_no_longer_valid_is_inconclusive() {
        let assessment = feed()
            .normalize(&url("http://promo-gift.example.org/"), &fixture("phishtank", "unverified"))
            .unwrap();
        assert_eq!(assessment.safe, None);
        assert_eq!(assessment.score, Some(UNCONFIRMED_SCORE));
        assert!(assessment.threat_tags.contains(&ThreatTag::Suspicious));
    }

    #[test]
    fn absent_from_database_is_safe() {
        let assessment = feed()
            .normalize(&url("https://www.rust-lang.org/"), &fixture("phishtank", "not_listed"))
            .unwrap();
        assert_eq!(assessment, Assessment::clean(100));
    }

    #[test]
    fn missing_results_is_a_schema_error() {
        let err = feed()
            .normalize(&url("https://example.com/"), &json!({"meta": {"status": "error"}}))
            .unwrap_err();
        assert!(matches!(err, ProviderError::Schema(_)));
    }

    #[test]
    fn request_is_a_form_post_with_app_key() {
        let request = feed().build_request("pt-key", &url("https://example.com/"));
        match request.body {
            Some(linkguard_transport::RequestBody::Form(fields)) => {
                assert!(fields.contains(&("app_key".to_string(), "pt-key".to_string())));
                assert!(fields.contains(&("format".to_string(), "json".to_string())));
                assert!(fields.contains(&("url".to_string(), "https://example.com/".to_string())));
            }
            other => panic!("unexpected body {other:?}"),
        }
    }
}
