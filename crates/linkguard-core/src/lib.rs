//! Core verdict model for LinkGuard: normalized provider results and the aggregated verdict.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

pub const CRATE_NAME: &str = "linkguard-core";

/// Known threat-intelligence providers, in default registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProviderId {
    #[serde(rename = "safe_browsing")]
    SafeBrowsing,
    #[serde(rename = "phishtank")]
    PhishTank,
    #[serde(rename = "domain_trust")]
    DomainTrust,
    #[serde(rename = "ipqualityscore")]
    IpQualityScore,
    #[serde(rename = "national_cert")]
    NationalCert,
    #[serde(rename = "virustotal")]
    VirusTotal,
}

impl ProviderId {
    pub const ALL: [ProviderId; 6] = [
        ProviderId::SafeBrowsing,
        ProviderId::PhishTank,
        ProviderId::DomainTrust,
        ProviderId::IpQualityScore,
        ProviderId::NationalCert,
        ProviderId::VirusTotal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderId::SafeBrowsing => "safe_browsing",
            ProviderId::PhishTank => "phishtank",
            ProviderId::DomainTrust => "domain_trust",
            ProviderId::IpQualityScore => "ipqualityscore",
            ProviderId::NationalCert => "national_cert",
            ProviderId::VirusTotal => "virustotal",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ProviderId::SafeBrowsing => "Safe Browsing",
            ProviderId::PhishTank => "PhishTank",
            ProviderId::DomainTrust => "Domain Trust",
            ProviderId::IpQualityScore => "IPQualityScore",
            ProviderId::NationalCert => "National CERT feed",
            ProviderId::VirusTotal => "VirusTotal",
        }
    }

    /// What kind of lookup the provider performs.
    pub fn kind(self) -> &'static str {
        match self {
            ProviderId::SafeBrowsing => "malware-list",
            ProviderId::PhishTank => "phishing-list",
            ProviderId::DomainTrust => "domain-trust",
            ProviderId::IpQualityScore => "url-reputation",
            ProviderId::NationalCert => "national-threat-feed",
            ProviderId::VirusTotal => "antivirus-engines",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown provider id: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderId {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        ProviderId::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| UnknownProvider(s.to_string()))
    }
}

/// Shared threat vocabulary every provider's categories are normalized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatTag {
    Malware,
    Phishing,
    Suspicious,
    UnwantedSoftware,
    Scam,
    Spam,
}

impl ThreatTag {
    pub fn as_str(self) -> &'static str {
        match self {
            ThreatTag::Malware => "malware",
            ThreatTag::Phishing => "phishing",
            ThreatTag::Suspicious => "suspicious",
            ThreatTag::UnwantedSoftware => "unwanted_software",
            ThreatTag::Scam => "scam",
            ThreatTag::Spam => "spam",
        }
    }
}

impl fmt::Display for ThreatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transport,
    HttpStatus,
    Timeout,
    Schema,
    Panicked,
}

/// Why a provider produced no usable answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderFailure {
    pub kind: FailureKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip)]
    pub retryable: bool,
}

impl ProviderFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            retryable: matches!(kind, FailureKind::Transport | FailureKind::Timeout),
        }
    }

    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::HttpStatus,
            message: message.into(),
            status: Some(status),
            retryable: status == 429 || (500..600).contains(&status),
        }
    }

    /// Override the kind-based default with the transport's own classification.
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            FailureKind::Timeout,
            format!("no answer within {}ms", after.as_millis()),
        )
    }

    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// The normalized judgement a provider's bespoke reply boils down to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Assessment {
    pub safe: Option<bool>,
    pub score: Option<u8>,
    pub threat_tags: BTreeSet<ThreatTag>,
}

impl Assessment {
    pub fn clean(score: u8) -> Self {
        Self {
            safe: Some(true),
            score: Some(score.min(100)),
            threat_tags: BTreeSet::new(),
        }
    }

    pub fn flagged(score: u8, tags: impl IntoIterator<Item = ThreatTag>) -> Self {
        Self {
            safe: Some(false),
            score: Some(score.min(100)),
            threat_tags: tags.into_iter().collect(),
        }
    }

    pub fn inconclusive(score: Option<u8>, tags: impl IntoIterator<Item = ThreatTag>) -> Self {
        Self {
            safe: None,
            score: score.map(|s| s.min(100)),
            threat_tags: tags.into_iter().collect(),
        }
    }
}

/// Normalized output of one provider adapter.
///
/// Built only through the constructors so that `error` and `score` are never both set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResult {
    pub provider: ProviderId,
    pub enabled: bool,
    pub safe: Option<bool>,
    pub score: Option<u8>,
    pub threat_tags: BTreeSet<ThreatTag>,
    pub raw: JsonValue,
    pub error: Option<ProviderFailure>,
    pub checked_at: DateTime<Utc>,
    pub simulated: bool,
}

impl ProviderResult {
    pub fn answered(provider: ProviderId, assessment: Assessment, raw: JsonValue) -> Self {
        Self {
            provider,
            enabled: true,
            safe: assessment.safe,
            score: assessment.score,
            threat_tags: assessment.threat_tags,
            raw,
            error: None,
            checked_at: Utc::now(),
            simulated: false,
        }
    }

    pub fn simulated(provider: ProviderId, assessment: Assessment, raw: JsonValue) -> Self {
        Self {
            simulated: true,
            ..Self::answered(provider, assessment, raw)
        }
    }

    pub fn failed(provider: ProviderId, failure: ProviderFailure) -> Self {
        Self {
            provider,
            enabled: true,
            safe: None,
            score: None,
            threat_tags: BTreeSet::new(),
            raw: JsonValue::Null,
            error: Some(failure),
            checked_at: Utc::now(),
            simulated: false,
        }
    }

    /// Provider is registered but has nothing to call; no request was attempted.
    pub fn disabled(provider: ProviderId) -> Self {
        Self {
            provider,
            enabled: false,
            safe: None,
            score: None,
            threat_tags: BTreeSet::new(),
            raw: JsonValue::Null,
            error: None,
            checked_at: Utc::now(),
            simulated: false,
        }
    }

    pub fn is_errored(&self) -> bool {
        self.error.is_some()
    }

    /// Enabled and finished without error (a score may still be absent).
    pub fn is_answered(&self) -> bool {
        self.enabled && self.error.is_none()
    }

    pub fn usable_score(&self) -> Option<u8> {
        if self.is_answered() {
            self.score
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallSafety {
    Safe,
    Unsafe,
    Unknown,
}

impl OverallSafety {
    pub fn as_str(self) -> &'static str {
        match self {
            OverallSafety::Safe => "safe",
            OverallSafety::Unsafe => "unsafe",
            OverallSafety::Unknown => "unknown",
        }
    }
}

impl fmt::Display for OverallSafety {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerdictSummary {
    pub total: usize,
    pub enabled: usize,
    pub safe: usize,
    #[serde(rename = "unsafe")]
    pub unsafe_count: usize,
    pub unknown: usize,
    pub errored: usize,
    pub simulated: usize,
}

impl VerdictSummary {
    pub fn tally(results: &[ProviderResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };
        for result in results {
            if result.enabled {
                summary.enabled += 1;
            }
            if result.simulated {
                summary.simulated += 1;
            }
            if result.is_errored() {
                summary.errored += 1;
                continue;
            }
            if !result.enabled {
                continue;
            }
            match result.safe {
                Some(true) => summary.safe += 1,
                Some(false) => summary.unsafe_count += 1,
                None => summary.unknown += 1,
            }
        }
        summary
    }
}

/// Aggregated answer for one URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityVerdict {
    pub url: String,
    pub overall_score: Option<u8>,
    pub overall_safety: OverallSafety,
    pub confidence: f64,
    pub provider_results: Vec<ProviderResult>,
    pub summary: VerdictSummary,
    pub duration_ms: u64,
    pub checked_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provider_ids_round_trip_through_their_string_form() {
        for id in ProviderId::ALL {
            assert_eq!(id.as_str().parse::<ProviderId>().unwrap(), id);
            let encoded = serde_json::to_value(id).unwrap();
            assert_eq!(encoded, json!(id.as_str()));
        }
        assert_eq!("Safe-Browsing".parse::<ProviderId>().unwrap(), ProviderId::SafeBrowsing);
        assert!("urlhaus".parse::<ProviderId>().is_err());
    }

    #[test]
    fn failed_results_never_carry_a_score() {
        let result = ProviderResult::failed(
            ProviderId::VirusTotal,
            ProviderFailure::timeout(Duration::from_secs(10)),
        );
        assert!(result.is_errored());
        assert_eq!(result.score, None);
        assert_eq!(result.usable_score(), None);
        assert!(!result.is_answered());
    }

    #[test]
    fn disabled_results_are_not_answered() {
        let result = ProviderResult::disabled(ProviderId::PhishTank);
        assert!(!result.enabled);
        assert!(!result.is_errored());
        assert!(!result.is_answered());
    }

    #[test]
    fn retryable_failures_cover_transient_kinds_only() {
        assert!(ProviderFailure::new(FailureKind::Transport, "reset").is_retryable());
        assert!(ProviderFailure::timeout(Duration::from_secs(1)).is_retryable());
        assert!(ProviderFailure::http_status(503, "unavailable").is_retryable());
        assert!(ProviderFailure::http_status(429, "slow down").is_retryable());
        assert!(!ProviderFailure::http_status(403, "forbidden").is_retryable());
        assert!(!ProviderFailure::new(FailureKind::Schema, "bad shape").is_retryable());
        assert!(!ProviderFailure::new(FailureKind::Transport, "redirect loop")
            .with_retryable(false)
            .is_retryable());
    }

    #[test]
    fn retry_classification_is_not_serialized() {
        let failure = ProviderFailure::http_status(503, "unavailable");
        let value = serde_json::to_value(&failure).unwrap();
        assert_eq!(value, json!({"kind": "http_status", "message": "unavailable", "status": 503}));
    }

    #[test]
    fn summary_counts_votes_errors_and_disabled() {
        let results = vec![
            ProviderResult::answered(ProviderId::SafeBrowsing, Assessment::clean(100), json!({})),
            ProviderResult::simulated(
                ProviderId::PhishTank,
                Assessment::flagged(5, [ThreatTag::Phishing]),
                json!({}),
            ),
            ProviderResult::answered(
                ProviderId::DomainTrust,
                Assessment::inconclusive(Some(50), []),
                json!({}),
            ),
            ProviderResult::failed(
                ProviderId::IpQualityScore,
                ProviderFailure::new(FailureKind::Schema, "missing risk_score"),
            ),
            ProviderResult::disabled(ProviderId::NationalCert),
        ];
        let summary = VerdictSummary::tally(&results);
        assert_eq!(
            summary,
            VerdictSummary {
                total: 5,
                enabled: 4,
                safe: 1,
                unsafe_count: 1,
                unknown: 1,
                errored: 1,
                simulated: 1,
            }
        );
    }

    #[test]
    fn provider_result_serializes_with_camel_case_fields() {
        let result = ProviderResult::answered(
            ProviderId::SafeBrowsing,
            Assessment::flagged(0, [ThreatTag::Malware, ThreatTag::Phishing]),
            json!({"matches": 2}),
        );
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["provider"], json!("safe_browsing"));
        assert_eq!(value["threatTags"], json!(["malware", "phishing"]));
        assert_eq!(value["safe"], json!(false));
        assert!(value.get("checkedAt").is_some());
        assert_eq!(value["error"], JsonValue::Null);
    }
}
