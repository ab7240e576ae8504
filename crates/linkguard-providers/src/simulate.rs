//! Deterministic stand-in verdicts for providers without credentials.
//!
//! The risk number is derived from SHA-256 over `"{salt}:{url}"`, so the same URL
//! gets the same simulated answer from the same provider on every run and host.

use std::collections::BTreeSet;

use linkguard_core::{Assessment, ProviderId, ProviderResult, ThreatTag};
use serde_json::{json, Value as JsonValue};
use sha2::{Digest, Sha256};
use url::Url;

/// Risk strictly above this is reported as malicious.
pub const MALICIOUS_ABOVE: u8 = 90;
/// Risk strictly above this (and not malicious) is reported as suspicious.
pub const SUSPICIOUS_ABOVE: u8 = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Simulation {
    /// 0-100, higher is riskier.
    pub risk: u8,
    /// 0-100 trust score, `100 - risk`.
    pub score: u8,
    pub malicious: bool,
    pub suspicious: bool,
    pub fingerprint: String,
}

pub fn simulate(url: &str, salt: &str) -> Simulation {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(url.as_bytes());
    let digest = hasher.finalize();

    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    let risk = (u64::from_be_bytes(head) % 101) as u8;

    let malicious = risk > MALICIOUS_ABOVE;
    Simulation {
        risk,
        score: 100 - risk,
        malicious,
        suspicious: !malicious && risk > SUSPICIOUS_ABOVE,
        fingerprint: hex::encode(head),
    }
}

impl Simulation {
    pub fn tags(&self, primary: ThreatTag) -> BTreeSet<ThreatTag> {
        let mut tags = BTreeSet::new();
        if self.malicious {
            tags.insert(primary);
        } else if self.suspicious {
            tags.insert(ThreatTag::Suspicious);
        }
        tags
    }

    pub fn assessment(&self, primary: ThreatTag) -> Assessment {
        let tags = self.tags(primary);
        if self.malicious {
            Assessment::flagged(self.score, tags)
        } else if self.suspicious {
            Assessment::inconclusive(Some(self.score), tags)
        } else {
            Assessment::clean(self.score)
        }
    }

    pub fn raw(&self) -> JsonValue {
        json!({
            "simulated": true,
            "risk": self.risk,
            "fingerprint": self.fingerprint,
        })
    }
}

/// Simulated answer for `provider`, salted with its id.
pub fn simulated_result(provider: ProviderId, primary: ThreatTag, url: &Url) -> ProviderResult {
    let simulation = simulate(url.as_str(), provider.as_str());
    ProviderResult::simulated(provider, simulation.assessment(primary), simulation.raw())
}
