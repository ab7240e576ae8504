//! Provider roster: which providers run, in what order, with what weight.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use linkguard_core::ProviderId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const WEIGHT_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub provider: ProviderId,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
struct RosterFile {
    providers: Vec<RosterEntry>,
}

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("parsing roster yaml: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("provider `{0}` is listed more than once")]
    Duplicate(ProviderId),
    #[error("provider `{provider}` has negative weight {weight}")]
    NegativeWeight { provider: ProviderId, weight: f64 },
    #[error("enabled provider weights sum to {sum}, expected 1.0")]
    WeightSum { sum: f64 },
}

/// Ordered, validated provider list. Registration order is result order.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRoster {
    entries: Vec<RosterEntry>,
}

impl Default for ProviderRoster {
    fn default() -> Self {
        let weights = [
            (ProviderId::SafeBrowsing, 0.25),
            (ProviderId::PhishTank, 0.15),
            (ProviderId::DomainTrust, 0.15),
            (ProviderId::IpQualityScore, 0.15),
            (ProviderId::NationalCert, 0.10),
            (ProviderId::VirusTotal, 0.20),
        ];
        Self {
            entries: weights
                .into_iter()
                .map(|(provider, weight)| RosterEntry {
                    provider,
                    enabled: true,
                    weight,
                    base_url: None,
                })
                .collect(),
        }
    }
}

impl ProviderRoster {
    pub fn new(entries: Vec<RosterEntry>) -> Result<Self, RosterError> {
        let mut seen = BTreeSet::new();
        for entry in &entries {
            if !seen.insert(entry.provider) {
                return Err(RosterError::Duplicate(entry.provider));
            }
            if entry.weight < 0.0 || entry.weight.is_nan() {
                return Err(RosterError::NegativeWeight {
                    provider: entry.provider,
                    weight: entry.weight,
                });
            }
        }
        let sum: f64 = entries.iter().filter(|e| e.enabled).map(|e| e.weight).sum();
        if (sum - 1.0).abs() > WEIGHT_EPSILON {
            return Err(RosterError::WeightSum { sum });
        }
        Ok(Self { entries })
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, RosterError> {
        let file: RosterFile = serde_yaml::from_str(text)?;
        Self::new(file.providers)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("loading roster {}", path.display()))
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn enabled(&self) -> impl Iterator<Item = &RosterEntry> {
        self.entries.iter().filter(|e| e.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_roster_weights_sum_to_one() {
        let roster = ProviderRoster::default();
        let sum: f64 = roster.enabled().map(|e| e.weight).sum();
        assert!((sum - 1.0).abs() < WEIGHT_EPSILON);
        assert_eq!(roster.entries().len(), ProviderId::ALL.len());
        assert_eq!(
            roster.entries().iter().map(|e| e.provider).collect::<Vec<_>>(),
            ProviderId::ALL.to_vec()
        );
        assert!(ProviderRoster::new(roster.entries().to_vec()).is_ok());
    }

    #[test]
    fn yaml_roster_loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
providers:
  - provider: virustotal
    weight: 0.6
    base_url: http://127.0.0.1:8089/api/v3/urls
  - provider: phishtank
    weight: 0.4
  - provider: national_cert
    enabled: false
    weight: 0.9
"#
        )
        .unwrap();

        let roster = ProviderRoster::load(file.path()).unwrap();
        assert_eq!(roster.entries().len(), 3);
        assert_eq!(roster.entries()[0].provider, ProviderId::VirusTotal);
        assert_eq!(
            roster.entries()[0].base_url.as_deref(),
            Some("http://127.0.0.1:8089/api/v3/urls")
        );
        assert!(!roster.entries()[2].enabled);
        assert_eq!(
            roster.enabled().map(|e| (e.provider, e.weight)).collect::<Vec<_>>(),
            vec![(ProviderId::VirusTotal, 0.6), (ProviderId::PhishTank, 0.4)]
        );
    }

    #[test]
    fn weights_that_do_not_sum_to_one_are_rejected() {
        let err = ProviderRoster::from_yaml_str(
            "providers:\n  - provider: virustotal\n    weight: 0.5\n  - provider: phishtank\n    weight: 0.4\n",
        )
        .unwrap_err();
        assert!(matches!(err, RosterError::WeightSum { .. }));
    }

    #[test]
    fn duplicate_and_negative_entries_are_rejected() {
        let dup = ProviderRoster::from_yaml_str(
            "providers:\n  - provider: virustotal\n    weight: 0.5\n  - provider: virustotal\n    weight: 0.5\n",
        )
        .unwrap_err();
        assert!(matches!(dup, RosterError::Duplicate(ProviderId::VirusTotal)));

        let negative = ProviderRoster::from_yaml_str(
            "providers:\n  - provider: virustotal\n    weight: 1.5\n  - provider: phishtank\n    weight: -0.5\n",
        )
        .unwrap_err();
        assert!(matches!(
            negative,
            RosterError::NegativeWeight {
                provider: ProviderId::PhishTank,
                ..
            }
        ));
    }

    #[test]
    fn unknown_provider_is_a_parse_error() {
        let err = ProviderRoster::from_yaml_str("providers:\n  - provider: urlhaus\n    weight: 1.0\n")
            .unwrap_err();
        assert!(matches!(err, RosterError::Parse(_)));
    }

    #[test]
    fn workspace_roster_matches_the_builtin_default() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../providers.yaml");
        let roster = ProviderRoster::load(&path).unwrap();
        let builtin = ProviderRoster::default();
        assert_eq!(roster.entries().len(), builtin.entries().len());
        for (loaded, default) in roster.entries().iter().zip(builtin.entries()) {
            assert_eq!(loaded.provider, default.provider);
            assert_eq!(loaded.weight, default.weight);
            assert!(loaded.enabled);
        }
    }
}
