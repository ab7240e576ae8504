//! Weighted consensus over normalized provider results.

use std::collections::BTreeMap;

use linkguard_core::{OverallSafety, ProviderId, ProviderResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub overall_score: Option<u8>,
    pub overall_safety: OverallSafety,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScoringModel {
    weights: BTreeMap<ProviderId, f64>,
}

impl ScoringModel {
    pub fn new(weights: impl IntoIterator<Item = (ProviderId, f64)>) -> Self {
        Self {
            weights: weights.into_iter().collect(),
        }
    }

    pub fn weight_of(&self, provider: ProviderId) -> f64 {
        self.weights.get(&provider).copied().unwrap_or(0.0)
    }

    pub fn score(&self, results: &[ProviderResult]) -> Score {
        let overall_score = self.weighted_score(results);
        let overall_safety = match overall_score {
            Some(_) => tally(results),
            None => OverallSafety::Unknown,
        };
        Score {
            overall_score,
            overall_safety,
            confidence: confidence(results),
        }
    }

    /// Weighted mean of usable scores. Errored and disabled results carry no weight.
    fn weighted_score(&self, results: &[ProviderResult]) -> Option<u8> {
        let usable: Vec<(f64, f64)> = results
            .iter()
            .filter_map(|r| r.usable_score().map(|s| (self.weight_of(r.provider), f64::from(s))))
            .collect();
        if usable.is_empty() {
            return None;
        }

        let total_weight: f64 = usable.iter().map(|(w, _)| w).sum();
        let mean = if total_weight > 0.0 {
            usable.iter().map(|(w, s)| w * s).sum::<f64>() / total_weight
        } else {
            // only zero-weight providers answered
            usable.iter().map(|(_, s)| s).sum::<f64>() / usable.len() as f64
        };
        Some(mean.round().clamp(0.0, 100.0) as u8)
    }
}

/// Majority of definite answers; a tie (including none) is unknown.
pub fn tally(results: &[ProviderResult]) -> OverallSafety {
    let (mut safe, mut unsafe_count) = (0usize, 0usize);
    for result in results.iter().filter(|r| r.is_answered()) {
        match result.safe {
            Some(true) => safe += 1,
            Some(false) => unsafe_count += 1,
            None => {}
        }
    }
    match safe.cmp(&unsafe_count) {
        std::cmp::Ordering::Greater => OverallSafety::Safe,
        std::cmp::Ordering::Less => OverallSafety::Unsafe,
        std::cmp::Ordering::Equal => OverallSafety::Unknown,
    }
}

/// Share of registered providers that answered without error.
pub fn confidence(results: &[ProviderResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let answered = results.iter().filter(|r| r.is_answered()).count();
    (answered as f64 / results.len() as f64).clamp(0.0, 1.0)
}
