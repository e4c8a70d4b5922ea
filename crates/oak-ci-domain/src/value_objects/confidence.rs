//! Confidence tier bucketing for retrieval results (spec.md §4.8).

use serde::{Deserialize, Serialize};

/// Bucketed similarity score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    /// Below the medium threshold.
    Low,
    /// At or above the medium threshold, below high.
    Medium,
    /// At or above the high threshold.
    High,
}

impl ConfidenceTier {
    /// Map a cosine similarity score in `[0, 1]` to a tier given the two
    /// configured thresholds.
    #[must_use]
    pub fn from_score(score: f32, high: f32, medium: f32) -> Self {
        if score >= high {
            Self::High
        } else if score >= medium {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Whether this tier meets or exceeds `min`.
    #[must_use]
    pub fn at_least(self, min: Self) -> bool {
        self >= min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_by_threshold() {
        assert_eq!(ConfidenceTier::from_score(0.9, 0.75, 0.5), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::from_score(0.6, 0.75, 0.5), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_score(0.1, 0.75, 0.5), ConfidenceTier::Low);
    }

    #[test]
    fn ordering_supports_at_least() {
        assert!(ConfidenceTier::High.at_least(ConfidenceTier::Medium));
        assert!(!ConfidenceTier::Low.at_least(ConfidenceTier::Medium));
    }
}
