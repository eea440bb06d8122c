//! Recommendation types and signal weighting.

use crate::models::InterestId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Weight of the co-occurrence signal in the combined score.
pub const CO_OCCURRENCE_WEIGHT: f32 = 0.35;
/// Weight of the semantic-similarity signal in the combined score.
pub const SEMANTIC_WEIGHT: f32 = 0.30;
/// Weight of the hierarchy-adjacency signal in the combined score.
pub const HIERARCHY_WEIGHT: f32 = 0.20;
/// Weight of the temporal-recency signal in the combined score.
pub const TEMPORAL_WEIGHT: f32 = 0.15;

/// The four independent signals behind one recommendation.
///
/// Each signal is kept in [0, 1]; the combined score is the fixed weighted
/// sum `0.35·co + 0.30·sem + 0.20·hier + 0.15·temp` (weights sum to 1.0).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalScores {
    /// Evidence-count proximity to the source interest.
    pub co_occurrence: f32,
    /// Embedding cosine similarity to the source interest.
    pub semantic: f32,
    /// Hierarchy adjacency (ancestor/descendant/sibling of the source).
    pub hierarchy: f32,
    /// How recently the candidate was last seen.
    pub temporal: f32,
}

impl SignalScores {
    /// Raises one signal to the max of its current value and `value`.
    pub fn raise(&mut self, signal: Signal, value: f32) {
        let value = value.clamp(0.0, 1.0);
        let slot = match signal {
            Signal::CoOccurrence => &mut self.co_occurrence,
            Signal::Semantic => &mut self.semantic,
            Signal::Hierarchy => &mut self.hierarchy,
            Signal::Temporal => &mut self.temporal,
        };
        if value > *slot {
            *slot = value;
        }
    }

    /// The weighted combined score, each component clamped to [0, 1].
    #[must_use]
    pub fn combined(&self) -> f32 {
        CO_OCCURRENCE_WEIGHT.mul_add(
            self.co_occurrence.clamp(0.0, 1.0),
            SEMANTIC_WEIGHT.mul_add(
                self.semantic.clamp(0.0, 1.0),
                HIERARCHY_WEIGHT.mul_add(
                    self.hierarchy.clamp(0.0, 1.0),
                    TEMPORAL_WEIGHT * self.temporal.clamp(0.0, 1.0),
                ),
            ),
        )
    }
}

/// Names the four scoring dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Evidence-count proximity.
    CoOccurrence,
    /// Embedding similarity.
    Semantic,
    /// Hierarchy adjacency.
    Hierarchy,
    /// Recency of last detection.
    Temporal,
}

/// A ranked, explainable topic recommendation for a source interest.
///
/// Upserted per `(source, recommended_topic)` pair; rows expire after a
/// fixed retention window and are excluded from reads once expired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// The interest the recommendation was computed for.
    pub source_id: InterestId,
    /// The recommended topic string.
    pub recommended_topic: String,
    /// Combined score (0.0 to 1.0).
    pub score: f32,
    /// Human-readable reasons, one per contributing signal.
    pub reasoning: String,
    /// Per-signal breakdown.
    pub signals: SignalScores,
    /// When the recommendation was computed.
    pub computed_at: DateTime<Utc>,
    /// When the row stops being served.
    pub expires_at: DateTime<Utc>,
}

impl Recommendation {
    /// Returns true if the row is expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_weights_sum_to_one() {
        let sum = CO_OCCURRENCE_WEIGHT + SEMANTIC_WEIGHT + HIERARCHY_WEIGHT + TEMPORAL_WEIGHT;
        assert!((sum - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_combined_is_weighted_sum() {
        let signals = SignalScores {
            co_occurrence: 0.9,
            semantic: 0.82,
            hierarchy: 0.85,
            temporal: 1.0,
        };
        let expected = 0.35f32 * 0.9 + 0.30 * 0.82 + 0.20 * 0.85 + 0.15 * 1.0;
        assert!((signals.combined() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_raise_keeps_max() {
        let mut signals = SignalScores::default();
        signals.raise(Signal::Hierarchy, 0.75);
        signals.raise(Signal::Hierarchy, 0.9);
        signals.raise(Signal::Hierarchy, 0.85);
        assert_eq!(signals.hierarchy, 0.9);
    }

    #[test]
    fn test_raise_clamps() {
        let mut signals = SignalScores::default();
        signals.raise(Signal::Temporal, 1.3);
        assert_eq!(signals.temporal, 1.0);
    }

    proptest! {
        /// The combined score always stays within [0, 1] and matches the
        /// weighted sum of the clamped components.
        #[test]
        fn prop_combined_in_unit_interval(
            co in -0.5f32..1.5,
            sem in -0.5f32..1.5,
            hier in -0.5f32..1.5,
            temp in -0.5f32..1.5
        ) {
            let signals = SignalScores {
                co_occurrence: co,
                semantic: sem,
                hierarchy: hier,
                temporal: temp,
            };
            let combined = signals.combined();
            prop_assert!((0.0..=1.0001).contains(&combined));

            let expected = 0.35f32 * co.clamp(0.0, 1.0)
                + 0.30 * sem.clamp(0.0, 1.0)
                + 0.20 * hier.clamp(0.0, 1.0)
                + 0.15 * temp.clamp(0.0, 1.0);
            prop_assert!((combined - expected).abs() < 1e-5);
        }
    }
}
