//! Similarity pair and embedding types.

use crate::models::InterestId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A cached cosine-similarity score between two interests.
///
/// The pair is unordered: the constructor canonicalizes so that
/// `id_a < id_b`, which makes lookups order-independent and guarantees at
/// most one row per pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityPair {
    /// The lexically smaller interest id.
    pub id_a: InterestId,
    /// The lexically larger interest id.
    pub id_b: InterestId,
    /// Cosine similarity (0.0 to 1.0).
    pub similarity: f32,
    /// When the score was computed.
    pub computed_at: DateTime<Utc>,
}

impl SimilarityPair {
    /// Creates a canonicalized similarity pair.
    #[must_use]
    pub fn new(a: InterestId, b: InterestId, similarity: f32) -> Self {
        let (id_a, id_b) = Self::canonical(a, b);
        Self {
            id_a,
            id_b,
            similarity: similarity.clamp(0.0, 1.0),
            computed_at: Utc::now(),
        }
    }

    /// Orders two ids into the canonical `(smaller, larger)` form.
    #[must_use]
    pub fn canonical(a: InterestId, b: InterestId) -> (InterestId, InterestId) {
        if a <= b { (a, b) } else { (b, a) }
    }

    /// Returns true if this pair links the two given ids, in either order.
    #[must_use]
    pub fn links(&self, a: &InterestId, b: &InterestId) -> bool {
        (&self.id_a == a && &self.id_b == b) || (&self.id_a == b && &self.id_b == a)
    }
}

/// A stored embedding vector for an interest's topic text.
///
/// Created lazily the first time similarity is needed; never mutated in
/// place. Regeneration replaces the row wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestEmbedding {
    /// The interest this vector belongs to.
    pub interest_id: InterestId,
    /// The embedding vector.
    pub vector: Vec<f32>,
    /// The model that produced the vector.
    pub model: String,
    /// When the vector was generated.
    pub created_at: DateTime<Utc>,
}

impl InterestEmbedding {
    /// Creates a new embedding record.
    #[must_use]
    pub fn new(interest_id: InterestId, vector: Vec<f32>, model: impl Into<String>) -> Self {
        Self {
            interest_id,
            vector,
            model: model.into(),
            created_at: Utc::now(),
        }
    }
}

/// Computes the cosine similarity between two vectors.
///
/// `dot / (‖a‖·‖b‖)`, defined as 0.0 when either norm is zero or the
/// dimensions differ. The raw value is in [-1, 1]; callers that persist a
/// score clamp it to [0, 1].
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
