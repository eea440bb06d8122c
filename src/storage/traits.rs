//! Store trait for interest-graph entities.

use crate::Result;
use crate::models::{
    Evidence, HierarchyEdge, Interest, InterestEmbedding, InterestId, Recommendation,
    SimilarityPair,
};
use chrono::{DateTime, Utc};

/// CRUD over the five interest-graph entity kinds plus embeddings.
///
/// The store holds no business logic: merge semantics, cycle checks and
/// scoring all live in the service layer. Implementations must be
/// thread-safe (`Send + Sync`); methods take `&self` so stores can be shared
/// via `Arc`, using interior mutability for mutable state.
///
/// Active-set reads (`list_active_interests`, `get_active_by_topic`,
/// `list_interests_above`) never return merged tombstones or deactivated
/// rows; those stay reachable only by direct id.
pub trait InterestStore: Send + Sync {
    // =========================================================================
    // Interests
    // =========================================================================

    /// Inserts a new interest row.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    fn insert_interest(&self, interest: &Interest) -> Result<()>;

    /// Retrieves an interest by id, active or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn get_interest(&self, id: &InterestId) -> Result<Option<Interest>>;

    /// Finds the active interest matching a topic string, case-insensitively,
    /// against the canonical topic or any synonym.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn get_active_by_topic(&self, topic: &str) -> Result<Option<Interest>>;

    /// Updates an existing interest row (matched by id).
    ///
    /// # Errors
    ///
    /// Returns an error if the row does not exist or the update fails.
    fn update_interest(&self, interest: &Interest) -> Result<()>;

    /// Lists all active interests.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_active_interests(&self) -> Result<Vec<Interest>>;

    /// Lists active interests at or above a confidence floor, highest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_interests_above(&self, min_confidence: f32) -> Result<Vec<Interest>>;

    // =========================================================================
    // Evidence
    // =========================================================================

    /// Inserts an evidence row.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    fn insert_evidence(&self, evidence: &Evidence) -> Result<()>;

    /// Lists all evidence for an interest.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_evidence_for(&self, interest_id: &InterestId) -> Result<Vec<Evidence>>;

    /// Repoints every evidence row owned by `from` at `to`.
    ///
    /// Returns the number of rows reassigned. Used when folding a duplicate
    /// interest into its canonical survivor.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    fn reassign_evidence(&self, from: &InterestId, to: &InterestId) -> Result<usize>;

    // =========================================================================
    // Hierarchy edges
    // =========================================================================

    /// Inserts or overwrites the edge for an ordered `(parent, child)` pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    fn upsert_edge(&self, edge: &HierarchyEdge) -> Result<()>;

    /// Lists every hierarchy edge.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_edges(&self) -> Result<Vec<HierarchyEdge>>;

    /// Lists edges where `parent_id` is the given interest (its children).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn edges_from(&self, parent_id: &InterestId) -> Result<Vec<HierarchyEdge>>;

    /// Lists edges where `child_id` is the given interest (its parents).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn edges_to(&self, child_id: &InterestId) -> Result<Vec<HierarchyEdge>>;

    /// Deletes every edge touching the given interest, on either side.
    ///
    /// Returns the number of edges removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the deletion fails.
    fn delete_edges_for(&self, id: &InterestId) -> Result<usize>;

    // =========================================================================
    // Similarity pairs
    // =========================================================================

    /// Inserts or overwrites a similarity pair (already canonicalized).
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    fn upsert_similarity(&self, pair: &SimilarityPair) -> Result<()>;

    /// Looks up the cached similarity for two interests, in either order.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn get_similarity(&self, a: &InterestId, b: &InterestId) -> Result<Option<SimilarityPair>>;

    // =========================================================================
    // Recommendations
    // =========================================================================

    /// Inserts or overwrites the recommendation for a
    /// `(source, recommended_topic)` pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    fn upsert_recommendation(&self, recommendation: &Recommendation) -> Result<()>;

    /// Lists unexpired recommendations for a source interest, highest score
    /// first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_recommendations(
        &self,
        source_id: &InterestId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Recommendation>>;

    // =========================================================================
    // Embeddings
    // =========================================================================

    /// Stores an embedding, replacing any existing row for the interest.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn put_embedding(&self, embedding: &InterestEmbedding) -> Result<()>;

    /// Retrieves the embedding for an interest.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn get_embedding(&self, id: &InterestId) -> Result<Option<InterestEmbedding>>;

    /// Scans stored embeddings for vectors whose cosine similarity to `query`
    /// is at least `threshold`, descending, capped at `limit`.
    ///
    /// The query interest's own row is not excluded; callers filter it.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    fn search_similar(
        &self,
        query: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<(InterestId, f32)>>;
}
