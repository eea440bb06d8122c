//! In-memory store for testing and development.

use crate::models::{
    Evidence, HierarchyEdge, Interest, InterestEmbedding, InterestId, Recommendation,
    SimilarityPair, cosine_similarity,
};
use crate::storage::InterestStore;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

fn poisoned(operation: &str) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: "lock poisoned".to_string(),
    }
}

/// In-memory [`InterestStore`] backed by `RwLock`ed maps.
///
/// Not persistent; intended for unit tests and development. Thread-safe via
/// reader-writer locks.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    interests: RwLock<HashMap<InterestId, Interest>>,
    evidence: RwLock<Vec<Evidence>>,
    edges: RwLock<HashMap<(InterestId, InterestId), HierarchyEdge>>,
    pairs: RwLock<HashMap<(InterestId, InterestId), SimilarityPair>>,
    recommendations: RwLock<HashMap<(InterestId, String), Recommendation>>,
    embeddings: RwLock<HashMap<InterestId, InterestEmbedding>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of interest rows, active or not.
    #[must_use]
    pub fn interest_count(&self) -> usize {
        self.interests.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns the number of hierarchy edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns the number of evidence rows.
    #[must_use]
    pub fn evidence_count(&self) -> usize {
        self.evidence.read().map(|v| v.len()).unwrap_or(0)
    }
}

impl InterestStore for InMemoryStore {
    fn insert_interest(&self, interest: &Interest) -> Result<()> {
        let mut interests = self
            .interests
            .write()
            .map_err(|_| poisoned("insert_interest"))?;
        interests.insert(interest.id.clone(), interest.clone());
        Ok(())
    }

    fn get_interest(&self, id: &InterestId) -> Result<Option<Interest>> {
        let interests = self.interests.read().map_err(|_| poisoned("get_interest"))?;
        Ok(interests.get(id).cloned())
    }

    fn get_active_by_topic(&self, topic: &str) -> Result<Option<Interest>> {
        let interests = self
            .interests
            .read()
            .map_err(|_| poisoned("get_active_by_topic"))?;
        Ok(interests
            .values()
            .filter(|i| i.is_active)
            .find(|i| i.matches_topic(topic))
            .cloned())
    }

    fn update_interest(&self, interest: &Interest) -> Result<()> {
        let mut interests = self
            .interests
            .write()
            .map_err(|_| poisoned("update_interest"))?;
        if !interests.contains_key(&interest.id) {
            return Err(Error::NotFound {
                kind: "interest",
                id: interest.id.to_string(),
            });
        }
        interests.insert(interest.id.clone(), interest.clone());
        Ok(())
    }

    fn list_active_interests(&self) -> Result<Vec<Interest>> {
        let interests = self
            .interests
            .read()
            .map_err(|_| poisoned("list_active_interests"))?;
        let mut active: Vec<Interest> = interests.values().filter(|i| i.is_active).cloned().collect();
        // Deterministic iteration order for callers and tests
        active.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(active)
    }

    fn list_interests_above(&self, min_confidence: f32) -> Result<Vec<Interest>> {
        let mut active: Vec<Interest> = self
            .list_active_interests()?
            .into_iter()
            .filter(|i| i.confidence >= min_confidence)
            .collect();
        active.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(active)
    }

    fn insert_evidence(&self, evidence: &Evidence) -> Result<()> {
        let mut rows = self
            .evidence
            .write()
            .map_err(|_| poisoned("insert_evidence"))?;
        rows.push(evidence.clone());
        Ok(())
    }

    fn list_evidence_for(&self, interest_id: &InterestId) -> Result<Vec<Evidence>> {
        let rows = self
            .evidence
            .read()
            .map_err(|_| poisoned("list_evidence_for"))?;
        Ok(rows
            .iter()
            .filter(|e| &e.interest_id == interest_id)
            .cloned()
            .collect())
    }

    fn reassign_evidence(&self, from: &InterestId, to: &InterestId) -> Result<usize> {
        let mut rows = self
            .evidence
            .write()
            .map_err(|_| poisoned("reassign_evidence"))?;
        let mut moved = 0;
        for row in rows.iter_mut().filter(|e| &e.interest_id == from) {
            row.interest_id = to.clone();
            moved += 1;
        }
        Ok(moved)
    }

    fn upsert_edge(&self, edge: &HierarchyEdge) -> Result<()> {
        let mut edges = self.edges.write().map_err(|_| poisoned("upsert_edge"))?;
        edges.insert(
            (edge.parent_id.clone(), edge.child_id.clone()),
            edge.clone(),
        );
        Ok(())
    }

    fn list_edges(&self) -> Result<Vec<HierarchyEdge>> {
        let edges = self.edges.read().map_err(|_| poisoned("list_edges"))?;
        let mut all: Vec<HierarchyEdge> = edges.values().cloned().collect();
        all.sort_by(|a, b| {
            a.parent_id
                .cmp(&b.parent_id)
                .then_with(|| a.child_id.cmp(&b.child_id))
        });
        Ok(all)
    }

    fn edges_from(&self, parent_id: &InterestId) -> Result<Vec<HierarchyEdge>> {
        Ok(self
            .list_edges()?
            .into_iter()
            .filter(|e| &e.parent_id == parent_id)
            .collect())
    }

    fn edges_to(&self, child_id: &InterestId) -> Result<Vec<HierarchyEdge>> {
        Ok(self
            .list_edges()?
            .into_iter()
            .filter(|e| &e.child_id == child_id)
            .collect())
    }

    fn delete_edges_for(&self, id: &InterestId) -> Result<usize> {
        let mut edges = self
            .edges
            .write()
            .map_err(|_| poisoned("delete_edges_for"))?;
        let before = edges.len();
        edges.retain(|(parent, child), _| parent != id && child != id);
        Ok(before - edges.len())
    }

    fn upsert_similarity(&self, pair: &SimilarityPair) -> Result<()> {
        let mut pairs = self
            .pairs
            .write()
            .map_err(|_| poisoned("upsert_similarity"))?;
        pairs.insert((pair.id_a.clone(), pair.id_b.clone()), pair.clone());
        Ok(())
    }

    fn get_similarity(&self, a: &InterestId, b: &InterestId) -> Result<Option<SimilarityPair>> {
        let pairs = self.pairs.read().map_err(|_| poisoned("get_similarity"))?;
        let key = SimilarityPair::canonical(a.clone(), b.clone());
        Ok(pairs.get(&key).cloned())
    }

    fn upsert_recommendation(&self, recommendation: &Recommendation) -> Result<()> {
        let mut recs = self
            .recommendations
            .write()
            .map_err(|_| poisoned("upsert_recommendation"))?;
        recs.insert(
            (
                recommendation.source_id.clone(),
                recommendation.recommended_topic.to_lowercase(),
            ),
            recommendation.clone(),
        );
        Ok(())
    }

    fn list_recommendations(
        &self,
        source_id: &InterestId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Recommendation>> {
        let recs = self
            .recommendations
            .read()
            .map_err(|_| poisoned("list_recommendations"))?;
        let mut matching: Vec<Recommendation> = recs
            .values()
            .filter(|r| &r.source_id == source_id && !r.is_expired(now))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(matching)
    }

    fn put_embedding(&self, embedding: &InterestEmbedding) -> Result<()> {
        let mut embeddings = self
            .embeddings
            .write()
            .map_err(|_| poisoned("put_embedding"))?;
        embeddings.insert(embedding.interest_id.clone(), embedding.clone());
        Ok(())
    }

    fn get_embedding(&self, id: &InterestId) -> Result<Option<InterestEmbedding>> {
        let embeddings = self
            .embeddings
            .read()
            .map_err(|_| poisoned("get_embedding"))?;
        Ok(embeddings.get(id).cloned())
    }

    fn search_similar(
        &self,
        query: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<(InterestId, f32)>> {
        let embeddings = self
            .embeddings
            .read()
            .map_err(|_| poisoned("search_similar"))?;
        let mut hits: Vec<(InterestId, f32)> = embeddings
            .values()
            .map(|e| (e.interest_id.clone(), cosine_similarity(query, &e.vector)))
            .filter(|(_, sim)| *sim >= threshold)
            .collect();
        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }
}
