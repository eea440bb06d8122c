//! Semantic similarity and duplicate folding.
//!
//! Quantifies how close two interests are in embedding space, caches the
//! pairwise scores, and folds near-duplicates ("Python" vs "python
//! programming") into one canonical interest.

use crate::embedding::EmbeddingGateway;
use crate::models::{Interest, InterestEmbedding, InterestId, SimilarityPair, cosine_similarity};
use crate::storage::InterestStore;
use crate::{Error, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;

/// Maximum number of similar interests returned by a lookup.
pub const MAX_SIMILAR_RESULTS: usize = 20;

/// An active interest together with its similarity to the query interest.
#[derive(Debug, Clone)]
pub struct SimilarInterest {
    /// The similar interest.
    pub interest: Interest,
    /// Cosine similarity to the query interest.
    pub similarity: f32,
}

/// Result of a merge operation.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    /// Secondaries successfully folded into the primary.
    pub merged: Vec<InterestId>,
    /// Secondaries that could not be merged (missing, inactive, or failed).
    pub skipped: Vec<InterestId>,
}

/// Computes, caches and acts on semantic closeness between interests.
pub struct SimilarityEngine<S: InterestStore, E: EmbeddingGateway> {
    store: Arc<S>,
    embedder: Arc<E>,
}

impl<S: InterestStore, E: EmbeddingGateway> SimilarityEngine<S, E> {
    /// Creates a new similarity engine.
    #[must_use]
    pub const fn new(store: Arc<S>, embedder: Arc<E>) -> Self {
        Self { store, embedder }
    }

    /// Ensures an embedding exists for the interest and returns it.
    ///
    /// Idempotent: an existing embedding is returned unchanged and the
    /// embedding service is not called again for the same interest.
    ///
    /// # Errors
    ///
    /// Returns an error if the interest does not exist or the embedding
    /// service fails.
    pub fn generate_embedding(&self, id: &InterestId) -> Result<InterestEmbedding> {
        if let Some(existing) = self.store.get_embedding(id)? {
            return Ok(existing);
        }

        let interest = self.store.get_interest(id)?.ok_or_else(|| Error::NotFound {
            kind: "interest",
            id: id.to_string(),
        })?;

        let vector = self.embedder.embed(&interest.topic)?;
        let embedding = InterestEmbedding::new(id.clone(), vector, self.embedder.model());
        self.store.put_embedding(&embedding)?;

        tracing::debug!(interest_id = %id, topic = %interest.topic, "Embedded interest topic");
        Ok(embedding)
    }

    /// Returns the cosine similarity between two interests, from cache when
    /// available.
    ///
    /// The pair is canonicalized before lookup, so the result is identical
    /// regardless of argument order. A freshly computed score is clamped to
    /// [0, 1] and persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the ids are equal, or either embedding is missing.
    pub fn compute_similarity(&self, a: &InterestId, b: &InterestId) -> Result<f32> {
        if a == b {
            return Err(Error::InvalidInput(
                "cannot compare an interest with itself".to_string(),
            ));
        }

        if let Some(pair) = self.store.get_similarity(a, b)? {
            return Ok(pair.similarity);
        }

        let embedding_a = self.store.get_embedding(a)?.ok_or_else(|| Error::NotFound {
            kind: "embedding",
            id: a.to_string(),
        })?;
        let embedding_b = self.store.get_embedding(b)?.ok_or_else(|| Error::NotFound {
            kind: "embedding",
            id: b.to_string(),
        })?;

        let similarity =
            cosine_similarity(&embedding_a.vector, &embedding_b.vector).clamp(0.0, 1.0);
        self.store
            .upsert_similarity(&SimilarityPair::new(a.clone(), b.clone(), similarity))?;

        Ok(similarity)
    }

    /// Finds active interests similar to the given one, above `threshold`,
    /// ordered by similarity descending and capped at
    /// [`MAX_SIMILAR_RESULTS`].
    ///
    /// # Errors
    ///
    /// Returns an error if the interest has no embedding or the scan fails.
    pub fn find_similar_interests(
        &self,
        id: &InterestId,
        threshold: f32,
    ) -> Result<Vec<SimilarInterest>> {
        let embedding = self.store.get_embedding(id)?.ok_or_else(|| Error::NotFound {
            kind: "embedding",
            id: id.to_string(),
        })?;

        // Over-fetch: the scan includes the query row and tombstones, which
        // are filtered below.
        let hits =
            self.store
                .search_similar(&embedding.vector, threshold, MAX_SIMILAR_RESULTS * 2)?;

        let mut results = Vec::new();
        for (hit_id, similarity) in hits {
            if &hit_id == id {
                continue;
            }
            let Some(interest) = self.store.get_interest(&hit_id)? else {
                continue;
            };
            if !interest.is_active {
                continue;
            }
            results.push(SimilarInterest {
                interest,
                similarity,
            });
            if results.len() == MAX_SIMILAR_RESULTS {
                break;
            }
        }
        Ok(results)
    }

    /// Folds each secondary interest into the primary.
    ///
    /// Per secondary: its evidence rows are repointed at the primary, its
    /// topic and synonyms are unioned into the primary's synonym list, the
    /// primary's confidence is raised to the max of the two, evidence counts
    /// are summed, and the secondary becomes an inactive tombstone with
    /// `merged_into` set.
    ///
    /// Validation happens before any mutation for a given secondary; a
    /// secondary that fails validation (or a mid-merge store error) is
    /// recorded in [`MergeOutcome::skipped`] and the remaining secondaries
    /// still merge.
    ///
    /// # Errors
    ///
    /// Returns an error if the primary does not exist or is not active.
    #[instrument(skip(self, secondary_ids), fields(primary = %primary_id, count = secondary_ids.len()))]
    pub fn merge_similar_interests(
        &self,
        primary_id: &InterestId,
        secondary_ids: &[InterestId],
    ) -> Result<MergeOutcome> {
        let mut primary = self
            .store
            .get_interest(primary_id)?
            .ok_or_else(|| Error::NotFound {
                kind: "interest",
                id: primary_id.to_string(),
            })?;
        if !primary.is_active {
            return Err(Error::InvalidInput(format!(
                "merge target {primary_id} is not active"
            )));
        }

        let mut outcome = MergeOutcome::default();

        for secondary_id in secondary_ids {
            if secondary_id == primary_id {
                tracing::warn!(id = %secondary_id, "Skipping self-merge");
                outcome.skipped.push(secondary_id.clone());
                continue;
            }

            let secondary = match self.store.get_interest(secondary_id) {
                Ok(Some(s)) if s.is_active => s,
                Ok(_) => {
                    tracing::warn!(id = %secondary_id, "Merge candidate missing or inactive, skipping");
                    outcome.skipped.push(secondary_id.clone());
                    continue;
                },
                Err(e) => {
                    tracing::warn!(id = %secondary_id, error = %e, "Merge candidate lookup failed, skipping");
                    outcome.skipped.push(secondary_id.clone());
                    continue;
                },
            };

            if let Err(e) = self.fold_into(&mut primary, &secondary) {
                tracing::warn!(
                    primary = %primary_id,
                    secondary = %secondary_id,
                    error = %e,
                    "Merge failed, leaving secondary unmerged"
                );
                outcome.skipped.push(secondary_id.clone());
                continue;
            }

            metrics::counter!("interest_merges_total").increment(1);
            outcome.merged.push(secondary_id.clone());
        }

        Ok(outcome)
    }

    /// Applies one secondary's state to the primary and tombstones it.
    fn fold_into(&self, primary: &mut Interest, secondary: &Interest) -> Result<()> {
        let moved = self
            .store
            .reassign_evidence(&secondary.id, &primary.id)?;

        primary.add_synonym(secondary.topic.clone());
        for synonym in &secondary.synonyms {
            primary.add_synonym(synonym.clone());
        }
        if secondary.confidence > primary.confidence {
            primary.confidence = secondary.confidence;
        }
        primary.evidence_count = primary.evidence_count.saturating_add(secondary.evidence_count);
        self.store.update_interest(primary)?;

        let mut tombstone = secondary.clone();
        tombstone.mark_merged_into(primary.id.clone());
        self.store.update_interest(&tombstone)?;

        tracing::debug!(
            primary = %primary.id,
            secondary = %secondary.id,
            evidence_moved = moved,
            "Folded duplicate interest"
        );
        Ok(())
    }

    /// Folds all near-duplicate active interests above `threshold`.
    ///
    /// Every active interest is first guaranteed an embedding (an embedding
    /// failure skips that one interest, not the batch). Interests are then
    /// partitioned by a single greedy pass in listing order: the first
    /// not-yet-grouped interest claims `{itself} ∪ {its similar interests}`
    /// as one group and becomes its primary. Groups therefore depend on
    /// iteration order, and A~B, B~C chains may or may not land in one group;
    /// this is a deliberate single-pass approximation, not transitive-closure
    /// clustering.
    ///
    /// Returns the number of interests folded away.
    ///
    /// # Errors
    ///
    /// Returns an error if the active set cannot be listed.
    #[instrument(skip(self))]
    pub fn auto_merge_similar_interests(&self, threshold: f32) -> Result<usize> {
        let active = self.store.list_active_interests()?;

        for interest in &active {
            if let Err(e) = self.generate_embedding(&interest.id) {
                tracing::warn!(
                    interest_id = %interest.id,
                    error = %e,
                    "Embedding failed, interest excluded from this merge pass"
                );
            }
        }

        let mut processed: HashSet<InterestId> = HashSet::new();
        let mut folded = 0;

        for interest in &active {
            if processed.contains(&interest.id) {
                continue;
            }
            processed.insert(interest.id.clone());

            let similar = match self.find_similar_interests(&interest.id, threshold) {
                Ok(similar) => similar,
                Err(e) => {
                    tracing::debug!(interest_id = %interest.id, error = %e, "Skipping ungrouped interest");
                    continue;
                },
            };

            let group: Vec<InterestId> = similar
                .iter()
                .filter(|s| !processed.contains(&s.interest.id))
                .map(|s| s.interest.id.clone())
                .collect();
            processed.extend(group.iter().cloned());

            if group.is_empty() {
                continue;
            }

            match self.merge_similar_interests(&interest.id, &group) {
                Ok(outcome) => folded += outcome.merged.len(),
                Err(e) => {
                    tracing::warn!(primary = %interest.id, error = %e, "Group merge failed");
                },
            }
        }

        if folded > 0 {
            tracing::info!(folded, threshold, "Auto-merge folded duplicate interests");
        }
        Ok(folded)
    }
}
