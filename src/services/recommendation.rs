//! Multi-signal topic recommendations.
//!
//! For a source interest, four independent passes score candidate interests
//! (evidence-count proximity, embedding similarity, hierarchy adjacency,
//! recency), the signals are combined with fixed weights, and the ranked
//! result is persisted and cached.

use crate::cache::RecommendationCache;
use crate::embedding::EmbeddingGateway;
use crate::llm::CompletionGateway;
use crate::models::{Interest, InterestId, Recommendation, Signal, SignalScores};
use crate::services::{HierarchyGraph, SimilarityEngine};
use crate::storage::InterestStore;
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

/// Similarity floor for the semantic signal pass.
pub const SEMANTIC_SIGNAL_THRESHOLD: f32 = 0.6;
/// Hierarchy signal for an ancestor of the source.
pub const ANCESTOR_SCORE: f32 = 0.9;
/// Hierarchy signal for a descendant of the source.
pub const DESCENDANT_SCORE: f32 = 0.85;
/// Hierarchy signal for a sibling (shared ancestor) of the source.
pub const SIBLING_SCORE: f32 = 0.75;
/// Days inside which the temporal signal is non-zero.
pub const TEMPORAL_WINDOW_DAYS: f32 = 30.0;
/// Days inside which the recency bonus applies.
pub const RECENCY_BONUS_DAYS: f32 = 7.0;
/// Bonus added for very recently seen candidates.
pub const RECENCY_BONUS: f32 = 0.2;
/// Candidate pool size for the co-occurrence pass.
pub const CO_OCCURRENCE_CANDIDATES: usize = 20;
/// How long persisted recommendation rows stay servable.
pub const RETENTION_DAYS: i64 = 30;
/// Result cache TTL.
pub const CACHE_TTL: std::time::Duration = std::time::Duration::from_secs(3600);

/// Options for a recommendation request.
#[derive(Debug, Clone, Copy)]
pub struct RecommendOptions {
    /// Maximum number of recommendations returned.
    pub limit: usize,
    /// Minimum combined score to survive filtering.
    pub min_score: f32,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            min_score: 0.3,
        }
    }
}

/// A ranked recommendation list for one source interest.
#[derive(Debug, Clone)]
pub struct RecommendationSet {
    /// The interest recommendations were computed for.
    pub source_id: InterestId,
    /// Ranked recommendations, best first.
    pub recommendations: Vec<Recommendation>,
    /// True when the result was served from cache without recomputation.
    pub cache_hit: bool,
}

/// Accumulator slot for one candidate across the four signal passes.
struct Candidate {
    interest: Interest,
    signals: SignalScores,
    reasons: Vec<String>,
}

/// Produces ranked, explainable topic recommendations.
pub struct RecommendationEngine<S, E, C>
where
    S: InterestStore,
    E: EmbeddingGateway,
    C: CompletionGateway,
{
    store: Arc<S>,
    similarity: SimilarityEngine<S, E>,
    hierarchy: HierarchyGraph<S, C>,
    cache: Arc<dyn RecommendationCache>,
}

impl<S, E, C> RecommendationEngine<S, E, C>
where
    S: InterestStore,
    E: EmbeddingGateway,
    C: CompletionGateway,
{
    /// Creates a new recommendation engine.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        similarity: SimilarityEngine<S, E>,
        hierarchy: HierarchyGraph<S, C>,
        cache: Arc<dyn RecommendationCache>,
    ) -> Self {
        Self {
            store,
            similarity,
            hierarchy,
            cache,
        }
    }

    /// Computes (or serves from cache) ranked recommendations for an
    /// interest.
    ///
    /// A cache hit short-circuits all signal collection and is flagged on
    /// the returned set. On a miss the four passes run, candidates below
    /// `options.min_score` are dropped, the top `options.limit` survivors
    /// are persisted with a fresh retention window, and the result is cached
    /// for an hour. Cache failures are treated as misses and never fail the
    /// request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown or inactive source
    /// interest, or an error if the store fails.
    #[instrument(skip(self), fields(source = %source_id))]
    pub fn recommend(
        &self,
        source_id: &InterestId,
        options: RecommendOptions,
    ) -> Result<RecommendationSet> {
        let source = self
            .store
            .get_interest(source_id)?
            .filter(|i| i.is_active)
            .ok_or_else(|| Error::NotFound {
                kind: "interest",
                id: source_id.to_string(),
            })?;

        let key = Self::cache_key(source_id, options);
        if let Some(cached) = self.cache.get(&key) {
            match serde_json::from_str::<Vec<Recommendation>>(&cached) {
                Ok(recommendations) => {
                    metrics::counter!("recommendation_cache_hits_total").increment(1);
                    return Ok(RecommendationSet {
                        source_id: source_id.clone(),
                        recommendations,
                        cache_hit: true,
                    });
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Corrupt cache entry, recomputing");
                },
            }
        }
        metrics::counter!("recommendation_cache_misses_total").increment(1);

        let now = Utc::now();
        let candidates_pool: Vec<Interest> = self
            .store
            .list_active_interests()?
            .into_iter()
            .filter(|i| &i.id != source_id)
            .collect();

        let mut accumulator: HashMap<InterestId, Candidate> = HashMap::new();
        Self::collect_co_occurrence(&source, &candidates_pool, &mut accumulator);
        self.collect_semantic(&source, &mut accumulator);
        self.collect_hierarchy(&source, &mut accumulator);
        Self::collect_temporal(&candidates_pool, now, &mut accumulator);

        let mut recommendations: Vec<Recommendation> = accumulator
            .into_values()
            .filter_map(|candidate| {
                let score = candidate.signals.combined();
                if score < options.min_score {
                    return None;
                }
                Some(Recommendation {
                    source_id: source_id.clone(),
                    recommended_topic: candidate.interest.topic,
                    score,
                    reasoning: candidate.reasons.join("; "),
                    signals: candidate.signals,
                    computed_at: now,
                    expires_at: now + Duration::days(RETENTION_DAYS),
                })
            })
            .collect();
        recommendations.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.recommended_topic.cmp(&b.recommended_topic))
        });
        recommendations.truncate(options.limit);

        // Recomputation extends retention: the upsert refreshes expires_at
        for recommendation in &recommendations {
            self.store.upsert_recommendation(recommendation)?;
        }

        match serde_json::to_string(&recommendations) {
            Ok(payload) => self.cache.set_with_ttl(&key, payload, CACHE_TTL),
            Err(e) => tracing::warn!(error = %e, "Recommendation serialization failed, not cached"),
        }

        tracing::debug!(
            source = %source_id,
            count = recommendations.len(),
            "Computed recommendations"
        );
        Ok(RecommendationSet {
            source_id: source_id.clone(),
            recommendations,
            cache_hit: false,
        })
    }

    /// Deletes every cached recommendation list for a source interest.
    ///
    /// Returns the number of cache entries removed.
    pub fn invalidate(&self, source_id: &InterestId) -> usize {
        self.cache
            .delete_by_prefix(&format!("recommendations:{source_id}:"))
    }

    fn cache_key(source_id: &InterestId, options: RecommendOptions) -> String {
        format!(
            "recommendations:{source_id}:{}:{:.2}",
            options.limit, options.min_score
        )
    }

    /// Evidence-count proximity over the 20 active interests whose evidence
    /// counts are closest to the source's.
    ///
    /// This is a proxy for true pairwise co-occurrence, which is not stored
    /// as data; interests the user engages with at a similar rate tend to
    /// come from the same working contexts.
    fn collect_co_occurrence(
        source: &Interest,
        pool: &[Interest],
        accumulator: &mut HashMap<InterestId, Candidate>,
    ) {
        let mut nearest: Vec<&Interest> = pool.iter().collect();
        nearest.sort_by(|a, b| {
            a.evidence_count
                .abs_diff(source.evidence_count)
                .cmp(&b.evidence_count.abs_diff(source.evidence_count))
                .then_with(|| a.topic.cmp(&b.topic))
        });

        for candidate in nearest.into_iter().take(CO_OCCURRENCE_CANDIDATES) {
            #[allow(clippy::cast_precision_loss)]
            let max_count = candidate
                .evidence_count
                .max(source.evidence_count)
                .max(1) as f32;
            #[allow(clippy::cast_precision_loss)]
            let diff = candidate.evidence_count.abs_diff(source.evidence_count) as f32;
            let score = 1.0 - diff / max_count;
            Self::apply(
                accumulator,
                candidate,
                Signal::CoOccurrence,
                score,
                "Similar engagement level".to_string(),
            );
        }
    }

    /// Embedding similarity above [`SEMANTIC_SIGNAL_THRESHOLD`].
    ///
    /// A missing source embedding disables this signal for the request; it
    /// never fails the whole recommendation.
    fn collect_semantic(&self, source: &Interest, accumulator: &mut HashMap<InterestId, Candidate>) {
        match self
            .similarity
            .find_similar_interests(&source.id, SEMANTIC_SIGNAL_THRESHOLD)
        {
            Ok(similar) => {
                for hit in similar {
                    let reason = format!("High semantic similarity ({:.2})", hit.similarity);
                    Self::apply(
                        accumulator,
                        &hit.interest,
                        Signal::Semantic,
                        hit.similarity,
                        reason,
                    );
                }
            },
            Err(e) => {
                tracing::debug!(source = %source.id, error = %e, "Semantic signal unavailable");
            },
        }
    }

    /// Hierarchy adjacency: ancestors, descendants and siblings of the
    /// source, each candidate keeping its best sub-score and reason.
    fn collect_hierarchy(
        &self,
        source: &Interest,
        accumulator: &mut HashMap<InterestId, Candidate>,
    ) {
        let ancestors = self
            .hierarchy
            .get_ancestors(&source.id, None)
            .unwrap_or_else(|e| {
                tracing::debug!(source = %source.id, error = %e, "Ancestor walk unavailable");
                Vec::new()
            });
        let descendants = self
            .hierarchy
            .get_descendants(&source.id, None)
            .unwrap_or_else(|e| {
                tracing::debug!(source = %source.id, error = %e, "Descendant walk unavailable");
                Vec::new()
            });

        let mut best: HashMap<InterestId, (f32, &'static str)> = HashMap::new();
        let mut consider = |id: &InterestId, score: f32, reason: &'static str| {
            let entry = best.entry(id.clone()).or_insert((score, reason));
            if score > entry.0 {
                *entry = (score, reason);
            }
        };

        for node in &ancestors {
            consider(&node.interest_id, ANCESTOR_SCORE, "Broader topic");
        }
        for node in &descendants {
            consider(&node.interest_id, DESCENDANT_SCORE, "More specific subtopic");
        }
        // Siblings: anything below one of the source's ancestors
        for ancestor in &ancestors {
            let family = self
                .hierarchy
                .get_descendants(&ancestor.interest_id, None)
                .unwrap_or_default();
            for node in family {
                if node.interest_id == source.id {
                    continue;
                }
                consider(
                    &node.interest_id,
                    SIBLING_SCORE,
                    "Related topic (shared parent)",
                );
            }
        }

        for (id, (score, reason)) in best {
            let interest = match self.store.get_interest(&id) {
                Ok(Some(interest)) if interest.is_active => interest,
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!(interest_id = %id, error = %e, "Hierarchy candidate lookup failed");
                    continue;
                },
            };
            Self::apply(
                accumulator,
                &interest,
                Signal::Hierarchy,
                score,
                reason.to_string(),
            );
        }
    }

    /// Recency: candidates seen within the last 30 days, with a bonus for
    /// the last 7.
    fn collect_temporal(
        pool: &[Interest],
        now: DateTime<Utc>,
        accumulator: &mut HashMap<InterestId, Candidate>,
    ) {
        for candidate in pool {
            let age = now.signed_duration_since(candidate.last_seen);
            #[allow(clippy::cast_precision_loss)]
            let days = (age.num_seconds().max(0) as f32) / 86_400.0;
            if days > TEMPORAL_WINDOW_DAYS {
                continue;
            }

            let mut score = 1.0 - days / TEMPORAL_WINDOW_DAYS;
            if days <= RECENCY_BONUS_DAYS {
                score += RECENCY_BONUS;
            }
            Self::apply(
                accumulator,
                candidate,
                Signal::Temporal,
                score.min(1.0),
                "Recently active".to_string(),
            );
        }
    }

    /// Folds one signal contribution into the accumulator, raising the
    /// signal to the max seen and recording the reason.
    fn apply(
        accumulator: &mut HashMap<InterestId, Candidate>,
        interest: &Interest,
        signal: Signal,
        value: f32,
        reason: String,
    ) {
        let entry = accumulator
            .entry(interest.id.clone())
            .or_insert_with(|| Candidate {
                interest: interest.clone(),
                signals: SignalScores::default(),
                reasons: Vec::new(),
            });
        entry.signals.raise(signal, value);
        entry.reasons.push(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryTtlCache;
    use crate::llm::{CompletionRequest, CompletionResponse};
    use crate::models::SourceType;
    use crate::storage::InMemoryStore;
    use std::collections::HashMap as StdHashMap;

    struct MapEmbedder {
        vectors: StdHashMap<String, Vec<f32>>,
    }

    impl MapEmbedder {
        fn new(vectors: &[(&str, Vec<f32>)]) -> Self {
            Self {
                vectors: vectors
                    .iter()
                    .map(|(text, v)| ((*text).to_lowercase(), v.clone()))
                    .collect(),
            }
        }
    }

    impl EmbeddingGateway for MapEmbedder {
        fn model(&self) -> &str {
            "map-embedder"
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.vectors
                .get(&text.to_lowercase())
                .cloned()
                .ok_or_else(|| Error::Upstream {
                    service: "embeddings",
                    cause: format!("no vector for '{text}'"),
                })
        }
    }

    struct SilentCompletion;

    impl CompletionGateway for SilentCompletion {
        fn name(&self) -> &'static str {
            "silent"
        }

        fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse> {
            Ok(CompletionResponse {
                text: "[]".to_string(),
                model: "silent".to_string(),
                tokens_used: 0,
            })
        }
    }

    type TestEngine = RecommendationEngine<InMemoryStore, MapEmbedder, SilentCompletion>;

    fn engine_with(vectors: &[(&str, Vec<f32>)]) -> (Arc<InMemoryStore>, TestEngine) {
        let store = Arc::new(InMemoryStore::new());
        let embedder = Arc::new(MapEmbedder::new(vectors));
        let llm = Arc::new(SilentCompletion);
        let similarity = SimilarityEngine::new(Arc::clone(&store), embedder);
        let hierarchy = HierarchyGraph::new(Arc::clone(&store), llm);
        let cache: Arc<dyn RecommendationCache> = Arc::new(MemoryTtlCache::default());
        let engine = RecommendationEngine::new(Arc::clone(&store), similarity, hierarchy, cache);
        (store, engine)
    }

    fn save(store: &InMemoryStore, topic: &str, evidence: u32, last_seen_days_ago: i64) -> Interest {
        let mut interest = Interest::new(topic, SourceType::Note, 0.8);
        interest.evidence_count = evidence;
        interest.last_seen = Utc::now() - Duration::days(last_seen_days_ago);
        store.insert_interest(&interest).unwrap();
        interest
    }

    #[test]
    fn test_unknown_source_is_not_found() {
        let (_, engine) = engine_with(&[]);
        let result = engine.recommend(&InterestId::generate(), RecommendOptions::default());
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_tombstone_source_is_not_found() {
        let (store, engine) = engine_with(&[]);
        let mut source = save(&store, "ML", 5, 0);
        source.is_active = false;
        store.update_interest(&source).unwrap();

        let result = engine.recommend(&source.id, RecommendOptions::default());
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_related_subtopic_scores_high() {
        // "Deep Learning": evidence 9 vs source's 10, seen yesterday, child
        // of the source in the hierarchy, semantic similarity 0.82.
        let (store, engine) = engine_with(&[
            ("machine learning", vec![1.0, 0.0]),
            ("deep learning", vec![0.82, 0.572_364]),
        ]);
        let ml = save(&store, "Machine Learning", 10, 0);
        let dl = save(&store, "Deep Learning", 9, 1);

        store
            .upsert_edge(&crate::models::HierarchyEdge::new(
                ml.id.clone(),
                dl.id.clone(),
                0.95,
            ))
            .unwrap();

        // Embeddings must exist for the semantic pass
        engine.similarity.generate_embedding(&ml.id).unwrap();
        engine.similarity.generate_embedding(&dl.id).unwrap();

        let set = engine.recommend(&ml.id, RecommendOptions::default()).unwrap();
        assert!(!set.cache_hit);
        assert_eq!(set.recommendations.len(), 1);

        let top = &set.recommendations[0];
        assert_eq!(top.recommended_topic, "Deep Learning");
        // 0.35·0.9 + 0.30·0.82 + 0.20·0.85 + 0.15·1.0 ≈ 0.88
        assert!((top.score - 0.881).abs() < 0.02, "score was {}", top.score);
        assert!(top.reasoning.contains("High semantic similarity"));
        assert!(top.reasoning.contains("More specific subtopic"));
        assert!(top.score >= RecommendOptions::default().min_score);

        // Signals carry the per-pass breakdown
        assert!((top.signals.co_occurrence - 0.9).abs() < 1e-5);
        assert!((top.signals.semantic - 0.82).abs() < 0.01);
        assert!((top.signals.hierarchy - DESCENDANT_SCORE).abs() < 1e-5);
        assert!((top.signals.temporal - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_combined_score_is_weighted_sum() {
        let (store, engine) = engine_with(&[]);
        let source = save(&store, "Source", 10, 0);
        save(&store, "Candidate", 8, 3);

        let set = engine.recommend(&source.id, RecommendOptions::default()).unwrap();
        for rec in &set.recommendations {
            let expected = 0.35f32 * rec.signals.co_occurrence
                + 0.30 * rec.signals.semantic
                + 0.20 * rec.signals.hierarchy
                + 0.15 * rec.signals.temporal;
            assert!((rec.score - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn test_min_score_filters_candidates() {
        let (store, engine) = engine_with(&[]);
        let source = save(&store, "Source", 10, 0);
        // Stale candidate with distant evidence count: weak on every signal
        save(&store, "Weak", 200, 45);

        let set = engine
            .recommend(
                &source.id,
                RecommendOptions {
                    limit: 10,
                    min_score: 0.6,
                },
            )
            .unwrap();
        assert!(set.recommendations.is_empty());
    }

    #[test]
    fn test_limit_truncates_ranked_list() {
        let (store, engine) = engine_with(&[]);
        let source = save(&store, "Source", 10, 0);
        for n in 0..5 {
            save(&store, &format!("Candidate {n}"), 10, 1);
        }

        let set = engine
            .recommend(
                &source.id,
                RecommendOptions {
                    limit: 3,
                    min_score: 0.1,
                },
            )
            .unwrap();
        assert_eq!(set.recommendations.len(), 3);
        // Ranked descending
        for pair in set.recommendations.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_cache_hit_short_circuits() {
        let (store, engine) = engine_with(&[]);
        let source = save(&store, "Source", 10, 0);
        save(&store, "Candidate", 9, 1);

        let first = engine.recommend(&source.id, RecommendOptions::default()).unwrap();
        assert!(!first.cache_hit);

        let second = engine.recommend(&source.id, RecommendOptions::default()).unwrap();
        assert!(second.cache_hit);
        assert_eq!(
            first.recommendations.len(),
            second.recommendations.len()
        );

        // Different options form a different key
        let other = engine
            .recommend(
                &source.id,
                RecommendOptions {
                    limit: 5,
                    min_score: 0.3,
                },
            )
            .unwrap();
        assert!(!other.cache_hit);
    }

    #[test]
    fn test_invalidate_clears_all_entries_for_source() {
        let (store, engine) = engine_with(&[]);
        let source = save(&store, "Source", 10, 0);
        save(&store, "Candidate", 9, 1);

        engine.recommend(&source.id, RecommendOptions::default()).unwrap();
        engine
            .recommend(
                &source.id,
                RecommendOptions {
                    limit: 5,
                    min_score: 0.3,
                },
            )
            .unwrap();

        let removed = engine.invalidate(&source.id);
        assert_eq!(removed, 2);

        let recomputed = engine.recommend(&source.id, RecommendOptions::default()).unwrap();
        assert!(!recomputed.cache_hit);
    }

    #[test]
    fn test_recommendations_persisted_with_retention() {
        let (store, engine) = engine_with(&[]);
        let source = save(&store, "Source", 10, 0);
        save(&store, "Candidate", 9, 1);

        engine.recommend(&source.id, RecommendOptions::default()).unwrap();

        let now = Utc::now();
        let rows = store.list_recommendations(&source.id, now).unwrap();
        assert_eq!(rows.len(), 1);
        let days_left = (rows[0].expires_at - now).num_days();
        assert!((29..=30).contains(&days_left));
    }

    #[test]
    fn test_temporal_window_cutoff() {
        let (store, engine) = engine_with(&[]);
        let source = save(&store, "Source", 10, 0);
        let recent = save(&store, "Recent", 10, 2);
        let stale = save(&store, "Stale", 10, 60);

        let set = engine
            .recommend(
                &source.id,
                RecommendOptions {
                    limit: 10,
                    min_score: 0.0,
                },
            )
            .unwrap();

        let find = |id: &InterestId| {
            set.recommendations
                .iter()
                .find(|r| {
                    store
                        .get_interest(id)
                        .unwrap()
                        .is_some_and(|i| i.topic == r.recommended_topic)
                })
                .cloned()
        };

        let recent_rec = find(&recent.id).expect("recent candidate should appear");
        assert!(recent_rec.signals.temporal > 0.9);

        let stale_rec = find(&stale.id).expect("stale candidate still scores on other signals");
        assert!(stale_rec.signals.temporal.abs() < f32::EPSILON);
    }
}
