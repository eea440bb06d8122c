//! End-to-end flow: detection → auto-merge → hierarchy → recommendations.

use notegraph::llm::{CompletionGateway, CompletionRequest, CompletionResponse};
use notegraph::services::RecommendOptions;
use notegraph::{
    DetectionSource, EmbeddingGateway, Error, HierarchyGraph, InMemoryStore, InterestDetector,
    InterestId, InterestManager, InterestStore, MemoryTtlCache, RecommendationCache,
    RecommendationEngine, SimilarityEngine, SourceType, SqliteStore,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Embedder with fixed vectors per topic.
struct MapEmbedder {
    vectors: HashMap<String, Vec<f32>>,
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

    fn embed(&self, text: &str) -> notegraph::Result<Vec<f32>> {
        self.vectors
            .get(&text.to_lowercase())
            .cloned()
            .ok_or_else(|| Error::Upstream {
                service: "embeddings",
                cause: format!("no vector for '{text}'"),
            })
    }
}

/// Completion gateway replaying scripted responses in order.
struct ScriptedCompletion {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedCompletion {
    fn new(responses: &[&str]) -> Self {
        Self {
            responses: Mutex::new(responses.iter().map(|s| (*s).to_string()).collect()),
        }
    }
}

impl CompletionGateway for ScriptedCompletion {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn complete(&self, _request: &CompletionRequest) -> notegraph::Result<CompletionResponse> {
        let text = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Upstream {
                service: "completions",
                cause: "script exhausted".to_string(),
            })?;
        Ok(CompletionResponse {
            text,
            model: "scripted".to_string(),
            tokens_used: 0,
        })
    }
}

fn topic_vectors() -> Vec<(&'static str, Vec<f32>)> {
    vec![
        ("python", vec![1.0, 0.0, 0.0]),
        // Near-duplicate of "python": cosine ≈ 0.99
        ("python programming", vec![0.99, 0.141, 0.0]),
        ("machine learning", vec![0.0, 1.0, 0.0]),
        // Related but distinct: cosine to "machine learning" = 0.82
        ("deep learning", vec![0.0, 0.82, 0.572_364]),
    ]
}

fn detection_script() -> Vec<&'static str> {
    vec![
        // note-1
        r#"[{"name": "Python", "score": 0.9, "count": 2},
            {"name": "Machine Learning", "score": 0.85, "count": 1}]"#,
        // note-2
        r#"[{"name": "python programming", "score": 0.7, "count": 1},
            {"name": "Deep Learning", "score": 0.8, "count": 1}]"#,
        // msg-1
        r#"[{"name": "Machine Learning", "score": 0.6, "count": 1}]"#,
        // hierarchy pass over the post-merge topic set
        r#"[{"parent": "Machine Learning", "child": "Deep Learning", "confidence": 0.9, "reason": "subfield"}]"#,
    ]
}

fn sources() -> Vec<DetectionSource> {
    vec![
        DetectionSource::new(
            SourceType::Note,
            "note-1",
            "Spent the weekend writing Python scripts for a machine learning course",
        ),
        DetectionSource::new(
            SourceType::Note,
            "note-2",
            "More python programming, started reading about deep learning",
        ),
        DetectionSource::new(SourceType::Chat, "msg-1", "we discussed machine learning again"),
    ]
}

fn run_detection<S: InterestStore + 'static>(store: &Arc<S>) {
    let embedder = Arc::new(MapEmbedder::new(&topic_vectors()));
    let llm = Arc::new(ScriptedCompletion::new(&detection_script()));
    let detector = InterestDetector::new(Arc::clone(store), embedder, llm);

    let report = detector.detect(&sources()).unwrap();
    assert_eq!(report.topics_extracted, 4);
    assert_eq!(report.interests_saved, 4);
    assert_eq!(report.interests_merged, 1);
    assert_eq!(report.edges_detected, 1);
}

#[test]
fn full_pipeline_over_memory_store() {
    let store = Arc::new(InMemoryStore::new());
    run_detection(&store);

    // Auto-merge folded the near-duplicate into one canonical interest
    let active = store.list_active_interests().unwrap();
    assert_eq!(active.len(), 3);

    let python = store.get_active_by_topic("Python").unwrap().unwrap();
    assert!(python.matches_topic("python programming"));
    assert_eq!(python.evidence_count, 3);

    // Four interests were created, one of which is now a tombstone; all of
    // the duplicate's evidence was repointed at the survivor
    assert_eq!(store.interest_count(), 4);
    // One evidence row per contributing source: note-1 plus the reassigned note-2
    assert_eq!(store.list_evidence_for(&python.id).unwrap().len(), 2);
    let resolved = store
        .get_active_by_topic("python programming")
        .unwrap()
        .unwrap();
    assert_eq!(resolved.id, python.id);

    // Chat contribution folded into the note score with its own weighting
    let ml = store.get_active_by_topic("Machine Learning").unwrap().unwrap();
    assert!((ml.confidence - 1.0).abs() < 1e-6);
    assert_eq!(ml.evidence_count, 2);

    // Hierarchy: Machine Learning -> Deep Learning
    let dl = store.get_active_by_topic("Deep Learning").unwrap().unwrap();
    let llm = Arc::new(ScriptedCompletion::new(&[]));
    let graph = HierarchyGraph::new(Arc::clone(&store), llm);

    let ancestors = graph.get_ancestors(&dl.id, None).unwrap();
    assert_eq!(ancestors.len(), 1);
    assert_eq!(ancestors[0].topic, "Machine Learning");
    assert_eq!(ancestors[0].distance, 1);

    let tree = graph.build_hierarchy_tree().unwrap();
    assert_eq!(tree.total_interests, 3);
    assert_eq!(tree.root_count, 2);
    assert_eq!(tree.max_depth, 1);
}

#[test]
fn recommendations_after_detection() {
    let store = Arc::new(InMemoryStore::new());
    run_detection(&store);

    let ml = store.get_active_by_topic("Machine Learning").unwrap().unwrap();

    let embedder = Arc::new(MapEmbedder::new(&topic_vectors()));
    let llm = Arc::new(ScriptedCompletion::new(&[]));
    let similarity = SimilarityEngine::new(Arc::clone(&store), embedder);
    let hierarchy = HierarchyGraph::new(Arc::clone(&store), llm);
    let cache: Arc<dyn RecommendationCache> = Arc::new(MemoryTtlCache::default());
    let engine = RecommendationEngine::new(Arc::clone(&store), similarity, hierarchy, cache);

    let set = engine.recommend(&ml.id, RecommendOptions::default()).unwrap();
    assert!(!set.cache_hit);
    assert!(!set.recommendations.is_empty());

    // Its subtopic is the strongest recommendation
    let top = &set.recommendations[0];
    assert_eq!(top.recommended_topic, "Deep Learning");
    assert!(top.reasoning.contains("More specific subtopic"));
    assert!(top.reasoning.contains("High semantic similarity"));
    assert!((top.signals.semantic - 0.82).abs() < 0.01);

    // Persisted rows are served back and the cache short-circuits
    let rows = store
        .list_recommendations(&ml.id, chrono::Utc::now())
        .unwrap();
    assert_eq!(rows.len(), set.recommendations.len());

    let cached = engine.recommend(&ml.id, RecommendOptions::default()).unwrap();
    assert!(cached.cache_hit);
    assert_eq!(cached.recommendations.len(), set.recommendations.len());

    // Invalidation forces recomputation
    let removed = engine.invalidate(&ml.id);
    assert_eq!(removed, 1);
    let fresh = engine.recommend(&ml.id, RecommendOptions::default()).unwrap();
    assert!(!fresh.cache_hit);

    // Unknown ids surface as NotFound
    let missing = engine.recommend(&InterestId::generate(), RecommendOptions::default());
    assert!(matches!(missing, Err(Error::NotFound { .. })));
}

#[test]
fn manual_adjustments_after_detection() {
    let store = Arc::new(InMemoryStore::new());
    run_detection(&store);

    let manager = InterestManager::new(Arc::clone(&store));
    let listed = manager.list_interests(0.5).unwrap();
    assert_eq!(listed.len(), 3);

    let dl = store.get_active_by_topic("Deep Learning").unwrap().unwrap();
    let boosted = manager.boost_confidence(&dl.id, 0.4).unwrap();
    assert!(boosted.confidence > dl.confidence);

    // Deleting an interest removes it from the hierarchy
    manager.delete_interest(&dl.id).unwrap();
    assert!(store.get_active_by_topic("Deep Learning").unwrap().is_none());
    assert!(store.edges_to(&dl.id).unwrap().is_empty());
}

#[test]
fn full_pipeline_over_sqlite_store() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    run_detection(&store);

    let active = store.list_active_interests().unwrap();
    assert_eq!(active.len(), 3);

    let python = store.get_active_by_topic("Python").unwrap().unwrap();
    assert!(python.matches_topic("python programming"));
    assert_eq!(python.evidence_count, 3);
    assert_eq!(store.list_evidence_for(&python.id).unwrap().len(), 2);

    let ml = store.get_active_by_topic("Machine Learning").unwrap().unwrap();
    let dl = store.get_active_by_topic("Deep Learning").unwrap().unwrap();
    let edges = store.list_edges().unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].parent_id, ml.id);
    assert_eq!(edges[0].child_id, dl.id);
}

