//! Interest detection: turning raw text into interest rows.
//!
//! A detection pass extracts candidate topics from each note/task/chat
//! source through the completion gateway, folds the per-source scores into
//! combined confidences, upserts the survivors, and then runs the
//! maintenance stages: embedding generation, duplicate auto-merge, and
//! hierarchy detection.
//!
//! The pass assumes it is the only one logically running; there is no
//! internal mutual exclusion, and two concurrent passes would race
//! last-write-wins on interest rows. For a single-user notes app this is
//! accepted; a multi-tenant port would need external serialization. The
//! upstream trigger throttles passes through [`DetectionThrottle`].

use crate::embedding::EmbeddingGateway;
use crate::llm::{
    CompletionGateway, CompletionRequest, extract_json_array,
    prompts::{TOPIC_EXTRACTION_SYSTEM, build_extraction_prompt},
};
use crate::models::{Evidence, Interest, InterestId, SourceId, SourceType};
use crate::services::{HierarchyGraph, SimilarityEngine};
use crate::storage::InterestStore;
use crate::Result;
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Minimum combined confidence for a detected topic to be saved.
pub const MIN_DETECTION_CONFIDENCE: f32 = 0.6;
/// Similarity threshold for the post-detection auto-merge stage.
pub const AUTO_MERGE_THRESHOLD: f32 = 0.85;
/// Model-safe truncation length for source text, in characters.
pub const MAX_EXTRACTION_CHARS: usize = 6000;

/// One text source submitted to a detection pass.
#[derive(Debug, Clone)]
pub struct DetectionSource {
    /// The kind of source.
    pub source_type: SourceType,
    /// The id of the note/task/chat message.
    pub source_id: SourceId,
    /// The raw text.
    pub text: String,
}

impl DetectionSource {
    /// Creates a detection source.
    #[must_use]
    pub fn new(
        source_type: SourceType,
        source_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            source_type,
            source_id: SourceId::new(source_id),
            text: text.into(),
        }
    }
}

/// A topic extracted by the completion gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedTopic {
    /// Topic name.
    pub name: String,
    /// Interest strength (0.0 to 1.0).
    #[serde(default = "default_topic_score")]
    pub score: f32,
    /// Supporting passage count.
    #[serde(default = "default_topic_count")]
    pub count: u32,
}

const fn default_topic_score() -> f32 {
    0.5
}

const fn default_topic_count() -> u32 {
    1
}

/// Summary of a completed detection pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetectionReport {
    /// Distinct topics extracted across all sources.
    pub topics_extracted: usize,
    /// Interests created or updated.
    pub interests_saved: usize,
    /// Duplicate interests folded by the auto-merge stage.
    pub interests_merged: usize,
    /// Hierarchy edges accepted after detection.
    pub edges_detected: usize,
}

/// One topic's accumulated state across sources.
struct FoldedTopic {
    /// Name as first seen (original casing).
    name: String,
    confidence: f32,
    count: u32,
    /// Contributing sources with the raw (unweighted) relevance.
    contributions: Vec<(SourceType, SourceId, f32)>,
}

/// Orchestrates extraction of interests from notes, tasks and chat.
pub struct InterestDetector<S, E, C>
where
    S: InterestStore,
    E: EmbeddingGateway,
    C: CompletionGateway,
{
    store: Arc<S>,
    llm: Arc<C>,
    similarity: SimilarityEngine<S, E>,
    hierarchy: HierarchyGraph<S, C>,
    min_confidence: f32,
    auto_merge_threshold: f32,
}

impl<S, E, C> InterestDetector<S, E, C>
where
    S: InterestStore,
    E: EmbeddingGateway,
    C: CompletionGateway,
{
    /// Creates a detector wired to the given store and gateways.
    #[must_use]
    pub fn new(store: Arc<S>, embedder: Arc<E>, llm: Arc<C>) -> Self {
        let similarity = SimilarityEngine::new(Arc::clone(&store), embedder);
        let hierarchy = HierarchyGraph::new(Arc::clone(&store), Arc::clone(&llm));
        Self {
            store,
            llm,
            similarity,
            hierarchy,
            min_confidence: MIN_DETECTION_CONFIDENCE,
            auto_merge_threshold: AUTO_MERGE_THRESHOLD,
        }
    }

    /// Overrides the save threshold.
    #[must_use]
    pub const fn with_min_confidence(mut self, threshold: f32) -> Self {
        self.min_confidence = threshold;
        self
    }

    /// Overrides the auto-merge similarity threshold.
    #[must_use]
    pub const fn with_auto_merge_threshold(mut self, threshold: f32) -> Self {
        self.auto_merge_threshold = threshold;
        self
    }

    /// Runs one detection pass over the given sources.
    ///
    /// Sources are processed independently with source-specific weighting:
    /// notes count in full, tasks at 40% (+0.2 when the topic is already
    /// known), chat at 70% (+0.3 when known). Scores for the same topic are
    /// added across sources, capped at 1.0; topics at or above the save
    /// threshold are upserted with evidence rows per contributing source.
    /// The pass finishes with embedding generation for saved interests, one
    /// auto-merge over the whole active set, and one hierarchy detection
    /// over the post-merge set.
    ///
    /// Any single-source failure (and any maintenance-stage failure) is
    /// logged and does not abort the rest of the pass.
    ///
    /// # Errors
    ///
    /// Returns an error only when the store itself fails while saving.
    #[instrument(skip(self, sources), fields(sources = sources.len()))]
    pub fn detect(&self, sources: &[DetectionSource]) -> Result<DetectionReport> {
        let started = Instant::now();
        let mut folded: HashMap<String, FoldedTopic> = HashMap::new();

        for source in sources {
            if source.text.trim().is_empty() {
                continue;
            }
            match self.extract_from_source(source) {
                Ok(topics) => self.fold_topics(source, topics, &mut folded),
                Err(e) => {
                    tracing::warn!(
                        source_id = %source.source_id,
                        source_type = %source.source_type,
                        error = %e,
                        "Extraction failed for source, continuing with the rest"
                    );
                },
            }
        }

        let mut saved = Vec::new();
        for topic in folded.values() {
            if topic.confidence < self.min_confidence {
                continue;
            }
            match self.save_topic(topic) {
                Ok(id) => saved.push(id),
                Err(e) => {
                    tracing::warn!(topic = %topic.name, error = %e, "Failed to save detected interest");
                },
            }
        }

        for id in &saved {
            if let Err(e) = self.similarity.generate_embedding(id) {
                tracing::warn!(interest_id = %id, error = %e, "Embedding stage failed for interest");
            }
        }

        let interests_merged = self
            .similarity
            .auto_merge_similar_interests(self.auto_merge_threshold)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Auto-merge stage failed");
                0
            });

        let edges_detected = self.hierarchy.detect_hierarchies().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Hierarchy detection stage failed");
            0
        });

        #[allow(clippy::cast_precision_loss)]
        metrics::histogram!("interest_detection_duration_ms")
            .record(started.elapsed().as_millis() as f64);

        let report = DetectionReport {
            topics_extracted: folded.len(),
            interests_saved: saved.len(),
            interests_merged,
            edges_detected,
        };
        tracing::info!(
            topics = report.topics_extracted,
            saved = report.interests_saved,
            merged = report.interests_merged,
            edges = report.edges_detected,
            "Detection pass complete"
        );
        Ok(report)
    }

    /// Extracts topics from one source via the completion gateway.
    fn extract_from_source(&self, source: &DetectionSource) -> Result<Vec<ExtractedTopic>> {
        let text = truncate_for_model(&source.text);
        let request = CompletionRequest::new(build_extraction_prompt(
            source.source_type.as_str(),
            &text,
        ))
        .with_system(TOPIC_EXTRACTION_SYSTEM)
        .with_temperature(0.2);

        let response = self.llm.complete(&request)?;
        Ok(Self::parse_topics(&response.text))
    }

    /// Parses extracted topics; malformed output degrades to an empty list.
    fn parse_topics(text: &str) -> Vec<ExtractedTopic> {
        let Some(json) = extract_json_array(text) else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<ExtractedTopic>>(json) {
            Ok(topics) => topics,
            Err(e) => {
                tracing::warn!(error = %e, "Unparsable extraction response, treating as empty");
                Vec::new()
            },
        }
    }

    /// Folds one source's topics into the running map with source weighting.
    fn fold_topics(
        &self,
        source: &DetectionSource,
        topics: Vec<ExtractedTopic>,
        folded: &mut HashMap<String, FoldedTopic>,
    ) {
        let weight = source.source_type.extraction_weight();
        let boost = source.source_type.known_topic_boost();

        for topic in topics {
            let name = topic.name.trim();
            if name.is_empty() {
                continue;
            }
            let raw = topic.score.clamp(0.0, 1.0);
            let count = topic.count.max(1);

            let mut weighted = raw * weight;
            if boost > 0.0 {
                match self.store.get_active_by_topic(name) {
                    Ok(Some(_)) => weighted += boost,
                    Ok(None) => {},
                    Err(e) => {
                        tracing::debug!(topic = name, error = %e, "Known-topic lookup failed");
                    },
                }
            }

            let entry = folded
                .entry(name.to_lowercase())
                .or_insert_with(|| FoldedTopic {
                    name: name.to_string(),
                    confidence: 0.0,
                    count: 0,
                    contributions: Vec::new(),
                });
            entry.confidence = (entry.confidence + weighted).min(1.0);
            entry.count += count;
            entry
                .contributions
                .push((source.source_type, source.source_id.clone(), raw));
        }
    }

    /// Creates or updates the interest row for one folded topic and records
    /// its evidence.
    fn save_topic(&self, topic: &FoldedTopic) -> Result<InterestId> {
        let now = Utc::now();

        let id = if let Some(mut existing) = self.store.get_active_by_topic(&topic.name)? {
            if topic.confidence > existing.confidence {
                existing.confidence = topic.confidence;
            }
            existing.evidence_count = existing.evidence_count.saturating_add(topic.count);
            existing.last_seen = now;
            self.store.update_interest(&existing)?;
            existing.id
        } else {
            let source_type = topic
                .contributions
                .first()
                .map_or(SourceType::Note, |(st, _, _)| *st);
            let interest = Interest::new(&topic.name, source_type, topic.confidence)
                .with_evidence_count(topic.count);
            self.store.insert_interest(&interest)?;
            interest.id
        };

        for (source_type, source_id, relevance) in &topic.contributions {
            self.store.insert_evidence(&Evidence::new(
                id.clone(),
                *source_type,
                source_id.clone(),
                *relevance,
            ))?;
        }

        Ok(id)
    }
}

/// Truncates text to a model-safe length on a character boundary.
fn truncate_for_model(text: &str) -> String {
    if text.chars().count() <= MAX_EXTRACTION_CHARS {
        return text.to_string();
    }
    text.chars().take(MAX_EXTRACTION_CHARS).collect()
}

/// Rate limiter for detection passes.
///
/// Owned by the orchestration boundary that reacts to note/task/chat events;
/// a single explicit value rather than ambient module state. A pass is
/// allowed when at least `min_sources` sources are pending and the cooldown
/// window since the last allowed pass has elapsed.
#[derive(Debug, Clone)]
pub struct DetectionThrottle {
    cooldown: Duration,
    min_sources: usize,
    last_run: Option<Instant>,
}

impl DetectionThrottle {
    /// Creates a throttle with the given cooldown and pending-source floor.
    #[must_use]
    pub const fn new(cooldown: Duration, min_sources: usize) -> Self {
        Self {
            cooldown,
            min_sources,
            last_run: None,
        }
    }

    /// Returns true (and arms the cooldown) when a pass may run now.
    pub fn check_and_trigger(&mut self, pending_sources: usize, now: Instant) -> bool {
        if pending_sources < self.min_sources {
            return false;
        }
        if let Some(last) = self.last_run {
            if now.duration_since(last) < self.cooldown {
                return false;
            }
        }
        self.last_run = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::CompletionResponse;
    use crate::storage::InMemoryStore;
    use crate::Error;
    use std::collections::{HashMap as StdHashMap, VecDeque};
    use std::sync::Mutex;

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

        fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse> {
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

    /// Embedder with fixed per-topic vectors; unknown topics fail (and the
    /// pass is expected to log and continue).
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

    fn detector_with(
        responses: &[&str],
        vectors: &[(&str, Vec<f32>)],
    ) -> (
        Arc<InMemoryStore>,
        InterestDetector<InMemoryStore, MapEmbedder, ScriptedCompletion>,
    ) {
        let store = Arc::new(InMemoryStore::new());
        let detector = InterestDetector::new(
            Arc::clone(&store),
            Arc::new(MapEmbedder::new(vectors)),
            Arc::new(ScriptedCompletion::new(responses)),
        );
        (store, detector)
    }

    #[test]
    fn test_detect_saves_confident_topics_with_evidence() {
        let (store, detector) = detector_with(&[
            r#"[{"name": "Machine Learning", "score": 0.9, "count": 2},
                {"name": "Gardening", "score": 0.3, "count": 1}]"#],
            &[("machine learning", vec![1.0, 0.0])],
        );

        let report = detector
            .detect(&[DetectionSource::new(
                SourceType::Note,
                "note-1",
                "Notes about training neural networks",
            )])
            .unwrap();

        assert_eq!(report.topics_extracted, 2);
        assert_eq!(report.interests_saved, 1);

        let saved = store.get_active_by_topic("Machine Learning").unwrap().unwrap();
        assert!((saved.confidence - 0.9).abs() < 1e-6);
        assert_eq!(saved.evidence_count, 2);

        let evidence = store.list_evidence_for(&saved.id).unwrap();
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].source_id.as_str(), "note-1");
        assert!((evidence[0].relevance - 0.9).abs() < 1e-6);

        // Embedding was generated for the saved interest
        assert!(store.get_embedding(&saved.id).unwrap().is_some());

        // Below-threshold topic was not saved
        assert!(store.get_active_by_topic("Gardening").unwrap().is_none());
    }

    #[test]
    fn test_scores_fold_across_sources_capped() {
        let (store, detector) = detector_with(&[
            r#"[{"name": "Rust", "score": 0.8, "count": 1}]"#,
            r#"[{"name": "rust", "score": 0.9, "count": 2}]"#],
            &[("rust", vec![1.0, 0.0])],
        );

        detector
            .detect(&[
                DetectionSource::new(SourceType::Note, "note-1", "rust notes"),
                DetectionSource::new(SourceType::Note, "note-2", "more rust"),
            ])
            .unwrap();

        let saved = store.get_active_by_topic("Rust").unwrap().unwrap();
        // 0.8 + 0.9 capped at 1.0; counts summed; both sources recorded
        assert!((saved.confidence - 1.0).abs() < 1e-6);
        assert_eq!(saved.evidence_count, 3);
        assert_eq!(store.list_evidence_for(&saved.id).unwrap().len(), 2);
    }

    #[test]
    fn test_task_weighting_discounts_new_topics() {
        let (store, detector) = detector_with(&[
            r#"[{"name": "Woodworking", "score": 1.0, "count": 1}]"#],
            &[],
        );

        let report = detector
            .detect(&[DetectionSource::new(
                SourceType::Task,
                "task-1",
                "buy chisels for woodworking",
            )])
            .unwrap();

        // 1.0 * 0.4 = 0.4 < 0.6: a task alone cannot establish a new interest
        assert_eq!(report.interests_saved, 0);
        assert!(store.get_active_by_topic("Woodworking").unwrap().is_none());
    }

    #[test]
    fn test_known_topic_boost_from_chat() {
        let (store, detector) = detector_with(&[
            r#"[{"name": "Rust", "score": 0.5, "count": 1}]"#],
            &[("rust", vec![1.0, 0.0])],
        );

        // "Rust" is already a known interest
        let existing = Interest::new("Rust", SourceType::Note, 0.7).with_evidence_count(4);
        store.insert_interest(&existing).unwrap();

        let report = detector
            .detect(&[DetectionSource::new(
                SourceType::Chat,
                "msg-1",
                "talked about rust generics",
            )])
            .unwrap();

        // 0.5 * 0.7 + 0.3 = 0.65 >= 0.6: the mention re-confirms the interest
        assert_eq!(report.interests_saved, 1);
        let updated = store.get_active_by_topic("Rust").unwrap().unwrap();
        assert_eq!(updated.id, existing.id);
        assert!((updated.confidence - 0.7).abs() < 1e-6); // max(0.7, 0.65)
        assert_eq!(updated.evidence_count, 5);
    }

    #[test]
    fn test_single_source_failure_does_not_abort() {
        // Only one scripted response: the second source's completion fails,
        // the first source's topics still land.
        let (store, detector) = detector_with(&[
            r#"[{"name": "Astronomy", "score": 0.9, "count": 1}]"#],
            &[("astronomy", vec![1.0, 0.0])],
        );

        let report = detector
            .detect(&[
                DetectionSource::new(SourceType::Note, "note-1", "stargazing log"),
                DetectionSource::new(SourceType::Note, "note-2", "more notes"),
            ])
            .unwrap();

        assert_eq!(report.interests_saved, 1);
        assert!(store.get_active_by_topic("Astronomy").unwrap().is_some());
    }

    #[test]
    fn test_malformed_extraction_is_zero_topics() {
        let (store, detector) = detector_with(&["no json here at all"], &[]);

        let report = detector
            .detect(&[DetectionSource::new(SourceType::Note, "note-1", "text")])
            .unwrap();

        assert_eq!(report.topics_extracted, 0);
        assert_eq!(report.interests_saved, 0);
        assert_eq!(store.interest_count(), 0);
    }

    #[test]
    fn test_empty_sources_are_skipped() {
        let (_, detector) = detector_with(&[], &[]);
        let report = detector
            .detect(&[DetectionSource::new(SourceType::Note, "note-1", "   ")])
            .unwrap();
        assert_eq!(report.topics_extracted, 0);
    }

    #[test]
    fn test_hierarchy_stage_runs_after_detection() {
        let (store, detector) = detector_with(&[
            r#"[{"name": "AI", "score": 0.9, "count": 1},
                {"name": "Machine Learning", "score": 0.8, "count": 1}]"#,
            r#"[{"parent": "AI", "child": "Machine Learning", "confidence": 0.9, "reason": "subfield"}]"#],
            &[("ai", vec![1.0, 0.0]), ("machine learning", vec![0.0, 1.0])],
        );

        let report = detector
            .detect(&[DetectionSource::new(
                SourceType::Note,
                "note-1",
                "AI and machine learning notes",
            )])
            .unwrap();

        assert_eq!(report.interests_saved, 2);
        assert_eq!(report.edges_detected, 1);
        assert_eq!(store.edge_count(), 1);
    }

    #[test]
    fn test_score_and_count_clamped() {
        let (store, detector) = detector_with(&[
            r#"[{"name": "Topic", "score": 3.5, "count": 0}]"#],
            &[("topic", vec![1.0, 0.0])],
        );

        detector
            .detect(&[DetectionSource::new(SourceType::Note, "note-1", "text")])
            .unwrap();

        let saved = store.get_active_by_topic("Topic").unwrap().unwrap();
        assert!((saved.confidence - 1.0).abs() < 1e-6);
        assert_eq!(saved.evidence_count, 1);
    }

    #[test]
    fn test_truncate_for_model() {
        let long: String = "x".repeat(MAX_EXTRACTION_CHARS + 100);
        assert_eq!(truncate_for_model(&long).len(), MAX_EXTRACTION_CHARS);
        assert_eq!(truncate_for_model("short"), "short");

        // Multibyte input truncates on a character boundary
        let emoji: String = "🦀".repeat(MAX_EXTRACTION_CHARS + 1);
        let truncated = truncate_for_model(&emoji);
        assert_eq!(truncated.chars().count(), MAX_EXTRACTION_CHARS);
    }

    #[test]
    fn test_throttle_requires_minimum_sources() {
        let mut throttle = DetectionThrottle::new(Duration::from_secs(300), 3);
        let now = Instant::now();

        assert!(!throttle.check_and_trigger(2, now));
        assert!(throttle.check_and_trigger(3, now));
    }

    #[test]
    fn test_throttle_enforces_cooldown() {
        let mut throttle = DetectionThrottle::new(Duration::from_secs(300), 1);
        let start = Instant::now();

        assert!(throttle.check_and_trigger(5, start));
        assert!(!throttle.check_and_trigger(5, start + Duration::from_secs(100)));
        assert!(throttle.check_and_trigger(5, start + Duration::from_secs(301)));
    }

    #[test]
    fn test_parse_topics_defaults() {
        let topics = InterestDetector::<InMemoryStore, MapEmbedder, ScriptedCompletion>::parse_topics(
            r#"[{"name": "Only Name"}]"#,
        );
        assert_eq!(topics.len(), 1);
        assert!((topics[0].score - 0.5).abs() < f32::EPSILON);
        assert_eq!(topics[0].count, 1);
    }
}
