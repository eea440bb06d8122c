//! Interest and evidence types.
//!
//! An [`Interest`] is a detected topic of user engagement. Each detection is
//! backed by [`Evidence`] rows linking the interest to the note, task or chat
//! message it was inferred from.
//!
//! Interests are never hard-deleted. When two interests turn out to be
//! semantic duplicates, the secondary is deactivated and points at the
//! surviving interest through `merged_into`; such a row is a tombstone kept
//! only for referential history.

use crate::models::{EvidenceId, InterestId, SourceId, SourceType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A detected topic of user engagement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interest {
    /// Unique identifier.
    pub id: InterestId,
    /// The topic string (unique among active interests).
    pub topic: String,
    /// Confidence that this is a genuine interest (0.0 to 1.0).
    pub confidence: f32,
    /// The kind of source this interest was first detected from.
    pub source_type: SourceType,
    /// Number of evidence records accumulated for this interest.
    pub evidence_count: u32,
    /// When the topic was last detected in any source.
    pub last_seen: DateTime<Utc>,
    /// Whether the interest is live. Deactivated on merge or deletion.
    pub is_active: bool,
    /// Set when this interest was folded into another; the row is then a
    /// tombstone and is excluded from every active-set read path.
    pub merged_into: Option<InterestId>,
    /// Alternative phrasings folded in from merged duplicates.
    pub synonyms: Vec<String>,
    /// When the interest was first created.
    pub created_at: DateTime<Utc>,
}

impl Interest {
    /// Creates a new active interest for a topic.
    #[must_use]
    pub fn new(topic: impl Into<String>, source_type: SourceType, confidence: f32) -> Self {
        let now = Utc::now();
        Self {
            id: InterestId::generate(),
            topic: topic.into(),
            confidence: confidence.clamp(0.0, 1.0),
            source_type,
            evidence_count: 0,
            last_seen: now,
            is_active: true,
            merged_into: None,
            synonyms: Vec::new(),
            created_at: now,
        }
    }

    /// Creates an interest with a specific ID.
    #[must_use]
    pub fn with_id(mut self, id: InterestId) -> Self {
        self.id = id;
        self
    }

    /// Sets the confidence score, clamped to [0, 1].
    #[must_use]
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Sets the evidence count.
    #[must_use]
    pub const fn with_evidence_count(mut self, count: u32) -> Self {
        self.evidence_count = count;
        self
    }

    /// Adds a synonym if not already present (case-insensitive).
    pub fn add_synonym(&mut self, synonym: impl Into<String>) {
        let synonym = synonym.into();
        let lower = synonym.to_lowercase();
        if self.topic.to_lowercase() != lower
            && !self.synonyms.iter().any(|s| s.to_lowercase() == lower)
        {
            self.synonyms.push(synonym);
        }
    }

    /// Returns true if this interest matches a topic string (canonical topic
    /// or any synonym, case-insensitive).
    #[must_use]
    pub fn matches_topic(&self, topic: &str) -> bool {
        let lower = topic.to_lowercase();
        self.topic.to_lowercase() == lower
            || self.synonyms.iter().any(|s| s.to_lowercase() == lower)
    }

    /// Marks this interest as merged into another.
    ///
    /// The row becomes an inactive tombstone.
    pub fn mark_merged_into(&mut self, primary: InterestId) {
        self.is_active = false;
        self.merged_into = Some(primary);
    }
}

/// A link from an interest to the source record that suggested it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Unique identifier.
    pub id: EvidenceId,
    /// The interest this evidence supports.
    pub interest_id: InterestId,
    /// The kind of source record.
    pub source_type: SourceType,
    /// The id of the note/task/chat message.
    pub source_id: SourceId,
    /// How strongly the source suggested the interest (0.0 to 1.0).
    pub relevance: f32,
    /// When the evidence was recorded.
    pub created_at: DateTime<Utc>,
}

impl Evidence {
    /// Creates a new evidence record.
    #[must_use]
    pub fn new(
        interest_id: InterestId,
        source_type: SourceType,
        source_id: SourceId,
        relevance: f32,
    ) -> Self {
        Self {
            id: EvidenceId::generate(),
            interest_id,
            source_type,
            source_id,
            relevance: relevance.clamp(0.0, 1.0),
            created_at: Utc::now(),
        }
    }
}
