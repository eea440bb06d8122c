//! Domain types for the interest graph.

mod hierarchy;
mod interest;
mod recommendation;
mod similarity;

pub use hierarchy::{BROADER_THAN, HierarchyEdge, HierarchyNode, HierarchyTree, TreeNode};
pub use interest::{Evidence, Interest};
pub use recommendation::{
    CO_OCCURRENCE_WEIGHT, HIERARCHY_WEIGHT, Recommendation, SEMANTIC_WEIGHT, Signal, SignalScores,
    TEMPORAL_WEIGHT,
};
pub use similarity::{InterestEmbedding, SimilarityPair, cosine_similarity};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an interest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InterestId(String);

impl InterestId {
    /// Creates an interest ID from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a new unique interest ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("int_{}", uuid::Uuid::new_v4().simple()))
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InterestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for InterestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Unique identifier for an evidence row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvidenceId(String);

impl EvidenceId {
    /// Creates an evidence ID from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a new unique evidence ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("ev_{}", uuid::Uuid::new_v4().simple()))
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EvidenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the source record (note, task or chat message) that
/// suggested an interest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(String);

impl SourceId {
    /// Creates a source ID from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of text source an interest was detected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// A note body.
    Note,
    /// A task title/description.
    Task,
    /// A chat message.
    Chat,
}

impl SourceType {
    /// Returns all source type variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Note, Self::Task, Self::Chat]
    }

    /// Returns the source type as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Task => "task",
            Self::Chat => "chat",
        }
    }

    /// Parses a source type from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "note" | "notes" => Some(Self::Note),
            "task" | "tasks" | "todo" => Some(Self::Task),
            "chat" | "message" => Some(Self::Chat),
            _ => None,
        }
    }

    /// Weight applied to extraction scores from this source.
    ///
    /// Notes are taken at face value; tasks and chat are noisier and are
    /// discounted before folding into an interest's confidence.
    #[must_use]
    pub const fn extraction_weight(&self) -> f32 {
        match self {
            Self::Note => 1.0,
            Self::Task => 0.4,
            Self::Chat => 0.7,
        }
    }

    /// Extra confidence granted when the topic is already a known interest.
    ///
    /// A task or chat mention of an existing interest is a stronger signal
    /// than a first sighting from the same source.
    #[must_use]
    pub const fn known_topic_boost(&self) -> f32 {
        match self {
            Self::Note => 0.0,
            Self::Task => 0.2,
            Self::Chat => 0.3,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown source type: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_interest_id_generate() {
        let id1 = InterestId::generate();
        let id2 = InterestId::generate();
        assert_ne!(id1, id2);
        assert!(id1.as_str().starts_with("int_"));
    }

    #[test_case("note", Some(SourceType::Note); "note")]
    #[test_case("TASKS", Some(SourceType::Task); "tasks uppercase")]
    #[test_case("todo", Some(SourceType::Task); "todo alias")]
    #[test_case("chat", Some(SourceType::Chat); "chat")]
    #[test_case("message", Some(SourceType::Chat); "message alias")]
    #[test_case("email", None; "unknown kind")]
    fn test_source_type_parse(input: &str, expected: Option<SourceType>) {
        assert_eq!(SourceType::parse(input), expected);
    }

    #[test]
    fn test_source_type_roundtrip() {
        for st in SourceType::all() {
            assert_eq!(SourceType::parse(st.as_str()), Some(*st));
        }
    }

    #[test]
    fn test_extraction_weights() {
        assert!((SourceType::Note.extraction_weight() - 1.0).abs() < f32::EPSILON);
        assert!((SourceType::Task.extraction_weight() - 0.4).abs() < f32::EPSILON);
        assert!((SourceType::Chat.extraction_weight() - 0.7).abs() < f32::EPSILON);
        assert!(SourceType::Note.known_topic_boost().abs() < f32::EPSILON);
    }
}
