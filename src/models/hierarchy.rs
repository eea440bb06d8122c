//! Hierarchy edge and tree types.
//!
//! The hierarchy is a directed acyclic graph of "broader-than" relationships:
//! an edge from `parent_id` to `child_id` records that the parent topic
//! subsumes the child topic ("AI" → "Machine Learning"). Acyclicity is an
//! invariant enforced at insertion time by
//! [`HierarchyGraph::would_create_cycle`](crate::services::HierarchyGraph::would_create_cycle).

use crate::models::InterestId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The single relationship kind this subsystem models.
///
/// The column exists so the schema can grow additional relationship kinds
/// without a migration.
pub const BROADER_THAN: &str = "broader_than";

/// A directed "broader-than" edge between two interests.
///
/// At most one edge exists per ordered `(parent, child)` pair; re-detection
/// overwrites the confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyEdge {
    /// The broader interest.
    pub parent_id: InterestId,
    /// The narrower interest.
    pub child_id: InterestId,
    /// Relationship tag (currently always [`BROADER_THAN`]).
    pub edge_type: String,
    /// Confidence in the relationship (0.0 to 1.0).
    pub confidence: f32,
    /// When the edge was (last) detected.
    pub detected_at: DateTime<Utc>,
}

impl HierarchyEdge {
    /// Creates a new broader-than edge.
    #[must_use]
    pub fn new(parent_id: InterestId, child_id: InterestId, confidence: f32) -> Self {
        Self {
            parent_id,
            child_id,
            edge_type: BROADER_THAN.to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            detected_at: Utc::now(),
        }
    }

    /// Returns true if the edge points from a node to itself.
    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.parent_id == self.child_id
    }
}

/// A node reached by an ancestor/descendant traversal, annotated with its
/// distance from the query node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyNode {
    /// The interest at this node.
    pub interest_id: InterestId,
    /// The interest's topic string.
    pub topic: String,
    /// Edge count from the query node (1 = direct parent/child).
    pub distance: u32,
}

/// One node of the full hierarchy forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    /// The interest at this node.
    pub interest_id: InterestId,
    /// The interest's topic string.
    pub topic: String,
    /// The interest's confidence.
    pub confidence: f32,
    /// Distance from this node's root.
    pub depth: u32,
    /// Narrower topics under this node.
    pub children: Vec<TreeNode>,
}

/// The full hierarchy view: a forest plus summary statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HierarchyTree {
    /// Interests with no broader parent, children nested beneath.
    pub roots: Vec<TreeNode>,
    /// Total number of active interests in the forest.
    pub total_interests: usize,
    /// Number of root nodes.
    pub root_count: usize,
    /// Longest root-to-leaf distance in the forest.
    pub max_depth: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_confidence_clamped() {
        let edge = HierarchyEdge::new(InterestId::generate(), InterestId::generate(), 1.5);
        assert!((edge.confidence - 1.0).abs() < f32::EPSILON);
        assert_eq!(edge.edge_type, BROADER_THAN);
    }

    #[test]
    fn test_self_loop_detection() {
        let id = InterestId::generate();
        let edge = HierarchyEdge::new(id.clone(), id, 0.9);
        assert!(edge.is_self_loop());

        let edge = HierarchyEdge::new(InterestId::generate(), InterestId::generate(), 0.9);
        assert!(!edge.is_self_loop());
    }
}
