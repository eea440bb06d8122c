//! # Notegraph
//!
//! Interest graph and recommendation engine for a personal notes application.
//!
//! Notegraph watches the text a user produces (notes, tasks, chat) and
//! maintains a living picture of what they care about: detected interest
//! topics with confidence scores and evidence trails, a directed acyclic
//! hierarchy of broader/narrower topics, embedding-based duplicate folding,
//! and ranked, explainable topic recommendations.
//!
//! ## Pipeline
//!
//! 1. [`InterestDetector`] extracts candidate topics from raw text through a
//!    completion gateway and upserts them as [`Interest`] rows.
//! 2. [`SimilarityEngine`] embeds topics, caches pairwise cosine similarity,
//!    and folds near-duplicates into one canonical interest.
//! 3. [`HierarchyGraph`] asks the completion gateway for broader/narrower
//!    relationships and admits only edges that keep the graph acyclic.
//! 4. [`RecommendationEngine`] combines co-occurrence, semantic, hierarchy
//!    and recency signals into a cached, ranked recommendation list.
//!
//! ## Example
//!
//! ```rust,ignore
//! use notegraph::{InterestDetector, DetectionSource, InMemoryStore, SourceType};
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryStore::new());
//! let detector = InterestDetector::new(store, embedder, llm);
//! detector.detect(&[DetectionSource::new(
//!     SourceType::Note,
//!     "note-42",
//!     "Spent the evening tuning the hyperparameters of my CNN",
//! )])?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
// multiple_crate_versions is inherently crate-level (detects duplicate transitive dependencies).
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod cache;
pub mod config;
pub mod embedding;
pub mod llm;
pub mod models;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use cache::{MemoryTtlCache, RecommendationCache};
pub use config::NotegraphConfig;
pub use embedding::{EmbeddingGateway, HttpEmbeddingGateway};
pub use llm::{CompletionGateway, CompletionRequest, CompletionResponse, OpenAiCompletionGateway};
pub use models::{
    Evidence, HierarchyEdge, HierarchyNode, HierarchyTree, Interest, InterestEmbedding, InterestId,
    Recommendation, SignalScores, SimilarityPair, SourceId, SourceType,
};
pub use services::{
    DetectionReport, DetectionSource, DetectionThrottle, HierarchyGraph, InterestDetector,
    InterestManager, RecommendationEngine, RecommendationSet, SimilarityEngine,
};
pub use storage::{InMemoryStore, InterestStore, SqliteStore};

/// Error type for notegraph operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Empty topics, self-referential pairs, malformed parameters |
/// | `NotFound` | Unknown interest/embedding id in a query |
/// | `OperationFailed` | Store failures, poisoned locks, serialization errors |
/// | `Upstream` | Embedding or completion service errors |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced record does not exist.
    ///
    /// Raised when an interest id (or its embedding) named in an
    /// ancestor/descendant/recommendation query is unknown. Surfaced to the
    /// caller rather than degraded.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// The kind of record that was missing ("interest", "embedding", ...).
        kind: &'static str,
        /// The id that failed to resolve.
        id: String,
    },

    /// An operation failed.
    ///
    /// Raised when:
    /// - `SQLite` operations fail
    /// - A lock is poisoned
    /// - JSON serialization of a stored value fails
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// An external service call failed.
    ///
    /// Embedding and completion gateways propagate their transport and
    /// protocol errors through this variant. No retry is attempted at this
    /// layer; retry policy belongs to the caller.
    #[error("upstream service '{service}' failed: {cause}")]
    Upstream {
        /// The service that failed ("embeddings", "completions", ...).
        service: &'static str,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for notegraph operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("empty topic".to_string());
        assert_eq!(err.to_string(), "invalid input: empty topic");

        let err = Error::NotFound {
            kind: "interest",
            id: "int_123".to_string(),
        };
        assert_eq!(err.to_string(), "interest not found: int_123");

        let err = Error::OperationFailed {
            operation: "upsert_edge".to_string(),
            cause: "disk full".to_string(),
        };
        assert_eq!(err.to_string(), "operation 'upsert_edge' failed: disk full");

        let err = Error::Upstream {
            service: "embeddings",
            cause: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "upstream service 'embeddings' failed: connection refused"
        );
    }
}
