//! Service layer: the business logic of the interest graph.

mod detection;
mod hierarchy;
mod manage;
mod recommendation;
mod similarity;

pub use detection::{
    DetectionReport, DetectionSource, DetectionThrottle, ExtractedTopic, InterestDetector,
};
pub use hierarchy::HierarchyGraph;
pub use manage::InterestManager;
pub use recommendation::{RecommendOptions, RecommendationEngine, RecommendationSet};
pub use similarity::{MergeOutcome, SimilarInterest, SimilarityEngine};
