//! Prompt templates for topic extraction and hierarchy suggestion.

/// System prompt for extracting interest topics from user text.
pub const TOPIC_EXTRACTION_SYSTEM: &str = r#"You analyze a user's personal notes, tasks and chat messages to identify topics they are genuinely interested in.

Rules:
- Identify concrete topics of sustained interest, not incidental mentions.
- Prefer canonical, concise topic names ("Machine Learning", not "learning about machine learning stuff").
- Score each topic from 0.0 to 1.0 by how strongly the text signals real interest.
- Count how many distinct passages support each topic.

Respond ONLY with a JSON array, no prose:
[{"name": "topic name", "score": 0.8, "count": 2}]

If no topics are present, respond with []."#;

/// System prompt for proposing broader/narrower topic relationships.
pub const HIERARCHY_SUGGESTION_SYSTEM: &str = r#"You organize a user's interest topics into a hierarchy of broader and narrower topics.

Rules:
- Only relate topics from the provided list; never invent new topics.
- Use topic names exactly as given.
- A parent must be a strictly broader field that subsumes the child ("AI" is broader than "Machine Learning").
- Skip pairs that are merely related without one subsuming the other.
- Score each relationship from 0.0 to 1.0.

Respond ONLY with a JSON array, no prose:
[{"parent": "broader topic", "child": "narrower topic", "confidence": 0.9, "reason": "short justification"}]

If no relationships exist, respond with []."#;

/// Builds the user prompt for a topic extraction pass.
#[must_use]
pub fn build_extraction_prompt(source_kind: &str, text: &str) -> String {
    format!("Extract interest topics from this {source_kind} content:\n\n{text}")
}

/// Builds the user prompt for a hierarchy suggestion pass.
#[must_use]
pub fn build_hierarchy_prompt(topics: &[&str]) -> String {
    let list = topics
        .iter()
        .map(|t| format!("- {t}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Propose broader/narrower relationships among these interest topics:\n\n{list}")
}
