//! Configuration management.

use serde::Deserialize;

/// Main configuration for notegraph.
#[derive(Debug, Clone, Default)]
pub struct NotegraphConfig {
    /// Embeddings service configuration.
    pub embeddings: EmbeddingsConfig,
    /// Completion provider configuration.
    pub llm: LlmConfig,
    /// Detection thresholds and throttle settings.
    pub detection: DetectionConfig,
    /// Recommendation scoring and caching settings.
    pub recommendation: RecommendationConfig,
}

/// Embeddings service configuration.
#[derive(Debug, Clone)]
pub struct EmbeddingsConfig {
    /// Service base URL.
    pub base_url: String,
    /// Embedding model name.
    pub model: String,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            model: "all-MiniLM-L6-v2".to_string(),
        }
    }
}

/// Completion provider configuration.
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    /// Model name (provider default when unset).
    pub model: Option<String>,
    /// API key (falls back to the provider's environment variable).
    pub api_key: Option<String>,
    /// Base URL for self-hosted providers.
    pub base_url: Option<String>,
}

/// Interest detection settings.
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Minimum combined confidence for a detected topic to be saved.
    pub min_confidence: f32,
    /// Similarity threshold for automatic duplicate folding.
    pub auto_merge_threshold: f32,
    /// Seconds between detection passes (upstream throttle).
    pub cooldown_secs: u64,
    /// Minimum pending sources before a pass runs.
    pub min_sources: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
            auto_merge_threshold: 0.85,
            cooldown_secs: 300,
            min_sources: 3,
        }
    }
}

/// Recommendation settings.
#[derive(Debug, Clone)]
pub struct RecommendationConfig {
    /// Default number of recommendations returned.
    pub default_limit: usize,
    /// Default minimum combined score.
    pub default_min_score: f32,
    /// Result cache TTL in seconds.
    pub cache_ttl_secs: u64,
    /// Days a persisted recommendation stays servable.
    pub retention_days: i64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            default_min_score: 0.3,
            cache_ttl_secs: 3600,
            retention_days: 30,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Embeddings section.
    pub embeddings: Option<ConfigFileEmbeddings>,
    /// LLM section.
    pub llm: Option<ConfigFileLlm>,
    /// Detection section.
    pub detection: Option<ConfigFileDetection>,
    /// Recommendation section.
    pub recommendation: Option<ConfigFileRecommendation>,
}

/// Embeddings section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileEmbeddings {
    /// Service base URL.
    pub base_url: Option<String>,
    /// Model name.
    pub model: Option<String>,
}

/// LLM section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLlm {
    /// Model name.
    pub model: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Base URL.
    pub base_url: Option<String>,
}

/// Detection section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileDetection {
    /// Minimum confidence to save a topic.
    pub min_confidence: Option<f32>,
    /// Auto-merge similarity threshold.
    pub auto_merge_threshold: Option<f32>,
    /// Throttle cooldown in seconds.
    pub cooldown_secs: Option<u64>,
    /// Minimum pending sources.
    pub min_sources: Option<usize>,
}

/// Recommendation section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileRecommendation {
    /// Default result limit.
    pub default_limit: Option<usize>,
    /// Default minimum score.
    pub default_min_score: Option<f32>,
    /// Cache TTL in seconds.
    pub cache_ttl_secs: Option<u64>,
    /// Retention window in days.
    pub retention_days: Option<i64>,
}

impl NotegraphConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &std::path::Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: e.to_string(),
            })?;

        let file: ConfigFile =
            toml::from_str(&contents).map_err(|e| crate::Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;

        Ok(Self::from_config_file(file))
    }

    /// Builds a configuration from a parsed config file, filling gaps with
    /// defaults.
    #[must_use]
    pub fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(embeddings) = file.embeddings {
            if let Some(base_url) = embeddings.base_url {
                config.embeddings.base_url = base_url;
            }
            if let Some(model) = embeddings.model {
                config.embeddings.model = model;
            }
        }

        if let Some(llm) = file.llm {
            config.llm.model = llm.model;
            config.llm.api_key = llm.api_key;
            config.llm.base_url = llm.base_url;
        }

        if let Some(detection) = file.detection {
            if let Some(v) = detection.min_confidence {
                config.detection.min_confidence = v.clamp(0.0, 1.0);
            }
            if let Some(v) = detection.auto_merge_threshold {
                config.detection.auto_merge_threshold = v.clamp(0.0, 1.0);
            }
            if let Some(v) = detection.cooldown_secs {
                config.detection.cooldown_secs = v;
            }
            if let Some(v) = detection.min_sources {
                config.detection.min_sources = v;
            }
        }

        if let Some(recommendation) = file.recommendation {
            if let Some(v) = recommendation.default_limit {
                config.recommendation.default_limit = v;
            }
            if let Some(v) = recommendation.default_min_score {
                config.recommendation.default_min_score = v.clamp(0.0, 1.0);
            }
            if let Some(v) = recommendation.cache_ttl_secs {
                config.recommendation.cache_ttl_secs = v;
            }
            if let Some(v) = recommendation.retention_days {
                config.recommendation.retention_days = v;
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NotegraphConfig::new();
        assert!((config.detection.min_confidence - 0.6).abs() < f32::EPSILON);
        assert!((config.detection.auto_merge_threshold - 0.85).abs() < f32::EPSILON);
        assert_eq!(config.recommendation.default_limit, 10);
        assert_eq!(config.recommendation.cache_ttl_secs, 3600);
        assert_eq!(config.recommendation.retention_days, 30);
    }

    #[test]
    fn test_from_config_file_overrides() {
        let file: ConfigFile = toml::from_str(
            r#"
            [embeddings]
            base_url = "http://embeddings:9000"

            [detection]
            min_confidence = 0.7
            min_sources = 5

            [recommendation]
            default_limit = 20
            "#,
        )
        .unwrap();

        let config = NotegraphConfig::from_config_file(file);
        assert_eq!(config.embeddings.base_url, "http://embeddings:9000");
        assert_eq!(config.embeddings.model, "all-MiniLM-L6-v2");
        assert!((config.detection.min_confidence - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.detection.min_sources, 5);
        assert_eq!(config.recommendation.default_limit, 20);
    }

    #[test]
    fn test_out_of_range_values_clamped() {
        let file: ConfigFile = toml::from_str(
            r"
            [detection]
            min_confidence = 1.8
            ",
        )
        .unwrap();

        let config = NotegraphConfig::from_config_file(file);
        assert!((config.detection.min_confidence - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = NotegraphConfig::load_from_file(std::path::Path::new("/nonexistent.toml"));
        assert!(result.is_err());
    }
}
