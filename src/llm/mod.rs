//! Completion gateway abstraction.
//!
//! Provides a unified interface for text-completion providers. The engine
//! uses completions for two things: extracting candidate topics from raw
//! note/task/chat text, and proposing broader/narrower relationships between
//! known topics. Both callers expect a JSON array somewhere in the response
//! text and treat its absence as "no candidates".

mod openai;
pub mod prompts;

pub use openai::OpenAiCompletionGateway;

use crate::Result;
use std::time::Duration;

/// A completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// The user prompt.
    pub prompt: String,
    /// Optional system prompt.
    pub system: Option<String>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Optional per-request model override.
    pub model: Option<String>,
}

impl CompletionRequest {
    /// Creates a request with default sampling parameters.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            temperature: 0.3,
            max_tokens: 1024,
            model: None,
        }
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the generation budget.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Overrides the model for this request.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// A completion response.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// The generated text.
    pub text: String,
    /// The model that produced it.
    pub model: String,
    /// Total tokens consumed by the request, when reported.
    pub tokens_used: u32,
}

/// Trait for completion providers.
pub trait CompletionGateway: Send + Sync {
    /// The provider name.
    fn name(&self) -> &'static str;

    /// Generates a completion for the given request.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion fails. Failures propagate; no
    /// retry is attempted at this layer.
    fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;
}

/// HTTP client configuration for gateway requests.
#[derive(Debug, Clone, Copy)]
pub struct GatewayHttpConfig {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for GatewayHttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
        }
    }
}

/// Builds a blocking HTTP client with configured timeouts.
#[must_use]
pub fn build_http_client(config: GatewayHttpConfig) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build gateway HTTP client: {err}");
        reqwest::blocking::Client::new()
    })
}

/// Locates a JSON array within completion output.
///
/// Handles markdown code fences and surrounding prose; returns the slice
/// from the first `[` to the last `]`. `None` means the response carried no
/// candidates, which callers treat as an empty result rather than an error.
#[must_use]
pub fn extract_json_array(response: &str) -> Option<&str> {
    let mut text = response.trim();

    // Strip a ```json ... ``` fence if present
    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        if let Some(end) = after.find("```") {
            text = &after[..end];
        }
    }

    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if start < end {
        Some(&text[start..=end])
    } else {
        None
    }
}
