//! `OpenAI`-compatible completion client.

use super::{CompletionGateway, CompletionRequest, CompletionResponse};
use super::{GatewayHttpConfig, build_http_client};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Client for `OpenAI`-compatible chat-completion APIs.
pub struct OpenAiCompletionGateway {
    /// API key.
    api_key: Option<String>,
    /// API endpoint.
    endpoint: String,
    /// Default model.
    model: String,
    /// HTTP client.
    client: reqwest::blocking::Client,
}

impl OpenAiCompletionGateway {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.openai.com/v1";

    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-mini";

    /// Creates a new client, reading the API key from `OPENAI_API_KEY`.
    #[must_use]
    pub fn new() -> Self {
        let api_key = std::env::var("OPENAI_API_KEY").ok();
        Self {
            api_key,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            client: build_http_client(GatewayHttpConfig::default()),
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the API endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the default model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the HTTP timeouts.
    #[must_use]
    pub fn with_http_config(mut self, config: GatewayHttpConfig) -> Self {
        self.client = build_http_client(config);
        self
    }

    /// Reasoning-model families use `max_completion_tokens` and only support
    /// the default temperature.
    fn is_reasoning_model(model: &str) -> bool {
        model.starts_with("gpt-5") || model.starts_with("o1") || model.starts_with("o3")
    }
}

impl Default for OpenAiCompletionGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    model: String,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    total_tokens: u32,
}

impl CompletionGateway for OpenAiCompletionGateway {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let api_key = self.api_key.as_ref().ok_or_else(|| Error::Upstream {
            service: "completions",
            cause: "OPENAI_API_KEY not set".to_string(),
        })?;

        let model = request.model.clone().unwrap_or_else(|| self.model.clone());

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: request.prompt.clone(),
        });

        let body = if Self::is_reasoning_model(&model) {
            ChatCompletionRequest {
                model,
                messages,
                max_tokens: None,
                max_completion_tokens: Some(request.max_tokens),
                temperature: None,
            }
        } else {
            ChatCompletionRequest {
                model,
                messages,
                max_tokens: Some(request.max_tokens),
                max_completion_tokens: None,
                temperature: Some(request.temperature),
            }
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .map_err(|e| Error::Upstream {
                service: "completions",
                cause: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(Error::Upstream {
                service: "completions",
                cause: format!("API returned status: {status} - {body}"),
            });
        }

        let parsed: ChatCompletionResponse = response.json().map_err(|e| Error::Upstream {
            service: "completions",
            cause: format!("invalid response body: {e}"),
        })?;

        let text = parsed
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .ok_or_else(|| Error::Upstream {
                service: "completions",
                cause: "No choices in response".to_string(),
            })?;

        Ok(CompletionResponse {
            text,
            model: parsed.model,
            tokens_used: parsed.usage.map(|u| u.total_tokens).unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reasoning_model_detection() {
        assert!(OpenAiCompletionGateway::is_reasoning_model("gpt-5-turbo"));
        assert!(OpenAiCompletionGateway::is_reasoning_model("o1-mini"));
        assert!(!OpenAiCompletionGateway::is_reasoning_model("gpt-4o-mini"));
    }

    #[test]
    fn test_missing_api_key_fails() {
        let gateway = OpenAiCompletionGateway {
            api_key: None,
            endpoint: OpenAiCompletionGateway::DEFAULT_ENDPOINT.to_string(),
            model: OpenAiCompletionGateway::DEFAULT_MODEL.to_string(),
            client: reqwest::blocking::Client::new(),
        };

        let result = gateway.complete(&CompletionRequest::new("hello"));
        assert!(matches!(result, Err(Error::Upstream { .. })));
    }
}
