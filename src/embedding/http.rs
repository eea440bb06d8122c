//! HTTP client for the embeddings service.

use super::EmbeddingGateway;
use crate::llm::{GatewayHttpConfig, build_http_client};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Client for the REST embeddings service.
///
/// The service exposes `POST /api/embeddings/generate` for a single text and
/// `POST /api/embeddings/generate/batch` for several, both returning vectors
/// of a fixed dimension for the configured sentence-transformer model.
pub struct HttpEmbeddingGateway {
    /// Service base URL.
    base_url: String,
    /// Model to request embeddings from.
    model: String,
    /// HTTP client.
    client: reqwest::blocking::Client,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    text: &'a str,
    model: &'a str,
}

#[derive(Debug, Serialize)]
struct BatchEmbeddingRequest<'a> {
    texts: &'a [&'a str],
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct BatchEmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
}

impl HttpEmbeddingGateway {
    /// Default service base URL.
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:8001";

    /// Default embedding model.
    pub const DEFAULT_MODEL: &'static str = "all-MiniLM-L6-v2";

    /// Creates a gateway against the default local service.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            client: build_http_client(GatewayHttpConfig::default()),
        }
    }

    /// Sets the service base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the embedding model.
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

    fn post<B: Serialize, R: for<'de> Deserialize<'de>>(&self, path: &str, body: &B) -> Result<R> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .map_err(|e| Error::Upstream {
                service: "embeddings",
                cause: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(Error::Upstream {
                service: "embeddings",
                cause: format!("API returned status: {status} - {body}"),
            });
        }

        response.json().map_err(|e| Error::Upstream {
            service: "embeddings",
            cause: format!("invalid response body: {e}"),
        })
    }
}

impl Default for HttpEmbeddingGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingGateway for HttpEmbeddingGateway {
    fn model(&self) -> &str {
        &self.model
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("cannot embed empty text".to_string()));
        }

        let request = EmbeddingRequest {
            text,
            model: &self.model,
        };
        let response: EmbeddingResponse = self.post("/api/embeddings/generate", &request)?;
        Ok(response.embedding)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = BatchEmbeddingRequest {
            texts,
            model: &self.model,
        };
        let response: BatchEmbeddingResponse =
            self.post("/api/embeddings/generate/batch", &request)?;
        Ok(response.embeddings)
    }
}
