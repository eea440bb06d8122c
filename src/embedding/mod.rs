//! Embedding generation.
//!
//! Wraps the external embeddings service behind the [`EmbeddingGateway`]
//! trait. The service turns a topic string (or any ad-hoc text) into a
//! fixed-length vector; similarity math happens on our side.

mod http;

pub use http::HttpEmbeddingGateway;

use crate::Result;

/// Trait for embedding generators.
pub trait EmbeddingGateway: Send + Sync {
    /// The model identifier embeddings are produced with.
    fn model(&self) -> &str;

    /// Generates an embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails. Failures propagate;
    /// no retry is attempted at this layer.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generates embeddings for multiple texts.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}
