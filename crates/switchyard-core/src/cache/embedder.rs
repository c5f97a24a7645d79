//! Embedder trait for text-to-vector conversion.
//!
//! The semantic cache compares queries by the cosine similarity of their
//! embeddings. Implementations (e.g., a local FastEmbed model) live in
//! switchyard-infra.

use switchyard_types::error::EmbeddingError;

/// Trait for converting text into embedding vectors.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait Embedder: Send + Sync {
    /// Embed one or more texts into vectors, one vector per input text.
    fn embed(
        &self,
        texts: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<Vec<f32>>, EmbeddingError>> + Send;

    /// The model name used for embeddings (e.g., "all-MiniLM-L6-v2").
    fn model_name(&self) -> &str;

    /// The dimensionality of the output vectors.
    fn dimension(&self) -> usize;
}
