//! Embedders for the semantic cache.

#[cfg(feature = "fastembed")]
pub mod fastembed;
pub mod hashing;

use std::path::Path;

use switchyard_core::cache::box_embedder::BoxEmbedder;
use switchyard_types::error::EmbeddingError;

pub use self::hashing::HashingEmbedder;

/// The semantic embedder, cached under `data_dir/models`.
///
/// Falls back to the hashing embedder when the model cannot be loaded or
/// the build lacks the `fastembed` feature.
pub fn default_embedder(data_dir: &Path) -> BoxEmbedder {
    or_degraded(load_model(data_dir))
}

#[cfg(feature = "fastembed")]
fn load_model(data_dir: &Path) -> Result<BoxEmbedder, EmbeddingError> {
    self::fastembed::FastEmbedEmbedder::new(data_dir.join("models")).map(BoxEmbedder::new)
}

#[cfg(not(feature = "fastembed"))]
fn load_model(_data_dir: &Path) -> Result<BoxEmbedder, EmbeddingError> {
    Err(EmbeddingError::Unavailable(
        "built without the fastembed feature".to_string(),
    ))
}

/// Use the model, or degrade to hashing with a warning.
fn or_degraded(model: Result<BoxEmbedder, EmbeddingError>) -> BoxEmbedder {
    match model {
        Ok(embedder) => embedder,
        Err(e) => {
            tracing::warn!(
                error = %e,
                fallback = "hashing-ngram",
                "Embedding model unavailable, semantic cache degraded to near-duplicate matching"
            );
            BoxEmbedder::new(HashingEmbedder::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_failure_degrades_to_hashing() {
        let embedder = or_degraded(Err(EmbeddingError::Unavailable("offline".into())));
        assert_eq!(embedder.model_name(), "hashing-ngram");
        assert_eq!(embedder.dimension(), hashing::DEFAULT_DIMENSION);
    }

    #[test]
    fn test_loaded_model_is_kept() {
        let model = or_degraded(Ok(BoxEmbedder::new(HashingEmbedder::new(32))));
        assert_eq!(model.dimension(), 32);
    }

    #[cfg(feature = "fastembed")]
    #[tokio::test]
    #[ignore = "downloads the embedding model"]
    async fn test_default_embedder_matches_paraphrases() {
        use switchyard_core::cache::similarity::cosine_similarity;

        let dir = tempfile::tempdir().unwrap();
        let embedder = default_embedder(dir.path());
        assert_eq!(embedder.model_name(), "BAAI/bge-small-en-v1.5");

        let vectors = embedder
            .embed(&[
                "What is e-commerce?".to_string(),
                "What does electronic commerce mean?".to_string(),
                "How do I bake sourdough bread?".to_string(),
            ])
            .await
            .unwrap();
        let paraphrase = cosine_similarity(&vectors[0], &vectors[1]);
        let unrelated = cosine_similarity(&vectors[0], &vectors[2]);
        assert!(paraphrase > unrelated + 0.2, "{paraphrase} vs {unrelated}");
    }
}
