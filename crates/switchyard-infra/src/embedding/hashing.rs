//! Dependency-free embedder based on feature hashing.
//!
//! Word unigrams and character trigrams are hashed (FNV-1a) into a fixed
//! number of buckets, with a sign bit from the hash, and the vector is
//! L2-normalized. Near-duplicate phrasings land close together; unrelated
//! text lands near orthogonal. Deterministic across runs.

use switchyard_core::cache::embedder::Embedder;
use switchyard_types::error::EmbeddingError;

pub const DEFAULT_DIMENSION: usize = 256;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(FNV_OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME))
}

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn add(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = fnv1a(feature.as_bytes());
        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }

    /// Embed one text synchronously.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let normalized = text.to_lowercase();

        for word in normalized
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            self.add(&mut vector, word, 1.0);

            let chars: Vec<char> = format!("^{word}$").chars().collect();
            for window in chars.windows(3) {
                let gram: String = window.iter().collect();
                self.add(&mut vector, &gram, 0.5);
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl Embedder for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn model_name(&self) -> &str {
        "hashing-ngram"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::cache::similarity::cosine_similarity;

    #[test]
    fn test_deterministic_and_normalized() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed_text("What is e-commerce?");
        let b = embedder.embed_text("What is e-commerce?");
        assert_eq!(a, b);
        assert_eq!(a.len(), DEFAULT_DIMENSION);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_case_and_punctuation_do_not_matter() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed_text("What is e-commerce?");
        let b = embedder.embed_text("what is E-COMMERCE");
        assert!(cosine_similarity(&a, &b) > 0.99);
    }

    #[test]
    fn test_unrelated_text_is_far() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed_text("What is e-commerce?");
        let b = embedder.embed_text("Recipe for sourdough bread");
        assert!(cosine_similarity(&a, &b) < 0.5);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(8);
        assert!(embedder.embed_text("").iter().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn test_batch_embed() {
        let embedder = HashingEmbedder::new(32);
        let vectors = embedder
            .embed(&["one".to_string(), "two".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(embedder.dimension(), 32);
    }
}
