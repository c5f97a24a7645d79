//! FastEmbed-based local embedding generator.
//!
//! Implements the `Embedder` trait from `switchyard-core` using fastembed's
//! BGESmallENV15 model (384 dimensions) with ONNX runtime inference. The
//! model is downloaded on first use into the given cache directory.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use switchyard_core::cache::embedder::Embedder;
use switchyard_types::error::EmbeddingError;

const MODEL_NAME: &str = "BAAI/bge-small-en-v1.5";
const DIMENSION: usize = 384;

/// Local embedder backed by an ONNX model.
///
/// Inference is CPU-bound, so it runs on the blocking pool.
pub struct FastEmbedEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
}

impl FastEmbedEmbedder {
    pub fn new(cache_dir: PathBuf) -> Result<Self, EmbeddingError> {
        let options = InitOptions::new(EmbeddingModel::BGESmallENV15)
            .with_cache_dir(cache_dir)
            .with_show_download_progress(false);
        let model = TextEmbedding::try_new(options)
            .map_err(|e| EmbeddingError::Unavailable(e.to_string()))?;
        tracing::info!(model = MODEL_NAME, "Loaded embedding model");
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
        })
    }
}

impl Embedder for FastEmbedEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || {
            let mut model = model.lock().unwrap_or_else(PoisonError::into_inner);
            model
                .embed(texts, None)
                .map_err(|e| EmbeddingError::Failed(e.to_string()))
        })
        .await
        .map_err(|e| EmbeddingError::Failed(format!("embedding task panicked: {e}")))?
    }

    fn model_name(&self) -> &str {
        MODEL_NAME
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }
}
