/// Batch embedding for ingestion
use super::{EmbeddingError, EmbeddingProvider};
use std::sync::Arc;
use tracing::{debug, info};

/// Embeds texts in fixed-size chunks with all-or-nothing semantics
///
/// Any failing chunk, count mismatch, empty vector or wrong dimension
/// fails the whole call; no partial result is returned.
pub struct BatchEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl BatchEmbedder {
    /// Create a new batch embedder
    ///
    /// # Arguments
    /// * `provider` - Embedding provider
    /// * `batch_size` - Number of texts to embed in one provider call (0 is treated as 1)
    pub fn new(provider: Arc<dyn EmbeddingProvider>, batch_size: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
        }
    }

    /// Embed all texts, returning vectors in input order
    pub fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let start = std::time::Instant::now();
        let expected_dim = self.provider.dimension();

        info!(
            "Generating embeddings for {} documents ({})",
            texts.len(),
            self.provider.model_name()
        );

        let mut vectors = Vec::with_capacity(texts.len());

        for (chunk_idx, chunk) in texts.chunks(self.batch_size).enumerate() {
            let embeddings = self.provider.embed_batch(chunk)?;

            if embeddings.len() != chunk.len() {
                return Err(EmbeddingError::GenerationError(format!(
                    "Embedding count mismatch: expected {}, got {}",
                    chunk.len(),
                    embeddings.len()
                )));
            }

            for embedding in &embeddings {
                if embedding.is_empty() {
                    return Err(EmbeddingError::GenerationError(
                        "Provider returned an empty embedding".to_string(),
                    ));
                }
                if embedding.len() != expected_dim {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: expected_dim,
                        actual: embedding.len(),
                    });
                }
            }

            debug!("Embedded chunk {} ({} items)", chunk_idx, chunk.len());
            vectors.extend(embeddings);
        }

        info!(
            "Embedding complete: {} vectors in {}ms",
            vectors.len(),
            start.elapsed().as_millis()
        );

        Ok(vectors)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}
