mod batch;
mod hashing;
mod lazy;
/// Embedding generation and vector indexing
///
/// Architecture:
/// - EmbeddingProvider trait for abstraction
/// - FastEmbedProvider for local embedding (all-MiniLM-L6-v2, 384-dim)
/// - HashEmbedder for model-free deterministic embedding
/// - LazyProvider to defer model loading to first use
/// - HNSW for approximate nearest neighbor search
mod provider;
mod vector_index;

pub use batch::BatchEmbedder;
pub use hashing::HashEmbedder;
pub use lazy::LazyProvider;
pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};
pub use vector_index::{SearchResult, VectorIndex, VectorIndexError};

use crate::config::EmbeddingConfig;
use std::sync::Arc;

/// Provider names accepted in `embedding.provider`
pub const PROVIDER_FASTEMBED: &str = "fastembed";
pub const PROVIDER_HASH: &str = "hash";

/// Build the configured embedding provider
///
/// FastEmbed models are wrapped in a [`LazyProvider`], so nothing is
/// downloaded or loaded until the first embedding is requested.
pub fn build_provider(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    match config.provider.as_str() {
        PROVIDER_FASTEMBED => {
            let dimension = FastEmbedProvider::dimension_for(&config.model).ok_or_else(|| {
                EmbeddingError::InitializationError(format!(
                    "Unsupported model: {}",
                    config.model
                ))
            })?;
            let model = config.model.clone();
            let lazy = LazyProvider::new(config.model.clone(), dimension, move || {
                let provider = FastEmbedProvider::new(&model)?;
                Ok(Arc::new(provider) as Arc<dyn EmbeddingProvider>)
            });
            Ok(Arc::new(lazy))
        }
        PROVIDER_HASH => Ok(Arc::new(HashEmbedder::new(config.dimension)?)),
        other => Err(EmbeddingError::InitializationError(format!(
            "Unknown embedding provider: {}. Supported: {}, {}",
            other, PROVIDER_FASTEMBED, PROVIDER_HASH
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_hash_provider() {
        let config = EmbeddingConfig {
            provider: PROVIDER_HASH.to_string(),
            model: "ignored".to_string(),
            dimension: 64,
            batch_size: 8,
        };

        let provider = build_provider(&config).unwrap();
        assert_eq!(provider.dimension(), 64);
        assert_eq!(provider.embed("fn main() {}").unwrap().len(), 64);
    }

    #[test]
    fn test_build_fastembed_is_lazy() {
        // Constructing the provider must not load (or download) the model
        let config = EmbeddingConfig::default();
        let provider = build_provider(&config).unwrap();

        assert_eq!(provider.dimension(), 384);
        assert_eq!(provider.model_name(), "all-MiniLM-L6-v2");
    }

    #[test]
    fn test_build_unknown_provider() {
        let config = EmbeddingConfig {
            provider: "openai".to_string(),
            ..EmbeddingConfig::default()
        };

        assert!(build_provider(&config).is_err());
    }
}
