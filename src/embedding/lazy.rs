//! Deferred provider construction
//!
//! The wrapped provider is built on first use and then shared for the
//! lifetime of the wrapper. A failed build is not remembered: the error is
//! returned to that caller and the next call starts initialization again.

use super::{EmbeddingError, EmbeddingProvider};
use std::sync::{Arc, Mutex};

type ProviderFactory =
    Box<dyn Fn() -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> + Send + Sync>;

pub struct LazyProvider {
    model_name: String,
    dimension: usize,
    factory: ProviderFactory,
    inner: Mutex<Option<Arc<dyn EmbeddingProvider>>>,
}

impl LazyProvider {
    /// Create a lazy provider
    ///
    /// `model_name` and `dimension` are reported before the model loads and
    /// are checked against the real provider once it does.
    pub fn new<F>(model_name: impl Into<String>, dimension: usize, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> + Send + Sync + 'static,
    {
        Self {
            model_name: model_name.into(),
            dimension,
            factory: Box::new(factory),
            inner: Mutex::new(None),
        }
    }

    /// Whether the underlying provider has been constructed
    pub fn is_loaded(&self) -> bool {
        self.inner.lock().map(|inner| inner.is_some()).unwrap_or(false)
    }

    /// Get the loaded provider, constructing it if necessary
    ///
    /// Concurrent first calls wait on the same lock, so the model is only
    /// built once.
    fn provider(&self) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
        let mut inner = self.inner.lock().map_err(|_| {
            EmbeddingError::InitializationError("Provider lock poisoned".to_string())
        })?;

        if let Some(provider) = inner.as_ref() {
            return Ok(Arc::clone(provider));
        }

        let provider = (self.factory)()?;
        if provider.dimension() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: provider.dimension(),
            });
        }

        *inner = Some(Arc::clone(&provider));
        Ok(provider)
    }
}

impl EmbeddingProvider for LazyProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.provider()?.embed(text)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.provider()?.embed_batch(texts)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_loads_once() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);
        let lazy = LazyProvider::new("hash-16", 16, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(HashEmbedder::new(16)?) as Arc<dyn EmbeddingProvider>)
        });

        assert!(!lazy.is_loaded());
        assert_eq!(builds.load(Ordering::SeqCst), 0);

        lazy.embed("a").unwrap();
        lazy.embed("b").unwrap();

        assert!(lazy.is_loaded());
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_init_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let lazy = LazyProvider::new("hash-16", 16, move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(EmbeddingError::InitializationError("offline".to_string()))
            } else {
                Ok(Arc::new(HashEmbedder::new(16)?) as Arc<dyn EmbeddingProvider>)
            }
        });

        assert!(lazy.embed("x").is_err());
        assert!(!lazy.is_loaded());

        assert_eq!(lazy.embed("x").unwrap().len(), 16);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dimension_checked_on_load() {
        let lazy = LazyProvider::new("hash-32", 32, || {
            Ok(Arc::new(HashEmbedder::new(16)?) as Arc<dyn EmbeddingProvider>)
        });

        assert!(matches!(
            lazy.embed("x"),
            Err(EmbeddingError::DimensionMismatch {
                expected: 32,
                actual: 16
            })
        ));
        assert!(!lazy.is_loaded());
    }
}
