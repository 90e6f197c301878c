//! Shared handles used by the retrieval engine

use crate::config::Config;
use crate::embedding::{build_provider, EmbeddingProvider};
use crate::error::Result;
use crate::language::{LanguageClassifier, RegexClassifier};
use crate::store::{DocumentStore, SqliteStore, SqliteStoreOptions};
use std::sync::Arc;
use tracing::info;

/// Embedder, store and classifier, created once and shared
#[derive(Clone)]
pub struct RagContext {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub store: Arc<dyn DocumentStore>,
    pub classifier: Arc<dyn LanguageClassifier>,
}

impl RagContext {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn DocumentStore>,
        classifier: Arc<dyn LanguageClassifier>,
    ) -> Self {
        Self {
            embedder,
            store,
            classifier,
        }
    }

    /// Build the configured provider, SQLite store and classifier
    ///
    /// The FastEmbed model itself is not loaded here; it loads on the first
    /// embedding request.
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedder = build_provider(&config.embedding)?;

        let options = SqliteStoreOptions {
            collection: config.storage.collection.clone(),
            embedding_model: embedder.model_name().to_string(),
            dimension: embedder.dimension(),
            hnsw_m: config.indexing.hnsw_m,
            hnsw_ef_construction: config.indexing.hnsw_ef_construction,
            hnsw_ef_search: config.indexing.hnsw_ef_search,
            exact_scan_limit: config.indexing.exact_scan_limit,
            ..SqliteStoreOptions::new("", "", 0)
        };

        let db_path = config.database_path()?;
        let store = SqliteStore::open(&db_path, options)?;
        info!("Opened document store at {}", db_path.display());

        let classifier = match config.patterns_file()? {
            Some(path) => {
                info!("Loading language definitions from {}", path.display());
                RegexClassifier::from_file(&path)?
            }
            None => RegexClassifier::builtin()?,
        };

        Ok(Self::new(embedder, Arc::new(store), Arc::new(classifier)))
    }
}
