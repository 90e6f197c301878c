//! Retrieval engine: ranking queries and batch ingestion

use super::{
    deduplicate_documents, relevance_score, RagContext, RetrievalError, RetrievalQuery,
    RetrievalResult, ScoringWeights,
};
use crate::config::{Config, RetrievalConfig};
use crate::document::{NewDocument, UNKNOWN_LANGUAGE};
use crate::embedding::{BatchEmbedder, EmbeddingError};
use crate::store::{Candidate, MetadataFilter};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Documents sampled for per-language statistics
pub const STATS_SAMPLE_SIZE: usize = 100;

/// Outcome of a successful batch ingestion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub ingested: usize,
    pub duplicates_skipped: usize,
    pub duration_ms: u64,
}

/// Collection summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionStats {
    pub total_documents: usize,
    /// Language counts over a sample of at most [`STATS_SAMPLE_SIZE`] documents
    pub languages: BTreeMap<String, usize>,
    pub collection_name: String,
    pub embedding_model: String,
    pub dimension: usize,
}

/// Ranks stored examples against a query and ingests new ones
///
/// Retrievals only read shared state and may run concurrently. Ingestion
/// and reset take an internal lock, so they never interleave.
pub struct RetrievalEngine {
    context: RagContext,
    config: RetrievalConfig,
    weights: ScoringWeights,
    batch: BatchEmbedder,
    admin: Mutex<()>,
}

impl RetrievalEngine {
    pub fn new(context: RagContext, config: RetrievalConfig, batch_size: usize) -> Self {
        let batch = BatchEmbedder::new(context.embedder.clone(), batch_size);
        let weights = ScoringWeights::from(&config);

        Self {
            context,
            config,
            weights,
            batch,
            admin: Mutex::new(()),
        }
    }

    /// Engine over the configured SQLite store and embedding provider
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let context = RagContext::from_config(config)?;
        Ok(Self::new(
            context,
            config.retrieval.clone(),
            config.embedding.batch_size,
        ))
    }

    pub fn context(&self) -> &RagContext {
        &self.context
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Number of candidates fetched for a request of `top_k` results
    pub fn candidate_limit(&self, top_k: usize) -> usize {
        top_k
            .saturating_mul(self.config.candidate_multiplier)
            .min(self.config.max_candidates)
    }

    pub fn detect_language(&self, code: &str) -> String {
        self.context.classifier.detect(code)
    }

    /// Retrieve the most relevant stored examples for `query`
    ///
    /// Results are sorted by descending relevance, all at or above the
    /// threshold, and at most `top_k` long. An empty collection yields an
    /// empty result without embedding the query.
    pub fn retrieve(&self, query: &RetrievalQuery) -> Result<Vec<RetrievalResult>, RetrievalError> {
        let top_k = query.top_k.unwrap_or(self.config.top_k);
        let min_relevance = query.min_relevance.unwrap_or(self.config.min_relevance);

        if top_k == 0 {
            return Err(RetrievalError::InvalidQuery(
                "top_k must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&min_relevance) {
            return Err(RetrievalError::InvalidQuery(format!(
                "min_relevance must be between 0.0 and 1.0, got {}",
                min_relevance
            )));
        }

        let store = &self.context.store;
        if store.count()? == 0 {
            warn!("Collection is empty, nothing to retrieve");
            return Ok(Vec::new());
        }

        if query.code.trim().is_empty() {
            return Err(RetrievalError::InvalidQuery(
                "Query code cannot be empty".to_string(),
            ));
        }

        let embedding = self.context.embedder.embed(&query.code)?;
        if embedding.is_empty() {
            return Err(RetrievalError::EmbeddingUnavailable(
                EmbeddingError::GenerationError("Provider returned an empty embedding".to_string()),
            ));
        }

        let language = match query.language.as_deref() {
            Some(language) if !language.is_empty() => language.to_string(),
            _ => self.detect_language(&query.code),
        };

        let n_results = self.candidate_limit(top_k);
        let filter = (language != UNKNOWN_LANGUAGE).then(|| MetadataFilter::language(&language));

        let mut candidates = store.query(&embedding, n_results, filter.as_ref())?;
        if candidates.is_empty() && filter.is_some() {
            warn!(
                "No results for language '{}', trying without filter",
                language
            );
            candidates = store.query(&embedding, n_results, None)?;
        }

        let total = candidates.len();
        let mut results: Vec<RetrievalResult> = candidates
            .into_iter()
            .map(|candidate| self.score(&query.code, &language, candidate))
            .collect();

        // Stable: equal scores keep the store's distance order
        results.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.retain(|result| result.relevance_score >= min_relevance);
        results.truncate(top_k);

        info!(
            "Retrieved {} relevant documents (from {} candidates)",
            results.len(),
            total
        );

        Ok(results)
    }

    /// [`Self::retrieve`], logging any failure and returning no results instead
    pub fn retrieve_or_empty(&self, query: &RetrievalQuery) -> Vec<RetrievalResult> {
        match self.retrieve(query) {
            Ok(results) => results,
            Err(e) => {
                error!("Error during retrieval: {}", e);
                Vec::new()
            }
        }
    }

    fn score(&self, query_code: &str, query_language: &str, candidate: Candidate) -> RetrievalResult {
        let breakdown = relevance_score(
            query_code,
            query_language,
            &candidate.code,
            &candidate.metadata.language,
            candidate.distance,
            &self.weights,
        );

        debug!(
            "Candidate {}: distance {:.4}, similarity {:.4}, language +{:.2}, length +{:.3}",
            candidate.id,
            candidate.distance,
            breakdown.similarity,
            breakdown.language_bonus,
            breakdown.length_bonus
        );

        RetrievalResult {
            id: candidate.id,
            explanation: candidate.metadata.explanation.clone(),
            language: candidate.metadata.language.clone(),
            category: candidate.metadata.category.clone(),
            code: candidate.code,
            metadata: candidate.metadata,
            relevance_score: breakdown.total,
            distance: candidate.distance,
        }
    }

    /// Embed and store a batch of documents in a single write
    ///
    /// Ids are content hashes unless supplied, so re-ingesting the same batch
    /// overwrites rather than duplicates. Within one batch the first
    /// occurrence of an id wins. Any embedding or store failure fails the
    /// whole batch with nothing written.
    pub fn add_documents_batch(
        &self,
        documents: Vec<NewDocument>,
    ) -> Result<IngestReport, RetrievalError> {
        let start = Instant::now();
        let _guard = self.admin.lock().map_err(|_| RetrievalError::Poisoned)?;

        if let Some(index) = documents.iter().position(|d| d.code.trim().is_empty()) {
            return Err(RetrievalError::InvalidDocument {
                index,
                message: "code cannot be empty".to_string(),
            });
        }

        let resolved: Vec<(String, NewDocument)> = documents
            .into_iter()
            .map(|document| (document.resolved_id(), document))
            .collect();
        let (unique, duplicates_skipped) = deduplicate_documents(resolved);

        if duplicates_skipped > 0 {
            warn!("Skipped {} documents with duplicate ids", duplicates_skipped);
        }

        let mut ids = Vec::with_capacity(unique.len());
        let mut codes = Vec::with_capacity(unique.len());
        let mut metadatas = Vec::with_capacity(unique.len());

        for (id, document) in unique {
            let mut metadata = document.metadata;
            if !document.explanation.is_empty() {
                metadata.explanation = document.explanation;
            }
            ids.push(id);
            codes.push(document.code);
            metadatas.push(metadata);
        }

        if !ids.is_empty() {
            let embeddings = self.batch.embed_all(&codes)?;
            self.context
                .store
                .upsert_batch(&ids, &embeddings, &codes, &metadatas)?;
        }

        let report = IngestReport {
            ingested: ids.len(),
            duplicates_skipped,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Ingested {} documents into '{}' in {}ms",
            report.ingested,
            self.context.store.info().name,
            report.duration_ms
        );

        Ok(report)
    }

    /// Ingest one document, returning its id
    pub fn add_document(&self, document: NewDocument) -> Result<String, RetrievalError> {
        let id = document.resolved_id();
        self.add_documents_batch(vec![document])?;
        Ok(id)
    }

    /// Delete every document and recreate the collection
    pub fn reset_collection(&self) -> Result<(), RetrievalError> {
        let _guard = self.admin.lock().map_err(|_| RetrievalError::Poisoned)?;
        self.context.store.reset()?;
        info!("Collection '{}' reset", self.context.store.info().name);
        Ok(())
    }

    pub fn collection_stats(&self) -> Result<CollectionStats, RetrievalError> {
        let store = &self.context.store;
        let total_documents = store.count()?;

        let mut languages = BTreeMap::new();
        if total_documents > 0 {
            let sample = store.get_all(Some(total_documents.min(STATS_SAMPLE_SIZE)))?;
            for document in sample {
                *languages.entry(document.metadata.language).or_insert(0) += 1;
            }
        }

        let info = store.info();
        Ok(CollectionStats {
            total_documents,
            languages,
            collection_name: info.name,
            embedding_model: info.embedding_model,
            dimension: info.dimension,
        })
    }
}
