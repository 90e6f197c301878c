//! Retrieval and ranking of curated examples
//!
//! The engine embeds the query, over-fetches nearest neighbors (filtered by
//! language when one is known, falling back to an unfiltered query), scores
//! every candidate with [`relevance_score`], and returns the best `top_k`
//! that clear the relevance threshold.

mod context;
mod deduplication;
mod engine;
mod scoring;

pub use context::RagContext;
pub use deduplication::deduplicate_documents;
pub use engine::{CollectionStats, IngestReport, RetrievalEngine, STATS_SAMPLE_SIZE};
pub use scoring::{line_count, relevance_score, ScoreBreakdown, ScoringWeights};

use crate::document::DocumentMetadata;
use crate::embedding::EmbeddingError;
use crate::store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(#[from] EmbeddingError),

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid document at position {index}: {message}")]
    InvalidDocument { index: usize, message: String },

    #[error("Administrative lock poisoned")]
    Poisoned,
}

/// A retrieval request
///
/// Unset fields fall back to the engine's configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalQuery {
    pub code: String,
    pub top_k: Option<usize>,
    pub language: Option<String>,
    pub min_relevance: Option<f32>,
}

impl RetrievalQuery {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn min_relevance(mut self, min_relevance: f32) -> Self {
        self.min_relevance = Some(min_relevance);
        self
    }
}

/// A ranked example
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub id: String,
    pub code: String,
    pub explanation: String,
    pub language: String,
    pub category: String,
    pub metadata: DocumentMetadata,
    /// Composite score in [0, 1]
    pub relevance_score: f32,
    /// Raw store distance
    pub distance: f32,
}
