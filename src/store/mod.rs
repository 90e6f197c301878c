//! Document store contract and implementations
//!
//! A store persists (id, embedding, code, metadata) tuples for one named
//! collection and answers nearest-neighbor queries under cosine distance.

mod memory;
mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::{SqliteStore, SqliteStoreOptions};

use crate::document::{DocumentMetadata, StoredDocument};
use crate::embedding::VectorIndexError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Vector index error: {0}")]
    Index(#[from] VectorIndexError),

    #[error("Batch arrays differ in length: {ids} ids, {embeddings} embeddings, {documents} documents, {metadatas} metadatas")]
    LengthMismatch {
        ids: usize,
        embeddings: usize,
        documents: usize,
        metadatas: usize,
    },

    #[error("Dimension mismatch: collection uses {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Collection '{collection}' was built with model '{stored}', not '{requested}'")]
    ModelMismatch {
        collection: String,
        stored: String,
        requested: String,
    },

    #[error("Corrupt record {id}: {message}")]
    Corrupt { id: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Equality filter over stored metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    pub language: Option<String>,
    pub category: Option<String>,
}

impl MetadataFilter {
    pub fn language(language: impl Into<String>) -> Self {
        Self {
            language: Some(language.into()),
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn matches(&self, metadata: &DocumentMetadata) -> bool {
        self.language
            .as_ref()
            .map_or(true, |language| &metadata.language == language)
            && self
                .category
                .as_ref()
                .map_or(true, |category| &metadata.category == category)
    }
}

/// A query hit before scoring
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: String,
    pub code: String,
    pub metadata: DocumentMetadata,
    /// Cosine distance to the query (larger = less similar)
    pub distance: f32,
}

/// Collection description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub embedding_model: String,
    pub dimension: usize,
}

/// Vector database contract used by the retrieval engine
///
/// Implementations must be safe for concurrent reads. Writes (`upsert_batch`,
/// `delete`, `reset`) are expected to be serialized by the caller.
pub trait DocumentStore: Send + Sync {
    /// Insert or overwrite documents; the four slices are applied positionally
    fn upsert_batch(
        &self,
        ids: &[String],
        embeddings: &[Vec<f32>],
        documents: &[String],
        metadatas: &[DocumentMetadata],
    ) -> Result<(), StoreError>;

    /// Insert or overwrite a single document
    fn upsert(
        &self,
        id: &str,
        embedding: &[f32],
        document: &str,
        metadata: &DocumentMetadata,
    ) -> Result<(), StoreError> {
        self.upsert_batch(
            &[id.to_string()],
            &[embedding.to_vec()],
            &[document.to_string()],
            std::slice::from_ref(metadata),
        )
    }

    /// Nearest neighbors sorted by distance ascending
    ///
    /// A filter that matches nothing yields an empty result, not an error.
    fn query(
        &self,
        embedding: &[f32],
        n_results: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Candidate>, StoreError>;

    /// Number of documents in the collection
    fn count(&self) -> Result<usize, StoreError>;

    /// Enumerate documents in insertion order
    fn get_all(&self, limit: Option<usize>) -> Result<Vec<StoredDocument>, StoreError>;

    /// Delete one document; returns whether it existed
    fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// Delete the collection and recreate it empty
    fn reset(&self) -> Result<(), StoreError>;

    fn info(&self) -> CollectionInfo;
}

/// Check that the parallel batch arrays line up
pub(crate) fn check_batch_lengths(
    ids: &[String],
    embeddings: &[Vec<f32>],
    documents: &[String],
    metadatas: &[DocumentMetadata],
) -> Result<(), StoreError> {
    let n = ids.len();
    if embeddings.len() != n || documents.len() != n || metadatas.len() != n {
        return Err(StoreError::LengthMismatch {
            ids: n,
            embeddings: embeddings.len(),
            documents: documents.len(),
            metadatas: metadatas.len(),
        });
    }
    Ok(())
}

pub(crate) fn check_dimensions(
    embeddings: &[Vec<f32>],
    dimension: usize,
) -> Result<(), StoreError> {
    match embeddings.iter().find(|e| e.len() != dimension) {
        Some(bad) => Err(StoreError::DimensionMismatch {
            expected: dimension,
            actual: bad.len(),
        }),
        None => Ok(()),
    }
}

/// Cosine distance `1 - cos(a, b)`; zero vectors are maximally distant from everything
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    1.0 - dot / (norm_a * norm_b)
}
