//! Non-persistent store with exact nearest-neighbor search

use super::{
    check_batch_lengths, check_dimensions, cosine_distance, Candidate, CollectionInfo,
    DocumentStore, MetadataFilter, StoreError,
};
use crate::document::{DocumentMetadata, StoredDocument};
use std::sync::RwLock;

struct Entry {
    id: String,
    embedding: Vec<f32>,
    code: String,
    metadata: DocumentMetadata,
}

/// In-memory store
///
/// Keeps documents in insertion order; re-upserting an id overwrites the
/// entry in place. Queries compute exact cosine distances.
pub struct InMemoryStore {
    info: CollectionInfo,
    entries: RwLock<Vec<Entry>>,
}

impl InMemoryStore {
    pub fn new(name: impl Into<String>, embedding_model: impl Into<String>, dimension: usize) -> Self {
        Self {
            info: CollectionInfo {
                name: name.into(),
                embedding_model: embedding_model.into(),
                dimension,
            },
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl DocumentStore for InMemoryStore {
    fn upsert_batch(
        &self,
        ids: &[String],
        embeddings: &[Vec<f32>],
        documents: &[String],
        metadatas: &[DocumentMetadata],
    ) -> Result<(), StoreError> {
        check_batch_lengths(ids, embeddings, documents, metadatas)?;
        check_dimensions(embeddings, self.info.dimension)?;

        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;

        for (((id, embedding), code), metadata) in
            ids.iter().zip(embeddings).zip(documents).zip(metadatas)
        {
            let entry = Entry {
                id: id.clone(),
                embedding: embedding.clone(),
                code: code.clone(),
                metadata: metadata.clone(),
            };

            match entries.iter_mut().find(|e| &e.id == id) {
                Some(existing) => *existing = entry,
                None => entries.push(entry),
            }
        }

        Ok(())
    }

    fn query(
        &self,
        embedding: &[f32],
        n_results: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Candidate>, StoreError> {
        if embedding.len() != self.info.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.info.dimension,
                actual: embedding.len(),
            });
        }

        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;

        let mut candidates: Vec<Candidate> = entries
            .iter()
            .filter(|entry| filter.map_or(true, |f| f.matches(&entry.metadata)))
            .map(|entry| Candidate {
                id: entry.id.clone(),
                code: entry.code.clone(),
                metadata: entry.metadata.clone(),
                distance: cosine_distance(embedding, &entry.embedding),
            })
            .collect();

        candidates.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(n_results);

        Ok(candidates)
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.entries.read().map_err(|_| StoreError::Poisoned)?.len())
    }

    fn get_all(&self, limit: Option<usize>) -> Result<Vec<StoredDocument>, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;

        Ok(entries
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|entry| StoredDocument {
                id: entry.id.clone(),
                code: entry.code.clone(),
                metadata: entry.metadata.clone(),
            })
            .collect())
    }

    fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        Ok(entries.len() != before)
    }

    fn reset(&self) -> Result<(), StoreError> {
        self.entries.write().map_err(|_| StoreError::Poisoned)?.clear();
        Ok(())
    }

    fn info(&self) -> CollectionInfo {
        self.info.clone()
    }
}
