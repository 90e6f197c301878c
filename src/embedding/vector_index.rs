/// HNSW vector index for similarity search
use hnsw_rs::filter::FilterT;
use hnsw_rs::prelude::*;
use std::sync::RwLock;
use thiserror::Error;

/// Upper bound on HNSW layers
const MAX_LAYER: usize = 16;

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("Index initialization failed: {0}")]
    InitializationError(String),

    #[error("Insert failed: {0}")]
    InsertError(String),

    #[error("Search failed: {0}")]
    SearchError(String),

    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },
}

/// Search result with slot and distance
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Slot of the vector (the store's row key)
    pub id: usize,
    /// Cosine distance (0.0 identical, up to 2.0 opposite)
    pub distance: f32,
}

struct Inner {
    hnsw: Hnsw<'static, f32, DistCosine>,
    count: usize,
    capacity: usize,
}

/// HNSW vector index wrapper
///
/// Provides approximate nearest neighbor search under cosine distance.
/// Entries are never removed individually; callers that delete or replace
/// vectors restrict searches with an allow-list of live slots and rebuild
/// the index once superseded entries pile up.
pub struct VectorIndex {
    inner: RwLock<Inner>,
    dimension: usize,
    min_capacity: usize,
    m: usize,
    ef_construction: usize,
    ef_search: usize,
}

impl VectorIndex {
    /// Create a new vector index
    ///
    /// # Arguments
    /// * `dimension` - Vector dimension (must match embedding dimension)
    /// * `m` - HNSW M parameter (number of connections per layer)
    /// * `ef_construction` - HNSW construction parameter (higher = better recall, slower build)
    /// * `ef_search` - HNSW search parameter (higher = better recall, slower search)
    /// * `max_elements` - Expected number of vectors (capacity hint)
    pub fn new(
        dimension: usize,
        m: usize,
        ef_construction: usize,
        ef_search: usize,
        max_elements: usize,
    ) -> Result<Self, VectorIndexError> {
        if dimension == 0 || m == 0 || ef_construction == 0 {
            return Err(VectorIndexError::InitializationError(format!(
                "dimension, m and ef_construction must be positive (got {}, {}, {})",
                dimension, m, ef_construction
            )));
        }

        let max_elements = max_elements.max(1);
        let hnsw = Self::build(m, max_elements, ef_construction);

        Ok(Self {
            inner: RwLock::new(Inner {
                hnsw,
                count: 0,
                capacity: max_elements,
            }),
            dimension,
            min_capacity: max_elements,
            m,
            ef_construction,
            ef_search: ef_search.max(1),
        })
    }

    fn build(m: usize, max_elements: usize, ef_construction: usize) -> Hnsw<'static, f32, DistCosine> {
        Hnsw::<f32, DistCosine>::new(m, max_elements, MAX_LAYER, ef_construction, DistCosine {})
    }

    /// Insert a vector into the index
    ///
    /// # Arguments
    /// * `id` - Slot for the vector
    /// * `vector` - Embedding vector
    pub fn insert(&self, id: usize, vector: &[f32]) -> Result<(), VectorIndexError> {
        self.check_dimension(vector)?;

        let mut inner = self
            .inner
            .write()
            .map_err(|_| VectorIndexError::InsertError("Index lock poisoned".to_string()))?;
        inner.hnsw.insert((vector, id));
        inner.count += 1;

        Ok(())
    }

    /// Insert multiple vectors in batch
    pub fn insert_batch(&self, items: &[(usize, Vec<f32>)]) -> Result<(), VectorIndexError> {
        for (id, vector) in items {
            self.insert(*id, vector)?;
        }
        Ok(())
    }

    /// Search for k nearest neighbors
    ///
    /// # Returns
    /// Results sorted by distance ascending
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>, VectorIndexError> {
        self.search_inner(query, k, None)
    }

    /// Search for k nearest neighbors among the allowed slots only
    ///
    /// `allowed` must be sorted ascending.
    pub fn search_filtered(
        &self,
        query: &[f32],
        k: usize,
        allowed: &[usize],
    ) -> Result<Vec<SearchResult>, VectorIndexError> {
        if allowed.is_empty() {
            return Ok(Vec::new());
        }
        let allow_list: Vec<usize> = allowed.to_vec();
        let filter: &dyn FilterT = &allow_list;
        self.search_inner(query, k, Some(filter))
    }

    fn search_inner(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&dyn FilterT>,
    ) -> Result<Vec<SearchResult>, VectorIndexError> {
        self.check_dimension(query)?;

        let inner = self
            .inner
            .read()
            .map_err(|_| VectorIndexError::SearchError("Index lock poisoned".to_string()))?;

        if k == 0 || inner.count == 0 {
            return Ok(Vec::new());
        }

        let ef = self.ef_search.max(k);
        let neighbours = match filter {
            Some(filter) => inner.hnsw.search_filter(query, k, ef, Some(filter)),
            None => inner.hnsw.search(query, k, ef),
        };

        let mut results: Vec<SearchResult> = neighbours
            .into_iter()
            .map(|neighbour| SearchResult {
                id: neighbour.d_id,
                distance: neighbour.distance,
            })
            .collect();
        results.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(results)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), VectorIndexError> {
        if vector.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Get the number of inserted vectors (including superseded ones)
    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.count).unwrap_or(0)
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get vector dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Capacity hint the current graph was built with
    pub fn capacity(&self) -> usize {
        self.inner
            .read()
            .map(|inner| inner.capacity)
            .unwrap_or(self.min_capacity)
    }

    /// Clear the index (remove all vectors)
    pub fn clear(&self) -> Result<(), VectorIndexError> {
        self.clear_with_capacity(self.min_capacity)
    }

    /// Clear the index and size the new graph for `expected` vectors
    ///
    /// The hint never drops below the capacity given to [`Self::new`].
    pub fn clear_with_capacity(&self, expected: usize) -> Result<(), VectorIndexError> {
        let capacity = expected.max(self.min_capacity);

        let mut inner = self
            .inner
            .write()
            .map_err(|_| VectorIndexError::InsertError("Index lock poisoned".to_string()))?;
        inner.hnsw = Self::build(self.m, capacity, self.ef_construction);
        inner.count = 0;
        inner.capacity = capacity;

        Ok(())
    }
}
