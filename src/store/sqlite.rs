//! SQLite-backed persistent store with an HNSW index rebuilt on open
//!
//! Rows live in `documents`, one per (collection, id). Every write gets a
//! fresh AUTOINCREMENT `slot`, and the HNSW index is keyed by slot. A replaced
//! or deleted row leaves its old slot in the index; queries only accept
//! slots that still exist in SQL, so stale entries are never returned. Once
//! the index holds more than [`STALE_INDEX_RATIO`] times the live rows it is
//! rebuilt from the table.

use super::{
    check_batch_lengths, check_dimensions, cosine_distance, Candidate, CollectionInfo,
    DocumentStore, MetadataFilter, StoreError,
};
use crate::document::{DocumentMetadata, StoredDocument};
use crate::embedding::VectorIndex;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Smallest HNSW capacity hint; the index is resized from the row count on rebuild
const MIN_INDEX_CAPACITY: usize = 1024;

/// Index entries allowed per live row before the index is rebuilt
pub const STALE_INDEX_RATIO: usize = 2;

/// Tuning and identity of an opened collection
#[derive(Debug, Clone)]
pub struct SqliteStoreOptions {
    pub collection: String,
    pub embedding_model: String,
    pub dimension: usize,
    pub hnsw_m: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_ef_search: usize,
    /// Queries whose allow-list is at most this large are answered by exact scan
    pub exact_scan_limit: usize,
    pub pool_size: u32,
}

impl SqliteStoreOptions {
    pub fn new(
        collection: impl Into<String>,
        embedding_model: impl Into<String>,
        dimension: usize,
    ) -> Self {
        Self {
            collection: collection.into(),
            embedding_model: embedding_model.into(),
            dimension,
            hnsw_m: 16,
            hnsw_ef_construction: 200,
            hnsw_ef_search: 64,
            exact_scan_limit: 1024,
            pool_size: 8,
        }
    }
}

/// Persistent document store
pub struct SqliteStore {
    pool: DbPool,
    options: SqliteStoreOptions,
    index: VectorIndex,
    path: PathBuf,
}

impl SqliteStore {
    /// Open (or create) the database and the configured collection
    pub fn open(db_path: &Path, options: SqliteStoreOptions) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA foreign_keys = ON;
                PRAGMA busy_timeout = 5000;
                ",
            )
        });

        let pool = Pool::builder()
            .max_size(options.pool_size.max(1))
            .build(manager)
            .map_err(|e| StoreError::Pool(format!("Failed to create connection pool: {}", e)))?;

        {
            let conn = pool
                .get()
                .map_err(|e| StoreError::Pool(format!("Failed to get connection: {}", e)))?;

            // WAL allows readers while a batch is being written
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                ",
            )?;
        }

        let index = VectorIndex::new(
            options.dimension,
            options.hnsw_m,
            options.hnsw_ef_construction,
            options.hnsw_ef_search,
            MIN_INDEX_CAPACITY,
        )?;

        let store = Self {
            pool,
            options,
            index,
            path: db_path.to_path_buf(),
        };

        store.migrate()?;
        store.ensure_collection()?;
        store.rebuild_index()?;

        Ok(store)
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StoreError> {
        self.pool
            .get()
            .map_err(|e| StoreError::Pool(format!("Failed to get connection: {}", e)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run database migrations
    fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i64 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations",
            [],
            |row| row.get(0),
        )?;

        for (version, migration) in MIGRATIONS.iter().enumerate() {
            let version = version as i64 + 1;

            if version > current_version {
                info!("Applying migration {}", version);

                conn.execute_batch(migration)?;
                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }

    /// Create the collection record, or check an existing one matches
    fn ensure_collection(&self) -> Result<(), StoreError> {
        let conn = self.get_conn()?;

        let existing: Option<(String, i64)> = conn
            .query_row(
                "SELECT embedding_model, dimension FROM collections WHERE name = ?1",
                params![self.options.collection],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match existing {
            Some((model, _)) if model != self.options.embedding_model => {
                Err(StoreError::ModelMismatch {
                    collection: self.options.collection.clone(),
                    stored: model,
                    requested: self.options.embedding_model.clone(),
                })
            }
            Some((_, dimension)) if dimension as usize != self.options.dimension => {
                Err(StoreError::DimensionMismatch {
                    expected: dimension as usize,
                    actual: self.options.dimension,
                })
            }
            Some(_) => Ok(()),
            None => {
                self.insert_collection(&conn)?;
                info!(
                    "Created collection '{}' ({}, {}D)",
                    self.options.collection, self.options.embedding_model, self.options.dimension
                );
                Ok(())
            }
        }
    }

    fn insert_collection(&self, conn: &Connection) -> Result<(), StoreError> {
        conn.execute(
            "INSERT INTO collections (name, embedding_model, dimension, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                self.options.collection,
                self.options.embedding_model,
                self.options.dimension as i64,
                chrono::Utc::now().timestamp()
            ],
        )?;
        Ok(())
    }

    /// Load every live vector of the collection into the HNSW index
    fn rebuild_index(&self) -> Result<(), StoreError> {
        let live = self.count()?;
        self.index.clear_with_capacity(live)?;

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT slot, id, embedding FROM documents WHERE collection = ?1 ORDER BY slot",
        )?;
        let rows = stmt.query_map(params![self.options.collection], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Vec<u8>>(2)?,
            ))
        })?;

        let mut loaded = 0usize;
        for row in rows {
            let (slot, id, blob) = row?;
            let vector = decode_vector(&blob, &id)?;
            self.index.insert(slot as usize, &vector)?;
            loaded += 1;
        }

        debug!(
            "Loaded {} vectors for collection '{}'",
            loaded, self.options.collection
        );
        Ok(())
    }

    /// Rebuild the index when superseded entries outnumber the allowed ratio
    fn compact_index(&self) -> Result<(), StoreError> {
        let live = self.count()?;
        let indexed = self.index.len();

        if indexed > STALE_INDEX_RATIO * live.max(1) {
            debug!(
                "Rebuilding index for '{}': {} entries for {} live rows",
                self.options.collection, indexed, live
            );
            self.rebuild_index()?;
        }
        Ok(())
    }

    /// WHERE clause (with positional values) selecting the filtered collection rows
    fn where_clause(&self, filter: Option<&MetadataFilter>) -> (String, Vec<String>) {
        let mut clause = String::from("collection = ?");
        let mut values = vec![self.options.collection.clone()];

        if let Some(filter) = filter {
            if let Some(language) = &filter.language {
                clause.push_str(" AND language = ?");
                values.push(language.clone());
            }
            if let Some(category) = &filter.category {
                clause.push_str(" AND category = ?");
                values.push(category.clone());
            }
        }

        (clause, values)
    }

    fn exact_scan(
        &self,
        conn: &Connection,
        clause: &str,
        values: &[String],
        embedding: &[f32],
        n_results: usize,
    ) -> Result<Vec<(usize, f32)>, StoreError> {
        let sql = format!(
            "SELECT slot, id, embedding FROM documents WHERE {} ORDER BY slot",
            clause
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Vec<u8>>(2)?,
            ))
        })?;

        let mut hits = Vec::new();
        for row in rows {
            let (slot, id, blob) = row?;
            let vector = decode_vector(&blob, &id)?;
            hits.push((slot as usize, cosine_distance(embedding, &vector)));
        }

        hits.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(n_results);
        Ok(hits)
    }

    fn index_scan(
        &self,
        conn: &Connection,
        clause: &str,
        values: &[String],
        embedding: &[f32],
        n_results: usize,
    ) -> Result<Vec<(usize, f32)>, StoreError> {
        let sql = format!("SELECT slot FROM documents WHERE {} ORDER BY slot", clause);
        let mut stmt = conn.prepare(&sql)?;
        let allowed = stmt
            .query_map(params_from_iter(values.iter()), |row| row.get::<_, i64>(0))?
            .map(|slot| slot.map(|s| s as usize))
            .collect::<Result<Vec<usize>, _>>()?;

        let hits = self
            .index
            .search_filtered(embedding, n_results, &allowed)?
            .into_iter()
            .map(|hit| (hit.id, hit.distance))
            .collect();
        Ok(hits)
    }

    fn hydrate(
        &self,
        conn: &Connection,
        hits: Vec<(usize, f32)>,
    ) -> Result<Vec<Candidate>, StoreError> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM documents WHERE slot = ?1",
            DOCUMENT_COLUMNS
        ))?;

        let mut candidates = Vec::with_capacity(hits.len());
        for (slot, distance) in hits {
            let row = stmt
                .query_row(params![slot as i64], read_document_row)
                .optional()?;

            // Row replaced between the slot lookup and hydration
            let Some(row) = row else { continue };
            let document = row.into_document()?;

            candidates.push(Candidate {
                id: document.id,
                code: document.code,
                metadata: document.metadata,
                distance,
            });
        }

        Ok(candidates)
    }
}

impl DocumentStore for SqliteStore {
    fn upsert_batch(
        &self,
        ids: &[String],
        embeddings: &[Vec<f32>],
        documents: &[String],
        metadatas: &[DocumentMetadata],
    ) -> Result<(), StoreError> {
        check_batch_lengths(ids, embeddings, documents, metadatas)?;
        check_dimensions(embeddings, self.options.dimension)?;

        if ids.is_empty() {
            return Ok(());
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().timestamp();
        let mut written = Vec::with_capacity(ids.len());

        {
            let mut delete =
                tx.prepare_cached("DELETE FROM documents WHERE collection = ?1 AND id = ?2")?;
            let mut insert = tx.prepare_cached(
                "INSERT INTO documents
                    (collection, id, code, language, category, subcategory, difficulty,
                     explanation, extra, embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;

            for (position, ((id, embedding), (code, metadata))) in ids
                .iter()
                .zip(embeddings)
                .zip(documents.iter().zip(metadatas))
                .enumerate()
            {
                let extra = encode_extra(&metadata.extra, id)?;

                delete.execute(params![self.options.collection, id])?;
                insert.execute(params![
                    self.options.collection,
                    id,
                    code,
                    metadata.language,
                    metadata.category,
                    metadata.subcategory,
                    metadata.difficulty,
                    metadata.explanation,
                    extra,
                    encode_vector(embedding),
                    now
                ])?;

                written.push((tx.last_insert_rowid() as usize, position));
            }
        }

        tx.commit()?;
        drop(conn);

        for (slot, position) in written {
            self.index.insert(slot, &embeddings[position])?;
        }
        self.compact_index()?;

        debug!(
            "Upserted {} documents into '{}'",
            ids.len(),
            self.options.collection
        );
        Ok(())
    }

    fn query(
        &self,
        embedding: &[f32],
        n_results: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Candidate>, StoreError> {
        if embedding.len() != self.options.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.options.dimension,
                actual: embedding.len(),
            });
        }
        if n_results == 0 {
            return Ok(Vec::new());
        }

        let conn = self.get_conn()?;
        let (clause, values) = self.where_clause(filter);

        let matching: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM documents WHERE {}", clause),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        if matching == 0 {
            return Ok(Vec::new());
        }

        let hits = if matching as usize <= self.options.exact_scan_limit {
            self.exact_scan(&conn, &clause, &values, embedding, n_results)?
        } else {
            self.index_scan(&conn, &clause, &values, embedding, n_results)?
        };

        self.hydrate(&conn, hits)
    }

    fn count(&self) -> Result<usize, StoreError> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![self.options.collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn get_all(&self, limit: Option<usize>) -> Result<Vec<StoredDocument>, StoreError> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM documents WHERE collection = ?1 ORDER BY slot LIMIT ?2",
            DOCUMENT_COLUMNS
        ))?;

        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows = stmt.query_map(params![self.options.collection, limit], read_document_row)?;

        let mut documents = Vec::new();
        for row in rows {
            documents.push(row?.into_document()?);
        }
        Ok(documents)
    }

    fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let conn = self.get_conn()?;
        let removed = conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![self.options.collection, id],
        )?;
        drop(conn);

        if removed > 0 {
            self.compact_index()?;
        }
        Ok(removed > 0)
    }

    fn reset(&self) -> Result<(), StoreError> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM documents WHERE collection = ?1",
            params![self.options.collection],
        )?;
        tx.execute(
            "DELETE FROM collections WHERE name = ?1",
            params![self.options.collection],
        )?;
        self.insert_collection(&tx)?;
        tx.commit()?;

        self.index.clear()?;

        info!("Collection '{}' reset", self.options.collection);
        Ok(())
    }

    fn info(&self) -> CollectionInfo {
        CollectionInfo {
            name: self.options.collection.clone(),
            embedding_model: self.options.embedding_model.clone(),
            dimension: self.options.dimension,
        }
    }
}

const DOCUMENT_COLUMNS: &str =
    "id, code, language, category, subcategory, difficulty, explanation, extra";

/// Raw document columns, decoded outside the rusqlite row callback
struct DocumentRow {
    id: String,
    code: String,
    language: String,
    category: String,
    subcategory: String,
    difficulty: String,
    explanation: String,
    extra: Option<String>,
}

fn read_document_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok(DocumentRow {
        id: row.get(0)?,
        code: row.get(1)?,
        language: row.get(2)?,
        category: row.get(3)?,
        subcategory: row.get(4)?,
        difficulty: row.get(5)?,
        explanation: row.get(6)?,
        extra: row.get(7)?,
    })
}

impl DocumentRow {
    fn into_document(self) -> Result<StoredDocument, StoreError> {
        let extra: BTreeMap<String, Value> = match self.extra.as_deref() {
            None | Some("") => BTreeMap::new(),
            Some(json) => serde_json::from_str(json).map_err(|e| StoreError::Corrupt {
                id: self.id.clone(),
                message: format!("invalid extra metadata: {}", e),
            })?,
        };

        Ok(StoredDocument {
            id: self.id,
            code: self.code,
            metadata: DocumentMetadata {
                language: self.language,
                category: self.category,
                subcategory: self.subcategory,
                difficulty: self.difficulty,
                explanation: self.explanation,
                extra,
            },
        })
    }
}

fn encode_extra(extra: &BTreeMap<String, Value>, id: &str) -> Result<Option<String>, StoreError> {
    if extra.is_empty() {
        return Ok(None);
    }
    serde_json::to_string(extra)
        .map(Some)
        .map_err(|e| StoreError::Corrupt {
            id: id.to_string(),
            message: format!("cannot serialize extra metadata: {}", e),
        })
}

/// Little-endian f32 encoding
fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8], id: &str) -> Result<Vec<f32>, StoreError> {
    if bytes.len() % 4 != 0 {
        return Err(StoreError::Corrupt {
            id: id.to_string(),
            message: format!("embedding blob of {} bytes is not f32-aligned", bytes.len()),
        });
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Database migrations (each string is one migration)
const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    -- Collections table (one embedding model + dimension per collection)
    CREATE TABLE collections (
        name TEXT PRIMARY KEY,
        embedding_model TEXT NOT NULL,
        dimension INTEGER NOT NULL,
        created_at INTEGER NOT NULL
    );

    -- Documents table (slot is never reused)
    CREATE TABLE documents (
        slot INTEGER PRIMARY KEY AUTOINCREMENT,
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        code TEXT NOT NULL,
        language TEXT NOT NULL,
        category TEXT NOT NULL,
        subcategory TEXT NOT NULL,
        difficulty TEXT NOT NULL,
        explanation TEXT NOT NULL,
        extra TEXT,  -- JSON metadata
        embedding BLOB NOT NULL,
        created_at INTEGER NOT NULL,
        UNIQUE (collection, id),
        FOREIGN KEY (collection) REFERENCES collections(name) ON DELETE CASCADE
    );

    CREATE INDEX idx_documents_language ON documents(collection, language);
    CREATE INDEX idx_documents_category ON documents(collection, category);
    "#,
];
