//! Persistent nearest-neighbour index over document chunks.
//!
//! Chunks live in `<dir>/index.sqlite3` and are mirrored in memory on open.
//! Queries are an exhaustive cosine scan over the in-memory copy. A `meta`
//! table records the embedding model and dimension the index was built with,
//! since vectors from different models are not comparable.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use tokio::sync::RwLock;

use super::embedder::{bytes_to_embedding, cosine_similarity, embedding_to_bytes};

const INDEX_FILE: &str = "index.sqlite3";

const META_EMBED_MODEL: &str = "embed_model";
const META_DIMENSION: &str = "embedding_dimension";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("index database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("index directory error: {0}")]
    Io(#[from] std::io::Error),

    #[error("embedding dimension mismatch: index holds {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index was built with embedding model {indexed}, not {requested}")]
    ModelMismatch { indexed: String, requested: String },

    #[error("embedding contains NaN or infinite values")]
    NonFiniteEmbedding,

    #[error("index task failed: {0}")]
    Task(String),
}

/// A piece of a source document together with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub source_id: String,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// A query hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub source_id: String,
    pub text: String,
    pub score: f32,
}

/// Embedding model and vector dimension an index was built with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexMeta {
    pub embed_model: Option<String>,
    pub dimension: Option<usize>,
}

struct Contents {
    meta: IndexMeta,
    chunks: Vec<DocumentChunk>,
}

pub struct VectorStore {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
    contents: RwLock<Contents>,
}

impl VectorStore {
    /// Open (or create) the index stored under `dir`.
    ///
    /// Blocking; async callers should run it on the blocking pool.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(INDEX_FILE);
        let conn = Connection::open(&path)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_id TEXT NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL
            );
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;

        let chunks = {
            let mut stmt =
                conn.prepare("SELECT source_id, text, embedding FROM chunks ORDER BY id")?;
            let rows = stmt.query_map([], |row| {
                Ok(DocumentChunk {
                    source_id: row.get(0)?,
                    text: row.get(1)?,
                    embedding: bytes_to_embedding(&row.get::<_, Vec<u8>>(2)?),
                })
            })?;
            let loaded = rows.collect::<Result<Vec<_>, _>>()?;
            loaded
        };

        let embed_model = read_meta(&conn, META_EMBED_MODEL)?;
        let dimension = read_meta(&conn, META_DIMENSION)?
            .and_then(|v| v.parse().ok())
            .or_else(|| chunks.first().map(|c| c.embedding.len()));

        tracing::debug!(
            "Opened vector index {} with {} chunks (model: {:?})",
            path.display(),
            chunks.len(),
            embed_model
        );

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
            contents: RwLock::new(Contents {
                meta: IndexMeta {
                    embed_model,
                    dimension,
                },
                chunks,
            }),
        })
    }

    /// [`VectorStore::open`] on the blocking pool.
    pub async fn open_async(dir: PathBuf) -> Result<Self, StoreError> {
        tokio::task::spawn_blocking(move || Self::open(&dir))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn meta(&self) -> IndexMeta {
        self.contents.read().await.meta.clone()
    }

    pub async fn len(&self) -> usize {
        self.contents.read().await.chunks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.contents.read().await.chunks.is_empty()
    }

    pub async fn insert(&self, embed_model: &str, chunk: DocumentChunk) -> Result<(), StoreError> {
        self.insert_batch(embed_model, vec![chunk]).await.map(|_| ())
    }

    /// Persist chunks embedded with `embed_model` in one transaction, then
    /// make them queryable.
    pub async fn insert_batch(
        &self,
        embed_model: &str,
        batch: Vec<DocumentChunk>,
    ) -> Result<usize, StoreError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut contents = self.contents.write().await;

        if let Some(indexed) = contents.meta.embed_model.as_deref() {
            if indexed != embed_model {
                return Err(StoreError::ModelMismatch {
                    indexed: indexed.to_string(),
                    requested: embed_model.to_string(),
                });
            }
        }

        let expected = contents
            .meta
            .dimension
            .or_else(|| batch.first().map(|c| c.embedding.len()))
            .unwrap_or_default();
        for chunk in &batch {
            if chunk.embedding.len() != expected {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: chunk.embedding.len(),
                });
            }
            if chunk.embedding.iter().any(|v| !v.is_finite()) {
                return Err(StoreError::NonFiniteEmbedding);
            }
        }

        let rows: Vec<(String, String, Vec<u8>)> = batch
            .iter()
            .map(|c| {
                (
                    c.source_id.clone(),
                    c.text.clone(),
                    embedding_to_bytes(&c.embedding),
                )
            })
            .collect();
        let conn = Arc::clone(&self.conn);
        let model = embed_model.to_string();

        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let mut conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO chunks (source_id, text, embedding) VALUES (?1, ?2, ?3)",
                )?;
                for (source_id, text, embedding) in &rows {
                    stmt.execute(params![source_id, text, embedding])?;
                }
                let mut meta =
                    tx.prepare_cached("INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)")?;
                meta.execute(params![META_EMBED_MODEL, model])?;
                meta.execute(params![META_DIMENSION, expected.to_string()])?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))??;

        let inserted = batch.len();
        contents.meta.embed_model = Some(embed_model.to_string());
        contents.meta.dimension = Some(expected);
        contents.chunks.extend(batch);
        Ok(inserted)
    }

    /// Return the `k` chunks most similar to `vector`, best first.
    ///
    /// Equal scores keep insertion order. A vector whose length differs from
    /// the index dimension is rejected.
    pub async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, StoreError> {
        let contents = self.contents.read().await;

        if let Some(expected) = contents.meta.dimension {
            if !contents.chunks.is_empty() && vector.len() != expected {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }

        let mut scored: Vec<(f32, &DocumentChunk)> = contents
            .chunks
            .iter()
            .map(|chunk| (cosine_similarity(vector, &chunk.embedding), chunk))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, chunk)| ScoredChunk {
                source_id: chunk.source_id.clone(),
                text: chunk.text.clone(),
                score,
            })
            .collect())
    }
}

fn read_meta(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| {
        row.get(0)
    })
    .optional()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = "test-embed";

    fn chunk(text: &str, embedding: Vec<f32>) -> DocumentChunk {
        DocumentChunk {
            source_id: format!("{text}.txt"),
            text: text.to_string(),
            embedding,
        }
    }

    #[tokio::test]
    async fn inserted_vector_ranks_first_for_itself() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(dir.path()).unwrap();
        store
            .insert_batch(
                MODEL,
                vec![
                    chunk("manali", vec![1.0, 0.0, 0.0]),
                    chunk("goa", vec![0.0, 1.0, 0.0]),
                    chunk("dubai", vec![0.6, 0.8, 0.0]),
                ],
            )
            .await
            .unwrap();

        let hits = store.query(&[0.0, 1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "goa");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].text, "dubai");
    }

    #[tokio::test]
    async fn chunks_and_meta_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = VectorStore::open(dir.path()).unwrap();
            store.insert(MODEL, chunk("manali", vec![1.0, 0.0])).await.unwrap();
            store.insert(MODEL, chunk("goa", vec![0.0, 1.0])).await.unwrap();
        }

        let reopened = VectorStore::open_async(dir.path().to_path_buf()).await.unwrap();
        assert_eq!(reopened.len().await, 2);
        assert_eq!(
            reopened.meta().await,
            IndexMeta {
                embed_model: Some(MODEL.to_string()),
                dimension: Some(2),
            }
        );
        let hits = reopened.query(&[1.0, 0.0], 5).await.unwrap();
        assert_eq!(hits[0].text, "manali");
        assert_eq!(hits[0].source_id, "manali.txt");
    }

    #[tokio::test]
    async fn mismatched_dimensions_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(dir.path()).unwrap();
        store.insert(MODEL, chunk("manali", vec![1.0, 0.0])).await.unwrap();

        let err = store
            .insert(MODEL, chunk("goa", vec![1.0, 0.0, 0.0]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn query_with_wrong_dimension_fails_instead_of_ranking() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(dir.path()).unwrap();
        store
            .insert_batch(
                MODEL,
                vec![
                    chunk("goa beaches", vec![1.0, 0.0]),
                    chunk("manali temple", vec![0.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let err = store.query(&[0.0, 1.0, 0.0], 5).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn chunks_from_another_model_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(dir.path()).unwrap();
        store.insert(MODEL, chunk("manali", vec![1.0, 0.0])).await.unwrap();

        let err = store
            .insert("other-embed", chunk("goa", vec![0.0, 1.0]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ModelMismatch { .. }));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn empty_store_returns_no_hits() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(dir.path()).unwrap();
        assert!(store.is_empty().await);
        assert_eq!(store.meta().await, IndexMeta::default());
        assert!(store.query(&[1.0], 5).await.unwrap().is_empty());
    }
}
