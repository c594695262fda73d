//! Document retrieval: embedding, chunking, indexing, and the ingestion pipeline.
//!
//! Ingestion runs once before serving. At request time only
//! [`VectorStore::query`] and [`Embedder::embed`] are used.

mod embedder;
mod ingest;
mod loader;
mod splitter;
mod store;

use thiserror::Error;

use crate::config::ConfigError;
use crate::error::ProviderError;

pub use embedder::{cosine_similarity, normalize, Embedder, OpenAiEmbedder};
pub use ingest::{build_or_load, EMBED_BATCH_SIZE};
pub use loader::{load_documents, SourceDocument};
pub use splitter::{TextSplitter, CHUNK_OVERLAP, CHUNK_SIZE};
pub use store::{DocumentChunk, IndexMeta, ScoredChunk, StoreError, VectorStore};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to read documents: {0}")]
    Io(String),

    #[error("failed to extract PDF text: {0}")]
    Pdf(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
