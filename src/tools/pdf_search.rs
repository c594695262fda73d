//! Document search over the vector index.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Tool, PDF_SEARCH};
use crate::retrieval::{Embedder, VectorStore};

/// Returned when the index has nothing to offer for a query.
pub const NO_DOCUMENTS_FOUND: &str = "No relevant documents found in the PDF database.";

/// Retrieves the nearest chunks for a query and returns their text.
pub struct PdfSearch {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl PdfSearch {
    pub fn new(store: Arc<VectorStore>, embedder: Arc<dyn Embedder>, top_k: usize) -> Self {
        Self {
            store,
            embedder,
            top_k,
        }
    }

    /// Top-k chunk texts joined by blank lines, or the sentinel.
    pub async fn search(&self, query: &str) -> anyhow::Result<String> {
        let vector = self.embedder.embed(query).await?;
        let hits = self.store.query(&vector, self.top_k).await?;

        if hits.is_empty() {
            return Ok(NO_DOCUMENTS_FOUND.to_string());
        }

        Ok(hits
            .into_iter()
            .map(|hit| hit.text)
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

#[async_trait]
impl Tool for PdfSearch {
    fn name(&self) -> &str {
        PDF_SEARCH
    }

    fn description(&self) -> &str {
        "Search travel documents to answer user questions."
    }

    fn source_label(&self) -> &str {
        "PDF Documents"
    }

    async fn execute(&self, query: &str) -> anyhow::Result<String> {
        self.search(query).await
    }
}
