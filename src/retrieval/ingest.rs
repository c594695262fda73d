//! Build-or-load of the document index.

use super::embedder::Embedder;
use super::loader::load_documents;
use super::splitter::TextSplitter;
use super::store::{DocumentChunk, VectorStore};
use super::IngestError;
use crate::config::{ConfigError, IndexConfig};
use crate::error::ProviderError;

/// Texts sent to the embedding provider per request.
pub const EMBED_BATCH_SIZE: usize = 32;

/// Open the index under `config.index_dir`, populating it first if it is empty.
///
/// A populated index is returned as-is without reading documents or calling
/// the embedder. Otherwise every document under `config.docs_path` is split,
/// embedded, and written in a single transaction, so a failed run leaves the
/// index empty rather than half-built.
pub async fn build_or_load(
    config: &IndexConfig,
    embedder: &dyn Embedder,
) -> Result<VectorStore, IngestError> {
    let store = VectorStore::open_async(config.index_dir.clone()).await?;

    if let Some(indexed) = store.meta().await.embed_model {
        if indexed != config.embed_model {
            return Err(ConfigError::InvalidValue(
                "EMBED_MODEL".to_string(),
                format!(
                    "index at {} was built with {}, configured model is {}; remove the index directory to rebuild",
                    store.path().display(),
                    indexed,
                    config.embed_model
                ),
            )
            .into());
        }
    }

    let existing = store.len().await;
    if existing > 0 {
        tracing::info!(
            "Vector index already populated with {} chunks, loading from {}",
            existing,
            store.path().display()
        );
        return Ok(store);
    }

    if !config.docs_path.is_dir() {
        return Err(ConfigError::MissingPath(config.docs_path.clone()).into());
    }

    let documents = load_documents(&config.docs_path, &config.extensions)?;
    let splitter = TextSplitter::default();
    let pieces: Vec<(String, String)> = documents
        .iter()
        .flat_map(|doc| {
            splitter
                .split_text(&doc.text)
                .into_iter()
                .map(|text| (doc.source_id.clone(), text))
        })
        .collect();

    if pieces.is_empty() {
        tracing::warn!(
            "No indexable text found under {}; document search will return no results",
            config.docs_path.display()
        );
        return Ok(store);
    }

    tracing::info!(
        "Split {} documents into {} chunks, embedding...",
        documents.len(),
        pieces.len()
    );

    let mut chunks = Vec::with_capacity(pieces.len());
    for batch in pieces.chunks(EMBED_BATCH_SIZE) {
        let texts: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(ProviderError::malformed(
                "embedding",
                format!("expected {} embeddings, got {}", texts.len(), vectors.len()),
            )
            .into());
        }
        chunks.extend(
            batch
                .iter()
                .zip(vectors)
                .map(|((source_id, text), embedding)| DocumentChunk {
                    source_id: source_id.clone(),
                    text: text.clone(),
                    embedding,
                }),
        );
    }

    let inserted = store.insert_batch(&config.embed_model, chunks).await?;
    tracing::info!("Vector index built with {} chunks at {}", inserted, store.path().display());
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::KeywordEmbedder;

    fn index_config(root: &std::path::Path) -> IndexConfig {
        IndexConfig {
            index_dir: root.join("index"),
            docs_path: root.join("data"),
            extensions: vec!["txt".to_string()],
            ..IndexConfig::default()
        }
    }

    fn write_docs(root: &std::path::Path) {
        std::fs::create_dir_all(root.join("data")).unwrap();
        std::fs::write(
            root.join("data/manali.txt"),
            "Manali places to visit: Hadimba temple, Solang valley and Old Manali.",
        )
        .unwrap();
        std::fs::write(
            root.join("data/goa.txt"),
            "Goa is best visited between November and February for beaches.",
        )
        .unwrap();
    }

    #[tokio::test]
    async fn second_run_reuses_index_without_embedding() {
        let dir = tempfile::tempdir().unwrap();
        write_docs(dir.path());
        let config = index_config(dir.path());
        let embedder = KeywordEmbedder::default();

        let first = build_or_load(&config, &embedder).await.unwrap();
        let first_len = first.len().await;
        let calls_after_first = embedder.calls();
        let probe = embedder.embed("Manali places").await.unwrap();
        let first_hits = first.query(&probe, 5).await.unwrap();
        drop(first);
        assert_eq!(first_len, 2);

        let second = build_or_load(&config, &embedder).await.unwrap();
        assert_eq!(embedder.calls(), calls_after_first + 1, "only the probe embeds");
        assert_eq!(second.len().await, first_len);
        assert_eq!(second.query(&probe, 5).await.unwrap(), first_hits);
    }

    #[tokio::test]
    async fn index_built_with_another_model_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        write_docs(dir.path());
        let config = index_config(dir.path());
        let embedder = KeywordEmbedder::default();
        drop(build_or_load(&config, &embedder).await.unwrap());

        let switched = IndexConfig {
            embed_model: "text-embedding-3-large".to_string(),
            ..config
        };
        let err = build_or_load(&switched, &embedder)
            .await
            .err()
            .expect("model switch should be refused");
        assert!(matches!(
            err,
            IngestError::Config(ConfigError::InvalidValue(ref name, _)) if name == "EMBED_MODEL"
        ));
    }

    #[tokio::test]
    async fn missing_docs_directory_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = index_config(dir.path());

        let err = build_or_load(&config, &KeywordEmbedder::default())
            .await
            .err()
            .expect("ingestion should fail");
        assert!(matches!(err, IngestError::Config(ConfigError::MissingPath(_))));
    }

    #[tokio::test]
    async fn empty_docs_directory_yields_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("data")).unwrap();
        let store = build_or_load(&index_config(dir.path()), &KeywordEmbedder::default())
            .await
            .unwrap();
        assert!(store.is_empty().await);
    }
}
