//! Vector index over document chunks.
//!
//! The [`VectorIndex`] trait is the seam between the pipeline and the vector
//! store. Implementations embed chunks with the shared
//! [`EmbeddingProvider`](crate::embedding::EmbeddingProvider), store each
//! vector with its raw text and metadata, and answer cosine-distance searches
//! optionally restricted to a set of documents.
//!
//! | Implementation | Persistence |
//! |---|---|
//! | [`SqliteIndex`] | Named collection in the SQLite database; survives restarts |
//! | [`InMemoryIndex`] | Process memory only; tests and embedding in other programs |
//!
//! Entry keys are `"{document_id}_{chunk_index}"` and every entry's metadata
//! is the caller's base mapping plus `chunk_index`.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::chunk::make_chunks;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::models::{ChunkMetadata, SearchHit};

pub use memory::InMemoryIndex;
pub use sqlite::SqliteIndex;

/// The only similarity metric an index collection is created with.
pub const METRIC_COSINE: &str = "cosine";

/// Abstract vector index.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`add`](VectorIndex::add) | Embed and store all chunks of one document |
/// | [`search`](VectorIndex::search) | Ranked cosine-distance search with optional document filter |
/// | [`delete`](VectorIndex::delete) | Remove every chunk of a document (idempotent) |
/// | [`count`](VectorIndex::count) | Number of chunks stored for a document |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Dimensionality of the stored vectors.
    fn dims(&self) -> usize;

    /// Embed `chunks` and store them as the complete chunk set of `document_id`,
    /// replacing any entries the document already had.
    async fn add(
        &self,
        document_id: &str,
        chunks: &[String],
        base_metadata: &ChunkMetadata,
    ) -> Result<()>;

    /// Return up to `top_k` hits ordered by ascending cosine distance.
    ///
    /// A non-empty `document_ids` restricts results to those documents; `None`
    /// or an empty slice searches the whole index.
    async fn search(
        &self,
        query_vector: &[f32],
        document_ids: Option<&[String]>,
        top_k: usize,
    ) -> Result<Vec<SearchHit>>;

    /// Remove every chunk of `document_id`. Deleting an unknown id is a no-op.
    async fn delete(&self, document_id: &str) -> Result<()>;

    /// Number of chunks currently stored for `document_id`.
    async fn count(&self, document_id: &str) -> Result<usize>;
}

/// One chunk ready to be written to an index.
#[derive(Debug, Clone)]
pub(crate) struct IndexEntry {
    pub id: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub text_hash: String,
    pub metadata: ChunkMetadata,
    pub vector: Vec<f32>,
}

/// Embed `chunks` and attach ids and per-chunk metadata.
pub(crate) async fn prepare_entries(
    embedder: &dyn EmbeddingProvider,
    dims: usize,
    document_id: &str,
    chunks: &[String],
    base_metadata: &ChunkMetadata,
) -> Result<Vec<IndexEntry>> {
    if chunks.is_empty() {
        return Ok(Vec::new());
    }
    let vectors = embedder.embed_many(chunks).await?;
    if vectors.len() != chunks.len() {
        return Err(RagError::IndexWrite(format!(
            "embedder returned {} vectors for {} chunks",
            vectors.len(),
            chunks.len()
        )));
    }

    make_chunks(document_id, chunks)
        .into_iter()
        .zip(vectors)
        .map(|(chunk, vector)| {
            if vector.len() != dims {
                return Err(RagError::EmbeddingDimensionMismatch {
                    embedder: vector.len(),
                    index: dims,
                });
            }
            let mut metadata = base_metadata.clone();
            metadata.insert(
                "chunk_index".to_string(),
                serde_json::Value::from(chunk.chunk_index),
            );
            Ok(IndexEntry {
                id: chunk.id,
                document_id: chunk.document_id,
                chunk_index: chunk.chunk_index,
                text: chunk.text,
                text_hash: chunk.hash,
                metadata,
                vector,
            })
        })
        .collect()
}

/// Normalise the caller's restriction: an empty set means "no restriction".
pub(crate) fn restriction(document_ids: Option<&[String]>) -> Option<&[String]> {
    document_ids.filter(|ids| !ids.is_empty())
}

pub(crate) fn check_top_k(top_k: usize) -> Result<()> {
    if top_k == 0 {
        return Err(RagError::InvalidQuery("top_k must be at least 1".to_string()));
    }
    Ok(())
}

/// Sort scored hits by ascending distance (ties broken by entry id) and keep `top_k`.
pub(crate) fn rank(mut scored: Vec<(String, SearchHit)>, top_k: usize) -> Vec<SearchHit> {
    scored.sort_by(|(id_a, a), (id_b, b)| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| id_a.cmp(id_b))
    });
    scored.truncate(top_k);
    scored.into_iter().map(|(_, hit)| hit).collect()
}

/// Base metadata for a document's chunks: `{document_id, filename}`.
pub fn base_metadata(document_id: &str, filename: &str) -> ChunkMetadata {
    let mut metadata = ChunkMetadata::new();
    metadata.insert("document_id".to_string(), document_id.into());
    metadata.insert("filename".to_string(), filename.into());
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(distance: f32) -> SearchHit {
        SearchHit {
            text: String::new(),
            metadata: ChunkMetadata::new(),
            distance,
        }
    }

    #[test]
    fn rank_orders_by_ascending_distance() {
        let scored = vec![
            ("c".to_string(), hit(0.7)),
            ("a".to_string(), hit(0.1)),
            ("b".to_string(), hit(0.4)),
        ];
        let ranked = rank(scored, 2);
        let distances: Vec<f32> = ranked.iter().map(|h| h.distance).collect();
        assert_eq!(distances, vec![0.1, 0.4]);
    }

    #[test]
    fn rank_breaks_ties_by_id() {
        let mut first = hit(0.5);
        first.text = "first".into();
        let mut second = hit(0.5);
        second.text = "second".into();
        let ranked = rank(
            vec![("doc_1".to_string(), second), ("doc_0".to_string(), first)],
            10,
        );
        assert_eq!(ranked[0].text, "first");
    }

    #[test]
    fn empty_restriction_means_everything() {
        let empty: Vec<String> = Vec::new();
        assert!(restriction(Some(&empty)).is_none());
        assert!(restriction(None).is_none());
        let ids = vec!["a".to_string()];
        assert_eq!(restriction(Some(&ids)).unwrap().len(), 1);
    }

    #[test]
    fn zero_top_k_is_rejected() {
        assert!(matches!(check_top_k(0), Err(RagError::InvalidQuery(_))));
        assert!(check_top_k(1).is_ok());
    }

    #[test]
    fn base_metadata_has_document_fields() {
        let metadata = base_metadata("doc-1", "a.txt");
        assert_eq!(metadata["document_id"], "doc-1");
        assert_eq!(metadata["filename"], "a.txt");
    }
}
