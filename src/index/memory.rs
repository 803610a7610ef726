//! In-memory [`VectorIndex`] implementation.
//!
//! Entries live in a `Vec` behind `std::sync::RwLock`. Search is brute-force
//! cosine distance over all stored vectors.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::embedding::{cosine_distance, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::models::{ChunkMetadata, SearchHit};

use super::{check_top_k, prepare_entries, rank, restriction, IndexEntry, VectorIndex};

/// Non-persistent index for tests and short-lived processes.
pub struct InMemoryIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    entries: RwLock<Vec<IndexEntry>>,
}

impl InMemoryIndex {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Total number of stored chunks across all documents.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> RagError {
    RagError::IndexWrite("in-memory index lock poisoned".to_string())
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn dims(&self) -> usize {
        self.embedder.dims()
    }

    async fn add(
        &self,
        document_id: &str,
        chunks: &[String],
        base_metadata: &ChunkMetadata,
    ) -> Result<()> {
        let new_entries = prepare_entries(
            self.embedder.as_ref(),
            self.dims(),
            document_id,
            chunks,
            base_metadata,
        )
        .await?;

        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.retain(|e| e.document_id != document_id);
        entries.extend(new_entries);
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        document_ids: Option<&[String]>,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        check_top_k(top_k)?;
        let allowed = restriction(document_ids);
        let entries = self
            .entries
            .read()
            .map_err(|_| RagError::IndexSearch("in-memory index lock poisoned".to_string()))?;

        let scored: Vec<(String, SearchHit)> = entries
            .iter()
            .filter(|e| allowed.map_or(true, |ids| ids.contains(&e.document_id)))
            .map(|e| {
                (
                    e.id.clone(),
                    SearchHit {
                        text: e.text.clone(),
                        metadata: e.metadata.clone(),
                        distance: cosine_distance(query_vector, &e.vector),
                    },
                )
            })
            .collect();

        Ok(rank(scored, top_k))
    }

    async fn delete(&self, document_id: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.retain(|e| e.document_id != document_id);
        Ok(())
    }

    async fn count(&self, document_id: &str) -> Result<usize> {
        let entries = self
            .entries
            .read()
            .map_err(|_| RagError::IndexSearch("in-memory index lock poisoned".to_string()))?;
        Ok(entries.iter().filter(|e| e.document_id == document_id).count())
    }
}
