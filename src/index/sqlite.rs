//! SQLite-backed [`VectorIndex`] implementation.
//!
//! Vectors are stored as little-endian f32 BLOBs in `chunk_vectors`, keyed by
//! `(collection, id)`. The `collections` table records each collection's
//! dimensionality and metric when it is first created; reopening a collection
//! with an embedder of a different dimensionality fails immediately with
//! [`RagError::EmbeddingDimensionMismatch`].
//!
//! Search loads the candidate vectors for the collection (filtered by
//! document in SQL) and ranks them by cosine distance in Rust.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_distance, vec_to_blob, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::models::{ChunkMetadata, SearchHit};

use super::{check_top_k, prepare_entries, rank, restriction, VectorIndex, METRIC_COSINE};

/// Persistent vector index stored in the service's SQLite database.
pub struct SqliteIndex {
    pool: SqlitePool,
    collection: String,
    dims: usize,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SqliteIndex {
    /// Open (or create) the named collection.
    ///
    /// A new collection takes the embedder's dimensionality. An existing one
    /// must match it. A disabled embedder (0 dims) never creates a collection.
    pub async fn open(
        pool: SqlitePool,
        collection: &str,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let existing = sqlx::query("SELECT dims, metric FROM collections WHERE name = ?")
            .bind(collection)
            .fetch_optional(&pool)
            .await
            .map_err(|e| RagError::IndexWrite(e.to_string()))?;

        let dims = match existing {
            Some(row) => {
                let dims = row.get::<i64, _>("dims") as usize;
                let metric: String = row.get("metric");
                if metric != METRIC_COSINE {
                    return Err(RagError::IndexWrite(format!(
                        "collection '{}' uses metric '{}', expected '{}'",
                        collection, metric, METRIC_COSINE
                    )));
                }
                if embedder.dims() != 0 && embedder.dims() != dims {
                    return Err(RagError::EmbeddingDimensionMismatch {
                        embedder: embedder.dims(),
                        index: dims,
                    });
                }
                dims
            }
            None if embedder.dims() == 0 => 0,
            None => {
                sqlx::query(
                    "INSERT INTO collections (name, dims, metric, created_at) VALUES (?, ?, ?, ?)",
                )
                .bind(collection)
                .bind(embedder.dims() as i64)
                .bind(METRIC_COSINE)
                .bind(chrono::Utc::now().timestamp())
                .execute(&pool)
                .await
                .map_err(|e| RagError::IndexWrite(e.to_string()))?;
                tracing::info!(collection, dims = embedder.dims(), "created vector collection");
                embedder.dims()
            }
        };

        Ok(Self {
            pool,
            collection: collection.to_string(),
            dims,
            embedder,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    fn dims(&self) -> usize {
        self.dims
    }

    async fn add(
        &self,
        document_id: &str,
        chunks: &[String],
        base_metadata: &ChunkMetadata,
    ) -> Result<()> {
        let entries = prepare_entries(
            self.embedder.as_ref(),
            self.dims,
            document_id,
            chunks,
            base_metadata,
        )
        .await?;

        let write_err = |e: sqlx::Error| RagError::IndexWrite(e.to_string());
        let mut tx = self.pool.begin().await.map_err(write_err)?;

        sqlx::query("DELETE FROM chunk_vectors WHERE collection = ? AND document_id = ?")
            .bind(&self.collection)
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;

        for entry in &entries {
            let metadata_json = serde_json::to_string(&entry.metadata)
                .map_err(|e| RagError::IndexWrite(e.to_string()))?;
            sqlx::query(
                r#"
                INSERT INTO chunk_vectors
                    (collection, id, document_id, chunk_index, text, text_hash, metadata_json, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&self.collection)
            .bind(&entry.id)
            .bind(&entry.document_id)
            .bind(entry.chunk_index as i64)
            .bind(&entry.text)
            .bind(&entry.text_hash)
            .bind(&metadata_json)
            .bind(vec_to_blob(&entry.vector))
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        }

        tx.commit().await.map_err(write_err)?;
        tracing::debug!(
            collection = %self.collection,
            document_id,
            chunks = entries.len(),
            "indexed document chunks"
        );
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        document_ids: Option<&[String]>,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        check_top_k(top_k)?;
        if self.dims != 0 && query_vector.len() != self.dims {
            return Err(RagError::EmbeddingDimensionMismatch {
                embedder: query_vector.len(),
                index: self.dims,
            });
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, text, metadata_json, embedding FROM chunk_vectors WHERE collection = ",
        );
        qb.push_bind(self.collection.clone());
        if let Some(ids) = restriction(document_ids) {
            qb.push(" AND document_id IN (");
            let mut separated = qb.separated(", ");
            for id in ids {
                separated.push_bind(id.clone());
            }
            separated.push_unseparated(")");
        }

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RagError::IndexSearch(e.to_string()))?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let metadata_json: String = row.get("metadata_json");
            let metadata: ChunkMetadata = serde_json::from_str(&metadata_json)
                .map_err(|e| RagError::IndexSearch(format!("corrupt chunk metadata: {}", e)))?;
            scored.push((
                row.get::<String, _>("id"),
                SearchHit {
                    text: row.get("text"),
                    metadata,
                    distance: cosine_distance(query_vector, &blob_to_vec(&blob)),
                },
            ));
        }

        Ok(rank(scored, top_k))
    }

    async fn delete(&self, document_id: &str) -> Result<()> {
        let result =
            sqlx::query("DELETE FROM chunk_vectors WHERE collection = ? AND document_id = ?")
                .bind(&self.collection)
                .bind(document_id)
                .execute(&self.pool)
                .await
                .map_err(|e| RagError::IndexWrite(e.to_string()))?;
        tracing::debug!(
            collection = %self.collection,
            document_id,
            removed = result.rows_affected(),
            "deleted document chunks"
        );
        Ok(())
    }

    async fn count(&self, document_id: &str) -> Result<usize> {
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM chunk_vectors WHERE collection = ? AND document_id = ?",
        )
        .bind(&self.collection)
        .bind(document_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RagError::IndexSearch(e.to_string()))?;
        Ok(n as usize)
    }
}
