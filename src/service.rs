//! Document lifecycle manager.
//!
//! Owns the transitions of a [`Document`] from upload to deletion:
//!
//! ```text
//! validate ─▶ save file (fsync) ─▶ insert (processing) ─▶ ingest ─┬─▶ completed
//!                                                                 └─▶ failed + index cleanup
//! ```
//!
//! Deletion is best-effort across the index, the file store, and the
//! metadata record: every step is attempted and the [`DeleteReport`] says
//! which ones succeeded.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::config::Config;
use crate::documents::DocumentStore;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::ingest::Pipeline;
use crate::models::{Document, DocumentStatus};
use crate::upload::{validate_upload, FileStore};

/// Which parts of a document were removed by [`DocumentService::delete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub index_deleted: bool,
    pub file_deleted: bool,
    pub record_deleted: bool,
}

impl DeleteReport {
    pub fn is_complete(&self) -> bool {
        self.index_deleted && self.file_deleted && self.record_deleted
    }
}

pub struct DocumentService {
    config: Arc<Config>,
    store: DocumentStore,
    files: FileStore,
    pipeline: Pipeline,
}

impl DocumentService {
    pub fn new(config: Arc<Config>, pool: SqlitePool, index: Arc<dyn VectorIndex>) -> Result<Self> {
        let pipeline = Pipeline::from_config(&config, index)?;
        Ok(Self {
            store: DocumentStore::new(pool),
            files: FileStore::new(config.storage.upload_dir.clone()),
            pipeline,
            config,
        })
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        self.pipeline.index()
    }

    /// Validate, store, and ingest an uploaded file.
    ///
    /// Validation failures return an error and leave nothing behind. Once the
    /// record exists, ingestion failures mark it `failed`, remove any chunks
    /// that were written, and return the ingestion error. The same cleanup
    /// runs when the completed status cannot be recorded, for example because
    /// the record was deleted while ingestion was running.
    pub async fn upload(&self, filename: &str, bytes: &[u8]) -> Result<Document> {
        let existing = self.store.count().await?;
        validate_upload(filename, bytes.len() as u64, existing, &self.config.limits)?;

        let id = Uuid::new_v4().to_string();
        let file_path = self.files.save(&id, filename, bytes).await?;

        let mut doc = Document {
            id: id.clone(),
            filename: filename.to_string(),
            file_size: bytes.len() as u64,
            status: DocumentStatus::Processing,
            page_count: 0,
            chunk_count: 0,
            upload_date: Utc::now(),
            file_path,
        };
        if let Err(e) = self
            .store
            .insert_within_limit(&doc, self.config.limits.max_documents)
            .await
        {
            if let Err(cleanup) = self.files.remove(&doc.file_path).await {
                tracing::warn!(document_id = %id, error = %cleanup, "failed to remove stored file");
            }
            return Err(e);
        }
        tracing::info!(document_id = %id, filename, bytes = doc.file_size, "document uploaded");

        let outcome = match self.pipeline.ingest(&doc.file_path, filename, &id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(document_id = %id, error = %e, "ingestion failed");
                let page_count = match &e {
                    RagError::PageLimitExceeded { pages, .. } => *pages,
                    _ => 0,
                };
                self.discard_ingestion(&id, page_count).await;
                return Err(e);
            }
        };

        if let Err(e) = self
            .store
            .mark_completed(&id, outcome.page_count, outcome.chunk_count)
            .await
        {
            tracing::warn!(document_id = %id, error = %e, "could not record completed ingestion");
            self.discard_ingestion(&id, outcome.page_count).await;
            return Err(e);
        }

        doc.status = DocumentStatus::Completed;
        doc.page_count = outcome.page_count;
        doc.chunk_count = outcome.chunk_count;
        Ok(doc)
    }

    /// Drop the chunks of a document whose ingestion did not complete and mark
    /// its record `failed` if it still exists.
    async fn discard_ingestion(&self, id: &str, page_count: usize) {
        if let Err(e) = self.index().delete(id).await {
            tracing::warn!(document_id = %id, error = %e, "failed to remove partial index entries");
        }
        match self.store.mark_failed(id, page_count).await {
            Ok(()) | Err(RagError::NotFound { .. }) => {}
            Err(e) => {
                tracing::warn!(document_id = %id, error = %e, "failed to mark document failed");
            }
        }
    }

    pub async fn list(&self) -> Result<Vec<Document>> {
        self.store.list().await
    }

    pub async fn get(&self, id: &str) -> Result<Document> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| RagError::document_not_found(id))
    }

    /// Remove a document's index entries, stored file, and record.
    ///
    /// Returns `NotFound` if there is no record. Otherwise every step runs
    /// even if an earlier one failed.
    pub async fn delete(&self, id: &str) -> Result<DeleteReport> {
        let doc = self.get(id).await?;

        let index_deleted = match self.index().delete(id).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(document_id = %id, error = %e, "index deletion failed");
                false
            }
        };

        let file_deleted = match self.files.remove(&doc.file_path).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(document_id = %id, error = %e, "file deletion failed");
                false
            }
        };

        let record_deleted = match self.store.delete(id).await {
            Ok(deleted) => deleted,
            Err(e) => {
                tracing::warn!(document_id = %id, error = %e, "record deletion failed");
                false
            }
        };

        let report = DeleteReport {
            index_deleted,
            file_deleted,
            record_deleted,
        };
        tracing::info!(document_id = %id, ?report, "document deleted");
        Ok(report)
    }
}
