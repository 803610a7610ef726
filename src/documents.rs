//! Document metadata store.
//!
//! Persists [`Document`] records in the `documents` table and applies the
//! status transitions made by the lifecycle manager in [`crate::service`].
//! Timestamps are stored as Unix milliseconds.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::{RagError, Result};
use crate::models::{Document, DocumentStatus};

const COLUMNS: &str =
    "id, filename, file_size, file_path, status, page_count, chunk_count, upload_date";

fn storage_err(e: sqlx::Error) -> RagError {
    RagError::Storage(e.to_string())
}

#[derive(Clone)]
pub struct DocumentStore {
    pool: SqlitePool,
}

impl DocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, doc: &Document) -> Result<()> {
        self.insert_within_limit(doc, usize::MAX).await
    }

    /// Insert `doc` only while fewer than `max_documents` records exist.
    ///
    /// The count and the insert are one statement, so concurrent uploads
    /// cannot both take the last slot.
    pub async fn insert_within_limit(&self, doc: &Document, max_documents: usize) -> Result<()> {
        let limit = i64::try_from(max_documents).unwrap_or(i64::MAX);
        let result = sqlx::query(
            r#"
            INSERT INTO documents
                (id, filename, file_size, file_path, status, page_count, chunk_count, upload_date)
            SELECT ?, ?, ?, ?, ?, ?, ?, ?
            WHERE (SELECT COUNT(*) FROM documents) < ?
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.filename)
        .bind(doc.file_size as i64)
        .bind(doc.file_path.to_string_lossy().into_owned())
        .bind(doc.status.as_str())
        .bind(doc.page_count as i64)
        .bind(doc.chunk_count as i64)
        .bind(doc.upload_date.timestamp_millis())
        .bind(limit)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(RagError::DocumentLimitReached(max_documents));
        }
        Ok(())
    }

    /// Record a successful ingestion.
    pub async fn mark_completed(&self, id: &str, page_count: usize, chunk_count: usize) -> Result<()> {
        self.set_status(id, DocumentStatus::Completed, page_count, chunk_count)
            .await
    }

    /// Record a failed ingestion. A failed document never reports chunks.
    pub async fn mark_failed(&self, id: &str, page_count: usize) -> Result<()> {
        self.set_status(id, DocumentStatus::Failed, page_count, 0).await
    }

    async fn set_status(
        &self,
        id: &str,
        status: DocumentStatus,
        page_count: usize,
        chunk_count: usize,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE documents SET status = ?, page_count = ?, chunk_count = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(page_count as i64)
        .bind(chunk_count as i64)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(RagError::document_not_found(id));
        }
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(&format!("SELECT {} FROM documents WHERE id = ?", COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.as_ref().map(row_to_document).transpose()
    }

    /// All documents, newest upload first.
    pub async fn list(&self) -> Result<Vec<Document>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM documents ORDER BY upload_date DESC, id ASC",
            COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        rows.iter().map(row_to_document).collect()
    }

    /// Delete the record. Returns `false` if there was nothing to delete.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(n as usize)
    }
}

fn row_to_document(row: &SqliteRow) -> Result<Document> {
    let status: String = row.get("status");
    let status = status
        .parse::<DocumentStatus>()
        .map_err(|e| RagError::Storage(format!("corrupt document record: {}", e)))?;
    let upload_ms: i64 = row.get("upload_date");
    let upload_date: DateTime<Utc> = DateTime::from_timestamp_millis(upload_ms)
        .ok_or_else(|| RagError::Storage(format!("invalid upload_date {}", upload_ms)))?;
    let file_path: String = row.get("file_path");

    Ok(Document {
        id: row.get("id"),
        filename: row.get("filename"),
        file_size: row.get::<i64, _>("file_size") as u64,
        status,
        page_count: row.get::<i64, _>("page_count") as usize,
        chunk_count: row.get::<i64, _>("chunk_count") as usize,
        upload_date,
        file_path: PathBuf::from(file_path),
    })
}
