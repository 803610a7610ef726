//! Ingestion pipeline orchestration.
//!
//! Runs one uploaded file through extraction → page-limit check → chunking →
//! embedding + indexing. The pipeline does not retry and does not touch the
//! document store; it reports either the resulting counts or the first error,
//! and the caller records the status transition.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::chunk::TextSplitter;
use crate::config::Config;
use crate::error::{RagError, Result};
use crate::extract::{self, FileKind};
use crate::index::{base_metadata, VectorIndex};

/// Counts produced by a successful ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOutcome {
    pub page_count: usize,
    pub chunk_count: usize,
}

pub struct Pipeline {
    splitter: TextSplitter,
    index: Arc<dyn VectorIndex>,
    max_pages: usize,
}

impl Pipeline {
    pub fn new(splitter: TextSplitter, index: Arc<dyn VectorIndex>, max_pages: usize) -> Self {
        Self {
            splitter,
            index,
            max_pages,
        }
    }

    pub fn from_config(config: &Config, index: Arc<dyn VectorIndex>) -> Result<Self> {
        Ok(Self::new(
            TextSplitter::from_config(&config.chunking)?,
            index,
            config.limits.max_pages_per_doc,
        ))
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Ingest the file at `file_path` as `document_id`.
    ///
    /// The declared type comes from `filename`'s extension. A document whose
    /// page count exceeds the limit fails with `PageLimitExceeded` before any
    /// chunk is embedded.
    pub async fn ingest(
        &self,
        file_path: &Path,
        filename: &str,
        document_id: &str,
    ) -> Result<IngestOutcome> {
        let started = Instant::now();
        let kind = FileKind::from_filename(filename)?;

        // PDF and DOCX parsing is CPU-bound.
        let path = file_path.to_path_buf();
        let max_pages = self.max_pages;
        let extracted =
            tokio::task::spawn_blocking(move || extract::extract_with_limit(&path, kind, max_pages))
                .await
                .map_err(|e| RagError::Extraction(format!("extraction task failed: {}", e)))??;

        let chunks = self.splitter.split(&extracted.text);
        tracing::debug!(
            document_id,
            pages = extracted.page_count,
            chunks = chunks.len(),
            "extracted and split document"
        );

        self.index
            .add(document_id, &chunks, &base_metadata(document_id, filename))
            .await?;

        tracing::info!(
            document_id,
            filename,
            pages = extracted.page_count,
            chunks = chunks.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "ingested document"
        );

        Ok(IngestOutcome {
            page_count: extracted.page_count,
            chunk_count: chunks.len(),
        })
    }
}
