//! Error taxonomy for the ingestion and query pipeline.
//!
//! Every failure the core can produce maps to one [`RagError`] variant.
//! Each variant has a stable machine-readable [`code`](RagError::code) used by
//! the HTTP layer; the `Display` text is the short human-readable description
//! shown to users. Internal backtraces are never part of either.

/// Convenience alias used throughout the core modules.
pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("text extraction failed: {0}")]
    Extraction(String),

    #[error("document has {pages} pages, exceeding the limit of {max}")]
    PageLimitExceeded { pages: usize, max: usize },

    #[error("invalid chunk configuration: {0}")]
    InvalidChunkConfig(String),

    #[error("embedding dimension mismatch: embedder produces {embedder}, index expects {index}")]
    EmbeddingDimensionMismatch { embedder: usize, index: usize },

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("vector index write failed: {0}")]
    IndexWrite(String),

    #[error("vector index search failed: {0}")]
    IndexSearch(String),

    #[error("answer generation failed: {0}")]
    Generation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("file size {size} bytes exceeds the {max_mb}MB limit")]
    FileTooLarge { size: u64, max_mb: u64 },

    #[error("maximum of {0} documents reached")]
    DocumentLimitReached(usize),

    #[error("file storage error: {0}")]
    Storage(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl RagError {
    /// Machine-readable error code, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            RagError::UnsupportedFormat(_) => "unsupported_format",
            RagError::Extraction(_) => "extraction_error",
            RagError::PageLimitExceeded { .. } => "page_limit_exceeded",
            RagError::InvalidChunkConfig(_) => "invalid_chunk_config",
            RagError::EmbeddingDimensionMismatch { .. } => "embedding_dimension_mismatch",
            RagError::Embedding(_) => "embedding_error",
            RagError::IndexWrite(_) => "index_write_error",
            RagError::IndexSearch(_) => "index_search_error",
            RagError::Generation(_) => "generation_error",
            RagError::NotFound { .. } => "not_found",
            RagError::FileTooLarge { .. } => "file_too_large",
            RagError::DocumentLimitReached(_) => "document_limit_reached",
            RagError::Storage(_) => "storage_error",
            RagError::InvalidQuery(_) => "invalid_query",
        }
    }

    /// Whether the error is caused by the request rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RagError::UnsupportedFormat(_)
                | RagError::PageLimitExceeded { .. }
                | RagError::FileTooLarge { .. }
                | RagError::DocumentLimitReached(_)
                | RagError::InvalidQuery(_)
                | RagError::NotFound { .. }
        )
    }

    pub(crate) fn document_not_found(id: &str) -> Self {
        RagError::NotFound {
            kind: "document",
            id: id.to_string(),
        }
    }
}
