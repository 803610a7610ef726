//! Core data models used throughout the service.
//!
//! These types represent the documents, chunks, queries, and answers that flow
//! through the ingestion and retrieval pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Lifecycle state of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Uploading,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Uploading => "uploading",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploading" => Ok(DocumentStatus::Uploading),
            "processing" => Ok(DocumentStatus::Processing),
            "completed" => Ok(DocumentStatus::Completed),
            "failed" => Ok(DocumentStatus::Failed),
            other => Err(format!("unknown document status: {}", other)),
        }
    }
}

/// Metadata record for an uploaded document.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub file_size: u64,
    pub status: DocumentStatus,
    pub page_count: usize,
    pub chunk_count: usize,
    pub upload_date: DateTime<Utc>,
    #[serde(skip)]
    pub file_path: PathBuf,
}

/// A chunk of a document's extracted text, ready for indexing.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// `"{document_id}_{chunk_index}"`.
    pub id: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

/// Metadata stored alongside every indexed chunk vector.
pub type ChunkMetadata = BTreeMap<String, serde_json::Value>;

/// One ranked result from a vector index search.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Cosine distance to the query vector (`1 - cosine similarity`).
    pub distance: f32,
}

impl SearchHit {
    pub fn document_id(&self) -> Option<&str> {
        self.metadata.get("document_id").and_then(|v| v.as_str())
    }

    pub fn filename(&self) -> Option<&str> {
        self.metadata.get("filename").and_then(|v| v.as_str())
    }

    pub fn chunk_index(&self) -> Option<usize> {
        self.metadata
            .get("chunk_index")
            .and_then(|v| v.as_u64())
            .map(|i| i as usize)
    }
}

/// A question asked against the indexed documents.
#[derive(Debug, Clone, Deserialize)]
pub struct Query {
    pub query: String,
    /// Restrict retrieval to these documents; `None` or empty searches everything.
    #[serde(default)]
    pub document_ids: Option<Vec<String>>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    5
}

impl Query {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            document_ids: None,
            top_k: default_top_k(),
        }
    }

    pub fn with_documents(mut self, ids: Vec<String>) -> Self {
        self.document_ids = Some(ids);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

/// A retrieved chunk cited in an answer.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Source {
    /// Chunk text truncated to a short preview.
    pub content: String,
    pub document_id: Option<String>,
    pub filename: Option<String>,
    pub chunk_index: Option<usize>,
}

/// Generated answer plus the sources it was drawn from, in retrieval rank order.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<Source>,
}

impl Answer {
    /// A fixed answer that cites nothing.
    pub fn canned(text: impl Into<String>) -> Self {
        Self {
            answer: text.into(),
            sources: Vec::new(),
        }
    }
}
