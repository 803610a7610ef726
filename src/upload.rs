//! Upload constraints and the on-disk file store.
//!
//! Uploaded bytes are written to `{upload_dir}/{document_id}{ext}` and synced
//! to disk before the call returns, so ingestion never reads a partially
//! written file.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::config::LimitsConfig;
use crate::error::{RagError, Result};
use crate::extract::FileKind;

/// Check an upload against the configured limits before anything is stored.
///
/// Checks run in order: file extension, byte size, then the total document
/// count (`existing_documents` is the number already registered).
pub fn validate_upload(
    filename: &str,
    size: u64,
    existing_documents: usize,
    limits: &LimitsConfig,
) -> Result<FileKind> {
    let kind = FileKind::from_filename(filename)?;

    let max_bytes = limits.max_file_size_mb * 1024 * 1024;
    if size > max_bytes {
        return Err(RagError::FileTooLarge {
            size,
            max_mb: limits.max_file_size_mb,
        });
    }

    if existing_documents >= limits.max_documents {
        return Err(RagError::DocumentLimitReached(limits.max_documents));
    }

    Ok(kind)
}

/// Lower-cased extension of `filename` including the dot, e.g. `".pdf"`.
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Directory of uploaded files.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, document_id: &str, filename: &str) -> PathBuf {
        self.root
            .join(format!("{}{}", document_id, extension_of(filename)))
    }

    /// Write `bytes` for `document_id` and fsync them. Returns the stored path.
    pub async fn save(&self, document_id: &str, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| RagError::Storage(format!("{}: {}", self.root.display(), e)))?;

        let path = self.path_for(document_id, filename);
        let io_err = |e: std::io::Error| RagError::Storage(format!("{}: {}", path.display(), e));

        let mut file = tokio::fs::File::create(&path).await.map_err(io_err)?;
        file.write_all(bytes).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;
        file.sync_all().await.map_err(io_err)?;

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "stored upload");
        Ok(path)
    }

    /// Remove a stored file. Returns `false` if it was already gone.
    pub async fn remove(&self, path: &Path) -> Result<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(RagError::Storage(format!("{}: {}", path.display(), e))),
        }
    }
}
