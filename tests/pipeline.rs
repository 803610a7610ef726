//! End-to-end tests: upload → ingest → query → delete, against a real SQLite
//! database in a temp directory with deterministic test providers.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::{open_app, test_config, three_paragraphs, HashEmbedder, ScriptedGenerator};
use docqa::app::App;
use docqa::chunk::split_text;
use docqa::embedding::EmbeddingProvider;
use docqa::error::{RagError, Result};
use docqa::index::VectorIndex;
use docqa::models::{ChunkMetadata, DocumentStatus, Query, SearchHit};
use docqa::rag::NO_RESULTS_ANSWER;
use docqa::service::DocumentService;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// What [`InterferingIndex`] does after its inner index has stored the chunks.
enum AfterAdd {
    /// Delete the document record, as a concurrent DELETE would.
    DropRecord(SqlitePool),
    /// Report a write failure.
    Fail,
}

/// Wraps a real index and interferes with the upload once chunks are written.
struct InterferingIndex {
    inner: Arc<dyn VectorIndex>,
    after_add: AfterAdd,
}

#[async_trait]
impl VectorIndex for InterferingIndex {
    fn dims(&self) -> usize {
        self.inner.dims()
    }

    async fn add(
        &self,
        document_id: &str,
        chunks: &[String],
        base_metadata: &ChunkMetadata,
    ) -> Result<()> {
        self.inner.add(document_id, chunks, base_metadata).await?;
        assert!(self.inner.count(document_id).await? > 0);
        match &self.after_add {
            AfterAdd::DropRecord(pool) => {
                sqlx::query("DELETE FROM documents WHERE id = ?")
                    .bind(document_id)
                    .execute(pool)
                    .await
                    .map_err(|e| RagError::Storage(e.to_string()))?;
                Ok(())
            }
            AfterAdd::Fail => Err(RagError::IndexWrite("disk full".to_string())),
        }
    }

    async fn search(
        &self,
        query_vector: &[f32],
        document_ids: Option<&[String]>,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        self.inner.search(query_vector, document_ids, top_k).await
    }

    async fn delete(&self, document_id: &str) -> Result<()> {
        self.inner.delete(document_id).await
    }

    async fn count(&self, document_id: &str) -> Result<usize> {
        self.inner.count(document_id).await
    }
}

/// An embedder whose backend is unreachable.
struct UnreachableEmbedder;

#[async_trait]
impl EmbeddingProvider for UnreachableEmbedder {
    fn model_name(&self) -> &str {
        "unreachable"
    }

    fn dims(&self) -> usize {
        64
    }

    async fn embed_many(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(RagError::Embedding("connection refused".to_string()))
    }
}

async fn service_with(app: &App, after_add: AfterAdd) -> DocumentService {
    let index = Arc::new(InterferingIndex {
        inner: app.service.index().clone(),
        after_add,
    });
    DocumentService::new(app.config.clone(), app.pool.clone(), index).unwrap()
}

#[tokio::test]
async fn upload_then_query_finds_the_right_chunk() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let embedder = HashEmbedder::new(256);
    let generator = ScriptedGenerator::new();
    let app = open_app(config.clone(), &embedder, &generator).await;

    let text = three_paragraphs();
    assert!(text.chars().count() > 2 * config.chunking.chunk_size);

    let doc = app
        .service
        .upload("notes.txt", text.as_bytes())
        .await
        .unwrap();
    assert_eq!(doc.status, DocumentStatus::Completed);
    assert!(doc.page_count >= 1);
    assert!(doc.chunk_count >= 2);

    let stored = app.service.get(&doc.id).await.unwrap();
    assert_eq!(stored.status, DocumentStatus::Completed);
    assert_eq!(stored.chunk_count, doc.chunk_count);
    assert_eq!(
        app.service.index().count(&doc.id).await.unwrap(),
        doc.chunk_count
    );

    let phrase = "Foghorns sounded twice a minute";
    let chunks = split_text(
        &text,
        config.chunking.chunk_size,
        config.chunking.chunk_overlap,
    )
    .unwrap();
    let expected: Vec<usize> = chunks
        .iter()
        .enumerate()
        .filter(|(_, c)| c.contains(phrase))
        .map(|(i, _)| i)
        .collect();
    assert!(!expected.is_empty());

    let answer = app
        .engine
        .answer(&Query::new(phrase).with_top_k(3))
        .await
        .unwrap();
    assert_eq!(answer.answer, ScriptedGenerator::ANSWER);
    assert!(!answer.sources.is_empty());
    assert!(answer.sources.len() <= 3);
    assert!(answer
        .sources
        .iter()
        .any(|s| s.chunk_index.map_or(false, |i| expected.contains(&i))));
    for source in &answer.sources {
        assert_eq!(source.document_id.as_deref(), Some(doc.id.as_str()));
        assert_eq!(source.filename.as_deref(), Some("notes.txt"));
    }

    let prompt = generator.prompts.lock().unwrap().last().cloned().unwrap();
    assert!(prompt.contains("[1] "));
    assert!(prompt.contains(phrase));
}

#[tokio::test]
async fn oversized_document_fails_before_embedding() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(tmp.path());
    config.limits.max_pages_per_doc = 1;
    let embedder = HashEmbedder::new(64);
    let generator = ScriptedGenerator::new();
    let app = open_app(config, &embedder, &generator).await;

    // 1200 words → 2 estimated pages.
    let text = vec!["word"; 1200].join(" ");
    let err = app
        .service
        .upload("long.txt", text.as_bytes())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RagError::PageLimitExceeded { pages: 2, max: 1 }
    ));
    assert_eq!(embedder.calls(), 0);

    let docs = app.service.list().await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].status, DocumentStatus::Failed);
    assert_eq!(docs[0].chunk_count, 0);
    assert_eq!(app.service.index().count(&docs[0].id).await.unwrap(), 0);
}

#[tokio::test]
async fn corrupt_file_is_marked_failed() {
    let tmp = TempDir::new().unwrap();
    let embedder = HashEmbedder::new(64);
    let generator = ScriptedGenerator::new();
    let app = open_app(test_config(tmp.path()), &embedder, &generator).await;

    let err = app
        .service
        .upload("broken.pdf", b"this is not a pdf")
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Extraction(_)));

    let docs = app.service.list().await.unwrap();
    assert_eq!(docs[0].status, DocumentStatus::Failed);
    assert_eq!(docs[0].chunk_count, 0);
}

#[tokio::test]
async fn rejected_uploads_leave_nothing_behind() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(tmp.path());
    config.limits.max_documents = 1;
    let embedder = HashEmbedder::new(64);
    let generator = ScriptedGenerator::new();
    let app = open_app(config.clone(), &embedder, &generator).await;

    let err = app.service.upload("image.png", b"png").await.unwrap_err();
    assert!(matches!(err, RagError::UnsupportedFormat(_)));
    assert!(app.service.list().await.unwrap().is_empty());

    app.service
        .upload("one.txt", b"The only allowed document.")
        .await
        .unwrap();
    let err = app
        .service
        .upload("two.txt", b"One too many.")
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::DocumentLimitReached(1)));

    assert_eq!(app.service.list().await.unwrap().len(), 1);
    let stored = std::fs::read_dir(&config.storage.upload_dir).unwrap().count();
    assert_eq!(stored, 1);
}

#[tokio::test]
async fn small_talk_never_touches_the_index() {
    let tmp = TempDir::new().unwrap();
    let embedder = HashEmbedder::new(64);
    let generator = ScriptedGenerator::new();
    let app = open_app(test_config(tmp.path()), &embedder, &generator).await;

    let answer = app.engine.answer(&Query::new("hello")).await.unwrap();
    assert!(!answer.answer.is_empty());
    assert!(answer.sources.is_empty());
    assert_eq!(embedder.calls(), 0);
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn no_match_returns_fixed_answer() {
    let tmp = TempDir::new().unwrap();
    let embedder = HashEmbedder::new(64);
    let generator = ScriptedGenerator::new();
    let app = open_app(test_config(tmp.path()), &embedder, &generator).await;

    app.service
        .upload("notes.txt", three_paragraphs().as_bytes())
        .await
        .unwrap();

    let answer = app
        .engine
        .answer(&Query::new("glacier moraines").with_documents(vec!["not-a-document".into()]))
        .await
        .unwrap();
    assert_eq!(answer.answer, NO_RESULTS_ANSWER);
    assert!(answer.sources.is_empty());
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn delete_removes_everything_and_is_reported() {
    let tmp = TempDir::new().unwrap();
    let embedder = HashEmbedder::new(64);
    let generator = ScriptedGenerator::new();
    let app = open_app(test_config(tmp.path()), &embedder, &generator).await;

    let doc = app
        .service
        .upload("notes.txt", three_paragraphs().as_bytes())
        .await
        .unwrap();
    let file_path = app.service.get(&doc.id).await.unwrap().file_path;
    assert!(file_path.exists());

    let report = app.service.delete(&doc.id).await.unwrap();
    assert!(report.is_complete());
    assert!(!file_path.exists());
    assert_eq!(app.service.index().count(&doc.id).await.unwrap(), 0);

    let err = app.service.delete(&doc.id).await.unwrap_err();
    assert!(matches!(err, RagError::NotFound { .. }));
    // Index deletion itself stays idempotent.
    app.service.index().delete(&doc.id).await.unwrap();

    let answer = app
        .engine
        .answer(&Query::new("lighthouse keeper"))
        .await
        .unwrap();
    assert_eq!(answer.answer, NO_RESULTS_ANSWER);
}

#[tokio::test]
async fn documents_and_vectors_survive_restart() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let embedder = HashEmbedder::new(64);
    let generator = ScriptedGenerator::new();

    let app = open_app(config.clone(), &embedder, &generator).await;
    let doc = app
        .service
        .upload("notes.txt", three_paragraphs().as_bytes())
        .await
        .unwrap();
    app.close().await;

    let app = open_app(config, &embedder, &generator).await;
    assert_eq!(app.service.get(&doc.id).await.unwrap().chunk_count, doc.chunk_count);
    let answer = app
        .engine
        .answer(&Query::new("sourdough starter"))
        .await
        .unwrap();
    assert!(!answer.sources.is_empty());
}

#[tokio::test]
async fn reopening_with_a_different_embedding_size_fails() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let generator = ScriptedGenerator::new();

    let app = open_app(config.clone(), &HashEmbedder::new(64), &generator).await;
    app.close().await;

    let other = HashEmbedder::new(128);
    let err = match App::with_providers(config, other, generator).await {
        Ok(_) => panic!("expected a dimension mismatch"),
        Err(e) => e,
    };
    let mismatch = err
        .chain()
        .filter_map(|e| e.downcast_ref::<RagError>())
        .any(|e| {
            matches!(
                e,
                RagError::EmbeddingDimensionMismatch {
                    embedder: 128,
                    index: 64
                }
            )
        });
    assert!(mismatch, "unexpected error: {:#}", err);
}

#[tokio::test]
async fn record_deleted_during_ingestion_leaves_no_chunks() {
    let tmp = TempDir::new().unwrap();
    let embedder = HashEmbedder::new(64);
    let generator = ScriptedGenerator::new();
    let app = open_app(test_config(tmp.path()), &embedder, &generator).await;
    let service = service_with(&app, AfterAdd::DropRecord(app.pool.clone())).await;

    let err = service
        .upload("notes.txt", three_paragraphs().as_bytes())
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::NotFound { .. }));

    assert!(service.list().await.unwrap().is_empty());
    let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(orphans, 0);
}

#[tokio::test]
async fn index_failure_after_partial_write_marks_failed_and_cleans_up() {
    let tmp = TempDir::new().unwrap();
    let embedder = HashEmbedder::new(64);
    let generator = ScriptedGenerator::new();
    let app = open_app(test_config(tmp.path()), &embedder, &generator).await;
    let service = service_with(&app, AfterAdd::Fail).await;

    let err = service
        .upload("notes.txt", three_paragraphs().as_bytes())
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::IndexWrite(_)));

    let docs = service.list().await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].status, DocumentStatus::Failed);
    assert_eq!(docs[0].chunk_count, 0);
    assert_eq!(service.index().count(&docs[0].id).await.unwrap(), 0);
}

#[tokio::test]
async fn embedding_failure_marks_failed() {
    let tmp = TempDir::new().unwrap();
    let generator = ScriptedGenerator::new();
    let app = App::with_providers(
        test_config(tmp.path()),
        Arc::new(UnreachableEmbedder),
        generator,
    )
    .await
    .unwrap();

    let err = app
        .service
        .upload("notes.txt", three_paragraphs().as_bytes())
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Embedding(_)));

    let docs = app.service.list().await.unwrap();
    assert_eq!(docs[0].status, DocumentStatus::Failed);
    assert_eq!(docs[0].chunk_count, 0);
    assert_eq!(docs[0].page_count, 0);
    assert_eq!(app.service.index().count(&docs[0].id).await.unwrap(), 0);
}

#[tokio::test]
async fn concurrent_uploads_respect_the_document_limit() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(tmp.path());
    config.limits.max_documents = 1;
    let embedder = HashEmbedder::new(64);
    let generator = ScriptedGenerator::new();
    let app = open_app(config.clone(), &embedder, &generator).await;

    let (a, b) = tokio::join!(
        app.service.upload("a.txt", b"First document."),
        app.service.upload("b.txt", b"Second document."),
    );
    let accepted = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 1);
    let rejected = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
    assert!(matches!(rejected, RagError::DocumentLimitReached(1)));

    assert_eq!(app.service.list().await.unwrap().len(), 1);
    let stored = std::fs::read_dir(&config.storage.upload_dir).unwrap().count();
    assert_eq!(stored, 1);
}
