//! Process-wide wiring.
//!
//! [`App`] is built once at startup from a [`Config`] and owns every shared
//! component. The CLI and the HTTP server both go through it, so the
//! embedding model is loaded once and the index dimensionality check runs
//! before any request is served.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::embedding::{create_provider, DisabledProvider, EmbeddingProvider};
use crate::index::{SqliteIndex, VectorIndex};
use crate::llm::{create_generator, DisabledGenerator, Generator};
use crate::migrate::run_migrations;
use crate::rag::QueryEngine;
use crate::service::DocumentService;

pub struct App {
    pub config: Arc<Config>,
    pub pool: SqlitePool,
    pub service: DocumentService,
    pub engine: QueryEngine,
}

impl App {
    /// Connect, migrate, and build the providers named in `config`.
    pub async fn open(config: Config) -> Result<Self> {
        let embedder = create_provider(&config.embedding)?;
        let generator = create_generator(&config.generation)?;
        Self::with_providers(config, embedder, generator).await
    }

    /// Open for record management only (list, get, delete).
    ///
    /// No embedding model is loaded and no remote provider is contacted.
    /// Uploads and retrieval queries fail with the disabled-provider errors.
    pub async fn open_without_models(config: Config) -> Result<Self> {
        Self::with_providers(config, Arc::new(DisabledProvider), Arc::new(DisabledGenerator)).await
    }

    /// Like [`open`](Self::open) with caller-supplied providers.
    pub async fn with_providers(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        let pool = db::connect(&config).await?;
        run_migrations(&pool).await?;

        let index: Arc<dyn VectorIndex> = Arc::new(
            SqliteIndex::open(pool.clone(), &config.index.collection, embedder.clone())
                .await
                .with_context(|| {
                    format!(
                        "cannot open index collection '{}' with embedding model '{}'",
                        config.index.collection,
                        embedder.model_name()
                    )
                })?,
        );

        let config = Arc::new(config);
        let service = DocumentService::new(config.clone(), pool.clone(), index.clone())?;
        let engine = QueryEngine::new(embedder, index, generator);

        Ok(Self {
            config,
            pool,
            service,
            engine,
        })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
