//! TOML configuration.
//!
//! A single [`Config`] is loaded once at startup and handed to each component
//! constructor. Nothing in the core reads configuration from globals.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
        }
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./data/uploads")
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
        }
    }
}

fn default_collection() -> String {
    "documents".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
    #[serde(default = "default_max_documents")]
    pub max_documents: usize,
    #[serde(default = "default_max_pages")]
    pub max_pages_per_doc: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: default_max_file_size_mb(),
            max_documents: default_max_documents(),
            max_pages_per_doc: default_max_pages(),
        }
    }
}

fn default_max_file_size_mb() -> u64 {
    50
}
fn default_max_documents() -> usize {
    20
}
fn default_max_pages() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_embedding_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_embedding_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: default_generation_model(),
            temperature: default_temperature(),
            timeout_secs: default_generation_timeout(),
            url: None,
        }
    }
}

fn default_generation_provider() -> String {
    "disabled".to_string()
}
fn default_generation_model() -> String {
    "gemini-2.0-flash-exp".to_string()
}
fn default_temperature() -> f32 {
    0.4
}
fn default_generation_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

/// Inclusive bounds on `top_k` accepted from callers.
pub const TOP_K_RANGE: std::ops::RangeInclusive<usize> = 1..=10;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

impl Config {
    /// A configuration with every section at its default, rooted at `data_dir`.
    ///
    /// Used by tests and by embedders of the library that build their
    /// configuration in code instead of TOML.
    pub fn with_data_dir(data_dir: &Path) -> Self {
        Self {
            db: DbConfig {
                path: data_dir.join("docqa.sqlite"),
            },
            storage: StorageConfig {
                upload_dir: data_dir.join("uploads"),
            },
            index: IndexConfig::default(),
            chunking: ChunkingConfig::default(),
            limits: LimitsConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            retrieval: RetrievalConfig::default(),
            server: ServerConfig::default(),
        }
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.limits.max_file_size_mb * 1024 * 1024
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!(
            "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.chunk_overlap,
            config.chunking.chunk_size
        );
    }

    // Validate limits
    if config.limits.max_documents == 0 {
        anyhow::bail!("limits.max_documents must be >= 1");
    }
    if config.limits.max_pages_per_doc == 0 {
        anyhow::bail!("limits.max_pages_per_doc must be >= 1");
    }

    // Validate retrieval
    if !TOP_K_RANGE.contains(&config.retrieval.default_top_k) {
        anyhow::bail!("retrieval.default_top_k must be in [1, 10]");
    }

    if config.index.collection.trim().is_empty() {
        anyhow::bail!("index.collection must not be empty");
    }

    // Validate embedding
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be >= 1");
    }
    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, local, openai, or ollama.",
            other
        ),
    }

    match config.generation.provider.as_str() {
        "disabled" | "gemini" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled, gemini, openai, or ollama.",
            other
        ),
    }

    if !(0.0..=2.0).contains(&config.generation.temperature) {
        anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = parse("[db]\npath = \"/tmp/docqa.sqlite\"\n").unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.limits.max_file_size_mb, 50);
        assert_eq!(config.limits.max_documents, 20);
        assert_eq!(config.limits.max_pages_per_doc, 1000);
        assert_eq!(config.index.collection, "documents");
        assert_eq!(config.retrieval.default_top_k, 5);
        assert!(!config.embedding.is_enabled());
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let err = parse(
            "[db]\npath = \"x.sqlite\"\n[chunking]\nchunk_size = 100\nchunk_overlap = 100\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn remote_embedding_requires_dims_and_model() {
        let err = parse("[db]\npath = \"x.sqlite\"\n[embedding]\nprovider = \"openai\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let err = parse("[db]\npath = \"x.sqlite\"\n[embedding]\nbatch_size = 0\n")
            .unwrap_err();
        assert!(err.to_string().contains("embedding.batch_size"));
    }

    #[test]
    fn unknown_generation_provider_is_rejected() {
        let err = parse("[db]\npath = \"x.sqlite\"\n[generation]\nprovider = \"bard\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("Unknown generation provider"));
    }

    #[test]
    fn top_k_out_of_range_is_rejected() {
        let err = parse("[db]\npath = \"x.sqlite\"\n[retrieval]\ndefault_top_k = 11\n")
            .unwrap_err();
        assert!(err.to_string().contains("default_top_k"));
    }

    #[test]
    fn example_config_is_valid() {
        let config = parse(include_str!("../config/docqa.example.toml")).unwrap();
        assert_eq!(config.embedding.provider, "local");
        assert_eq!(config.generation.provider, "gemini");
        assert_eq!(config.server.bind, "127.0.0.1:8000");
    }

    #[test]
    fn max_file_size_in_bytes() {
        let config = Config::with_data_dir(Path::new("/tmp"));
        assert_eq!(config.max_file_size_bytes(), 50 * 1024 * 1024);
    }
}
