#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use docqa::app::App;
use docqa::config::Config;
use docqa::embedding::EmbeddingProvider;
use docqa::error::{RagError, Result};
use docqa::llm::Generator;

/// Deterministic bag-of-words embedder: each lower-cased word is hashed into
/// one of `dims` buckets.
pub struct HashEmbedder {
    dims: usize,
    calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Arc<Self> {
        Arc::new(Self {
            dims,
            calls: AtomicUsize::new(0),
        })
    }

    /// Number of `embed_many` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn fnv1a(word: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in word.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-test"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; self.dims];
                for word in text
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                {
                    let bucket = (fnv1a(&word.to_lowercase()) % self.dims as u64) as usize;
                    v[bucket] += 1.0;
                }
                v
            })
            .collect())
    }
}

/// Returns a fixed answer and records every prompt.
#[derive(Default)]
pub struct ScriptedGenerator {
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub const ANSWER: &'static str = "scripted answer";

    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if prompt.is_empty() {
            return Err(RagError::Generation("empty prompt".to_string()));
        }
        Ok(Self::ANSWER.to_string())
    }
}

/// Default config rooted in `dir` with small chunks.
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::with_data_dir(dir);
    config.chunking.chunk_size = 200;
    config.chunking.chunk_overlap = 40;
    config
}

pub async fn open_app(
    config: Config,
    embedder: &Arc<HashEmbedder>,
    generator: &Arc<ScriptedGenerator>,
) -> App {
    App::with_providers(config, embedder.clone(), generator.clone())
        .await
        .expect("open app")
}

/// Three paragraphs with disjoint vocabulary, each well over 200 characters.
pub fn three_paragraphs() -> String {
    [
        "Glaciers form where snow accumulates faster than it melts. Over centuries the \
         compacted snow turns into dense ice that flows slowly downhill under its own weight. \
         Moraines mark the furthest advance of the ice, and meltwater carves deep valleys.",
        "The lighthouse keeper trimmed the lamp wick every evening at dusk. Brass fittings \
         were polished with vinegar, and the logbook recorded passing schooners by name. \
         Foghorns sounded twice a minute whenever the harbor mist rolled in from the cape.",
        "Sourdough bread relies on a starter of wild yeast and lactobacilli. Bakers feed the \
         starter with flour and water, fold the dough through a long fermentation, then bake \
         it in a covered pot so the crust blisters and the crumb stays open and chewy.",
    ]
    .join("\n\n")
}
