//! Retrieval-augmented query engine.
//!
//! Each query is handled independently:
//!
//! 1. Small-talk check; a match returns canned text with no sources.
//! 2. Embed the query and search the index (optionally restricted to some
//!    documents). No hits returns [`NO_RESULTS_ANSWER`] without calling the model.
//! 3. Number the hits `[1]`, `[2]`, ... into a context block.
//! 4. Build the prompt from the context and the question.
//! 5. Generate. Failures propagate as [`RagError::Generation`].
//! 6. Attach one [`Source`] per hit, in rank order.

use std::sync::Arc;

use crate::config::TOP_K_RANGE;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::llm::Generator;
use crate::models::{Answer, Query, SearchHit, Source};
use crate::smalltalk::{KeywordClassifier, SmallTalkClassifier};

/// Characters of chunk text kept in a source preview.
pub const SOURCE_PREVIEW_CHARS: usize = 200;

pub const NO_RESULTS_ANSWER: &str = "I couldn't find anything in your documents that answers that directly. \
You can try asking about a specific topic or phrase, upload another file, \
or increase the 'Top k' setting to search more snippets.";

pub struct QueryEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn Generator>,
    classifier: Box<dyn SmallTalkClassifier>,
}

impl QueryEngine {
    /// Engine with the built-in [`KeywordClassifier`].
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            embedder,
            index,
            generator,
            classifier: Box::new(KeywordClassifier::new()),
        }
    }

    pub fn with_classifier(mut self, classifier: Box<dyn SmallTalkClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub async fn answer(&self, query: &Query) -> Result<Answer> {
        validate(query)?;

        if let Some(reply) = self.classifier.classify(&query.query) {
            tracing::info!("answered small talk without retrieval");
            return Ok(Answer::canned(reply));
        }

        let query_vector = self.embedder.embed_one(&query.query).await?;
        let hits = self
            .index
            .search(&query_vector, query.document_ids.as_deref(), query.top_k)
            .await?;

        if hits.is_empty() {
            tracing::info!(top_k = query.top_k, "no chunks matched query");
            return Ok(Answer::canned(NO_RESULTS_ANSWER));
        }

        let prompt = build_prompt(&build_context(&hits), &query.query);
        let answer = self.generator.generate(&prompt).await.map_err(|e| {
            tracing::warn!(error = %e, model = self.generator.model_name(), "generation failed");
            e
        })?;

        tracing::info!(hits = hits.len(), "answered query");
        Ok(Answer {
            answer,
            sources: hits.iter().map(to_source).collect(),
        })
    }
}

fn validate(query: &Query) -> Result<()> {
    if query.query.trim().is_empty() {
        return Err(RagError::InvalidQuery("query must not be empty".to_string()));
    }
    if !TOP_K_RANGE.contains(&query.top_k) {
        return Err(RagError::InvalidQuery(format!(
            "top_k must be between {} and {}, got {}",
            TOP_K_RANGE.start(),
            TOP_K_RANGE.end(),
            query.top_k
        )));
    }
    Ok(())
}

/// `"[1] first\n\n[2] second"`, in rank order.
pub fn build_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| format!("[{}] {}", i + 1, hit.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "You are a friendly, helpful assistant answering questions about the user's uploaded documents.
Write naturally and clearly in a conversational tone, but stay faithful to the provided context.

Context (snippets from the user's documents):
{context}

User question: {question}

Instructions:
- Answer directly and concisely, using bullet points or short paragraphs when helpful.
- Use only facts that appear in the context. Do not invent details.
- If the context is insufficient, say politely that the documents don't contain enough information and suggest what to ask next.
"
    )
}

/// First [`SOURCE_PREVIEW_CHARS`] characters of `text`, with `"..."` appended
/// only when something was cut.
pub fn preview(text: &str) -> String {
    match text.char_indices().nth(SOURCE_PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn to_source(hit: &SearchHit) -> Source {
    Source {
        content: preview(&hit.text),
        document_id: hit.document_id().map(str::to_string),
        filename: hit.filename().map(str::to_string),
        chunk_index: hit.chunk_index(),
    }
}
