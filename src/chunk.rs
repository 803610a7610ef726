//! Recursive, overlapping text chunker.
//!
//! Splits extracted document text into segments of at most `chunk_size`
//! characters. Splitting prefers the largest separator that yields small
//! enough pieces: paragraph breaks, then line breaks, then sentence ends,
//! then whitespace, and finally individual characters. Adjacent pieces are
//! merged back up to `chunk_size`, and each new chunk starts with up to
//! `overlap` characters carried over from the end of the previous one.
//!
//! Lengths are measured in characters (Unicode scalar values), not bytes.

use std::collections::VecDeque;

use sha2::{Digest, Sha256};

use crate::config::ChunkingConfig;
use crate::error::{RagError, Result};
use crate::models::Chunk;

/// Separator hierarchy, largest first. The empty separator splits into characters.
const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

/// A validated chunking configuration.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl TextSplitter {
    /// Fails with `InvalidChunkConfig` unless `0 <= overlap < chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::InvalidChunkConfig(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(RagError::InvalidChunkConfig(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into ordered chunks. Empty or whitespace-only text yields none.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.split_recursive(text, &SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // Pick the first separator present in the text; "" always matches.
        let mut separator = "";
        let mut finer: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() || text.contains(sep) {
                separator = sep;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut small: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) <= self.chunk_size {
                small.push(piece);
                continue;
            }
            if !small.is_empty() {
                chunks.extend(self.merge(&small));
                small.clear();
            }
            if finer.is_empty() {
                // Unsplittable; emit as-is.
                push_trimmed(&mut chunks, piece.to_string());
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !small.is_empty() {
            chunks.extend(self.merge(&small));
        }
        chunks
    }

    /// Merge contiguous small pieces into chunks, carrying up to `overlap`
    /// trailing characters into the next chunk.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_trimmed(&mut chunks, join(&window));
                while total > self.overlap || (total > 0 && total + len > self.chunk_size) {
                    match window.pop_front() {
                        Some((_, l)) => total -= l,
                        None => break,
                    }
                }
            }
            window.push_back((piece, len));
            total += len;
        }

        if !window.is_empty() {
            push_trimmed(&mut chunks, join(&window));
        }
        chunks
    }
}

/// Split `text` into chunks using the given size and overlap.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    Ok(TextSplitter::new(chunk_size, overlap)?.split(text))
}

/// Turn split texts into [`Chunk`]s with contiguous indices starting at 0.
pub fn make_chunks(document_id: &str, texts: &[String]) -> Vec<Chunk> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| make_chunk(document_id, i, text))
        .collect()
}

fn make_chunk(document_id: &str, index: usize, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: chunk_id(document_id, index),
        document_id: document_id.to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash,
    }
}

/// Index entry key for a chunk: `"{document_id}_{index}"`.
pub fn chunk_id(document_id: &str, index: usize) -> String {
    format!("{}_{}", document_id, index)
}

/// Split so each separator stays at the end of the piece it terminates.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, sep) in text.match_indices(separator) {
        let end = idx + sep.len();
        pieces.push(&text[start..end]);
        start = end;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn join(window: &VecDeque<(&str, usize)>) -> String {
    window.iter().map(|(s, _)| *s).collect()
}

fn push_trimmed(chunks: &mut Vec<String>, text: String) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
