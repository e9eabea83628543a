//! Textbook chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`FixedSizeChunker`] splits by character count with configurable overlap
//! - [`RecursiveChunker`] splits hierarchically by paragraphs, sentences, then words
//!
//! Sizes are measured in characters, never bytes, so multi-byte scripts are
//! split safely.

use serde_json::Value;

use crate::document::{IndexRecord, TextbookDocument, fields};
use crate::error::{RagError, Result};

const SEPARATORS: [&str; 5] = ["\n\n", ". ", "! ", "? ", " "];

/// A strategy for splitting textbooks into indexable records.
///
/// Implementations produce [`IndexRecord`]s with text and metadata but an
/// empty embedding. Embeddings are attached by the engine during ingestion.
pub trait Chunker: Send + Sync {
    /// Split a document into records.
    ///
    /// Returns an empty `Vec` if the document text is blank. Record ids are
    /// `{document_id}_{chunk_index}` and every record carries the document's
    /// base metadata plus its `chunk_index`.
    fn chunk(&self, document: &TextbookDocument) -> Vec<IndexRecord>;
}

fn check_sizes(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::ChunkingError("chunk_size must be greater than zero".to_string()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::ChunkingError(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

fn to_records(document: &TextbookDocument, pieces: Vec<String>) -> Vec<IndexRecord> {
    let base = document.base_metadata();
    pieces
        .into_iter()
        .filter(|text| !text.trim().is_empty())
        .enumerate()
        .map(|(i, text)| {
            let mut metadata = base.clone();
            metadata.insert(fields::CHUNK_INDEX.to_string(), Value::from(i));
            IndexRecord {
                id: format!("{}_{i}", document.id),
                text: text.trim().to_string(),
                embedding: Vec::new(),
                metadata,
            }
        })
        .collect()
}

/// Splits text into fixed-size chunks by character count with overlap.
///
/// # Example
///
/// ```rust,ignore
/// use tutor_rag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(256, 50)?;
/// let records = chunker.chunk(&textbook);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ChunkingError`] if `chunk_size` is zero or the
    /// overlap is not smaller than it.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        check_sizes(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &TextbookDocument) -> Vec<IndexRecord> {
        to_records(document, split_by_size(&document.text, self.chunk_size, self.chunk_overlap))
    }
}

/// Splits text hierarchically: paragraphs, then sentences, then words.
///
/// Paragraphs (`\n\n`) are merged greedily up to `chunk_size`. A paragraph
/// that is still too long is split at sentence ends (`. `, `! `, `? `), and a
/// sentence that is still too long at spaces. Only a single word longer than
/// `chunk_size` falls back to fixed-size splitting with overlap.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ChunkingError`] if `chunk_size` is zero or the
    /// overlap is not smaller than it.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        check_sizes(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

impl Default for RecursiveChunker {
    fn default() -> Self {
        Self { chunk_size: 800, chunk_overlap: 100 }
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &TextbookDocument) -> Vec<IndexRecord> {
        let pieces =
            split_and_merge(&document.text, self.chunk_size, self.chunk_overlap, &SEPARATORS);
        to_records(document, pieces)
    }
}

/// Split text by a separator, then merge segments into chunks that respect
/// `chunk_size`. Oversized segments are split with the next separator.
fn split_and_merge(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[&str],
) -> Vec<String> {
    let Some((separator, remaining)) = separators.split_first() else {
        return split_by_size(text, chunk_size, chunk_overlap);
    };
    if char_len(text) <= chunk_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for segment in split_keeping_separator(text, separator) {
        let segment_len = char_len(segment);
        if current_len + segment_len > chunk_size && !current.is_empty() {
            flush(&mut chunks, &current, current_len, chunk_size, chunk_overlap, remaining);
            current.clear();
            current_len = 0;
        }
        current.push_str(segment);
        current_len += segment_len;
    }
    if !current.is_empty() {
        flush(&mut chunks, &current, current_len, chunk_size, chunk_overlap, remaining);
    }

    chunks
}

fn flush(
    chunks: &mut Vec<String>,
    current: &str,
    current_len: usize,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[&str],
) {
    if current_len > chunk_size {
        chunks.extend(split_and_merge(current, chunk_size, chunk_overlap, separators));
    } else {
        chunks.push(current.to_string());
    }
}

/// Split text at a separator, keeping the separator on the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

/// Character-count splitting with overlap.
fn split_by_size(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let bounds: Vec<usize> =
        text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
    let total = bounds.len() - 1;
    let step = chunk_size.saturating_sub(chunk_overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < total {
        let end = (start + chunk_size).min(total);
        chunks.push(text[bounds[start]..bounds[end]].to_string());
        if end == total {
            break;
        }
        start += step;
    }

    chunks
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
