//! Citation records for the chunks an answer was built from.

use crate::curriculum::{metadata_grade, metadata_syllabus};
use crate::document::{Chunk, Source};

const UNKNOWN_DOCUMENT: &str = "unknown";

/// Projects each chunk 1:1 into a [`Source`].
#[derive(Debug, Clone, Copy)]
pub struct SourceBuilder {
    preview_chars: usize,
}

impl SourceBuilder {
    pub fn new(preview_chars: usize) -> Self {
        Self { preview_chars }
    }

    pub fn build(&self, chunks: &[&Chunk]) -> Vec<Source> {
        chunks.iter().map(|chunk| self.source(chunk)).collect()
    }

    pub fn source(&self, chunk: &Chunk) -> Source {
        Source {
            document_id: chunk.document_id().unwrap_or(UNKNOWN_DOCUMENT).to_string(),
            chunk_index: chunk.chunk_index().unwrap_or(0),
            content_preview: preview(chunk.content(), self.preview_chars),
            similarity: chunk.similarity(),
            grade: metadata_grade(chunk.metadata()),
            syllabus: metadata_syllabus(chunk.metadata()),
            subject: chunk.subject().map(str::to_string),
            chapter: chunk.chapter().map(str::to_string),
            topic: chunk.topic().map(str::to_string),
        }
    }
}

impl Default for SourceBuilder {
    fn default() -> Self {
        Self::new(200)
    }
}

/// First `max_chars` characters of `text`, with `...` appended when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
