//! Data types for textbooks, retrieved chunks, index records and citations.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::curriculum::{CurriculumInfo, Syllabus};

/// Free-form metadata attached to a chunk or index record.
pub type Metadata = HashMap<String, Value>;

/// Well-known metadata keys written at ingestion and read back at query time.
pub mod fields {
    pub const DOCUMENT_ID: &str = "document_id";
    pub const CHUNK_INDEX: &str = "chunk_index";
    pub const TITLE: &str = "title";
    pub const GRADE: &str = "grade";
    pub const SYLLABUS: &str = "syllabus";
    pub const SUBJECT: &str = "subject";
    pub const CHAPTER: &str = "chapter";
    pub const TOPIC: &str = "topic";
}

/// Read a non-empty string value from metadata.
pub fn metadata_text<'a>(metadata: &'a Metadata, key: &str) -> Option<&'a str> {
    match metadata.get(key) {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then_some(trimmed)
        }
        _ => None,
    }
}

/// Read an unsigned integer from metadata, accepting numeric strings.
///
/// Floats count only when integral (`8.0`); negative and fractional values
/// are rejected.
pub fn metadata_u64(metadata: &Metadata, key: &str) -> Option<u64> {
    match metadata.get(key) {
        Some(Value::Number(n)) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A textbook (or a section of one) to be chunked and indexed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextbookDocument {
    /// Unique identifier for the document.
    pub id: String,
    /// Human readable title, copied into every chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// The text content of the document.
    pub text: String,
    /// Where the document sits in the curriculum.
    pub curriculum: CurriculumInfo,
    /// Extra metadata inherited by every chunk.
    #[serde(default)]
    pub metadata: Metadata,
}

impl TextbookDocument {
    /// Metadata shared by every chunk of this document.
    pub fn base_metadata(&self) -> Metadata {
        let mut metadata = self.metadata.clone();
        metadata.insert(fields::DOCUMENT_ID.to_string(), Value::String(self.id.clone()));
        if let Some(title) = &self.title {
            metadata.insert(fields::TITLE.to_string(), Value::String(title.clone()));
        }
        self.curriculum.write_metadata(&mut metadata);
        metadata
    }
}

/// A vector plus payload to be written into a [`VectorIndex`](crate::VectorIndex).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexRecord {
    /// Unique identifier for the record.
    pub id: String,
    /// The chunk text.
    pub text: String,
    /// The vector embedding for this chunk's text.
    pub embedding: Vec<f32>,
    /// Metadata inherited from the document plus chunk-specific fields.
    pub metadata: Metadata,
}

/// A raw nearest-neighbour hit returned by a [`VectorIndex`](crate::VectorIndex).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexMatch {
    /// Identifier of the matched record.
    pub id: String,
    /// The stored chunk text.
    pub text: String,
    /// The stored metadata.
    pub metadata: Metadata,
    /// Cosine distance in `[0, 2]`, smaller is nearer.
    pub distance: f32,
}

/// A retrieved passage with its similarity to the question.
///
/// Chunks are immutable: re-scoring goes through [`Chunk::with_similarity`],
/// which returns a new value. Deserialization goes through [`Chunk::new`], so
/// the similarity clamp holds for chunks read back from JSON too.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "ChunkFields")]
pub struct Chunk {
    content: String,
    metadata: Metadata,
    similarity: f32,
}

#[derive(Deserialize)]
struct ChunkFields {
    content: String,
    #[serde(default)]
    metadata: Metadata,
    similarity: f32,
}

impl From<ChunkFields> for Chunk {
    fn from(raw: ChunkFields) -> Self {
        Chunk::new(raw.content, raw.metadata, raw.similarity)
    }
}

impl Chunk {
    /// Create a chunk, clamping `similarity` to `[0, 1]`.
    pub fn new(content: impl Into<String>, metadata: Metadata, similarity: f32) -> Self {
        Self { content: content.into(), metadata, similarity: clamp_unit(similarity) }
    }

    /// Convert an index hit into a chunk using `similarity = 1 - distance`.
    pub fn from_match(hit: IndexMatch) -> Self {
        Self::new(hit.text, hit.metadata, 1.0 - hit.distance)
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn similarity(&self) -> f32 {
        self.similarity
    }

    /// Return a copy of this chunk with a new (clamped) similarity.
    pub fn with_similarity(&self, similarity: f32) -> Self {
        Self::new(self.content.clone(), self.metadata.clone(), similarity)
    }

    pub fn subject(&self) -> Option<&str> {
        metadata_text(&self.metadata, fields::SUBJECT)
    }

    pub fn chapter(&self) -> Option<&str> {
        metadata_text(&self.metadata, fields::CHAPTER)
    }

    pub fn topic(&self) -> Option<&str> {
        metadata_text(&self.metadata, fields::TOPIC)
    }

    pub fn document_id(&self) -> Option<&str> {
        metadata_text(&self.metadata, fields::DOCUMENT_ID)
    }

    pub fn chunk_index(&self) -> Option<u64> {
        metadata_u64(&self.metadata, fields::CHUNK_INDEX)
    }
}

/// Clamp a score to `[0, 1]`, mapping NaN to zero.
pub(crate) fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

/// A citation projected from a [`Chunk`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Source {
    pub document_id: String,
    pub chunk_index: u64,
    /// At most `preview_chars` characters, followed by `...` when cut.
    pub content_preview: String,
    pub similarity: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syllabus: Option<Syllabus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}
