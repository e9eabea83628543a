//! Language model seam and the text the engine feeds through it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::Chunk;
use crate::error::Result;

/// Relevant chunks quoted verbatim when no generated answer is available.
const EXTRACTIVE_CHUNKS: usize = 3;

/// Who said a line of earlier conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    Student,
    Tutor,
}

/// One earlier exchange in the tutoring session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ConversationTurn {
    pub fn student(content: impl Into<String>) -> Self {
        Self { role: TurnRole::Student, content: content.into() }
    }

    pub fn tutor(content: impl Into<String>) -> Self {
        Self { role: TurnRole::Tutor, content: content.into() }
    }
}

/// Everything a language model needs to answer one question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub question: String,
    /// Textbook excerpts the answer must be grounded in.
    pub context: String,
    /// Preferred explanation style, e.g. "step by step" or "with examples".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<u8>,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
}

/// A service that writes an answer from a question and textbook context.
///
/// Implementations may fail on quota or network problems. The engine
/// absorbs those failures, so implementations should return errors rather
/// than degrade silently.
#[async_trait]
pub trait LanguageModelService: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str {
        "language-model"
    }

    /// Generate an answer for `request`.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Renders relevant chunks into the context string sent to the model.
///
/// Each chunk becomes a numbered block headed by its curriculum labels,
/// e.g. `[1] (Science | Light | Reflection)`. The whole string is cut to
/// `max_chars` characters.
#[derive(Debug, Clone, Copy)]
pub struct ContextBuilder {
    max_chars: usize,
}

impl ContextBuilder {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn build(&self, chunks: &[&Chunk]) -> String {
        let blocks: Vec<String> = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                let labels: Vec<&str> = [chunk.subject(), chunk.chapter(), chunk.topic()]
                    .into_iter()
                    .flatten()
                    .collect();
                if labels.is_empty() {
                    format!("[{}]\n{}", i + 1, chunk.content())
                } else {
                    format!("[{}] ({})\n{}", i + 1, labels.join(" | "), chunk.content())
                }
            })
            .collect();
        truncate_chars(blocks.join("\n\n"), self.max_chars)
    }
}

/// Answer assembled from the chunk texts themselves.
pub fn extractive_answer(chunks: &[&Chunk]) -> String {
    let excerpts: Vec<String> = chunks
        .iter()
        .take(EXTRACTIVE_CHUNKS)
        .map(|chunk| format!("- {}", chunk.content().trim()))
        .collect();
    format!("Here is what your textbooks say about this:\n\n{}", excerpts.join("\n"))
}

fn truncate_chars(mut text: String, max_chars: usize) -> String {
    if let Some((cut, _)) = text.char_indices().nth(max_chars) {
        text.truncate(cut);
    }
    text
}
