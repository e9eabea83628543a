//! Error types for the `tutor-rag` crate.

use thiserror::Error;

/// Errors that can occur while retrieving, ranking or answering.
///
/// Only retrieval failures and caller cancellation ever leave
/// [`TutorEngine::query`](crate::TutorEngine::query). Generation failures are
/// absorbed by the engine and replaced with an extractive answer.
#[derive(Debug, Error)]
pub enum RagError {
    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector index backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// Embedding or index lookup failed while answering a question.
    #[error("Retrieval error: {0}")]
    RetrievalError(String),

    /// The language model service failed to produce an answer.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The language model service that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A collaborator call did not finish within its time budget.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// The collaborator call that timed out.
        operation: String,
        /// The budget that was exceeded.
        timeout_ms: u64,
    },

    /// The caller cancelled the request.
    #[error("{0} was cancelled")]
    Cancelled(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A grade, syllabus or other curriculum value was invalid.
    #[error("Curriculum error: {0}")]
    CurriculumError(String),

    /// An error occurred while splitting a textbook into chunks.
    #[error("Chunking error: {0}")]
    ChunkingError(String),
}

impl RagError {
    /// Whether this error belongs to the retrieval half of a query.
    pub fn is_retrieval(&self) -> bool {
        matches!(
            self,
            RagError::EmbeddingError { .. }
                | RagError::VectorStoreError { .. }
                | RagError::RetrievalError(_)
        )
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
