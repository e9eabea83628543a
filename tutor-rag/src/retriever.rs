//! Chunk retrieval: embed the question, query the index, convert distances.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::deadline::bounded;
use crate::document::Chunk;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::filter::CurriculumFilter;
use crate::vectorstore::VectorIndex;

/// Turns a question into similarity-scored [`Chunk`]s.
///
/// Chunks come back in the index's native order (nearest first); the
/// retriever never re-sorts. An empty index or a filter that excludes
/// everything yields an empty list.
#[derive(Clone)]
pub struct ChunkRetriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    embedding_timeout: Duration,
    index_timeout: Duration,
}

impl ChunkRetriever {
    pub fn new(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        embedding_timeout: Duration,
        index_timeout: Duration,
    ) -> Self {
        Self { embedding_provider, index, embedding_timeout, index_timeout }
    }

    /// Retrieve up to `top_k` chunks for `question`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::RetrievalError`] if embedding or the index lookup
    /// fails or times out, and [`RagError::Cancelled`] if `cancel` fires.
    pub async fn retrieve(
        &self,
        question: &str,
        filter: Option<&CurriculumFilter>,
        top_k: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<Chunk>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let embedding = bounded(
            "query embedding",
            self.embedding_timeout,
            cancel,
            self.embedding_provider.embed(question),
        )
        .await
        .map_err(|e| {
            error!(error = %e, "embedding failed during retrieval");
            as_retrieval_error("query embedding failed", e)
        })?;

        let metadata_filter = filter.and_then(CurriculumFilter::compile);
        let hits = bounded(
            "vector index query",
            self.index_timeout,
            cancel,
            self.index.query(&embedding, top_k, metadata_filter.as_ref()),
        )
        .await
        .map_err(|e| {
            error!(error = %e, "vector index query failed");
            as_retrieval_error("vector index query failed", e)
        })?;

        debug!(
            hit_count = hits.len(),
            top_k,
            filtered = metadata_filter.is_some(),
            "retrieved chunks"
        );

        Ok(hits.into_iter().map(Chunk::from_match).collect())
    }
}

fn as_retrieval_error(context: &str, error: RagError) -> RagError {
    match error {
        RagError::Cancelled(_) => error,
        other => RagError::RetrievalError(format!("{context}: {other}")),
    }
}
