//! Vector index trait for storing and searching textbook chunks.

use async_trait::async_trait;

use crate::document::{IndexMatch, IndexRecord};
use crate::error::Result;
use crate::filter::MetadataFilter;

/// A storage backend for chunk embeddings with filtered similarity search.
///
/// Distances are cosine distances in `[0, 2]`; the retriever converts them to
/// similarities with `1 - distance`. Backends that natively report a cosine
/// score must convert it back before returning.
///
/// Implementations must be reentrant if one instance is shared between
/// concurrent queries.
///
/// # Example
///
/// ```rust,ignore
/// use tutor_rag::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new();
/// index.upsert(&records).await?;
/// let hits = index.query(&query_embedding, 5, None).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace records by id. Records must have embeddings set.
    async fn upsert(&self, records: &[IndexRecord]) -> Result<()>;

    /// Return up to `top_k` records nearest to `embedding`, nearest first.
    ///
    /// When `filter` is set, only records whose metadata satisfies every
    /// condition are considered.
    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexMatch>>;

    /// Delete records by id. Unknown ids are ignored.
    async fn delete(&self, ids: &[&str]) -> Result<()>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize>;
}
