//! Stub collaborators shared by the integration tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tutor_rag::{
    EmbeddingProvider, GenerationRequest, IndexMatch, IndexRecord, LanguageModelService,
    Metadata, MetadataFilter, RagError, Result, VectorIndex,
};

/// An index that ignores the query vector and serves fixed distances.
///
/// Filters and `top_k` are honoured, so curriculum-priority retrieval
/// behaves as it would against a real backend.
#[derive(Default)]
pub struct FixedIndex {
    hits: Vec<IndexMatch>,
    filtered_queries: AtomicUsize,
    unfiltered_queries: AtomicUsize,
}

impl FixedIndex {
    pub fn new(hits: Vec<IndexMatch>) -> Self {
        Self { hits, ..Self::default() }
    }

    pub fn filtered_queries(&self) -> usize {
        self.filtered_queries.load(Ordering::SeqCst)
    }

    pub fn unfiltered_queries(&self) -> usize {
        self.unfiltered_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorIndex for FixedIndex {
    async fn upsert(&self, _records: &[IndexRecord]) -> Result<()> {
        Ok(())
    }

    async fn query(
        &self,
        _embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexMatch>> {
        let counter =
            if filter.is_some() { &self.filtered_queries } else { &self.unfiltered_queries };
        counter.fetch_add(1, Ordering::SeqCst);

        let mut hits: Vec<IndexMatch> = self
            .hits
            .iter()
            .filter(|hit| filter.is_none_or(|f| f.matches(&hit.metadata)))
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete(&self, _ids: &[&str]) -> Result<()> {
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.hits.len())
    }
}

/// Build a hit from a JSON metadata object.
pub fn hit(id: &str, text: &str, distance: f32, metadata: serde_json::Value) -> IndexMatch {
    let mut metadata: Metadata = serde_json::from_value(metadata).unwrap();
    metadata.entry("document_id".to_string()).or_insert_with(|| json!(id));
    IndexMatch { id: id.to_string(), text: text.to_string(), metadata, distance }
}

/// An embedder that always fails.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::EmbeddingError {
            provider: "failing".into(),
            message: "quota exceeded".into(),
        })
    }

    fn dimensions(&self) -> usize {
        4
    }
}

/// An embedder that takes far longer than any sensible timeout.
pub struct SlowEmbedder;

#[async_trait]
impl EmbeddingProvider for SlowEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        Ok(vec![1.0; 4])
    }

    fn dimensions(&self) -> usize {
        4
    }
}

/// An index whose lookups fail.
pub struct FailingIndex;

#[async_trait]
impl VectorIndex for FailingIndex {
    async fn upsert(&self, _records: &[IndexRecord]) -> Result<()> {
        Ok(())
    }

    async fn query(
        &self,
        _embedding: &[f32],
        _top_k: usize,
        _filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexMatch>> {
        Err(RagError::VectorStoreError {
            backend: "failing".into(),
            message: "connection refused".into(),
        })
    }

    async fn delete(&self, _ids: &[&str]) -> Result<()> {
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(0)
    }
}

/// An index whose lookups never finish in time.
pub struct SlowIndex;

#[async_trait]
impl VectorIndex for SlowIndex {
    async fn upsert(&self, _records: &[IndexRecord]) -> Result<()> {
        Ok(())
    }

    async fn query(
        &self,
        _embedding: &[f32],
        _top_k: usize,
        _filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexMatch>> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        Ok(Vec::new())
    }

    async fn delete(&self, _ids: &[&str]) -> Result<()> {
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(0)
    }
}

/// A language model that echoes the question and records every request.
#[derive(Default)]
pub struct RecordingModel {
    requests: Mutex<Vec<GenerationRequest>>,
}

impl RecordingModel {
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModelService for RecordingModel {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(format!("Generated answer to: {}", request.question))
    }
}

/// A language model that always fails.
pub struct FailingModel;

#[async_trait]
impl LanguageModelService for FailingModel {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
        Err(RagError::GenerationError { provider: "failing".into(), message: "503".into() })
    }
}

/// A language model that takes far longer than any sensible timeout.
pub struct SlowModel;

#[async_trait]
impl LanguageModelService for SlowModel {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        Ok("too late".to_string())
    }
}
