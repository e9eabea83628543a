//! Tutoring engine orchestrator.
//!
//! The [`TutorEngine`] answers a student's question end to end: retrieve
//! chunks (preferring the student's own curriculum), score confidence,
//! decide whether to disclose uncertainty, ask the language model for an
//! answer grounded in the relevant chunks, and attach citations, follow-up
//! questions and a curriculum mapping.
//!
//! # Example
//!
//! ```rust,ignore
//! use tutor_rag::{EngineConfig, HashingEmbeddingProvider, InMemoryVectorIndex, TutorEngine};
//!
//! let engine = TutorEngine::builder()
//!     .config(EngineConfig::default())
//!     .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
//!     .vector_index(Arc::new(InMemoryVectorIndex::new()))
//!     .language_model(Arc::new(my_model))
//!     .build()?;
//!
//! engine.ingest(&textbook).await?;
//! let response = engine.query("What is photosynthesis?", Some(&context)).await?;
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::booster::CurriculumBooster;
use crate::chunking::{Chunker, RecursiveChunker};
use crate::confidence::ConfidenceScorer;
use crate::config::EngineConfig;
use crate::curriculum::{CurriculumInfo, Syllabus};
use crate::deadline::bounded;
use crate::document::{Chunk, Source, TextbookDocument};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::filter::CurriculumFilter;
use crate::followups::FollowUpBuilder;
use crate::generation::{
    ContextBuilder, ConversationTurn, GenerationRequest, LanguageModelService, extractive_answer,
};
use crate::mapping::{CurriculumMapper, CurriculumMapping};
use crate::retriever::ChunkRetriever;
use crate::sources::SourceBuilder;
use crate::uncertainty::{INSUFFICIENT_KNOWLEDGE_MESSAGE, UncertaintyPolicy};
use crate::vectorstore::VectorIndex;

/// Per-call information about the student asking.
///
/// Nothing here is retained by the engine after the call returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syllabus: Option<Syllabus>,
    #[serde(default)]
    pub conversation_history: Vec<ConversationTurn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_explanation_style: Option<String>,
}

impl QueryContext {
    /// Context for a student at a known curriculum position.
    pub fn for_student(grade: u8, syllabus: Syllabus) -> Self {
        Self { grade: Some(grade), syllabus: Some(syllabus), ..Self::default() }
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.preferred_explanation_style = Some(style.into());
        self
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.conversation_history = history;
        self
    }

    /// The student's curriculum position, when both grade and syllabus are
    /// known and the grade is supported.
    pub fn curriculum(&self) -> Option<CurriculumInfo> {
        let (grade, syllabus) = (self.grade?, self.syllabus?);
        match CurriculumInfo::new(grade, syllabus) {
            Ok(info) => Some(info),
            Err(e) => {
                warn!(grade, error = %e, "ignoring unsupported grade in query context");
                None
            }
        }
    }
}

/// The answer returned to the student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagResponse {
    pub answer: String,
    /// Citations for the chunks at or above the similarity threshold.
    pub sources: Vec<Source>,
    pub confidence: f32,
    pub suggested_follow_ups: Vec<String>,
    pub has_uncertainty: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncertainty_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curriculum_mapping: Option<CurriculumMapping>,
}

/// The tutoring engine.
///
/// Holds only immutable configuration and shared collaborators, so one
/// instance can serve concurrent queries through an `Arc`. Construct one via
/// [`TutorEngine::builder()`].
pub struct TutorEngine {
    config: EngineConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_index: Arc<dyn VectorIndex>,
    language_model: Option<Arc<dyn LanguageModelService>>,
    chunker: Arc<dyn Chunker>,
    retriever: ChunkRetriever,
    booster: CurriculumBooster,
    scorer: ConfidenceScorer,
    policy: UncertaintyPolicy,
    mapper: CurriculumMapper,
    sources: SourceBuilder,
    follow_ups: FollowUpBuilder,
    context: ContextBuilder,
}

impl TutorEngine {
    /// Create a new [`TutorEngineBuilder`].
    pub fn builder() -> TutorEngineBuilder {
        TutorEngineBuilder::default()
    }

    /// Return a reference to the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Answer a question.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::RetrievalError`] if embedding or the index lookup
    /// fails. Language model failures never surface here; the answer falls
    /// back to quoting the relevant chunks instead.
    pub async fn query(
        &self,
        question: &str,
        context: Option<&QueryContext>,
    ) -> Result<RagResponse> {
        self.query_with_cancel(question, context, &CancellationToken::new()).await
    }

    /// [`query`](Self::query) that stops early with [`RagError::Cancelled`]
    /// once `cancel` fires.
    pub async fn query_with_cancel(
        &self,
        question: &str,
        context: Option<&QueryContext>,
        cancel: &CancellationToken,
    ) -> Result<RagResponse> {
        let curriculum = context.and_then(QueryContext::curriculum);
        let chunks = match &curriculum {
            Some(curriculum) => {
                self.priority_retrieve(question, curriculum, self.config.top_k, cancel).await?
            }
            None => self.retriever.retrieve(question, None, self.config.top_k, cancel).await?,
        };

        let relevant = self.scorer.relevant(&chunks);
        let confidence = self.scorer.score(&chunks);
        let suggested_follow_ups = self.follow_ups.build(&relevant);

        if relevant.is_empty() {
            let message = match self.policy.disclose(confidence) {
                m if m.is_empty() => INSUFFICIENT_KNOWLEDGE_MESSAGE.to_string(),
                m => m,
            };
            info!(retrieved = chunks.len(), confidence, "no relevant evidence for question");
            return Ok(RagResponse {
                answer: message.clone(),
                sources: Vec::new(),
                confidence,
                suggested_follow_ups,
                has_uncertainty: true,
                uncertainty_message: Some(message),
                curriculum_mapping: None,
            });
        }

        let has_uncertainty = self.policy.is_uncertain(confidence);
        let uncertainty_message =
            Some(self.policy.disclose(confidence)).filter(|m| has_uncertainty && !m.is_empty());

        let generated = self.generate(question, context, &relevant, cancel).await?;
        let answer = match &uncertainty_message {
            Some(message) => format!("{message}\n\n{generated}"),
            None => generated,
        };

        let response = RagResponse {
            answer,
            sources: self.sources.build(&relevant),
            confidence,
            suggested_follow_ups,
            has_uncertainty,
            uncertainty_message,
            curriculum_mapping: Some(self.mapper.map(question, &chunks)),
        };

        info!(
            retrieved = chunks.len(),
            source_count = response.sources.len(),
            confidence,
            has_uncertainty,
            "query completed"
        );

        Ok(response)
    }

    /// Retrieve chunks for a question, optionally restricted by `filter`.
    ///
    /// No boosting or threshold filtering is applied.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::RetrievalError`] if embedding or the index lookup fails.
    pub async fn retrieve(
        &self,
        question: &str,
        filter: Option<&CurriculumFilter>,
        top_k: usize,
    ) -> Result<Vec<Chunk>> {
        self.retriever.retrieve(question, filter, top_k, &CancellationToken::new()).await
    }

    /// Retrieve chunks ranked for a student's curriculum.
    ///
    /// Chunks matching `curriculum` exactly are fetched first. If there are
    /// fewer than `top_k` of them, an unfiltered search for `2 * top_k` fills
    /// the gap. The merged set is boosted, re-sorted and cut to `top_k`.
    /// `top_k` defaults to the configured value.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::RetrievalError`] if embedding or the index lookup fails.
    pub async fn retrieve_with_curriculum_priority(
        &self,
        question: &str,
        curriculum: &CurriculumInfo,
        top_k: Option<usize>,
    ) -> Result<Vec<Chunk>> {
        let top_k = top_k.unwrap_or(self.config.top_k);
        self.priority_retrieve(question, curriculum, top_k, &CancellationToken::new()).await
    }

    /// Guess which chapters, topics and subjects a question belongs to.
    ///
    /// With a `curriculum`, retrieval is curriculum-prioritised.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::RetrievalError`] if embedding or the index lookup fails.
    pub async fn map_question_to_curriculum(
        &self,
        question: &str,
        curriculum: Option<&CurriculumInfo>,
    ) -> Result<CurriculumMapping> {
        let cancel = CancellationToken::new();
        let top_k = self.config.top_k;
        let chunks = match curriculum {
            Some(curriculum) => self.priority_retrieve(question, curriculum, top_k, &cancel).await?,
            None => self.retriever.retrieve(question, None, top_k, &cancel).await?,
        };
        Ok(self.mapper.map(question, &chunks))
    }

    /// Ingest a textbook: chunk, embed, upsert.
    ///
    /// Returns the number of chunks stored.
    ///
    /// # Errors
    ///
    /// Returns the embedding provider's or vector index's error if either
    /// fails, and [`RagError::EmbeddingError`] if the provider returns the
    /// wrong number of vectors.
    pub async fn ingest(&self, document: &TextbookDocument) -> Result<usize> {
        let mut records = self.chunker.chunk(document);
        if records.is_empty() {
            info!(document.id = %document.id, chunk_count = 0, "ingested document (empty)");
            return Ok(0);
        }

        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        let embeddings = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
            error!(document.id = %document.id, error = %e, "embedding failed during ingestion");
            e
        })?;
        if embeddings.len() != records.len() {
            return Err(RagError::EmbeddingError {
                provider: "ingestion".to_string(),
                message: format!(
                    "expected {} embeddings for document '{}', got {}",
                    records.len(),
                    document.id,
                    embeddings.len()
                ),
            });
        }
        for (record, embedding) in records.iter_mut().zip(embeddings) {
            record.embedding = embedding;
        }

        self.vector_index.upsert(&records).await.map_err(|e| {
            error!(document.id = %document.id, error = %e, "upsert failed during ingestion");
            e
        })?;

        let chunk_count = records.len();
        info!(document.id = %document.id, chunk_count, "ingested document");
        Ok(chunk_count)
    }

    /// Ingest several textbooks, stopping at the first failure.
    ///
    /// Returns the total number of chunks stored.
    pub async fn ingest_batch(&self, documents: &[TextbookDocument]) -> Result<usize> {
        let mut total = 0;
        for document in documents {
            total += self.ingest(document).await?;
        }
        Ok(total)
    }

    /// Number of chunks currently in the vector index.
    pub async fn indexed_chunks(&self) -> Result<usize> {
        self.vector_index.count().await
    }

    async fn priority_retrieve(
        &self,
        question: &str,
        curriculum: &CurriculumInfo,
        top_k: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<Chunk>> {
        let filter = CurriculumFilter::from(curriculum);
        let exact = self.retriever.retrieve(question, Some(&filter), top_k, cancel).await?;
        let exact_count = exact.len();

        let candidates = if exact_count < top_k {
            let relaxed =
                self.retriever.retrieve(question, None, top_k.saturating_mul(2), cancel).await?;
            merge_relaxed(exact, relaxed, self.config.relaxed_similarity_floor)
        } else {
            exact
        };

        let mut ranked = self.booster.boost(&candidates, curriculum);
        ranked.truncate(top_k);

        debug!(
            grade = curriculum.grade(),
            syllabus = %curriculum.syllabus(),
            exact_count,
            candidate_count = candidates.len(),
            result_count = ranked.len(),
            "curriculum-prioritised retrieval"
        );

        Ok(ranked)
    }

    async fn generate(
        &self,
        question: &str,
        context: Option<&QueryContext>,
        relevant: &[&Chunk],
        cancel: &CancellationToken,
    ) -> Result<String> {
        let Some(model) = &self.language_model else {
            debug!("no language model configured, answering extractively");
            return Ok(extractive_answer(relevant));
        };

        let request = GenerationRequest {
            question: question.to_string(),
            context: self.context.build(relevant),
            style: context.and_then(|c| c.preferred_explanation_style.clone()),
            grade: context.and_then(|c| c.grade),
            history: context.map(|c| c.conversation_history.clone()).unwrap_or_default(),
        };

        let outcome = bounded(
            "answer generation",
            self.config.generation_timeout(),
            cancel,
            model.generate(&request),
        )
        .await;

        match outcome {
            Ok(answer) if !answer.trim().is_empty() => Ok(answer),
            Ok(_) => {
                warn!(model = model.name(), "language model returned an empty answer");
                Ok(extractive_answer(relevant))
            }
            Err(e @ RagError::Cancelled(_)) => Err(e),
            Err(e) => {
                error!(
                    model = model.name(),
                    error = %e,
                    "generation failed, answering extractively"
                );
                Ok(extractive_answer(relevant))
            }
        }
    }
}

/// Exact matches first, then relaxed hits not already present.
///
/// Two chunks are the same when content, document id and chunk index agree.
/// With a `floor`, relaxed-only chunks below it are dropped.
fn merge_relaxed(exact: Vec<Chunk>, relaxed: Vec<Chunk>, floor: Option<f32>) -> Vec<Chunk> {
    let mut seen: HashSet<(String, Option<String>, Option<u64>)> =
        exact.iter().map(identity).collect();
    let mut merged = exact;
    for chunk in relaxed {
        if floor.is_some_and(|floor| chunk.similarity() < floor) {
            continue;
        }
        if seen.insert(identity(&chunk)) {
            merged.push(chunk);
        }
    }
    merged
}

fn identity(chunk: &Chunk) -> (String, Option<String>, Option<u64>) {
    (
        chunk.content().to_string(),
        chunk.document_id().map(str::to_string),
        chunk.chunk_index(),
    )
}

/// Builder for constructing a [`TutorEngine`].
///
/// The embedding provider and vector index are required. Without a
/// configuration the defaults are used; without a chunker textbooks are
/// split with [`RecursiveChunker::default()`]; without a language model
/// answers quote the relevant chunks.
#[derive(Default)]
pub struct TutorEngineBuilder {
    config: Option<EngineConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_index: Option<Arc<dyn VectorIndex>>,
    language_model: Option<Arc<dyn LanguageModelService>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl TutorEngineBuilder {
    /// Set the engine configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector index backend.
    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector_index = Some(index);
        self
    }

    /// Set the language model used to write answers.
    pub fn language_model(mut self, model: Arc<dyn LanguageModelService>) -> Self {
        self.language_model = Some(model);
        self
    }

    /// Set the textbook chunker used by ingestion.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`TutorEngine`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required collaborator is
    /// missing or the configuration is invalid.
    pub fn build(self) -> Result<TutorEngine> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_index = self
            .vector_index
            .ok_or_else(|| RagError::ConfigError("vector_index is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| Arc::new(RecursiveChunker::default()));

        let retriever = ChunkRetriever::new(
            Arc::clone(&embedding_provider),
            Arc::clone(&vector_index),
            config.embedding_timeout(),
            config.index_timeout(),
        );

        Ok(TutorEngine {
            retriever,
            booster: CurriculumBooster::new(config.boost),
            scorer: ConfidenceScorer::new(config.similarity_threshold),
            policy: UncertaintyPolicy::new(
                config.low_confidence_threshold,
                config.confidence_threshold,
            ),
            mapper: CurriculumMapper::new(config.similarity_threshold),
            sources: SourceBuilder::new(config.preview_chars),
            follow_ups: FollowUpBuilder::new(config.max_follow_ups),
            context: ContextBuilder::new(config.max_context_chars),
            config,
            embedding_provider,
            vector_index,
            language_model: self.language_model,
            chunker,
        })
    }
}
