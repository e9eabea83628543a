//! # tutor-rag
//!
//! Curriculum-aware retrieval and ranking for a textbook tutoring backend.
//!
//! ## Overview
//!
//! Given a student's question and, optionally, their grade and syllabus, the
//! [`TutorEngine`]:
//!
//! - retrieves textbook chunks from a [`VectorIndex`], preferring the
//!   student's own curriculum ([`CurriculumBooster`])
//! - reduces them to a confidence score ([`ConfidenceScorer`])
//! - decides how to disclose uncertainty ([`UncertaintyPolicy`])
//! - asks a [`LanguageModelService`] for an answer grounded in the relevant
//!   chunks, falling back to quoting them when the model fails
//! - attaches citations, follow-up questions and a [`CurriculumMapping`]
//!
//! Retrieval failures are returned as errors. Language model failures never
//! are; the student always receives a [`RagResponse`].
//!
//! ## Backends
//!
//! - [`InMemoryVectorIndex`] and [`HashingEmbeddingProvider`] are always
//!   available and need no external services.
//! - `qdrant` feature: [`qdrant::QdrantVectorIndex`].
//! - `openai` feature: [`openai::OpenAIEmbeddingProvider`] and
//!   [`openai::OpenAIChatService`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tutor_rag::{
//!     HashingEmbeddingProvider, InMemoryVectorIndex, QueryContext, Syllabus, TutorEngine,
//! };
//!
//! let engine = TutorEngine::builder()
//!     .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
//!     .vector_index(Arc::new(InMemoryVectorIndex::new()))
//!     .build()?;
//!
//! engine.ingest_batch(&textbooks).await?;
//!
//! let context = QueryContext::for_student(8, Syllabus::Cbse);
//! let response = engine.query("What is friction?", Some(&context)).await?;
//! println!("{} (confidence {:.2})", response.answer, response.confidence);
//! ```

pub mod booster;
pub mod chunking;
pub mod confidence;
pub mod config;
pub mod curriculum;
mod deadline;
pub mod document;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod filter;
pub mod followups;
pub mod generation;
pub mod inmemory;
pub mod mapping;
pub mod retriever;
pub mod sources;
pub mod uncertainty;
pub mod vectorstore;

#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use booster::CurriculumBooster;
pub use chunking::{Chunker, FixedSizeChunker, RecursiveChunker};
pub use confidence::ConfidenceScorer;
pub use config::{BoostWeights, EngineConfig, EngineConfigBuilder};
pub use curriculum::{CurriculumInfo, MAX_GRADE, MIN_GRADE, Syllabus};
pub use document::{Chunk, IndexMatch, IndexRecord, Metadata, Source, TextbookDocument};
pub use embedding::{EmbeddingProvider, HashingEmbeddingProvider};
pub use engine::{QueryContext, RagResponse, TutorEngine, TutorEngineBuilder};
pub use error::{RagError, Result};
pub use filter::{CurriculumFilter, FilterCondition, MetadataFilter};
pub use followups::{FollowUpBuilder, MAX_FOLLOW_UPS};
pub use generation::{
    ContextBuilder, ConversationTurn, GenerationRequest, LanguageModelService, TurnRole,
};
pub use inmemory::InMemoryVectorIndex;
pub use mapping::{CurriculumMapper, CurriculumMapping, RankedLabel};
pub use retriever::ChunkRetriever;
pub use sources::SourceBuilder;
pub use uncertainty::{
    HEDGE_MESSAGE, INSUFFICIENT_KNOWLEDGE_MESSAGE, UncertaintyLevel, UncertaintyPolicy,
};
pub use vectorstore::VectorIndex;
