//! End-to-end behaviour of the tutoring engine against stub collaborators.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    FailingEmbedder, FailingIndex, FailingModel, FixedIndex, RecordingModel, SlowEmbedder,
    SlowIndex, SlowModel, hit,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tutor_rag::{
    ConversationTurn, CurriculumInfo, EngineConfig, HEDGE_MESSAGE, HashingEmbeddingProvider,
    INSUFFICIENT_KNOWLEDGE_MESSAGE, InMemoryVectorIndex, QueryContext, RagError, Syllabus,
    TextbookDocument, TutorEngine,
};

fn engine_with(index: Arc<FixedIndex>, config: EngineConfig) -> TutorEngine {
    TutorEngine::builder()
        .config(config)
        .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
        .vector_index(index)
        .build()
        .unwrap()
}

fn physics_chunk_at(distance: f32) -> Arc<FixedIndex> {
    Arc::new(FixedIndex::new(vec![hit(
        "phy-8_0",
        "Force is a push or a pull on an object.",
        distance,
        json!({"grade": 8, "syllabus": "cbse", "subject": "Physics", "chunk_index": 0}),
    )]))
}

#[tokio::test]
async fn weak_chunk_without_curriculum_is_insufficient() {
    let model = Arc::new(RecordingModel::default());
    let engine = TutorEngine::builder()
        .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
        .vector_index(physics_chunk_at(0.4))
        .language_model(model.clone())
        .build()
        .unwrap();

    let response = engine.query("What is force?", None).await.unwrap();

    assert_eq!(response.confidence, 0.0);
    assert!(response.has_uncertainty);
    assert_eq!(response.answer, INSUFFICIENT_KNOWLEDGE_MESSAGE);
    assert_eq!(response.uncertainty_message.as_deref(), Some(INSUFFICIENT_KNOWLEDGE_MESSAGE));
    assert!(response.sources.is_empty());
    assert!(response.curriculum_mapping.is_none());
    assert!(model.requests().is_empty());
}

#[tokio::test]
async fn curriculum_boost_lifts_weak_chunk_above_threshold() {
    let model = Arc::new(RecordingModel::default());
    let index = physics_chunk_at(0.4);
    let engine = TutorEngine::builder()
        .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
        .vector_index(index.clone())
        .language_model(model.clone())
        .build()
        .unwrap();

    let context = QueryContext::for_student(8, Syllabus::Cbse);
    let response = engine.query("What is force?", Some(&context)).await.unwrap();

    assert!((response.confidence - 0.695).abs() < 1e-4);
    assert!(!response.has_uncertainty);
    assert!(response.uncertainty_message.is_none());
    assert_eq!(response.answer, "Generated answer to: What is force?");
    assert_eq!(response.sources.len(), 1);
    let source = &response.sources[0];
    assert!((source.similarity - 0.85).abs() < 1e-4);
    assert_eq!(source.document_id, "phy-8_0");
    assert_eq!(source.grade, Some(8));
    assert_eq!(source.subject.as_deref(), Some("Physics"));

    let mapping = response.curriculum_mapping.unwrap();
    assert!(!mapping.mapped);
    assert_eq!(mapping.primary_subject.as_deref(), Some("Physics"));

    // One exact query, one relaxed query to fill the remaining slots.
    assert_eq!(index.filtered_queries(), 1);
    assert_eq!(index.unfiltered_queries(), 1);
}

#[tokio::test]
async fn middling_confidence_prepends_the_hedge() {
    let model = Arc::new(RecordingModel::default());
    let config = EngineConfig::builder().similarity_threshold(0.5).build().unwrap();
    let engine = TutorEngine::builder()
        .config(config)
        .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
        .vector_index(physics_chunk_at(0.5))
        .language_model(model)
        .build()
        .unwrap();

    let response = engine.query("What is force?", None).await.unwrap();

    assert!((response.confidence - 0.45).abs() < 1e-4);
    assert!(response.has_uncertainty);
    assert_eq!(response.uncertainty_message.as_deref(), Some(HEDGE_MESSAGE));
    assert_eq!(
        response.answer,
        format!("{HEDGE_MESSAGE}\n\nGenerated answer to: What is force?")
    );
    assert_eq!(response.sources.len(), 1);
}

#[tokio::test]
async fn empty_store_discloses_without_sources() {
    let engine = engine_with(Arc::new(FixedIndex::default()), EngineConfig::default());

    let context = QueryContext::for_student(9, Syllabus::State);
    let response = engine.query("What is a cell?", Some(&context)).await.unwrap();

    assert!(response.has_uncertainty);
    assert!(response.sources.is_empty());
    assert_eq!(response.confidence, 0.0);
    assert!(!response.answer.is_empty());
    assert!(response.suggested_follow_ups.len() <= 5);
}

#[tokio::test]
async fn generation_failure_falls_back_to_chunk_text() {
    let engine = TutorEngine::builder()
        .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
        .vector_index(physics_chunk_at(0.1))
        .language_model(Arc::new(FailingModel))
        .build()
        .unwrap();

    let response = engine.query("What is force?", None).await.unwrap();

    assert!(response.answer.contains("Force is a push or a pull on an object."));
    assert_eq!(response.sources.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn generation_timeout_falls_back_to_chunk_text() {
    let config = EngineConfig::builder()
        .generation_timeout(Duration::from_millis(100))
        .build()
        .unwrap();
    let engine = TutorEngine::builder()
        .config(config)
        .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
        .vector_index(physics_chunk_at(0.1))
        .language_model(Arc::new(SlowModel))
        .build()
        .unwrap();

    let response = engine.query("What is force?", None).await.unwrap();

    assert!(response.answer.contains("Force is a push or a pull on an object."));
    assert!(!response.answer.contains("too late"));
}

#[tokio::test]
async fn no_language_model_answers_extractively() {
    let engine = engine_with(physics_chunk_at(0.1), EngineConfig::default());
    let response = engine.query("What is force?", None).await.unwrap();
    assert!(response.answer.contains("Force is a push or a pull on an object."));
    assert!(!response.has_uncertainty);
}

#[tokio::test]
async fn embedding_failure_is_a_retrieval_error() {
    let engine = TutorEngine::builder()
        .embedding_provider(Arc::new(FailingEmbedder))
        .vector_index(physics_chunk_at(0.1))
        .build()
        .unwrap();

    let err = engine.query("What is force?", None).await.unwrap_err();
    assert!(matches!(err, RagError::RetrievalError(ref msg) if msg.contains("quota exceeded")));
    assert!(err.is_retrieval());
}

#[tokio::test]
async fn index_failure_is_a_retrieval_error() {
    let engine = TutorEngine::builder()
        .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
        .vector_index(Arc::new(FailingIndex))
        .build()
        .unwrap();

    let err = engine.query("What is force?", None).await.unwrap_err();
    assert!(matches!(err, RagError::RetrievalError(ref msg) if msg.contains("connection refused")));
    assert!(err.is_retrieval());
}

#[tokio::test(start_paused = true)]
async fn embedding_timeout_is_a_retrieval_error() {
    let config = EngineConfig::builder()
        .embedding_timeout(Duration::from_millis(100))
        .build()
        .unwrap();
    let engine = TutorEngine::builder()
        .config(config)
        .embedding_provider(Arc::new(SlowEmbedder))
        .vector_index(physics_chunk_at(0.1))
        .build()
        .unwrap();

    let err = engine.query("What is force?", None).await.unwrap_err();
    assert!(matches!(err, RagError::RetrievalError(ref msg) if msg.contains("timed out")));
    assert!(err.is_retrieval());
}

#[tokio::test(start_paused = true)]
async fn index_timeout_is_a_retrieval_error() {
    let config = EngineConfig::builder().index_timeout(Duration::from_millis(100)).build().unwrap();
    let engine = TutorEngine::builder()
        .config(config)
        .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
        .vector_index(Arc::new(SlowIndex))
        .build()
        .unwrap();

    let context = QueryContext::for_student(8, Syllabus::Cbse);
    let err = engine.query("What is force?", Some(&context)).await.unwrap_err();
    assert!(matches!(err, RagError::RetrievalError(ref msg) if msg.contains("timed out")));
    assert!(err.is_retrieval());
}

#[tokio::test]
async fn cancelled_queries_stop_early() {
    let engine = engine_with(physics_chunk_at(0.1), EngineConfig::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = engine.query_with_cancel("What is force?", None, &cancel).await.unwrap_err();
    assert!(matches!(err, RagError::Cancelled(_)));
}

#[tokio::test]
async fn request_carries_style_grade_and_history() {
    let model = Arc::new(RecordingModel::default());
    let engine = TutorEngine::builder()
        .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
        .vector_index(physics_chunk_at(0.1))
        .language_model(model.clone())
        .build()
        .unwrap();

    let context = QueryContext::for_student(8, Syllabus::Cbse)
        .with_style("step by step")
        .with_history(vec![ConversationTurn::student("Hi"), ConversationTurn::tutor("Hello!")]);
    engine.query("What is force?", Some(&context)).await.unwrap();

    let requests = model.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.style.as_deref(), Some("step by step"));
    assert_eq!(request.grade, Some(8));
    assert_eq!(request.history.len(), 2);
    assert!(request.context.starts_with("[1] (Physics)\nForce is a push"));
}

#[tokio::test]
async fn enough_exact_matches_skip_the_relaxed_query() {
    let hits = (0..6)
        .map(|i| {
            hit(
                &format!("bio-7_{i}"),
                &format!("Cells are the unit of life, part {i}."),
                0.1 + i as f32 * 0.01,
                json!({"grade": 7, "syllabus": "state", "subject": "Biology"}),
            )
        })
        .chain(std::iter::once(hit(
            "bio-9_0",
            "Tissues are groups of cells.",
            0.0,
            json!({"grade": 9, "syllabus": "cbse"}),
        )))
        .collect();
    let index = Arc::new(FixedIndex::new(hits));
    let engine = engine_with(index.clone(), EngineConfig::default());

    let target = CurriculumInfo::new(7, Syllabus::State).unwrap();
    let chunks = engine.retrieve_with_curriculum_priority("cells", &target, Some(3)).await.unwrap();

    assert_eq!(chunks.len(), 3);
    assert!(chunks.iter().all(|c| c.document_id() != Some("bio-9_0")));
    assert!(chunks.windows(2).all(|w| w[0].similarity() >= w[1].similarity()));
    assert_eq!(index.unfiltered_queries(), 0);
}

#[tokio::test]
async fn relaxed_fallback_fills_gaps_after_exact_matches() {
    let index = Arc::new(FixedIndex::new(vec![
        hit("exact", "Exact match.", 0.3, json!({"grade": 6, "syllabus": "cbse"})),
        hit("other", "Other grade.", 0.05, json!({"grade": 10, "syllabus": "cbse"})),
        hit("weak", "Weak stranger.", 0.9, json!({})),
    ]));
    let target = CurriculumInfo::new(6, Syllabus::Cbse).unwrap();

    let permissive = engine_with(index.clone(), EngineConfig::default());
    let chunks = permissive.retrieve_with_curriculum_priority("q", &target, None).await.unwrap();
    let ids: Vec<&str> = chunks.iter().filter_map(|c| c.document_id()).collect();
    // "other" only earns the syllabus boost but starts far closer.
    assert_eq!(ids, ["other", "exact", "weak"]);

    let floored = engine_with(
        index,
        EngineConfig::builder().relaxed_similarity_floor(0.5).build().unwrap(),
    );
    let chunks = floored.retrieve_with_curriculum_priority("q", &target, None).await.unwrap();
    let ids: Vec<&str> = chunks.iter().filter_map(|c| c.document_id()).collect();
    assert_eq!(ids, ["other", "exact"]);
}

#[tokio::test]
async fn questions_map_to_chapters_and_topics() {
    let index = Arc::new(FixedIndex::new(vec![
        hit("a", "Reflection.", 0.1, json!({"chapter": "Light", "topic": "Reflection"})),
        hit("b", "Mirrors.", 0.15, json!({"chapter": "Light", "topic": "Mirrors"})),
        hit("c", "Echo.", 0.2, json!({"chapter": "Sound"})),
    ]));
    let engine = engine_with(index, EngineConfig::default());

    let mapping = engine.map_question_to_curriculum("How do mirrors work?", None).await.unwrap();

    assert!(mapping.mapped);
    assert_eq!(mapping.primary_chapter.as_deref(), Some("Light"));
    assert_eq!(mapping.chapters.len(), 2);
    assert_eq!(mapping.topics.len(), 2);
}

#[tokio::test]
async fn ingested_textbooks_are_retrievable() {
    let engine = TutorEngine::builder()
        .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
        .vector_index(Arc::new(InMemoryVectorIndex::new()))
        .build()
        .unwrap();

    let curriculum = CurriculumInfo::new(7, Syllabus::Cbse)
        .unwrap()
        .with_subject("Science")
        .with_chapter("Nutrition in Plants");
    let textbook = TextbookDocument {
        id: "sci-7-ch1".into(),
        title: Some("Science Class 7".into()),
        text: "Green plants make their own food by photosynthesis.\n\n\
               Chlorophyll in the leaves captures energy from sunlight."
            .into(),
        curriculum,
        metadata: Default::default(),
    };
    let stored = engine.ingest_batch(&[textbook]).await.unwrap();
    assert_eq!(stored, 1);
    assert_eq!(engine.indexed_chunks().await.unwrap(), 1);

    let context = QueryContext::for_student(7, Syllabus::Cbse);
    let response = engine
        .query(
            "Green plants make their own food by photosynthesis. Chlorophyll in the leaves \
             captures energy from sunlight.",
            Some(&context),
        )
        .await
        .unwrap();

    assert_eq!(response.sources.len(), 1);
    assert_eq!(response.sources[0].document_id, "sci-7-ch1");
    assert_eq!(response.sources[0].chapter.as_deref(), Some("Nutrition in Plants"));
    assert!(
        response
            .suggested_follow_ups
            .contains(&"What are the key ideas in Nutrition in Plants?".to_string())
    );
    assert!(!response.has_uncertainty);
}

#[tokio::test]
async fn concurrent_queries_share_one_engine() {
    let engine = Arc::new(engine_with(physics_chunk_at(0.1), EngineConfig::default()));
    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.query(&format!("question {i}"), None).await })
        })
        .collect();
    for task in tasks {
        let response = task.await.unwrap().unwrap();
        assert_eq!(response.sources.len(), 1);
    }
}
