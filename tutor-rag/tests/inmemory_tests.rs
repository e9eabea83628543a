//! Property tests for in-memory vector index ordering and filtering.

use std::collections::HashMap;

use proptest::prelude::*;
use serde_json::json;
use tutor_rag::{
    CurriculumFilter, IndexRecord, InMemoryVectorIndex, Metadata, RagError, Syllabus, VectorIndex,
};

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map("non-zero embedding", |mut v| {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm < 1e-8 {
            return None;
        }
        for val in &mut v {
            *val /= norm;
        }
        Some(v)
    })
}

/// Generate a record tagged with a grade and syllabus.
fn arb_record(dim: usize) -> impl Strategy<Value = IndexRecord> {
    ("[a-z]{3,8}", "[a-z ]{5,30}", arb_normalized_embedding(dim), 5u8..=10, any::<bool>()).prop_map(
        |(id, text, embedding, grade, cbse)| {
            let syllabus = if cbse { "cbse" } else { "state" };
            let metadata: Metadata =
                serde_json::from_value(json!({"grade": grade, "syllabus": syllabus})).unwrap();
            IndexRecord { id, text, embedding, metadata }
        },
    )
}

fn dedup(records: &[IndexRecord]) -> Vec<IndexRecord> {
    let mut unique: HashMap<String, IndexRecord> = HashMap::new();
    for record in records {
        unique.entry(record.id.clone()).or_insert_with(|| record.clone());
    }
    unique.into_values().collect()
}

/// **Property 1: In-memory index ordering**
/// *For any* set of records stored in an InMemoryVectorIndex, querying with
/// an embedding SHALL return hits ordered by ascending cosine distance, every
/// distance SHALL lie in `[0, 2]`, and there SHALL be at most top_k hits.
mod prop_inmemory_query_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn hits_ordered_by_distance_and_bounded_by_top_k(
            records in proptest::collection::vec(arb_record(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let unique = dedup(&records);
            let unique_count = unique.len();
            let hits = rt.block_on(async {
                let index = InMemoryVectorIndex::new();
                index.upsert(&unique).await.unwrap();
                index.query(&query, top_k, None).await.unwrap()
            });

            prop_assert!(hits.len() <= top_k);
            prop_assert_eq!(hits.len(), top_k.min(unique_count));
            for hit in &hits {
                prop_assert!((0.0..=2.0).contains(&hit.distance));
            }
            for window in hits.windows(2) {
                prop_assert!(
                    window[0].distance <= window[1].distance,
                    "hits not in ascending distance order: {} > {}",
                    window[0].distance,
                    window[1].distance,
                );
            }
        }
    }
}

/// **Property 2: Filters are conjunctive**
/// *For any* stored records and any grade/syllabus filter, every hit SHALL
/// carry exactly that grade and syllabus, and no matching record SHALL be
/// missed when top_k covers the whole index.
mod prop_inmemory_filtering {
    use super::*;

    const DIM: usize = 8;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn filtered_hits_match_every_condition(
            records in proptest::collection::vec(arb_record(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            grade in 5u8..=10,
            cbse in any::<bool>(),
        ) {
            let syllabus = if cbse { Syllabus::Cbse } else { Syllabus::State };
            let filter = CurriculumFilter::new().grade(grade).syllabus(syllabus).compile().unwrap();
            let unique = dedup(&records);
            let expected = unique.iter().filter(|r| filter.matches(&r.metadata)).count();

            let rt = tokio::runtime::Runtime::new().unwrap();
            let hits = rt.block_on(async {
                let index = InMemoryVectorIndex::new();
                index.upsert(&unique).await.unwrap();
                index.query(&query, unique.len(), Some(&filter)).await.unwrap()
            });

            prop_assert_eq!(hits.len(), expected);
            for hit in &hits {
                prop_assert_eq!(&hit.metadata["grade"], &json!(grade));
                prop_assert_eq!(&hit.metadata["syllabus"], &json!(syllabus.as_str()));
            }
        }
    }
}

fn record(id: &str, embedding: Vec<f32>) -> IndexRecord {
    IndexRecord {
        id: id.into(),
        text: format!("text of {id}"),
        embedding,
        metadata: Metadata::new(),
    }
}

#[tokio::test]
async fn upsert_replaces_by_id_and_delete_removes() {
    let index = InMemoryVectorIndex::new();
    index.upsert(&[record("a", vec![1.0, 0.0]), record("b", vec![0.0, 1.0])]).await.unwrap();
    index.upsert(&[record("a", vec![0.0, 1.0])]).await.unwrap();
    assert_eq!(index.count().await.unwrap(), 2);

    let hits = index.query(&[0.0, 1.0], 2, None).await.unwrap();
    assert!(hits.iter().all(|h| h.distance.abs() < 1e-6));
    assert_eq!(hits[0].id, "a");

    index.delete(&["a", "missing"]).await.unwrap();
    assert_eq!(index.count().await.unwrap(), 1);
}

#[tokio::test]
async fn empty_embeddings_are_rejected() {
    let index = InMemoryVectorIndex::new();
    let err = index.upsert(&[record("a", Vec::new())]).await.unwrap_err();
    assert!(matches!(err, RagError::VectorStoreError { .. }));
    assert_eq!(index.count().await.unwrap(), 0);
}

#[tokio::test]
async fn empty_index_returns_no_hits() {
    let index = InMemoryVectorIndex::new();
    assert!(index.query(&[1.0, 0.0], 5, None).await.unwrap().is_empty());
}
