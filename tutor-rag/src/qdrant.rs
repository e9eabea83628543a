//! Qdrant vector index backend.
//!
//! Provides [`QdrantVectorIndex`], which implements [`VectorIndex`] on one
//! Qdrant collection using the [qdrant-client](https://docs.rs/qdrant-client)
//! crate over gRPC.
//!
//! Points are stored under a UUIDv5 derived from the record id, since Qdrant
//! only accepts integers and UUIDs as point ids. The payload carries the
//! original id, the chunk text and the metadata object; curriculum filters
//! compile to `must` conditions on `metadata.<field>`.
//!
//! # Example
//!
//! ```rust,ignore
//! use tutor_rag::qdrant::QdrantVectorIndex;
//!
//! let index = QdrantVectorIndex::new("http://localhost:6334", "textbooks")?;
//! index.ensure_collection(384).await?;
//! index.upsert(&records).await?;
//! ```

use async_trait::async_trait;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    PointId, PointStruct, PointsIdsList, ScoredPoint, SearchPointsBuilder, UpsertPointsBuilder,
    Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::document::{IndexMatch, IndexRecord, Metadata};
use crate::error::{RagError, Result};
use crate::filter::{FilterCondition, MetadataFilter};
use crate::vectorstore::VectorIndex;

const BACKEND: &str = "qdrant";
const ID_KEY: &str = "record_id";
const TEXT_KEY: &str = "text";
const METADATA_KEY: &str = "metadata";

/// A [`VectorIndex`] backed by a [Qdrant](https://qdrant.tech/) collection
/// with cosine distance.
pub struct QdrantVectorIndex {
    client: Qdrant,
    collection: String,
}

impl QdrantVectorIndex {
    /// Connect to the Qdrant server at `url` and use `collection`.
    pub fn new(url: &str, collection: impl Into<String>) -> Result<Self> {
        let client = Qdrant::from_url(url).build().map_err(map_err)?;
        Ok(Self { client, collection: collection.into() })
    }

    /// Use an existing client.
    pub fn from_client(client: Qdrant, collection: impl Into<String>) -> Self {
        Self { client, collection: collection.into() }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Create the collection with the given dimensionality if it does not
    /// exist yet.
    pub async fn ensure_collection(&self, dimensions: usize) -> Result<()> {
        let collections = self.client.list_collections().await.map_err(map_err)?;
        if collections.collections.iter().any(|c| c.name == self.collection) {
            debug!(collection = %self.collection, "qdrant collection already exists");
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(dimensions as u64, Distance::Cosine)),
            )
            .await
            .map_err(map_err)?;

        debug!(collection = %self.collection, dimensions, "created qdrant collection");
        Ok(())
    }
}

fn map_err(e: qdrant_client::QdrantError) -> RagError {
    RagError::VectorStoreError { backend: BACKEND.to_string(), message: e.to_string() }
}

/// Stable point id for a record id.
fn point_id(record_id: &str) -> PointId {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, record_id.as_bytes()).to_string().into()
}

fn compile_filter(filter: &MetadataFilter) -> Filter {
    Filter::must(filter.conditions().iter().map(|condition| {
        let key = format!("{METADATA_KEY}.{}", condition.field());
        match condition {
            FilterCondition::Grade(grade) => Condition::matches(key, i64::from(*grade)),
            FilterCondition::Syllabus(syllabus) => {
                Condition::matches(key, syllabus.as_str().to_string())
            }
            FilterCondition::Subject(value)
            | FilterCondition::Chapter(value)
            | FilterCondition::Topic(value) => Condition::matches(key, value.clone()),
        }
    }))
}

fn to_payload(record: &IndexRecord) -> Result<Payload> {
    let mut payload = Map::new();
    payload.insert(ID_KEY.to_string(), Value::String(record.id.clone()));
    payload.insert(TEXT_KEY.to_string(), Value::String(record.text.clone()));
    let metadata: Map<String, Value> =
        record.metadata.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    payload.insert(METADATA_KEY.to_string(), Value::Object(metadata));
    Payload::try_from(Value::Object(payload)).map_err(map_err)
}

fn to_json(value: &QdrantValue) -> Value {
    match &value.kind {
        Some(Kind::BoolValue(b)) => Value::Bool(*b),
        Some(Kind::IntegerValue(i)) => Value::from(*i),
        Some(Kind::DoubleValue(d)) => Value::from(*d),
        Some(Kind::StringValue(s)) => Value::String(s.clone()),
        Some(Kind::ListValue(list)) => Value::Array(list.values.iter().map(to_json).collect()),
        Some(Kind::StructValue(s)) => {
            Value::Object(s.fields.iter().map(|(k, v)| (k.clone(), to_json(v))).collect())
        }
        Some(Kind::NullValue(_)) | None => Value::Null,
    }
}

fn to_match(point: ScoredPoint) -> IndexMatch {
    let text = |key: &str| match point.payload.get(key).map(to_json) {
        Some(Value::String(s)) => s,
        _ => String::new(),
    };
    let metadata: Metadata = match point.payload.get(METADATA_KEY).map(to_json) {
        Some(Value::Object(fields)) => fields.into_iter().collect(),
        _ => Metadata::new(),
    };
    IndexMatch {
        id: text(ID_KEY),
        text: text(TEXT_KEY),
        metadata,
        distance: (1.0 - point.score).clamp(0.0, 2.0),
    }
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
    async fn upsert(&self, records: &[IndexRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let points = records
            .iter()
            .map(|record| {
                let payload = to_payload(record)?;
                Ok(PointStruct::new(point_id(&record.id), record.embedding.clone(), payload))
            })
            .collect::<Result<Vec<PointStruct>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(map_err)?;

        debug!(collection = %self.collection, count = records.len(), "upserted records to qdrant");
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexMatch>> {
        let mut request =
            SearchPointsBuilder::new(&self.collection, embedding.to_vec(), top_k as u64)
                .with_payload(true);
        if let Some(filter) = filter {
            request = request.filter(compile_filter(filter));
        }

        let response = self.client.search_points(request).await.map_err(map_err)?;
        Ok(response.result.into_iter().map(to_match).collect())
    }

    async fn delete(&self, ids: &[&str]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let ids: Vec<PointId> = ids.iter().map(|id| point_id(id)).collect();
        let count = ids.len();
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection).points(PointsIdsList { ids }).wait(true),
            )
            .await
            .map_err(map_err)?;

        debug!(collection = %self.collection, count, "deleted points from qdrant");
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await
            .map_err(map_err)?;
        Ok(response.result.map_or(0, |r| r.count as usize))
    }
}
