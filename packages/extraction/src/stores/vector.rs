//! Vector Store Client (spec §4.11): a single unified Qdrant collection
//! holding both chunk and extraction vectors, distinguished by a
//! `content_type` payload field (spec §6 persisted layout).
//!
//! Grounded on `examples/original_source/packages/pipeline/src/storage/qdrant.py`
//! (`QdrantStorageClient`): UUID5 point-id derivation from string ids,
//! `_original_id` payload round-tripping, and filtered search all carry
//! over. The reference keeps chunks and extractions in separate
//! collections at 384 dimensions; this pipeline uses one collection at the
//! fixed 768-dimensional embedding size (see the design notes on vector
//! dimensionality).

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, Condition, CreateCollectionBuilder, Distance, Filter, PointId,
    PointStruct, QueryPointsBuilder, ScrollPointsBuilder, UpsertPointsBuilder,
    Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use tracing::info;
use uuid::Uuid;

use crate::error::{ExtractionError, Result};
use crate::types::ExtractionType;

pub const VECTOR_DIMENSION: usize = 768;
const COLLECTION: &str = "knowledge";
/// Fixed namespace so the same string id always maps to the same UUID.
const UUID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0xa7, 0xb8, 0x10, 0x9d, 0xad, 0x11, 0xd1, 0x80, 0xb4, 0x00, 0xc0, 0x4f, 0xd4, 0x30, 0xc8,
]);

/// One hit returned by a vector search, with the original string id
/// recovered from the `_original_id` payload field.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub original_id: String,
    pub score: f32,
    pub payload: HashMap<String, serde_json::Value>,
}

fn string_to_point_id(id: &str) -> PointId {
    Uuid::new_v5(&UUID_NAMESPACE, id.as_bytes()).to_string().into()
}

fn validate_dimension(vector: &[f32], context: &str) -> Result<()> {
    if vector.len() != VECTOR_DIMENSION {
        return Err(ExtractionError::Validation(format!(
            "{context} must be {VECTOR_DIMENSION} dimensions, got {}",
            vector.len()
        )));
    }
    Ok(())
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn connect(&self) -> Result<()>;
    async fn health_check(&self) -> bool;

    async fn upsert_chunk_vector(
        &self,
        chunk_id: &str,
        vector: Vec<f32>,
        payload: HashMap<String, serde_json::Value>,
    ) -> Result<()>;

    async fn upsert_extraction_vector(
        &self,
        extraction_id: &str,
        vector: Vec<f32>,
        payload: HashMap<String, serde_json::Value>,
    ) -> Result<()>;

    async fn search_chunks(
        &self,
        query_vector: Vec<f32>,
        filter: HashMap<String, Vec<String>>,
        limit: u64,
    ) -> Result<Vec<VectorHit>>;

    async fn search_extractions(
        &self,
        query_vector: Vec<f32>,
        filter: HashMap<String, Vec<String>>,
        limit: u64,
    ) -> Result<Vec<VectorHit>>;

    async fn count_by_source(&self, kind: &str, source_id: &str) -> Result<u64>;

    /// Scroll (no semantic query) for extractions of one category, most
    /// recent first, optionally narrowed to one topic (spec §4.11).
    async fn list_extractions(
        &self,
        extraction_type: ExtractionType,
        limit: u64,
        topic: Option<&str>,
    ) -> Result<Vec<VectorHit>>;

    /// Per-category extraction counts for one source.
    async fn count_extractions_by_source(&self, source_id: &str) -> Result<HashMap<ExtractionType, u64>>;

    /// Per-category extraction counts for several sources at once, keyed by
    /// source id.
    async fn count_extractions_by_sources(
        &self,
        source_ids: &[String],
    ) -> Result<HashMap<String, HashMap<ExtractionType, u64>>>;
}

pub struct QdrantVectorStore {
    client: Qdrant,
}

impl QdrantVectorStore {
    pub fn new(url: &str, api_key: Option<&str>) -> Result<Self> {
        let mut builder = Qdrant::from_url(url);
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        let client = builder
            .build()
            .map_err(|e| ExtractionError::Storage(Box::new(e)))?;
        Ok(Self { client })
    }

    async fn upsert(
        &self,
        kind: &str,
        id: &str,
        vector: Vec<f32>,
        mut payload: HashMap<String, serde_json::Value>,
    ) -> Result<()> {
        validate_dimension(&vector, &format!("{kind} vector"))?;
        payload.insert(
            "content_type".to_string(),
            serde_json::Value::String(kind.to_string()),
        );
        payload.insert(
            "_original_id".to_string(),
            serde_json::Value::String(id.to_string()),
        );

        let qdrant_payload: Payload = json_map_to_payload(payload);
        let point = PointStruct::new(string_to_point_id(id), vector, qdrant_payload);

        self.client
            .upsert_points(UpsertPointsBuilder::new(COLLECTION, vec![point]))
            .await
            .map_err(|e| ExtractionError::Storage(Box::new(e)))?;
        Ok(())
    }

    async fn search(
        &self,
        kind: &str,
        query_vector: Vec<f32>,
        filter: HashMap<String, Vec<String>>,
        limit: u64,
    ) -> Result<Vec<VectorHit>> {
        validate_dimension(&query_vector, "query vector")?;

        let mut must = vec![Condition::matches("content_type", kind.to_string())];
        for (key, values) in filter {
            if values.len() == 1 {
                must.push(Condition::matches(key, values[0].clone()));
            } else if !values.is_empty() {
                must.push(Condition::matches(key, values));
            }
        }

        let response = self
            .client
            .query(
                QueryPointsBuilder::new(COLLECTION)
                    .query(query_vector)
                    .filter(Filter::must(must))
                    .limit(limit)
                    .with_payload(true),
            )
            .await
            .map_err(|e| ExtractionError::Storage(Box::new(e)))?;

        Ok(response
            .result
            .into_iter()
            .map(|point| {
                let mut payload = payload_to_json_map(point.payload);
                let original_id = payload
                    .remove("_original_id")
                    .and_then(|v| v.as_str().map(String::from))
                    .unwrap_or_else(|| point_id_to_string(point.id));
                payload.remove("content_type");
                VectorHit {
                    original_id,
                    score: point.score,
                    payload,
                }
            })
            .collect())
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn connect(&self) -> Result<()> {
        let existing = self
            .client
            .list_collections()
            .await
            .map_err(|e| ExtractionError::Storage(Box::new(e)))?;

        if !existing.collections.iter().any(|c| c.name == COLLECTION) {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(COLLECTION)
                        .vectors_config(VectorParamsBuilder::new(VECTOR_DIMENSION as u64, Distance::Cosine)),
                )
                .await
                .map_err(|e| ExtractionError::Storage(Box::new(e)))?;
            info!(collection = COLLECTION, "qdrant collection created");
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        self.client.list_collections().await.is_ok()
    }

    async fn upsert_chunk_vector(
        &self,
        chunk_id: &str,
        vector: Vec<f32>,
        payload: HashMap<String, serde_json::Value>,
    ) -> Result<()> {
        self.upsert("chunk", chunk_id, vector, payload).await
    }

    async fn upsert_extraction_vector(
        &self,
        extraction_id: &str,
        vector: Vec<f32>,
        payload: HashMap<String, serde_json::Value>,
    ) -> Result<()> {
        self.upsert("extraction", extraction_id, vector, payload).await
    }

    async fn search_chunks(
        &self,
        query_vector: Vec<f32>,
        filter: HashMap<String, Vec<String>>,
        limit: u64,
    ) -> Result<Vec<VectorHit>> {
        self.search("chunk", query_vector, filter, limit).await
    }

    async fn search_extractions(
        &self,
        query_vector: Vec<f32>,
        filter: HashMap<String, Vec<String>>,
        limit: u64,
    ) -> Result<Vec<VectorHit>> {
        self.search("extraction", query_vector, filter, limit).await
    }

    async fn count_by_source(&self, kind: &str, source_id: &str) -> Result<u64> {
        let filter = Filter::must(vec![
            Condition::matches("content_type", kind.to_string()),
            Condition::matches("source_id", source_id.to_string()),
        ]);

        let mut total: u64 = 0;
        let mut offset = None;
        loop {
            let mut builder = ScrollPointsBuilder::new(COLLECTION)
                .filter(filter.clone())
                .limit(250)
                .with_payload(false)
                .with_vectors(false);
            if let Some(o) = offset.take() {
                builder = builder.offset(o);
            }
            let response = self
                .client
                .scroll(builder)
                .await
                .map_err(|e| ExtractionError::Storage(Box::new(e)))?;
            total += response.result.len() as u64;
            offset = response.next_page_offset;
            if offset.is_none() {
                break;
            }
        }
        Ok(total)
    }

    async fn list_extractions(
        &self,
        extraction_type: ExtractionType,
        limit: u64,
        topic: Option<&str>,
    ) -> Result<Vec<VectorHit>> {
        let mut must = vec![
            Condition::matches("content_type", "extraction".to_string()),
            Condition::matches("extraction_type", extraction_type.as_str().to_string()),
        ];
        if let Some(topic) = topic {
            must.push(Condition::matches("topics", topic.to_string()));
        }

        let response = self
            .client
            .scroll(
                ScrollPointsBuilder::new(COLLECTION)
                    .filter(Filter::must(must))
                    .limit(limit as u32)
                    .with_payload(true)
                    .with_vectors(false),
            )
            .await
            .map_err(|e| ExtractionError::Storage(Box::new(e)))?;

        Ok(response
            .result
            .into_iter()
            .map(|point| {
                let mut payload = payload_to_json_map(point.payload);
                let original_id = payload
                    .remove("_original_id")
                    .and_then(|v| v.as_str().map(String::from))
                    .unwrap_or_else(|| point_id_to_string(point.id));
                payload.remove("content_type");
                VectorHit { original_id, score: 0.0, payload }
            })
            .collect())
    }

    async fn count_extractions_by_source(&self, source_id: &str) -> Result<HashMap<ExtractionType, u64>> {
        let filter = Filter::must(vec![
            Condition::matches("content_type", "extraction".to_string()),
            Condition::matches("source_id", source_id.to_string()),
        ]);

        let mut counts: HashMap<ExtractionType, u64> = HashMap::new();
        let mut offset = None;
        loop {
            let mut builder = ScrollPointsBuilder::new(COLLECTION)
                .filter(filter.clone())
                .limit(250)
                .with_payload(true)
                .with_vectors(false);
            if let Some(o) = offset.take() {
                builder = builder.offset(o);
            }
            let response = self
                .client
                .scroll(builder)
                .await
                .map_err(|e| ExtractionError::Storage(Box::new(e)))?;
            for point in response.result {
                let payload = payload_to_json_map(point.payload);
                if let Some(extraction_type) =
                    payload.get("extraction_type").and_then(|v| v.as_str()).and_then(ExtractionType::parse)
                {
                    *counts.entry(extraction_type).or_insert(0) += 1;
                }
            }
            offset = response.next_page_offset;
            if offset.is_none() {
                break;
            }
        }
        Ok(counts)
    }

    async fn count_extractions_by_sources(
        &self,
        source_ids: &[String],
    ) -> Result<HashMap<String, HashMap<ExtractionType, u64>>> {
        if source_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let filter = Filter::must(vec![
            Condition::matches("content_type", "extraction".to_string()),
            Condition::matches("source_id", source_ids.to_vec()),
        ]);

        let mut counts: HashMap<String, HashMap<ExtractionType, u64>> = HashMap::new();
        let mut offset = None;
        loop {
            let mut builder = ScrollPointsBuilder::new(COLLECTION)
                .filter(filter.clone())
                .limit(250)
                .with_payload(true)
                .with_vectors(false);
            if let Some(o) = offset.take() {
                builder = builder.offset(o);
            }
            let response = self
                .client
                .scroll(builder)
                .await
                .map_err(|e| ExtractionError::Storage(Box::new(e)))?;
            for point in response.result {
                let payload = payload_to_json_map(point.payload);
                let source_id = payload.get("source_id").and_then(|v| v.as_str()).map(String::from);
                let extraction_type =
                    payload.get("extraction_type").and_then(|v| v.as_str()).and_then(ExtractionType::parse);
                if let (Some(source_id), Some(extraction_type)) = (source_id, extraction_type) {
                    *counts.entry(source_id).or_default().entry(extraction_type).or_insert(0) += 1;
                }
            }
            offset = response.next_page_offset;
            if offset.is_none() {
                break;
            }
        }
        Ok(counts)
    }
}

fn point_id_to_string(id: Option<PointId>) -> String {
    match id.and_then(|p| p.point_id_options) {
        Some(PointIdOptions::Uuid(u)) => u,
        Some(PointIdOptions::Num(n)) => n.to_string(),
        None => String::new(),
    }
}

fn json_map_to_payload(map: HashMap<String, serde_json::Value>) -> Payload {
    let mut payload = Payload::new();
    for (key, value) in map {
        payload.insert(key, json_to_qdrant_value(value));
    }
    payload
}

fn json_to_qdrant_value(value: serde_json::Value) -> QdrantValue {
    QdrantValue::from(value)
}

fn payload_to_json_map(
    payload: HashMap<String, QdrantValue>,
) -> HashMap<String, serde_json::Value> {
    payload
        .into_iter()
        .filter_map(|(k, v)| {
            serde_json::to_value(&v).ok().map(|jv| (k, jv))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_ids_are_stable_across_calls() {
        let a = string_to_point_id("abc123");
        let b = string_to_point_id("abc123");
        assert_eq!(a, b);
    }

    #[test]
    fn dimension_validation_rejects_wrong_size() {
        let vector = vec![0.0_f32; 384];
        assert!(validate_dimension(&vector, "test").is_err());
    }

    #[test]
    fn dimension_validation_accepts_768() {
        let vector = vec![0.0_f32; VECTOR_DIMENSION];
        assert!(validate_dimension(&vector, "test").is_ok());
    }
}
