//! In-memory fakes for the storage and gateway seams, so the orchestrator
//! and extractor layers can be exercised without a live MongoDB, Qdrant, or
//! Anthropic backend.
//!
//! Grounded on the teacher's `stores/memory.rs` `MemoryStore` pattern: plain
//! `RwLock<HashMap<..>>` fields, no connection lifecycle to speak of, data
//! lost on drop.

#![cfg(any(test, feature = "test-support"))]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ExtractionError, GatewayError, GatewayResult, Result};
use crate::llm::LlmGateway;
use crate::stores::{DocumentStore, VectorHit, VectorStore};
use crate::types::{Chunk, Extraction, ExtractionType, Source, SourceStatus};

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// In-memory [`DocumentStore`]. Ids are assigned sequentially, formatted as
/// 24-hex-digit strings so callers that validate "ObjectId shape" still work.
pub struct MemoryDocumentStore {
    sources: RwLock<HashMap<String, Source>>,
    chunks: RwLock<HashMap<String, Chunk>>,
    extractions: RwLock<HashMap<String, Extraction>>,
    next_id: AtomicU64,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(HashMap::new()),
            chunks: RwLock::new(HashMap::new()),
            extractions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn generate_id(&self) -> String {
        format!("{:024x}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Test setup helper: insert a source under its existing id (or assign
    /// one if empty), returning the id actually used.
    pub fn seed_source(&self, mut source: Source) -> String {
        if source.id.is_empty() {
            source.id = self.generate_id();
        }
        let id = source.id.clone();
        self.sources.write().unwrap().insert(id.clone(), source);
        id
    }

    /// Test setup helper: insert a chunk under its existing id (or assign
    /// one if empty), returning the id actually used.
    pub fn seed_chunk(&self, mut chunk: Chunk) -> String {
        if chunk.id.is_empty() {
            chunk.id = self.generate_id();
        }
        let id = chunk.id.clone();
        self.chunks.write().unwrap().insert(id.clone(), chunk);
        id
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    async fn ping(&self) -> bool {
        true
    }

    async fn get_source(&self, source_id: &str) -> Result<Source> {
        self.sources
            .read()
            .unwrap()
            .get(source_id)
            .cloned()
            .ok_or_else(|| ExtractionError::NotFound(format!("source {source_id}")))
    }

    async fn list_sources(&self, status: Option<SourceStatus>) -> Result<Vec<Source>> {
        Ok(self
            .sources
            .read()
            .unwrap()
            .values()
            .filter(|s| status.map(|st| st == s.status).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn get_chunk(&self, chunk_id: &str) -> Result<Chunk> {
        self.chunks
            .read()
            .unwrap()
            .get(chunk_id)
            .cloned()
            .ok_or_else(|| ExtractionError::NotFound(format!("chunk {chunk_id}")))
    }

    async fn get_chunks_by_source(&self, source_id: &str) -> Result<Vec<Chunk>> {
        let mut chunks: Vec<Chunk> = self
            .chunks
            .read()
            .unwrap()
            .values()
            .filter(|c| c.source_id == source_id)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.sort_key());
        Ok(chunks)
    }

    async fn count_chunks_by_source(&self, source_id: &str) -> Result<u64> {
        Ok(self
            .chunks
            .read()
            .unwrap()
            .values()
            .filter(|c| c.source_id == source_id)
            .count() as u64)
    }

    async fn create_chunks_bulk(&self, chunks: &[Chunk]) -> Result<Vec<String>> {
        let mut store = self.chunks.write().unwrap();
        let mut ids = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let id = self.generate_id();
            let mut chunk = chunk.clone();
            chunk.id = id.clone();
            store.insert(id.clone(), chunk);
            ids.push(id);
        }
        Ok(ids)
    }

    async fn get_extraction(&self, extraction_id: &str) -> Result<Extraction> {
        self.extractions
            .read()
            .unwrap()
            .get(extraction_id)
            .cloned()
            .ok_or_else(|| ExtractionError::NotFound(format!("extraction {extraction_id}")))
    }

    async fn get_extractions_by_source(&self, source_id: &str) -> Result<Vec<Extraction>> {
        Ok(self
            .extractions
            .read()
            .unwrap()
            .values()
            .filter(|e| e.source_id == source_id)
            .cloned()
            .collect())
    }

    async fn get_extractions_by_type(
        &self,
        extraction_type: ExtractionType,
        topics: Option<&[String]>,
    ) -> Result<Vec<Extraction>> {
        Ok(self
            .extractions
            .read()
            .unwrap()
            .values()
            .filter(|e| e.extraction_type() == extraction_type)
            .filter(|e| match topics {
                Some(topics) if !topics.is_empty() => {
                    topics.iter().any(|t| e.topics.contains(t))
                }
                _ => true,
            })
            .cloned()
            .collect())
    }

    async fn find_duplicate_extraction(
        &self,
        chunk_id: &str,
        extraction_type: ExtractionType,
    ) -> Result<Option<String>> {
        Ok(self
            .extractions
            .read()
            .unwrap()
            .values()
            .find(|e| e.chunk_id == chunk_id && e.extraction_type() == extraction_type)
            .map(|e| e.id.clone()))
    }

    async fn create_extraction(&self, extraction: &Extraction) -> Result<String> {
        if let Some(existing) = self
            .find_duplicate_extraction(&extraction.chunk_id, extraction.extraction_type())
            .await?
        {
            return Ok(existing);
        }
        let id = self.generate_id();
        let mut extraction = extraction.clone();
        extraction.id = id.clone();
        self.extractions.write().unwrap().insert(id.clone(), extraction);
        Ok(id)
    }
}

struct StoredVector {
    kind: String,
    vector: Vec<f32>,
    payload: HashMap<String, Value>,
}

/// In-memory [`VectorStore`] using brute-force cosine similarity. Fine for
/// test fixtures sized in the dozens of points; not a Qdrant substitute at
/// any real scale.
#[derive(Default)]
pub struct MemoryVectorStore {
    points: RwLock<HashMap<String, StoredVector>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn search(
        &self,
        kind: &str,
        query_vector: &[f32],
        filter: &HashMap<String, Vec<String>>,
        limit: u64,
    ) -> Vec<VectorHit> {
        let points = self.points.read().unwrap();
        let mut hits: Vec<VectorHit> = points
            .iter()
            .filter(|(_, v)| v.kind == kind)
            .filter(|(_, v)| {
                filter.iter().all(|(key, values)| {
                    v.payload
                        .get(key)
                        .and_then(|pv| pv.as_str())
                        .map(|pv| values.iter().any(|fv| fv == pv))
                        .unwrap_or(false)
                })
            })
            .map(|(id, v)| VectorHit {
                original_id: id.clone(),
                score: cosine_similarity(query_vector, &v.vector),
                payload: v.payload.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit as usize);
        hits
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn upsert_chunk_vector(
        &self,
        chunk_id: &str,
        vector: Vec<f32>,
        payload: HashMap<String, Value>,
    ) -> Result<()> {
        self.points.write().unwrap().insert(
            chunk_id.to_string(),
            StoredVector { kind: "chunk".to_string(), vector, payload },
        );
        Ok(())
    }

    async fn upsert_extraction_vector(
        &self,
        extraction_id: &str,
        vector: Vec<f32>,
        payload: HashMap<String, Value>,
    ) -> Result<()> {
        self.points.write().unwrap().insert(
            extraction_id.to_string(),
            StoredVector { kind: "extraction".to_string(), vector, payload },
        );
        Ok(())
    }

    async fn search_chunks(
        &self,
        query_vector: Vec<f32>,
        filter: HashMap<String, Vec<String>>,
        limit: u64,
    ) -> Result<Vec<VectorHit>> {
        Ok(self.search("chunk", &query_vector, &filter, limit))
    }

    async fn search_extractions(
        &self,
        query_vector: Vec<f32>,
        filter: HashMap<String, Vec<String>>,
        limit: u64,
    ) -> Result<Vec<VectorHit>> {
        Ok(self.search("extraction", &query_vector, &filter, limit))
    }

    async fn count_by_source(&self, kind: &str, source_id: &str) -> Result<u64> {
        Ok(self
            .points
            .read()
            .unwrap()
            .values()
            .filter(|v| v.kind == kind)
            .filter(|v| v.payload.get("source_id").and_then(|p| p.as_str()) == Some(source_id))
            .count() as u64)
    }

    async fn list_extractions(
        &self,
        extraction_type: ExtractionType,
        limit: u64,
        topic: Option<&str>,
    ) -> Result<Vec<VectorHit>> {
        let points = self.points.read().unwrap();
        let mut hits: Vec<VectorHit> = points
            .iter()
            .filter(|(_, v)| v.kind == "extraction")
            .filter(|(_, v)| {
                v.payload.get("extraction_type").and_then(|p| p.as_str()) == Some(extraction_type.as_str())
            })
            .filter(|(_, v)| match topic {
                Some(topic) => v
                    .payload
                    .get("topics")
                    .and_then(|p| p.as_array())
                    .map(|topics| topics.iter().any(|t| t.as_str() == Some(topic)))
                    .unwrap_or(false),
                None => true,
            })
            .map(|(id, v)| VectorHit { original_id: id.clone(), score: 0.0, payload: v.payload.clone() })
            .collect();
        hits.truncate(limit as usize);
        Ok(hits)
    }

    async fn count_extractions_by_source(&self, source_id: &str) -> Result<HashMap<ExtractionType, u64>> {
        let mut counts = HashMap::new();
        for v in self.points.read().unwrap().values() {
            if v.kind != "extraction" {
                continue;
            }
            if v.payload.get("source_id").and_then(|p| p.as_str()) != Some(source_id) {
                continue;
            }
            if let Some(extraction_type) =
                v.payload.get("extraction_type").and_then(|p| p.as_str()).and_then(ExtractionType::parse)
            {
                *counts.entry(extraction_type).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn count_extractions_by_sources(
        &self,
        source_ids: &[String],
    ) -> Result<HashMap<String, HashMap<ExtractionType, u64>>> {
        let mut counts: HashMap<String, HashMap<ExtractionType, u64>> = HashMap::new();
        for v in self.points.read().unwrap().values() {
            if v.kind != "extraction" {
                continue;
            }
            let Some(source_id) = v.payload.get("source_id").and_then(|p| p.as_str()) else {
                continue;
            };
            if !source_ids.iter().any(|s| s == source_id) {
                continue;
            }
            if let Some(extraction_type) =
                v.payload.get("extraction_type").and_then(|p| p.as_str()).and_then(ExtractionType::parse)
            {
                *counts.entry(source_id.to_string()).or_default().entry(extraction_type).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}

/// Scripted [`LlmGateway`]: returns a fixed response per call, or the same
/// response for every call, useful for driving the orchestrator's happy and
/// failure paths deterministically.
pub struct FakeLlmGateway {
    responses: RwLock<Vec<GatewayResult<String>>>,
    fallback: Option<String>,
}

impl FakeLlmGateway {
    /// Always returns `response` to every `extract` call.
    pub fn always(response: impl Into<String>) -> Self {
        Self { responses: RwLock::new(Vec::new()), fallback: Some(response.into()) }
    }

    /// Returns each queued result once, in order, then errors if exhausted.
    pub fn queue(responses: Vec<GatewayResult<String>>) -> Self {
        let mut responses = responses;
        responses.reverse();
        Self { responses: RwLock::new(responses), fallback: None }
    }
}

#[async_trait]
impl LlmGateway for FakeLlmGateway {
    async fn extract(&self, _prompt: &str, _content: &str) -> GatewayResult<String> {
        if let Some(next) = self.responses.write().unwrap().pop() {
            return next;
        }
        self.fallback
            .clone()
            .ok_or_else(|| GatewayError::Api("FakeLlmGateway: no scripted response left".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, ChunkPosition, SourceType};

    fn sample_source() -> Source {
        Source {
            id: String::new(),
            project_id: "proj1".into(),
            source_type: SourceType::Book,
            title: "Handbook".into(),
            authors: vec![],
            category: "architecture".into(),
            tags: vec![],
            publication_year: None,
            file_size: 0,
            file_path: "handbook.pdf".into(),
            status: SourceStatus::Complete,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn memory_document_store_seeds_and_reads_source() {
        let store = MemoryDocumentStore::new();
        let id = store.seed_source(sample_source());
        let fetched = store.get_source(&id).await.unwrap();
        assert_eq!(fetched.title, "Handbook");
    }

    #[tokio::test]
    async fn memory_document_store_dedups_extractions_by_chunk_and_type() {
        use crate::types::{ContextLevel, DecisionContent, ExtractionContent};
        use serde_json::Map;

        let store = MemoryDocumentStore::new();
        let extraction = Extraction {
            id: String::new(),
            source_id: "s1".into(),
            chunk_id: "c1".into(),
            topics: vec![],
            confidence: 0.9,
            schema_version: "1.1.0".into(),
            extracted_at: chrono::Utc::now(),
            context_level: ContextLevel::Chunk,
            context_id: "c1".into(),
            chunk_ids: vec!["c1".into()],
            content: ExtractionContent::Decision(DecisionContent {
                question: "Cache or not?".into(),
                options: None,
                considerations: None,
                recommended_approach: None,
                context: None,
                extra: Map::new(),
            }),
        };
        let first = store.create_extraction(&extraction).await.unwrap();
        let second = store.create_extraction(&extraction).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn memory_vector_store_search_ranks_by_similarity() {
        let store = MemoryVectorStore::new();
        store
            .upsert_chunk_vector("a", vec![1.0, 0.0], HashMap::from([("source_id".into(), Value::String("s1".into()))]))
            .await
            .unwrap();
        store
            .upsert_chunk_vector("b", vec![0.0, 1.0], HashMap::from([("source_id".into(), Value::String("s1".into()))]))
            .await
            .unwrap();

        let hits = store.search_chunks(vec![1.0, 0.0], HashMap::new(), 10).await.unwrap();
        assert_eq!(hits[0].original_id, "a");
    }

    #[tokio::test]
    async fn fake_llm_gateway_returns_scripted_responses_in_order() {
        let gateway = FakeLlmGateway::queue(vec![Ok("first".into()), Ok("second".into())]);
        assert_eq!(gateway.extract("p", "c").await.unwrap(), "first");
        assert_eq!(gateway.extract("p", "c").await.unwrap(), "second");
    }

    #[tokio::test]
    async fn fake_llm_gateway_errors_after_queue_exhausted() {
        let gateway = FakeLlmGateway::queue(vec![Ok("only".into())]);
        gateway.extract("p", "c").await.unwrap();
        assert!(gateway.extract("p", "c").await.is_err());
    }

    #[tokio::test]
    async fn chunk_position_defaults_have_no_chapter() {
        let chunk = Chunk {
            id: "1".into(),
            source_id: "s".into(),
            content: "x".into(),
            token_count: 1,
            position: ChunkPosition::default(),
            schema_version: "1.1.0".into(),
        };
        assert!(chunk.position.chapter.is_none());
    }
}
