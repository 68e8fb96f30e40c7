//! Category listings — `/get_decisions`, `/get_patterns`, `/get_warnings`
//! (PUBLIC) and `/get_methodologies` (REGISTERED) — spec §4.12.
//!
//! Listed from the vector store's payload-only scroll (`list_extractions`),
//! same as `search_knowledge`'s hits: no semantic query runs, just a
//! filtered scroll over `content_type=extraction`. Each hit is then
//! enriched with its full structured content by id; a hit whose document
//! no longer resolves (deleted, store lag) falls back to a payload-derived
//! record instead of dropping out of the listing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::{Extension, Json};
use extraction::stores::VectorHit;
use extraction::{Extraction, ExtractionType, Source};
use serde::Deserialize;
use serde_json::Value;

use crate::auth::{require_tier, Tier};
use crate::envelope::{sorted_unique, ResponseEnvelope};
use crate::error::ApiError;
use crate::routes::validate_limit;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    pub topic: Option<String>,
    pub limit: Option<u64>,
}

pub async fn get_decisions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CategoryQuery>,
) -> Result<Json<ResponseEnvelope<Value>>, ApiError> {
    list_category(&state, ExtractionType::Decision, params).await
}

pub async fn get_patterns(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CategoryQuery>,
) -> Result<Json<ResponseEnvelope<Value>>, ApiError> {
    list_category(&state, ExtractionType::Pattern, params).await
}

pub async fn get_warnings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CategoryQuery>,
) -> Result<Json<ResponseEnvelope<Value>>, ApiError> {
    list_category(&state, ExtractionType::Warning, params).await
}

pub async fn get_methodologies(
    State(state): State<Arc<AppState>>,
    Extension(tier): Extension<Tier>,
    Query(params): Query<CategoryQuery>,
) -> Result<Json<ResponseEnvelope<Value>>, ApiError> {
    require_tier(tier, Tier::Registered)?;
    list_category(&state, ExtractionType::Methodology, params).await
}

async fn list_category(
    state: &AppState,
    extraction_type: ExtractionType,
    params: CategoryQuery,
) -> Result<Json<ResponseEnvelope<Value>>, ApiError> {
    let started_at = Instant::now();
    let limit = validate_limit(params.limit, 100, 1, 500)?;

    let hits = state.vector_store.list_extractions(extraction_type, limit, params.topic.as_deref()).await?;

    let mut source_cache: HashMap<String, Source> = HashMap::new();
    let mut sources_cited = Vec::new();
    let mut results = Vec::with_capacity(hits.len());
    for hit in &hits {
        let source_id = hit.payload.get("source_id").and_then(|v| v.as_str()).unwrap_or_default();
        if let Some(source) = fetch_source(state, &mut source_cache, source_id).await {
            sources_cited.push(source.title.clone());
        }

        let record = match state.document_store.get_extraction(&hit.original_id).await {
            Ok(extraction) => extraction_to_public_record(&extraction),
            Err(_) => payload_to_public_record(hit),
        };
        results.push(record);
    }

    let query = params.topic.unwrap_or_else(|| "all".to_string());

    let envelope = ResponseEnvelope::new(results, query, sorted_unique(sources_cited), "filtered")
        .with_latency(started_at.elapsed().as_millis() as u64);
    Ok(Json(envelope))
}

async fn fetch_source(state: &AppState, cache: &mut HashMap<String, Source>, source_id: &str) -> Option<Source> {
    if source_id.is_empty() {
        return None;
    }
    if let Some(source) = cache.get(source_id) {
        return Some(source.clone());
    }
    let source = state.document_store.get_source(source_id).await.ok()?;
    cache.insert(source_id.to_string(), source.clone());
    Some(source)
}

/// Builds a public record straight from a hit's payload, for the rare case
/// the document store no longer has the extraction the vector store found.
fn payload_to_public_record(hit: &VectorHit) -> Value {
    let mut record = hit.payload.clone();
    record.insert("id".to_string(), Value::String(hit.original_id.clone()));
    if !record.contains_key("extraction_title") {
        let title = record.get("title").cloned().unwrap_or_else(|| Value::String(String::new()));
        record.insert("extraction_title".to_string(), title);
    }
    Value::Object(record.into_iter().collect())
}

/// Maps one extraction's content fields to the top level of a public JSON
/// record, with `id`/`topics`/`confidence` alongside and an
/// `extraction_title` fallback when the primary name field is absent (spec
/// §4.12 category listings).
fn extraction_to_public_record(extraction: &Extraction) -> Value {
    let mut record = match serde_json::to_value(&extraction.content) {
        Ok(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };
    record.insert("id".to_string(), Value::String(extraction.id.clone()));
    record.insert("type".to_string(), Value::String(extraction.extraction_type().as_str().to_string()));
    record.insert("source_id".to_string(), Value::String(extraction.source_id.clone()));
    record.insert("chunk_id".to_string(), Value::String(extraction.chunk_id.clone()));
    record.insert(
        "topics".to_string(),
        Value::Array(extraction.topics.iter().cloned().map(Value::String).collect()),
    );
    record.insert(
        "confidence".to_string(),
        serde_json::Number::from_f64(extraction.confidence).map(Value::Number).unwrap_or(Value::Null),
    );
    record
        .entry("extraction_title".to_string())
        .or_insert_with(|| Value::String(extraction.content.title().to_string()));
    Value::Object(record)
}
