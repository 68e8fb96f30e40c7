//! `POST /search_knowledge` (spec §4.12): embed the query, fan out to both
//! vector searches in parallel, merge by score, and enrich each hit with
//! source attribution through a per-request cache.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::Json;
use extraction::stores::VectorHit;
use extraction::Source;
use serde::Deserialize;

use crate::envelope::{sorted_unique, ResponseEnvelope, SearchResult, SourceAttribution};
use crate::error::ApiError;
use crate::routes::{validate_limit, validate_query};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub limit: Option<u64>,
}

enum HitKind {
    Chunk,
    Extraction,
}

pub async fn search_knowledge(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<ResponseEnvelope<SearchResult>>, ApiError> {
    let started_at = Instant::now();
    validate_query(&req.query)?;
    let limit = validate_limit(req.limit, 10, 1, 100)?;

    let query_vector = state.embedder.embed_query(&req.query).await?;

    let mut filter = HashMap::new();
    filter.insert("project_id".to_string(), vec![state.project_id.clone()]);

    let (chunk_hits, extraction_hits) = tokio::try_join!(
        state.vector_store.search_chunks(query_vector.clone(), filter.clone(), limit),
        state.vector_store.search_extractions(query_vector, filter, limit),
    )?;

    let mut combined: Vec<(HitKind, VectorHit)> = chunk_hits
        .into_iter()
        .map(|hit| (HitKind::Chunk, hit))
        .chain(extraction_hits.into_iter().map(|hit| (HitKind::Extraction, hit)))
        .collect();
    combined.sort_by(|(_, a), (_, b)| {
        b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal).then_with(|| a.original_id.cmp(&b.original_id))
    });
    combined.truncate(limit as usize);

    let mut source_cache: HashMap<String, Source> = HashMap::new();
    let mut results = Vec::with_capacity(combined.len());
    let mut sources_cited = Vec::new();

    for (kind, hit) in combined {
        let source_id = hit.payload.get("source_id").and_then(|v| v.as_str()).unwrap_or_default().to_string();

        let source = fetch_source(&state, &mut source_cache, &source_id).await;
        if let Some(source) = &source {
            sources_cited.push(source.title.clone());
        }

        let (content, chunk_id, result_type) = match kind {
            HitKind::Chunk => {
                let content = match state.document_store.get_chunk(&hit.original_id).await {
                    Ok(chunk) => chunk.content,
                    Err(_) => payload_title(&hit),
                };
                (content, Some(hit.original_id.clone()), "chunk")
            }
            HitKind::Extraction => {
                // Spec §4.12: fetch full content by the extraction's id, or
                // fall back to a short title from the payload.
                let (content, chunk_id) = match state.document_store.get_extraction(&hit.original_id).await {
                    Ok(extraction) => (extraction.content.embedding_text(), Some(extraction.chunk_id)),
                    Err(_) => {
                        (payload_title(&hit), hit.payload.get("chunk_id").and_then(|v| v.as_str()).map(String::from))
                    }
                };
                (content, chunk_id, "extraction")
            }
        };

        results.push(SearchResult {
            id: hit.original_id,
            score: hit.score,
            result_type,
            content,
            source: SourceAttribution {
                source_id,
                chunk_id,
                title: source.as_ref().map(|s| s.title.clone()).unwrap_or_default(),
                authors: source.as_ref().map(|s| s.authors.clone()).unwrap_or_default(),
                position: None,
            },
        });
    }

    let envelope = ResponseEnvelope::new(results, req.query, sorted_unique(sources_cited), "semantic")
        .with_latency(started_at.elapsed().as_millis() as u64);
    Ok(Json(envelope))
}

fn payload_title(hit: &VectorHit) -> String {
    hit.payload
        .get("extraction_title")
        .or_else(|| hit.payload.get("title"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

/// The per-request cache spec §4.12 calls for: at most one `get_source`
/// call per unique `source_id` in a response, however many hits cite it.
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
