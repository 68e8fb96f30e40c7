//! Response shapes shared by every route (spec §6): the success envelope
//! `{results, metadata}` and the error envelope `{error: {code, message,
//! details}}` built in `crate::error`.

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ResponseEnvelope<T> {
    pub results: Vec<T>,
    pub metadata: Metadata,
}

impl<T> ResponseEnvelope<T> {
    /// Builds the envelope with `metadata.result_count` derived from
    /// `results.len()`, so the two can never disagree (spec §8 invariant).
    pub fn new(results: Vec<T>, query: String, sources_cited: Vec<String>, search_type: &'static str) -> Self {
        let result_count = results.len();
        Self {
            results,
            metadata: Metadata {
                query,
                sources_cited,
                result_count,
                search_type,
                latency_ms: None,
            },
        }
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.metadata.latency_ms = Some(latency_ms);
        self
    }
}

#[derive(Debug, Serialize)]
pub struct Metadata {
    pub query: String,
    pub sources_cited: Vec<String>,
    pub result_count: usize,
    pub search_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

/// Sorts and de-duplicates source titles for `metadata.sources_cited`
/// (spec §8 invariant: "sorted, unique").
pub fn sorted_unique(mut titles: Vec<String>) -> Vec<String> {
    titles.sort();
    titles.dedup();
    titles
}

#[derive(Debug, Serialize)]
pub struct SourceAttribution {
    pub source_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
    pub title: String,
    pub authors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<extraction::ChunkPosition>,
}

#[derive(Debug, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub score: f32,
    #[serde(rename = "type")]
    pub result_type: &'static str,
    pub content: String,
    pub source: SourceAttribution,
}
