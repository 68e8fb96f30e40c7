//! Extraction Storage (spec §4.9): the `save_extraction` protocol that
//! couples the document store and vector store for one extraction. The two
//! writes are not transactional — a document-store write that succeeds
//! followed by a vector-store write that fails leaves an extraction that's
//! readable by id but absent from semantic search, which callers must
//! tolerate (the orchestrator counts and logs it as a partial failure
//! rather than rolling back).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::embedding::Embedder;
use crate::error::Result;
use crate::stores::{DocumentStore, VectorStore};
use crate::types::{Extraction, SourceSnapshot};

/// The outcome of one [`ExtractionStorage::save_extraction`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveExtractionResult {
    pub extraction_id: String,
    pub mongodb_saved: bool,
    pub qdrant_saved: bool,
}

pub struct ExtractionStorage {
    document_store: Arc<dyn DocumentStore>,
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl ExtractionStorage {
    pub fn new(
        document_store: Arc<dyn DocumentStore>,
        vector_store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            document_store,
            vector_store,
            embedder,
        }
    }

    /// Persist one extraction: write the structured record, then its
    /// vector. Returns the document-store id (new, or the existing id if
    /// this was a `(chunk_id, type)` duplicate — in which case the vector
    /// write is skipped, since the extraction already has one).
    pub async fn save_extraction(
        &self,
        extraction: &Extraction,
        source_snapshot: &SourceSnapshot,
    ) -> Result<SaveExtractionResult> {
        let existing = self
            .document_store
            .find_duplicate_extraction(&extraction.chunk_id, extraction.extraction_type())
            .await?;
        if let Some(existing_id) = existing {
            return Ok(SaveExtractionResult {
                extraction_id: existing_id,
                mongodb_saved: true,
                qdrant_saved: false,
            });
        }

        let extraction_id = self.document_store.create_extraction(extraction).await?;

        let embedding_input = embedding_input_string(extraction, source_snapshot);
        let vector = self.embedder.embed_document(&embedding_input).await?;

        let payload = extraction_payload(extraction, source_snapshot);
        let qdrant_saved = match self
            .vector_store
            .upsert_extraction_vector(&extraction_id, vector, payload)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    extraction_id = %extraction_id,
                    error = %e,
                    "extraction stored but vector upsert failed; not searchable by embedding until retried"
                );
                false
            }
        };

        Ok(SaveExtractionResult { extraction_id, mongodb_saved: true, qdrant_saved })
    }
}

/// Text fed to the embedder: the category's most informative fields plus
/// topics, so search matches both semantic content and tag-like terms.
fn embedding_input_string(extraction: &Extraction, source: &SourceSnapshot) -> String {
    let mut parts = vec![extraction.content.embedding_text()];
    if !extraction.topics.is_empty() {
        parts.push(extraction.topics.join(", "));
    }
    parts.push(source.source_title.clone());
    parts.into_iter().filter(|p| !p.is_empty()).collect::<Vec<_>>().join("\n")
}

fn extraction_payload(
    extraction: &Extraction,
    source: &SourceSnapshot,
) -> HashMap<String, Value> {
    let mut payload = HashMap::new();
    payload.insert("project_id".into(), Value::String(source.project_id.clone()));
    payload.insert("source_id".into(), Value::String(extraction.source_id.clone()));
    payload.insert("chunk_id".into(), Value::String(extraction.chunk_id.clone()));
    payload.insert(
        "extraction_type".into(),
        Value::String(extraction.extraction_type().as_str().to_string()),
    );
    payload.insert(
        "topics".into(),
        Value::Array(extraction.topics.iter().cloned().map(Value::String).collect()),
    );
    payload.insert(
        "confidence".into(),
        serde_json::Number::from_f64(extraction.confidence)
            .map(Value::Number)
            .unwrap_or(Value::Null),
    );
    payload.insert("title".into(), Value::String(extraction.content.title().to_string()));
    payload.insert("source_title".into(), Value::String(source.source_title.clone()));
    payload.insert(
        "source_category".into(),
        Value::String(source.source_category.clone()),
    );
    payload.insert(
        "source_type".into(),
        serde_json::to_value(source.source_type).unwrap_or(Value::Null),
    );
    payload.insert(
        "source_year".into(),
        source.source_year.map(Value::from).unwrap_or(Value::Null),
    );
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PatternContent, SourceType};
    use serde_json::Map;

    fn sample_extraction() -> Extraction {
        Extraction {
            id: String::new(),
            source_id: "src1".into(),
            chunk_id: "chunk1".into(),
            topics: vec!["rag".into(), "caching".into()],
            confidence: 0.8,
            schema_version: "1.1.0".into(),
            extracted_at: chrono::Utc::now(),
            context_level: crate::types::ContextLevel::Chunk,
            context_id: "chunk1".into(),
            chunk_ids: vec!["chunk1".into()],
            content: crate::types::ExtractionContent::Pattern(PatternContent {
                name: "Cache-aside".into(),
                problem: "Repeated expensive lookups".into(),
                solution: "Cache results keyed by query".into(),
                code_example: None,
                context: None,
                trade_offs: None,
                extra: Map::new(),
            }),
        }
    }

    #[test]
    fn embedding_input_includes_topics_and_title() {
        let extraction = sample_extraction();
        let source = SourceSnapshot {
            project_id: "proj1".into(),
            source_title: "Systems Design Handbook".into(),
            source_type: SourceType::Book,
            source_category: "architecture".into(),
            source_year: Some(2022),
        };
        let input = embedding_input_string(&extraction, &source);
        assert!(input.contains("Cache-aside"));
        assert!(input.contains("rag, caching"));
        assert!(input.contains("Systems Design Handbook"));
    }

    #[test]
    fn payload_carries_dedup_relevant_fields() {
        let extraction = sample_extraction();
        let source = SourceSnapshot {
            project_id: "proj1".into(),
            source_title: "Handbook".into(),
            source_type: SourceType::Book,
            source_category: "architecture".into(),
            source_year: None,
        };
        let payload = extraction_payload(&extraction, &source);
        assert_eq!(payload["extraction_type"], Value::String("pattern".into()));
        assert_eq!(payload["chunk_id"], Value::String("chunk1".into()));
        assert_eq!(payload["project_id"], Value::String("proj1".into()));
    }

    #[test]
    fn payload_carries_source_type_and_year() {
        let extraction = sample_extraction();
        let source = SourceSnapshot {
            project_id: "proj1".into(),
            source_title: "Handbook".into(),
            source_type: SourceType::Paper,
            source_category: "architecture".into(),
            source_year: Some(2023),
        };
        let payload = extraction_payload(&extraction, &source);
        assert_eq!(payload["source_type"], Value::String("paper".into()));
        assert_eq!(payload["source_year"], Value::from(2023));
    }
}
