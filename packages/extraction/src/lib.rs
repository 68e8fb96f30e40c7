//! # Extraction
//!
//! Hierarchical knowledge extraction over technical source material: an LLM
//! pulls structured records of seven categories (decisions, patterns,
//! warnings, methodologies, checklists, personas, workflows) out of a
//! chunked document, routing each category to the level of the document
//! hierarchy it makes sense at, then persists the results to a document
//! store and a vector store for retrieval.
//!
//! ## Architecture
//!
//! ```text
//! Source → Chunks → Hierarchy Builder → Chapters / Sections / Chunks
//!                                              |
//!                          routing table: category -> level
//!                                              |
//!                    Chunk Combiner -> LLM Gateway -> Category Extractor
//!                                              |
//!                                      Extraction Storage
//!                                      (document store + vector store)
//! ```
//!
//! - [`types`] — the domain model: sources, chunks, extractions, hierarchy
//!   nodes, pipeline config.
//! - [`hierarchy`] — groups a source's chunks into chapters and sections.
//! - [`combiner`] — joins a context's chunks into one budgeted string.
//! - [`prompts`] — the per-category LLM instructions.
//! - [`llm`] — the `LlmGateway` trait and the Anthropic-backed implementation.
//! - [`extractors`] — the category extractor registry and response parsing.
//! - [`orchestrator`] — ties the above into the end-to-end extraction run.
//! - [`stores`] — the `DocumentStore` (MongoDB) and `VectorStore` (Qdrant) seams.
//! - [`embedding`] — the `Embedder` seam this crate consumes but doesn't implement.
//! - [`storage`] — couples the document store, vector store, and embedder
//!   into the `save_extraction` protocol.
//! - [`testing`] — in-memory fakes for the storage and gateway seams
//!   (feature `test-support`, or automatically under `#[cfg(test)]`).

pub mod combiner;
pub mod embedding;
pub mod error;
pub mod extractors;
pub mod hierarchy;
pub mod llm;
pub mod orchestrator;
pub mod prompts;
pub mod storage;
pub mod stores;
pub mod testing;
pub mod types;

pub use combiner::{CombineResult, CombineStrategy};
pub use error::{ErrorCode, ExtractionError, GatewayError, Result};
pub use extractors::{default_registry, CategoryExtractor, ExtractorConfig, ExtractorRegistry};
pub use orchestrator::{routing_level, HierarchicalOrchestrator, PipelineStats};
pub use prompts::PromptLoader;
pub use storage::{ExtractionStorage, SaveExtractionResult};
pub use types::{
    Chunk, ChunkPosition, ContextLevel, Extraction, ExtractionContent, ExtractionContext,
    ExtractionOutcome, ExtractionType, Hierarchy, PipelineConfig, Source, SourceSnapshot,
    SourceStatus, SourceType,
};
