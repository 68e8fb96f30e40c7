//! Hierarchical Orchestrator (spec §4.8): routes each of the seven
//! categories to its context granularity, runs the extractor fan-out with
//! bounded concurrency, and aggregates the run into [`PipelineStats`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::combiner::{combine, CombineStrategy};
use crate::error::{ErrorCode, Result};
use crate::extractors::ExtractorRegistry;
use crate::llm::LlmGateway;
use crate::storage::ExtractionStorage;
use crate::stores::DocumentStore;
use crate::types::{Chunk, ContextLevel, ExtractionContext, ExtractionOutcome, ExtractionType, Hierarchy};

const CHAPTER_TOKEN_BUDGET: usize = 8192;
const SECTION_TOKEN_BUDGET: usize = 4096;
const CHUNK_TOKEN_BUDGET: usize = 512;
const DEFAULT_CONCURRENCY: usize = 4;

/// Fixed category -> granularity routing (spec §4.4 / §4.8).
pub fn routing_level(category: ExtractionType) -> ContextLevel {
    match category {
        ExtractionType::Methodology | ExtractionType::Workflow => ContextLevel::Chapter,
        ExtractionType::Decision
        | ExtractionType::Pattern
        | ExtractionType::Checklist
        | ExtractionType::Persona => ContextLevel::Section,
        ExtractionType::Warning => ContextLevel::Chunk,
    }
}

fn token_budget(level: ContextLevel) -> usize {
    match level {
        ContextLevel::Chapter => CHAPTER_TOKEN_BUDGET,
        ContextLevel::Section => SECTION_TOKEN_BUDGET,
        ContextLevel::Chunk => CHUNK_TOKEN_BUDGET,
    }
}

/// Run totals for one `extract(source_id)` call.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct PipelineStats {
    pub contexts_processed: u64,
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_tokens: u64,
    pub extractions_stored: u64,
}

#[derive(Default)]
struct AtomicStats {
    contexts_processed: AtomicU64,
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    total_tokens: AtomicU64,
    extractions_stored: AtomicU64,
}

impl AtomicStats {
    fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            contexts_processed: self.contexts_processed.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            total_tokens: self.total_tokens.load(Ordering::Relaxed),
            extractions_stored: self.extractions_stored.load(Ordering::Relaxed),
        }
    }
}

pub struct HierarchicalOrchestrator {
    document_store: Arc<dyn DocumentStore>,
    storage: Arc<ExtractionStorage>,
    llm_gateway: Arc<dyn LlmGateway>,
    registry: ExtractorRegistry,
    combine_strategy: CombineStrategy,
    concurrency: usize,
}

impl HierarchicalOrchestrator {
    pub fn new(
        document_store: Arc<dyn DocumentStore>,
        storage: Arc<ExtractionStorage>,
        llm_gateway: Arc<dyn LlmGateway>,
        registry: ExtractorRegistry,
    ) -> Self {
        Self {
            document_store,
            storage,
            llm_gateway,
            registry,
            combine_strategy: CombineStrategy::Truncate,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, permits: usize) -> Self {
        self.concurrency = permits.max(1);
        self
    }

    pub fn with_combine_strategy(mut self, strategy: CombineStrategy) -> Self {
        self.combine_strategy = strategy;
        self
    }

    /// Run all seven category extractors over one source's hierarchy.
    /// Auto-connects the document store; the vector store is expected to
    /// already be connected by [`ExtractionStorage`]'s owner.
    pub async fn extract(&self, source_id: &str) -> Result<PipelineStats> {
        self.document_store.connect().await.ok();

        let source = self.document_store.get_source(source_id).await?;
        let chunks = self.document_store.get_chunks_by_source(source_id).await?;
        let hierarchy = crate::hierarchy::build_hierarchy(chunks, source_id);
        let snapshot = source.snapshot();

        let mut contexts_by_level: HashMap<ContextLevel, Vec<ExtractionContext>> = HashMap::new();
        for level in [ContextLevel::Chapter, ContextLevel::Section, ContextLevel::Chunk] {
            contexts_by_level.insert(
                level,
                build_contexts(&hierarchy, source_id, level, token_budget(level), self.combine_strategy),
            );
        }

        let stats = Arc::new(AtomicStats::default());
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut work = FuturesUnordered::new();

        for category in ExtractionType::ALL {
            let level = routing_level(category);
            let contexts = contexts_by_level.get(&level).cloned().unwrap_or_default();
            for context in contexts {
                let semaphore = semaphore.clone();
                let stats = stats.clone();
                let this = self.clone_refs();
                let snapshot = snapshot.clone();
                work.push(async move {
                    let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                    stats.contexts_processed.fetch_add(1, Ordering::Relaxed);
                    stats.attempts.fetch_add(1, Ordering::Relaxed);
                    stats
                        .total_tokens
                        .fetch_add((context.combined_content.len() / 4) as u64, Ordering::Relaxed);

                    let outcomes = this.run_one(category, &context, source_id, &snapshot).await;
                    for outcome in outcomes {
                        match outcome {
                            ExtractionOutcome::Success(_) => {
                                stats.successes.fetch_add(1, Ordering::Relaxed);
                                stats.extractions_stored.fetch_add(1, Ordering::Relaxed);
                            }
                            ExtractionOutcome::Failure { error, code } => {
                                stats.failures.fetch_add(1, Ordering::Relaxed);
                                error!(
                                    category = %category,
                                    context_id = %context.context_id,
                                    code = code.as_str(),
                                    %error,
                                    "extraction attempt failed"
                                );
                            }
                        }
                    }
                });
            }
        }

        while work.next().await.is_some() {}

        let snapshot_stats = stats.snapshot();
        info!(
            source_id,
            contexts = snapshot_stats.contexts_processed,
            successes = snapshot_stats.successes,
            failures = snapshot_stats.failures,
            "hierarchical extraction run complete"
        );
        Ok(snapshot_stats)
    }

    fn clone_refs(&self) -> OrchestratorRefs {
        OrchestratorRefs {
            storage: self.storage.clone(),
            llm_gateway: self.llm_gateway.clone(),
            registry: self.registry.clone(),
        }
    }
}

/// The subset of orchestrator state a single work-item future needs,
/// cloned cheaply (all `Arc`s) per spawned task.
struct OrchestratorRefs {
    storage: Arc<ExtractionStorage>,
    llm_gateway: Arc<dyn LlmGateway>,
    registry: ExtractorRegistry,
}

impl OrchestratorRefs {
    async fn run_one(
        &self,
        category: ExtractionType,
        context: &ExtractionContext,
        source_id: &str,
        snapshot: &crate::types::SourceSnapshot,
    ) -> Vec<ExtractionOutcome> {
        let extractor = match self.registry.get(category) {
            Ok(e) => e,
            Err(e) => {
                return vec![ExtractionOutcome::Failure {
                    error: e.to_string(),
                    code: ErrorCode::UnsupportedExtractionType,
                }]
            }
        };

        let outcomes = extractor
            .extract(
                self.llm_gateway.as_ref(),
                &context.combined_content,
                source_id,
                context.context_level,
                &context.context_id,
                &context.chunk_ids,
            )
            .await;

        let mut results = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                ExtractionOutcome::Success(mut extraction) => {
                    match self.storage.save_extraction(&extraction, snapshot).await {
                        Ok(save_result) => {
                            extraction.id = save_result.extraction_id;
                            results.push(ExtractionOutcome::Success(extraction));
                        }
                        Err(e) => {
                            results.push(ExtractionOutcome::Failure { error: e.to_string(), code: e.code() })
                        }
                    }
                }
                failure => results.push(failure),
            }
        }
        results
    }
}

/// Build the extraction contexts for one routing level, including the
/// synthetic uncategorized buckets (spec §4.8).
fn build_contexts(
    hierarchy: &Hierarchy,
    source_id: &str,
    level: ContextLevel,
    budget: usize,
    strategy: CombineStrategy,
) -> Vec<ExtractionContext> {
    match level {
        ContextLevel::Chapter => {
            let mut contexts: Vec<ExtractionContext> = hierarchy
                .chapters
                .iter()
                .map(|chapter| {
                    let chunks = chapter.all_chunks();
                    let result = combine(&chunks, budget, strategy);
                    ExtractionContext {
                        context_id: chapter.id.clone(),
                        context_level: ContextLevel::Chapter,
                        context_name: chapter.name.clone(),
                        source_id: source_id.to_string(),
                        combined_content: result.combined_content,
                        chunk_ids: result.chunk_ids,
                        truncated: result.truncated,
                    }
                })
                .collect();

            if !hierarchy.uncategorized_chunks.is_empty() {
                contexts.push(synthetic_context(
                    source_id,
                    "chapter",
                    &hierarchy.uncategorized_chunks,
                    ContextLevel::Chapter,
                    budget,
                    strategy,
                ));
            }
            contexts
        }
        ContextLevel::Section => {
            let mut contexts: Vec<ExtractionContext> = hierarchy
                .chapters
                .iter()
                .flat_map(|chapter| chapter.sections.iter())
                .map(|section| {
                    let chunks: Vec<&Chunk> = section.chunks.iter().collect();
                    let result = combine(&chunks, budget, strategy);
                    ExtractionContext {
                        context_id: section.id.clone(),
                        context_level: ContextLevel::Section,
                        context_name: format!("{}:{}", section.chapter_name, section.name),
                        source_id: source_id.to_string(),
                        combined_content: result.combined_content,
                        chunk_ids: result.chunk_ids,
                        truncated: result.truncated,
                    }
                })
                .collect();

            let direct: Vec<Chunk> = hierarchy
                .chapters
                .iter()
                .flat_map(|chapter| chapter.direct_chunks.iter().cloned())
                .collect();
            if !direct.is_empty() {
                contexts.push(synthetic_context(
                    source_id,
                    "section",
                    &direct,
                    ContextLevel::Section,
                    budget,
                    strategy,
                ));
            }
            contexts
        }
        ContextLevel::Chunk => {
            let mut all_chunks: Vec<Chunk> = hierarchy.uncategorized_chunks.clone();
            for chapter in &hierarchy.chapters {
                all_chunks.extend(chapter.direct_chunks.iter().cloned());
                for section in &chapter.sections {
                    all_chunks.extend(section.chunks.iter().cloned());
                }
            }
            all_chunks.sort_by_key(|c| c.sort_key());

            all_chunks
                .iter()
                .map(|chunk| ExtractionContext {
                    context_id: chunk.id.clone(),
                    context_level: ContextLevel::Chunk,
                    context_name: chunk.id.clone(),
                    source_id: source_id.to_string(),
                    combined_content: chunk.content.clone(),
                    chunk_ids: vec![chunk.id.clone()],
                    truncated: false,
                })
                .collect()
        }
    }
}

fn synthetic_context(
    source_id: &str,
    level_name: &str,
    chunks: &[Chunk],
    level: ContextLevel,
    budget: usize,
    strategy: CombineStrategy,
) -> ExtractionContext {
    let refs: Vec<&Chunk> = chunks.iter().collect();
    let result = combine(&refs, budget, strategy);
    ExtractionContext {
        context_id: format!("uncategorized_{source_id}_{level_name}"),
        context_level: level,
        context_name: format!("Uncategorized ({level_name})"),
        source_id: source_id.to_string(),
        combined_content: result.combined_content,
        chunk_ids: result.chunk_ids,
        truncated: result.truncated,
    }
}
