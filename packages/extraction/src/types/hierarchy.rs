//! Derived hierarchy nodes built from a source's chunks (spec §4.4).
//!
//! These are not persisted directly; they're an in-memory grouping the
//! Hierarchy Builder produces for the orchestrator to iterate over.

use super::chunk::Chunk;
use super::extraction::ContextLevel;

/// One chapter-level grouping of chunks within a source.
#[derive(Debug, Clone)]
pub struct ChapterNode {
    pub id: String,
    pub name: String,
    pub sections: Vec<SectionNode>,
    /// Chunks that belong to this chapter but to no named section.
    pub direct_chunks: Vec<Chunk>,
}

impl ChapterNode {
    /// All chunks under this chapter, sections first, each internally
    /// ordered by [`Chunk::sort_key`].
    pub fn all_chunks(&self) -> Vec<&Chunk> {
        let mut out: Vec<&Chunk> = self.sections.iter().flat_map(|s| s.chunks.iter()).collect();
        out.extend(self.direct_chunks.iter());
        out
    }
}

/// One section-level grouping of chunks within a chapter.
#[derive(Debug, Clone)]
pub struct SectionNode {
    pub id: String,
    pub name: String,
    pub chapter_name: String,
    pub chunks: Vec<Chunk>,
}

/// The full derived hierarchy for one source.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    pub chapters: Vec<ChapterNode>,
    /// Chunks that belong to no chapter at all.
    pub uncategorized_chunks: Vec<Chunk>,
}

impl Hierarchy {
    pub fn total_chunks(&self) -> usize {
        self.chapters.iter().map(|c| c.all_chunks().len()).sum::<usize>()
            + self.uncategorized_chunks.len()
    }
}

/// A unit of work the orchestrator hands to the extractor layer: some
/// combined text at a known granularity, addressable back to its chunks.
#[derive(Debug, Clone)]
pub struct ExtractionContext {
    pub context_id: String,
    pub context_level: ContextLevel,
    pub context_name: String,
    pub source_id: String,
    pub combined_content: String,
    pub chunk_ids: Vec<String>,
    pub truncated: bool,
}
