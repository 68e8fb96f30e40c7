//! Core data model (spec §3): sources, chunks, the extraction envelope and
//! its seven content shapes, derived hierarchy nodes, and pipeline config.

pub mod chunk;
pub mod config;
pub mod extraction;
pub mod hierarchy;
pub mod source;

pub use chunk::{Chunk, ChunkPosition};
pub use config::{Environment, PipelineConfig, RateLimitTier};
pub use extraction::{
    cap_topics, ChecklistContent, ChecklistItem, ContextLevel, DecisionContent, Extraction,
    ExtractionContent, ExtractionOutcome, ExtractionType, MethodologyContent, MethodologyStep,
    PatternContent, PersonaContent, WarningContent, WorkflowContent, WorkflowStep, SCHEMA_VERSION,
};
pub use hierarchy::{ChapterNode, ExtractionContext, Hierarchy, SectionNode};
pub use source::{Source, SourceSnapshot, SourceStatus, SourceType};
