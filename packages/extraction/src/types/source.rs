//! Source document records (spec §3 "Source").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of document a [`Source`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Book,
    Paper,
    Article,
    CaseStudy,
    Other,
}

/// Ingestion lifecycle state of a [`Source`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

/// One ingested document. Created before chunking; mutated only by the
/// ingestion side. Read-only from the query service's point of view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    /// 24-hex identifier (MongoDB ObjectId format).
    pub id: String,
    pub project_id: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub title: String,
    pub authors: Vec<String>,
    pub category: String,
    pub tags: Vec<String>,
    pub publication_year: Option<i32>,
    pub file_size: u64,
    pub file_path: String,
    pub status: SourceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Source {
    /// A compact attribution snapshot suitable for embedding alongside a
    /// vector-store payload (spec §4.9 step 4).
    pub fn snapshot(&self) -> SourceSnapshot {
        SourceSnapshot {
            project_id: self.project_id.clone(),
            source_title: self.title.clone(),
            source_type: self.source_type,
            source_category: self.category.clone(),
            source_year: self.publication_year,
        }
    }
}

/// The subset of [`Source`] fields mirrored into vector-store payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSnapshot {
    pub project_id: String,
    pub source_title: String,
    pub source_type: SourceType,
    pub source_category: String,
    pub source_year: Option<i32>,
}
