//! Chunk records (spec §3 "Chunk").

use serde::{Deserialize, Serialize};

/// Hierarchical position metadata for a [`Chunk`] within its source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkPosition {
    pub chapter: Option<String>,
    pub section: Option<String>,
    pub page: Option<u32>,
    pub chunk_index: Option<u64>,
}

/// A token-bounded slice of a source's text. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub source_id: String,
    pub content: String,
    pub token_count: u32,
    pub position: ChunkPosition,
    pub schema_version: String,
}

impl Chunk {
    /// `token_count` must never exceed the content length (spec §3 invariant).
    pub fn is_valid(&self) -> bool {
        (self.token_count as usize) <= self.content.len()
    }

    /// Sort key used throughout the pipeline: `chunk_index` when present,
    /// otherwise the numeric value of the id's hex digits (matches the
    /// reference implementation's fallback — see
    /// `examples/original_source/packages/pipeline/src/extractors/hierarchy.py::_get_chunk_index`).
    pub fn sort_key(&self) -> u64 {
        if let Some(idx) = self.position.chunk_index {
            return idx;
        }
        u64::from_str_radix(&self.id[..self.id.len().min(15)], 16).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, idx: Option<u64>) -> Chunk {
        Chunk {
            id: id.to_string(),
            source_id: "src".into(),
            content: "hello world".into(),
            token_count: 2,
            position: ChunkPosition {
                chunk_index: idx,
                ..Default::default()
            },
            schema_version: "1.1.0".into(),
        }
    }

    #[test]
    fn valid_token_count() {
        assert!(chunk("abc123", Some(0)).is_valid());
    }

    #[test]
    fn invalid_token_count_exceeds_content() {
        let mut c = chunk("abc123", Some(0));
        c.token_count = 1000;
        assert!(!c.is_valid());
    }

    #[test]
    fn sort_key_prefers_chunk_index() {
        assert_eq!(chunk("ff", Some(3)).sort_key(), 3);
    }

    #[test]
    fn sort_key_falls_back_to_id_hex() {
        let c = chunk("a", None);
        assert_eq!(c.sort_key(), 10);
    }
}
