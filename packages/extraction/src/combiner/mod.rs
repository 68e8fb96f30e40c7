//! Chunk Combiner (spec §4.5): joins a context's chunks into one string
//! bounded by the routing level's token budget.

use crate::types::Chunk;

/// How to handle content that exceeds the level's token budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineStrategy {
    /// Greedily include whole chunks, in order, while the running total
    /// stays within budget.
    Truncate,
    /// Concatenate regardless of budget; no cap is applied.
    None,
    /// Summarize when over budget. No summarizer is wired up in this
    /// pipeline, so this degrades to [`CombineStrategy::Truncate`].
    SummaryIfExceeded,
}

impl TryFrom<&str> for CombineStrategy {
    type Error = crate::error::ExtractionError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "truncate" => Ok(CombineStrategy::Truncate),
            "none" => Ok(CombineStrategy::None),
            "summary_if_exceeded" => Ok(CombineStrategy::SummaryIfExceeded),
            other => Err(crate::error::ExtractionError::Validation(format!(
                "unknown combine strategy: {other}"
            ))),
        }
    }
}

/// The shape the combiner always returns: the joined text, the chunk ids
/// that actually contributed to it (not the ids it was asked to combine),
/// a token estimate for just that text, and whether anything was cut.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombineResult {
    pub combined_content: String,
    pub chunk_ids: Vec<String>,
    pub total_tokens: usize,
    pub truncated: bool,
}

/// A rough token estimate: roughly 4 characters per token, matching the
/// heuristic the rest of the pipeline uses for budget checks.
fn estimate_tokens(text: &str) -> usize {
    text.len() / 4
}

fn join_all(chunks: &[&Chunk]) -> String {
    chunks.iter().map(|c| c.content.as_str()).collect::<Vec<_>>().join("\n\n")
}

/// Join chunks with a blank-line separator, applying `strategy` when the
/// combined text would exceed `max_tokens`.
pub fn combine(chunks: &[&Chunk], max_tokens: usize, strategy: CombineStrategy) -> CombineResult {
    if chunks.is_empty() {
        return CombineResult {
            combined_content: String::new(),
            chunk_ids: Vec::new(),
            total_tokens: 0,
            truncated: false,
        };
    }

    match strategy {
        CombineStrategy::None => {
            let combined = join_all(chunks);
            let total_tokens = estimate_tokens(&combined);
            CombineResult {
                combined_content: combined,
                chunk_ids: chunks.iter().map(|c| c.id.clone()).collect(),
                total_tokens,
                truncated: false,
            }
        }
        CombineStrategy::Truncate | CombineStrategy::SummaryIfExceeded => {
            greedy_truncate(chunks, max_tokens)
        }
    }
}

/// Greedy whole-chunk inclusion in order while the running total stays
/// within `max_tokens`. If the first chunk alone exceeds the budget, a
/// proportional character prefix of it is returned instead, since there's
/// nothing smaller to fall back to.
fn greedy_truncate(chunks: &[&Chunk], max_tokens: usize) -> CombineResult {
    let first = chunks[0];
    let first_tokens = estimate_tokens(&first.content);
    if first_tokens > max_tokens {
        let prefix = proportional_prefix(&first.content, max_tokens);
        let total_tokens = estimate_tokens(&prefix);
        return CombineResult {
            combined_content: prefix,
            chunk_ids: vec![first.id.clone()],
            total_tokens,
            truncated: true,
        };
    }

    let mut included: Vec<&Chunk> = Vec::with_capacity(chunks.len());
    let mut running_total = 0usize;
    let mut truncated = false;
    for chunk in chunks {
        let tokens = estimate_tokens(&chunk.content);
        if running_total + tokens > max_tokens {
            truncated = true;
            break;
        }
        running_total += tokens;
        included.push(chunk);
    }

    CombineResult {
        combined_content: join_all(&included),
        chunk_ids: included.iter().map(|c| c.id.clone()).collect(),
        total_tokens: running_total,
        truncated,
    }
}

/// Cut `text` down to roughly `max_tokens`, on a character boundary.
fn proportional_prefix(text: &str, max_tokens: usize) -> String {
    let max_chars = max_tokens * 4;
    if text.len() <= max_chars {
        return text.to_string();
    }
    let mut end = max_chars;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, ChunkPosition};

    fn chunk(id: &str, content: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            source_id: "s".into(),
            content: content.to_string(),
            token_count: (content.len() / 4) as u32,
            position: ChunkPosition::default(),
            schema_version: "1.1.0".into(),
        }
    }

    #[test]
    fn joins_with_blank_line() {
        let a = chunk("1", "hello");
        let b = chunk("2", "world");
        let result = combine(&[&a, &b], 1000, CombineStrategy::Truncate);
        assert_eq!(result.combined_content, "hello\n\nworld");
        assert_eq!(result.chunk_ids, vec!["1".to_string(), "2".to_string()]);
        assert!(!result.truncated);
    }

    #[test]
    fn none_strategy_ignores_budget() {
        let a = chunk("1", &"x".repeat(100));
        let result = combine(&[&a], 1, CombineStrategy::None);
        assert_eq!(result.combined_content.len(), 100);
        assert_eq!(result.chunk_ids, vec!["1".to_string()]);
        assert!(!result.truncated);
    }

    #[test]
    fn truncate_respects_budget() {
        let a = chunk("1", &"x".repeat(100));
        let result = combine(&[&a], 5, CombineStrategy::Truncate);
        assert_eq!(result.combined_content.len(), 20);
        assert_eq!(result.chunk_ids, vec!["1".to_string()]);
        assert!(result.truncated);
    }

    #[test]
    fn summary_if_exceeded_falls_back_to_truncate() {
        let a = chunk("1", &"x".repeat(100));
        let result = combine(&[&a], 5, CombineStrategy::SummaryIfExceeded);
        assert_eq!(result.combined_content.len(), 20);
        assert!(result.truncated);
    }

    #[test]
    fn greedy_truncate_keeps_whole_chunks_that_fit() {
        // Each chunk is ~5 tokens (20 chars); a budget of 12 fits two but not three.
        let a = chunk("1", &"a".repeat(20));
        let b = chunk("2", &"b".repeat(20));
        let c = chunk("3", &"c".repeat(20));
        let result = combine(&[&a, &b, &c], 12, CombineStrategy::Truncate);
        assert_eq!(result.chunk_ids, vec!["1".to_string(), "2".to_string()]);
        assert!(!result.combined_content.contains('c'));
        assert!(result.truncated);
        assert_eq!(result.total_tokens, 10);
    }

    #[test]
    fn first_chunk_alone_exceeding_budget_reports_single_chunk_id() {
        let a = chunk("1", &"x".repeat(100));
        let b = chunk("2", "short");
        let result = combine(&[&a, &b], 5, CombineStrategy::Truncate);
        assert_eq!(result.chunk_ids, vec!["1".to_string()]);
        assert!(result.combined_content.len() < 100);
        assert!(result.truncated);
    }

    #[test]
    fn try_from_rejects_unknown_strategy() {
        assert!(CombineStrategy::try_from("made_up").is_err());
    }
}
