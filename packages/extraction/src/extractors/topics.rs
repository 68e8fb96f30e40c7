//! Topic auto-tagging (spec §4.7 step 4): a curated keyword dictionary
//! scanned against extracted text, advisory only. Not meant to be precise —
//! downstream tests assert cardinality and ordering, never exact tags.

use crate::types::{cap_topics, ExtractionContent};

/// Keyword -> topic label. Checked in order so that more specific terms can
/// be listed ahead of broader ones.
const KEYWORD_TOPICS: &[(&str, &str)] = &[
    ("retrieval-augmented", "rag"),
    (" rag ", "rag"),
    ("large language model", "llm"),
    ("llm", "llm"),
    ("embedding", "embeddings"),
    ("vector store", "vector-search"),
    ("vector database", "vector-search"),
    ("agent", "agents"),
    ("orchestrat", "orchestration"),
    ("fine-tun", "fine-tuning"),
    ("prompt", "prompt-engineering"),
    ("evaluat", "evaluation"),
    ("hallucinat", "hallucination"),
    ("latency", "performance"),
    ("throughput", "performance"),
    ("deploy", "deployment"),
    ("cache", "caching"),
    ("chunk", "chunking"),
    ("token", "tokenization"),
    ("security", "security"),
    ("authentic", "auth"),
    ("rate limit", "rate-limiting"),
];

/// Scan `content`'s embedding text for known keywords, returning matched
/// topics in the order the dictionary defines them, capped at five.
pub fn auto_tag(content: &ExtractionContent) -> Vec<String> {
    let text = content.embedding_text().to_lowercase();
    let mut topics = Vec::new();
    for (keyword, topic) in KEYWORD_TOPICS {
        if text.contains(keyword) {
            topics.push(topic.to_string());
        }
    }
    cap_topics(topics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExtractionType, PatternContent};
    use serde_json::Map;

    #[test]
    fn tags_are_capped_at_five() {
        let content = ExtractionContent::Pattern(PatternContent {
            name: "RAG pipeline with agents".into(),
            problem: "LLM hallucination during retrieval".into(),
            solution: "Cache embeddings, tune prompt, deploy with rate limiting".into(),
            code_example: None,
            context: None,
            trade_offs: None,
            extra: Map::new(),
        });
        let tags = auto_tag(&content);
        assert!(tags.len() <= 5);
        assert!(!tags.is_empty());
    }

    #[test]
    fn no_match_yields_empty() {
        let content = ExtractionContent::Pattern(PatternContent {
            name: "Unrelated".into(),
            problem: "Something else entirely".into(),
            solution: "A plain fix".into(),
            code_example: None,
            context: None,
            trade_offs: None,
            extra: Map::new(),
        });
        assert!(auto_tag(&content).is_empty());
        let _ = ExtractionType::Pattern;
    }
}
