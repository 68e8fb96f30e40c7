//! The extractor seam: one implementation per knowledge category (spec §4.7).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::extractors::response::parse_json_response;
use crate::extractors::topics::auto_tag;
use crate::llm::LlmGateway;
use crate::prompts::PromptLoader;
use crate::types::{
    ContextLevel, Extraction, ExtractionContent, ExtractionOutcome, ExtractionType, SCHEMA_VERSION,
};

const DEFAULT_CONFIDENCE: f64 = 0.8;

/// Tunables for one extractor's behavior (spec §4.7 config, all defaulted).
#[derive(Debug, Clone, Copy)]
pub struct ExtractorConfig {
    pub max_extractions_per_chunk: usize,
    pub min_confidence: f64,
    pub auto_tag_topics: bool,
    pub include_context: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_extractions_per_chunk: 5,
            min_confidence: 0.5,
            auto_tag_topics: true,
            include_context: true,
        }
    }
}

/// A category-specific extractor. `extract` has a default implementation
/// covering the full protocol (call the gateway, parse the response,
/// validate and stamp each item); only `category`, `model_shape`,
/// `get_prompt`, and `parse_content` need implementing per category.
#[async_trait]
pub trait CategoryExtractor: Send + Sync {
    fn category(&self) -> ExtractionType;

    /// The content shape this extractor produces, for diagnostics and logs.
    fn model_shape(&self) -> &'static str;

    /// The composed full prompt for this category (preamble plus the
    /// category-specific instructions), without content embedded — content
    /// is passed to the gateway as a separate argument.
    fn get_prompt(&self) -> Result<String>;

    /// Validate and parse a raw JSON value into this category's content shape.
    fn parse_content(&self, raw: Value) -> Result<ExtractionContent>;

    fn config(&self) -> ExtractorConfig {
        ExtractorConfig::default()
    }

    /// Run the full protocol for one context: call the gateway with
    /// [`Self::get_prompt`] and `content`, parse the response into one or
    /// more items, and stamp each into an [`Extraction`] envelope. Never
    /// returns an empty list for a successful gateway call: an unparseable
    /// response yields exactly one failed outcome.
    async fn extract(
        &self,
        llm_gateway: &dyn LlmGateway,
        content: &str,
        source_id: &str,
        context_level: ContextLevel,
        context_id: &str,
        chunk_ids: &[String],
    ) -> Vec<ExtractionOutcome> {
        let prompt = match self.get_prompt() {
            Ok(p) => p,
            Err(e) => return vec![ExtractionOutcome::Failure { error: e.to_string(), code: e.code() }],
        };

        let raw = match llm_gateway.extract(&prompt, content).await {
            Ok(text) => text,
            Err(e) => return vec![ExtractionOutcome::gateway_failure(e)],
        };

        let items = match parse_json_response(&raw) {
            Ok(items) => items,
            Err(e) => return vec![ExtractionOutcome::parse_error(e.to_string())],
        };

        let config = self.config();
        let primary_chunk_id = chunk_ids
            .first()
            .cloned()
            .unwrap_or_else(|| format!("{context_id}_sentinel"));

        let mut outcomes = Vec::with_capacity(items.len());
        let mut successes = 0usize;
        for item in items {
            if successes >= config.max_extractions_per_chunk {
                break;
            }

            let confidence = item.get("confidence").and_then(|v| v.as_f64()).unwrap_or(DEFAULT_CONFIDENCE);
            if confidence < config.min_confidence {
                outcomes.push(ExtractionOutcome::validation_failure(format!(
                    "confidence {confidence} below minimum {}",
                    config.min_confidence
                )));
                continue;
            }

            let parsed = match self.parse_content(item) {
                Ok(c) => c,
                Err(e) => {
                    outcomes.push(ExtractionOutcome::validation_failure(e.to_string()));
                    continue;
                }
            };

            let topics = if config.auto_tag_topics { auto_tag(&parsed) } else { Vec::new() };

            let extraction = Extraction {
                id: String::new(),
                source_id: source_id.to_string(),
                chunk_id: primary_chunk_id.clone(),
                topics,
                confidence,
                schema_version: SCHEMA_VERSION.to_string(),
                extracted_at: chrono::Utc::now(),
                context_level,
                context_id: context_id.to_string(),
                chunk_ids: chunk_ids.to_vec(),
                content: parsed,
            };

            if let Err(e) = extraction.validate() {
                outcomes.push(ExtractionOutcome::validation_failure(e.to_string()));
                continue;
            }

            successes += 1;
            outcomes.push(ExtractionOutcome::Success(extraction));
        }

        outcomes
    }
}

/// Extractor that does nothing beyond shape validation — sufficient for all
/// seven categories, since the prompts already constrain the model's output
/// shape and [`ExtractionContent::parse`] does the routing.
pub struct DefaultCategoryExtractor {
    category: ExtractionType,
    prompts: Arc<PromptLoader>,
    config: ExtractorConfig,
}

impl DefaultCategoryExtractor {
    pub fn new(category: ExtractionType, prompts: Arc<PromptLoader>) -> Self {
        Self { category, prompts, config: ExtractorConfig::default() }
    }

    pub fn with_config(mut self, config: ExtractorConfig) -> Self {
        self.config = config;
        self
    }
}

#[async_trait]
impl CategoryExtractor for DefaultCategoryExtractor {
    fn category(&self) -> ExtractionType {
        self.category
    }

    fn model_shape(&self) -> &'static str {
        self.category.as_str()
    }

    fn get_prompt(&self) -> Result<String> {
        self.prompts.compose(self.category)
    }

    fn parse_content(&self, raw: Value) -> Result<ExtractionContent> {
        ExtractionContent::parse(self.category, raw)
    }

    fn config(&self) -> ExtractorConfig {
        self.config
    }
}

/// Build a registry pre-populated with the default extractor for every
/// category (spec §4.6: the pipeline ships all seven out of the box), all
/// sharing one [`PromptLoader`].
pub fn default_registry(prompts: Arc<PromptLoader>) -> super::registry::ExtractorRegistry {
    let registry = super::registry::ExtractorRegistry::new();
    for category in ExtractionType::ALL {
        registry.register(Arc::new(DefaultCategoryExtractor::new(category, prompts.clone())));
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeLlmGateway;
    use serde_json::json;

    fn loader() -> Arc<PromptLoader> {
        Arc::new(PromptLoader::default_dir())
    }

    #[test]
    fn default_registry_covers_all_categories() {
        let registry = default_registry(loader());
        for category in ExtractionType::ALL {
            assert!(registry.is_registered(category));
        }
    }

    #[test]
    fn default_extractor_routes_through_content_parse() {
        let extractor = DefaultCategoryExtractor::new(ExtractionType::Warning, loader());
        let content = extractor
            .parse_content(json!({"title": "t", "description": "d"}))
            .unwrap();
        assert_eq!(content.extraction_type(), ExtractionType::Warning);
    }

    #[tokio::test]
    async fn extract_caps_at_max_extractions_per_chunk() {
        let extractor = DefaultCategoryExtractor::new(ExtractionType::Warning, loader())
            .with_config(ExtractorConfig { max_extractions_per_chunk: 1, ..ExtractorConfig::default() });
        let gateway = FakeLlmGateway::always(
            json!([
                {"title": "a", "description": "d", "confidence": 0.9},
                {"title": "b", "description": "d", "confidence": 0.9},
            ])
            .to_string(),
        );
        let outcomes = extractor
            .extract(&gateway, "content", "src1", ContextLevel::Chunk, "ctx1", &["chunk1".to_string()])
            .await;
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_success());
    }

    #[tokio::test]
    async fn extract_rejects_low_confidence_items() {
        let extractor = DefaultCategoryExtractor::new(ExtractionType::Warning, loader());
        let gateway = FakeLlmGateway::always(
            json!([{"title": "a", "description": "d", "confidence": 0.1}]).to_string(),
        );
        let outcomes = extractor
            .extract(&gateway, "content", "src1", ContextLevel::Chunk, "ctx1", &["chunk1".to_string()])
            .await;
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].is_success());
    }

    #[tokio::test]
    async fn extract_unparseable_response_yields_one_failed_outcome() {
        let extractor = DefaultCategoryExtractor::new(ExtractionType::Warning, loader());
        let gateway = FakeLlmGateway::always("not json at all");
        let outcomes = extractor
            .extract(&gateway, "content", "src1", ContextLevel::Chunk, "ctx1", &["chunk1".to_string()])
            .await;
        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            ExtractionOutcome::Failure { error, .. } => assert!(error.to_lowercase().contains("parse")),
            ExtractionOutcome::Success(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn extract_stamps_chunk_ids_and_primary_chunk() {
        let extractor = DefaultCategoryExtractor::new(ExtractionType::Warning, loader());
        let gateway = FakeLlmGateway::always(
            json!({"title": "a", "description": "d", "confidence": 0.9}).to_string(),
        );
        let chunk_ids = vec!["c1".to_string(), "c2".to_string()];
        let outcomes = extractor
            .extract(&gateway, "content", "src1", ContextLevel::Section, "sec1", &chunk_ids)
            .await;
        match &outcomes[0] {
            ExtractionOutcome::Success(extraction) => {
                assert_eq!(extraction.chunk_id, "c1");
                assert_eq!(extraction.chunk_ids, chunk_ids);
                assert_eq!(extraction.context_id, "sec1");
            }
            ExtractionOutcome::Failure { error, .. } => panic!("expected success, got {error}"),
        }
    }
}
