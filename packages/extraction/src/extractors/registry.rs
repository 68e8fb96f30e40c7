//! Extractor Registry (spec §4.6): process-wide category -> extractor map.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::warn;

use crate::error::{ExtractionError, Result};
use crate::types::ExtractionType;

use super::CategoryExtractor;

/// Holds one [`CategoryExtractor`] per [`ExtractionType`]. Registration is
/// idempotent: registering over an existing category replaces it and logs a
/// warning rather than erroring, so a misconfigured startup doesn't take
/// down the whole process.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: Arc<DashMap<ExtractionType, Arc<dyn CategoryExtractor>>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            extractors: Arc::new(DashMap::new()),
        }
    }

    pub fn register(&self, extractor: Arc<dyn CategoryExtractor>) {
        let category = extractor.category();
        if self.extractors.insert(category, extractor).is_some() {
            warn!(%category, "extractor re-registered for category, replacing previous registration");
        }
    }

    pub fn get(&self, category: ExtractionType) -> Result<Arc<dyn CategoryExtractor>> {
        self.extractors
            .get(&category)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                ExtractionError::UnsupportedExtractionType(category.as_str().to_string())
            })
    }

    pub fn is_registered(&self, category: ExtractionType) -> bool {
        self.extractors.contains_key(&category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExtractionContent;
    use async_trait::async_trait;

    struct StubExtractor(ExtractionType);

    #[async_trait]
    impl CategoryExtractor for StubExtractor {
        fn category(&self) -> ExtractionType {
            self.0
        }

        fn model_shape(&self) -> &'static str {
            self.0.as_str()
        }

        fn get_prompt(&self) -> Result<String> {
            Ok("stub prompt".to_string())
        }

        fn parse_content(&self, raw: serde_json::Value) -> Result<ExtractionContent> {
            ExtractionContent::parse(self.0, raw)
        }
    }

    #[test]
    fn missing_category_is_unsupported() {
        let registry = ExtractorRegistry::new();
        let err = match registry.get(ExtractionType::Decision) {
            Err(e) => e,
            Ok(_) => panic!("expected missing category to be unsupported"),
        };
        assert_eq!(err.code(), crate::error::ErrorCode::UnsupportedExtractionType);
    }

    #[test]
    fn re_registration_replaces_last_writer_wins() {
        let registry = ExtractorRegistry::new();
        registry.register(Arc::new(StubExtractor(ExtractionType::Decision)));
        registry.register(Arc::new(StubExtractor(ExtractionType::Decision)));
        assert!(registry.is_registered(ExtractionType::Decision));
    }
}
