//! Prompt Loader (spec §4.2): composes one full prompt per category from a
//! shared preamble file plus a per-category instruction file, loaded from a
//! base directory. Fails loudly if a requested file is absent — that base
//! directory is the only state the loader carries.

use std::fs;
use std::path::PathBuf;

use crate::error::{ExtractionError, Result};
use crate::types::ExtractionType;

/// Directory bundled with this crate, used unless a deployment overrides it
/// via `PipelineConfig::prompt_dir`.
pub fn default_prompt_dir() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/prompts")
}

pub struct PromptLoader {
    base_dir: PathBuf,
}

impl PromptLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    /// The prompt directory bundled with this crate.
    pub fn default_dir() -> Self {
        Self::new(default_prompt_dir())
    }

    fn read(&self, file_name: &str) -> Result<String> {
        let path = self.base_dir.join(file_name);
        fs::read_to_string(&path).map_err(|e| {
            ExtractionError::Config(format!("prompt file {} could not be read: {e}", path.display()))
        })
    }

    pub fn preamble(&self) -> Result<String> {
        self.read("preamble.txt")
    }

    pub fn category_prompt(&self, category: ExtractionType) -> Result<String> {
        self.read(&format!("{}.txt", category.as_str()))
    }

    /// Compose the full prompt for `category`: preamble plus the
    /// category-specific instructions, joined by a single newline.
    pub fn compose(&self, category: ExtractionType) -> Result<String> {
        let preamble = self.preamble()?;
        let specific = self.category_prompt(category)?;
        Ok(format!("{preamble}\n{specific}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composes_preamble_and_category_prompt() {
        let loader = PromptLoader::default_dir();
        let prompt = loader.compose(ExtractionType::Decision).unwrap();
        assert!(prompt.contains("JSON"));
        assert!(prompt.contains("question"));
    }

    #[test]
    fn every_category_has_a_prompt_file() {
        let loader = PromptLoader::default_dir();
        for category in ExtractionType::ALL {
            assert!(loader.category_prompt(category).is_ok());
        }
    }

    #[test]
    fn missing_file_fails_loudly() {
        let loader = PromptLoader::new("/nonexistent/path/for/prompts");
        let err = loader.preamble().unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::InternalError);
    }
}
