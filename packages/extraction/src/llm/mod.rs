//! LLM Gateway (spec §4.3): a single `extract` operation with bounded
//! retry, fronting whichever model backend is configured.

pub mod anthropic;

use async_trait::async_trait;

use crate::error::GatewayResult;

pub use anthropic::AnthropicGateway;

/// The one operation every extractor call goes through. Implementations own
/// retry for transient failures; callers only see the final outcome.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn extract(&self, prompt: &str, content: &str) -> GatewayResult<String>;
}
