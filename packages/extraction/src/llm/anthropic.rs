//! Anthropic Messages API implementation of [`LlmGateway`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{GatewayError, GatewayResult};

use super::LlmGateway;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF_MS: u64 = 500;

/// Reference `LlmGateway` backed by Anthropic's Messages API.
pub struct AnthropicGateway {
    client: Client,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
    base_url: String,
}

impl AnthropicGateway {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            client: Client::new(),
            api_key: SecretString::from(api_key.into()),
            model: model.into(),
            max_tokens,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn call_once(&self, prompt: &str, content: &str) -> GatewayResult<String> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: 0.0,
            messages: vec![Message {
                role: "user".to_string(),
                content: format!("{prompt}\n\n{content}"),
            }],
        };

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::Transient(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::Auth(text));
        }
        if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::BadRequest(text));
        }
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::Transient(format!("{status}: {text}")));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api(format!("{status}: {text}")));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Api(format!("malformed response body: {e}")))?;

        debug!(
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            model = %self.model,
            "llm gateway call completed"
        );

        parsed
            .content
            .into_iter()
            .find(|b| b.block_type == "text")
            .map(|b| b.text)
            .ok_or_else(|| GatewayError::Api("no text block in response".into()))
    }
}

#[async_trait]
impl LlmGateway for AnthropicGateway {
    /// Retries transient failures with exponential backoff, up to
    /// [`MAX_ATTEMPTS`]. Auth and bad-request failures are not retried —
    /// retrying a malformed request just burns the budget for nothing.
    async fn extract(&self, prompt: &str, content: &str) -> GatewayResult<String> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.call_once(prompt, content).await {
                Ok(text) => return Ok(text),
                Err(GatewayError::Transient(reason)) if attempt < MAX_ATTEMPTS => {
                    let backoff = BASE_BACKOFF_MS * 2u64.pow(attempt - 1);
                    warn!(attempt, backoff_ms = backoff, %reason, "llm gateway retrying");
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Err(GatewayError::Transient(reason)) => {
                    return Err(GatewayError::Transient(format!(
                        "exhausted {MAX_ATTEMPTS} attempts: {reason}"
                    )))
                }
                Err(other) => return Err(other),
            }
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_builder_sets_base_url() {
        let gateway = AnthropicGateway::new("key", "claude-3-5-sonnet-20241022", 4096)
            .with_base_url("http://localhost:9999");
        assert_eq!(gateway.base_url, "http://localhost:9999");
    }
}
