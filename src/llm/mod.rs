//! Language model client abstraction.
//!
//! Provides a unified completion interface over OpenAI-compatible chat APIs.

mod chat;
mod lmstudio;
mod openai;

pub use lmstudio::LmStudioClient;
pub use openai::OpenAiClient;

use crate::config::{LlmConfig, LlmProvider};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A chat completion backend.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// The provider name, used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Sends a system prompt and a user message and returns the reply text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ExternalService`] on transport failure, a
    /// non-success status, or a malformed body.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// HTTP client configuration for language model providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LlmHttpConfig {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for LlmHttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
        }
    }
}

impl LlmHttpConfig {
    /// Loads HTTP configuration from config file settings.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut settings = Self::default();
        if let Some(timeout_ms) = config.timeout_ms {
            settings.timeout_ms = timeout_ms;
        }
        if let Some(connect_timeout_ms) = config.connect_timeout_ms {
            settings.connect_timeout_ms = connect_timeout_ms;
        }
        settings
    }
}

/// Builds an HTTP client for completion requests with configured timeouts.
#[must_use]
pub fn build_http_client(config: LlmHttpConfig) -> reqwest::Client {
    let mut builder = reqwest::Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build LLM HTTP client: {err}");
        reqwest::Client::new()
    })
}

/// Builds the configured completion client, or `None` when disabled.
///
/// An `OpenAI` provider without an API key is treated as disabled.
#[must_use]
pub fn client_from_config(config: &LlmConfig) -> Option<Arc<dyn CompletionClient>> {
    let http = build_http_client(LlmHttpConfig::from_config(config));
    match config.provider {
        LlmProvider::Disabled => None,
        LlmProvider::OpenAi => {
            let Some(api_key) = config.api_key.clone() else {
                tracing::warn!("OpenAI provider selected but no API key configured");
                return None;
            };
            let mut client = OpenAiClient::new(api_key).with_http_client(http);
            if let Some(model) = &config.model {
                client = client.with_model(model);
            }
            if let Some(url) = &config.base_url {
                client = client.with_endpoint(url);
            }
            Some(Arc::new(client))
        },
        LlmProvider::LmStudio => {
            let mut client = LmStudioClient::new().with_http_client(http);
            if let Some(model) = &config.model {
                client = client.with_model(model);
            }
            if let Some(url) = &config.base_url {
                client = client.with_endpoint(url);
            }
            Some(Arc::new(client))
        },
    }
}

/// Extracts JSON from a completion, handling markdown code blocks and
/// surrounding prose.
#[must_use]
pub fn extract_json_from_response(response: &str) -> &str {
    let trimmed = response.trim();

    // ```json ... ``` blocks
    if let Some(start) = trimmed.find("```json") {
        let json_start = start + 7;
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    // ``` ... ``` blocks without a language marker
    if let Some(start) = trimmed.find("```") {
        let content_start = start + 3;
        let after_marker = &trimmed[content_start..];
        let json_start = after_marker
            .find('{')
            .map_or(content_start, |pos| content_start + pos);
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    // Raw JSON: first { to last }
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return &trimmed[start..=end];
        }
    }

    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn test_extract_json_raw() {
        let response = r#"{"key": "value"}"#;
        assert_eq!(extract_json_from_response(response), r#"{"key": "value"}"#);
    }

    #[test]
    fn test_extract_json_markdown() {
        let response = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(extract_json_from_response(response), r#"{"key": "value"}"#);
    }

    #[test]
    fn test_extract_json_bare_fence() {
        let response = "```\n{\"tool\": \"get_statistics\"}\n```";
        assert_eq!(
            extract_json_from_response(response),
            r#"{"tool": "get_statistics"}"#
        );
    }

    #[test]
    fn test_extract_json_with_prefix() {
        let response = "Sure! {\"key\": \"value\"} hope this helps";
        assert_eq!(extract_json_from_response(response), r#"{"key": "value"}"#);
    }

    #[test]
    fn test_extract_json_plain_text() {
        assert_eq!(extract_json_from_response("  just words  "), "just words");
        assert_eq!(extract_json_from_response("} backwards {"), "} backwards {");
    }

    #[test]
    fn test_http_config_from_config() {
        let config = LlmConfig {
            timeout_ms: Some(1_000),
            ..LlmConfig::default()
        };
        let http = LlmHttpConfig::from_config(&config);
        assert_eq!(http.timeout_ms, 1_000);
        assert_eq!(http.connect_timeout_ms, 3_000);
    }

    #[test]
    fn test_client_from_config() {
        assert!(client_from_config(&LlmConfig::default()).is_none());

        let openai_without_key = LlmConfig {
            provider: LlmProvider::OpenAi,
            ..LlmConfig::default()
        };
        assert!(client_from_config(&openai_without_key).is_none());

        let openai = LlmConfig {
            provider: LlmProvider::OpenAi,
            api_key: Some(SecretString::from("sk-test".to_string())),
            ..LlmConfig::default()
        };
        assert_eq!(client_from_config(&openai).map(|c| c.name()), Some("openai"));

        let lmstudio = LlmConfig {
            provider: LlmProvider::LmStudio,
            ..LlmConfig::default()
        };
        assert_eq!(
            client_from_config(&lmstudio).map(|c| c.name()),
            Some("lmstudio")
        );
    }
}
