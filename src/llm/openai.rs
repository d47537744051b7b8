//! `OpenAI` client.

use super::chat::{self, ChatCompletionRequest};
use super::{CompletionClient, LlmHttpConfig, build_http_client};
use crate::Result;
use async_trait::async_trait;
use secrecy::SecretString;

/// `OpenAI` chat completion client (bearer authentication).
pub struct OpenAiClient {
    /// API key.
    api_key: SecretString,
    /// API endpoint.
    endpoint: String,
    /// Model to use.
    model: String,
    /// HTTP client.
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.openai.com/v1";

    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-mini";

    /// Creates a new `OpenAI` client.
    #[must_use]
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            client: build_http_client(LlmHttpConfig::default()),
        }
    }

    /// Sets the API endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Replaces the HTTP client.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Returns the configured model.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Reasoning models reject a custom temperature.
    fn supports_temperature(&self) -> bool {
        !(self.model.starts_with("gpt-5")
            || self.model.starts_with("o1")
            || self.model.starts_with("o3"))
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    #[tracing::instrument(skip_all, fields(provider = "openai", model = %self.model))]
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let mut request = ChatCompletionRequest::new(&self.model, system, user);
        request.max_tokens = Some(1024);
        if self.supports_temperature() {
            request.temperature = Some(0.1);
        }

        chat::send(
            &self.client,
            self.name(),
            &format!("{}/chat/completions", self.endpoint),
            Some(&self.api_key),
            &request,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SecretString {
        SecretString::from("test-key".to_string())
    }

    #[test]
    fn test_client_creation() {
        let client = OpenAiClient::new(key());
        assert_eq!(client.name(), "openai");
        assert_eq!(client.model(), OpenAiClient::DEFAULT_MODEL);
    }

    #[test]
    fn test_client_configuration() {
        let client = OpenAiClient::new(key())
            .with_endpoint("https://custom.endpoint/")
            .with_model("gpt-4");

        assert_eq!(client.endpoint, "https://custom.endpoint");
        assert_eq!(client.model(), "gpt-4");
    }

    #[test]
    fn test_temperature_support() {
        assert!(OpenAiClient::new(key()).supports_temperature());
        assert!(!OpenAiClient::new(key()).with_model("o3-mini").supports_temperature());
        assert!(!OpenAiClient::new(key()).with_model("gpt-5").supports_temperature());
    }
}
