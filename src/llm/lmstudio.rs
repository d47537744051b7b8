//! LM Studio client.

use super::chat::{self, ChatCompletionRequest};
use super::{CompletionClient, LlmHttpConfig, build_http_client};
use crate::Result;
use async_trait::async_trait;

/// LM Studio local client.
///
/// LM Studio serves an OpenAI-compatible API on localhost without
/// authentication.
pub struct LmStudioClient {
    /// API endpoint.
    endpoint: String,
    /// Model to use (LM Studio answers with whichever model is loaded).
    model: String,
    /// HTTP client.
    client: reqwest::Client,
}

impl LmStudioClient {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "http://127.0.0.1:1234/v1";

    /// Default model identifier.
    pub const DEFAULT_MODEL: &'static str = "local-model";

    /// Creates a new LM Studio client.
    #[must_use]
    pub fn new() -> Self {
        Self {
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

    /// Checks if LM Studio is reachable.
    pub async fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/models", self.endpoint))
            .send()
            .await
            .is_ok_and(|r| r.status().is_success())
    }
}

impl Default for LmStudioClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionClient for LmStudioClient {
    fn name(&self) -> &'static str {
        "lmstudio"
    }

    #[tracing::instrument(skip_all, fields(provider = "lmstudio", model = %self.model))]
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let mut request = ChatCompletionRequest::new(&self.model, system, user);
        request.max_tokens = Some(1024);
        request.temperature = Some(0.1);

        chat::send(
            &self.client,
            self.name(),
            &format!("{}/chat/completions", self.endpoint),
            None,
            &request,
        )
        .await
    }
}
