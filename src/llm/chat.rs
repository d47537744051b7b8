//! Chat Completions wire types shared by the OpenAI-compatible clients.

use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Request to the Chat Completions API.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ChatCompletionRequest {
    /// Builds a two-message request.
    pub fn new(model: &str, system: &str, user: &str) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            max_tokens: None,
            temperature: None,
        }
    }
}

/// A message in the chat.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Posts a chat completion request and returns the first choice's text.
pub async fn send(
    client: &reqwest::Client,
    provider: &'static str,
    url: &str,
    api_key: Option<&SecretString>,
    request: &ChatCompletionRequest,
) -> Result<String> {
    let result = send_inner(client, provider, url, api_key, request).await;
    let status = if result.is_ok() { "success" } else { "error" };
    metrics::counter!("llm_requests_total", "provider" => provider, "status" => status)
        .increment(1);
    result
}

async fn send_inner(
    client: &reqwest::Client,
    provider: &'static str,
    url: &str,
    api_key: Option<&SecretString>,
    request: &ChatCompletionRequest,
) -> Result<String> {
    let external = |cause: String| Error::ExternalService {
        service: provider.to_string(),
        cause,
    };

    let mut builder = client.post(url).json(request);
    if let Some(key) = api_key {
        builder = builder.bearer_auth(key.expose_secret());
    }

    let response = builder.send().await.map_err(|e| external(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(external(format!("API returned status: {status} - {body}")));
    }

    let response: ChatCompletionResponse = response
        .json()
        .await
        .map_err(|e| external(format!("malformed response: {e}")))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| external("no choices in response".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let mut request = ChatCompletionRequest::new("gpt-4o-mini", "sys", "hi");
        request.temperature = Some(0.1);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert!(json.get("max_tokens").is_none());
    }
}
