//! Chat-completion client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CompletionError;

/// One system + user exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

/// A text-completion service.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    fn name(&self) -> &str;

    /// Send the request and return the first choice's content.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

/// Client for OpenAI-compatible `/chat/completions` endpoints
/// (GitHub Models, OpenRouter, OpenAI).
pub struct ChatCompletionsClient {
    client: Client,
    api_key: String,
    base_url: String,
    timeout_secs: u64,
}

impl ChatCompletionsClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout_secs,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[async_trait]
impl CompletionClient for ChatCompletionsClient {
    fn name(&self) -> &str {
        "chat-completions"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let start = Instant::now();

        let body = ChatRequest {
            model: &request.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system_prompt.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user_prompt.clone(),
                },
            ],
            temperature: request.temperature,
            top_p: request.top_p,
            max_tokens: request.max_tokens,
        };

        debug!(model = %request.model, "Sending chat completion request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), error_body));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Decode(e.to_string()))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| CompletionError::Decode("response has no choices".to_string()))?;

        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            "Chat completion received"
        );
        Ok(content)
    }
}

impl ChatCompletionsClient {
    fn transport_error(&self, e: reqwest::Error) -> CompletionError {
        if e.is_timeout() {
            CompletionError::Timeout(self.timeout_secs)
        } else {
            CompletionError::Transport(e.to_string())
        }
    }
}

/// Map a non-success HTTP status to an error.
fn classify_status(status: u16, body: String) -> CompletionError {
    match status {
        401 | 403 => CompletionError::Unauthorized(body),
        _ => CompletionError::Status { status, body },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(401, "Bad credentials".into()),
            CompletionError::Unauthorized(_)
        ));
        assert!(matches!(
            classify_status(403, String::new()),
            CompletionError::Unauthorized(_)
        ));
        assert!(matches!(
            classify_status(429, "rate limited".into()),
            CompletionError::Status { status: 429, .. }
        ));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = ChatCompletionsClient::new("token", "https://models.github.ai/inference/", 5).unwrap();
        assert_eq!(client.base_url, "https://models.github.ai/inference");
    }

    #[test]
    fn test_request_body_shape() {
        let body = ChatRequest {
            model: "openai/gpt-4o-mini",
            messages: vec![ChatMessage {
                role: "user".into(),
                content: "hi".into(),
            }],
            temperature: 0.0,
            top_p: 1.0,
            max_tokens: 1000,
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "openai/gpt-4o-mini");
        assert_eq!(json["max_tokens"], 1000);
        assert_eq!(json["top_p"], 1.0);
        assert_eq!(json["messages"][0]["role"], "user");
    }
}
