//! Structured field extraction through a language model.

mod client;
mod normalize;
mod prompt;

pub use client::{ChatCompletionsClient, CompletionClient, CompletionRequest};
pub use normalize::{normalize, strip_code_fence};
pub use prompt::SYSTEM_PROMPT;

use tracing::{debug, info, warn};

use crate::error::{CompletionError, ExtractionFailure};
use crate::models::config::ExtractionConfig;

/// Sends OCR text to the completion client with the field-extraction
/// instruction.
///
/// Without a client every call fails with
/// [`ExtractionFailure::NotConfigured`]; the rest of the pipeline keeps
/// working.
pub struct StructuredExtractor {
    client: Option<Box<dyn CompletionClient>>,
    model: String,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

impl StructuredExtractor {
    pub fn new(client: Option<Box<dyn CompletionClient>>, config: &ExtractionConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
        }
    }

    /// Build the HTTP client when a non-empty credential is available.
    pub fn from_config(
        config: &ExtractionConfig,
        api_key: Option<String>,
    ) -> Result<Self, CompletionError> {
        let client: Option<Box<dyn CompletionClient>> =
            match api_key.filter(|key| !key.trim().is_empty()) {
                Some(key) => {
                    info!("Extraction enabled with model {}", config.model);
                    Some(Box::new(ChatCompletionsClient::new(
                        key,
                        config.endpoint.clone(),
                        config.timeout_secs,
                    )?))
                }
                None => {
                    warn!(
                        "No credential in {}; structured extraction disabled",
                        config.api_key_env
                    );
                    None
                }
            };

        Ok(Self::new(client, config))
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask the model for the six schema fields of `text`.
    pub async fn extract_fields(&self, text: &str) -> Result<String, ExtractionFailure> {
        let client = self
            .client
            .as_ref()
            .ok_or(ExtractionFailure::NotConfigured)?;

        let request = CompletionRequest {
            model: self.model.clone(),
            system_prompt: SYSTEM_PROMPT.to_string(),
            user_prompt: text.to_string(),
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
        };

        debug!("Requesting fields from {} via {}", self.model, client.name());
        Ok(client.complete(&request).await?)
    }
}
