use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{http_client, require_text, send_for_json, ProviderClient, ProviderFailure, ProviderId, RequestOptions};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

impl AnthropicResponse {
    /// Text of the first text block.
    fn text(self) -> Option<String> {
        self.content
            .into_iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text)
    }
}

/// Anthropic Messages API.
pub struct AnthropicProvider {
    client: Client,
    api_key: Option<String>,
    url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: http_client(),
            api_key,
            url: ANTHROPIC_API_URL.to_string(),
        }
    }
}

fn build_body<'a>(prompt: &'a str, model: &'a str, options: &RequestOptions) -> AnthropicRequest<'a> {
    AnthropicRequest {
        model,
        max_tokens: options.max_tokens,
        temperature: options.temperature,
        messages: vec![AnthropicMessage {
            role: "user",
            content: prompt,
        }],
    }
}

fn extract_text(body: Value) -> Option<String> {
    serde_json::from_value::<AnthropicResponse>(body)
        .ok()
        .and_then(AnthropicResponse::text)
}

#[async_trait]
impl ProviderClient for AnthropicProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Anthropic
    }

    async fn complete(
        &self,
        prompt: &str,
        options: &RequestOptions,
    ) -> Result<String, ProviderFailure> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderFailure::missing_credentials(self.id()))?;
        let model = options.model.as_deref().unwrap_or(DEFAULT_MODEL);

        let request = self
            .client
            .post(&self.url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&build_body(prompt, model, options));

        let body = send_for_json(self.id(), request).await?;
        require_text(self.id(), extract_text(body))
    }
}
