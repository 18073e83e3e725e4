use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{http_client, require_text, send_for_json, ProviderClient, ProviderFailure, ProviderId, RequestOptions};

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-pro-preview";
const REFERER: &str = "http://localhost:3001";
const APP_TITLE: &str = "Tailor CV Optimizer";

/// OpenRouter chat completions (OpenAI-compatible).
pub struct OpenRouterProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl OpenRouterProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: http_client(),
            api_key,
            base_url: OPENROUTER_API_URL.to_string(),
        }
    }
}

fn build_body(prompt: &str, model: &str, options: &RequestOptions) -> Value {
    json!({
        "model": model,
        "messages": [{ "role": "user", "content": prompt }],
        "temperature": options.temperature,
        "max_tokens": options.max_tokens,
        "top_p": 0.95,
    })
}

fn extract_text(body: &Value) -> Option<String> {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl ProviderClient for OpenRouterProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenRouter
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
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .header("HTTP-Referer", REFERER)
            .header("X-Title", APP_TITLE)
            .json(&build_body(prompt, model, options));

        let body = send_for_json(self.id(), request).await?;
        require_text(self.id(), extract_text(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_shape() {
        let body = build_body("prompt text", DEFAULT_MODEL, &RequestOptions::default());
        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["messages"][0]["content"], "prompt text");
        assert_eq!(body["max_tokens"], 2048);
    }

    #[test]
    fn test_extract_text() {
        let body = json!({ "choices": [{ "message": { "role": "assistant", "content": "hi" } }] });
        assert_eq!(extract_text(&body).as_deref(), Some("hi"));
        assert_eq!(extract_text(&json!({ "choices": [] })), None);
    }
}
