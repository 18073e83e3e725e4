use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{http_client, require_text, send_for_json, ProviderClient, ProviderFailure, ProviderId, RequestOptions};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";

/// Google Generative Language `generateContent`.
pub struct GeminiProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: http_client(),
            api_key,
            base_url: GEMINI_API_URL.to_string(),
        }
    }
}

fn build_body(prompt: &str, options: &RequestOptions) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
        "generationConfig": {
            "temperature": options.temperature,
            "topK": 40,
            "topP": 0.95,
            "maxOutputTokens": options.max_tokens,
        }
    })
}

fn extract_text(body: &Value) -> Option<String> {
    body.pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl ProviderClient for GeminiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Gemini
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
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        let request = self
            .client
            .post(url)
            .query(&[("key", api_key)])
            .json(&build_body(prompt, options));

        let body = send_for_json(self.id(), request).await?;
        require_text(self.id(), extract_text(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_shape() {
        let options = RequestOptions {
            temperature: 0.2,
            max_tokens: 512,
            ..Default::default()
        };
        let body = build_body("Line A\nLine B", &options);
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Line A\nLine B");
        assert_eq!(body["generationConfig"]["topK"], 40);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 512);
    }

    #[test]
    fn test_extract_text_from_first_candidate() {
        let body = json!({
            "candidates": [{ "content": { "parts": [{ "text": "answer" }] } }]
        });
        assert_eq!(extract_text(&body).as_deref(), Some("answer"));
        assert_eq!(extract_text(&json!({ "candidates": [] })), None);
    }
}
