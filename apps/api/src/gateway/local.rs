use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{http_client, require_text, send_for_json, ProviderClient, ProviderFailure, ProviderId, RequestOptions};

pub const DEFAULT_MODEL: &str = "llama3.2:3b-instruct";

/// Ollama-compatible local server. No credentials.
pub struct LocalProvider {
    client: Client,
    base_url: String,
    default_model: String,
}

impl LocalProvider {
    pub fn new(base_url: String, default_model: Option<String>) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
            default_model: default_model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }
}

fn build_body(prompt: &str, model: &str, options: &RequestOptions) -> Value {
    json!({
        "model": model,
        "prompt": prompt,
        "stream": false,
        "options": {
            "temperature": options.temperature,
            "num_predict": options.max_tokens,
        }
    })
}

fn extract_text(body: &Value) -> Option<String> {
    body.get("response")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl ProviderClient for LocalProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Local
    }

    async fn complete(
        &self,
        prompt: &str,
        options: &RequestOptions,
    ) -> Result<String, ProviderFailure> {
        let model = options.model.as_deref().unwrap_or(&self.default_model);

        let request = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&build_body(prompt, model, options));

        let body = send_for_json(self.id(), request).await?;
        require_text(self.id(), extract_text(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_disables_streaming() {
        let body = build_body("p", DEFAULT_MODEL, &RequestOptions::default());
        assert_eq!(body["stream"], false);
        assert_eq!(body["prompt"], "p");
        assert_eq!(body["options"]["num_predict"], 2048);
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let provider = LocalProvider::new("http://localhost:11434/".to_string(), None);
        assert_eq!(provider.base_url, "http://localhost:11434");
        assert_eq!(provider.default_model, DEFAULT_MODEL);
    }

    #[test]
    fn test_extract_text() {
        assert_eq!(
            extract_text(&json!({ "response": "done", "done": true })).as_deref(),
            Some("done")
        );
    }
}
