/// Model Gateway: the single point of entry for all text-completion calls.
///
/// ARCHITECTURAL RULE: No other module may call a provider API directly.
/// Callers name a logical feature; the routing table in `ProviderSettings`
/// picks the provider. The prompt is forwarded verbatim to whichever
/// provider is selected, wrapped only in that provider's envelope.
///
/// No retries happen here. A failed call surfaces as a `ProviderFailure`
/// and the user decides whether to try again.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

pub mod anthropic;
pub mod gemini;
pub mod handlers;
pub mod local;
pub mod openrouter;
pub mod settings;

use settings::ProviderSettings;

/// Ceiling for any single provider call. Providers usually answer well before this.
const PROVIDER_TIMEOUT_SECS: u64 = 120;
/// Error bodies are truncated to this many characters before they reach logs or users.
const MAX_ERROR_BODY_CHARS: usize = 500;

// ────────────────────────────────────────────────────────────────────────────
// Identifiers
// ────────────────────────────────────────────────────────────────────────────

/// The closed set of completion backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Gemini,
    OpenRouter,
    Anthropic,
    Local,
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderId::Gemini => "gemini",
            ProviderId::OpenRouter => "openrouter",
            ProviderId::Anthropic => "anthropic",
            ProviderId::Local => "local",
        };
        f.write_str(name)
    }
}

/// Logical features that can each be routed to a different provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureId {
    #[serde(rename = "jobDescription")]
    JobDescription,
    #[serde(rename = "generateCV")]
    GenerateCv,
    #[serde(rename = "jobHunt")]
    JobHunt,
    #[serde(rename = "jobTracker")]
    JobTracker,
}

/// Per-call generation knobs. Provider-specific fields are derived from these.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    /// Overrides the provider's default model.
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.7,
            max_tokens: 2048,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Failures
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureCause {
    RateLimited,
    Unauthorized,
    BadRequest,
    ServiceOverloaded,
    Unknown,
}

impl FailureCause {
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => FailureCause::RateLimited,
            401 | 403 => FailureCause::Unauthorized,
            400 | 404 | 422 => FailureCause::BadRequest,
            502 | 503 | 504 | 529 => FailureCause::ServiceOverloaded,
            _ => FailureCause::Unknown,
        }
    }

    /// Message shown to the user alongside the failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            FailureCause::RateLimited => "Rate limit exceeded. Please wait a moment before trying again.",
            FailureCause::Unauthorized => "The provider rejected the configured credentials.",
            FailureCause::BadRequest => "The provider rejected the request. Please check your input.",
            FailureCause::ServiceOverloaded => {
                "The provider is temporarily overloaded. Please try again in a few minutes."
            }
            FailureCause::Unknown => "The provider request failed.",
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{provider} request failed ({cause:?}): {message}")]
pub struct ProviderFailure {
    pub provider: ProviderId,
    pub cause: FailureCause,
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(provider: ProviderId, cause: FailureCause, message: impl Into<String>) -> Self {
        Self {
            provider,
            cause,
            status: None,
            message: message.into(),
        }
    }

    /// Builds a failure from a non-success HTTP response.
    /// Pulls `error.message` out of JSON error bodies when present.
    pub fn from_status(provider: ProviderId, status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| {
                v.pointer("/error/message")
                    .or_else(|| v.get("error"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| body.chars().take(MAX_ERROR_BODY_CHARS).collect());

        Self {
            provider,
            cause: FailureCause::from_status(status),
            status: Some(status),
            message,
        }
    }

    pub fn missing_credentials(provider: ProviderId) -> Self {
        Self::new(
            provider,
            FailureCause::Unauthorized,
            format!("{provider} API key not configured"),
        )
    }

    fn transport(provider: ProviderId, err: &reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::from_status(provider, status.as_u16(), &err.to_string()),
            None => Self::new(provider, FailureCause::Unknown, err.to_string()),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Provider trait
// ────────────────────────────────────────────────────────────────────────────

/// A text-completion backend. Implementations build their own request
/// envelope but must send `prompt` unchanged.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn id(&self) -> ProviderId;

    async fn complete(&self, prompt: &str, options: &RequestOptions)
        -> Result<String, ProviderFailure>;
}

/// Shared HTTP client for provider implementations.
pub fn http_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(PROVIDER_TIMEOUT_SECS))
        .build()
        .expect("Failed to build HTTP client")
}

/// Sends a prepared provider request and decodes the JSON body.
/// Non-success statuses are mapped onto `FailureCause`.
pub(crate) async fn send_for_json(
    provider: ProviderId,
    request: RequestBuilder,
) -> Result<Value, ProviderFailure> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderFailure::transport(provider, &e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!("{} API returned {}: {}", provider, status, body);
        return Err(ProviderFailure::from_status(provider, status.as_u16(), &body));
    }

    response.json::<Value>().await.map_err(|e| {
        ProviderFailure::new(
            provider,
            FailureCause::Unknown,
            format!("invalid response body: {e}"),
        )
    })
}

/// Turns an optional extracted completion into the final text, rejecting blanks.
pub(crate) fn require_text(
    provider: ProviderId,
    text: Option<String>,
) -> Result<String, ProviderFailure> {
    match text {
        Some(t) if !t.trim().is_empty() => Ok(t),
        _ => Err(ProviderFailure::new(
            provider,
            FailureCause::Unknown,
            "provider returned empty content",
        )),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Gateway
// ────────────────────────────────────────────────────────────────────────────

/// Dispatches prompts to providers according to the feature routing table.
///
/// The provider map and the routing table are both handed in at construction;
/// nothing here reads global state.
pub struct ModelGateway {
    providers: HashMap<ProviderId, Arc<dyn ProviderClient>>,
    routing: RwLock<ProviderSettings>,
}

impl ModelGateway {
    pub fn new(providers: Vec<Arc<dyn ProviderClient>>, routing: ProviderSettings) -> Self {
        Self {
            providers: providers.into_iter().map(|p| (p.id(), p)).collect(),
            routing: RwLock::new(routing),
        }
    }

    pub async fn routing(&self) -> ProviderSettings {
        self.routing.read().await.clone()
    }

    /// Replaces the routing table. In-flight calls keep the provider they started with.
    pub async fn set_routing(&self, routing: ProviderSettings) {
        *self.routing.write().await = routing;
    }

    pub async fn provider_for(&self, feature: FeatureId) -> ProviderId {
        self.routing.read().await.provider_for(feature)
    }

    /// Sends `prompt` to the provider configured for `feature` and returns its raw text.
    pub async fn request(
        &self,
        feature: FeatureId,
        prompt: &str,
        options: &RequestOptions,
    ) -> Result<String, ProviderFailure> {
        let provider_id = self.provider_for(feature).await;
        let provider = self.providers.get(&provider_id).ok_or_else(|| {
            ProviderFailure::new(
                provider_id,
                FailureCause::Unknown,
                format!("provider {provider_id} is not registered"),
            )
        })?;

        info!(
            "Dispatching {:?} prompt ({} chars) to {}",
            feature,
            prompt.len(),
            provider_id
        );
        let started = Instant::now();

        match provider.complete(prompt, options).await {
            Ok(text) => {
                info!(
                    "{} answered {:?} in {}ms ({} chars)",
                    provider_id,
                    feature,
                    started.elapsed().as_millis(),
                    text.len()
                );
                Ok(text)
            }
            Err(failure) => {
                warn!("{:?} call failed: {}", feature, failure);
                Err(failure)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Scripted provider for tests: replays queued outcomes and records prompts.
    pub struct ScriptedProvider {
        id: ProviderId,
        replies: Mutex<Vec<Result<String, ProviderFailure>>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        pub fn new(id: ProviderId, replies: Vec<Result<String, ProviderFailure>>) -> Self {
            Self {
                id,
                replies: Mutex::new(replies),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn replying(id: ProviderId, reply: &str) -> Self {
            Self::new(id, vec![Ok(reply.to_string())])
        }
    }

    #[async_trait]
    impl ProviderClient for ScriptedProvider {
        fn id(&self) -> ProviderId {
            self.id
        }

        async fn complete(
            &self,
            prompt: &str,
            _options: &RequestOptions,
        ) -> Result<String, ProviderFailure> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Err(ProviderFailure::new(
                    self.id,
                    FailureCause::Unknown,
                    "no scripted reply left",
                ));
            }
            replies.remove(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedProvider;
    use super::*;
    use crate::gateway::settings::FeatureRoute;

    fn routing_all(provider: ProviderId) -> ProviderSettings {
        let route = FeatureRoute { provider };
        ProviderSettings {
            job_description: route.clone(),
            generate_cv: route.clone(),
            job_hunt: route.clone(),
            job_tracker: route,
        }
    }

    #[test]
    fn test_failure_cause_from_status() {
        assert_eq!(FailureCause::from_status(429), FailureCause::RateLimited);
        assert_eq!(FailureCause::from_status(401), FailureCause::Unauthorized);
        assert_eq!(FailureCause::from_status(403), FailureCause::Unauthorized);
        assert_eq!(FailureCause::from_status(400), FailureCause::BadRequest);
        assert_eq!(FailureCause::from_status(503), FailureCause::ServiceOverloaded);
        assert_eq!(FailureCause::from_status(529), FailureCause::ServiceOverloaded);
        assert_eq!(FailureCause::from_status(500), FailureCause::Unknown);
    }

    #[test]
    fn test_from_status_extracts_json_error_message() {
        let body = r#"{"error": {"message": "Invalid API key", "type": "auth"}}"#;
        let failure = ProviderFailure::from_status(ProviderId::OpenRouter, 401, body);
        assert_eq!(failure.cause, FailureCause::Unauthorized);
        assert_eq!(failure.status, Some(401));
        assert_eq!(failure.message, "Invalid API key");
    }

    #[test]
    fn test_from_status_truncates_plain_body() {
        let body = "x".repeat(2000);
        let failure = ProviderFailure::from_status(ProviderId::Gemini, 500, &body);
        assert_eq!(failure.message.len(), MAX_ERROR_BODY_CHARS);
    }

    #[test]
    fn test_provider_id_serde_matches_display() {
        for id in [
            ProviderId::Gemini,
            ProviderId::OpenRouter,
            ProviderId::Anthropic,
            ProviderId::Local,
        ] {
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, format!("\"{id}\""));
        }
    }

    #[test]
    fn test_require_text_rejects_blank() {
        assert!(require_text(ProviderId::Local, Some("   ".to_string())).is_err());
        assert!(require_text(ProviderId::Local, None).is_err());
        assert_eq!(
            require_text(ProviderId::Local, Some("ok".to_string())).unwrap(),
            "ok"
        );
    }

    #[tokio::test]
    async fn test_gateway_routes_by_feature() {
        let gemini = Arc::new(ScriptedProvider::replying(ProviderId::Gemini, "from gemini"));
        let local = Arc::new(ScriptedProvider::replying(ProviderId::Local, "from local"));

        let mut routing = routing_all(ProviderId::Gemini);
        routing.job_description = FeatureRoute {
            provider: ProviderId::Local,
        };

        let gateway = ModelGateway::new(vec![gemini.clone(), local.clone()], routing);
        let options = RequestOptions::default();

        let text = gateway
            .request(FeatureId::JobDescription, "analyze", &options)
            .await
            .unwrap();
        assert_eq!(text, "from local");

        let text = gateway
            .request(FeatureId::GenerateCv, "optimize", &options)
            .await
            .unwrap();
        assert_eq!(text, "from gemini");
    }

    #[tokio::test]
    async fn test_gateway_sends_prompt_verbatim() {
        let provider = Arc::new(ScriptedProvider::replying(ProviderId::Anthropic, "ok"));
        let gateway =
            ModelGateway::new(vec![provider.clone()], routing_all(ProviderId::Anthropic));

        let prompt = "line one\n  line two {cvText}\n";
        gateway
            .request(FeatureId::GenerateCv, prompt, &RequestOptions::default())
            .await
            .unwrap();

        assert_eq!(provider.prompts.lock().unwrap()[0], prompt);
    }

    #[tokio::test]
    async fn test_gateway_does_not_retry_failures() {
        let provider = Arc::new(ScriptedProvider::new(
            ProviderId::Gemini,
            vec![
                Err(ProviderFailure::from_status(ProviderId::Gemini, 429, "slow down")),
                Ok("second".to_string()),
            ],
        ));
        let gateway = ModelGateway::new(vec![provider.clone()], routing_all(ProviderId::Gemini));

        let err = gateway
            .request(FeatureId::GenerateCv, "p", &RequestOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.cause, FailureCause::RateLimited);
        assert_eq!(provider.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_gateway_unregistered_provider_fails() {
        let gateway = ModelGateway::new(vec![], routing_all(ProviderId::OpenRouter));
        let err = gateway
            .request(FeatureId::JobHunt, "p", &RequestOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.provider, ProviderId::OpenRouter);
        assert_eq!(err.cause, FailureCause::Unknown);
    }

    #[tokio::test]
    async fn test_set_routing_switches_provider() {
        let gemini = Arc::new(ScriptedProvider::replying(ProviderId::Gemini, "g"));
        let local = Arc::new(ScriptedProvider::replying(ProviderId::Local, "l"));
        let gateway = ModelGateway::new(vec![gemini, local], routing_all(ProviderId::Gemini));

        gateway.set_routing(routing_all(ProviderId::Local)).await;
        assert_eq!(
            gateway.provider_for(FeatureId::GenerateCv).await,
            ProviderId::Local
        );
    }
}
