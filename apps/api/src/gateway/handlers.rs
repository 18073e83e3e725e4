//! Axum route handlers for provider routing settings.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::optimize::prompts::TEST_MODEL_PROMPT;
use crate::state::AppState;

use super::settings::{save_settings, ProviderSettings};
use super::{FeatureId, ProviderId, RequestOptions};

#[derive(Debug, Deserialize)]
pub struct TestModelRequest {
    pub feature: FeatureId,
}

#[derive(Debug, Serialize)]
pub struct TestModelResponse {
    pub feature: FeatureId,
    pub provider: ProviderId,
    pub response: String,
}

/// GET /api/v1/settings/model-settings
pub async fn handle_get_model_settings(State(state): State<AppState>) -> Json<ProviderSettings> {
    Json(state.gateway.routing().await)
}

/// PUT /api/v1/settings/model-settings
///
/// Persists the table, then swaps it into the gateway. Every feature must be
/// present and every provider known; serde rejects anything else with 422.
pub async fn handle_put_model_settings(
    State(state): State<AppState>,
    Json(settings): Json<ProviderSettings>,
) -> Result<Json<ProviderSettings>, AppError> {
    save_settings(&state.config.model_settings_path, &settings).await?;
    state.gateway.set_routing(settings.clone()).await;
    info!("Model settings updated: {:?}", settings);
    Ok(Json(settings))
}

/// POST /api/v1/settings/test-model
///
/// Sends a short fixed prompt through the provider routed for `feature`.
pub async fn handle_test_model(
    State(state): State<AppState>,
    Json(request): Json<TestModelRequest>,
) -> Result<Json<TestModelResponse>, AppError> {
    let provider = state.gateway.provider_for(request.feature).await;
    let options = RequestOptions {
        max_tokens: 64,
        ..RequestOptions::default()
    };
    let response = state
        .gateway
        .request(request.feature, TEST_MODEL_PROMPT, &options)
        .await?;

    Ok(Json(TestModelResponse {
        feature: request.feature,
        provider,
        response: response.trim().to_string(),
    }))
}
