//! Axum route handlers for the stateless optimize API.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppError;
use crate::models::analysis::JobAnalysis;
use crate::models::optimization::{OptimizationResult, PromptSource};
use crate::state::AppState;

use super::optimizer::split_lines;
use super::prompt_builder::CoverLetterOptions;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionsRequest {
    pub cv_text: String,
    pub job_description: String,
    #[serde(default)]
    pub structured_data: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeJdRequest {
    pub job_description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverLetterRequest {
    pub cv_text: String,
    pub job_description: String,
    #[serde(default)]
    pub options: CoverLetterOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverLetterResponse {
    pub cover_letter: String,
    pub prompt_source: PromptSource,
}

fn require_text(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/optimize/suggestions
///
/// One-shot optimization of pasted CV text. Nothing is stored.
pub async fn handle_suggestions(
    State(state): State<AppState>,
    Json(request): Json<SuggestionsRequest>,
) -> Result<Json<OptimizationResult>, AppError> {
    require_text(&request.cv_text, "cvText")?;
    require_text(&request.job_description, "jobDescription")?;

    let result = state
        .optimizer
        .suggest(
            &request.cv_text,
            &request.job_description,
            request.structured_data.as_ref(),
        )
        .await?;

    Ok(Json(result))
}

/// GET /api/v1/optimize/prompt-template
///
/// The unfilled optimization template as plain text; `X-Prompt-Source` says
/// whether it is the configured file or the built-in one.
pub async fn handle_prompt_template(State(state): State<AppState>) -> Response {
    let (template, source) = state.optimizer.prompts().template_text().await;
    let source = match source {
        PromptSource::Template => "template",
        PromptSource::Fallback => "fallback",
        PromptSource::Manual => "manual",
    };
    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::HeaderName::from_static("x-prompt-source"), source),
        ],
        template,
    )
        .into_response()
}

/// POST /api/v1/optimize/analyze-jd
pub async fn handle_analyze_jd(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeJdRequest>,
) -> Result<Json<JobAnalysis>, AppError> {
    require_text(&request.job_description, "jobDescription")?;
    let analysis = state.optimizer.analyze_job(&request.job_description).await?;
    Ok(Json(analysis))
}

/// POST /api/v1/optimize/cover-letter
pub async fn handle_cover_letter(
    State(state): State<AppState>,
    Json(request): Json<CoverLetterRequest>,
) -> Result<Json<CoverLetterResponse>, AppError> {
    require_text(&request.cv_text, "cvText")?;
    require_text(&request.job_description, "jobDescription")?;

    let (cover_letter, prompt_source) = state
        .optimizer
        .cover_letter(
            &split_lines(&request.cv_text),
            &request.job_description,
            &request.options,
        )
        .await?;

    Ok(Json(CoverLetterResponse {
        cover_letter,
        prompt_source,
    }))
}
