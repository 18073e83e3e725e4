//! Axum route handlers for document upload and line extraction.

use anyhow::anyhow;
use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;
use crate::state::AppState;

use super::extractor::extract_lines;
use super::upload::{read_upload, UploadedFile};

/// Multipart part that carries the CV file.
pub const CV_FIELD: &str = "cv";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractLinesResponse {
    pub cv_lines: Vec<String>,
    pub cv_text: String,
}

/// Runs the extractor on a blocking thread (PDF parsing is CPU-bound).
pub async fn lines_from_upload(file: UploadedFile, max_bytes: usize) -> Result<Vec<String>, AppError> {
    let lines = tokio::task::spawn_blocking(move || {
        extract_lines(&file.filename, &file.bytes, max_bytes)
    })
    .await
    .map_err(|e| AppError::Internal(anyhow!("line extraction task failed: {e}")))??;
    Ok(lines)
}

/// POST /api/v1/optimize/extract-lines
///
/// Multipart with a `cv` file. Returns the document's non-blank lines in order.
pub async fn handle_extract_lines(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ExtractLinesResponse>, AppError> {
    let max_bytes = state.config.max_upload_bytes;
    let form = read_upload(multipart, CV_FIELD, max_bytes).await?;
    let file = form
        .file
        .ok_or_else(|| AppError::Validation("CV file is required".to_string()))?;

    let cv_lines = lines_from_upload(file, max_bytes).await?;
    let cv_text = cv_lines.join("\n");

    Ok(Json(ExtractLinesResponse { cv_lines, cv_text }))
}
