//! Axum route handlers for review sessions.

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::documents::handlers::{lines_from_upload, CV_FIELD};
use crate::documents::upload::{read_upload, UploadForm};
use crate::errors::AppError;
use crate::models::optimization::PromptSource;
use crate::optimize::optimizer::split_lines;
use crate::optimize::review::EditStatus;
use crate::state::AppState;

use super::{RequestTicket, ReviewSession, SessionView};

const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFromTextRequest {
    pub cv_text: String,
    pub job_description: String,
    #[serde(default)]
    pub structured_data: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleResponse {
    pub index: usize,
    pub status: EditStatus,
    pub session: SessionView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptResponse {
    pub prompt: String,
    pub prompt_source: PromptSource,
}

#[derive(Debug, Deserialize)]
pub struct ManualResponseRequest {
    pub response: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Session {id} not found"))
}

async fn load_session(state: &AppState, id: Uuid) -> Result<ReviewSession, AppError> {
    state.sessions.load(id).await?.ok_or_else(|| not_found(id))
}

/// Applies `change` to the latest stored session with no other write in
/// between. `change` reports whether it modified the session, plus a value
/// handed back to the caller.
async fn update_session<R: Send>(
    state: &AppState,
    id: Uuid,
    mut change: impl FnMut(&mut ReviewSession) -> (bool, R) + Send,
) -> Result<(ReviewSession, R), AppError> {
    let mut outcome = None;
    let session = state
        .sessions
        .update(id, &mut |session| {
            let (changed, value) = change(session);
            outcome = Some(value);
            changed
        })
        .await?
        .ok_or_else(|| not_found(id))?;
    let outcome = outcome
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("update of session {id} did not run")))?;
    Ok((session, outcome))
}

async fn issue_ticket(state: &AppState, id: Uuid) -> Result<RequestTicket, AppError> {
    let seq = state.sessions.next_ticket(id).await?;
    Ok(RequestTicket { session_id: id, seq })
}

fn require_job_description(job_description: &str) -> Result<(), AppError> {
    if job_description.trim().is_empty() {
        return Err(AppError::Validation("jobDescription cannot be empty".to_string()));
    }
    Ok(())
}

fn parse_structured_data(raw: Option<&str>) -> Result<Option<Value>, AppError> {
    raw.map(|s| {
        serde_json::from_str(s)
            .map_err(|e| AppError::Validation(format!("structuredData is not valid JSON: {e}")))
    })
    .transpose()
}

/// Optimizes a fresh document and stores the new session.
async fn start_session(
    state: &AppState,
    cv_lines: Vec<String>,
    job_description: String,
    structured_data: Option<Value>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    if cv_lines.is_empty() {
        return Err(AppError::Validation("CV text cannot be empty".to_string()));
    }
    require_job_description(&job_description)?;

    let result = state
        .optimizer
        .optimize(&cv_lines, &job_description, structured_data.as_ref())
        .await?;

    let session = ReviewSession::new(cv_lines, job_description, structured_data, result);
    state.sessions.save(&session).await?;
    info!(
        "Created review session {} ({} edits)",
        session.id,
        session.result.suggested_edits.len()
    );

    Ok((StatusCode::CREATED, Json(session.view(false))))
}

/// Reads the original .docx from a multipart body.
async fn original_docx(state: &AppState, multipart: Multipart) -> Result<Vec<u8>, AppError> {
    let form: UploadForm = read_upload(multipart, CV_FIELD, state.config.max_upload_bytes).await?;
    let file = form
        .file
        .ok_or_else(|| AppError::Validation("Original .docx file is required".to_string()))?;
    if !file.filename.to_ascii_lowercase().ends_with(".docx") {
        return Err(AppError::Validation("Only .docx files can be regenerated".to_string()));
    }
    Ok(file.bytes.to_vec())
}

/// The .docx only holds the original text, so it gets every edit accepted
/// across all rounds, restated against that text.
async fn generate_docx(state: &AppState, session: &ReviewSession, original: &[u8]) -> Result<Vec<u8>, AppError> {
    let edits = session.document_edits();
    let patched_text = session.patched_text();
    let docx = state
        .documents
        .process(original, &edits, &session.job_description, &patched_text)
        .await?;
    Ok(docx)
}

fn attachment(content_type: &'static str, filename: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/sessions
///
/// Multipart: `cv` file or `cvText`, `jobDescription`, optional `structuredData` (JSON).
pub async fn handle_create_session(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let max_bytes = state.config.max_upload_bytes;
    let mut form = read_upload(multipart, CV_FIELD, max_bytes).await?;

    let structured_data = parse_structured_data(form.field("structuredData"))?;
    let job_description = form.field("jobDescription").unwrap_or_default().to_string();

    let cv_lines = match form.file.take() {
        Some(file) => lines_from_upload(file, max_bytes).await?,
        None => split_lines(form.field("cvText").unwrap_or_default()),
    };

    start_session(&state, cv_lines, job_description, structured_data).await
}

/// POST /api/v1/sessions/from-text
pub async fn handle_create_session_from_text(
    State(state): State<AppState>,
    Json(request): Json<CreateFromTextRequest>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    start_session(
        &state,
        split_lines(&request.cv_text),
        request.job_description,
        request.structured_data,
    )
    .await
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let session = load_session(&state, id).await?;
    Ok(Json(session.view(false)))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.sessions.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}

/// POST /api/v1/sessions/:id/edits/:index/toggle
pub async fn handle_toggle_edit(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Json<ToggleResponse>, AppError> {
    let (session, toggled) = update_session(&state, id, |session| match session.toggle(index) {
        Ok(status) => (true, Ok(status)),
        Err(e) => (false, Err(e)),
    })
    .await?;
    let status = toggled?;

    Ok(Json(ToggleResponse {
        index,
        status,
        session: session.view(false),
    }))
}

/// POST /api/v1/sessions/:id/edits/accept-all
pub async fn handle_accept_all(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let (session, ()) = update_session(&state, id, |session| {
        session.accept_all();
        (true, ())
    })
    .await?;
    Ok(Json(session.view(false)))
}

/// POST /api/v1/sessions/:id/edits/reject-all
pub async fn handle_reject_all(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let (session, ()) = update_session(&state, id, |session| {
        session.reject_all();
        (true, ())
    })
    .await?;
    Ok(Json(session.view(false)))
}

/// POST /api/v1/sessions/:id/recalculate
///
/// Patches the working document with the accepted edits and scores it once.
/// If a newer optimize/recalculate/manual call committed first, this result
/// is dropped and the current state comes back with `superseded: true`.
pub async fn handle_recalculate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let snapshot = load_session(&state, id).await?;
    let ticket = issue_ticket(&state, id).await?;

    let rescore = state
        .optimizer
        .recalculate(
            &snapshot.result,
            &snapshot.cv_lines,
            snapshot.review.accepted(),
            &snapshot.job_description,
        )
        .await?;

    let (session, committed) = update_session(&state, id, |session| {
        let committed = session.commit_rescore(ticket, rescore.clone());
        (committed, committed)
    })
    .await?;
    if !committed {
        warn!("Discarding superseded recalculation for session {id} (ticket {})", ticket.seq);
    }
    Ok(Json(session.view(!committed)))
}

/// GET /api/v1/sessions/:id/prompt
///
/// The filled prompt for running the optimization by hand in any model.
pub async fn handle_get_prompt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PromptResponse>, AppError> {
    let session = load_session(&state, id).await?;
    let prompt = state
        .optimizer
        .manual_prompt(&session.cv_lines, &session.job_description)
        .await;
    Ok(Json(PromptResponse {
        prompt: prompt.text,
        prompt_source: prompt.source,
    }))
}

/// POST /api/v1/sessions/:id/manual
pub async fn handle_manual_response(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ManualResponseRequest>,
) -> Result<Json<SessionView>, AppError> {
    if request.response.trim().is_empty() {
        return Err(AppError::Validation("response cannot be empty".to_string()));
    }
    load_session(&state, id).await?;
    let ticket = issue_ticket(&state, id).await?;

    let result = state.optimizer.apply_manual_response(&request.response);

    let (session, committed) = update_session(&state, id, |session| {
        let committed = session.commit_result(ticket, result.clone());
        (committed, committed)
    })
    .await?;
    Ok(Json(session.view(!committed)))
}

/// POST /api/v1/sessions/:id/document
///
/// Multipart with the original `cv` .docx. Returns the regenerated .docx.
pub async fn handle_generate_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let session = load_session(&state, id).await?;
    let original = original_docx(&state, multipart).await?;
    let docx = generate_docx(&state, &session, &original).await?;
    Ok(attachment(DOCX_CONTENT_TYPE, "optimized-cv.docx", docx))
}

/// POST /api/v1/sessions/:id/pdf
///
/// Same as `/document`, then exported to PDF by the document service.
pub async fn handle_export_pdf(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let session = load_session(&state, id).await?;
    let original = original_docx(&state, multipart).await?;
    let docx = generate_docx(&state, &session, &original).await?;
    let pdf = state.documents.export_pdf(&docx).await?;
    Ok(attachment("application/pdf", "optimized-cv.pdf", pdf))
}
