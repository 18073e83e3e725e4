use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::documents::extractor::ExtractError;
use crate::documents::service_client::DocumentServiceError;
use crate::gateway::settings::SettingsError;
use crate::gateway::{FailureCause, ProviderFailure};
use crate::optimize::review::ReviewError;
use crate::session::store::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error(transparent)]
    Provider(#[from] ProviderFailure),

    #[error("Document service error: {0}")]
    DocumentService(String),

    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ReviewError> for AppError {
    fn from(e: ReviewError) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl From<DocumentServiceError> for AppError {
    fn from(e: DocumentServiceError) -> Self {
        AppError::DocumentService(e.to_string())
    }
}

impl From<ExtractError> for AppError {
    fn from(e: ExtractError) -> Self {
        match e {
            ExtractError::TooLarge { .. } => AppError::PayloadTooLarge(e.to_string()),
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg.clone())
            }
            AppError::Provider(failure) => {
                tracing::error!("Provider error: {failure}");
                let (status, code) = match failure.cause {
                    FailureCause::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
                    FailureCause::Unauthorized => (StatusCode::BAD_GATEWAY, "PROVIDER_UNAUTHORIZED"),
                    FailureCause::ServiceOverloaded => {
                        (StatusCode::SERVICE_UNAVAILABLE, "PROVIDER_OVERLOADED")
                    }
                    FailureCause::BadRequest => (StatusCode::BAD_GATEWAY, "PROVIDER_BAD_REQUEST"),
                    FailureCause::Unknown => (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR"),
                };
                let message = format!(
                    "{} ({}: {})",
                    failure.cause.user_message(),
                    failure.provider,
                    failure.message
                );
                (status, code, message)
            }
            AppError::DocumentService(msg) => {
                tracing::error!("Document service error: {msg}");
                (StatusCode::BAD_GATEWAY, "DOCUMENT_SERVICE_ERROR", msg.clone())
            }
            AppError::Store(StoreError::Conflict(_)) => (
                StatusCode::CONFLICT,
                "SESSION_CONFLICT",
                "The session is being changed by another request; try again".to_string(),
            ),
            AppError::Store(e) => {
                tracing::error!("Session store error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SESSION_STORE_ERROR",
                    "A session storage error occurred".to_string(),
                )
            }
            AppError::Settings(e) => {
                tracing::error!("Settings error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SETTINGS_ERROR",
                    "Model settings could not be saved".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ProviderId;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_provider_causes_map_to_statuses() {
        let failure = |status| AppError::Provider(ProviderFailure::from_status(ProviderId::Gemini, status, ""));
        assert_eq!(status_of(failure(429)), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(status_of(failure(401)), StatusCode::BAD_GATEWAY);
        assert_eq!(status_of(failure(503)), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_of(failure(500)), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_review_error_is_validation() {
        let err: AppError = ReviewError::IndexOutOfRange { index: 3, count: 1 }.into();
        assert_eq!(status_of(err), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_plain_variants() {
        assert_eq!(status_of(AppError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(AppError::DocumentService("down".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(AppError::Store(StoreError::Conflict(uuid::Uuid::nil()))),
            StatusCode::CONFLICT
        );
    }
}
