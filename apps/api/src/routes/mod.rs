pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::documents::handlers as documents;
use crate::gateway::handlers as settings;
use crate::optimize::handlers as optimize;
use crate::session::handlers as sessions;
use crate::state::AppState;

/// Headroom over the file limit for the other multipart fields.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes + FORM_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health::health_handler))
        // Stateless optimize API
        .route("/api/v1/optimize/suggestions", post(optimize::handle_suggestions))
        .route(
            "/api/v1/optimize/prompt-template",
            get(optimize::handle_prompt_template),
        )
        .route("/api/v1/optimize/analyze-jd", post(optimize::handle_analyze_jd))
        .route("/api/v1/optimize/cover-letter", post(optimize::handle_cover_letter))
        .route(
            "/api/v1/optimize/extract-lines",
            post(documents::handle_extract_lines),
        )
        // Review sessions
        .route("/api/v1/sessions", post(sessions::handle_create_session))
        .route(
            "/api/v1/sessions/from-text",
            post(sessions::handle_create_session_from_text),
        )
        .route(
            "/api/v1/sessions/:id",
            get(sessions::handle_get_session).delete(sessions::handle_delete_session),
        )
        .route(
            "/api/v1/sessions/:id/edits/:index/toggle",
            post(sessions::handle_toggle_edit),
        )
        .route(
            "/api/v1/sessions/:id/edits/accept-all",
            post(sessions::handle_accept_all),
        )
        .route(
            "/api/v1/sessions/:id/edits/reject-all",
            post(sessions::handle_reject_all),
        )
        .route(
            "/api/v1/sessions/:id/recalculate",
            post(sessions::handle_recalculate),
        )
        .route("/api/v1/sessions/:id/prompt", get(sessions::handle_get_prompt))
        .route(
            "/api/v1/sessions/:id/manual",
            post(sessions::handle_manual_response),
        )
        .route(
            "/api/v1/sessions/:id/document",
            post(sessions::handle_generate_document),
        )
        .route("/api/v1/sessions/:id/pdf", post(sessions::handle_export_pdf))
        // Provider routing settings
        .route(
            "/api/v1/settings/model-settings",
            get(settings::handle_get_model_settings).put(settings::handle_put_model_settings),
        )
        .route("/api/v1/settings/test-model", post(settings::handle_test_model))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::documents::service_client::DocumentServiceClient;
    use crate::gateway::settings::ProviderSettings;
    use crate::gateway::testing::ScriptedProvider;
    use crate::gateway::{ModelGateway, ProviderFailure, ProviderId};
    use crate::optimize::optimizer::Optimizer;
    use crate::optimize::prompt_builder::PromptBuilder;
    use crate::session::store::{InMemorySessionStore, SessionStore};

    const OPTIMIZE_REPLY: &str = r#"```json
{"model": "scripted", "matchScore": 62, "keywords": ["React"], "suggestedEdits": [
  {"section": "Experience", "originalBullet": "Built web apps.", "improvedBullet": "Built 3 production web apps using React and Node.", "reason": "stack"},
  {"section": "Experience", "originalBullet": "Led a team of 5.", "improvedBullet": "Led a team of 5 engineers shipping weekly releases.", "reason": "cadence"}
]}
```"#;

    fn test_config(settings_path: PathBuf) -> Config {
        Config {
            port: 0,
            rust_log: "info".to_string(),
            gemini_api_key: None,
            openrouter_api_key: None,
            anthropic_api_key: None,
            local_llm_url: "http://localhost:11434".to_string(),
            local_llm_model: None,
            doc_service_url: "http://localhost:8080".to_string(),
            redis_url: None,
            prompt_template_dir: PathBuf::from("does-not-exist"),
            model_settings_path: settings_path,
            max_upload_bytes: 64 * 1024,
            session_ttl_secs: 60,
        }
    }

    fn app_with(
        replies: Vec<Result<String, ProviderFailure>>,
        settings_path: PathBuf,
    ) -> (Router, Arc<ScriptedProvider>) {
        let (router, provider, _) = build_test_app(replies, settings_path);
        (router, provider)
    }

    fn build_test_app(
        replies: Vec<Result<String, ProviderFailure>>,
        settings_path: PathBuf,
    ) -> (Router, Arc<ScriptedProvider>, Arc<InMemorySessionStore>) {
        let provider = Arc::new(ScriptedProvider::new(ProviderId::Gemini, replies));
        let gateway = Arc::new(ModelGateway::new(
            vec![provider.clone()],
            ProviderSettings::default(),
        ));
        let config = test_config(settings_path);
        let sessions = Arc::new(InMemorySessionStore::new());
        let state = AppState {
            optimizer: Arc::new(Optimizer::new(
                gateway.clone(),
                PromptBuilder::new(Some(config.prompt_template_dir.clone())),
            )),
            gateway,
            sessions: sessions.clone(),
            documents: DocumentServiceClient::new(&config.doc_service_url),
            config,
        };
        (build_router(state), provider, sessions)
    }

    fn app(replies: Vec<Result<String, ProviderFailure>>) -> Router {
        app_with(replies, std::env::temp_dir().join("tailor-unused-settings.json")).0
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn create_body() -> Value {
        json!({
            "cvText": "Built web apps.\n\nLed a team of 5.",
            "jobDescription": "React developer leading small teams"
        })
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(&app(vec![]), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_review_flow_toggle_and_recalculate() {
        let app = app(vec![
            Ok(OPTIMIZE_REPLY.to_string()),
            Ok(r#"{"matchScore": 79, "suggestedEdits": []}"#.to_string()),
        ]);

        let (status, created) =
            call(&app, Method::POST, "/api/v1/sessions/from-text", Some(create_body())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["acceptedCount"], 2);
        assert_eq!(created["result"]["promptSource"], "fallback");
        let id = created["id"].as_str().unwrap().to_string();

        let (status, toggled) = call(
            &app,
            Method::POST,
            &format!("/api/v1/sessions/{id}/edits/1/toggle"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(toggled["status"], "rejected");
        assert_eq!(
            toggled["session"]["patchedText"],
            "Built 3 production web apps using React and Node.\nLed a team of 5."
        );

        let (status, rescored) = call(
            &app,
            Method::POST,
            &format!("/api/v1/sessions/{id}/recalculate"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rescored["superseded"], false);
        assert_eq!(rescored["result"]["matchScore"], 79);
        assert_eq!(rescored["result"]["previousMatchScore"], 62);
        assert_eq!(rescored["scoreHistory"], json!([62, 79]));
        assert_eq!(
            rescored["cvLines"],
            json!(["Built 3 production web apps using React and Node.", "Led a team of 5."])
        );
    }

    #[tokio::test]
    async fn test_document_edits_survive_recalculation() {
        let second_round = r#"{"matchScore": 80, "suggestedEdits": [
          {"originalBullet": "Built 3 production web apps using React and Node.",
           "improvedBullet": "Built 3 production web apps using React, Node and Postgres.",
           "reason": "database"},
          {"originalBullet": "Led a team of 5.",
           "improvedBullet": "Led a team of 5 engineers through 12 releases.",
           "reason": "impact"}
        ]}"#;
        let (app, _, store) = build_test_app(
            vec![Ok(OPTIMIZE_REPLY.to_string()), Ok(second_round.to_string())],
            std::env::temp_dir().join("tailor-unused-settings.json"),
        );

        let (_, created) =
            call(&app, Method::POST, "/api/v1/sessions/from-text", Some(create_body())).await;
        let id = created["id"].as_str().unwrap().to_string();
        call(
            &app,
            Method::POST,
            &format!("/api/v1/sessions/{id}/edits/1/toggle"),
            None,
        )
        .await;
        call(
            &app,
            Method::POST,
            &format!("/api/v1/sessions/{id}/recalculate"),
            None,
        )
        .await;
        let (status, _) = call(
            &app,
            Method::POST,
            &format!("/api/v1/sessions/{id}/edits/1/toggle"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let session = store
            .load(id.parse().unwrap())
            .await
            .unwrap()
            .unwrap();
        let edits: Vec<(String, String)> = session
            .document_edits()
            .into_iter()
            .map(|e| (e.original_text, e.improved_text))
            .collect();
        assert_eq!(
            edits,
            vec![(
                "Built web apps.".to_string(),
                "Built 3 production web apps using React, Node and Postgres.".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_toggle_out_of_range_is_bad_request() {
        let app = app(vec![Ok(OPTIMIZE_REPLY.to_string())]);
        let (_, created) =
            call(&app, Method::POST, "/api/v1/sessions/from-text", Some(create_body())).await;
        let id = created["id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/v1/sessions/{id}/edits/9/toggle"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_manual_response_replaces_result() {
        let app = app(vec![Ok(OPTIMIZE_REPLY.to_string())]);
        let (_, created) =
            call(&app, Method::POST, "/api/v1/sessions/from-text", Some(create_body())).await;
        let id = created["id"].as_str().unwrap().to_string();

        let (status, prompt) =
            call(&app, Method::GET, &format!("/api/v1/sessions/{id}/prompt"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(prompt["prompt"].as_str().unwrap().contains("Led a team of 5."));

        let (status, view) = call(
            &app,
            Method::POST,
            &format!("/api/v1/sessions/{id}/manual"),
            Some(json!({ "response": "{\"matchScore\": 88, \"suggestedEdits\": []}" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["result"]["promptSource"], "manual");
        assert_eq!(view["result"]["matchScore"], 88);
        assert_eq!(view["acceptedCount"], 0);
    }

    #[tokio::test]
    async fn test_unknown_session_and_delete() {
        let app = app(vec![Ok(OPTIMIZE_REPLY.to_string())]);
        let missing = uuid::Uuid::new_v4();
        let (status, _) =
            call(&app, Method::GET, &format!("/api/v1/sessions/{missing}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, created) =
            call(&app, Method::POST, "/api/v1/sessions/from-text", Some(create_body())).await;
        let id = created["id"].as_str().unwrap().to_string();
        let (status, _) =
            call(&app, Method::DELETE, &format!("/api/v1/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_provider_rate_limit_surfaces_as_429() {
        let app = app(vec![Err(ProviderFailure::from_status(
            ProviderId::Gemini,
            429,
            r#"{"error": {"message": "quota"}}"#,
        ))]);
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/optimize/suggestions",
            Some(create_body()),
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["code"], "RATE_LIMITED");
    }

    #[tokio::test]
    async fn test_suggestions_validation() {
        let (status, _) = call(
            &app(vec![]),
            Method::POST,
            "/api/v1/optimize/suggestions",
            Some(json!({ "cvText": "x", "jobDescription": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_model_settings_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model-settings.json");
        let (app, _) = app_with(vec![], path.clone());

        let (status, current) =
            call(&app, Method::GET, "/api/v1/settings/model-settings", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(current["generateCV"]["provider"], "gemini");

        let mut updated = current.clone();
        updated["generateCV"]["provider"] = json!("local");
        let (status, _) = call(
            &app,
            Method::PUT,
            "/api/v1/settings/model-settings",
            Some(updated),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(path.exists());

        let (_, after) = call(&app, Method::GET, "/api/v1/settings/model-settings", None).await;
        assert_eq!(after["generateCV"]["provider"], "local");
    }

    #[tokio::test]
    async fn test_prompt_template_falls_back_to_builtin() {
        let app = app(vec![]);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/optimize/prompt-template")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-prompt-source"], "fallback");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("{cvText}"));
    }
}
