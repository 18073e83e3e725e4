use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info};

use crate::models::optimization::SuggestedEdit;

const DOCUMENT_SERVICE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum DocumentServiceError {
    #[error("document service is not running at {0}")]
    NotRunning(String),

    #[error("document service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("document service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response from document service: missing '{0}'")]
    MissingField(&'static str),

    #[error("document service returned invalid base64: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// One edit as the document service reads it. The service replaces the
/// paragraph whose whitespace-collapsed text equals `originalBullet` (or
/// `original`) with `improvedBullet` (or `suggested`).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentEdit<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    section: Option<&'a str>,
    original: &'a str,
    suggested: &'a str,
    original_bullet: &'a str,
    improved_bullet: &'a str,
    reason: &'a str,
}

impl<'a> From<&'a SuggestedEdit> for DocumentEdit<'a> {
    fn from(edit: &'a SuggestedEdit) -> Self {
        Self {
            section: edit.section.as_deref(),
            original: &edit.original_text,
            suggested: &edit.improved_text,
            original_bullet: &edit.original_text,
            improved_bullet: &edit.improved_text,
            reason: &edit.reason,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequest<'a> {
    original_file: String,
    accepted_edits: Vec<usize>,
    suggested_edits: Vec<DocumentEdit<'a>>,
    job_description: &'a str,
    /// Patcher output for reference. The service edits paragraphs from
    /// `suggestedEdits` and does not read this field.
    patched_text: &'a str,
}

impl<'a> ProcessRequest<'a> {
    /// Every edit in `edits` is marked accepted.
    fn new(
        original_docx: &[u8],
        edits: &'a [SuggestedEdit],
        job_description: &'a str,
        patched_text: &'a str,
    ) -> Self {
        Self {
            original_file: BASE64.encode(original_docx),
            accepted_edits: (0..edits.len()).collect(),
            suggested_edits: edits.iter().map(DocumentEdit::from).collect(),
            job_description,
            patched_text,
        }
    }
}

/// Client for the external document service that rewrites .docx files and
/// exports them to PDF.
#[derive(Clone)]
pub struct DocumentServiceClient {
    client: Client,
    base_url: String,
}

impl DocumentServiceClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(DOCUMENT_SERVICE_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Sends the original .docx with the edits to apply and returns the rewritten .docx.
    ///
    /// `edits` must be stated against the text of the original document; all
    /// of them are applied.
    pub async fn process(
        &self,
        original_docx: &[u8],
        edits: &[SuggestedEdit],
        job_description: &str,
        patched_text: &str,
    ) -> Result<Vec<u8>, DocumentServiceError> {
        let body = ProcessRequest::new(original_docx, edits, job_description, patched_text);

        info!(
            "Requesting document generation ({} edits, {} bytes)",
            edits.len(),
            original_docx.len()
        );
        let response = self.post("/api/document/process", &body).await?;
        decode_field(&response, "document")
    }

    pub async fn export_pdf(&self, docx: &[u8]) -> Result<Vec<u8>, DocumentServiceError> {
        let body = json!({
            "document": BASE64.encode(docx),
            "format": "pdf",
        });
        let response = self.post("/api/document/export", &body).await?;
        decode_field(&response, "pdf")
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Value, DocumentServiceError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    error!("Document service unreachable at {}", self.base_url);
                    DocumentServiceError::NotRunning(self.base_url.clone())
                } else {
                    DocumentServiceError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DocumentServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

fn decode_field(response: &Value, field: &'static str) -> Result<Vec<u8>, DocumentServiceError> {
    let encoded = response
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(DocumentServiceError::MissingField(field))?;
    Ok(BASE64.decode(encoded)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_request_uses_document_service_edit_keys() {
        let edits = vec![
            SuggestedEdit {
                section: Some("Experience".to_string()),
                original_text: "Built web apps.".to_string(),
                improved_text: "Built 3 production web apps.".to_string(),
                reason: "scale".to_string(),
            },
            SuggestedEdit {
                section: None,
                original_text: "Led a team of 5.".to_string(),
                improved_text: "Led a team of 5 engineers.".to_string(),
                reason: String::new(),
            },
        ];
        let body = ProcessRequest::new(b"docx", &edits, "jd", "Built 3 production web apps.");
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["originalFile"], "ZG9jeA==");
        assert_eq!(json["acceptedEdits"], json!([0, 1]));

        let first = &json["suggestedEdits"][0];
        assert_eq!(first["originalBullet"], "Built web apps.");
        assert_eq!(first["improvedBullet"], "Built 3 production web apps.");
        assert_eq!(first["original"], "Built web apps.");
        assert_eq!(first["suggested"], "Built 3 production web apps.");
        assert_eq!(first["section"], "Experience");
        assert!(first.get("originalText").is_none());
        assert!(json["suggestedEdits"][1].get("section").is_none());
    }

    #[test]
    fn test_decode_field() {
        let ok = json!({ "document": "UEsDBA==" });
        assert_eq!(decode_field(&ok, "document").unwrap(), b"PK\x03\x04");

        assert!(matches!(
            decode_field(&json!({}), "pdf"),
            Err(DocumentServiceError::MissingField("pdf"))
        ));
        assert!(matches!(
            decode_field(&json!({ "pdf": "***" }), "pdf"),
            Err(DocumentServiceError::Decode(_))
        ));
    }
}
