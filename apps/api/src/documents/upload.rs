use std::collections::HashMap;

use axum::extract::Multipart;
use bytes::Bytes;

use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Bytes,
}

/// A multipart form split into its (single) file part and its text fields.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<UploadedFile>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}

/// Reads every part. The part named `file_field` is kept as bytes, everything else as text.
pub async fn read_upload(
    mut multipart: Multipart,
    file_field: &str,
    max_bytes: usize,
) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == file_field {
            let filename = field.file_name().unwrap_or("upload.txt").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Invalid file upload: {e}")))?;
            if bytes.len() > max_bytes {
                return Err(AppError::PayloadTooLarge(format!(
                    "{filename} is {} bytes, the limit is {max_bytes} bytes",
                    bytes.len()
                )));
            }
            form.file = Some(UploadedFile { filename, bytes });
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::Validation(format!("Invalid form field '{name}': {e}")))?;
            form.fields.insert(name, text);
        }
    }

    Ok(form)
}
