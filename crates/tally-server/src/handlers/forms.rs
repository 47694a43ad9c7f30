//! Multipart form helpers

use axum::extract::multipart::{Field, MultipartError};

use crate::{AppError, MAX_UPLOAD_SIZE};

/// A file part read into memory
#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// File contents as text, replacing invalid UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

pub fn form_error(e: MultipartError) -> AppError {
    AppError::bad_request(&format!("Failed to read form field: {}", e))
}

/// Read a file part, enforcing the upload size limit
pub async fn read_file(field: Field<'_>) -> Result<UploadedFile, AppError> {
    let file_name = field.file_name().unwrap_or("upload").to_string();
    let content_type = field.content_type().unwrap_or("").to_string();

    let bytes = field
        .bytes()
        .await
        .map_err(|_| AppError::bad_request("Failed to read file data"))?;

    // Check file size limit
    if bytes.len() > MAX_UPLOAD_SIZE {
        return Err(AppError::bad_request(&format!(
            "File too large. Maximum size is {} MB",
            MAX_UPLOAD_SIZE / 1024 / 1024
        )));
    }

    Ok(UploadedFile {
        file_name,
        content_type,
        bytes: bytes.to_vec(),
    })
}

/// Read a text part. Blank values come back as None.
pub async fn read_text(field: Field<'_>, name: &str) -> Result<Option<String>, AppError> {
    let value = field
        .text()
        .await
        .map_err(|_| AppError::bad_request(&format!("Failed to read {}", name)))?;
    let value = value.trim();
    Ok((!value.is_empty()).then(|| value.to_string()))
}

/// Read a numeric text part
pub async fn read_number<T: std::str::FromStr>(
    field: Field<'_>,
    name: &str,
) -> Result<Option<T>, AppError> {
    match read_text(field, name).await? {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| AppError::bad_request(&format!("Invalid {}: {}", name, value))),
    }
}
