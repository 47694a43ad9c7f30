//! CSV upload, preview and import handlers

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::forms::{form_error, read_file, read_number, read_text, UploadedFile};
use crate::{AppError, AppState};
use tally_core::import::{
    execute_plan, plan_import, preview, CsvDocument, ImportKind, ImportPreview, ImportRequest,
    ImportSummary,
};
use tally_core::storage::StoredFile;

/// Error message when a multipart form carries no file
const NO_FILE: &str = "No file uploaded";

/// POST /api/upload-csv - Store a CSV for later attachment to a receipt
pub async fn upload_csv(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<StoredFile>, AppError> {
    let mut file: Option<UploadedFile> = None;

    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        if field.name().unwrap_or("") == "file" {
            file = Some(read_file(field).await?);
        }
    }

    let file = file
        .filter(|f| !f.bytes.is_empty())
        .ok_or_else(|| AppError::bad_request(NO_FILE))?;

    let stored = state
        .uploads
        .store(&file.file_name, &file.content_type, &file.bytes)?;
    info!(file = %stored.file_path, "Stored CSV upload");

    Ok(Json(stored))
}

/// POST /api/import/preview - Headers, suggested mapping and sample rows
///
/// Expects multipart form with:
/// - file (required)
/// - header_row (optional, 1-based, default 1)
/// - kind (optional, "items" or "receipts", default items)
pub async fn preview_import(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ImportPreview>, AppError> {
    let mut text: Option<String> = None;
    let mut header_row: usize = 1;
    let mut kind = ImportKind::default();

    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => text = Some(read_file(field).await?.text()),
            "header_row" => {
                if let Some(row) = read_number(field, "header_row").await? {
                    header_row = row;
                }
            }
            "kind" => {
                if let Some(value) = read_text(field, "kind").await? {
                    kind = value.parse().map_err(|e: String| AppError::bad_request(&e))?;
                }
            }
            _ => {}
        }
    }

    let text = text.ok_or_else(|| AppError::bad_request(NO_FILE))?;
    let preview = preview(&text, header_row, kind, &state.config.aliases)?;
    Ok(Json(preview))
}

/// Response for a completed import
#[derive(Debug, Serialize)]
pub struct ImportResponse {
    #[serde(flatten)]
    pub summary: ImportSummary,
    pub message: String,
    /// Stored copy of the source file, when it is referenced by a receipt
    pub file: Option<StoredFile>,
}

/// POST /api/import - Import a CSV file
///
/// Expects multipart form with:
/// - file (required)
/// - options (JSON ImportRequest: kind, header_row, mapping, ...)
///
/// The mapping is validated before anything is stored or written. Rows
/// that fail individually are reported in the summary.
pub async fn run_import(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ImportResponse>, AppError> {
    let mut file: Option<UploadedFile> = None;
    let mut options: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => file = Some(read_file(field).await?),
            "options" => options = read_text(field, "options").await?,
            _ => {}
        }
    }

    let file = file.ok_or_else(|| AppError::bad_request(NO_FILE))?;
    let request: ImportRequest = match options {
        Some(json) => serde_json::from_str(&json)
            .map_err(|e| AppError::bad_request(&format!("Invalid import options: {}", e)))?,
        None => return Err(AppError::bad_request("Import options are required")),
    };

    let document = CsvDocument::parse(&file.text());
    let parsed = document.with_header_row(request.header_row)?;
    let plan = plan_import(&parsed, &request, Utc::now().date_naive())?;

    // The source file is kept with the receipts, but an import still
    // runs if it cannot be stored
    let stored = match state
        .uploads
        .store(&file.file_name, &file.content_type, &file.bytes)
    {
        Ok(stored) => Some(stored),
        Err(e) => {
            warn!(error = %e, "Could not store import source file");
            None
        }
    };

    let summary = execute_plan(&state.db, &plan, stored.as_ref());
    let message = summary.message(request.kind);
    info!(
        kind = %request.kind,
        imported = summary.imported,
        failed = summary.failed,
        receipts = summary.receipts_created,
        "{}",
        message
    );

    // Nothing was created to hold the file
    let file = match stored {
        Some(stored) if summary.receipts_created == 0 => {
            state.release_file(&stored.file_path);
            None
        }
        other => other,
    };

    Ok(Json(ImportResponse {
        summary,
        message,
        file,
    }))
}
