//! Receipt handlers
//!
//! Receipts are created and updated from multipart forms so a scan, photo,
//! PDF or CSV can travel with the metadata. A CSV that was already uploaded
//! through `/api/upload-csv` is attached by name instead.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use super::forms::{form_error, read_file, read_number, read_text, UploadedFile};
use crate::{AppError, AppState};
use tally_core::import::parse_date;
use tally_core::models::{NewReceipt, Receipt};
use tally_core::storage::StoredFile;
use tally_core::view::ReceiptView;

/// Fields of a receipt form. Everything is optional at this point;
/// create and update apply their own requirements.
#[derive(Debug, Default)]
pub struct ReceiptForm {
    pub job_id: Option<i64>,
    pub job_name: Option<String>,
    pub store_location: Option<String>,
    pub receipt_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub file: Option<UploadedFile>,
    pub imported_file_path: Option<String>,
    pub imported_file_type: Option<String>,
}

impl ReceiptForm {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(form_error)? {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "job_id" => form.job_id = read_number(field, "job_id").await?,
                "job_name" => form.job_name = read_text(field, "job_name").await?,
                "store_location" => form.store_location = read_text(field, "store_location").await?,
                "receipt_date" => {
                    if let Some(value) = read_text(field, "receipt_date").await? {
                        let date = parse_date(&value).ok_or_else(|| {
                            AppError::bad_request(&format!("Invalid receipt_date: {}", value))
                        })?;
                        form.receipt_date = Some(date);
                    }
                }
                "notes" => form.notes = read_text(field, "notes").await?,
                "file" => {
                    let file = read_file(field).await?;
                    // Browsers send an empty part when no file was chosen
                    if !file.bytes.is_empty() {
                        form.file = Some(file);
                    }
                }
                "imported_file_path" => {
                    form.imported_file_path = read_text(field, "imported_file_path").await?
                }
                "imported_file_type" => {
                    form.imported_file_type = read_text(field, "imported_file_type").await?
                }
                _ => {}
            }
        }

        Ok(form)
    }

    /// Job ID from the form, creating the job when only a name was given
    fn resolve_job(&self, state: &AppState) -> Result<Option<i64>, AppError> {
        if let Some(id) = self.job_id {
            return Ok(Some(id));
        }
        match &self.job_name {
            Some(name) => Ok(Some(state.db.get_or_create_job(name)?.id)),
            None => Ok(None),
        }
    }

    /// Store the uploaded file, or reference a previously uploaded CSV
    fn take_file(&mut self, state: &AppState) -> Result<Option<StoredFile>, AppError> {
        if let Some(file) = self.file.take() {
            let stored = state
                .uploads
                .store(&file.file_name, &file.content_type, &file.bytes)?;
            return Ok(Some(stored));
        }

        match self.imported_file_path.take() {
            Some(path) => {
                if !state.uploads.exists(&path) {
                    return Err(AppError::bad_request("Imported file not found"));
                }
                Ok(Some(StoredFile {
                    file_path: path,
                    file_type: self
                        .imported_file_type
                        .take()
                        .unwrap_or_else(|| "text/csv".to_string()),
                }))
            }
            None => Ok(None),
        }
    }
}

/// GET /api/receipts - List receipts with items (?job_id=&search=)
pub async fn list_receipts(
    State(state): State<Arc<AppState>>,
    Query(view): Query<ReceiptView>,
) -> Result<Json<Vec<Receipt>>, AppError> {
    let receipts = match view.job_id {
        Some(job_id) => state.db.list_receipts_for_job(job_id)?,
        None => state.db.list_receipts()?,
    };
    Ok(Json(view.apply(&receipts)))
}

/// GET /api/receipts/:id - Get a specific receipt
pub async fn get_receipt(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Receipt>, AppError> {
    let receipt = state
        .db
        .get_receipt(id)?
        .ok_or_else(|| AppError::not_found("Receipt not found"))?;
    Ok(Json(receipt))
}

/// POST /api/receipts - Create a receipt
///
/// Expects multipart form with:
/// - job_id or job_name (required; a new name creates the job)
/// - receipt_date (required)
/// - store_location, notes (optional)
/// - file (optional, max 10MB) or imported_file_path/imported_file_type
pub async fn create_receipt(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Receipt>), AppError> {
    let mut form = ReceiptForm::read(multipart).await?;

    // Validate required fields before touching storage
    if form.job_id.is_none() && form.job_name.is_none() {
        return Err(AppError::bad_request("Job is required"));
    }
    let receipt_date = form
        .receipt_date
        .ok_or_else(|| AppError::bad_request("Receipt date is required"))?;

    // Store the file first so a rejected upload doesn't leave a new job behind
    let uploaded_new = form.file.is_some();
    let file = form.take_file(&state)?;
    let discard = || {
        if let Some(file) = file.as_ref().filter(|_| uploaded_new) {
            state.release_file(&file.file_path);
        }
    };

    let job_id = match form.resolve_job(&state) {
        Ok(id) => id,
        Err(e) => {
            discard();
            return Err(e);
        }
    };

    let new_receipt = NewReceipt {
        job_id,
        store_location: form.store_location.take(),
        receipt_date,
        notes: form.notes.take(),
        file_path: file.as_ref().map(|f| f.file_path.clone()),
        file_type: file.as_ref().map(|f| f.file_type.clone()),
    };

    match state.db.create_receipt(&new_receipt) {
        Ok(receipt) => {
            info!(receipt_id = receipt.id, "Created receipt");
            Ok((StatusCode::CREATED, Json(receipt)))
        }
        Err(e) => {
            discard();
            Err(e.into())
        }
    }
}

/// PUT /api/receipts/:id - Update a receipt
///
/// Same form as create. Omitted fields keep their current values;
/// the stored file is replaced only when a new one is sent.
pub async fn update_receipt(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Json<Receipt>, AppError> {
    let existing = state
        .db
        .get_receipt(id)?
        .ok_or_else(|| AppError::not_found("Receipt not found"))?;

    let mut form = ReceiptForm::read(multipart).await?;
    let uploaded_new = form.file.is_some();
    let file = form.take_file(&state)?;
    let discard = || {
        if let Some(file) = file.as_ref().filter(|_| uploaded_new) {
            state.release_file(&file.file_path);
        }
    };

    let job_id = match form.resolve_job(&state) {
        Ok(id) => id.or(existing.job_id),
        Err(e) => {
            discard();
            return Err(e);
        }
    };

    let changes = NewReceipt {
        job_id,
        store_location: form.store_location.take().or_else(|| existing.store_location.clone()),
        receipt_date: form.receipt_date.unwrap_or(existing.receipt_date),
        notes: form.notes.take().or_else(|| existing.notes.clone()),
        file_path: file.as_ref().map(|f| f.file_path.clone()),
        file_type: file.as_ref().map(|f| f.file_type.clone()),
    };

    let updated = match state.db.update_receipt(id, &changes) {
        Ok(Some(receipt)) => receipt,
        Ok(None) => {
            discard();
            return Err(AppError::not_found("Receipt not found"));
        }
        Err(e) => {
            discard();
            return Err(e.into());
        }
    };

    // The old file goes once nothing else points at it
    if let (Some(new), Some(old)) = (&file, &existing.file_path) {
        if &new.file_path != old {
            state.release_file(old);
        }
    }

    Ok(Json(updated))
}

/// Response for receipt deletion
#[derive(Debug, Serialize)]
pub struct DeleteReceiptResponse {
    pub message: String,
    pub receipt: Receipt,
}

/// DELETE /api/receipts/:id - Delete a receipt, its items and its file
pub async fn delete_receipt(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteReceiptResponse>, AppError> {
    let receipt = state
        .db
        .delete_receipt(id)?
        .ok_or_else(|| AppError::not_found("Receipt not found"))?;

    if let Some(path) = &receipt.file_path {
        state.release_file(path);
    }

    Ok(Json(DeleteReceiptResponse {
        message: "Receipt deleted".to_string(),
        receipt,
    }))
}
