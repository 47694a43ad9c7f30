//! CSV export handlers

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Response, StatusCode},
};
use tracing::info;

use crate::{AppError, AppState};

fn csv_response(filename: &str, csv: String) -> Result<Response<Body>, AppError> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/csv; charset=utf-8")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .body(Body::from(csv))
        .map_err(|e| AppError::internal(&e.to_string()))
}

/// GET /api/export/receipts - Export receipts to CSV
pub async fn export_receipts(
    State(state): State<Arc<AppState>>,
) -> Result<Response<Body>, AppError> {
    let csv = state.db.export_receipts_csv()?;
    let lines = csv.lines().count().saturating_sub(1);
    info!("Exported {} receipts to CSV", lines);
    csv_response("receipts.csv", csv)
}

/// GET /api/export/items - Export line items to CSV
pub async fn export_items(State(state): State<Arc<AppState>>) -> Result<Response<Body>, AppError> {
    let csv = state.db.export_items_csv()?;
    let lines = csv.lines().count().saturating_sub(1);
    info!("Exported {} items to CSV", lines);
    csv_response("items.csv", csv)
}
