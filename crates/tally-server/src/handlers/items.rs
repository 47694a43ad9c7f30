//! Line item, all-items view and price history handlers

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, Response, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{AppError, AppState};
use tally_core::chart::{price_chart_svg, DEFAULT_HEIGHT, DEFAULT_WIDTH};
use tally_core::history::PriceHistory;
use tally_core::models::{ItemWithContext, LineItem, NewLineItem};
use tally_core::view::ItemView;

/// POST /api/receipts/:id/items - Add a line item to a receipt
pub async fn add_item(
    State(state): State<Arc<AppState>>,
    Path(receipt_id): Path<i64>,
    Json(item): Json<NewLineItem>,
) -> Result<(StatusCode, Json<LineItem>), AppError> {
    let item = state.db.add_line_item(receipt_id, &item)?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// PUT /api/items/:id - Update a line item
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(item): Json<NewLineItem>,
) -> Result<Json<LineItem>, AppError> {
    let item = state
        .db
        .update_line_item(id, &item)?
        .ok_or_else(|| AppError::not_found("Item not found"))?;
    Ok(Json(item))
}

/// Response for item deletion
#[derive(Debug, Serialize)]
pub struct DeleteItemResponse {
    pub message: String,
    pub item: LineItem,
}

/// DELETE /api/items/:id - Delete a line item
pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteItemResponse>, AppError> {
    let item = state
        .db
        .delete_line_item(id)?
        .ok_or_else(|| AppError::not_found("Item not found"))?;
    Ok(Json(DeleteItemResponse {
        message: "Item deleted".to_string(),
        item,
    }))
}

/// GET /api/items - All items with receipt context (?search=&sort=&dir=)
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    Query(view): Query<ItemView>,
) -> Result<Json<Vec<ItemWithContext>>, AppError> {
    let items = state.db.list_items()?;
    Ok(Json(view.apply(&items)))
}

/// Query parameters for price history
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub name: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

fn load_history(state: &AppState, params: &HistoryQuery) -> Result<PriceHistory, AppError> {
    let name = params
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::bad_request("Missing 'name' parameter"))?;

    let items = state.db.list_items()?;
    PriceHistory::for_item(&items, name)
        .ok_or_else(|| AppError::not_found(&format!("No purchases found for '{}'", name)))
}

/// GET /api/items/history?name= - Unit price history for one item
pub async fn item_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<PriceHistory>, AppError> {
    Ok(Json(load_history(&state, &params)?))
}

/// GET /api/items/history/chart?name=&width=&height= - Price history as SVG
pub async fn item_history_chart(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryQuery>,
) -> Result<Response<Body>, AppError> {
    let history = load_history(&state, &params)?;
    let width = params.width.unwrap_or(DEFAULT_WIDTH).clamp(200, 2000);
    let height = params.height.unwrap_or(DEFAULT_HEIGHT).clamp(120, 1200);

    let svg = price_chart_svg(&history, width, height);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/svg+xml")
        .body(Body::from(svg))
        .map_err(|e| AppError::internal(&e.to_string()))
}
