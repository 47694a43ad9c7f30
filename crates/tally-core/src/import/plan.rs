//! Turning parsed rows into receipts and merged line items

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::fields::{ColumnMapping, ImportKind, TargetField};
use super::values::{parse_currency, parse_date, parse_quantity};
use super::{ImportError, ParsedCsv};
use crate::models::round_cents;

/// Name given to rows with a blank item name
pub const UNKNOWN_ITEM: &str = "Unknown Item";

/// Job used for grouped rows that carry no job name
pub const UNNAMED_JOB: &str = "Imported";

/// Receipt metadata supplied by the user for single-receipt imports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptHeader {
    #[serde(default)]
    pub job_id: Option<i64>,
    #[serde(default)]
    pub job_name: Option<String>,
    #[serde(default)]
    pub store_location: Option<String>,
    pub receipt_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Everything the user chose for an import
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRequest {
    #[serde(default)]
    pub kind: ImportKind,
    /// 1-based line holding the column headers
    #[serde(default = "default_header_row")]
    pub header_row: usize,
    #[serde(default)]
    pub mapping: ColumnMapping,
    /// When false and a unit price column is mapped, amount = unit price × quantity
    #[serde(default = "default_true")]
    pub calculate_unit_price: bool,
    /// Put every row on one receipt instead of grouping by job/store/date
    #[serde(default)]
    pub single_receipt: Option<ReceiptHeader>,
    /// Fold rows with the same item name into one line item
    #[serde(default = "default_true")]
    pub merge_duplicates: bool,
}

fn default_header_row() -> usize {
    1
}

fn default_true() -> bool {
    true
}

impl ImportRequest {
    pub fn new(kind: ImportKind, mapping: ColumnMapping) -> Self {
        Self {
            kind,
            header_row: default_header_row(),
            mapping,
            calculate_unit_price: true,
            single_receipt: None,
            merge_duplicates: true,
        }
    }

    /// Whether item amounts come from unit price × quantity
    pub fn uses_unit_price_column(&self) -> bool {
        self.kind == ImportKind::Items
            && !self.calculate_unit_price
            && self.mapping.contains(TargetField::UnitPrice)
    }
}

/// How a planned receipt finds its job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobRef {
    Id(i64),
    /// Created on first use
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedItem {
    pub item_name: String,
    pub quantity: i64,
    pub purchase_date: NaiveDate,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedReceipt {
    /// Identifies the receipt in error messages
    pub label: String,
    pub job: JobRef,
    pub store_location: Option<String>,
    pub receipt_date: NaiveDate,
    pub notes: Option<String>,
    pub items: Vec<PlannedItem>,
}

/// Which receipts get a reference to the stored source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachPolicy {
    EveryReceipt,
    /// Only the first receipt that is created successfully
    FirstReceipt,
}

/// A data row that could not become a record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRow {
    pub line: usize,
    pub reason: String,
}

/// Validated, merged import ready to be written
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportPlan {
    pub kind: ImportKind,
    pub receipts: Vec<PlannedReceipt>,
    pub rejected: Vec<RejectedRow>,
    /// Rows folded into an earlier row with the same item name
    pub merged_rows: usize,
    pub source_rows: usize,
    pub attach: AttachPolicy,
}

impl ImportPlan {
    pub fn item_count(&self) -> usize {
        self.receipts.iter().map(|r| r.items.len()).sum()
    }
}

/// Check that the mapping covers every required field for the request.
///
/// Runs before anything is stored.
pub fn validate_mapping(request: &ImportRequest, headers: &[String]) -> Result<(), ImportError> {
    let mapping = &request.mapping;

    for (field, column) in mapping.iter() {
        if column >= headers.len() {
            return Err(ImportError::ColumnOutOfRange {
                field,
                column,
                columns: headers.len(),
            });
        }
    }

    let single = match request.kind {
        ImportKind::Items => request.single_receipt.as_ref(),
        ImportKind::Receipts => None,
    };

    if let Some(header) = single {
        let has_name = header
            .job_name
            .as_deref()
            .is_some_and(|n| !n.trim().is_empty());
        if header.job_id.is_none() && !has_name {
            return Err(ImportError::MissingJob);
        }
    }

    let required: Vec<TargetField> = match request.kind {
        ImportKind::Receipts => vec![TargetField::JobName, TargetField::ReceiptDate],
        ImportKind::Items => {
            let mut fields = vec![TargetField::ItemName];
            // Single-receipt imports fall back to the receipt's date
            if single.is_none() {
                fields.push(TargetField::PurchaseDate);
            }
            if !request.uses_unit_price_column() {
                fields.push(TargetField::Amount);
            }
            fields
        }
    };

    let missing: Vec<TargetField> = required
        .into_iter()
        .filter(|f| !mapping.contains(*f))
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingFields(missing));
    }

    if request.kind == ImportKind::Items
        && !request.calculate_unit_price
        && !mapping.contains(TargetField::UnitPrice)
    {
        return Err(ImportError::UnitPriceColumnRequired);
    }

    Ok(())
}

/// Validate the request and build the plan. `today` is the date given to
/// grouped rows without a usable purchase date.
pub fn plan_import(
    parsed: &ParsedCsv,
    request: &ImportRequest,
    today: NaiveDate,
) -> Result<ImportPlan, ImportError> {
    validate_mapping(request, &parsed.headers)?;

    let plan = match (request.kind, request.single_receipt.as_ref()) {
        (ImportKind::Receipts, _) => plan_receipts(parsed, request),
        (ImportKind::Items, Some(header)) => plan_single(parsed, request, header),
        (ImportKind::Items, None) => plan_grouped(parsed, request, today),
    };

    debug!(
        kind = %plan.kind,
        receipts = plan.receipts.len(),
        items = plan.item_count(),
        merged = plan.merged_rows,
        rejected = plan.rejected.len(),
        "Planned import"
    );

    Ok(plan)
}

/// Fold items that share a case-insensitive name.
///
/// Quantities and amounts are summed; the first row's name and date are
/// kept. Returns the merged items in first-appearance order and how many
/// rows were folded away.
pub fn merge_items(items: Vec<PlannedItem>) -> (Vec<PlannedItem>, usize) {
    let before = items.len();
    let mut merged: Vec<PlannedItem> = Vec::with_capacity(before);
    let mut index: HashMap<String, usize> = HashMap::new();

    for item in items {
        let key = item.item_name.trim().to_lowercase();
        match index.get(&key) {
            Some(&i) => {
                let existing = &mut merged[i];
                existing.quantity += item.quantity;
                existing.amount += item.amount;
            }
            None => {
                index.insert(key, merged.len());
                merged.push(item);
            }
        }
    }

    for item in &mut merged {
        item.amount = round_cents(item.amount);
    }

    let folded = before - merged.len();
    (merged, folded)
}

fn col(mapping: &ColumnMapping, field: TargetField) -> Option<usize> {
    mapping.get(field)
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn build_item(row: &[String], request: &ImportRequest, date: NaiveDate) -> PlannedItem {
    let mapping = &request.mapping;

    let item_name = non_blank(ParsedCsv::cell(row, col(mapping, TargetField::ItemName)))
        .unwrap_or_else(|| UNKNOWN_ITEM.to_string());

    let quantity = match col(mapping, TargetField::Quantity) {
        Some(idx) => parse_quantity(ParsedCsv::cell(row, Some(idx))),
        None => 1,
    };

    let amount = if request.uses_unit_price_column() {
        parse_currency(ParsedCsv::cell(row, col(mapping, TargetField::UnitPrice))) * quantity as f64
    } else {
        parse_currency(ParsedCsv::cell(row, col(mapping, TargetField::Amount)))
    };

    PlannedItem {
        item_name,
        quantity,
        purchase_date: date,
        amount,
    }
}

fn row_date(row: &[String], column: Option<usize>, fallback: NaiveDate) -> NaiveDate {
    let raw = ParsedCsv::cell(row, column);
    parse_date(raw).unwrap_or_else(|| {
        if !raw.trim().is_empty() {
            debug!(value = raw, %fallback, "Unrecognized date, using fallback");
        }
        fallback
    })
}

fn finish_items(items: Vec<PlannedItem>, request: &ImportRequest) -> (Vec<PlannedItem>, usize) {
    if request.merge_duplicates {
        merge_items(items)
    } else {
        let items = items
            .into_iter()
            .map(|mut i| {
                i.amount = round_cents(i.amount);
                i
            })
            .collect();
        (items, 0)
    }
}

fn plan_single(parsed: &ParsedCsv, request: &ImportRequest, header: &ReceiptHeader) -> ImportPlan {
    let date_col = col(&request.mapping, TargetField::PurchaseDate);

    let items: Vec<PlannedItem> = parsed
        .rows
        .iter()
        .map(|row| {
            let date = row_date(row, date_col, header.receipt_date);
            build_item(row, request, date)
        })
        .collect();
    let (items, merged_rows) = finish_items(items, request);

    let job_name = header.job_name.as_deref().and_then(non_blank);
    let job = match (header.job_id, job_name.clone()) {
        (Some(id), _) => JobRef::Id(id),
        (None, Some(name)) => JobRef::Name(name),
        // Rejected by validate_mapping
        (None, None) => JobRef::Name(UNNAMED_JOB.to_string()),
    };

    let receipt = PlannedReceipt {
        label: job_name.unwrap_or_else(|| "Receipt".to_string()),
        job,
        store_location: header.store_location.as_deref().and_then(non_blank),
        receipt_date: header.receipt_date,
        notes: header.notes.as_deref().and_then(non_blank),
        items,
    };

    ImportPlan {
        kind: ImportKind::Items,
        receipts: vec![receipt],
        rejected: Vec::new(),
        merged_rows,
        source_rows: parsed.rows.len(),
        attach: AttachPolicy::EveryReceipt,
    }
}

fn plan_grouped(parsed: &ParsedCsv, request: &ImportRequest, today: NaiveDate) -> ImportPlan {
    let mapping = &request.mapping;
    let job_col = col(mapping, TargetField::JobName);
    let store_col = col(mapping, TargetField::StoreLocation);
    let date_col = col(mapping, TargetField::PurchaseDate);

    let mut receipts: Vec<PlannedReceipt> = Vec::new();
    let mut groups: HashMap<(String, String, NaiveDate), usize> = HashMap::new();

    for row in &parsed.rows {
        let job_name = non_blank(ParsedCsv::cell(row, job_col))
            .unwrap_or_else(|| UNNAMED_JOB.to_string());
        let store = non_blank(ParsedCsv::cell(row, store_col));
        let date = row_date(row, date_col, today);

        let key = (job_name.clone(), store.clone().unwrap_or_default(), date);
        let idx = *groups.entry(key).or_insert_with(|| {
            receipts.push(PlannedReceipt {
                label: job_name.clone(),
                job: JobRef::Name(job_name.clone()),
                store_location: store.clone(),
                receipt_date: date,
                notes: None,
                items: Vec::new(),
            });
            receipts.len() - 1
        });

        receipts[idx].items.push(build_item(row, request, date));
    }

    let mut merged_rows = 0;
    for receipt in &mut receipts {
        let (items, folded) = finish_items(std::mem::take(&mut receipt.items), request);
        receipt.items = items;
        merged_rows += folded;
    }

    ImportPlan {
        kind: ImportKind::Items,
        receipts,
        rejected: Vec::new(),
        merged_rows,
        source_rows: parsed.rows.len(),
        attach: AttachPolicy::EveryReceipt,
    }
}

fn plan_receipts(parsed: &ParsedCsv, request: &ImportRequest) -> ImportPlan {
    let mapping = &request.mapping;
    let job_col = col(mapping, TargetField::JobName);
    let store_col = col(mapping, TargetField::StoreLocation);
    let date_col = col(mapping, TargetField::ReceiptDate);
    let notes_col = col(mapping, TargetField::Notes);

    let mut receipts = Vec::new();
    let mut rejected = Vec::new();

    for (i, row) in parsed.rows.iter().enumerate() {
        let line = parsed.line_number(i);

        let Some(job_name) = non_blank(ParsedCsv::cell(row, job_col)) else {
            rejected.push(RejectedRow {
                line,
                reason: "Job name is required".to_string(),
            });
            continue;
        };

        let raw_date = ParsedCsv::cell(row, date_col);
        let Some(receipt_date) = parse_date(raw_date) else {
            rejected.push(RejectedRow {
                line,
                reason: format!("Invalid receipt date '{}'", raw_date),
            });
            continue;
        };

        receipts.push(PlannedReceipt {
            label: format!("Row {}", line),
            job: JobRef::Name(job_name),
            store_location: non_blank(ParsedCsv::cell(row, store_col)),
            receipt_date,
            notes: non_blank(ParsedCsv::cell(row, notes_col)),
            items: Vec::new(),
        });
    }

    ImportPlan {
        kind: ImportKind::Receipts,
        receipts,
        rejected,
        merged_rows: 0,
        source_rows: parsed.rows.len(),
        attach: AttachPolicy::FirstReceipt,
    }
}
