//! CSV import pipeline for receipts and line items
//!
//! An import runs in two phases. Everything up to an [`ImportPlan`] is pure:
//! the file is tokenized, the header row selected, the column mapping
//! validated, amounts resolved and duplicate items merged. Only then is the
//! plan executed against an [`ImportSink`], one record at a time, with each
//! failure counted rather than aborting the batch.
//!
//! ```text
//! text ─▶ CsvDocument ─▶ ParsedCsv ─▶ plan_import(request) ─▶ ImportPlan
//!                                                              │
//!                                  ImportSummary ◀─ execute_plan(sink)
//! ```

use serde::Serialize;
use thiserror::Error;

mod execute;
mod fields;
mod plan;
mod tokenizer;
mod values;


pub use execute::{execute_plan, ImportSink, ImportSummary, MAX_REPORTED_ERRORS};
pub use fields::{
    default_config_path, normalize_header, ColumnMapping, FieldAliases, ImportKind, TargetField,
};
pub use plan::{
    merge_items, plan_import, validate_mapping, AttachPolicy, ImportPlan, ImportRequest, JobRef,
    PlannedItem, PlannedReceipt, ReceiptHeader, RejectedRow, UNKNOWN_ITEM, UNNAMED_JOB,
};
pub use tokenizer::{parse_line, split_lines};
pub use values::{parse_currency, parse_date, parse_quantity};

/// Number of data rows included in a preview
pub const PREVIEW_ROWS: usize = 5;

/// Number of raw lines shown for picking the header row
pub const PREVIEW_RAW_LINES: usize = 10;

/// Problems that stop an import before anything is written
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImportError {
    #[error("CSV file is empty")]
    EmptyFile,

    #[error("Header row must be 1 or greater")]
    InvalidHeaderRow,

    #[error("Not enough rows in CSV for selected header row ({header_row})")]
    NotEnoughRows { header_row: usize },

    #[error("Please map required fields: {}", labels(.0))]
    MissingFields(Vec<TargetField>),

    #[error("Please select a Unit Price column or enable calculated unit price")]
    UnitPriceColumnRequired,

    #[error("A job is required for single-receipt imports")]
    MissingJob,

    #[error("{} is mapped to column {column}, but the file has {columns} columns", .field.label())]
    ColumnOutOfRange {
        field: TargetField,
        column: usize,
        columns: usize,
    },
}

fn labels(fields: &[TargetField]) -> String {
    fields
        .iter()
        .map(|f| f.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A CSV file split into raw lines, before a header row is chosen
#[derive(Debug, Clone)]
pub struct CsvDocument {
    lines: Vec<String>,
}

impl CsvDocument {
    pub fn parse(text: &str) -> Self {
        Self {
            lines: split_lines(text).into_iter().map(str::to_string).collect(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Leading raw lines, for picking which one holds the headers
    pub fn raw_lines(&self, limit: usize) -> &[String] {
        &self.lines[..self.lines.len().min(limit)]
    }

    /// Use line `header_row` (1-based) as the header.
    ///
    /// Lines above it are discarded; lines below it are data.
    pub fn with_header_row(&self, header_row: usize) -> Result<ParsedCsv, ImportError> {
        if self.lines.is_empty() {
            return Err(ImportError::EmptyFile);
        }
        if header_row == 0 {
            return Err(ImportError::InvalidHeaderRow);
        }
        if self.lines.len() < header_row + 1 {
            return Err(ImportError::NotEnoughRows { header_row });
        }

        let headers = parse_line(&self.lines[header_row - 1]);
        let rows = self.lines[header_row..]
            .iter()
            .map(|line| parse_line(line))
            .collect();

        Ok(ParsedCsv {
            headers,
            rows,
            header_row,
        })
    }
}

/// Header cells plus tokenized data rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedCsv {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// 1-based line the headers came from
    pub header_row: usize,
}

impl ParsedCsv {
    /// Cell text, or "" for short rows and unmapped fields
    pub(crate) fn cell<'a>(row: &'a [String], column: Option<usize>) -> &'a str {
        column
            .and_then(|idx| row.get(idx))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// 1-based file line of a data row, for error messages
    pub fn line_number(&self, row_index: usize) -> usize {
        self.header_row + row_index + 1
    }
}

/// What a user sees before committing to an import
#[derive(Debug, Clone, Serialize)]
pub struct ImportPreview {
    pub kind: ImportKind,
    pub header_row: usize,
    pub raw_lines: Vec<String>,
    pub headers: Vec<String>,
    pub suggested_mapping: ColumnMapping,
    pub sample_rows: Vec<Vec<String>>,
    pub total_rows: usize,
}

/// Parse a file and suggest a mapping for it
pub fn preview(
    text: &str,
    header_row: usize,
    kind: ImportKind,
    aliases: &FieldAliases,
) -> Result<ImportPreview, ImportError> {
    let document = CsvDocument::parse(text);
    let parsed = document.with_header_row(header_row)?;

    Ok(ImportPreview {
        kind,
        header_row,
        raw_lines: document.raw_lines(PREVIEW_RAW_LINES).to_vec(),
        suggested_mapping: aliases.suggest_mapping(&parsed.headers, kind),
        sample_rows: parsed.rows.iter().take(PREVIEW_ROWS).cloned().collect(),
        total_rows: parsed.rows.len(),
        headers: parsed.headers,
    })
}
