//! Writing an import plan to storage

use serde::Serialize;
use tracing::{info, warn};

use super::fields::ImportKind;
use super::plan::{AttachPolicy, ImportPlan, JobRef, PlannedItem, PlannedReceipt};
use crate::db::Database;
use crate::error::Result;
use crate::models::{NewLineItem, NewReceipt};
use crate::storage::StoredFile;

/// Error messages kept in a summary; the rest are only counted
pub const MAX_REPORTED_ERRORS: usize = 10;

/// Persistence boundary for imports
pub trait ImportSink {
    /// Create a receipt (no items yet) and return its ID
    fn create_receipt(&self, receipt: &PlannedReceipt, file: Option<&StoredFile>) -> Result<i64>;

    fn add_item(&self, receipt_id: i64, item: &PlannedItem) -> Result<()>;
}

impl ImportSink for Database {
    fn create_receipt(&self, receipt: &PlannedReceipt, file: Option<&StoredFile>) -> Result<i64> {
        let job_id = match &receipt.job {
            JobRef::Id(id) => *id,
            JobRef::Name(name) => self.get_or_create_job(name)?.id,
        };

        let created = Database::create_receipt(
            self,
            &NewReceipt {
                job_id: Some(job_id),
                store_location: receipt.store_location.clone(),
                receipt_date: receipt.receipt_date,
                notes: receipt.notes.clone(),
                file_path: file.map(|f| f.file_path.clone()),
                file_type: file.map(|f| f.file_type.clone()),
            },
        )?;
        Ok(created.id)
    }

    fn add_item(&self, receipt_id: i64, item: &PlannedItem) -> Result<()> {
        let new_item = NewLineItem::new(item.item_name.clone(), item.purchase_date, item.amount)
            .with_quantity(item.quantity);
        self.add_line_item(receipt_id, &new_item)?;
        Ok(())
    }
}

/// Outcome of an executed import
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    /// Items (or receipts, for receipt imports) written
    pub imported: usize,
    pub failed: usize,
    pub merged_rows: usize,
    pub receipts_created: usize,
    /// First few failure messages
    pub errors: Vec<String>,
    /// Failures beyond those listed in `errors`
    pub more_errors: usize,
}

impl ImportSummary {
    fn record_failure(&mut self, count: usize, message: String) {
        self.failed += count;
        warn!("Import failure: {}", message);
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(message);
        } else {
            self.more_errors += 1;
        }
    }

    /// One-line human summary
    pub fn message(&self, kind: ImportKind) -> String {
        let noun = match kind {
            ImportKind::Items => "items",
            ImportKind::Receipts => "receipts",
        };
        let mut message = format!("Imported {} {}.", self.imported, noun);
        if self.merged_rows > 0 {
            message.push_str(&format!(
                " {} duplicate rows were merged.",
                self.merged_rows
            ));
        }
        if self.failed > 0 {
            message.push_str(&format!(" {} {} failed.", self.failed, noun));
        }
        message
    }
}

/// Write a plan one record at a time.
///
/// A failed item counts once; a failed receipt counts each of its items
/// (or once, for receipt imports). Nothing aborts the batch.
pub fn execute_plan<S: ImportSink + ?Sized>(
    sink: &S,
    plan: &ImportPlan,
    source_file: Option<&StoredFile>,
) -> ImportSummary {
    let mut summary = ImportSummary {
        merged_rows: plan.merged_rows,
        ..Default::default()
    };

    for row in &plan.rejected {
        summary.record_failure(1, format!("Row {}: {}", row.line, row.reason));
    }

    let mut attached = false;

    for receipt in &plan.receipts {
        let file = match plan.attach {
            AttachPolicy::EveryReceipt => source_file,
            AttachPolicy::FirstReceipt if attached => None,
            AttachPolicy::FirstReceipt => source_file,
        };

        let receipt_id = match sink.create_receipt(receipt, file) {
            Ok(id) => id,
            Err(e) => {
                summary.record_failure(
                    receipt.items.len().max(1),
                    format!("Receipt \"{}\": {}", receipt.label, e),
                );
                continue;
            }
        };

        attached = attached || file.is_some();
        summary.receipts_created += 1;
        if plan.kind == ImportKind::Receipts {
            summary.imported += 1;
        }

        for item in &receipt.items {
            match sink.add_item(receipt_id, item) {
                Ok(()) => summary.imported += 1,
                Err(e) => summary.record_failure(
                    1,
                    format!("Item \"{}\": {}", item.item_name, e),
                ),
            }
        }
    }

    info!(
        imported = summary.imported,
        failed = summary.failed,
        merged = summary.merged_rows,
        receipts = summary.receipts_created,
        "Import finished"
    );

    summary
}
