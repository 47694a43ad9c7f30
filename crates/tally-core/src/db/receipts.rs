//! Receipt operations

use std::collections::HashMap;

use rusqlite::{params, OptionalExtension};

use super::{clean_text, date_column, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::*;

const RECEIPT_COLUMNS: &str = "r.id, r.job_id, j.name, r.store_location, r.receipt_date, r.notes,
     r.file_path, r.file_type, r.created_at, r.updated_at
     FROM receipts r LEFT JOIN jobs j ON j.id = r.job_id";

impl Database {
    /// List all receipts with their items, newest receipt date first
    pub fn list_receipts(&self) -> Result<Vec<Receipt>> {
        let receipts = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {} ORDER BY r.receipt_date DESC, r.id DESC",
                RECEIPT_COLUMNS
            ))?;
            let rows = stmt.query_map([], Self::row_to_receipt)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };
        self.attach_items(receipts)
    }

    /// List the receipts attributed to a job, newest receipt date first
    pub fn list_receipts_for_job(&self, job_id: i64) -> Result<Vec<Receipt>> {
        let receipts = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {} WHERE r.job_id = ? ORDER BY r.receipt_date DESC, r.id DESC",
                RECEIPT_COLUMNS
            ))?;
            let rows = stmt.query_map(params![job_id], Self::row_to_receipt)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };
        self.attach_items(receipts)
    }

    /// Get receipt by ID, with its items
    pub fn get_receipt(&self, id: i64) -> Result<Option<Receipt>> {
        let receipt = {
            let conn = self.conn()?;
            conn.query_row(
                &format!("SELECT {} WHERE r.id = ?", RECEIPT_COLUMNS),
                params![id],
                Self::row_to_receipt,
            )
            .optional()?
        };

        match receipt {
            Some(mut receipt) => {
                receipt.items = self.list_line_items(receipt.id)?;
                Ok(Some(receipt))
            }
            None => Ok(None),
        }
    }

    /// Create a receipt, returning it with an empty item list
    pub fn create_receipt(&self, receipt: &NewReceipt) -> Result<Receipt> {
        self.ensure_job(receipt.job_id)?;

        let id = {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO receipts (job_id, store_location, receipt_date, notes, file_path, file_type)
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    receipt.job_id,
                    clean_text(receipt.store_location.as_deref()),
                    receipt.receipt_date.to_string(),
                    clean_text(receipt.notes.as_deref()),
                    receipt.file_path,
                    receipt.file_type,
                ],
            )?;
            conn.last_insert_rowid()
        };

        if let Some(job_id) = receipt.job_id {
            self.touch_job(job_id)?;
        }

        self.get_receipt(id)?
            .ok_or_else(|| Error::NotFound(format!("Receipt {} after insert", id)))
    }

    /// Update a receipt's header fields.
    ///
    /// File fields left as None keep the stored file reference.
    /// Returns None when the receipt does not exist.
    pub fn update_receipt(&self, id: i64, receipt: &NewReceipt) -> Result<Option<Receipt>> {
        self.ensure_job(receipt.job_id)?;

        let changed = {
            let conn = self.conn()?;
            conn.execute(
                "UPDATE receipts
                 SET job_id = ?, store_location = ?, receipt_date = ?, notes = ?,
                     file_path = COALESCE(?, file_path),
                     file_type = COALESCE(?, file_type),
                     updated_at = CURRENT_TIMESTAMP
                 WHERE id = ?",
                params![
                    receipt.job_id,
                    clean_text(receipt.store_location.as_deref()),
                    receipt.receipt_date.to_string(),
                    clean_text(receipt.notes.as_deref()),
                    receipt.file_path,
                    receipt.file_type,
                    id,
                ],
            )?
        };

        if changed == 0 {
            return Ok(None);
        }
        if let Some(job_id) = receipt.job_id {
            self.touch_job(job_id)?;
        }

        self.get_receipt(id)
    }

    /// Delete a receipt and (via cascade) its items.
    ///
    /// Returns the receipt as it was, so the caller can remove its file.
    pub fn delete_receipt(&self, id: i64) -> Result<Option<Receipt>> {
        let Some(receipt) = self.get_receipt(id)? else {
            return Ok(None);
        };

        let conn = self.conn()?;
        conn.execute("DELETE FROM receipts WHERE id = ?", params![id])?;

        Ok(Some(receipt))
    }

    /// Number of receipts referencing a stored file.
    ///
    /// Grouped imports attach one source file to several receipts, so a file
    /// may only be removed once this drops to zero.
    pub fn count_file_references(&self, file_path: &str) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM receipts WHERE file_path = ?",
            params![file_path],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn ensure_job(&self, job_id: Option<i64>) -> Result<()> {
        if let Some(job_id) = job_id {
            if self.get_job(job_id)?.is_none() {
                return Err(Error::NotFound(format!("Job {}", job_id)));
            }
        }
        Ok(())
    }

    /// Load items for a batch of receipts in one query
    fn attach_items(&self, mut receipts: Vec<Receipt>) -> Result<Vec<Receipt>> {
        if receipts.is_empty() {
            return Ok(receipts);
        }

        let mut by_receipt: HashMap<i64, Vec<LineItem>> = HashMap::new();
        for item in self.list_all_line_items()? {
            by_receipt.entry(item.receipt_id).or_default().push(item);
        }

        for receipt in &mut receipts {
            receipt.items = by_receipt.remove(&receipt.id).unwrap_or_default();
        }
        Ok(receipts)
    }

    fn row_to_receipt(row: &rusqlite::Row) -> rusqlite::Result<Receipt> {
        let created_at: String = row.get(8)?;
        let updated_at: String = row.get(9)?;

        Ok(Receipt {
            id: row.get(0)?,
            job_id: row.get(1)?,
            job_name: row.get(2)?,
            store_location: row.get(3)?,
            receipt_date: date_column(row, 4)?,
            notes: row.get(5)?,
            file_path: row.get(6)?,
            file_type: row.get(7)?,
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
            items: Vec::new(),
        })
    }
}
