//! Line item operations

use rusqlite::{params, OptionalExtension};

use super::{date_column, Database};
use crate::error::{Error, Result};
use crate::models::*;

const ITEM_COLUMNS: &str = "id, receipt_id, item_name, purchase_date, amount, quantity";

impl Database {
    /// Add an item to a receipt
    pub fn add_line_item(&self, receipt_id: i64, item: &NewLineItem) -> Result<LineItem> {
        let (name, amount) = item.validate()?;

        let conn = self.conn()?;
        let exists: Option<i64> = conn
            .query_row(
                "SELECT id FROM receipts WHERE id = ?",
                params![receipt_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(Error::NotFound(format!("Receipt {}", receipt_id)));
        }

        conn.execute(
            "INSERT INTO line_items (receipt_id, item_name, purchase_date, amount, quantity)
             VALUES (?, ?, ?, ?, ?)",
            params![
                receipt_id,
                name,
                item.purchase_date.to_string(),
                amount,
                item.effective_quantity(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);

        self.get_line_item(id)?
            .ok_or_else(|| Error::NotFound(format!("Line item {} after insert", id)))
    }

    /// Get line item by ID
    pub fn get_line_item(&self, id: i64) -> Result<Option<LineItem>> {
        let conn = self.conn()?;
        let item = conn
            .query_row(
                &format!("SELECT {} FROM line_items WHERE id = ?", ITEM_COLUMNS),
                params![id],
                Self::row_to_line_item,
            )
            .optional()?;
        Ok(item)
    }

    /// Replace an item's fields. Returns None when the item does not exist.
    pub fn update_line_item(&self, id: i64, item: &NewLineItem) -> Result<Option<LineItem>> {
        let (name, amount) = item.validate()?;

        let changed = {
            let conn = self.conn()?;
            conn.execute(
                "UPDATE line_items SET item_name = ?, purchase_date = ?, amount = ?, quantity = ?
                 WHERE id = ?",
                params![
                    name,
                    item.purchase_date.to_string(),
                    amount,
                    item.effective_quantity(),
                    id,
                ],
            )?
        };

        if changed == 0 {
            return Ok(None);
        }
        self.get_line_item(id)
    }

    /// Delete an item, returning it as it was
    pub fn delete_line_item(&self, id: i64) -> Result<Option<LineItem>> {
        let Some(item) = self.get_line_item(id)? else {
            return Ok(None);
        };

        let conn = self.conn()?;
        conn.execute("DELETE FROM line_items WHERE id = ?", params![id])?;
        Ok(Some(item))
    }

    /// Every line item with its receipt's store and job, newest purchase first
    pub fn list_items(&self) -> Result<Vec<ItemWithContext>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT li.id, li.receipt_id, li.item_name, li.purchase_date, li.amount, li.quantity,
                    r.store_location, j.name
             FROM line_items li
             JOIN receipts r ON r.id = li.receipt_id
             LEFT JOIN jobs j ON j.id = r.job_id
             ORDER BY li.purchase_date DESC, li.id DESC",
        )?;

        let items = stmt
            .query_map([], |row| {
                let item = Self::row_to_line_item(row)?;
                Ok(ItemWithContext {
                    unit_price: round_cents(item.unit_price()),
                    id: item.id,
                    receipt_id: item.receipt_id,
                    item_name: item.item_name,
                    purchase_date: item.purchase_date,
                    amount: item.amount,
                    quantity: item.quantity,
                    store_location: row.get(6)?,
                    job_name: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(items)
    }

    pub(crate) fn list_line_items(&self, receipt_id: i64) -> Result<Vec<LineItem>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM line_items WHERE receipt_id = ? ORDER BY id",
            ITEM_COLUMNS
        ))?;
        let items = stmt
            .query_map(params![receipt_id], Self::row_to_line_item)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    pub(crate) fn list_all_line_items(&self) -> Result<Vec<LineItem>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM line_items ORDER BY receipt_id, id",
            ITEM_COLUMNS
        ))?;
        let items = stmt
            .query_map([], Self::row_to_line_item)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn row_to_line_item(row: &rusqlite::Row) -> rusqlite::Result<LineItem> {
        let quantity: Option<i64> = row.get(5)?;
        Ok(LineItem {
            id: row.get(0)?,
            receipt_id: row.get(1)?,
            item_name: row.get(2)?,
            purchase_date: date_column(row, 3)?,
            amount: row.get(4)?,
            quantity: quantity.filter(|q| *q >= 1).unwrap_or(1),
        })
    }
}
