//! CSV export for receipts and line items
//!
//! Every field is quoted so spreadsheet tools never split a store name or
//! note on an embedded comma. Money columns are written with two decimals.

use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{ItemWithContext, Receipt};

pub const RECEIPT_HEADERS: [&str; 7] = [
    "id",
    "job_name",
    "store_location",
    "receipt_date",
    "notes",
    "total",
    "item_count",
];

pub const ITEM_HEADERS: [&str; 9] = [
    "id",
    "item_name",
    "quantity",
    "purchase_date",
    "amount",
    "unit_price",
    "store_location",
    "job_name",
    "receipt_id",
];

fn write_rows<I>(headers: &[&str], rows: I) -> Result<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(&row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::InvalidData(format!("Failed to finish CSV: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| Error::InvalidData(format!("CSV is not UTF-8: {}", e)))
}

/// Receipts, one row each, with their item totals
pub fn receipts_to_csv(receipts: &[Receipt]) -> Result<String> {
    write_rows(
        &RECEIPT_HEADERS,
        receipts.iter().map(|r| {
            vec![
                r.id.to_string(),
                r.job_name.clone().unwrap_or_default(),
                r.store_location.clone().unwrap_or_default(),
                r.receipt_date.to_string(),
                r.notes.clone().unwrap_or_default(),
                format!("{:.2}", r.total()),
                r.items.len().to_string(),
            ]
        }),
    )
}

/// Line items with their receipt's store and job
pub fn items_to_csv(items: &[ItemWithContext]) -> Result<String> {
    write_rows(
        &ITEM_HEADERS,
        items.iter().map(|i| {
            vec![
                i.id.to_string(),
                i.item_name.clone(),
                i.quantity.to_string(),
                i.purchase_date.to_string(),
                format!("{:.2}", i.amount),
                format!("{:.2}", i.unit_price),
                i.store_location.clone().unwrap_or_default(),
                i.job_name.clone().unwrap_or_default(),
                i.receipt_id.to_string(),
            ]
        }),
    )
}

impl Database {
    /// Export all receipts to CSV
    pub fn export_receipts_csv(&self) -> Result<String> {
        receipts_to_csv(&self.list_receipts()?)
    }

    /// Export all line items to CSV
    pub fn export_items_csv(&self) -> Result<String> {
        items_to_csv(&self.list_items()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewLineItem, NewReceipt};
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, d).unwrap()
    }

    fn seeded_db() -> Database {
        let db = Database::in_memory().unwrap();
        let job = db.create_job("Kitchen").unwrap();
        let receipt = db
            .create_receipt(&NewReceipt {
                job_id: Some(job.id),
                store_location: Some("Ace, Main St".to_string()),
                receipt_date: day(4),
                notes: Some("said \"thanks\"".to_string()),
                ..Default::default()
            })
            .unwrap();
        db.add_line_item(
            receipt.id,
            &NewLineItem::new("Tile", day(4), 45.5).with_quantity(2),
        )
        .unwrap();
        db.add_line_item(receipt.id, &NewLineItem::new("Grout", day(4), 12.0))
            .unwrap();
        db
    }

    #[test]
    fn test_export_empty() {
        let db = Database::in_memory().unwrap();
        let csv = db.export_receipts_csv().unwrap();
        assert_eq!(
            csv,
            "\"id\",\"job_name\",\"store_location\",\"receipt_date\",\"notes\",\"total\",\"item_count\"\n"
        );
    }

    #[test]
    fn test_export_receipts_csv() {
        let db = seeded_db();
        let csv = db.export_receipts_csv().unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("\"Kitchen\""));
        assert!(lines[1].contains("\"Ace, Main St\""));
        assert!(lines[1].contains("\"said \"\"thanks\"\"\""));
        assert!(lines[1].ends_with("\"57.50\",\"2\""));
    }

    #[test]
    fn test_export_items_csv() {
        let db = seeded_db();
        let text = db.export_items_csv().unwrap();

        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), ITEM_HEADERS.to_vec());

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        let tile = rows.iter().find(|r| &r[1] == "Tile").unwrap();
        assert_eq!(&tile[2], "2");
        assert_eq!(&tile[4], "45.50");
        assert_eq!(&tile[5], "22.75");
        assert_eq!(&tile[6], "Ace, Main St");
        assert_eq!(&tile[7], "Kitchen");
    }
}
