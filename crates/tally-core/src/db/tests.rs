//! Database tests

use super::*;
use crate::error::Error;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rusqlite::params;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn receipt_for(job_id: Option<i64>, date: NaiveDate) -> NewReceipt {
        NewReceipt {
            job_id,
            store_location: Some("Home Depot #123".to_string()),
            receipt_date: date,
            notes: None,
            file_path: None,
            file_type: None,
        }
    }

    #[test]
    fn test_in_memory_db() {
        let db = Database::in_memory().unwrap();
        assert!(db.list_jobs().unwrap().is_empty());
        assert!(db.list_receipts().unwrap().is_empty());
        assert_eq!(db.schema_version().unwrap(), LATEST_VERSION);
    }

    #[test]
    fn test_migrations_are_recorded_once() {
        let db = Database::in_memory().unwrap();
        let mut conn = db.conn().unwrap();

        // Re-running is a no-op
        let applied = migrations::run(&mut conn).unwrap();
        assert_eq!(applied, 0);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, LATEST_VERSION);
    }

    #[test]
    fn test_legacy_database_is_adopted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");

        {
            let conn = rusqlite::Connection::open(&path).unwrap();
            conn.execute_batch(
                r#"
                CREATE TABLE receipts (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    job_name TEXT,
                    store_location TEXT,
                    receipt_date DATE NOT NULL,
                    notes TEXT,
                    file_path TEXT,
                    file_type TEXT,
                    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
                );
                CREATE TABLE line_items (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    receipt_id INTEGER NOT NULL,
                    item_name TEXT NOT NULL,
                    purchase_date DATE NOT NULL,
                    amount DECIMAL(10,2) NOT NULL,
                    FOREIGN KEY (receipt_id) REFERENCES receipts(id) ON DELETE CASCADE
                );
                INSERT INTO receipts (job_name, receipt_date) VALUES ('Kitchen Remodel', '2024-01-02');
                INSERT INTO receipts (job_name, receipt_date) VALUES ('Kitchen Remodel', '2024-01-03');
                INSERT INTO receipts (job_name, receipt_date) VALUES ('Deck', '2024-01-04');
                INSERT INTO receipts (job_name, receipt_date) VALUES (NULL, '2024-01-05');
                INSERT INTO line_items (receipt_id, item_name, purchase_date, amount)
                    VALUES (1, 'Screws', '2024-01-02', 4.5);
                "#,
            )
            .unwrap();
        }

        let db = Database::new(&path.to_string_lossy()).unwrap();

        let jobs = db.list_jobs().unwrap();
        assert_eq!(jobs.len(), 2);
        let kitchen = jobs.iter().find(|j| j.job.name == "Kitchen Remodel").unwrap();
        assert_eq!(kitchen.receipt_count, 2);
        assert_eq!(kitchen.total_amount, 4.5);

        // Unattributed receipts are retained
        let receipts = db.list_receipts().unwrap();
        assert_eq!(receipts.len(), 4);
        assert_eq!(receipts.iter().filter(|r| r.job_id.is_none()).count(), 1);

        // Quantity column was added with its default
        let item = &db.get_receipt(1).unwrap().unwrap().items[0];
        assert_eq!(item.quantity, 1);
    }

    #[test]
    fn test_legacy_text_dates_are_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");

        {
            let conn = rusqlite::Connection::open(&path).unwrap();
            conn.execute_batch(
                r#"
                CREATE TABLE receipts (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    job_name TEXT,
                    store_location TEXT,
                    receipt_date DATE NOT NULL,
                    notes TEXT,
                    file_path TEXT,
                    file_type TEXT,
                    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
                );
                CREATE TABLE line_items (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    receipt_id INTEGER NOT NULL,
                    item_name TEXT NOT NULL,
                    purchase_date DATE NOT NULL,
                    amount DECIMAL(10,2) NOT NULL
                );
                INSERT INTO receipts (job_name, receipt_date) VALUES ('Deck', '03/07/2024');
                INSERT INTO receipts (job_name, receipt_date) VALUES ('Deck', '2024-03-09 10:15:00');
                INSERT INTO line_items (receipt_id, item_name, purchase_date, amount)
                    VALUES (1, 'Joist Hangers', '3/7/2024', 12.0);
                INSERT INTO line_items (receipt_id, item_name, purchase_date, amount)
                    VALUES (2, 'Deck Screws', '2024-03-09', 8.0);
                "#,
            )
            .unwrap();
        }

        let db = Database::new(&path.to_string_lossy()).unwrap();

        let receipts = db.list_receipts().unwrap();
        assert_eq!(receipts.len(), 2);
        let first = db.get_receipt(1).unwrap().unwrap();
        assert_eq!(first.receipt_date, NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());
        assert_eq!(
            first.items[0].purchase_date,
            NaiveDate::from_ymd_opt(2024, 3, 7).unwrap()
        );
        let second = db.get_receipt(2).unwrap().unwrap();
        assert_eq!(second.receipt_date, NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());

        // Stored as ISO text now
        let conn = db.conn().unwrap();
        let stored: String = conn
            .query_row("SELECT receipt_date FROM receipts WHERE id = 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(stored, "2024-03-07");

        assert_eq!(db.list_items().unwrap().len(), 2);
        assert!(db.export_receipts_csv().is_ok());
    }

    #[test]
    fn test_unreadable_stored_date_does_not_fail_lists() {
        let db = Database::in_memory().unwrap();
        let job = db.create_job("Porch").unwrap();
        let receipt = db.create_receipt(&receipt_for(Some(job.id), day(2))).unwrap();
        db.add_line_item(receipt.id, &NewLineItem::new("Paint", day(2), 30.0))
            .unwrap();

        let conn = db.conn().unwrap();
        conn.execute(
            "UPDATE line_items SET purchase_date = 'sometime last spring'",
            [],
        )
        .unwrap();

        let items = db.list_items().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].purchase_date, NaiveDate::default());
        assert_eq!(db.list_receipts().unwrap()[0].items.len(), 1);
    }

    #[test]
    fn test_job_crud() {
        let db = Database::in_memory().unwrap();

        let job = db.create_job("  Kitchen Remodel ").unwrap();
        assert_eq!(job.name, "Kitchen Remodel");

        // Duplicate names are rejected
        assert!(matches!(
            db.create_job("Kitchen Remodel"),
            Err(Error::Conflict(_))
        ));
        assert!(matches!(db.create_job("   "), Err(Error::InvalidData(_))));

        let same = db.get_or_create_job("Kitchen Remodel").unwrap();
        assert_eq!(same.id, job.id);

        let renamed = db.update_job(job.id, "Kitchen").unwrap().unwrap();
        assert_eq!(renamed.name, "Kitchen");
        assert!(db.get_job_by_name("Kitchen Remodel").unwrap().is_none());

        assert!(db.update_job(9999, "Nope").unwrap().is_none());
    }

    #[test]
    fn test_rename_to_existing_name_conflicts() {
        let db = Database::in_memory().unwrap();
        let a = db.create_job("A").unwrap();
        db.create_job("B").unwrap();
        assert!(matches!(db.update_job(a.id, "B"), Err(Error::Conflict(_))));
        // Renaming to its own name is fine
        assert!(db.update_job(a.id, "A").unwrap().is_some());
    }

    #[test]
    fn test_job_summary_totals() {
        let db = Database::in_memory().unwrap();
        let job = db.create_job("Deck").unwrap();
        let other = db.create_job("Fence").unwrap();

        let r1 = db.create_receipt(&receipt_for(Some(job.id), day(1))).unwrap();
        let r2 = db.create_receipt(&receipt_for(Some(job.id), day(2))).unwrap();
        db.add_line_item(r1.id, &NewLineItem::new("Boards", day(1), 100.10))
            .unwrap();
        db.add_line_item(r2.id, &NewLineItem::new("Screws", day(2), 9.95))
            .unwrap();

        let jobs = db.list_jobs().unwrap();
        let deck = jobs.iter().find(|j| j.job.id == job.id).unwrap();
        assert_eq!(deck.receipt_count, 2);
        assert_eq!(deck.total_amount, 110.05);

        let fence = jobs.iter().find(|j| j.job.id == other.id).unwrap();
        assert_eq!(fence.receipt_count, 0);
        assert_eq!(fence.total_amount, 0.0);
    }

    #[test]
    fn test_receipt_crud() {
        let db = Database::in_memory().unwrap();
        let job = db.create_job("Bathroom").unwrap();

        let mut new = receipt_for(Some(job.id), day(3));
        new.file_path = Some("1700000000000-42.pdf".to_string());
        new.file_type = Some("application/pdf".to_string());
        let receipt = db.create_receipt(&new).unwrap();
        assert_eq!(receipt.job_name.as_deref(), Some("Bathroom"));
        assert!(receipt.items.is_empty());

        // Update without a file keeps the existing file reference
        let mut update = receipt_for(Some(job.id), day(4));
        update.notes = Some("returned one tile box".to_string());
        let updated = db.update_receipt(receipt.id, &update).unwrap().unwrap();
        assert_eq!(updated.receipt_date, day(4));
        assert_eq!(updated.file_path.as_deref(), Some("1700000000000-42.pdf"));
        assert_eq!(updated.notes.as_deref(), Some("returned one tile box"));

        assert!(db.update_receipt(9999, &update).unwrap().is_none());

        let deleted = db.delete_receipt(receipt.id).unwrap().unwrap();
        assert_eq!(deleted.id, receipt.id);
        assert!(db.get_receipt(receipt.id).unwrap().is_none());
        assert!(db.delete_receipt(receipt.id).unwrap().is_none());
    }

    #[test]
    fn test_create_receipt_for_missing_job() {
        let db = Database::in_memory().unwrap();
        let result = db.create_receipt(&receipt_for(Some(42), day(1)));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_receipts_ordered_by_date_desc() {
        let db = Database::in_memory().unwrap();
        db.create_receipt(&receipt_for(None, day(1))).unwrap();
        db.create_receipt(&receipt_for(None, day(9))).unwrap();
        db.create_receipt(&receipt_for(None, day(5))).unwrap();

        let dates: Vec<_> = db
            .list_receipts()
            .unwrap()
            .into_iter()
            .map(|r| r.receipt_date)
            .collect();
        assert_eq!(dates, vec![day(9), day(5), day(1)]);
    }

    #[test]
    fn test_line_item_crud() {
        let db = Database::in_memory().unwrap();
        let receipt = db.create_receipt(&receipt_for(None, day(1))).unwrap();

        let item = db
            .add_line_item(
                receipt.id,
                &NewLineItem::new("2x4 Stud", day(1), 12.0).with_quantity(3),
            )
            .unwrap();
        assert_eq!(item.quantity, 3);
        assert_eq!(item.unit_price(), 4.0);

        // Quantity defaults to 1
        let single = db
            .add_line_item(receipt.id, &NewLineItem::new("Glue", day(1), 5.5))
            .unwrap();
        assert_eq!(single.quantity, 1);

        let updated = db
            .update_line_item(
                item.id,
                &NewLineItem::new("2x4 Stud 8ft", day(2), 15.0).with_quantity(0),
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.item_name, "2x4 Stud 8ft");
        assert_eq!(updated.quantity, 1);

        let deleted = db.delete_line_item(single.id).unwrap().unwrap();
        assert_eq!(deleted.item_name, "Glue");
        assert!(db.get_line_item(single.id).unwrap().is_none());

        let receipt = db.get_receipt(receipt.id).unwrap().unwrap();
        assert_eq!(receipt.items.len(), 1);
    }

    #[test]
    fn test_line_item_validation() {
        let db = Database::in_memory().unwrap();
        let receipt = db.create_receipt(&receipt_for(None, day(1))).unwrap();

        let negative = db.add_line_item(receipt.id, &NewLineItem::new("Refund", day(1), -3.0));
        assert!(matches!(negative, Err(Error::InvalidData(_))));

        let orphan = db.add_line_item(9999, &NewLineItem::new("Nail", day(1), 1.0));
        assert!(matches!(orphan, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_amount_rounded_to_cents() {
        let db = Database::in_memory().unwrap();
        let receipt = db.create_receipt(&receipt_for(None, day(1))).unwrap();
        let item = db
            .add_line_item(receipt.id, &NewLineItem::new("Paint", day(1), 19.999))
            .unwrap();
        assert_eq!(item.amount, 20.0);
    }

    #[test]
    fn test_delete_job_cascades() {
        let db = Database::in_memory().unwrap();
        let job = db.create_job("Garage").unwrap();

        let mut with_file = receipt_for(Some(job.id), day(1));
        with_file.file_path = Some("a.jpg".to_string());
        let r1 = db.create_receipt(&with_file).unwrap();
        let r2 = db.create_receipt(&receipt_for(Some(job.id), day(2))).unwrap();
        db.add_line_item(r1.id, &NewLineItem::new("Door", day(1), 300.0))
            .unwrap();
        db.add_line_item(r2.id, &NewLineItem::new("Opener", day(2), 250.0))
            .unwrap();

        // An unattributed receipt must survive
        let loose = db.create_receipt(&receipt_for(None, day(3))).unwrap();
        db.add_line_item(loose.id, &NewLineItem::new("Tape", day(3), 3.0))
            .unwrap();

        let deleted = db.delete_job(job.id).unwrap().unwrap();
        assert_eq!(deleted.receipts_deleted, 2);
        assert_eq!(deleted.file_paths, vec!["a.jpg".to_string()]);

        assert!(db.get_job(job.id).unwrap().is_none());
        let remaining = db.list_receipts().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, loose.id);

        let conn = db.conn().unwrap();
        let orphans: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM line_items WHERE receipt_id IN (?, ?)",
                params![r1.id, r2.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(orphans, 0);

        assert!(db.delete_job(job.id).unwrap().is_none());
    }

    #[test]
    fn test_deleting_unattributed_receipt_leaves_jobs() {
        let db = Database::in_memory().unwrap();
        db.create_job("Attic").unwrap();
        let loose = db.create_receipt(&receipt_for(None, day(1))).unwrap();

        db.delete_receipt(loose.id).unwrap();
        assert_eq!(db.list_jobs().unwrap().len(), 1);
    }

    #[test]
    fn test_list_items_with_context() {
        let db = Database::in_memory().unwrap();
        let job = db.create_job("Shed").unwrap();
        let receipt = db.create_receipt(&receipt_for(Some(job.id), day(2))).unwrap();
        db.add_line_item(
            receipt.id,
            &NewLineItem::new("Shingles", day(2), 90.0).with_quantity(3),
        )
        .unwrap();
        let loose = db.create_receipt(&receipt_for(None, day(1))).unwrap();
        db.add_line_item(loose.id, &NewLineItem::new("Nails", day(1), 6.0))
            .unwrap();

        let items = db.list_items().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].item_name, "Shingles");
        assert_eq!(items[0].job_name.as_deref(), Some("Shed"));
        assert_eq!(items[0].store_location.as_deref(), Some("Home Depot #123"));
        assert_eq!(items[0].unit_price, 30.0);
        assert_eq!(items[1].job_name, None);
    }

    #[test]
    fn test_count_file_references() {
        let db = Database::in_memory().unwrap();
        let job = db.create_job("Porch").unwrap();
        let mut shared = receipt_for(Some(job.id), day(3));
        shared.file_path = Some("1700000000000-42.csv".to_string());
        shared.file_type = Some("text/csv".to_string());

        let first = db.create_receipt(&shared).unwrap();
        db.create_receipt(&shared).unwrap();
        assert_eq!(db.count_file_references("1700000000000-42.csv").unwrap(), 2);

        db.delete_receipt(first.id).unwrap();
        assert_eq!(db.count_file_references("1700000000000-42.csv").unwrap(), 1);
        assert_eq!(db.count_file_references("missing.png").unwrap(), 0);
    }
}
