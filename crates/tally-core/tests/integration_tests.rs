//! Integration tests for tally-core
//!
//! These tests exercise the full upload → import → history → cleanup workflow.

use chrono::NaiveDate;
use tally_core::{
    db::Database,
    execute_plan,
    history::{PriceDirection, PriceHistory},
    import::{CsvDocument, FieldAliases, ImportKind, ImportRequest, ReceiptHeader, TargetField},
    plan_import,
    storage::UploadStore,
    view::{ItemSort, ItemView, SortDirection},
};
use tempfile::TempDir;

/// A vendor export with a title row above the headers, a duplicated item
/// and a unit price column instead of line totals
fn vendor_export() -> &'static str {
    "Acme Building Supply - Order History\n\
     SKU,Description,Qty,Unit Price,Date,Job,Store\n\
     1001,Deck Screws 5lb,1,$29.98,03/02/2024,Back Deck,Acme #12\n\
     2040,Joist Hanger,12,$1.48,03/02/2024,Back Deck,Acme #12\n\
     1001,deck screws 5LB,2,$29.98,03/02/2024,Back Deck,Acme #12\n\
     1001,Deck Screws 5lb,1,$32.49,04/15/2024,Back Deck,Acme #12\n\
     3300,Post Cap,4,$6.25,04/15/2024,Fence,Acme #7\n"
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

fn unit_price_request(headers: &[String]) -> ImportRequest {
    let mapping = FieldAliases::default().suggest_mapping(headers, ImportKind::Items);
    let mut request = ImportRequest::new(ImportKind::Items, mapping);
    request.header_row = 2;
    request.calculate_unit_price = false;
    request
}

// =============================================================================
// Import Integration Tests
// =============================================================================

#[test]
fn test_grouped_import_workflow() {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let dir = TempDir::new().unwrap();
    let uploads = UploadStore::new(dir.path()).unwrap();

    let stored = uploads
        .store("order-history.csv", "text/csv", vendor_export().as_bytes())
        .expect("Failed to store upload");

    let parsed = CsvDocument::parse(vendor_export())
        .with_header_row(2)
        .expect("Failed to select header row");
    assert_eq!(parsed.headers[1], "Description");

    let request = unit_price_request(&parsed.headers);
    assert_eq!(request.mapping.get(TargetField::UnitPrice), Some(3));

    let plan = plan_import(&parsed, &request, today()).expect("Failed to plan import");
    assert_eq!(plan.receipts.len(), 3);
    assert_eq!(plan.merged_rows, 1);

    let summary = execute_plan(&db, &plan, Some(&stored));
    assert_eq!(summary.imported, 4);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.receipts_created, 3);

    let jobs = db.list_jobs().unwrap();
    assert_eq!(jobs.len(), 2);
    let deck = jobs.iter().find(|j| j.job.name == "Back Deck").unwrap();
    assert_eq!(deck.receipt_count, 2);
    // 3 × 29.98 + 12 × 1.48 + 32.49
    assert_eq!(deck.total_amount, 140.19);

    // Every grouped receipt references the same upload
    assert_eq!(db.count_file_references(&stored.file_path).unwrap(), 3);

    let receipts = db.list_receipts_for_job(deck.job.id).unwrap();
    let march = receipts
        .iter()
        .find(|r| r.receipt_date == NaiveDate::from_ymd_opt(2024, 3, 2).unwrap())
        .unwrap();
    assert_eq!(march.items.len(), 2);
    let screws = march
        .items
        .iter()
        .find(|i| i.item_name == "Deck Screws 5lb")
        .unwrap();
    assert_eq!(screws.quantity, 3);
    assert_eq!(screws.amount, 89.94);
}

#[test]
fn test_single_receipt_import_into_existing_job() {
    let db = Database::in_memory().unwrap();
    let job = db.create_job("Bathroom").unwrap();

    let text = "Item,Qty,Total\nTile,10,$45.00\nThinset,1,$18.50\ntile,5,$22.50\n";
    let parsed = CsvDocument::parse(text).with_header_row(1).unwrap();
    let mapping = FieldAliases::default().suggest_mapping(&parsed.headers, ImportKind::Items);
    let mut request = ImportRequest::new(ImportKind::Items, mapping);
    request.single_receipt = Some(ReceiptHeader {
        job_id: Some(job.id),
        job_name: None,
        store_location: Some("Floor & Decor".to_string()),
        receipt_date: NaiveDate::from_ymd_opt(2024, 5, 20).unwrap(),
        notes: None,
    });

    let plan = plan_import(&parsed, &request, today()).unwrap();
    let summary = execute_plan(&db, &plan, None);
    assert_eq!(summary.imported, 2);
    assert_eq!(summary.merged_rows, 1);

    let receipts = db.list_receipts_for_job(job.id).unwrap();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].total(), 86.0);
    assert_eq!(receipts[0].store_location.as_deref(), Some("Floor & Decor"));
    assert!(receipts[0]
        .items
        .iter()
        .all(|i| i.purchase_date == NaiveDate::from_ymd_opt(2024, 5, 20).unwrap()));
}

#[test]
fn test_invalid_mapping_writes_nothing() {
    let db = Database::in_memory().unwrap();
    let parsed = CsvDocument::parse(vendor_export()).with_header_row(2).unwrap();

    // Amount required once the unit price column is turned off
    let mut request = unit_price_request(&parsed.headers);
    request.calculate_unit_price = true;
    assert!(plan_import(&parsed, &request, today()).is_err());

    assert!(db.list_jobs().unwrap().is_empty());
    assert!(db.list_receipts().unwrap().is_empty());
}

// =============================================================================
// Price History Integration Tests
// =============================================================================

#[test]
fn test_price_history_from_imported_items() {
    let db = Database::in_memory().unwrap();
    let parsed = CsvDocument::parse(vendor_export()).with_header_row(2).unwrap();
    let plan = plan_import(&parsed, &unit_price_request(&parsed.headers), today()).unwrap();
    execute_plan(&db, &plan, None);

    let items = db.list_items().unwrap();
    let history = PriceHistory::for_item(&items, "DECK SCREWS 5LB").expect("history");
    assert_eq!(history.count, 2);
    assert_eq!(history.first, 29.98);
    assert_eq!(history.last, 32.49);
    assert_eq!(history.change, 2.51);
    assert_eq!(history.change_percent, 8.4);
    assert_eq!(history.direction, PriceDirection::Up);

    let svg = tally_core::price_chart_svg(&history, 600, 300);
    assert!(svg.contains("<polyline"));
    assert!(svg.contains("Mar 2"));
    assert!(svg.contains("Apr 15"));

    let by_price = ItemView {
        search: Some("acme #12".to_string()),
        sort: ItemSort::UnitPrice,
        dir: SortDirection::Desc,
    }
    .apply(&items);
    assert_eq!(by_price.len(), 3);
    assert_eq!(by_price[0].item_name, "Deck Screws 5lb");
    assert_eq!(by_price[0].unit_price, 32.49);
}

// =============================================================================
// Cleanup Integration Tests
// =============================================================================

#[test]
fn test_delete_job_releases_files() {
    let db = Database::in_memory().unwrap();
    let dir = TempDir::new().unwrap();
    let uploads = UploadStore::new(dir.path()).unwrap();
    let stored = uploads
        .store("order.csv", "text/csv", vendor_export().as_bytes())
        .unwrap();

    let parsed = CsvDocument::parse(vendor_export()).with_header_row(2).unwrap();
    let plan = plan_import(&parsed, &unit_price_request(&parsed.headers), today()).unwrap();
    execute_plan(&db, &plan, Some(&stored));

    let deck = db.get_job_by_name("Back Deck").unwrap().unwrap();
    let deleted = db.delete_job(deck.id).unwrap().unwrap();
    assert_eq!(deleted.receipts_deleted, 2);

    // The Fence receipt still uses the upload, so it has to stay
    for path in &deleted.file_paths {
        if db.count_file_references(path).unwrap() == 0 {
            uploads.remove_quietly(path);
        }
    }
    assert!(uploads.exists(&stored.file_path));

    let fence = db.get_job_by_name("Fence").unwrap().unwrap();
    let deleted = db.delete_job(fence.id).unwrap().unwrap();
    for path in &deleted.file_paths {
        if db.count_file_references(path).unwrap() == 0 {
            uploads.remove_quietly(path);
        }
    }
    assert!(!uploads.exists(&stored.file_path));
    assert!(db.list_items().unwrap().is_empty());
}
