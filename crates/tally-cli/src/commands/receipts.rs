//! Receipt listing commands

use anyhow::{anyhow, Result};
use tally_core::db::Database;
use tally_core::view::ReceiptView;

use super::{find_job, money, truncate};

/// List receipts, optionally for one job and matching a search
pub fn cmd_receipts_list(db: &Database, job: Option<&str>, search: Option<String>) -> Result<()> {
    let job_id = job.map(|j| find_job(db, j)).transpose()?.map(|j| j.id);
    let view = ReceiptView { job_id, search };

    let receipts = match job_id {
        Some(id) => db.list_receipts_for_job(id)?,
        None => db.list_receipts()?,
    };
    let receipts = view.apply(&receipts);

    if receipts.is_empty() {
        println!("No receipts found");
        return Ok(());
    }

    println!("\n🧾 Receipts ({})", receipts.len());
    println!("{}", "─".repeat(78));

    for receipt in &receipts {
        let store = receipt.store_location.as_deref().unwrap_or("Unknown store");
        let job = receipt.job_name.as_deref().unwrap_or("(no job)");

        println!(
            "  #{:<5} {}  {:<24} {:<20} {:>3} items {:>11}",
            receipt.id,
            receipt.receipt_date,
            truncate(store, 24),
            truncate(job, 20),
            receipt.items.len(),
            money(receipt.total())
        );
    }

    println!();
    Ok(())
}

/// Show one receipt with its line items
pub fn cmd_receipts_show(db: &Database, id: i64) -> Result<()> {
    let receipt = db
        .get_receipt(id)?
        .ok_or_else(|| anyhow!("Receipt not found: {}", id))?;

    println!("\n🧾 Receipt #{}", receipt.id);
    println!("{}", "─".repeat(60));
    println!(
        "  Job:    {}",
        receipt.job_name.as_deref().unwrap_or("(no job)")
    );
    println!(
        "  Store:  {}",
        receipt.store_location.as_deref().unwrap_or("Unknown")
    );
    println!("  Date:   {}", receipt.receipt_date);
    if let Some(notes) = &receipt.notes {
        println!("  Notes:  {}", notes);
    }
    if let Some(path) = &receipt.file_path {
        println!(
            "  File:   {} ({})",
            path,
            receipt.file_type.as_deref().unwrap_or("unknown type")
        );
    }

    if receipt.items.is_empty() {
        println!("\n  No line items");
    } else {
        println!();
        println!(
            "  {:<32} {:>5} {:>11} {:>11}",
            "Item", "Qty", "Unit", "Amount"
        );
        for item in &receipt.items {
            println!(
                "  {:<32} {:>5} {:>11} {:>11}",
                truncate(&item.item_name, 32),
                item.quantity,
                money(item.unit_price()),
                money(item.amount)
            );
        }
        println!("  {:>62}", format!("Total: {}", money(receipt.total())));
    }

    println!();
    Ok(())
}
