//! CSV export commands

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tally_core::db::Database;

pub fn cmd_export_receipts(db: &Database, output: Option<PathBuf>) -> Result<()> {
    let csv = db.export_receipts_csv()?;
    write_output(&csv, output, "receipts")
}

pub fn cmd_export_items(db: &Database, output: Option<PathBuf>) -> Result<()> {
    let csv = db.export_items_csv()?;
    write_output(&csv, output, "items")
}

fn write_output(csv: &str, output: Option<PathBuf>, noun: &str) -> Result<()> {
    match output {
        Some(path) => {
            let mut file = File::create(&path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            file.write_all(csv.as_bytes())?;

            let lines = csv.lines().count().saturating_sub(1); // Subtract header
            println!("✅ Exported {} {} to {}", lines, noun, path.display());
        }
        None => {
            // Write to stdout
            print!("{}", csv);
        }
    }
    Ok(())
}
