//! Job management commands

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use tally_core::db::Database;
use tally_core::models::Job;
use tally_core::storage::UploadStore;
use tally_core::view::ReceiptView;
use tracing::warn;

use super::{money, truncate, uploads_dir};

/// Find a job by numeric ID or exact name
pub fn find_job(db: &Database, name_or_id: &str) -> Result<Job> {
    if let Ok(id) = name_or_id.trim().parse::<i64>() {
        if let Some(job) = db.get_job(id)? {
            return Ok(job);
        }
    }
    db.get_job_by_name(name_or_id)?
        .ok_or_else(|| anyhow!("Job not found: {}", name_or_id))
}

pub fn cmd_jobs_list(db: &Database, search: Option<&str>) -> Result<()> {
    let view = ReceiptView {
        job_id: None,
        search: search.map(str::to_string),
    };
    let jobs = view.filter_jobs(&db.list_jobs()?);

    if jobs.is_empty() {
        println!("No jobs found. Create one with: tally jobs add \"Job name\"");
        return Ok(());
    }

    println!("\n📁 Jobs ({})", jobs.len());
    println!("{}", "─".repeat(60));
    for summary in &jobs {
        println!(
            "  #{:<5} {:<30} {:>4} receipts {:>12}",
            summary.job.id,
            truncate(&summary.job.name, 30),
            summary.receipt_count,
            money(summary.total_amount)
        );
    }
    println!();

    Ok(())
}

pub fn cmd_jobs_add(db: &Database, name: &str) -> Result<()> {
    let job = db.create_job(name)?;
    println!("✅ Created job '{}' (ID: {})", job.name, job.id);
    Ok(())
}

pub fn cmd_jobs_rename(db: &Database, name_or_id: &str, new_name: &str) -> Result<()> {
    let job = find_job(db, name_or_id)?;
    let renamed = db
        .update_job(job.id, new_name)?
        .ok_or_else(|| anyhow!("Job not found: {}", name_or_id))?;
    println!("✅ Renamed job '{}' to '{}'", job.name, renamed.name);
    Ok(())
}

pub fn cmd_jobs_delete(
    db: &Database,
    name_or_id: &str,
    uploads: Option<PathBuf>,
    yes: bool,
) -> Result<()> {
    let job = find_job(db, name_or_id)?;

    if !yes {
        let receipts = db.list_receipts_for_job(job.id)?.len();
        print!(
            "⚠️  This will delete job '{}' with {} receipt(s) and their line items.\n\n",
            job.name, receipts
        );
        print!("Are you sure? [y/N] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let deleted = db
        .delete_job(job.id)?
        .ok_or_else(|| anyhow!("Job not found: {}", name_or_id))?;

    println!(
        "✅ Deleted job '{}' and {} receipt(s)",
        deleted.job.name, deleted.receipts_deleted
    );

    if deleted.file_paths.is_empty() {
        return Ok(());
    }

    let dir = uploads_dir(uploads);
    if !dir.is_dir() {
        println!(
            "   {} uploaded file(s) left in place ({} not found)",
            deleted.file_paths.len(),
            dir.display()
        );
        return Ok(());
    }

    let store = UploadStore::new(&dir)?;
    let mut removed = 0;
    for path in &deleted.file_paths {
        if db.count_file_references(path)? > 0 {
            continue;
        }
        match store.delete(path) {
            Ok(true) => removed += 1,
            Ok(false) => {}
            Err(e) => warn!(file = %path, error = %e, "Failed to delete upload"),
        }
    }
    println!("   Removed {} uploaded file(s) from {}", removed, dir.display());

    Ok(())
}
