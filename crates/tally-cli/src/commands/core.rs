//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `load_aliases` - CSV column alias table with the user's additions
//! - `uploads_dir` - Where uploaded receipt files live
//! - `cmd_init` - Initialize the database

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tally_core::db::Database;
use tally_core::import::FieldAliases;

/// Default upload directory when neither a flag nor TALLY_UPLOADS_DIR is set
pub const DEFAULT_UPLOADS_DIR: &str = "uploads";

/// Open the database, applying any pending migrations
pub fn open_db(db_path: &Path) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path must be valid UTF-8")?;
    Database::new(path_str).context("Failed to open database")
}

/// Built-in column aliases plus an explicit or per-user override file
pub fn load_aliases(path: Option<&Path>) -> Result<FieldAliases> {
    FieldAliases::load(path).context("Failed to load column aliases")
}

/// Upload directory: --uploads-dir, then TALLY_UPLOADS_DIR, then ./uploads
pub fn uploads_dir(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| {
        std::env::var("TALLY_UPLOADS_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
    })
    .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOADS_DIR))
}

pub fn cmd_init(db_path: &Path) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path)?;
    let version = db.schema_version().context("Failed to read schema version")?;
    println!("   Schema version: {}", version);

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Create a job: tally jobs add \"Back Deck\"");
    println!("  2. Import a store export: tally import --file order.csv");
    println!("  3. Start web UI: tally serve");

    Ok(())
}
