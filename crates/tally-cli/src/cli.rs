//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Tally - Track receipts and what things cost per job
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Self-hosted receipt and expense tracker", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "tally.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Extra CSV column aliases (TOML). Defaults to the per-user aliases.toml if present.
    #[arg(long, global = true)]
    pub aliases: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Directory containing static files to serve (e.g., ui/dist)
        #[arg(long)]
        static_dir: Option<PathBuf>,

        /// Directory for uploaded receipt files (default: $TALLY_UPLOADS_DIR or ./uploads)
        #[arg(long)]
        uploads_dir: Option<PathBuf>,
    },

    /// Manage jobs
    Jobs {
        #[command(subcommand)]
        action: Option<JobsAction>,
    },

    /// Browse receipts
    Receipts {
        #[command(subcommand)]
        action: Option<ReceiptsAction>,
    },

    /// Import line items or receipts from CSV
    Import(ImportArgs),

    /// Show the headers, suggested mapping and first rows of a CSV file
    Preview {
        /// CSV file to inspect
        #[arg(short, long)]
        file: PathBuf,

        /// Line holding the column headers (1-based)
        #[arg(long, default_value = "1")]
        header_row: usize,

        /// Record type: items or receipts
        #[arg(short, long, default_value = "items")]
        kind: String,
    },

    /// Export data to CSV
    Export {
        #[command(subcommand)]
        export_type: ExportType,
    },

    /// Show the unit price history of an item
    History {
        /// Item name (case-insensitive)
        item: String,

        /// Write the price chart to an SVG file
        #[arg(long)]
        chart: Option<PathBuf>,

        /// Chart width in pixels
        #[arg(long, default_value = "640")]
        width: u32,

        /// Chart height in pixels
        #[arg(long, default_value = "320")]
        height: u32,
    },
}

#[derive(Subcommand)]
pub enum JobsAction {
    /// List jobs with receipt counts and totals
    List {
        /// Only jobs whose name contains this text
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Create a job
    Add {
        /// Job name (must be unique)
        name: String,
    },

    /// Rename a job
    Rename {
        /// Job ID or current name
        job: String,

        /// New name
        name: String,
    },

    /// Delete a job with all its receipts and line items
    Delete {
        /// Job ID or name
        job: String,

        /// Also remove uploaded files no other receipt uses
        #[arg(long)]
        uploads_dir: Option<PathBuf>,

        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum ReceiptsAction {
    /// List receipts
    List {
        /// Only receipts for this job (ID or name)
        #[arg(short, long)]
        job: Option<String>,

        /// Match store, date or receipt ID
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show one receipt with its line items
    Show {
        /// Receipt ID
        id: i64,
    },
}

/// Options for `tally import`
#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    /// CSV file to import
    #[arg(short, long)]
    pub file: PathBuf,

    /// Line holding the column headers (1-based)
    #[arg(long, default_value = "1")]
    pub header_row: usize,

    /// Record type: items or receipts
    #[arg(short, long, default_value = "items")]
    pub kind: String,

    /// Map a field to a column: field=Column (header text or 1-based number).
    /// Leave the column empty to skip a suggested field. Repeatable.
    #[arg(short, long = "map", value_name = "FIELD=COLUMN")]
    pub mappings: Vec<String>,

    /// Column holding unit prices; amounts become unit price × quantity
    #[arg(long, value_name = "COLUMN")]
    pub unit_price: Option<String>,

    /// Put every row on one receipt for this job (created if new)
    #[arg(long)]
    pub job: Option<String>,

    /// Store for the single receipt
    #[arg(long)]
    pub store: Option<String>,

    /// Date of the single receipt (default: today)
    #[arg(long)]
    pub date: Option<String>,

    /// Notes for the single receipt
    #[arg(long)]
    pub notes: Option<String>,

    /// Keep rows with the same item name as separate line items
    #[arg(long)]
    pub no_merge: bool,

    /// Show what would be imported without writing anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand)]
pub enum ExportType {
    /// Export receipts to CSV
    Receipts {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export line items to CSV
    Items {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
