//! Tally CLI - Receipt and expense tracker
//!
//! Usage:
//!   tally init                          Initialize database
//!   tally import --file order.csv ...   Import line items from CSV
//!   tally history "Deck Screws"         Unit price history for an item
//!   tally serve --port 3000             Start web server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db),
        Commands::Serve {
            port,
            host,
            static_dir,
            uploads_dir,
        } => {
            let aliases = commands::load_aliases(cli.aliases.as_deref())?;
            commands::cmd_serve(
                &cli.db,
                &host,
                port,
                static_dir.as_deref(),
                uploads_dir,
                aliases,
            )
            .await
        }
        Commands::Jobs { action } => {
            let db = commands::open_db(&cli.db)?;
            match action {
                None => commands::cmd_jobs_list(&db, None),
                Some(JobsAction::List { search }) => commands::cmd_jobs_list(&db, search.as_deref()),
                Some(JobsAction::Add { name }) => commands::cmd_jobs_add(&db, &name),
                Some(JobsAction::Rename { job, name }) => {
                    commands::cmd_jobs_rename(&db, &job, &name)
                }
                Some(JobsAction::Delete {
                    job,
                    uploads_dir,
                    yes,
                }) => commands::cmd_jobs_delete(&db, &job, uploads_dir, yes),
            }
        }
        Commands::Receipts { action } => {
            let db = commands::open_db(&cli.db)?;
            match action {
                None => commands::cmd_receipts_list(&db, None, None),
                Some(ReceiptsAction::List { job, search }) => {
                    commands::cmd_receipts_list(&db, job.as_deref(), search)
                }
                Some(ReceiptsAction::Show { id }) => commands::cmd_receipts_show(&db, id),
            }
        }
        Commands::Import(args) => {
            let db = commands::open_db(&cli.db)?;
            let aliases = commands::load_aliases(cli.aliases.as_deref())?;
            commands::cmd_import(&db, &aliases, &args)
        }
        Commands::Preview {
            file,
            header_row,
            kind,
        } => {
            let aliases = commands::load_aliases(cli.aliases.as_deref())?;
            commands::cmd_preview(&file, header_row, &kind, &aliases)
        }
        Commands::Export { export_type } => {
            let db = commands::open_db(&cli.db)?;
            match export_type {
                ExportType::Receipts { output } => commands::cmd_export_receipts(&db, output),
                ExportType::Items { output } => commands::cmd_export_items(&db, output),
            }
        }
        Commands::History {
            item,
            chart,
            width,
            height,
        } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_history(&db, &item, chart.as_deref(), width, height)
        }
    }
}
