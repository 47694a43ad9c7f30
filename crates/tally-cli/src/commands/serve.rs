//! Server command implementation

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tally_core::import::FieldAliases;

use super::{open_db, uploads_dir};

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    static_dir: Option<&Path>,
    uploads: Option<PathBuf>,
    aliases: FieldAliases,
) -> Result<()> {
    let uploads = uploads_dir(uploads);

    // Parse CORS origins from environment (comma-separated)
    let allowed_origins = tally_server::parse_allowed_origins(
        &std::env::var("TALLY_ALLOWED_ORIGINS").unwrap_or_default(),
    );

    println!("🚀 Starting Tally web server...");
    println!("   Database: {}", db_path.display());
    println!("   Uploads: {}", uploads.display());
    println!("   Listening: http://{}:{}", host, port);
    if let Some(dir) = static_dir {
        println!("   Static files: {}", dir.display());
    }
    if !allowed_origins.is_empty() {
        println!(
            "   🌐 CORS origins: {} (TALLY_ALLOWED_ORIGINS)",
            allowed_origins.join(", ")
        );
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path)?;

    let config = tally_server::ServerConfig {
        allowed_origins,
        uploads_dir: uploads,
        aliases,
    };

    let static_dir_str = static_dir
        .map(|p| p.to_str().context("static_dir path must be valid UTF-8"))
        .transpose()?;
    tally_server::serve_with_config(db, host, port, static_dir_str, config).await?;

    Ok(())
}
