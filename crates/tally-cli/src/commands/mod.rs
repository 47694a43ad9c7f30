//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, load_aliases, uploads_dir)
//! - `export` - Receipts and items CSV export
//! - `history` - Item price history and chart output
//! - `import` - CSV preview and import
//! - `jobs` - Job management commands
//! - `receipts` - Receipt listing commands
//! - `serve` - Web server command

pub mod core;
pub mod export;
pub mod history;
pub mod import;
pub mod jobs;
pub mod receipts;
pub mod serve;

// Re-export command functions for main.rs
pub use self::core::*;
pub use export::*;
pub use history::*;
pub use import::*;
pub use jobs::*;
pub use receipts::*;
pub use serve::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Format an amount as dollars
pub fn money(amount: f64) -> String {
    format!("${:.2}", amount)
}
