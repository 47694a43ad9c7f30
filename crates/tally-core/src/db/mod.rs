//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `migrations` - Ordered, versioned schema changes
//! - `jobs` - Job CRUD and roll-ups
//! - `receipts` - Receipt CRUD (items loaded alongside)
//! - `items` - Line item CRUD and the combined items view

use chrono::{DateTime, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::{debug, warn};

use crate::error::Result;
use crate::import::parse_date;

mod items;
mod jobs;
mod migrations;
mod receipts;

#[cfg(test)]
mod tests;

pub use migrations::LATEST_VERSION;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Read a DATE column stored as "YYYY-MM-DD"
///
/// Older databases hold whatever text the CSV carried; those values go
/// through the import date parser, and anything unreadable reads as
/// 1970-01-01 instead of failing the whole query.
pub(crate) fn date_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let s: String = row.get(idx)?;
    if let Ok(date) = NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
        return Ok(date);
    }
    Ok(parse_date(&s).unwrap_or_else(|| {
        warn!(value = %s, "Unreadable stored date");
        NaiveDate::default()
    }))
}

/// Normalize optional free text: trimmed, empty becomes None
pub(crate) fn clean_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Open (or create) the database at `path` and bring its schema up to date
    pub fn new(path: &str) -> Result<Self> {
        // Foreign keys are per-connection in SQLite, so every pooled
        // connection gets them enabled on checkout
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")?;
            Ok(())
        });

        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` so every pooled
    /// connection sees the same data.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "tally_test_{}_{}.db",
            std::process::id(),
            id
        ));

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new(&path.to_string_lossy())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Highest migration version applied to this database
    pub fn schema_version(&self) -> Result<i64> {
        let conn = self.conn()?;
        migrations::current_version(&conn)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let mut conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode: readers don't block writers
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            "#,
        )?;

        let applied = migrations::run(&mut conn)?;
        if applied > 0 {
            debug!(applied, path = %self.db_path, "Applied schema migrations");
        }
        Ok(())
    }
}
