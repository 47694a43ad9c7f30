//! Database schema migrations.
//!
//! Migrations form an ordered list. Each one runs at most once, inside a
//! transaction that also records its version in `schema_migrations`.
//! Databases created by earlier releases (no `schema_migrations` table) start
//! at version 0, so every step is written to adopt an existing schema.

use rusqlite::{params, Connection, Transaction};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::import::parse_date;

/// A single schema change
struct Migration {
    /// The version this migration brings the database to
    version: i64,
    name: &'static str,
    apply: fn(&Transaction) -> Result<()>,
}

/// All migrations in order
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_core_tables",
        apply: create_core_tables,
    },
    Migration {
        version: 2,
        name: "line_items_quantity",
        apply: add_line_item_quantity,
    },
    Migration {
        version: 3,
        name: "receipts_job_id",
        apply: add_receipt_job_id,
    },
    Migration {
        version: 4,
        name: "backfill_jobs_from_names",
        apply: backfill_jobs,
    },
    Migration {
        version: 5,
        name: "indexes",
        apply: create_indexes,
    },
    Migration {
        version: 6,
        name: "normalize_legacy_dates",
        apply: normalize_legacy_dates,
    },
];

/// Version of the newest migration
pub const LATEST_VERSION: i64 = 6;

/// Apply every pending migration, returning how many ran
pub(crate) fn run(conn: &mut Connection) -> Result<usize> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
    )?;

    let current = current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        debug!(
            "Running migration {:02} ({})",
            migration.version, migration.name
        );

        let tx = conn.transaction()?;
        (migration.apply)(&tx)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?, ?)",
            params![migration.version, migration.name],
        )?;
        tx.commit()?;

        applied += 1;
    }

    Ok(applied)
}

pub(crate) fn current_version(conn: &Connection) -> Result<i64> {
    let version: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        })?;
    Ok(version.unwrap_or(0))
}

fn has_column(tx: &Transaction, table: &str, column: &str) -> Result<bool> {
    let count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?",
        params![table, column],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn create_core_tables(tx: &Transaction) -> Result<()> {
    tx.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- job_name is the free-text job from before jobs had their own table;
        -- it is only read by the backfill step
        CREATE TABLE IF NOT EXISTS receipts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id INTEGER REFERENCES jobs(id) ON DELETE SET NULL,
            job_name TEXT,
            store_location TEXT,
            receipt_date DATE NOT NULL,
            notes TEXT,
            file_path TEXT,
            file_type TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS line_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            receipt_id INTEGER NOT NULL REFERENCES receipts(id) ON DELETE CASCADE,
            item_name TEXT NOT NULL,
            purchase_date DATE NOT NULL,
            amount DECIMAL(10,2) NOT NULL,
            quantity INTEGER DEFAULT 1
        );
        "#,
    )?;
    Ok(())
}

fn add_line_item_quantity(tx: &Transaction) -> Result<()> {
    if !has_column(tx, "line_items", "quantity")? {
        tx.execute_batch("ALTER TABLE line_items ADD COLUMN quantity INTEGER DEFAULT 1")?;
        info!("Added quantity column to line_items");
    }
    Ok(())
}

fn add_receipt_job_id(tx: &Transaction) -> Result<()> {
    if !has_column(tx, "receipts", "job_id")? {
        tx.execute_batch(
            "ALTER TABLE receipts ADD COLUMN job_id INTEGER REFERENCES jobs(id) ON DELETE SET NULL",
        )?;
        info!("Added job_id column to receipts");
    }
    Ok(())
}

/// Create a job for every distinct legacy job name and link its receipts
fn backfill_jobs(tx: &Transaction) -> Result<()> {
    if !has_column(tx, "receipts", "job_name")? {
        return Ok(());
    }

    let names: Vec<String> = {
        let mut stmt = tx.prepare(
            "SELECT DISTINCT TRIM(job_name) FROM receipts
             WHERE job_id IS NULL AND job_name IS NOT NULL AND TRIM(job_name) != ''",
        )?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()?
    };

    for name in &names {
        tx.execute(
            "INSERT OR IGNORE INTO jobs (name) VALUES (?)",
            params![name],
        )?;
        tx.execute(
            "UPDATE receipts SET job_id = (SELECT id FROM jobs WHERE name = ?1)
             WHERE TRIM(job_name) = ?1 AND job_id IS NULL",
            params![name],
        )?;
    }

    if !names.is_empty() {
        info!("Backfilled {} job(s) from legacy receipt job names", names.len());
    }
    Ok(())
}

fn create_indexes(tx: &Transaction) -> Result<()> {
    tx.execute_batch(
        r#"
        CREATE INDEX IF NOT EXISTS idx_receipts_job ON receipts(job_id);
        CREATE INDEX IF NOT EXISTS idx_receipts_date ON receipts(receipt_date);
        CREATE INDEX IF NOT EXISTS idx_line_items_receipt ON line_items(receipt_id);
        CREATE INDEX IF NOT EXISTS idx_line_items_name ON line_items(item_name COLLATE NOCASE);
        "#,
    )?;
    Ok(())
}

/// Rewrite dates stored as raw CSV text (`03/07/2024`, timestamps) as
/// `YYYY-MM-DD`. Values no format recognizes are left alone.
fn normalize_legacy_dates(tx: &Transaction) -> Result<()> {
    let receipts = normalize_date_column(tx, "receipts", "receipt_date")?;
    let items = normalize_date_column(tx, "line_items", "purchase_date")?;
    if receipts + items > 0 {
        info!(receipts, items, "Normalized legacy dates");
    }
    Ok(())
}

fn normalize_date_column(tx: &Transaction, table: &str, column: &str) -> Result<usize> {
    let rows: Vec<(i64, String)> = {
        let mut stmt = tx.prepare(&format!(
            "SELECT id, CAST({column} AS TEXT) FROM {table}
             WHERE {column} NOT GLOB '[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]'"
        ))?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()?
    };

    let mut fixed = 0;
    for (id, raw) in &rows {
        match parse_date(raw) {
            Some(date) => {
                tx.execute(
                    &format!("UPDATE {table} SET {column} = ? WHERE id = ?"),
                    params![date.format("%Y-%m-%d").to_string(), id],
                )?;
                fixed += 1;
            }
            None => warn!(table, id, value = %raw, "Unrecognized legacy date left as is"),
        }
    }
    Ok(fixed)
}
