//! Job operations

use rusqlite::{params, OptionalExtension};
use tracing::info;

use super::{clean_text, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::*;

impl Database {
    /// List jobs with receipt counts and spend, most recently touched first
    pub fn list_jobs(&self) -> Result<Vec<JobSummary>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT j.id, j.name, j.created_at, j.updated_at,
                    COUNT(r.id) AS receipt_count,
                    COALESCE(SUM((SELECT COALESCE(SUM(li.amount), 0)
                                  FROM line_items li WHERE li.receipt_id = r.id)), 0) AS total_amount
             FROM jobs j
             LEFT JOIN receipts r ON r.job_id = j.id
             GROUP BY j.id
             ORDER BY j.updated_at DESC, j.id DESC",
        )?;

        let jobs = stmt
            .query_map([], |row| {
                let total: f64 = row.get(5)?;
                Ok(JobSummary {
                    job: Self::row_to_job(row)?,
                    receipt_count: row.get(4)?,
                    total_amount: round_cents(total),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(jobs)
    }

    /// Get job by ID
    pub fn get_job(&self, id: i64) -> Result<Option<Job>> {
        let conn = self.conn()?;
        let job = conn
            .query_row(
                "SELECT id, name, created_at, updated_at FROM jobs WHERE id = ?",
                params![id],
                Self::row_to_job,
            )
            .optional()?;
        Ok(job)
    }

    /// Get job by exact name
    pub fn get_job_by_name(&self, name: &str) -> Result<Option<Job>> {
        let conn = self.conn()?;
        let job = conn
            .query_row(
                "SELECT id, name, created_at, updated_at FROM jobs WHERE name = ?",
                params![name.trim()],
                Self::row_to_job,
            )
            .optional()?;
        Ok(job)
    }

    /// Create a job; names are unique
    pub fn create_job(&self, name: &str) -> Result<Job> {
        let name = clean_text(Some(name))
            .ok_or_else(|| Error::InvalidData("Job name is required".to_string()))?;

        if self.get_job_by_name(&name)?.is_some() {
            return Err(Error::Conflict(format!("Job '{}' already exists", name)));
        }

        let id = {
            let conn = self.conn()?;
            conn.execute("INSERT INTO jobs (name) VALUES (?)", params![name])?;
            conn.last_insert_rowid()
        };

        self.get_job(id)?
            .ok_or_else(|| Error::NotFound(format!("Job {} after insert", id)))
    }

    /// Find a job by name, creating it on first use
    pub fn get_or_create_job(&self, name: &str) -> Result<Job> {
        let name = clean_text(Some(name))
            .ok_or_else(|| Error::InvalidData("Job name is required".to_string()))?;

        {
            let conn = self.conn()?;
            conn.execute("INSERT OR IGNORE INTO jobs (name) VALUES (?)", params![name])?;
        }

        self.get_job_by_name(&name)?
            .ok_or_else(|| Error::NotFound(format!("Job '{}'", name)))
    }

    /// Rename a job. Returns None when the job does not exist.
    pub fn update_job(&self, id: i64, name: &str) -> Result<Option<Job>> {
        let name = clean_text(Some(name))
            .ok_or_else(|| Error::InvalidData("Job name is required".to_string()))?;

        if self.get_job(id)?.is_none() {
            return Ok(None);
        }
        if let Some(other) = self.get_job_by_name(&name)? {
            if other.id != id {
                return Err(Error::Conflict(format!("Job '{}' already exists", name)));
            }
        }

        {
            let conn = self.conn()?;
            conn.execute(
                "UPDATE jobs SET name = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
                params![name, id],
            )?;
        }

        self.get_job(id)
    }

    /// Mark a job as recently used so it sorts to the top of the list
    pub(crate) fn touch_job(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE jobs SET updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            params![id],
        )?;
        Ok(())
    }

    /// Delete a job and its receipts; line items go with them via cascade.
    ///
    /// The returned file paths belong to the deleted receipts and are for
    /// the caller to remove from upload storage.
    pub fn delete_job(&self, id: i64) -> Result<Option<DeletedJob>> {
        let Some(job) = self.get_job(id)? else {
            return Ok(None);
        };

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let file_paths: Vec<String> = {
            let mut stmt = tx.prepare(
                "SELECT file_path FROM receipts WHERE job_id = ? AND file_path IS NOT NULL",
            )?;
            let rows = stmt.query_map(params![id], |row| row.get(0))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        let receipts_deleted = tx.execute("DELETE FROM receipts WHERE job_id = ?", params![id])?;
        tx.execute("DELETE FROM jobs WHERE id = ?", params![id])?;
        tx.commit()?;

        info!(
            job = %job.name,
            receipts_deleted,
            "Deleted job"
        );

        Ok(Some(DeletedJob {
            job,
            receipts_deleted,
            file_paths,
        }))
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        let created_at: String = row.get(2)?;
        let updated_at: String = row.get(3)?;
        Ok(Job {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
        })
    }
}
