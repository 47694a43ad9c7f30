//! Domain models for Tally

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A project that receipts are attributed to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A job with its spending roll-up, as shown in job lists
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    #[serde(flatten)]
    pub job: Job,
    pub receipt_count: i64,
    /// Sum of line item amounts across the job's receipts
    pub total_amount: f64,
}

/// Result of deleting a job and everything attributed to it
#[derive(Debug, Clone, Serialize)]
pub struct DeletedJob {
    pub job: Job,
    pub receipts_deleted: usize,
    /// Uploaded files that belonged to the deleted receipts
    pub file_paths: Vec<String>,
}

/// A purchase record with its line items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub id: i64,
    /// None for legacy receipts that were never attributed to a job
    pub job_id: Option<i64>,
    /// Resolved from the jobs table
    pub job_name: Option<String>,
    pub store_location: Option<String>,
    pub receipt_date: NaiveDate,
    pub notes: Option<String>,
    pub file_path: Option<String>,
    pub file_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<LineItem>,
}

impl Receipt {
    pub fn total(&self) -> f64 {
        round_cents(self.items.iter().map(|i| i.amount).sum())
    }
}

/// Fields for creating or updating a receipt
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewReceipt {
    pub job_id: Option<i64>,
    pub store_location: Option<String>,
    pub receipt_date: NaiveDate,
    pub notes: Option<String>,
    /// On update, None keeps the existing file reference
    pub file_path: Option<String>,
    pub file_type: Option<String>,
}

/// One purchased item on a receipt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub id: i64,
    pub receipt_id: i64,
    pub item_name: String,
    pub purchase_date: NaiveDate,
    /// Total for the line, not the per-unit price
    pub amount: f64,
    pub quantity: i64,
}

impl LineItem {
    pub fn unit_price(&self) -> f64 {
        unit_price(self.amount, self.quantity)
    }
}

/// Fields for adding or updating a line item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLineItem {
    pub item_name: String,
    pub purchase_date: NaiveDate,
    pub amount: f64,
    #[serde(default)]
    pub quantity: Option<i64>,
}

impl NewLineItem {
    pub fn new(item_name: impl Into<String>, purchase_date: NaiveDate, amount: f64) -> Self {
        Self {
            item_name: item_name.into(),
            purchase_date,
            amount,
            quantity: None,
        }
    }

    pub fn with_quantity(mut self, quantity: i64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    /// Quantity as stored: missing or below 1 becomes 1
    pub fn effective_quantity(&self) -> i64 {
        match self.quantity {
            Some(q) if q >= 1 => q,
            _ => 1,
        }
    }

    /// Check the item can be stored, returning the trimmed name and cent-rounded amount
    pub fn validate(&self) -> Result<(String, f64)> {
        let name = self.item_name.trim();
        if name.is_empty() {
            return Err(Error::InvalidData("Item name is required".to_string()));
        }
        if !self.amount.is_finite() {
            return Err(Error::InvalidData(format!(
                "Invalid amount for '{}'",
                name
            )));
        }
        if self.amount < 0.0 {
            return Err(Error::InvalidData(format!(
                "Negative amount {:.2} for '{}'",
                self.amount, name
            )));
        }
        Ok((name.to_string(), round_cents(self.amount)))
    }
}

/// A line item joined with its receipt's store and job, for the all-items view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemWithContext {
    pub id: i64,
    pub receipt_id: i64,
    pub item_name: String,
    pub purchase_date: NaiveDate,
    pub amount: f64,
    pub quantity: i64,
    pub unit_price: f64,
    pub store_location: Option<String>,
    pub job_name: Option<String>,
}

/// Per-unit price of a line; quantities below 1 count as 1
pub fn unit_price(amount: f64, quantity: i64) -> f64 {
    amount / quantity.max(1) as f64
}

/// Round a currency value to whole cents
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
