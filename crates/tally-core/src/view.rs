//! List filtering and sorting
//!
//! The state of a list view (search text, selected job, sort column) is a
//! plain value that deserializes from query parameters and is applied to
//! already-loaded records.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::{ItemWithContext, JobSummary, Receipt};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemSort {
    UnitPrice,
    Amount,
    Quantity,
    #[default]
    PurchaseDate,
    ItemName,
    StoreLocation,
    JobName,
}

impl std::str::FromStr for ItemSort {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "unit_price" | "price" => Ok(Self::UnitPrice),
            "amount" => Ok(Self::Amount),
            "quantity" | "qty" => Ok(Self::Quantity),
            "purchase_date" | "date" => Ok(Self::PurchaseDate),
            "item_name" | "name" => Ok(Self::ItemName),
            "store_location" | "store" => Ok(Self::StoreLocation),
            "job_name" | "job" => Ok(Self::JobName),
            _ => Err(format!("Unknown sort column: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

impl std::str::FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(format!("Unknown sort direction: {}", s)),
        }
    }
}

fn needle(search: &Option<String>) -> Option<String> {
    search
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
}

fn contains(field: Option<&str>, needle: &str) -> bool {
    field.is_some_and(|f| f.to_lowercase().contains(needle))
}

/// All-items table state. Defaults to newest purchases first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemView {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort: ItemSort,
    #[serde(default)]
    pub dir: SortDirection,
}

impl ItemView {
    /// Click on a column header: same column flips direction, a new one sorts ascending
    pub fn sort_by(&mut self, column: ItemSort) {
        if self.sort == column {
            self.dir = self.dir.toggled();
        } else {
            self.sort = column;
            self.dir = SortDirection::Asc;
        }
    }

    pub fn matches(&self, item: &ItemWithContext) -> bool {
        match needle(&self.search) {
            None => true,
            Some(n) => {
                contains(Some(item.item_name.as_str()), &n)
                    || contains(item.store_location.as_deref(), &n)
                    || contains(item.job_name.as_deref(), &n)
            }
        }
    }

    fn compare(&self, a: &ItemWithContext, b: &ItemWithContext) -> Ordering {
        let text = |s: &Option<String>| s.as_deref().unwrap_or("").to_lowercase();
        match self.sort {
            ItemSort::UnitPrice => a.unit_price.total_cmp(&b.unit_price),
            ItemSort::Amount => a.amount.total_cmp(&b.amount),
            ItemSort::Quantity => a.quantity.cmp(&b.quantity),
            ItemSort::PurchaseDate => a.purchase_date.cmp(&b.purchase_date),
            ItemSort::ItemName => a.item_name.to_lowercase().cmp(&b.item_name.to_lowercase()),
            ItemSort::StoreLocation => text(&a.store_location).cmp(&text(&b.store_location)),
            ItemSort::JobName => text(&a.job_name).cmp(&text(&b.job_name)),
        }
    }

    /// Filtered and sorted copy; ties keep their input order
    pub fn apply(&self, items: &[ItemWithContext]) -> Vec<ItemWithContext> {
        let mut out: Vec<ItemWithContext> =
            items.iter().filter(|i| self.matches(i)).cloned().collect();
        out.sort_by(|a, b| {
            let ord = self.compare(a, b);
            match self.dir {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });
        out
    }
}

/// Receipt list state: optional job selection plus search text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptView {
    #[serde(default)]
    pub job_id: Option<i64>,
    #[serde(default)]
    pub search: Option<String>,
}

impl ReceiptView {
    /// Search covers store, receipt date and receipt ID
    pub fn matches(&self, receipt: &Receipt) -> bool {
        if self.job_id.is_some() && receipt.job_id != self.job_id {
            return false;
        }
        match needle(&self.search) {
            None => true,
            Some(n) => {
                contains(receipt.store_location.as_deref(), &n)
                    || receipt.receipt_date.to_string().contains(&n)
                    || receipt.id.to_string().contains(&n)
            }
        }
    }

    pub fn apply(&self, receipts: &[Receipt]) -> Vec<Receipt> {
        receipts
            .iter()
            .filter(|r| self.matches(r))
            .cloned()
            .collect()
    }

    /// Jobs whose name contains the search text
    pub fn filter_jobs(&self, jobs: &[JobSummary]) -> Vec<JobSummary> {
        match needle(&self.search) {
            None => jobs.to_vec(),
            Some(n) => jobs
                .iter()
                .filter(|j| contains(Some(j.job.name.as_str()), &n))
                .cloned()
                .collect(),
        }
    }
}
