//! Per-item price history
//!
//! Collects every purchase of an item (matched case-insensitively by name),
//! orders them by purchase date and summarizes how the unit price moved.

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{round_cents, unit_price, ItemWithContext};

/// One purchase of the item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub unit_price: f64,
    pub quantity: i64,
    pub amount: f64,
    pub store_location: Option<String>,
    pub job_name: Option<String>,
}

/// Direction of the first-to-last price change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceDirection {
    Up,
    Down,
    Flat,
}

impl PriceDirection {
    fn from_change(change: f64) -> Self {
        // Changes under half a cent display as $0.00
        if change >= 0.005 {
            Self::Up
        } else if change <= -0.005 {
            Self::Down
        } else {
            Self::Flat
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Flat => "flat",
        }
    }
}

/// Summary statistics for one item's purchases.
///
/// Money values are rounded to cents and `change_percent` to one decimal.
/// `points` keep full precision for charting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceHistory {
    /// Name as written on the earliest purchase
    pub item_name: String,
    pub points: Vec<PricePoint>,
    pub count: usize,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub first: f64,
    pub last: f64,
    pub change: f64,
    pub change_percent: f64,
    pub direction: PriceDirection,
}

impl PriceHistory {
    /// Build the history of `name`. None when no item matches.
    pub fn for_item(items: &[ItemWithContext], name: &str) -> Option<Self> {
        let wanted = name.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }

        let mut matching: Vec<&ItemWithContext> = items
            .iter()
            .filter(|i| i.item_name.trim().to_lowercase() == wanted)
            .collect();
        if matching.is_empty() {
            return None;
        }
        // Stable: same-day purchases keep their input order
        matching.sort_by_key(|i| i.purchase_date);

        let points: Vec<PricePoint> = matching
            .iter()
            .map(|i| PricePoint {
                date: i.purchase_date,
                unit_price: unit_price(i.amount, i.quantity),
                quantity: i.quantity,
                amount: i.amount,
                store_location: i.store_location.clone(),
                job_name: i.job_name.clone(),
            })
            .collect();

        let prices: Vec<f64> = points.iter().map(|p| p.unit_price).collect();
        let count = prices.len();
        let first = prices[0];
        let last = prices[count - 1];
        let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
        let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let average = prices.iter().sum::<f64>() / count as f64;
        let change = last - first;
        let change_percent = if first == 0.0 {
            0.0
        } else {
            change / first * 100.0
        };

        Some(Self {
            item_name: matching[0].item_name.clone(),
            points,
            count,
            average: round_cents(average),
            min: round_cents(min),
            max: round_cents(max),
            first: round_cents(first),
            last: round_cents(last),
            change: round_cents(change),
            change_percent: (change_percent * 10.0).round() / 10.0,
            direction: PriceDirection::from_change(change),
        })
    }

    /// Lowest and highest unit price at full precision
    pub fn price_range(&self) -> (f64, f64) {
        self.points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p.unit_price), hi.max(p.unit_price))
            })
    }

    /// Earliest and latest purchase date
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.points.first()?.date, self.points.last()?.date))
    }
}
