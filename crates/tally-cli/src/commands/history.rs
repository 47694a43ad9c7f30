//! Item price history command

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tally_core::chart::price_chart_svg;
use tally_core::db::Database;
use tally_core::history::{PriceDirection, PriceHistory};

use super::{money, truncate};

pub fn cmd_history(
    db: &Database,
    item: &str,
    chart: Option<&Path>,
    width: u32,
    height: u32,
) -> Result<()> {
    let items = db.list_items()?;
    let history = PriceHistory::for_item(&items, item)
        .ok_or_else(|| anyhow!("No purchases found for '{}'", item))?;

    print_history(&history);

    if let Some(path) = chart {
        let svg = price_chart_svg(&history, width, height);
        std::fs::write(path, svg)
            .with_context(|| format!("Failed to write chart: {}", path.display()))?;
        println!("📈 Chart written to {}", path.display());
    }

    Ok(())
}

fn print_history(history: &PriceHistory) {
    let arrow = match history.direction {
        PriceDirection::Up => "📈",
        PriceDirection::Down => "📉",
        PriceDirection::Flat => "➡️ ",
    };

    println!("\n{} {} ({} purchases)", arrow, history.item_name, history.count);
    println!("{}", "─".repeat(72));
    println!(
        "  Average: {}   Low: {}   High: {}",
        money(history.average),
        money(history.min),
        money(history.max)
    );
    println!(
        "  First: {}   Latest: {}   Change: {:+.2} ({:+.1}%)",
        money(history.first),
        money(history.last),
        history.change,
        history.change_percent
    );
    println!();

    for point in &history.points {
        println!(
            "  {}  {:>10}  x{:<4} {:<22} {}",
            point.date,
            money(point.unit_price),
            point.quantity,
            truncate(point.store_location.as_deref().unwrap_or(""), 22),
            point.job_name.as_deref().unwrap_or("")
        );
    }
    println!();
}
