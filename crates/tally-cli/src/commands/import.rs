//! CSV preview and import commands

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use tally_core::db::Database;
use tally_core::import::{
    execute_plan, normalize_header, parse_date, plan_import, preview, ColumnMapping, CsvDocument,
    FieldAliases, ImportKind, ImportPlan, ImportRequest, JobRef, ReceiptHeader, TargetField,
};
use tracing::debug;

use super::{money, truncate};
use crate::cli::ImportArgs;

fn read_csv(file: &Path) -> Result<String> {
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to open file: {}", file.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn parse_kind(kind: &str) -> Result<ImportKind> {
    kind.parse().map_err(|e: String| anyhow!(e))
}

/// Column index for `--map` and `--unit-price` values: header text first,
/// then a 1-based column number
pub fn resolve_column(headers: &[String], column: &str) -> Result<usize> {
    let wanted = column.trim();

    if let Some(idx) = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(wanted))
    {
        return Ok(idx);
    }

    let normalized = normalize_header(wanted);
    if !normalized.is_empty() {
        if let Some(idx) = headers
            .iter()
            .position(|h| normalize_header(h) == normalized)
        {
            return Ok(idx);
        }
    }

    if let Ok(number) = wanted.parse::<usize>() {
        if (1..=headers.len()).contains(&number) {
            return Ok(number - 1);
        }
    }

    bail!(
        "Column '{}' not found. Headers: {}",
        column,
        headers.join(", ")
    )
}

/// Start from the suggested mapping and apply `field=Column` overrides
pub fn build_mapping(
    headers: &[String],
    kind: ImportKind,
    aliases: &FieldAliases,
    overrides: &[String],
    unit_price: Option<&str>,
) -> Result<ColumnMapping> {
    let mut mapping = aliases.suggest_mapping(headers, kind);

    for spec in overrides {
        let (field, column) = spec
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid --map '{}' (expected field=Column)", spec))?;
        let field: TargetField = field.parse().map_err(|e: String| anyhow!(e))?;
        if !kind.fields().contains(&field) {
            bail!("{} cannot be mapped for {} imports", field.label(), kind);
        }

        if column.trim().is_empty() {
            mapping.skip(field);
        } else {
            mapping.set(field, resolve_column(headers, column)?);
        }
    }

    if let Some(column) = unit_price {
        if kind != ImportKind::Items {
            bail!("--unit-price applies to item imports only");
        }
        mapping.set(TargetField::UnitPrice, resolve_column(headers, column)?);
    }

    Ok(mapping)
}

/// Turn command-line options into an import request for the parsed headers
pub fn build_request(
    args: &ImportArgs,
    headers: &[String],
    aliases: &FieldAliases,
) -> Result<ImportRequest> {
    let kind = parse_kind(&args.kind)?;
    let mapping = build_mapping(
        headers,
        kind,
        aliases,
        &args.mappings,
        args.unit_price.as_deref(),
    )?;

    let mut request = ImportRequest::new(kind, mapping);
    request.header_row = args.header_row;
    request.calculate_unit_price = args.unit_price.is_none();
    request.merge_duplicates = !args.no_merge;

    if let Some(job) = &args.job {
        if kind != ImportKind::Items {
            bail!("--job applies to item imports only; receipt imports read the job from each row");
        }
        let receipt_date = match &args.date {
            Some(date) => parse_date(date).ok_or_else(|| anyhow!("Invalid --date: {}", date))?,
            None => Local::now().date_naive(),
        };
        request.single_receipt = Some(ReceiptHeader {
            job_id: None,
            job_name: Some(job.clone()),
            store_location: args.store.clone(),
            receipt_date,
            notes: args.notes.clone(),
        });
    } else if args.store.is_some() || args.date.is_some() || args.notes.is_some() {
        bail!("--store, --date and --notes need --job (single-receipt import)");
    }

    Ok(request)
}

pub fn cmd_import(db: &Database, aliases: &FieldAliases, args: &ImportArgs) -> Result<()> {
    let text = read_csv(&args.file)?;
    let parsed = CsvDocument::parse(&text).with_header_row(args.header_row)?;
    debug!(
        columns = parsed.headers.len(),
        rows = parsed.rows.len(),
        "Parsed {}",
        args.file.display()
    );
    let request = build_request(args, &parsed.headers, aliases)?;

    println!("📥 Importing {} from {}...", request.kind, args.file.display());
    for (field, column) in request.mapping.iter() {
        println!(
            "   {:<14} ← {}",
            field.label(),
            parsed.headers.get(column).map(String::as_str).unwrap_or("?")
        );
    }

    let plan = plan_import(&parsed, &request, Local::now().date_naive())?;
    println!(
        "   Found {} rows → {} receipt(s), {} item(s)",
        plan.source_rows,
        plan.receipts.len(),
        plan.item_count()
    );

    if args.dry_run {
        print_plan(&plan);
        println!("Dry run: nothing was written.");
        return Ok(());
    }

    let summary = execute_plan(db, &plan, None);

    if summary.failed == 0 {
        println!("✅ Import complete!");
    } else {
        println!("⚠️  Import finished with errors");
    }
    println!("   {}", summary.message(request.kind));
    println!("   Receipts created: {}", summary.receipts_created);
    for error in &summary.errors {
        println!("   - {}", error);
    }
    if summary.more_errors > 0 {
        println!("   ... and {} more", summary.more_errors);
    }

    Ok(())
}

fn print_plan(plan: &ImportPlan) {
    println!();
    for receipt in &plan.receipts {
        let job = match &receipt.job {
            JobRef::Id(id) => format!("job #{}", id),
            JobRef::Name(name) => name.clone(),
        };
        let total: f64 = receipt.items.iter().map(|i| i.amount).sum();
        println!(
            "  {}  {:<24} {:<20} {:>3} items {:>11}",
            receipt.receipt_date,
            truncate(&job, 24),
            truncate(receipt.store_location.as_deref().unwrap_or(""), 20),
            receipt.items.len(),
            money(total)
        );
        for item in &receipt.items {
            println!(
                "      {:<34} x{:<4} {:>11}",
                truncate(&item.item_name, 34),
                item.quantity,
                money(item.amount)
            );
        }
    }
    if plan.merged_rows > 0 {
        println!("  {} duplicate row(s) merged", plan.merged_rows);
    }
    for row in &plan.rejected {
        println!("  ✗ Row {}: {}", row.line, row.reason);
    }
    println!();
}

pub fn cmd_preview(
    file: &Path,
    header_row: usize,
    kind: &str,
    aliases: &FieldAliases,
) -> Result<()> {
    let kind = parse_kind(kind)?;
    let text = read_csv(file)?;
    let preview = preview(&text, header_row, kind, aliases)?;

    println!("\n📄 {} ({} data rows)", file.display(), preview.total_rows);
    println!("{}", "─".repeat(70));

    println!("First lines:");
    for (idx, line) in preview.raw_lines.iter().enumerate() {
        let marker = if idx + 1 == header_row { "→" } else { " " };
        println!("  {} {:>2}: {}", marker, idx + 1, truncate(line, 64));
    }

    println!();
    println!("Columns (header row {}):", header_row);
    for (idx, header) in preview.headers.iter().enumerate() {
        let suggested = preview
            .suggested_mapping
            .iter()
            .filter(|(_, column)| *column == idx)
            .map(|(field, _)| field.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        if suggested.is_empty() {
            println!("  {:>3}. {}", idx + 1, header);
        } else {
            println!("  {:>3}. {:<28} → {}", idx + 1, header, suggested);
        }
    }

    if !preview.sample_rows.is_empty() {
        println!();
        println!("Sample rows:");
        for row in &preview.sample_rows {
            println!("  {}", truncate(&row.join(" | "), 76));
        }
    }

    println!();
    println!(
        "Next: tally import --file {} --header-row {} --map field=Column",
        file.display(),
        header_row
    );

    Ok(())
}
