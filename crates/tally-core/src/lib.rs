//! Tally Core Library
//!
//! Shared functionality for the Tally receipt and expense tracker:
//! - Database access and versioned migrations
//! - CSV import with header-row selection, column mapping and duplicate merging
//! - Per-item price history and chart rendering
//! - Receipts and items CSV export
//! - Upload storage for receipt files
//! - List filtering and sorting state

pub mod chart;
pub mod db;
pub mod error;
pub mod export;
pub mod history;
pub mod import;
pub mod models;
pub mod storage;
pub mod view;

pub use chart::{price_chart_svg, render_price_chart, ChartLayout, LinearScale, Surface, SvgSurface};
pub use db::Database;
pub use error::{Error, Result};
pub use export::{items_to_csv, receipts_to_csv};
pub use history::{PriceDirection, PriceHistory, PricePoint};
pub use import::{
    execute_plan, plan_import, preview, ColumnMapping, CsvDocument, FieldAliases, ImportError,
    ImportKind, ImportPlan, ImportPreview, ImportRequest, ImportSink, ImportSummary, ReceiptHeader,
    TargetField,
};
pub use models::{
    DeletedJob, ItemWithContext, Job, JobSummary, LineItem, NewLineItem, NewReceipt, Receipt,
};
pub use storage::{StoredFile, UploadStore};
pub use view::{ItemSort, ItemView, ReceiptView, SortDirection};
