//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod export;
pub mod forms;
pub mod import;
pub mod items;
pub mod jobs;
pub mod receipts;

// Re-export all handlers for use in router
pub use export::*;
pub use import::*;
pub use items::*;
pub use jobs::*;
pub use receipts::*;
