//! Stored run history
//!
//! Read side of the document store: listing runs, loading their results,
//! and exporting them.

mod history;

pub use history::{ExportFormat, RunHistory, StoredResult, StoredRun};
