//! Output formatting module
//!
//! Renders stored runs and results as tables, JSON, CSV or summaries.

mod formatter;

pub use formatter::{OutputFormat, ResultFormatter};
