//! Reporting façade and failed-test list

mod facade;
mod failed;

pub use facade::{Reporter, ReporterOptions, TestStart};
pub use failed::FailedTests;
