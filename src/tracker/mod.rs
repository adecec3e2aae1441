//! Result aggregation, run tracking and incremental sequencing

mod aggregator;
mod incremental;
mod result;
mod run;

pub use aggregator::{AggregatorHandle, RunAggregator};
pub use incremental::{skip_reason, GroupState, IncrementalSequencer, Verdict};
pub use result::TestResultDocument;
pub use run::{started_by, CountingMode, RunTracker};
