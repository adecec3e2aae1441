//! Data models for run tracking
//!
//! Outcomes, test identities, and the persisted run/result documents.

mod component;
mod documents;
mod identity;
mod outcome;

pub use component::{resolve_components, VersionedComponent};
pub use documents::{ResultRecord, RunPlan, RunRecord, SubTestRecord};
pub use identity::{Priority, TestIdentity, TestKind};
pub use outcome::{Outcome, RunStatus};
