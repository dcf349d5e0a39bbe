//! Per-package builds on top of the shared dependency artifact

mod builder;
mod plan;

pub use builder::{BuildOutcome, PackageBuilder};
pub use plan::BuildPlan;
