//! Splitting a directory of videos into size-bounded partitions.
//!
//! [`discover`] finds eligible files, [`partition`] plans partitions
//! largest-first, [`organize`](organize::organize) applies the plan and
//! [`Pipeline`] strings everything together with reporting, archiving and
//! uploading.

pub mod discover;
pub mod error;
pub mod organize;
pub mod pipeline;
pub mod plan;
pub mod report;
mod template;

pub use crate::discover::{Extensions, FileEntry, discover};
pub use crate::pipeline::{Event, Pipeline, Summary, check_source};
pub use crate::plan::{Plan, PlannedPartition, partition};
pub use crate::report::Report;
pub use crate::template::PartitionNamer;
