//! Largest-first greedy bin packing.
//!
//! [`partition`] is pure: it decides which files go together without
//! touching the filesystem. [`organize`](crate::organize::organize) applies
//! the resulting [`Plan`].

use crate::discover::FileEntry;
use std::num::NonZeroU64;

/// A group of files destined for one directory, one archive and one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPartition {
    /// 1-based, in creation order.
    pub index: usize,
    pub files: Vec<FileEntry>,
    /// Sum of member sizes.
    pub size: u64,
}
impl PlannedPartition {
    fn open(index: usize) -> Self {
        Self { index, files: Vec::new(), size: 0 }
    }

    fn push(&mut self, entry: FileEntry) {
        self.size = self.size.saturating_add(entry.size);
        self.files.push(entry);
    }

    pub fn count(&self) -> usize {
        self.files.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// Closed partitions in creation order.
    pub partitions: Vec<PlannedPartition>,
    /// Files larger than the capacity bound, in discovery order.
    pub skipped: Vec<FileEntry>,
}
impl Plan {
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty() && self.skipped.is_empty()
    }

    /// Number of files assigned to some partition.
    pub fn assigned(&self) -> usize {
        self.partitions.iter().map(PlannedPartition::count).sum()
    }
}

/// Distributes `files` into partitions bounded by `capacity`.
///
/// Files larger than `capacity` are skipped. The rest are taken largest
/// first (ties keep discovery order) and appended to the open partition
/// until adding the next file would reach or exceed `capacity`, at which
/// point a new partition is opened. A partition is therefore always below
/// `capacity` before its last file was added.
pub fn partition(files: Vec<FileEntry>, capacity: NonZeroU64) -> Plan {
    let capacity = capacity.get();
    let (mut eligible, skipped): (Vec<_>, Vec<_>) = files.into_iter().partition(|f| f.size <= capacity);
    for entry in &skipped {
        tracing::warn!(path = %entry.path.display(), size = entry.size, capacity, "File is larger than the capacity and will be skipped");
    }
    // `sort_by` is stable, so equal sizes keep discovery order.
    eligible.sort_by(|a, b| b.size.cmp(&a.size));

    let mut partitions = Vec::new();
    let mut current: Option<PlannedPartition> = None;
    for entry in eligible {
        let full = current
            .as_ref()
            .is_some_and(|open| open.size.saturating_add(entry.size) >= capacity);
        if full && let Some(closed) = current.take() {
            partitions.push(closed);
        }
        let index = partitions.len() + 1;
        current.get_or_insert_with(|| PlannedPartition::open(index)).push(entry);
    }
    partitions.extend(current);
    tracing::debug!(partitions = partitions.len(), skipped = skipped.len(), "Planned partitions");
    Plan { partitions, skipped }
}
