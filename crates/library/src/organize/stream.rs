use crate::discover::FileEntry;
use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::organize::conflict::{create_staging, discard_staging, finalize, move_into};
use crate::organize::error::{ErrorKind as OrganizeErrorKind, Result as OrganizeResult};
use crate::plan::Plan;
use crate::template::PartitionNamer;
use async_stream::stream;
use exn::ResultExt;
use futures::Stream;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// A closed partition: renamed to its final name, no longer accepting files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Index from the plan. Indices of partitions that failed entirely are
    /// not reused, so there may be gaps.
    pub index: usize,
    pub name: String,
    pub path: PathBuf,
    /// Final paths of the member files.
    pub files: Vec<PathBuf>,
    pub size: u64,
}
impl Partition {
    pub fn count(&self) -> usize {
        self.files.len()
    }
}

/// Progress events emitted by [`organize`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. [`Planned`](Self::Planned), exactly once.
/// 3. [`Skipped`](Self::Skipped), once per oversized file.
/// 4. Per partition: [`Moved`](Self::Moved) for every file moved into it,
///    then [`Closed`](Self::Closed) once it has its final name.
/// 5. [`Complete`](Self::Complete), exactly once.
///
/// `Err` items may appear anywhere after `Planned` and never end the stream.
#[derive(Debug)]
pub enum OrganizeEvent {
    Started,
    Planned { partitions: usize, skipped: usize },
    /// A file larger than the capacity bound; left where it was.
    Skipped(FileEntry),
    Moved { entry: FileEntry, partition: usize },
    Closed(Partition),
    Complete { failed_files: usize, failed_partitions: usize },
}

/// Streams [`OrganizeEvent`]s while moving every planned file into its
/// partition directory under `root`.
///
/// Partitions are processed one at a time, in plan order. A partition whose
/// every move failed is not created. When the final name of a partition is
/// already taken, its files are left in the staging directory and the
/// collision is reported.
pub fn organize<'a>(
    root: &'a Path,
    plan: Plan,
    namer: &'a PartitionNamer,
) -> impl Stream<Item = LibraryResult<OrganizeEvent>> + 'a {
    stream! {
        for await event in organize_inner(root, plan, namer) {
            yield event.or_raise(|| LibraryErrorKind::Organize);
        }
    }
}

fn organize_inner<'a>(
    root: &'a Path,
    plan: Plan,
    namer: &'a PartitionNamer,
) -> impl Stream<Item = OrganizeResult<OrganizeEvent>> + 'a {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        yield Ok(OrganizeEvent::Started);
        yield Ok(OrganizeEvent::Planned {
            partitions: plan.partitions.len(),
            skipped: plan.skipped.len(),
        });
        for entry in plan.skipped {
            yield Ok(OrganizeEvent::Skipped(entry));
        }

        let root_name = root.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let mut failed_files = 0;
        let mut failed_partitions = 0;
        for planned in plan.partitions {
            let index = planned.index;
            let staging = match create_staging(root, index).await {
                Ok(staging) => staging,
                Err(e) => {
                    failed_partitions += 1;
                    yield Err(e);
                    continue;
                },
            };

            let mut moved: Vec<OsString> = Vec::with_capacity(planned.count());
            let mut size = 0u64;
            for entry in planned.files {
                match move_into(&entry.path, &staging).await {
                    Ok(target) => {
                        size = size.saturating_add(entry.size);
                        moved.extend(target.file_name().map(ToOwned::to_owned));
                        tracing::debug!(path = %entry.path.display(), partition = index, size, "Moved file");
                        yield Ok(OrganizeEvent::Moved { entry, partition: index });
                    },
                    Err(e) => {
                        failed_files += 1;
                        tracing::warn!(path = %entry.path.display(), retryable = e.is_retryable(), "File left in place");
                        yield Err(e);
                    },
                }
            }
            if moved.is_empty() {
                tracing::warn!(partition = index, "No file could be moved; partition not created");
                discard_staging(&staging).await;
                continue;
            }

            let name = match namer.name(&root_name, index, moved.len(), size).or_raise(|| OrganizeErrorKind::Template(index)) {
                Ok(name) => name,
                Err(e) => {
                    failed_partitions += 1;
                    yield Err(e);
                    continue;
                },
            };
            let target = root.join(&name);
            if let Err(e) = finalize(&staging, &target).await {
                tracing::warn!(staging = %staging.display(), "Files left in staging directory");
                failed_partitions += 1;
                yield Err(e);
                continue;
            }
            let files = moved.iter().map(|file_name| target.join(file_name)).collect();
            tracing::info!(partition = index, name = %name, size, "Closed partition");
            yield Ok(OrganizeEvent::Closed(Partition { index, name, path: target, files, size }));
        }

        yield Ok(OrganizeEvent::Complete { failed_files, failed_partitions });
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discover::{Extensions, discover};
    use crate::plan::partition;
    use futures::StreamExt;
    use std::num::NonZeroU64;

    fn write(root: &Path, relative: &str, size: usize) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, vec![7u8; size]).unwrap();
    }

    async fn run(root: &Path, capacity: u64) -> Vec<LibraryResult<OrganizeEvent>> {
        let files = discover(root, &Extensions::new(["mp4"])).await.unwrap();
        let plan = partition(files, NonZeroU64::new(capacity).unwrap());
        let namer = PartitionNamer::standard().unwrap();
        organize(root, plan, &namer).collect().await
    }

    fn closed(events: &[LibraryResult<OrganizeEvent>]) -> Vec<&Partition> {
        events
            .iter()
            .filter_map(|e| match e {
                Ok(OrganizeEvent::Closed(p)) => Some(p),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_organizes_into_named_partitions() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("Holiday");
        write(&root, "a.mp4", 18);
        write(&root, "b.mp4", 15);
        write(&root, "sub/c.mp4", 12);
        write(&root, "d.MP4", 10);
        write(&root, "e.mp4", 5);
        write(&root, "huge.mp4", 25);

        let events = run(&root, 20).await;
        assert!(events.iter().all(Result::is_ok));
        assert!(matches!(events[0], Ok(OrganizeEvent::Started)));
        assert!(matches!(events[1], Ok(OrganizeEvent::Planned { partitions: 4, skipped: 1 })));
        assert!(matches!(events[2], Ok(OrganizeEvent::Skipped(ref e)) if e.size == 25));
        assert!(matches!(
            events.last(),
            Some(Ok(OrganizeEvent::Complete { failed_files: 0, failed_partitions: 0 }))
        ));

        let partitions = closed(&events);
        let names: Vec<_> = partitions.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Holiday_1_1Files", "Holiday_2_1Files", "Holiday_3_1Files", "Holiday_4_2Files"]);
        assert_eq!(partitions[3].size, 15);
        assert_eq!(partitions[3].files, vec![root.join("Holiday_4_2Files/d.MP4"), root.join("Holiday_4_2Files/e.mp4")]);
        for p in &partitions {
            assert!(p.path.is_dir());
            assert!(p.files.iter().all(|f| f.is_file()));
        }
        assert!(root.join("huge.mp4").is_file());
        assert!(!root.join("a.mp4").exists());

        // No staging directory is left behind.
        let leftovers = std::fs::read_dir(&root)
            .unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().starts_with(super::super::STAGING_PREFIX))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_same_file_names_do_not_overwrite() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("Trip");
        write(&root, "day1/clip.mp4", 2);
        write(&root, "day2/clip.mp4", 1);

        let events = run(&root, 100).await;
        let partitions = closed(&events);
        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].name, "Trip_1_2Files");
        assert_eq!(
            partitions[0].files,
            vec![root.join("Trip_1_2Files/clip.mp4"), root.join("Trip_1_2Files/clip (2).mp4")]
        );
    }

    #[tokio::test]
    async fn test_name_collision_leaves_staging() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("Trip");
        write(&root, "a.mp4", 1);
        std::fs::create_dir_all(root.join("Trip_1_1Files")).unwrap();

        let events = run(&root, 100).await;
        assert_eq!(events.iter().filter(|e| e.is_err()).count(), 1);
        assert!(closed(&events).is_empty());
        assert!(matches!(
            events.last(),
            Some(Ok(OrganizeEvent::Complete { failed_files: 0, failed_partitions: 1 }))
        ));
        let staged = root.join(format!("{}1/a.mp4", super::super::STAGING_PREFIX));
        assert!(staged.is_file());
    }

    #[tokio::test]
    async fn test_vanished_file_is_a_per_file_failure() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("Trip");
        write(&root, "a.mp4", 3);
        write(&root, "b.mp4", 2);
        let files = discover(&root, &Extensions::new(["mp4"])).await.unwrap();
        std::fs::remove_file(root.join("b.mp4")).unwrap();
        let plan = partition(files, NonZeroU64::new(100).unwrap());
        let namer = PartitionNamer::standard().unwrap();
        let events: Vec<_> = organize(&root, plan, &namer).collect().await;

        assert_eq!(events.iter().filter(|e| e.is_err()).count(), 1);
        let partitions = closed(&events);
        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].name, "Trip_1_1Files");
        assert_eq!(partitions[0].size, 3);
        assert!(matches!(
            events.last(),
            Some(Ok(OrganizeEvent::Complete { failed_files: 1, failed_partitions: 0 }))
        ));
    }

    #[tokio::test]
    async fn test_partition_with_no_moved_files_is_not_created() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("Trip");
        write(&root, "a.mp4", 1);
        let files = discover(&root, &Extensions::new(["mp4"])).await.unwrap();
        std::fs::remove_file(root.join("a.mp4")).unwrap();
        let plan = partition(files, NonZeroU64::new(100).unwrap());
        let namer = PartitionNamer::standard().unwrap();
        let events: Vec<_> = organize(&root, plan, &namer).collect().await;

        assert!(closed(&events).is_empty());
        assert_eq!(std::fs::read_dir(&root).unwrap().count(), 0);
    }
}
