//! The whole run: discover, plan, organize, report, archive, upload.
//!
//! Stages run one after the other and, within a stage, one partition or
//! archive at a time. Failures are yielded as `Err` items and the run
//! carries on where that makes sense:
//!
//! - a file that cannot be moved is left where it was;
//! - a partition that cannot be archived is not uploaded;
//! - the first authentication or upload failure stops all remote work.
//!
//! Local results are never rolled back.

use crate::discover::{Extensions, discover};
use crate::error::{ErrorKind, Result};
use crate::organize::{OrganizeEvent, Partition, organize};
use crate::plan::partition;
use crate::report::Report;
use crate::template::PartitionNamer;
use async_stream::stream;
use exn::ResultExt;
use futures::Stream;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use vidsplit_compress::Archiver;
use vidsplit_config::Config;
use vidsplit_storage::{ContainerId, RemoteId, Uploader};

#[derive(Debug)]
pub enum Event {
    /// No eligible file under the source; nothing was touched.
    NothingToDo,
    Organize(OrganizeEvent),
    ReportWritten(PathBuf),
    ArchiveStarted { partition: String, total: u64 },
    ArchiveProgress { partition: String, processed: u64, total: u64 },
    Archived { partition: String, archive: PathBuf },
    Authenticated { backend: String },
    ContainerCreated(ContainerId),
    Uploaded { archive: PathBuf, remote: RemoteId },
    /// Always the last event of a run that got past discovery.
    Complete(Summary),
}

/// Outcome of a run.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub report: Report,
    /// Where the report was written, if it was.
    pub report_path: Option<PathBuf>,
    pub report_failed: bool,
    /// Partitions that could not be created or renamed.
    pub failed_partitions: usize,
    pub archives: Vec<PathBuf>,
    pub failed_archives: usize,
    pub uploads: Vec<RemoteId>,
    /// Archives that were not uploaded because remote work failed.
    pub failed_uploads: usize,
}
impl Summary {
    /// `true` if anything other than skipping oversized files went wrong.
    pub fn has_failures(&self) -> bool {
        self.report.failed > 0
            || self.report_failed
            || self.failed_partitions > 0
            || self.failed_archives > 0
            || self.failed_uploads > 0
    }
}

/// Checks that `path` is an existing directory with a usable name and
/// returns its canonical form. Nothing has been touched if this fails.
pub async fn check_source(path: &Path) -> Result<PathBuf> {
    let canonical = tokio::fs::canonicalize(path)
        .await
        .or_raise(|| ErrorKind::InvalidInput(path.to_path_buf()))?;
    let metadata = tokio::fs::metadata(&canonical)
        .await
        .or_raise(|| ErrorKind::InvalidInput(path.to_path_buf()))?;
    if !metadata.is_dir() || canonical.file_name().is_none() {
        exn::bail!(ErrorKind::InvalidInput(path.to_path_buf()));
    }
    Ok(canonical)
}

pub struct Pipeline {
    capacity: NonZeroU64,
    extensions: Extensions,
    namer: PartitionNamer,
    report: String,
    archiver: Archiver,
    uploader: Option<Uploader>,
}
impl Pipeline {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            capacity: config.capacity,
            extensions: Extensions::new(&config.extensions),
            namer: config.naming.parse()?,
            report: config.report.clone(),
            archiver: Archiver::new(config.compression),
            uploader: None,
        })
    }

    /// Upload archives through `uploader` once they are created.
    pub fn with_uploader(mut self, uploader: Uploader) -> Self {
        self.uploader = Some(uploader);
        self
    }

    /// Runs every stage over `root`, which should have passed
    /// [`check_source`].
    pub fn run<'a>(&'a self, root: &'a Path) -> impl Stream<Item = Result<Event>> + 'a {
        // `rustfmt` does not format macros that use braces. Wrap in parentheses!
        stream!({
            let files = match discover(root, &self.extensions).await {
                Ok(files) => files,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            let root_name = root.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let mut summary = Summary { report: Report::new(&root_name), ..Summary::default() };
            if files.is_empty() {
                tracing::info!(root = %root.display(), "No eligible files found, nothing to do");
                yield Ok(Event::NothingToDo);
                yield Ok(Event::Complete(summary));
                return;
            }

            let plan = partition(files, self.capacity);
            tracing::info!(
                partitions = plan.partitions.len(),
                files = plan.assigned(),
                skipped = plan.skipped.len(),
                "Planned partitions"
            );
            let mut partitions: Vec<Partition> = Vec::new();
            for await event in organize(root, plan, &self.namer) {
                if let Ok(event) = &event {
                    match event {
                        OrganizeEvent::Skipped(_) => summary.report.skipped += 1,
                        OrganizeEvent::Closed(partition) => {
                            summary.report.record(partition);
                            partitions.push(partition.clone());
                        },
                        OrganizeEvent::Complete { failed_files, failed_partitions } => {
                            summary.report.failed = *failed_files;
                            summary.failed_partitions = *failed_partitions;
                        },
                        _ => {},
                    }
                }
                yield event.map(Event::Organize);
            }

            match summary.report.write(root, &self.report).await {
                Ok(path) => {
                    summary.report_path = Some(path.clone());
                    yield Ok(Event::ReportWritten(path));
                },
                Err(e) => {
                    summary.report_failed = true;
                    yield Err(e);
                },
            }

            for partition in &partitions {
                yield Ok(Event::ArchiveStarted { partition: partition.name.clone(), total: partition.size });
                let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
                let archiver = self.archiver;
                let directory = partition.path.clone();
                let handle = tokio::task::spawn_blocking(move || {
                    archiver.compress(&directory, |progress| {
                        // The receiver only goes away if the run is dropped.
                        let _ = tx.send((progress.processed, progress.total));
                    })
                });
                while let Some((processed, total)) = rx.recv().await {
                    yield Ok(Event::ArchiveProgress { partition: partition.name.clone(), processed, total });
                }
                let archived: Result<PathBuf> = match handle.await {
                    Ok(result) => result.or_raise(|| ErrorKind::Archive(partition.path.clone())),
                    Err(e) => Err(e).or_raise(|| ErrorKind::Archive(partition.path.clone())),
                };
                match archived {
                    Ok(archive) => {
                        tracing::info!(archive = %archive.display(), "Archive created");
                        summary.archives.push(archive.clone());
                        yield Ok(Event::Archived { partition: partition.name.clone(), archive });
                    },
                    Err(e) => {
                        tracing::warn!(partition = %partition.name, "Archive failed; it will not be uploaded");
                        summary.failed_archives += 1;
                        yield Err(e);
                    },
                }
            }

            if let Some(uploader) = &self.uploader
                && !summary.archives.is_empty()
            {
                let pending = summary.archives.clone();
                let session = match uploader.authenticate().await {
                    Ok(session) => Some(session),
                    Err(e) => {
                        summary.failed_uploads = pending.len();
                        let e: Result<Event> = Err(e).or_raise(|| ErrorKind::Auth);
                        yield e;
                        None
                    },
                };
                let container = match &session {
                    Some(session) => {
                        yield Ok(Event::Authenticated { backend: uploader.name().to_string() });
                        match session.create_container(&root_name).await {
                            Ok(container) => Some(container),
                            Err(e) => {
                                summary.failed_uploads = pending.len();
                                let e: Result<Event> = Err(e).or_raise(|| ErrorKind::Upload);
                                yield e;
                                None
                            },
                        }
                    },
                    None => None,
                };
                if let (Some(session), Some(container)) = (&session, container) {
                    yield Ok(Event::ContainerCreated(container.clone()));
                    for (uploaded, archive) in pending.iter().enumerate() {
                        match session.upload(archive, &container).await {
                            Ok(remote) => {
                                summary.uploads.push(remote.clone());
                                yield Ok(Event::Uploaded { archive: archive.clone(), remote });
                            },
                            Err(e) => {
                                summary.failed_uploads = pending.len() - uploaded;
                                tracing::warn!(remaining = summary.failed_uploads, "Stopping remote operations");
                                let e: Result<Event> = Err(e).or_raise(|| ErrorKind::Upload);
                                yield e;
                                break;
                            },
                        }
                    }
                }
            }

            yield Ok(Event::Complete(summary));
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::Arc;
    use vidsplit_storage::backend::MockBackend;

    fn write(root: &Path, relative: &str, size: usize) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, vec![1u8; size]).unwrap();
    }

    fn config(capacity: u64) -> Config {
        Config { capacity: NonZeroU64::new(capacity).unwrap(), ..Config::default() }
    }

    async fn run(pipeline: &Pipeline, root: &Path) -> (Vec<Result<Event>>, Summary) {
        let mut events: Vec<_> = pipeline.run(root).collect().await;
        let Some(Ok(Event::Complete(summary))) = events.pop() else {
            panic!("run did not complete");
        };
        (events, summary)
    }

    fn source(temp: &tempfile::TempDir) -> PathBuf {
        let root = temp.path().join("Holiday");
        write(&root, "a.mp4", 18);
        write(&root, "b.mp4", 15);
        write(&root, "c.mp4", 12);
        write(&root, "d.mp4", 10);
        write(&root, "e.mp4", 5);
        write(&root, "huge.mp4", 25);
        root
    }

    #[tokio::test]
    async fn test_check_source() {
        let temp = tempfile::tempdir().unwrap();
        let root = source(&temp);
        assert_eq!(check_source(&root).await.unwrap(), root.canonicalize().unwrap());

        let err = check_source(&temp.path().join("missing")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidInput(_)));
        let err = check_source(&root.join("a.mp4")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidInput(_)));
    }

    #[rstest::rstest]
    #[case("{{ rot }}_{{ index }}")]
    #[case("{{ root }}/{{ index }}")]
    fn test_unusable_naming_is_rejected_up_front(#[case] naming: &str) {
        let config = Config { naming: naming.to_string(), ..config(20) };
        let err = Pipeline::new(&config).err().unwrap();
        assert!(matches!(&*err, ErrorKind::Template));
    }

    #[tokio::test]
    async fn test_local_run() {
        let temp = tempfile::tempdir().unwrap();
        let root = source(&temp);
        let pipeline = Pipeline::new(&config(20)).unwrap();
        let (events, summary) = run(&pipeline, &root).await;

        assert!(events.iter().all(Result::is_ok));
        assert!(!summary.has_failures());
        assert_eq!(summary.report.total(), 5);
        assert_eq!(summary.report.skipped, 1);
        assert_eq!(summary.archives.len(), 4);
        assert!(summary.uploads.is_empty());
        for name in ["Holiday_1_1Files", "Holiday_2_1Files", "Holiday_3_1Files", "Holiday_4_2Files"] {
            assert!(root.join(name).is_dir());
            assert!(root.join(format!("{name}.zip")).is_file());
        }
        let report = std::fs::read_to_string(root.join("organization_report.txt")).unwrap();
        assert!(report.contains("Holiday_4_2Files: 2 files"));
        assert!(report.contains("Total Files Processed: 5"));

        let last_progress = events.iter().rev().find_map(|e| match e {
            Ok(Event::ArchiveProgress { processed, total, .. }) => Some((*processed, *total)),
            _ => None,
        });
        assert_eq!(last_progress, Some((15, 15)));
    }

    #[tokio::test]
    async fn test_nothing_to_do() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("Empty");
        write(&root, "notes.txt", 3);
        let pipeline = Pipeline::new(&config(20)).unwrap();
        let (events, summary) = run(&pipeline, &root).await;

        assert!(matches!(events.as_slice(), [Ok(Event::NothingToDo)]));
        assert!(!summary.has_failures());
        assert!(summary.report_path.is_none());
        assert!(!root.join("organization_report.txt").exists());
        assert_eq!(std::fs::read_dir(&root).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_only_oversized_files() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("Big");
        write(&root, "huge.mp4", 25);
        let pipeline = Pipeline::new(&config(20)).unwrap();
        let (_, summary) = run(&pipeline, &root).await;

        assert!(!summary.has_failures());
        assert_eq!(summary.report.skipped, 1);
        assert!(summary.report.partitions.is_empty());
        assert!(summary.archives.is_empty());
        assert!(root.join("huge.mp4").is_file());
    }

    #[tokio::test]
    async fn test_uploads_into_root_container() {
        let temp = tempfile::tempdir().unwrap();
        let root = source(&temp);
        let backend = Arc::new(MockBackend::default());
        let uploader = Uploader::new(backend.clone(), None);
        let pipeline = Pipeline::new(&config(20)).unwrap().with_uploader(uploader);
        let (events, summary) = run(&pipeline, &root).await;

        assert!(events.iter().all(Result::is_ok));
        assert!(!summary.has_failures());
        assert_eq!(summary.uploads.len(), 4);
        let containers = backend.containers().await;
        assert_eq!(containers.len(), 1);
        assert_eq!(backend.container(&containers[0]).await, Some((None, "Holiday".to_string())));
        let names: Vec<_> = backend.uploads().await.into_iter().map(|u| u.name).collect();
        assert_eq!(
            names,
            ["Holiday_1_1Files.zip", "Holiday_2_1Files.zip", "Holiday_3_1Files.zip", "Holiday_4_2Files.zip"]
        );
    }

    #[tokio::test]
    async fn test_auth_failure_keeps_local_results() {
        let temp = tempfile::tempdir().unwrap();
        let root = source(&temp);
        let backend = Arc::new(MockBackend::default().failing_auth());
        let pipeline = Pipeline::new(&config(20)).unwrap().with_uploader(Uploader::new(backend.clone(), None));
        let (events, summary) = run(&pipeline, &root).await;

        let errors: Vec<_> = events.iter().filter_map(|e| e.as_ref().err()).collect();
        assert_eq!(errors.len(), 1);
        assert!(matches!(&**errors[0], ErrorKind::Auth));
        assert!(summary.has_failures());
        assert_eq!(summary.failed_uploads, 4);
        assert_eq!(summary.archives.len(), 4);
        assert!(backend.containers().await.is_empty());
        assert!(root.join("Holiday_1_1Files.zip").is_file());
    }

    #[tokio::test]
    async fn test_upload_failure_stops_remote_operations() {
        let temp = tempfile::tempdir().unwrap();
        let root = source(&temp);
        let backend = Arc::new(MockBackend::default().failing_upload("Holiday_2_1Files.zip"));
        let pipeline = Pipeline::new(&config(20)).unwrap().with_uploader(Uploader::new(backend.clone(), None));
        let (events, summary) = run(&pipeline, &root).await;

        assert_eq!(events.iter().filter(|e| e.is_err()).count(), 1);
        assert_eq!(summary.uploads.len(), 1);
        assert_eq!(summary.failed_uploads, 3);
        assert_eq!(backend.uploads().await.len(), 1);
    }

    #[tokio::test]
    async fn test_archive_failure_skips_that_upload() {
        let temp = tempfile::tempdir().unwrap();
        let root = source(&temp);
        // An archive of that name already exists and is never overwritten.
        std::fs::write(root.join("Holiday_3_1Files.zip"), b"old").unwrap();
        let backend = Arc::new(MockBackend::default());
        let pipeline = Pipeline::new(&config(20)).unwrap().with_uploader(Uploader::new(backend.clone(), None));
        let (events, summary) = run(&pipeline, &root).await;

        let errors: Vec<_> = events.iter().filter_map(|e| e.as_ref().err()).collect();
        assert_eq!(errors.len(), 1);
        assert!(matches!(&**errors[0], ErrorKind::Archive(_)));
        assert_eq!(summary.failed_archives, 1);
        assert_eq!(summary.uploads.len(), 3);
        assert_eq!(std::fs::read(root.join("Holiday_3_1Files.zip")).unwrap(), b"old");
        assert!(backend.uploads().await.iter().all(|u| u.name != "Holiday_3_1Files.zip"));
    }
}
