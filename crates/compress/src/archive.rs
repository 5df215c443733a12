//! Archive Operations

use crate::Compression;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::instrument;
use zip::write::SimpleFileOptions;
use zip::{DateTime, ZipWriter};

/// File extension given to every archive produced by [`Archiver`].
pub const ARCHIVE_EXTENSION: &str = "zip";

// Fixed entry metadata keeps archives byte-for-byte reproducible; the
// partition directory already records when files were organized.
const MEMBER_PERMISSIONS: u32 = 0o644;

/// Cumulative progress of a single [`Archiver::compress`] call.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    /// Bytes of member data written so far.
    pub processed: u64,
    /// Total bytes of member data in the directory.
    pub total: u64,
    /// The member that was just written.
    pub current: &'a Path,
}
impl Progress<'_> {
    /// Progress as a fraction in `0.0..=1.0`. An empty directory counts as done.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.processed as f64 / self.total as f64
    }
}

struct Member {
    path: PathBuf,
    name: String,
    size: u64,
}

/// Compresses partition directories into sibling zip archives.
///
/// # Examples
///
/// ```no_run
/// use vidsplit_compress::{Archiver, Compression};
/// use std::path::Path;
///
/// let archiver = Archiver::new(Compression::Stored);
/// let archive = archiver
///     .compress(Path::new("/videos/Holiday_1_3Files"), |p| println!("{:.1}%", p.fraction() * 100.0))
///     .unwrap();
/// assert_eq!(archive, Path::new("/videos/Holiday_1_3Files.zip"));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct Archiver {
    compression: Compression,
}
impl Archiver {
    pub fn new(compression: Compression) -> Self {
        Self { compression }
    }

    /// Where the archive for `directory` will be written: a sibling named
    /// `{directoryName}.zip`.
    pub fn archive_path(directory: &Path) -> Result<PathBuf> {
        let name = directory.file_name().ok_or_else(|| ErrorKind::NotADirectory(directory.to_path_buf()))?;
        let mut file_name = name.to_os_string();
        file_name.push(".");
        file_name.push(ARCHIVE_EXTENSION);
        Ok(directory.with_file_name(file_name))
    }

    /// Archive every regular file below `directory` into `{directory}.zip`.
    ///
    /// Members are streamed one at a time and `progress` is invoked after
    /// each member with the cumulative byte count. The archive is created
    /// exclusively: an existing file at the target path is never replaced.
    /// If any member fails, the partially written archive is removed and the
    /// error is returned; the source directory is left untouched either way.
    #[instrument(skip(self, progress), fields(directory = %directory.display(), compression = %self.compression))]
    pub fn compress(&self, directory: &Path, mut progress: impl FnMut(Progress<'_>)) -> Result<PathBuf> {
        if !directory.is_dir() {
            exn::bail!(ErrorKind::NotADirectory(directory.to_path_buf()));
        }
        let target = Self::archive_path(directory)?;
        let members = collect_members(directory)?;
        let total = members.iter().map(|m| m.size).sum();
        tracing::debug!(members = members.len(), bytes = total, "Collected archive members");

        let file = match OpenOptions::new().write(true).create_new(true).open(&target) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => exn::bail!(ErrorKind::AlreadyExists(target)),
            Err(e) => return Err(e).or_raise(|| ErrorKind::Io),
        };

        match self.write_members(file, &members, total, &mut progress) {
            Ok(()) => {
                tracing::info!(archive = %target.display(), bytes = total, "Archive complete");
                Ok(target)
            },
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&target) {
                    tracing::warn!(archive = %target.display(), error = %cleanup, "Could not remove incomplete archive");
                }
                Err(e)
            },
        }
    }

    fn write_members(
        &self,
        file: File,
        members: &[Member],
        total: u64,
        progress: &mut impl FnMut(Progress<'_>),
    ) -> Result<()> {
        let options = SimpleFileOptions::default()
            .compression_method(self.compression.method())
            // Partitions are sized in gigabytes; zip64 is mandatory past 4 GiB.
            .large_file(true)
            .last_modified_time(DateTime::default())
            .unix_permissions(MEMBER_PERMISSIONS);
        let mut zip = ZipWriter::new(BufWriter::new(file));
        let mut processed = 0u64;
        for member in members {
            zip.start_file(member.name.as_str(), options).or_raise(|| ErrorKind::Writer)?;
            let mut source = File::open(&member.path).or_raise(|| ErrorKind::Member(member.path.clone()))?;
            processed += io::copy(&mut source, &mut zip).or_raise(|| ErrorKind::Member(member.path.clone()))?;
            progress(Progress { processed, total, current: &member.path });
        }
        let mut writer = zip.finish().or_raise(|| ErrorKind::Writer)?;
        writer.flush().or_raise(|| ErrorKind::Io)?;
        Ok(())
    }
}

/// Walk `root` and return its regular files sorted by their archive name.
fn collect_members(root: &Path) -> Result<Vec<Member>> {
    let mut members = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in fs::read_dir(&current).or_raise(|| ErrorKind::Member(current.clone()))? {
            let entry = entry.or_raise(|| ErrorKind::Member(current.clone()))?;
            let path = entry.path();
            let file_type = entry.file_type().or_raise(|| ErrorKind::Member(path.clone()))?;
            if file_type.is_dir() {
                stack.push(path);
            } else if file_type.is_file() {
                let size = entry.metadata().or_raise(|| ErrorKind::Member(path.clone()))?.len();
                let name = member_name(root, &path)?;
                members.push(Member { path, name, size });
            }
        }
    }
    members.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(members)
}

/// Zip entry names always use forward slashes, regardless of platform.
fn member_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).or_raise(|| ErrorKind::Member(path.to_path_buf()))?;
    Ok(relative.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/"))
}
