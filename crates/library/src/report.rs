//! Plain-text organization report.

use crate::error::{ErrorKind, Result};
use crate::organize::Partition;
use exn::ResultExt;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};

/// Partition name to file count, plus what did not make it into a
/// partition. Derived from the run; never read back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub source: String,
    pub partitions: BTreeMap<String, usize>,
    /// Files larger than the capacity bound.
    pub skipped: usize,
    /// Files that could not be moved.
    pub failed: usize,
}
impl Report {
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into(), ..Self::default() }
    }

    pub fn record(&mut self, partition: &Partition) {
        self.partitions.insert(partition.name.clone(), partition.count());
    }

    /// Files that ended up in a partition.
    pub fn total(&self) -> usize {
        self.partitions.values().sum()
    }

    /// Writes the report to `root/file_name`, replacing any earlier report.
    pub async fn write(&self, root: &Path, file_name: &str) -> Result<PathBuf> {
        let path = root.join(file_name);
        tokio::fs::write(&path, self.to_string())
            .await
            .or_raise(|| ErrorKind::Report(path.clone()))?;
        tracing::info!(path = %path.display(), "Report written");
        Ok(path)
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        writeln!(f, "Video File Organization Report")?;
        writeln!(f, "==============================")?;
        writeln!(f)?;
        writeln!(f, "Source Folder: {}", self.source)?;
        writeln!(f, "Total Files Processed: {}", self.total())?;
        if self.skipped > 0 {
            writeln!(f, "Skipped (larger than capacity): {}", self.skipped)?;
        }
        if self.failed > 0 {
            writeln!(f, "Failed to move: {}", self.failed)?;
        }
        writeln!(f)?;
        writeln!(f, "Files per Subfolder:")?;
        writeln!(f, "--------------------")?;
        for (name, count) in &self.partitions {
            writeln!(f, "{name}: {count} files")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partition(name: &str, files: usize) -> Partition {
        Partition {
            index: 1,
            name: name.to_string(),
            path: PathBuf::from(name),
            files: (0..files).map(|i| PathBuf::from(format!("{i}.mp4"))).collect(),
            size: 0,
        }
    }

    #[test]
    fn test_render() {
        let mut report = Report::new("Holiday");
        report.record(&partition("Holiday_2_1Files", 1));
        report.record(&partition("Holiday_1_2Files", 2));
        report.skipped = 1;
        assert_eq!(report.total(), 3);
        assert_eq!(
            report.to_string(),
            "Video File Organization Report\n\
             ==============================\n\
             \n\
             Source Folder: Holiday\n\
             Total Files Processed: 3\n\
             Skipped (larger than capacity): 1\n\
             \n\
             Files per Subfolder:\n\
             --------------------\n\
             Holiday_1_2Files: 2 files\n\
             Holiday_2_1Files: 1 files\n"
        );
    }

    #[test]
    fn test_failed_line_only_when_non_zero() {
        let mut report = Report::new("Holiday");
        assert!(!report.to_string().contains("Failed"));
        report.failed = 2;
        assert!(report.to_string().contains("Failed to move: 2\n"));
    }

    #[tokio::test]
    async fn test_write() {
        let temp = tempfile::tempdir().unwrap();
        let mut report = Report::new("Holiday");
        report.record(&partition("Holiday_1_1Files", 1));
        let path = report.write(temp.path(), "organization_report.txt").await.unwrap();
        assert_eq!(path, temp.path().join("organization_report.txt"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), report.to_string());
    }

    #[tokio::test]
    async fn test_write_into_missing_directory() {
        let temp = tempfile::tempdir().unwrap();
        let err = Report::new("x").write(&temp.path().join("missing"), "r.txt").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Report(_)));
    }
}
