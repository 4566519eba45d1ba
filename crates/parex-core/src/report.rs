//! Extraction operation reporting.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// Report of a successful extraction.
///
/// Only produced when every entry was materialized; a failed extraction
/// returns its first error instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Number of regular files written.
    pub files_extracted: usize,

    /// Number of directory entries materialized.
    pub directories_created: usize,

    /// Number of symlinks created.
    pub symlinks_created: usize,

    /// Total content bytes written to disk.
    pub bytes_written: u64,

    /// Number of entries skipped because their type is not supported.
    pub entries_skipped: usize,

    /// Duration of the extraction operation.
    pub duration: Duration,
}

impl ExtractionReport {
    /// Creates a new empty extraction report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns total number of items materialized.
    #[must_use]
    pub fn total_items(&self) -> usize {
        self.files_extracted + self.directories_created + self.symlinks_created
    }
}

/// Counters shared between the orchestrator and file tasks.
#[derive(Debug, Default)]
pub(crate) struct Tally {
    files: AtomicUsize,
    directories: AtomicUsize,
    symlinks: AtomicUsize,
    skipped: AtomicUsize,
    bytes: AtomicU64,
}

impl Tally {
    pub(crate) fn file(&self, bytes: u64) {
        self.files.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn directory(&self) {
        self.directories.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn symlink(&self) {
        self.symlinks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn into_report(self, duration: Duration) -> ExtractionReport {
        ExtractionReport {
            files_extracted: self.files.into_inner(),
            directories_created: self.directories.into_inner(),
            symlinks_created: self.symlinks.into_inner(),
            bytes_written: self.bytes.into_inner(),
            entries_skipped: self.skipped.into_inner(),
            duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_report() {
        let report = ExtractionReport::new();
        assert_eq!(report.files_extracted, 0);
        assert_eq!(report.directories_created, 0);
        assert_eq!(report.bytes_written, 0);
    }

    #[test]
    fn test_total_items() {
        let mut report = ExtractionReport::new();
        report.files_extracted = 10;
        report.directories_created = 5;
        report.symlinks_created = 2;
        report.entries_skipped = 3;
        assert_eq!(report.total_items(), 17);
    }

    #[test]
    fn test_tally_into_report() {
        let tally = Tally::default();
        tally.file(10);
        tally.file(5);
        tally.directory();
        tally.symlink();
        tally.skipped();

        let report = tally.into_report(Duration::from_millis(3));
        assert_eq!(report.files_extracted, 2);
        assert_eq!(report.bytes_written, 15);
        assert_eq!(report.directories_created, 1);
        assert_eq!(report.symlinks_created, 1);
        assert_eq!(report.entries_skipped, 1);
        assert_eq!(report.duration, Duration::from_millis(3));
    }
}
