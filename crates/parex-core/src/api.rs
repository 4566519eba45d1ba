//! High-level public API for archive extraction.

use std::path::Path;

use crate::ExtractionConfig;
use crate::ExtractionReport;
use crate::Result;
use crate::extraction::Extractor;

/// Extracts the ZIP archive at `archive_path` into `output_dir`.
///
/// The output directory is created if it does not exist. Ownership
/// failures are fatal; build an [`Extractor`] directly to install a
/// handler, share a concurrency bound or register decompressors.
///
/// # Errors
///
/// Returns an error if:
/// - The archive cannot be opened or is not a valid ZIP file
/// - The configuration is invalid
/// - Any entry resolves outside `output_dir`
/// - I/O or metadata restoration fails
///
/// # Examples
///
/// ```no_run
/// use parex_core::ExtractionConfig;
/// use parex_core::extract_archive;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let report = extract_archive("archive.zip", "/tmp/output", &ExtractionConfig::default())?;
/// println!("Extracted {} files", report.files_extracted);
/// # Ok(())
/// # }
/// ```
pub fn extract_archive<P: AsRef<Path>, Q: AsRef<Path>>(
    archive_path: P,
    output_dir: Q,
    config: &ExtractionConfig,
) -> Result<ExtractionReport> {
    let extractor = Extractor::open(archive_path, output_dir, config.clone())?;
    let report = extractor.extract()?;
    extractor.close();
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ExtractionError;
    use crate::test_utils::ZipTestBuilder;
    use tempfile::TempDir;

    #[test]
    fn test_extract_archive() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("a.zip");
        std::fs::write(
            &archive,
            ZipTestBuilder::new()
                .add_directory("d/")
                .add_file("d/f.txt", b"hi")
                .build(),
        )
        .unwrap();

        let out = temp.path().join("out");
        let report = extract_archive(&archive, &out, &ExtractionConfig::default()).unwrap();
        assert_eq!(report.files_extracted, 1);
        assert_eq!(report.directories_created, 1);
        assert_eq!(std::fs::read(out.join("d/f.txt")).unwrap(), b"hi");
    }

    #[test]
    fn test_extract_archive_missing_file() {
        let temp = TempDir::new().unwrap();
        let result = extract_archive(
            temp.path().join("missing.zip"),
            temp.path().join("out"),
            &ExtractionConfig::default(),
        );
        assert!(matches!(result, Err(ExtractionError::Io(_))));
    }
}
